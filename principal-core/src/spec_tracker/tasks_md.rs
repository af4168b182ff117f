//! File-mode spec tracking: `tasks.md` checkbox scanning
//!
//! An unlinked open task is a `- [ ]` line with no `<!-- Issue #N -->`
//! marker. Only the first one per spec matters; once it gets a linked child
//! issue, that issue's own labels drive progress instead.

use std::path::Path;

/// Result of scanning one spec's `tasks.md`/`design.md` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSpecStatus {
    /// 1-based line number of the first unlinked `- [ ]` task
    UnlinkedTask { line: u64 },
    /// `design.md` exists but `tasks.md` does not
    NeedsGeneration,
    /// Nothing actionable in this spec
    NoWork,
}

const ISSUE_MARKER: &str = "<!-- Issue #";

/// Scan `<base>/<spec>/tasks.md` for the first unlinked open task.
///
/// Unreadable files are treated as [`FileSpecStatus::NoWork`], not an error
/// -- a single bad spec must not block every other active spec.
pub fn scan_spec(base_path: &Path, spec: &str) -> FileSpecStatus {
    let spec_dir = base_path.join(spec);
    let tasks_path = spec_dir.join("tasks.md");

    match std::fs::read_to_string(&tasks_path) {
        Ok(contents) => {
            for (idx, line) in contents.lines().enumerate() {
                let trimmed = line.trim_start();
                if trimmed.starts_with("- [ ]") && !line.contains(ISSUE_MARKER) {
                    return FileSpecStatus::UnlinkedTask {
                        line: (idx + 1) as u64,
                    };
                }
            }
            FileSpecStatus::NoWork
        }
        Err(_) => {
            if spec_dir.join("design.md").exists() {
                FileSpecStatus::NeedsGeneration
            } else {
                FileSpecStatus::NoWork
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_spec(base: &Path, spec: &str, file: &str, contents: &str) {
        let dir = base.join(spec);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), contents).unwrap();
    }

    #[test]
    fn finds_first_unlinked_task() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "feature-a",
            "tasks.md",
            "- [x] done already\n- [ ] <!-- Issue #12 --> linked\n- [ ] do the thing\n",
        );

        let status = scan_spec(dir.path(), "feature-a");
        assert_eq!(status, FileSpecStatus::UnlinkedTask { line: 3 });
    }

    #[test]
    fn all_linked_is_no_work() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "feature-a",
            "tasks.md",
            "- [ ] <!-- Issue #12 --> linked\n",
        );

        assert_eq!(scan_spec(dir.path(), "feature-a"), FileSpecStatus::NoWork);
    }

    #[test]
    fn missing_tasks_md_with_design_md_needs_generation() {
        let dir = TempDir::new().unwrap();
        write_spec(dir.path(), "feature-a", "design.md", "# Feature A\n");

        assert_eq!(
            scan_spec(dir.path(), "feature-a"),
            FileSpecStatus::NeedsGeneration
        );
    }

    #[test]
    fn missing_both_files_is_no_work() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("feature-a")).unwrap();

        assert_eq!(scan_spec(dir.path(), "feature-a"), FileSpecStatus::NoWork);
    }
}
