//! Epic-mode spec tracking: GitHub issue checkbox parsing
//!
//! A tracking issue's body is a checklist of child tasks. Each line is
//! parsed against a canonical regex; the captured remainder is further
//! matched for a leading `#N` issue reference. A task with no reference and
//! not yet checked is the work item that needs a new child issue.

use std::sync::OnceLock;

use regex::Regex;

/// One parsed line from a tracking issue's checkbox list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpicTask {
    /// 0 when the line has no `#N` issue reference yet
    pub issue_number: u64,
    pub text: String,
    pub completed: bool,
    pub raw_line: String,
}

fn checkbox_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*-\s*\[([ xX])\]\s*(.*)$").unwrap())
}

fn issue_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#(\d+)\s*(.*)$").unwrap())
}

/// Parse every checkbox line in a tracking issue body
pub fn parse_epic_body(body: &str) -> Vec<EpicTask> {
    let mut tasks = Vec::new();

    for line in body.lines() {
        let Some(caps) = checkbox_re().captures(line) else {
            continue;
        };

        let completed = matches!(&caps[1], "x" | "X");
        let remainder = caps[2].trim();

        let (issue_number, text) = match issue_ref_re().captures(remainder) {
            Some(ref_caps) => {
                let n: u64 = ref_caps[1].parse().unwrap_or(0);
                (n, ref_caps[2].trim().to_string())
            }
            None => (0, remainder.to_string()),
        };

        tasks.push(EpicTask {
            issue_number,
            text,
            completed,
            raw_line: line.to_string(),
        });
    }

    tasks
}

/// First task that is unchecked and has no child-issue reference yet
pub fn find_actionable_task(tasks: &[EpicTask]) -> Option<&EpicTask> {
    tasks
        .iter()
        .find(|t| !t.completed && t.issue_number == 0)
}

/// Insert `- [ ] #n description` after the last existing task-list line, or
/// at the end of the body if there is none.
pub fn append_task_to_epic_body(body: &str, issue_number: u64, description: &str) -> String {
    let new_line = format!("- [ ] #{issue_number} {description}");

    let last_task_idx = body
        .lines()
        .enumerate()
        .filter(|(_, line)| checkbox_re().is_match(line))
        .map(|(i, _)| i)
        .last();

    let mut lines: Vec<&str> = body.lines().collect();

    match last_task_idx {
        Some(idx) => {
            lines.insert(idx + 1, &new_line);
            lines.join("\n")
        }
        None => {
            if body.is_empty() {
                new_line
            } else if body.ends_with('\n') {
                format!("{body}{new_line}\n")
            } else {
                format!("{body}\n{new_line}")
            }
        }
    }
}
