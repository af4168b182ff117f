//! Principal Core - decision engine and control-loop core for the Principal
//! orchestrator.
//!
//! This crate computes, but never executes, the single next action an
//! orchestration loop should take for one GitHub issue: which label to add
//! or remove, which PR to merge or close, or which new child task to
//! dispatch. Side effects (talking to GitHub, spawning workers) live in
//! sibling crates; this crate is pure decision logic plus the bookkeeping
//! (config, state counters, spec tracking) that logic depends on.

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod platform;
pub mod pr_extractor;
pub mod spec_tracker;
pub mod state_store;

pub use config::{Config, GithubConfig, Labels, SpecsConfig, TrackingConfig, TrackingMode};
pub use decision::{Decision, MergeIssue, NextAction};
pub use engine::DecisionEngine;
pub use error::{Error, Result};
pub use platform::{Issue, IssueState, PlatformClient, PrState, PullRequest};
pub use pr_extractor::extract_pr_number;
pub use spec_tracker::{SpecTracker, TaskStatus};
pub use state_store::StateStore;
