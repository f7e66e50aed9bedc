//! Merge task state machine
//!
//! Two-phase pattern:
//! 1. Plan - the fixed step list and outcome classification (pure, testable)
//! 2. Execute - run the steps against git and the hooks (effectful)

mod execute;
mod plan;

pub use execute::{TaskContext, TaskSettings, execute_task};
pub use plan::{
    MergeObservation, PlanOptions, TaskStep, apply_post_hook, classify_merge, plan_task,
    render_merge_branch,
};
