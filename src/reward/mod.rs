//! Reward module for on-policy distillation.
//!
//! - [`extract`] -- trims teacher log-probs down to the response tokens.
//! - [`policy`] -- pluggable scalar reward strategies and task graders.
//! - [`hooks`] -- the per-sample and per-batch functions the trainer calls.

pub mod extract;
pub mod hooks;
pub mod policy;

pub use extract::{
    attach_from_stored_rewards, attach_teacher_log_probs, mean_log_prob, response_log_probs,
};
pub use hooks::{post_process_rewards, reward_func, RewardHook, ScalarRewards};
pub use policy::{
    build_policy, BoxedAnswerGrader, Blended, PureDistillation, RewardPolicy, TaskGrader,
    TaskReward,
};
