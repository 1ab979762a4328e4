//! On-policy distillation reward hook for vision-language rollouts.
//!
//! Scores each student rollout with a teacher model and attaches the teacher's
//! per-token log-probabilities for the response tokens, for the trainer's KL
//! penalty. The trainer receives a scalar reward per sample alongside.

pub mod config;
pub mod error;
pub mod image;
pub mod reward;
pub mod rollout;
pub mod sample;
pub mod teacher;

pub use error::{OpdError, Result};
