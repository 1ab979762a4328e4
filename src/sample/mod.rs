//! Rollout samples as seen by the reward hook.
//!
//! - [`types::Sample`] -- one student rollout (prompt + response tokens) with
//!   its optional images, the stored teacher response, and the extracted
//!   teacher log-probabilities.
//! - [`types::RawImage`] / [`types::MultimodalInputs`] -- the multimodal
//!   context sent alongside the tokens.

pub mod types;

pub use types::{MultimodalInputs, RawImage, Sample};
