//! Scoring request sent to the teacher.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::image::ImageEncoder;
use crate::sample::Sample;

/// Sampling parameters for a scoring-only request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_new_tokens: u32,
    pub skip_special_tokens: bool,
}

impl SamplingParams {
    /// Deterministic, zero-generation parameters: the teacher only scores
    /// the tokens it is given.
    pub fn scoring() -> Self {
        Self {
            temperature: 0.0,
            max_new_tokens: 0,
            skip_special_tokens: false,
        }
    }
}

/// Request body for the teacher's generate endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// Prompt + response token ids.
    pub input_ids: Vec<u32>,
    pub sampling_params: SamplingParams,
    pub return_logprob: bool,
    /// First position to return log-probs for; 0 means every position.
    pub logprob_start_len: usize,
    /// One encoded entry per image, in prompt order. Omitted for text-only
    /// samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<Vec<String>>,
}

impl ScoreRequest {
    /// Build the scoring request for `sample`, encoding each of its images
    /// with `encoder`.
    pub fn for_sample(sample: &Sample, encoder: &dyn ImageEncoder) -> Result<Self> {
        let images = sample.images();
        let image_data = if images.is_empty() {
            None
        } else {
            Some(
                images
                    .iter()
                    .map(|image| encoder.encode(image))
                    .collect::<Result<Vec<_>>>()?,
            )
        };

        Ok(Self {
            input_ids: sample.tokens.clone(),
            sampling_params: SamplingParams::scoring(),
            return_logprob: true,
            logprob_start_len: 0,
            image_data,
        })
    }
}
