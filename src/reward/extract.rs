//! Log-prob extraction stage.
//!
//! The teacher returns one log-probability per input position, covering
//! image placeholders, the prompt, and the response:
//!
//!   [pos 0, image tokens..., prompt tokens..., response tokens...]
//!
//! Position 0 has no preceding token, so its entry is dropped. Of what
//! remains, the last `response_length` entries line up with the student's
//! response tokens. The teacher must return a dense, gap-free list; any
//! omitted position would shift the trim window.

use tracing::debug;

use crate::error::{OpdError, Result};
use crate::sample::Sample;
use crate::teacher::TeacherResponse;

/// Extract the teacher log-probabilities of the last `response_length`
/// tokens from `response`.
///
/// `index` is the sample's position in its batch and only feeds error
/// reporting. Fails when fewer than `response_length + 1` entries are
/// present or a retained entry is null.
pub fn response_log_probs(
    response: &TeacherResponse,
    response_length: usize,
    index: usize,
) -> Result<Vec<f32>> {
    let entries = response
        .input_token_logprobs()
        .ok_or(OpdError::MissingLogProbs { index })?;

    let required = response_length + 1;
    if entries.len() < required {
        return Err(OpdError::LogProbsTooShort {
            index,
            required,
            available: entries.len(),
        });
    }

    let start = entries.len() - response_length;
    entries[start..]
        .iter()
        .enumerate()
        .map(|(offset, entry)| {
            entry.logprob.map(|lp| lp as f32).ok_or(OpdError::NullLogProb {
                index,
                position: start + offset,
            })
        })
        .collect()
}

/// Extract and attach teacher log-probs for a batch, pairing `responses`
/// with `samples` by position.
///
/// Either every sample is annotated or none is.
pub fn attach_teacher_log_probs(
    responses: &[TeacherResponse],
    samples: &mut [Sample],
) -> Result<()> {
    if responses.len() != samples.len() {
        return Err(OpdError::BatchMismatch {
            samples: samples.len(),
            rewards: responses.len(),
        });
    }

    let extracted = responses
        .iter()
        .zip(samples.iter())
        .enumerate()
        .map(|(index, (response, sample))| {
            response_log_probs(response, sample.response_length, index)
        })
        .collect::<Result<Vec<_>>>()?;

    for (sample, log_probs) in samples.iter_mut().zip(extracted) {
        sample.set_teacher_log_probs(log_probs);
    }
    debug!(num_samples = samples.len(), "attached teacher log-probs");
    Ok(())
}

/// Like [`attach_teacher_log_probs`], but reads each sample's stored teacher
/// response.
pub fn attach_from_stored_rewards(samples: &mut [Sample]) -> Result<()> {
    let extracted = samples
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            let response = sample
                .reward_value()
                .ok_or(OpdError::MissingReward { index })?;
            response_log_probs(response, sample.response_length, index)
        })
        .collect::<Result<Vec<_>>>()?;

    for (sample, log_probs) in samples.iter_mut().zip(extracted) {
        sample.set_teacher_log_probs(log_probs);
    }
    Ok(())
}

/// Mean of a log-prob slice, or `None` when empty.
pub fn mean_log_prob(log_probs: &[f32]) -> Option<f64> {
    if log_probs.is_empty() {
        return None;
    }
    let sum: f64 = log_probs.iter().map(|&lp| f64::from(lp)).sum();
    Some(sum / log_probs.len() as f64)
}
