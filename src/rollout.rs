//! Batch fan-out of teacher queries.
//!
//! Runs the query stage for every sample in a rollout batch with a bounded
//! number of requests in flight. Results are collected in input order, not
//! completion order, so each response is stored on the sample it belongs to.

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{info, warn};

use crate::error::Result;
use crate::reward::RewardHook;
use crate::sample::Sample;

/// Query the teacher for every sample and store each response on its sample.
///
/// At most `max_concurrency` requests are in flight. The first failure aborts
/// the batch and no sample is updated.
pub async fn score_samples(
    hook: &RewardHook,
    samples: &mut [Sample],
    max_concurrency: usize,
) -> Result<()> {
    let limit = max_concurrency.max(1);
    info!(
        num_samples = samples.len(),
        max_concurrency = limit,
        url = hook.client().url(),
        "querying teacher for rollout batch"
    );

    let responses: Vec<_> = stream::iter(samples.iter().enumerate())
        .map(|(index, sample)| async move {
            hook.reward_func(sample).await.inspect_err(|err| {
                warn!(index, error = %err, "teacher query failed");
            })
        })
        .buffered(limit)
        .try_collect()
        .await?;

    for (sample, response) in samples.iter_mut().zip(responses) {
        sample.set_reward(response);
    }
    Ok(())
}
