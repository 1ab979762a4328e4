//! Trainer-facing reward interface.
//!
//! The trainer calls [`RewardHook::reward_func`] once per rollout (usually
//! concurrently) and stores each returned teacher response on its sample.
//! After the batch is complete it calls
//! [`RewardHook::post_process_rewards`], which attaches teacher log-probs and
//! returns `(raw_rewards, advantage_rewards)`.

use tracing::info;

use crate::config::OpdConfig;
use crate::error::Result;
use crate::sample::Sample;
use crate::teacher::{TeacherClient, TeacherResponse};

use super::extract::{attach_from_stored_rewards, attach_teacher_log_probs, mean_log_prob};
use super::policy::{build_policy, RewardPolicy};

/// Scalar rewards handed back to the trainer: one list for raw reward
/// logging and one for the advantage estimator.
pub type ScalarRewards = (Vec<f64>, Vec<f64>);

/// Bundles the teacher client with the scalar reward strategy.
pub struct RewardHook {
    client: TeacherClient,
    policy: Box<dyn RewardPolicy>,
}

impl RewardHook {
    pub fn new(client: TeacherClient, policy: Box<dyn RewardPolicy>) -> Self {
        Self { client, policy }
    }

    pub fn from_config(config: &OpdConfig) -> Self {
        Self::new(
            TeacherClient::from_config(&config.teacher),
            build_policy(&config.reward),
        )
    }

    pub fn client(&self) -> &TeacherClient {
        &self.client
    }

    /// Query the teacher for one sample.
    pub async fn reward_func(&self, sample: &Sample) -> Result<TeacherResponse> {
        self.client.score(sample).await
    }

    /// Attach teacher log-probs from each sample's stored response, then
    /// compute scalar rewards.
    pub fn post_process_rewards(&self, samples: &mut [Sample]) -> Result<ScalarRewards> {
        attach_from_stored_rewards(samples)?;
        self.finish(samples)
    }

    /// Same as [`post_process_rewards`](Self::post_process_rewards), with the
    /// teacher responses supplied alongside the samples in the same order.
    pub fn post_process_responses(
        &self,
        responses: &[TeacherResponse],
        samples: &mut [Sample],
    ) -> Result<ScalarRewards> {
        attach_teacher_log_probs(responses, samples)?;
        self.finish(samples)
    }

    fn finish(&self, samples: &[Sample]) -> Result<ScalarRewards> {
        let rewards = self.policy.scalar_rewards(samples)?;

        let means: Vec<f64> = samples
            .iter()
            .filter_map(|s| s.teacher_log_probs().and_then(mean_log_prob))
            .collect();
        let batch_mean = if means.is_empty() {
            0.0
        } else {
            means.iter().sum::<f64>() / means.len() as f64
        };
        info!(
            num_samples = samples.len(),
            policy = self.policy.name(),
            mean_teacher_log_prob = batch_mean,
            "post-processed teacher rewards"
        );

        Ok((rewards.clone(), rewards))
    }
}

/// Query the teacher configured in `config` for one sample.
pub async fn reward_func(config: &OpdConfig, sample: &Sample) -> Result<TeacherResponse> {
    TeacherClient::from_config(&config.teacher).score(sample).await
}

/// Attach teacher log-probs to `samples` and compute the configured scalar
/// rewards.
pub fn post_process_rewards(config: &OpdConfig, samples: &mut [Sample]) -> Result<ScalarRewards> {
    RewardHook::from_config(config).post_process_rewards(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewardPolicyKind;
    use crate::error::OpdError;
    use crate::reward::extract::tests::synthetic_response;

    #[test]
    fn two_sample_scenario() {
        let mut s1 = Sample::new((0..9).collect(), 3);
        s1.set_reward(synthetic_response(10));
        let mut s2 = Sample::new((0..11).collect(), 5);
        s2.set_reward(synthetic_response(12));
        let mut samples = vec![s1, s2];

        let (raw, adv) = post_process_rewards(&OpdConfig::default(), &mut samples).unwrap();

        assert_eq!(samples[0].teacher_log_probs().unwrap().len(), 3);
        assert_eq!(samples[1].teacher_log_probs().unwrap().len(), 5);
        assert_eq!(raw, vec![0.0, 0.0]);
        assert_eq!(adv, raw);
    }

    #[test]
    fn responses_supplied_separately() {
        let hook = RewardHook::from_config(&OpdConfig::default());
        let mut samples = vec![Sample::new(vec![1, 2, 3, 4], 2); 3];
        let responses = vec![synthetic_response(5); 3];

        let (raw, adv) = hook.post_process_responses(&responses, &mut samples).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(adv.len(), 3);
        assert!(samples
            .iter()
            .all(|s| s.teacher_log_probs() == Some(&[-3.0f32, -4.0][..])));
    }

    #[test]
    fn undersized_response_fails_post_processing() {
        let mut sample = Sample::new(vec![1, 2, 3], 3);
        sample.set_reward(synthetic_response(3));
        let err = post_process_rewards(&OpdConfig::default(), &mut [sample]).unwrap_err();
        assert!(matches!(err, OpdError::LogProbsTooShort { .. }));
    }

    #[test]
    fn task_policy_grades_after_extraction() {
        let mut config = OpdConfig::default();
        config.reward.policy = RewardPolicyKind::Task;

        let mut right = Sample::new(vec![1, 2, 3], 1)
            .with_response("\\boxed{7}")
            .with_label("7");
        right.set_reward(synthetic_response(4));
        let mut wrong = Sample::new(vec![1, 2, 3], 1)
            .with_response("\\boxed{8}")
            .with_label("7");
        wrong.set_reward(synthetic_response(4));
        let mut samples = vec![right, wrong];

        let (raw, _) = post_process_rewards(&config, &mut samples).unwrap();
        assert_eq!(raw, vec![1.0, 0.0]);
        assert!(samples.iter().all(|s| s.teacher_log_probs().is_some()));
    }
}
