//! Scalar reward strategies.
//!
//! The trainer's advantage estimator consumes one scalar per sample. For pure
//! distillation that scalar is 0.0 and the learning signal comes from the KL
//! penalty against the teacher log-probs. A [`RewardPolicy`] can instead
//! report a task-correctness score, or blend the two; log-prob extraction is
//! unaffected by the choice.

use tracing::warn;

use crate::config::{RewardConfig, RewardPolicyKind};
use crate::error::{OpdError, Result};
use crate::sample::Sample;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Scores a sample's task outcome, typically in `[0, 1]`.
pub trait TaskGrader: Send + Sync {
    fn grade(&self, sample: &Sample) -> Result<f64>;
}

/// Computes the scalar reward for each sample in a batch.
pub trait RewardPolicy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// One reward per sample, in input order.
    fn scalar_rewards(&self, samples: &[Sample]) -> Result<Vec<f64>>;
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Every sample scores 0.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct PureDistillation;

impl RewardPolicy for PureDistillation {
    fn name(&self) -> &'static str {
        "pure_distillation"
    }

    fn scalar_rewards(&self, samples: &[Sample]) -> Result<Vec<f64>> {
        Ok(vec![0.0; samples.len()])
    }
}

/// Reward is the grader's task score.
#[derive(Debug, Clone)]
pub struct TaskReward<G> {
    grader: G,
}

impl<G: TaskGrader> TaskReward<G> {
    pub fn new(grader: G) -> Self {
        Self { grader }
    }
}

impl<G: TaskGrader> RewardPolicy for TaskReward<G> {
    fn name(&self) -> &'static str {
        "task"
    }

    fn scalar_rewards(&self, samples: &[Sample]) -> Result<Vec<f64>> {
        samples.iter().map(|s| self.grader.grade(s)).collect()
    }
}

/// `task_weight * task + (1 - task_weight) * agreement`, where agreement is
/// the mean of `teacher_lp - student_lp` over the response tokens (the
/// negated per-token reverse-KL estimate).
///
/// Requires teacher log-probs to be attached and the student's rollout
/// log-probs to be recorded on each sample.
#[derive(Debug, Clone)]
pub struct Blended<G> {
    grader: G,
    task_weight: f64,
}

impl<G: TaskGrader> Blended<G> {
    pub fn new(grader: G, task_weight: f64) -> Self {
        Self {
            grader,
            task_weight,
        }
    }
}

impl<G: TaskGrader> RewardPolicy for Blended<G> {
    fn name(&self) -> &'static str {
        "blended"
    }

    fn scalar_rewards(&self, samples: &[Sample]) -> Result<Vec<f64>> {
        samples
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                let task = self.grader.grade(sample)?;
                let agreement = teacher_agreement(sample, index)?;
                Ok(self.task_weight * task + (1.0 - self.task_weight) * agreement)
            })
            .collect()
    }
}

fn teacher_agreement(sample: &Sample, index: usize) -> Result<f64> {
    let teacher = sample.teacher_log_probs().ok_or_else(|| {
        OpdError::Grader(format!("sample {index} has no teacher log-probs"))
    })?;
    let student = sample.rollout_log_probs.as_deref().ok_or_else(|| {
        OpdError::Grader(format!("sample {index} has no rollout log-probs"))
    })?;
    if teacher.len() != student.len() {
        return Err(OpdError::Grader(format!(
            "sample {index}: {} teacher log-probs vs {} rollout log-probs",
            teacher.len(),
            student.len()
        )));
    }
    if teacher.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = teacher
        .iter()
        .zip(student)
        .map(|(&t, &s)| f64::from(t) - f64::from(s))
        .sum();
    Ok(sum / teacher.len() as f64)
}

/// Build the policy named by `config`, grading with [`BoxedAnswerGrader`].
pub fn build_policy(config: &RewardConfig) -> Box<dyn RewardPolicy> {
    match config.policy {
        RewardPolicyKind::PureDistillation => Box::new(PureDistillation),
        RewardPolicyKind::Task => Box::new(TaskReward::new(BoxedAnswerGrader)),
        RewardPolicyKind::Blended => {
            Box::new(Blended::new(BoxedAnswerGrader, config.task_weight))
        }
    }
}

// ---------------------------------------------------------------------------
// Graders
// ---------------------------------------------------------------------------

/// Scores 1.0 when the last `\boxed{...}` answer in the response matches the
/// label, 0.0 otherwise. Comparison ignores whitespace and case.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxedAnswerGrader;

impl TaskGrader for BoxedAnswerGrader {
    fn grade(&self, sample: &Sample) -> Result<f64> {
        let label = sample
            .label
            .as_deref()
            .ok_or_else(|| OpdError::Grader("sample has no label".into()))?;

        let Some(answer) = last_boxed(&sample.response) else {
            warn!("response has no boxed answer");
            return Ok(0.0);
        };

        if normalize_answer(answer) == normalize_answer(label) {
            Ok(1.0)
        } else {
            Ok(0.0)
        }
    }
}

/// Contents of the last `\boxed{...}` in `text`, honouring nested braces.
pub fn last_boxed(text: &str) -> Option<&str> {
    const MARKER: &str = "\\boxed{";
    let start = text.rfind(MARKER)? + MARKER.len();
    let mut depth = 1usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn normalize_answer(answer: &str) -> String {
    answer
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .trim_end_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGrader(f64);

    impl TaskGrader for FixedGrader {
        fn grade(&self, _sample: &Sample) -> Result<f64> {
            Ok(self.0)
        }
    }

    fn answered(response: &str, label: &str) -> Sample {
        Sample::new(vec![1, 2, 3], 1)
            .with_response(response)
            .with_label(label)
    }

    #[test]
    fn pure_distillation_is_all_zero() {
        let samples = vec![Sample::default(); 4];
        let rewards = PureDistillation.scalar_rewards(&samples).unwrap();
        assert_eq!(rewards, vec![0.0; 4]);
    }

    #[test]
    fn task_reward_uses_grader() {
        let policy = TaskReward::new(FixedGrader(0.75));
        let rewards = policy.scalar_rewards(&vec![Sample::default(); 2]).unwrap();
        assert_eq!(rewards, vec![0.75, 0.75]);
    }

    #[test]
    fn blended_mixes_task_and_agreement() {
        let mut sample = Sample::new(vec![1, 2, 3], 2).with_rollout_log_probs(vec![-1.0, -2.0]);
        sample.set_teacher_log_probs(vec![-0.5, -1.5]);

        let policy = Blended::new(FixedGrader(1.0), 0.5);
        let rewards = policy.scalar_rewards(&[sample]).unwrap();
        // agreement = mean(0.5, 0.5) = 0.5
        assert!((rewards[0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn blended_requires_rollout_log_probs() {
        let mut sample = Sample::new(vec![1, 2], 1);
        sample.set_teacher_log_probs(vec![-0.5]);
        let err = Blended::new(FixedGrader(1.0), 0.5)
            .scalar_rewards(&[sample])
            .unwrap_err();
        assert!(err.to_string().contains("rollout log-probs"));
    }

    #[test]
    fn blended_rejects_length_mismatch() {
        let mut sample = Sample::new(vec![1, 2], 1).with_rollout_log_probs(vec![-1.0, -1.0]);
        sample.set_teacher_log_probs(vec![-0.5]);
        assert!(Blended::new(FixedGrader(0.0), 0.5)
            .scalar_rewards(&[sample])
            .is_err());
    }

    #[test]
    fn boxed_grader_matches_label() {
        let grader = BoxedAnswerGrader;
        assert_eq!(grader.grade(&answered("so \\boxed{ 12 }", "12")).unwrap(), 1.0);
        assert_eq!(grader.grade(&answered("\\boxed{13}", "12")).unwrap(), 0.0);
        assert_eq!(grader.grade(&answered("no answer", "12")).unwrap(), 0.0);
        assert!(grader.grade(&Sample::default().with_response("\\boxed{1}")).is_err());
    }

    #[test]
    fn last_boxed_handles_nesting() {
        assert_eq!(last_boxed("\\boxed{1} then \\boxed{\\frac{1}{2}}"), Some("\\frac{1}{2}"));
        assert_eq!(last_boxed("\\boxed{unclosed"), None);
        assert_eq!(last_boxed("plain"), None);
    }

    #[test]
    fn build_policy_follows_config() {
        let mut config = RewardConfig::default();
        assert_eq!(build_policy(&config).name(), "pure_distillation");
        config.policy = RewardPolicyKind::Task;
        assert_eq!(build_policy(&config).name(), "task");
        config.policy = RewardPolicyKind::Blended;
        assert_eq!(build_policy(&config).name(), "blended");
    }
}
