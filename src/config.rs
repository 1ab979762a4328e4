use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OpdError, Result};

/// Environment variable that overrides [`TeacherConfig::rm_url`].
pub const RM_URL_ENV: &str = "OPD_RM_URL";

/// Complete configuration for the distillation reward hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpdConfig {
    #[serde(default)]
    pub teacher: TeacherConfig,
    #[serde(default)]
    pub reward: RewardConfig,
    #[serde(default)]
    pub rollout: RolloutConfig,
}

/// Teacher endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherConfig {
    /// URL of the teacher's generate endpoint (default:
    /// `http://127.0.0.1:30000/generate`).
    pub rm_url: String,
}

/// Which scalar reward the trainer receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardPolicyKind {
    /// Every sample scores 0.0; the signal comes from the KL penalty.
    #[default]
    PureDistillation,
    /// Task-correctness score from a grader.
    Task,
    /// Weighted mix of task score and teacher agreement.
    Blended,
}

/// Scalar reward configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    #[serde(default)]
    pub policy: RewardPolicyKind,
    /// Weight of the task score in the blended policy (default: 0.5).
    #[serde(default = "default_task_weight")]
    pub task_weight: f64,
}

/// Fan-out configuration for scoring a rollout batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutConfig {
    /// Maximum number of teacher requests in flight (default: 32).
    pub max_concurrency: usize,
}

fn default_task_weight() -> f64 {
    0.5
}

impl Default for TeacherConfig {
    fn default() -> Self {
        Self {
            rm_url: "http://127.0.0.1:30000/generate".into(),
        }
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            policy: RewardPolicyKind::PureDistillation,
            task_weight: default_task_weight(),
        }
    }
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self { max_concurrency: 32 }
    }
}

impl OpdConfig {
    /// Load a configuration from a JSON file. Missing sections take their
    /// defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| OpdError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Apply overrides from the environment.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(RM_URL_ENV) {
            if !url.is_empty() {
                self.teacher.rm_url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.teacher.rm_url.trim().is_empty() {
            return Err(OpdError::Config("teacher.rm_url must not be empty".into()));
        }
        if self.rollout.max_concurrency == 0 {
            return Err(OpdError::Config(
                "rollout.max_concurrency must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.reward.task_weight) {
            return Err(OpdError::Config(format!(
                "reward.task_weight must be in [0, 1], got {}",
                self.reward.task_weight
            )));
        }
        Ok(())
    }
}
