//! Sample data types shared by the query and extraction stages.
//!
//! Samples are produced upstream by rollout generation. This crate only reads
//! them and annotates two fields: the raw teacher response (the "reward
//! value") and the trimmed teacher log-probabilities.

use serde::{Deserialize, Serialize};

use crate::teacher::TeacherResponse;

// ---------------------------------------------------------------------------
// Multimodal context
// ---------------------------------------------------------------------------

/// A raw image attached to a rollout.
///
/// The bytes are serialized as standard base64 so sample files stay plain JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImage {
    /// MIME type of the encoded bytes (e.g. `"image/png"`).
    pub mime_type: String,
    /// The encoded image file contents.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl RawImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Convenience constructor for PNG bytes.
    pub fn png(data: Vec<u8>) -> Self {
        Self::new("image/png", data)
    }
}

/// Multimodal inputs carried by a sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultimodalInputs {
    /// Images in the order they appear in the prompt.
    #[serde(default)]
    pub images: Vec<RawImage>,
}

// ---------------------------------------------------------------------------
// Sample
// ---------------------------------------------------------------------------

/// One student rollout.
///
/// `tokens` holds the full realized sequence (prompt followed by the
/// generated response); the last `response_length` ids are the response.
/// Image placeholder tokens are expanded by the teacher and are not part of
/// `tokens`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sample {
    /// Rendered prompt text.
    #[serde(default)]
    pub prompt: String,
    /// Decoded response text.
    #[serde(default)]
    pub response: String,
    /// Ground-truth answer, when the dataset provides one.
    #[serde(default)]
    pub label: Option<String>,
    /// Full token id sequence: prompt + response.
    pub tokens: Vec<u32>,
    /// Number of trailing tokens in `tokens` generated by the student.
    pub response_length: usize,
    /// Optional images and other multimodal context.
    #[serde(default)]
    pub multimodal_inputs: Option<MultimodalInputs>,
    /// Student log-probabilities of the response tokens, recorded at rollout
    /// time. Only needed by blended reward policies.
    #[serde(default)]
    pub rollout_log_probs: Option<Vec<f32>>,
    /// Raw teacher response stored by the query stage.
    #[serde(default)]
    reward: Option<TeacherResponse>,
    /// Teacher log-probabilities for the response tokens.
    #[serde(default)]
    teacher_log_probs: Option<Vec<f32>>,
}

impl Sample {
    /// Create a text-only sample from its token ids and response length.
    pub fn new(tokens: Vec<u32>, response_length: usize) -> Self {
        Self {
            tokens,
            response_length,
            ..Self::default()
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attach images, replacing any previously attached.
    pub fn with_images(mut self, images: Vec<RawImage>) -> Self {
        self.multimodal_inputs = Some(MultimodalInputs { images });
        self
    }

    pub fn with_rollout_log_probs(mut self, log_probs: Vec<f32>) -> Self {
        self.rollout_log_probs = Some(log_probs);
        self
    }

    /// Images attached to this sample, in prompt order. Empty for text-only
    /// samples.
    pub fn images(&self) -> &[RawImage] {
        self.multimodal_inputs
            .as_ref()
            .map(|mm| mm.images.as_slice())
            .unwrap_or(&[])
    }

    /// Number of prompt tokens in `tokens`.
    pub fn prompt_length(&self) -> usize {
        self.tokens.len().saturating_sub(self.response_length)
    }

    /// The raw teacher response previously stored for this sample.
    pub fn reward_value(&self) -> Option<&TeacherResponse> {
        self.reward.as_ref()
    }

    /// Store the raw teacher response for this sample.
    pub fn set_reward(&mut self, response: TeacherResponse) {
        self.reward = Some(response);
    }

    /// Teacher log-probabilities of the response tokens, once extracted.
    pub fn teacher_log_probs(&self) -> Option<&[f32]> {
        self.teacher_log_probs.as_deref()
    }

    /// Store the teacher log-probabilities for the response tokens.
    pub fn set_teacher_log_probs(&mut self, log_probs: Vec<f32>) {
        self.teacher_log_probs = Some(log_probs);
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
