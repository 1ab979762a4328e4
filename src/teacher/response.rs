//! Typed teacher response.
//!
//! The teacher answers a scoring request with a JSON object whose
//! `meta_info.input_token_logprobs` holds one `[logprob, token_id, text]`
//! tuple per input position. Fields this crate does not interpret are kept in
//! `extra` so the response round-trips unmodified.

use std::fmt;

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The teacher's full scoring response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeacherResponse {
    /// Generated text (empty for zero-token scoring requests).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Server-side metadata, including the token log-probabilities.
    #[serde(default)]
    pub meta_info: MetaInfo,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TeacherResponse {
    /// Per-position log-prob tuples for the input sequence, if the server
    /// returned them.
    pub fn input_token_logprobs(&self) -> Option<&[TokenLogProb]> {
        self.meta_info.input_token_logprobs.as_deref()
    }
}

/// The `meta_info` block of a teacher response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<usize>,
    /// One entry per input position, in token order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token_logprobs: Option<Vec<TokenLogProb>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One `[logprob, token_id, text]` tuple.
///
/// The log-probability is `None` for positions the server cannot score (the
/// first position has no preceding token). Elements past `text` are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenLogProb {
    pub logprob: Option<f64>,
    pub token_id: Option<i64>,
    /// Decoded token text, present when the server was asked for it.
    pub text: Option<String>,
}

impl Serialize for TokenLogProb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.logprob)?;
        seq.serialize_element(&self.token_id)?;
        seq.serialize_element(&self.text)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for TokenLogProb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TupleVisitor;

        impl<'de> Visitor<'de> for TupleVisitor {
            type Value = TokenLogProb;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a [logprob, token_id, ...] tuple")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<TokenLogProb, A::Error> {
                let logprob: Option<f64> = seq
                    .next_element()?
                    .ok_or_else(|| <A::Error as de::Error>::invalid_length(0, &self))?;
                let token_id: Option<i64> = seq.next_element()?.flatten();
                let text: Option<String> = seq.next_element()?.flatten();
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(TokenLogProb {
                    logprob,
                    token_id,
                    text,
                })
            }
        }

        deserializer.deserialize_seq(TupleVisitor)
    }
}
