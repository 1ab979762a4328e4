//! Teacher query stage.
//!
//! - [`request::ScoreRequest`] -- the scoring request built from a sample.
//! - [`response::TeacherResponse`] -- the typed teacher response.
//! - [`client::TeacherClient`] -- sends one request per sample.

pub mod client;
pub mod request;
pub mod response;

pub use client::TeacherClient;
pub use request::{SamplingParams, ScoreRequest};
pub use response::{MetaInfo, TeacherResponse, TokenLogProb};
