//! HTTP client for the teacher inference endpoint.
//!
//! [`TeacherClient::score`] sends one rollout to the teacher and returns its
//! per-position log-probabilities. Each call builds its own
//! [`reqwest::Client`], so no connection state is shared between samples and
//! many calls can run concurrently.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::TeacherConfig;
use crate::error::{OpdError, Result};
use crate::image::{DataUrlEncoder, ImageEncoder};
use crate::sample::Sample;

use super::request::ScoreRequest;
use super::response::TeacherResponse;

/// Client for a teacher endpoint that scores token sequences.
#[derive(Clone)]
pub struct TeacherClient {
    url: String,
    encoder: Arc<dyn ImageEncoder>,
}

impl std::fmt::Debug for TeacherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeacherClient")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl TeacherClient {
    /// Create a client that posts to `url` and encodes images as data URLs.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_encoder(url, Arc::new(DataUrlEncoder))
    }

    /// Create a client with a custom image encoder.
    pub fn with_encoder(url: impl Into<String>, encoder: Arc<dyn ImageEncoder>) -> Self {
        Self {
            url: url.into(),
            encoder,
        }
    }

    pub fn from_config(config: &TeacherConfig) -> Self {
        Self::new(config.rm_url.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the request body for `sample` without sending it.
    pub fn build_request(&self, sample: &Sample) -> Result<ScoreRequest> {
        ScoreRequest::for_sample(sample, self.encoder.as_ref())
    }

    /// Score `sample` with the teacher.
    ///
    /// Issues a single `POST` carrying the full token sequence and any
    /// images. A non-success status is returned as [`OpdError::Status`]; on
    /// success the parsed body is returned as-is.
    pub async fn score(&self, sample: &Sample) -> Result<TeacherResponse> {
        let request = self.build_request(sample)?;
        debug!(
            url = %self.url,
            num_tokens = request.input_ids.len(),
            response_length = sample.response_length,
            num_images = request.image_data.as_ref().map_or(0, Vec::len),
            "sending teacher scoring request"
        );

        // Session lives for exactly this call.
        let http = reqwest::Client::builder().build()?;
        let resp = http.post(&self.url).json(&request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), url = %self.url, "teacher request rejected");
            return Err(OpdError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        let response: TeacherResponse =
            serde_json::from_slice(&bytes).map_err(|e| OpdError::Decode(e.to_string()))?;

        debug!(
            num_logprobs = response.input_token_logprobs().map_or(0, <[_]>::len),
            "teacher scoring succeeded"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::RawImage;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::Mutex;

    /// Spawn a fake teacher on an ephemeral port and return its URL.
    async fn spawn_teacher(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/generate")
    }

    /// A teacher that scores every input position with `-0.1 * position`.
    fn echo_teacher(seen: Arc<Mutex<Vec<serde_json::Value>>>) -> Router {
        Router::new().route(
            "/generate",
            post(move |Json(body): Json<serde_json::Value>| {
                let seen = seen.clone();
                async move {
                    let n = body["input_ids"].as_array().map_or(0, Vec::len);
                    seen.lock().unwrap().push(body);
                    let lps: Vec<serde_json::Value> = (0..n)
                        .map(|i| {
                            if i == 0 {
                                serde_json::json!([null, i, null])
                            } else {
                                serde_json::json!([-0.1 * i as f64, i, null])
                            }
                        })
                        .collect();
                    Json(serde_json::json!({
                        "text": "",
                        "meta_info": {"prompt_tokens": n, "input_token_logprobs": lps}
                    }))
                }
            }),
        )
    }

    #[tokio::test]
    async fn score_posts_tokens_and_parses_logprobs() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let url = spawn_teacher(echo_teacher(seen.clone())).await;
        let client = TeacherClient::new(url);

        let sample = Sample::new(vec![10, 11, 12, 13], 2);
        let resp = client.score(&sample).await.unwrap();

        let lps = resp.input_token_logprobs().unwrap();
        assert_eq!(lps.len(), 4);
        assert_eq!(lps[0].logprob, None);
        assert!((lps[3].logprob.unwrap() - (-0.3)).abs() < 1e-9);

        let bodies = seen.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["input_ids"], serde_json::json!([10, 11, 12, 13]));
        assert_eq!(bodies[0]["return_logprob"], true);
        assert!(bodies[0].get("image_data").is_none());
    }

    #[tokio::test]
    async fn score_sends_one_entry_per_image() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let url = spawn_teacher(echo_teacher(seen.clone())).await;
        let client = TeacherClient::new(url);

        let sample = Sample::new(vec![1, 2, 3], 1)
            .with_images(vec![RawImage::png(b"a".to_vec()), RawImage::png(b"b".to_vec())]);
        client.score(&sample).await.unwrap();

        let bodies = seen.lock().unwrap();
        let images = bodies[0]["image_data"].as_array().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0], "data:image/png;base64,YQ==");
        assert_eq!(images[1], "data:image/png;base64,Yg==");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let app = Router::new().route(
            "/generate",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let url = spawn_teacher(app).await;
        let client = TeacherClient::new(url);

        let err = client.score(&Sample::new(vec![1, 2], 1)).await.unwrap_err();
        match err {
            OpdError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let app = Router::new().route("/generate", post(|| async { "not json" }));
        let url = spawn_teacher(app).await;
        let client = TeacherClient::new(url);

        let err = client.score(&Sample::new(vec![1, 2], 1)).await.unwrap_err();
        assert!(matches!(err, OpdError::Decode(_)));
    }
}
