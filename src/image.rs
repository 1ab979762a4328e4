//! Image transcoding for the teacher's `image_data` field.
//!
//! The teacher accepts each image as an opaque string. [`DataUrlEncoder`]
//! produces `data:<mime>;base64,<payload>` URLs, which sglang-style servers
//! decode directly. Other encodings plug in through [`ImageEncoder`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{OpdError, Result};
use crate::sample::RawImage;

/// Maps one raw image to the payload format the teacher endpoint expects.
pub trait ImageEncoder: Send + Sync {
    fn encode(&self, image: &RawImage) -> Result<String>;
}

/// Encodes images as base64 data URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUrlEncoder;

impl ImageEncoder for DataUrlEncoder {
    fn encode(&self, image: &RawImage) -> Result<String> {
        if image.data.is_empty() {
            return Err(OpdError::ImageEncoding("image has no data".into()));
        }
        if !image.mime_type.starts_with("image/") {
            return Err(OpdError::ImageEncoding(format!(
                "unsupported MIME type '{}'",
                image.mime_type
            )));
        }
        Ok(format!(
            "data:{};base64,{}",
            image.mime_type,
            STANDARD.encode(&image.data)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_data_url() {
        let url = DataUrlEncoder.encode(&RawImage::png(b"abc".to_vec())).unwrap();
        assert_eq!(url, "data:image/png;base64,YWJj");
    }

    #[test]
    fn rejects_empty_image() {
        let err = DataUrlEncoder.encode(&RawImage::png(Vec::new())).unwrap_err();
        assert!(matches!(err, OpdError::ImageEncoding(_)));
    }

    #[test]
    fn rejects_non_image_mime() {
        let err = DataUrlEncoder
            .encode(&RawImage::new("text/plain", vec![1]))
            .unwrap_err();
        assert!(err.to_string().contains("text/plain"));
    }
}
