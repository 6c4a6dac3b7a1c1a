//! Profile picture intake: base64 payloads from JSON bodies are decoded,
//! sniffed and written to picture storage under a fresh key.

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use image::ImageFormat;
use uuid::Uuid;
use validator::ValidationError;

use crate::app::error::field_error;
use crate::infra::storage::PictureStore;

const KEY_PREFIX: &str = "profile-pictures";

#[derive(Debug, Clone)]
pub struct DecodedPicture {
    pub bytes: Bytes,
    pub content_type: &'static str,
    pub extension: &'static str,
}

/// Accepts raw base64 or a `data:<mime>;base64,` URL.
pub fn decode_picture(encoded: &str, max_bytes: usize) -> Result<DecodedPicture, ValidationError> {
    let payload = match encoded.split_once("base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => encoded,
    };

    let bytes = STANDARD
        .decode(payload.trim().as_bytes())
        .map_err(|_| field_error("base64", "profile_picture must be base64 encoded"))?;
    if bytes.is_empty() {
        return Err(field_error("image", "profile_picture must be an image"));
    }
    if bytes.len() > max_bytes {
        return Err(field_error(
            "max",
            format!("profile_picture must not be larger than {} kilobytes", max_bytes / 1024),
        ));
    }

    let (content_type, extension) = match image::guess_format(&bytes) {
        Ok(ImageFormat::Jpeg) => ("image/jpeg", "jpg"),
        Ok(ImageFormat::Png) => ("image/png", "png"),
        Ok(ImageFormat::WebP) => ("image/webp", "webp"),
        _ => {
            return Err(field_error(
                "mimes",
                "profile_picture must be a file of type: jpeg, png, webp",
            ))
        }
    };

    Ok(DecodedPicture {
        bytes: Bytes::from(bytes),
        content_type,
        extension,
    })
}

/// Stores the picture and returns its key.
pub async fn store_picture(pictures: &dyn PictureStore, picture: DecodedPicture) -> Result<String> {
    let key = format!("{}/{}.{}", KEY_PREFIX, Uuid::new_v4(), picture.extension);
    pictures.put(&key, picture.content_type, picture.bytes).await?;
    Ok(key)
}
