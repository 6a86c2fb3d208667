//! QR/image decode view support.
//!
//! The API ships a single image as a base64 string. [`decode_image`] turns it
//! back into bytes, and [`ObjectUrlRegistry`] hands out temporary `blob:` URLs
//! for those bytes. An [`ObjectUrl`] revokes itself when dropped, so whatever
//! owns it (the page frame) releases the image when it is torn down.

use crate::dom::{Element, Node};
use crate::model::QrPayload;
use crate::{Error, Result};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// Standard alphabet, padding optional
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded binary image with a sniffed MIME type
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl DecodedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        let mime = sniff_mime(&bytes);
        Self { bytes, mime }
    }

    /// SHA-256 of the image bytes, hex encoded
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Decode a base64 image payload.
///
/// ASCII whitespace is ignored and a leading `data:...;base64,` prefix is
/// stripped. An empty payload is a decode failure.
pub fn decode_image(payload: &str) -> Result<DecodedImage> {
    let body = match payload.find(";base64,") {
        Some(pos) if payload.starts_with("data:") => &payload[pos + ";base64,".len()..],
        _ => payload,
    };
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(Error::Decode("empty image payload".into()));
    }
    let bytes = LENIENT.decode(compact.as_bytes())?;
    Ok(DecodedImage::new(bytes))
}

pub fn decode_payload(payload: &QrPayload) -> Result<DecodedImage> {
    decode_image(&payload.base64_encoded_img)
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

#[derive(Default)]
struct RegistryInner {
    next: u64,
    blobs: HashMap<String, Arc<DecodedImage>>,
}

/// Issues and tracks temporary `blob:` URLs
#[derive(Clone, Default)]
pub struct ObjectUrlRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RegistryInner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Other("object URL registry lock poisoned".into()))
    }

    pub fn create(&self, image: DecodedImage) -> Result<ObjectUrl> {
        let mut inner = self.lock()?;
        inner.next += 1;
        let url = format!("blob:margatsni/{}-{}", inner.next, &image.digest()[..12]);
        inner.blobs.insert(url.clone(), Arc::new(image));
        log::debug!("created object URL {}", url);
        Ok(ObjectUrl { url, registry: self.clone() })
    }

    pub fn resolve(&self, url: &str) -> Option<Arc<DecodedImage>> {
        self.lock().ok()?.blobs.get(url).cloned()
    }

    /// Returns whether the URL was live
    pub fn revoke(&self, url: &str) -> bool {
        match self.lock() {
            Ok(mut inner) => inner.blobs.remove(url).is_some(),
            Err(_) => false,
        }
    }

    pub fn live_count(&self) -> usize {
        self.lock().map(|i| i.blobs.len()).unwrap_or(0)
    }
}

/// A live `blob:` URL; revoked on drop
pub struct ObjectUrl {
    url: String,
    registry: ObjectUrlRegistry,
}

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn image(&self) -> Option<Arc<DecodedImage>> {
        self.registry.resolve(&self.url)
    }
}

impl std::fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjectUrl").field(&self.url).finish()
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        if self.registry.revoke(&self.url) {
            log::debug!("revoked object URL {}", self.url);
        }
    }
}

/// `<img>` pointing at an object URL
pub fn image_node(url: &ObjectUrl) -> Node {
    Element::new("img").class("qr-image").attr("src", url.as_str()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn decode_round_trips_bytes() {
        let blob: Vec<u8> = (0..=255u8).chain(PNG_HEADER.iter().copied()).collect();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&blob);
        let decoded = decode_image(&encoded).unwrap();
        assert_eq!(decoded.bytes, blob);
    }

    #[test]
    fn decode_tolerates_whitespace_prefix_and_missing_padding() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(PNG_HEADER);
        let wrapped = format!("data:image/png;base64,{}\n{}", &encoded[..8], &encoded[8..]);
        assert_eq!(decode_image(&wrapped).unwrap().bytes, PNG_HEADER);

        let unpadded = base64::engine::general_purpose::STANDARD_NO_PAD.encode(b"ab");
        assert_eq!(decode_image(&unpadded).unwrap().bytes, b"ab");
    }

    #[test]
    fn invalid_payload_is_decode_failure() {
        assert!(matches!(decode_image("***"), Err(Error::Decode(_))));
        assert!(matches!(decode_image("  "), Err(Error::Decode(_))));
    }

    #[test]
    fn mime_is_sniffed() {
        assert_eq!(DecodedImage::new(PNG_HEADER.to_vec()).mime, "image/png");
        assert_eq!(DecodedImage::new(vec![0xFF, 0xD8, 0xFF, 0xE0]).mime, "image/jpeg");
        assert_eq!(DecodedImage::new(b"GIF89a....".to_vec()).mime, "image/gif");
        assert_eq!(DecodedImage::new(b"RIFF\0\0\0\0WEBPVP8 ".to_vec()).mime, "image/webp");
        assert_eq!(DecodedImage::new(vec![1, 2, 3]).mime, "image/png");
    }

    #[test]
    fn object_url_is_revoked_on_drop() {
        let registry = ObjectUrlRegistry::new();
        let url = registry.create(DecodedImage::new(vec![1, 2, 3])).unwrap();
        let name = url.as_str().to_string();
        assert!(name.starts_with("blob:margatsni/1-"));
        assert_eq!(registry.live_count(), 1);
        assert_eq!(url.image().unwrap().bytes, vec![1, 2, 3]);

        drop(url);
        assert_eq!(registry.live_count(), 0);
        assert!(registry.resolve(&name).is_none());
    }
}
