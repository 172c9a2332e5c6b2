//! Payload codec: turns a message body into a renderable image resource.
//!
//! Message bodies are base64-encoded images. The codec wraps the text into a
//! `data:` URI with a fixed media type and performs no validation of the
//! image itself. A corrupt body still produces an [`ImageResource`]; the
//! renderer shows it as a broken frame and the next message replaces it.
//!
//! ```rust
//! use heatcast::codec;
//!
//! let image = codec::decode(b"iVBORw0KGgo=");
//! assert_eq!(image.uri(), "data:image/png;base64,iVBORw0KGgo=");
//! assert_eq!(image.decoded_bytes().unwrap(), b"\x89PNG\r\n\x1a\n");
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{HeatcastError, Result};

/// Media type used when none is configured
pub const DEFAULT_MEDIA_TYPE: &str = "image/png";

/// A decoded, renderable image addressed by its `data:` URI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResource {
    uri: String,
    media_type: String,
    received_at: SystemTime,
}

impl ImageResource {
    /// Display URI (`data:<media type>;base64,<body>`)
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Media type embedded in the URI
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// When the payload was decoded
    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// The base64 body carried by the URI
    pub fn body(&self) -> &str {
        self.uri.split_once(',').map(|(_, body)| body).unwrap_or_default()
    }

    /// Decode the base64 body back into the raw image bytes.
    ///
    /// The live pipeline never calls this; it exists for consumers that want
    /// to inspect or persist a frame.
    pub fn decoded_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.body())
            .map_err(|e| HeatcastError::Decode { details: e.to_string() })
    }
}

/// Wraps message bodies into image resources of one media type
#[derive(Debug, Clone)]
pub struct PayloadCodec {
    media_type: String,
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MEDIA_TYPE)
    }
}

impl PayloadCodec {
    /// Create a codec for the given media type
    pub fn new(media_type: impl Into<String>) -> Self {
        Self { media_type: media_type.into() }
    }

    /// Media type of produced resources
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Wrap a base64 message body into an image resource.
    ///
    /// Never fails. Bytes that are not UTF-8 are replaced lossily and end
    /// up as an undecodable frame.
    pub fn decode(&self, raw: &[u8]) -> ImageResource {
        let body = String::from_utf8_lossy(raw);
        let mut uri = String::with_capacity(self.media_type.len() + body.len() + 13);
        uri.push_str("data:");
        uri.push_str(&self.media_type);
        uri.push_str(";base64,");
        uri.push_str(&body);

        ImageResource { uri, media_type: self.media_type.clone(), received_at: SystemTime::now() }
    }
}

/// Decode with the default `image/png` codec
pub fn decode(raw: &[u8]) -> ImageResource {
    PayloadCodec::default().decode(raw)
}
