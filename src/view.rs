//! View state projection for the presentation layer.
//!
//! [`ViewProjector`] folds connection status changes and decoded images into
//! the two status lines and the overlay image a renderer shows. It is a pure
//! mapping: a status event only touches the status line, an image event only
//! touches the image line and the image.
//!
//! | Event | Status line | Image line |
//! |---|---|---|
//! | `Connecting` | "Connecting..." | unchanged |
//! | `Connected` | "Connected" | unchanged |
//! | `SubscriptionFailed` | "Subscription Failed" | unchanged |
//! | `ConnectionFailed` | "Failed to connect" | unchanged |
//! | `Disconnected` | "Disconnected" | unchanged |
//! | image decoded | unchanged | "Image received and loaded" |

use serde::Serialize;
use std::sync::Arc;

use crate::codec::ImageResource;
use crate::types::ConnectionStatus;

/// Image line shown before the first image arrives
pub const WAITING_FOR_IMAGE: &str = "Waiting for image data...";

/// Image line shown once an image has been decoded
pub const IMAGE_LOADED: &str = "Image received and loaded";

/// Status line for a connection status
pub fn status_line(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connecting => "Connecting...",
        ConnectionStatus::Connected => "Connected",
        ConnectionStatus::SubscriptionFailed => "Subscription Failed",
        ConnectionStatus::ConnectionFailed => "Failed to connect",
        ConnectionStatus::Disconnected => "Disconnected",
    }
}

/// Input events of the projector
#[derive(Debug, Clone)]
pub enum ViewEvent {
    Status(ConnectionStatus),
    Image(Arc<ImageResource>),
}

/// State consumed by the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub status_text: &'static str,
    pub image_status_text: &'static str,
    pub current_image: Option<Arc<ImageResource>>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            status_text: status_line(ConnectionStatus::Connecting),
            image_status_text: WAITING_FOR_IMAGE,
            current_image: None,
        }
    }
}

impl ViewState {
    /// URI for the overlay renderer
    pub fn current_image_uri(&self) -> Option<&str> {
        self.current_image.as_deref().map(ImageResource::uri)
    }

    /// Owned, serialisable copy for hosts across a process boundary
    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            status_text: self.status_text.to_string(),
            image_status_text: self.image_status_text.to_string(),
            current_image_uri: self.current_image_uri().map(str::to_string),
        }
    }
}

/// Serialisable form of [`ViewState`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ViewSnapshot {
    pub status_text: String,
    pub image_status_text: String,
    #[serde(rename = "currentImageURI")]
    pub current_image_uri: Option<String>,
}

/// Folds view events into a [`ViewState`]
#[derive(Debug, Clone, Default)]
pub struct ViewProjector {
    state: ViewState,
}

impl ViewProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event and return the new state
    pub fn apply(&mut self, event: ViewEvent) -> &ViewState {
        match event {
            ViewEvent::Status(status) => self.state.status_text = status_line(status),
            ViewEvent::Image(image) => {
                self.state.image_status_text = IMAGE_LOADED;
                self.state.current_image = Some(image);
            }
        }
        &self.state
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }
}
