//! Typed messages crossing the host boundary.
//!
//! The host page delivers [`HostEvent`]s to the runtime and receives
//! [`UiEvent`]s back; nothing else is shared between them.

use serde::Serialize;

use crate::canvas::CanvasSize;
use crate::cart::CartForm;
use crate::types::PageContext;
use crate::upload::UploadedFile;

/// Which host signal reported a variant change. All kinds are coalesced
/// by the same debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantSignalKind {
    /// The theme's explicit variant update event.
    VariantUpdate,
    RadioChange,
    SwatchClick,
    /// Any click inside the product media region.
    MediaClick,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Drag { dx: f64, dy: f64 },
    MoveTo { x: f64, y: f64 },
    Resize { width: f64, height: f64 },
    Pinch { factor: f64 },
    Rotate { degrees: f64 },
    SetRotation { degrees: f64 },
    Select,
}

#[derive(Debug, Clone)]
pub enum HostEvent {
    VariantChanged {
        kind: VariantSignalKind,
        page: PageContext,
    },
    FileSelected(UploadedFile),
    RemoveDesign,
    CenterDesign,
    /// Escape pressed: detach handles from the overlay.
    ClearSelection,
    Gesture(Gesture),
    Resize(CanvasSize),
    SubmitRequested(CartForm),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiEvent {
    Notify(Notification),
    /// Submit controls disabled (`true`) or re-enabled.
    SubmitBusy { busy: bool },
    /// Design controls shown; upload controls take the opposite state.
    DesignControls { visible: bool },
    BackgroundChanged { url: String },
    CartUpdated { key: Option<String> },
    ReloadRequested,
}
