//! Inbound client control frames.

use crate::state::ImageAttachment;
use serde::{Deserialize, Serialize};

/// The closed set of frames a client may send over the session channel.
///
/// Unknown `type` values fail deserialization; the handler surfaces those
/// as per-channel errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    GenerateAll,
    Preview,
    Deploy,
    CaptureScreenshot,
    StopGeneration,
    ResumeGeneration,
    UserSuggestion {
        text: String,
        #[serde(default)]
        images: Vec<ImageAttachment>,
    },
    ClearConversation,
    GetConversationState,
    GetModelConfigs,
    GithubExport,
}

impl ControlFrame {
    /// Parse a raw client frame.
    pub fn parse(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| format!("invalid control frame: {e}"))
    }
}
