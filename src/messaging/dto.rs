//! Data Transfer Objects for cross-context messages

use crate::volume::DEFAULT_GAIN;
use serde::{Deserialize, Serialize};

// =============================================================================
// → page
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageRequest {
    GetVolume,
    /// `volume` is a linear gain
    SetVolume { volume: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeResponse {
    pub success: bool,
    pub volume: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VolumeResponse {
    pub fn ok(volume: f32) -> Self {
        Self {
            success: true,
            volume,
            error: None,
        }
    }

    pub fn failed(volume: f32, error: impl Into<String>) -> Self {
        Self {
            success: false,
            volume,
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// page → coordinator
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum CoordinatorRequest {
    GetSavedVolume,
    /// `volume` is a linear gain
    SaveVolume { volume: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedVolumeResponse {
    #[serde(default = "default_gain")]
    pub volume: f32,
}

fn default_gain() -> f32 {
    DEFAULT_GAIN
}

impl Default for SavedVolumeResponse {
    fn default() -> Self {
        Self {
            volume: DEFAULT_GAIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinatorResponse {
    Ack(AckResponse),
    SavedVolume(SavedVolumeResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let req = PageRequest::SetVolume { volume: 2.5 };
        assert_eq!(
            serde_json::to_value(req).unwrap(),
            json!({ "action": "setVolume", "volume": 2.5 })
        );
        let req: CoordinatorRequest =
            serde_json::from_value(json!({ "action": "getSavedVolume" })).unwrap();
        assert_eq!(req, CoordinatorRequest::GetSavedVolume);
    }

    #[test]
    fn test_response_omits_empty_error() {
        let value = serde_json::to_value(VolumeResponse::ok(1.0)).unwrap();
        assert_eq!(value, json!({ "success": true, "volume": 1.0 }));

        let value = serde_json::to_value(VolumeResponse::failed(1.0, "bad")).unwrap();
        assert_eq!(value["error"], "bad");
    }

    #[test]
    fn test_coordinator_response_untagged() {
        let ack: CoordinatorResponse = serde_json::from_value(json!({ "success": true })).unwrap();
        assert_eq!(ack, CoordinatorResponse::Ack(AckResponse { success: true }));

        let saved: CoordinatorResponse = serde_json::from_value(json!({ "volume": 2.0 })).unwrap();
        assert_eq!(
            saved,
            CoordinatorResponse::SavedVolume(SavedVolumeResponse { volume: 2.0 })
        );
    }
}
