//! Wire types for the segmentation service.
//!
//! Field names match the deployed JSON contract exactly; note the mixed
//! casing on [`PropagateRequest`] (`sessionId` next to `start_frame_index`),
//! which is what the service actually accepts.

use serde::{Deserialize, Serialize};

use crate::mask::rle::RleMask;

/// Sentinel token between messages of the streamed propagation response.
pub const FRAME_SEPARATOR: &str = "frameseparator";

/// `POST /create_session/` request.
#[derive(Clone, Debug, Serialize)]
pub struct CreateSessionRequest {
    pub s3_link: String,
}

/// `POST /create_session/` response: the session id plus every video frame
/// as a base64 JPEG.
#[derive(Clone, Debug, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub frames: Vec<String>,
}

/// `POST /add_new_points/` request: the full prompt set for one object on
/// one frame.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPointsRequest {
    pub session_id: String,
    pub frame_index: u64,
    pub object_id: u32,
    /// 0 = negative, 1 = positive; index-parallel with `points`.
    pub labels: Vec<u8>,
    pub points: Vec<[f64; 2]>,
    pub clear_old_points: bool,
    pub reset_state: bool,
}

/// `POST /add_new_points/` response.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPointsResponse {
    pub add_points: AddPointsBody,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPointsBody {
    #[serde(default)]
    pub frame_index: Option<u64>,
    pub rle_mask_list: Vec<PromptMask>,
}

/// One per-object mask in a prompt response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptMask {
    pub object_id: u32,
    pub rle_mask: RleMask,
}

/// `POST /propagate_in_video/` request.
#[derive(Clone, Debug, Serialize)]
pub struct PropagateRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub start_frame_index: u64,
}

/// One self-delimited message of the streamed propagation response: every
/// affected object's mask for a single frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameResult {
    pub frame_index: u64,
    pub results: Vec<ObjectMask>,
}

/// One per-object mask in a streamed frame message.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMask {
    pub object_id: u32,
    pub mask: RleMask,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_points_request_wire_names() {
        let req = AddPointsRequest {
            session_id: "s-1".into(),
            frame_index: 7,
            object_id: 2,
            labels: vec![1, 0],
            points: vec![[0.5, 0.5], [0.1, 0.9]],
            clear_old_points: true,
            reset_state: false,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "sessionId": "s-1",
                "frameIndex": 7,
                "objectId": 2,
                "labels": [1, 0],
                "points": [[0.5, 0.5], [0.1, 0.9]],
                "clearOldPoints": true,
                "resetState": false,
            })
        );
    }

    #[test]
    fn propagate_request_mixes_casing_like_the_service() {
        let req = PropagateRequest {
            session_id: "s-1".into(),
            start_frame_index: 0,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"sessionId": "s-1", "start_frame_index": 0})
        );
    }

    #[test]
    fn add_points_response_parses() {
        let raw = serde_json::json!({
            "addPoints": {
                "frameIndex": 0,
                "rleMaskList": [
                    {"objectId": 0, "rleMask": {"size": [2, 2], "counts": [1, 1, 2]}}
                ]
            }
        });
        let resp: AddPointsResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(resp.add_points.rle_mask_list.len(), 1);
        assert_eq!(resp.add_points.rle_mask_list[0].object_id, 0);
        assert_eq!(resp.add_points.rle_mask_list[0].rle_mask.size, (2, 2));
    }

    #[test]
    fn frame_result_parses() {
        let raw = serde_json::json!({
            "frameIndex": 12,
            "results": [
                {"objectId": 1, "mask": {"size": [4, 4], "counts": [0, 16]}}
            ]
        });
        let fr: FrameResult = serde_json::from_value(raw).unwrap();
        assert_eq!(fr.frame_index, 12);
        assert_eq!(fr.results[0].object_id, 1);
    }
}
