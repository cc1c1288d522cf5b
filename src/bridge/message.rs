//! Bridge wire format
//!
//! One UTF-8 JSON object per message, discriminated by `type`. Messages are
//! parsed once at the channel boundary into closed enums.

use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    /// Finger moved left: advance
    Left,
    /// Finger moved right: go back
    Right,
}

/// On-screen bounds of a tapped element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rendering surface → host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SurfaceMessage {
    #[serde(rename = "bridgeReady")]
    BridgeReady,

    #[serde(rename = "imageClick")]
    ImageClick {
        src: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        geometry: Option<Geometry>,
    },

    #[serde(rename = "linkClick")]
    LinkClick { href: String },

    /// First visible anchored element
    #[serde(rename = "progress")]
    Progress { id: String, index: usize, top: f64 },

    #[serde(rename = "tap")]
    Tap,

    #[serde(rename = "swipe-end")]
    SwipeEnd { direction: SwipeDirection },

    #[serde(rename = "swipe-progress")]
    SwipeProgress {
        #[serde(rename = "deltaX")]
        delta_x: f64,
    },

    #[serde(rename = "swipe-cancel")]
    SwipeCancel,
}

/// Host → rendering surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    #[serde(rename = "setStyles")]
    SetStyles { css: String },

    /// Restore a reading position by element id
    #[serde(rename = "scrollTo")]
    ScrollTo { id: String },

    /// Display a prepared chapter
    #[serde(rename = "loadChapter")]
    LoadChapter { index: usize, url: String },
}

impl SurfaceMessage {
    /// Parse one raw message from the surface
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw.trim())
            .map_err(|e| ReaderError::BridgeProtocol(format!("{}: {}", e, truncate(raw))))
    }

    pub fn encode(&self) -> Result<String> {
        encode(self)
    }
}

impl HostMessage {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw.trim())
            .map_err(|e| ReaderError::BridgeProtocol(format!("{}: {}", e, truncate(raw))))
    }

    /// Single-line JSON
    pub fn encode(&self) -> Result<String> {
        encode(self)
    }
}

fn encode<T: Serialize>(message: &T) -> Result<String> {
    serde_json::to_string(message).map_err(|e| ReaderError::BridgeProtocol(e.to_string()))
}

fn truncate(raw: &str) -> &str {
    match raw.char_indices().nth(80) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_surface_messages() {
        assert_eq!(
            SurfaceMessage::parse(r#"{"type":"bridgeReady"}"#).unwrap(),
            SurfaceMessage::BridgeReady
        );
        assert_eq!(
            SurfaceMessage::parse(r#"{"type":"swipe-end","direction":"left"}"#).unwrap(),
            SurfaceMessage::SwipeEnd {
                direction: SwipeDirection::Left
            }
        );
        assert_eq!(
            SurfaceMessage::parse(r#"{"type":"swipe-progress","deltaX":-42.5}"#).unwrap(),
            SurfaceMessage::SwipeProgress { delta_x: -42.5 }
        );
        assert_eq!(
            SurfaceMessage::parse(r#"{"type":"progress","id":"p12","index":3,"top":812}"#)
                .unwrap(),
            SurfaceMessage::Progress {
                id: "p12".into(),
                index: 3,
                top: 812.0
            }
        );
    }

    #[test]
    fn test_image_click_optional_fields() {
        let bare = SurfaceMessage::parse(r#"{"type":"imageClick","src":"a.png"}"#).unwrap();
        assert_eq!(
            bare,
            SurfaceMessage::ImageClick {
                src: "a.png".into(),
                id: None,
                geometry: None
            }
        );

        let full = SurfaceMessage::parse(
            r#"{"type":"imageClick","src":"a.png","id":"fig1","geometry":{"x":1,"y":2,"width":30,"height":40}}"#,
        )
        .unwrap();
        assert!(matches!(
            full,
            SurfaceMessage::ImageClick { geometry: Some(Geometry { width, .. }), .. } if width == 30.0
        ));
    }

    #[test]
    fn test_unknown_and_malformed_rejected() {
        for raw in [
            r#"{"type":"teleport"}"#,
            r#"{"direction":"left"}"#,
            r#"{"type":"swipe-end","direction":"up"}"#,
            "not json",
            "toggleHeader",
        ] {
            assert!(
                matches!(SurfaceMessage::parse(raw), Err(ReaderError::BridgeProtocol(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_host_message_encoding_is_single_line() {
        let msg = HostMessage::SetStyles {
            css: "body {\n  color: red;\n}".to_string(),
        };
        let encoded = msg.encode().unwrap();
        assert!(!encoded.contains('\n'));
        assert!(encoded.starts_with(r#"{"type":"setStyles""#));
        assert_eq!(HostMessage::parse(&encoded).unwrap(), msg);
    }
}
