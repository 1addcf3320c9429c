//! Node styling.

use super::NodeKind;
use peniko::Color;
use serde::{Deserialize, Serialize};

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`. The leading `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 16 + v;
                }
                Some(Self::rgb(out[0], out[1], out[2]))
            }
            6 => Some(Self::rgb(
                channel(hex.get(0..2)?)?,
                channel(hex.get(2..4)?)?,
                channel(hex.get(4..6)?)?,
            )),
            8 => Some(Self::new(
                channel(hex.get(0..2)?)?,
                channel(hex.get(2..4)?)?,
                channel(hex.get(4..6)?)?,
                channel(hex.get(6..8)?)?,
            )),
            _ => None,
        }
    }

    /// Format as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Fill and border of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStyle {
    /// Fill color (None = no fill).
    pub fill: Option<SerializableColor>,
    /// Border color (None = no border).
    pub border: Option<SerializableColor>,
    #[serde(default = "default_border_width")]
    pub border_width: f64,
    #[serde(default = "SerializableColor::black")]
    pub text_color: SerializableColor,
}

fn default_border_width() -> f64 {
    1.0
}

impl Default for NodeStyle {
    fn default() -> Self {
        Self {
            fill: Some(SerializableColor::white()),
            border: Some(SerializableColor::rgb(0xd0, 0xd0, 0xd0)),
            border_width: default_border_width(),
            text_color: SerializableColor::black(),
        }
    }
}

impl NodeStyle {
    /// Default style for a newly placed node of the given kind.
    pub fn for_kind(kind: NodeKind) -> Self {
        let fill = match kind {
            NodeKind::Note => Some(SerializableColor::rgb(0xff, 0xf1, 0x76)),
            NodeKind::Opportunity => Some(SerializableColor::rgb(0xc8, 0xe6, 0xc9)),
            NodeKind::Risk => Some(SerializableColor::rgb(0xff, 0xcd, 0xd2)),
            NodeKind::ActionItem => Some(SerializableColor::rgb(0xbb, 0xde, 0xfb)),
            NodeKind::Frame => Some(SerializableColor::new(0xf5, 0xf5, 0xf5, 0x80)),
            NodeKind::Connector | NodeKind::FreehandDrawing | NodeKind::TextBlock => None,
            _ => Some(SerializableColor::white()),
        };
        let border = match kind {
            NodeKind::Note | NodeKind::TextBlock | NodeKind::FreehandDrawing => None,
            NodeKind::Connector => Some(SerializableColor::rgb(0x42, 0x42, 0x42)),
            _ => Some(SerializableColor::rgb(0xd0, 0xd0, 0xd0)),
        };
        Self {
            fill,
            border,
            ..Self::default()
        }
    }

    /// Get the fill color as a peniko Color.
    pub fn fill_color(&self) -> Option<Color> {
        self.fill.map(Into::into)
    }

    /// Get the border color as a peniko Color.
    pub fn border_color(&self) -> Option<Color> {
        self.border.map(Into::into)
    }
}
