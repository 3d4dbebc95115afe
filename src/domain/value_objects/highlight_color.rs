use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// ハイライトの固定パレット（先頭が既定色）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Pink,
    Orange,
    Purple,
}

impl HighlightColor {
    pub const PALETTE: [HighlightColor; 6] = [
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Blue,
        HighlightColor::Pink,
        HighlightColor::Orange,
        HighlightColor::Purple,
    ];

    pub fn as_hex(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "#fff59d",
            HighlightColor::Green => "#a5d6a7",
            HighlightColor::Blue => "#90caf9",
            HighlightColor::Pink => "#f48fb1",
            HighlightColor::Orange => "#ffcc80",
            HighlightColor::Purple => "#ce93d8",
        }
    }

    pub fn from_hex(value: &str) -> Result<Self, String> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::PALETTE
            .into_iter()
            .find(|color| color.as_hex() == normalized)
            .ok_or_else(|| format!("Unsupported highlight color: {value}"))
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl Serialize for HighlightColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_hex())
    }
}

impl<'de> Deserialize<'de> for HighlightColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        HighlightColor::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}
