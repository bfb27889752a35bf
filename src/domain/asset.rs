use serde::{Deserialize, Serialize};

pub type AssetId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Topside,
    Subsea,
    Separator,
    Mpfm,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Topside => "TOPSIDE",
            AssetKind::Subsea => "SUBSEA",
            AssetKind::Separator => "SEPARATOR",
            AssetKind::Mpfm => "MPFM",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "TOPSIDE" => Some(AssetKind::Topside),
            "SUBSEA" => Some(AssetKind::Subsea),
            "SEPARATOR" => Some(AssetKind::Separator),
            "MPFM" => Some(AssetKind::Mpfm),
            _ => None,
        }
    }
}

/// A measuring point (§3). Identity is the `tag`; `kind`/`bank`/`stream`/
/// `riser` are ancillary and, once seeded, never silently overwritten
/// (§4.D asset resolution rule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Option<AssetId>,
    pub tag: String,
    pub kind: AssetKind,
    pub bank: Option<String>,
    pub stream: Option<String>,
    pub riser: Option<String>,
}

impl Asset {
    pub fn new(tag: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            id: None,
            tag: tag.into(),
            kind,
            bank: None,
            stream: None,
            riser: None,
        }
    }
}
