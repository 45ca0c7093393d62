use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::colors::{faction_color, parse_hex};
use crate::region::RegionDef;
use crate::snapshot::FactionId;

/// Declared size of a symbol template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolSize {
    pub width: f64,
    pub height: f64,
}

/// Drawing parameters for one order kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDrawing {
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    /// Distance the line stops short of a unit symbol.
    #[serde(default)]
    pub highlight_offset: f64,
    #[serde(default)]
    pub marker: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub dashed: bool,
}

fn default_stroke_width() -> f64 {
    2.0
}

impl Default for OrderDrawing {
    fn default() -> Self {
        Self {
            stroke_width: default_stroke_width(),
            highlight_offset: 0.0,
            marker: None,
            filter: None,
            dashed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionDef {
    pub id: FactionId,
    #[serde(default)]
    pub name: Option<String>,
    /// `#rrggbb`; falls back to a hashed color when absent or malformed.
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomBounds {
    fn default() -> Self {
        Self { min: 1.0, max: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelSupport {
    #[serde(default)]
    pub brief: bool,
    #[serde(default)]
    pub full: bool,
}

/// Static description of a map: everything the renderer needs that does not
/// change from turn to turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapDescriptor {
    #[serde(default)]
    pub name: String,
    pub regions: Vec<RegionDef>,
    #[serde(default)]
    pub factions: Vec<FactionDef>,
    /// Template id -> declared size. Templates without an entry are sized
    /// from the scene's own width/height attributes.
    #[serde(default)]
    pub symbols: HashMap<String, SymbolSize>,
    /// Order kind name (`move`, `support`, ...) -> drawing parameters.
    #[serde(default)]
    pub order_drawing: HashMap<String, OrderDrawing>,
    #[serde(default)]
    pub zoom: ZoomBounds,
    #[serde(default)]
    pub labels: LabelSupport,
}

impl MapDescriptor {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn region(&self, name: &str) -> Option<&RegionDef> {
        self.regions.iter().find(|region| region.name == name)
    }

    pub fn faction_ids(&self) -> impl Iterator<Item = &FactionId> + '_ {
        self.factions.iter().map(|faction| &faction.id)
    }

    pub fn faction_rgb(&self, id: &FactionId) -> (u8, u8, u8) {
        self.factions
            .iter()
            .find(|faction| &faction.id == id)
            .and_then(|faction| faction.color.as_deref())
            .and_then(parse_hex)
            .unwrap_or_else(|| faction_color(id.as_str()))
    }

    pub fn drawing_for(&self, kind: &str) -> OrderDrawing {
        self.order_drawing.get(kind).cloned().unwrap_or_default()
    }
}
