use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Point in map (scene) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Named sub-location of a coastal region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Coast {
    #[serde(rename = "nc")]
    North,
    #[serde(rename = "sc")]
    South,
    #[serde(rename = "ec")]
    East,
    #[serde(rename = "wc")]
    West,
}

impl Coast {
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Coast::North => "nc",
            Coast::South => "sc",
            Coast::East => "ec",
            Coast::West => "wc",
        }
    }
}

impl fmt::Display for Coast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// Placement points of a region as declared by the map descriptor.
///
/// Any point may be missing; the renderer decides at load time whether a
/// missing point is fatal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Anchors {
    #[serde(default)]
    pub unit: Option<Point>,
    #[serde(default)]
    pub dislodged: Option<Point>,
    #[serde(default)]
    pub supply_center: Option<Point>,
}

/// Unit/dislodged placement for one coast of a coastal region.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoastAnchors {
    #[serde(default)]
    pub unit: Option<Point>,
    #[serde(default)]
    pub dislodged: Option<Point>,
}

/// Static definition of one map region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDef {
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub supply_center: bool,
    #[serde(default = "default_land")]
    pub land: bool,
    #[serde(default)]
    pub anchors: Anchors,
    #[serde(default)]
    pub coasts: HashMap<Coast, CoastAnchors>,
    /// Id of the pre-built highlight element. Defaults to `_<name>`.
    #[serde(default)]
    pub highlight_id: Option<String>,
}

fn default_land() -> bool {
    true
}

impl RegionDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: None,
            supply_center: false,
            land: true,
            anchors: Anchors::default(),
            coasts: HashMap::new(),
            highlight_id: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.name)
    }

    pub fn highlight_element_id(&self) -> String {
        self.highlight_id
            .clone()
            .unwrap_or_else(|| format!("_{}", self.name))
    }

    /// Unit placement, preferring the coast variant when one is declared.
    pub fn unit_point(&self, coast: Option<Coast>) -> Option<Point> {
        coast
            .and_then(|c| self.coasts.get(&c))
            .and_then(|anchors| anchors.unit)
            .or(self.anchors.unit)
    }

    /// Dislodged-unit placement, preferring the coast variant when one is declared.
    pub fn dislodged_point(&self, coast: Option<Coast>) -> Option<Point> {
        coast
            .and_then(|c| self.coasts.get(&c))
            .and_then(|anchors| anchors.dislodged)
            .or(self.anchors.dislodged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coastal() -> RegionDef {
        let mut region = RegionDef::new("spa");
        region.anchors.unit = Some(Point::new(100.0, 200.0));
        region.anchors.dislodged = Some(Point::new(110.0, 210.0));
        region.coasts.insert(
            Coast::North,
            CoastAnchors {
                unit: Some(Point::new(90.0, 150.0)),
                dislodged: None,
            },
        );
        region
    }

    #[test]
    fn coast_variant_wins_over_default_anchor() {
        let region = coastal();
        assert_eq!(
            region.unit_point(Some(Coast::North)),
            Some(Point::new(90.0, 150.0))
        );
        assert_eq!(region.unit_point(None), Some(Point::new(100.0, 200.0)));
    }

    #[test]
    fn missing_coast_variant_falls_back_to_default() {
        let region = coastal();
        assert_eq!(
            region.unit_point(Some(Coast::South)),
            Some(Point::new(100.0, 200.0))
        );
        assert_eq!(
            region.dislodged_point(Some(Coast::North)),
            Some(Point::new(110.0, 210.0))
        );
    }

    #[test]
    fn highlight_id_defaults_to_underscored_name() {
        let mut region = coastal();
        assert_eq!(region.highlight_element_id(), "_spa");
        region.highlight_id = Some("spain".to_string());
        assert_eq!(region.highlight_element_id(), "spain");
    }

    #[test]
    fn region_deserializes_with_defaults() {
        let region: RegionDef = serde_json::from_str(
            r#"{"name":"par","supply_center":true,"anchors":{"unit":{"x":1.0,"y":2.0}}}"#,
        )
        .expect("region should parse");
        assert!(region.land);
        assert!(region.supply_center);
        assert!(region.coasts.is_empty());
        assert_eq!(region.anchors.unit, Some(Point::new(1.0, 2.0)));
        assert_eq!(region.anchors.dislodged, None);
    }
}
