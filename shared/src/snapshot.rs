use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::region::Coast;

/// Identity of a player/side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionId(pub String);

impl FactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FactionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Army,
    Fleet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub kind: UnitKind,
    pub faction: FactionId,
    #[serde(default)]
    pub coast: Option<Coast>,
}

impl Unit {
    pub fn new(kind: UnitKind, faction: impl Into<FactionId>) -> Self {
        Self {
            kind,
            faction: faction.into(),
            coast: None,
        }
    }

    pub fn with_coast(mut self, coast: Coast) -> Self {
        self.coast = Some(coast);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    #[default]
    Movement,
    Retreat,
    Adjustment,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Phase {
    #[serde(default)]
    pub kind: PhaseKind,
    /// Human-readable turn label such as "Spring 1901".
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderKind {
    Hold,
    Move {
        dest: String,
        #[serde(default)]
        dest_coast: Option<Coast>,
    },
    Support {
        supported: String,
        #[serde(default)]
        dest: Option<String>,
    },
    Convoy {
        from: String,
        to: String,
    },
    Retreat {
        dest: String,
    },
    Disband,
    Build,
    Remove,
}

impl OrderKind {
    pub const fn name(&self) -> &'static str {
        match self {
            OrderKind::Hold => "hold",
            OrderKind::Move { .. } => "move",
            OrderKind::Support { .. } => "support",
            OrderKind::Convoy { .. } => "convoy",
            OrderKind::Retreat { .. } => "retreat",
            OrderKind::Disband => "disband",
            OrderKind::Build => "build",
            OrderKind::Remove => "remove",
        }
    }
}

/// A submitted order as seen by the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub faction: FactionId,
    pub unit: UnitKind,
    pub source: String,
    #[serde(default)]
    pub coast: Option<Coast>,
    #[serde(flatten)]
    pub kind: OrderKind,
}

impl Order {
    pub fn new(
        id: u64,
        faction: impl Into<FactionId>,
        unit: UnitKind,
        source: impl Into<String>,
        kind: OrderKind,
    ) -> Self {
        Self {
            id: OrderId(id),
            faction: faction.into(),
            unit,
            source: source.into(),
            coast: None,
            kind,
        }
    }

    /// Whether the drawing of this order depends on some other order.
    pub fn is_dependent(&self) -> bool {
        matches!(
            self.kind,
            OrderKind::Support { .. } | OrderKind::Convoy { .. }
        )
    }

    /// Destination region for orders that move a unit.
    pub fn destination(&self) -> Option<&str> {
        match &self.kind {
            OrderKind::Move { dest, .. } | OrderKind::Retreat { dest } => Some(dest),
            _ => None,
        }
    }
}

/// Read-only game state for one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnSnapshot {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub units: HashMap<String, Arc<Unit>>,
    #[serde(default)]
    pub dislodged: HashMap<String, Arc<Unit>>,
    #[serde(default)]
    pub supply_centers: HashMap<String, FactionId>,
    #[serde(default)]
    pub last_occupiers: HashMap<String, FactionId>,
    #[serde(default)]
    pub orders: Vec<Arc<Order>>,
}

impl TurnSnapshot {
    pub fn new(kind: PhaseKind) -> Self {
        Self {
            phase: Phase { kind, label: None },
            ..Self::default()
        }
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn unit(&self, region: &str) -> Option<&Arc<Unit>> {
        self.units.get(region)
    }

    pub fn dislodged_unit(&self, region: &str) -> Option<&Arc<Unit>> {
        self.dislodged.get(region)
    }

    pub fn supply_center_owner(&self, region: &str) -> Option<&FactionId> {
        self.supply_centers.get(region)
    }

    pub fn last_occupier(&self, region: &str) -> Option<&FactionId> {
        self.last_occupiers.get(region)
    }

    pub fn orders(&self) -> &[Arc<Order>] {
        &self.orders
    }

    pub fn with_unit(mut self, region: impl Into<String>, unit: Unit) -> Self {
        self.units.insert(region.into(), Arc::new(unit));
        self
    }

    pub fn with_dislodged(mut self, region: impl Into<String>, unit: Unit) -> Self {
        self.dislodged.insert(region.into(), Arc::new(unit));
        self
    }

    pub fn with_owner(mut self, region: impl Into<String>, faction: impl Into<FactionId>) -> Self {
        self.supply_centers.insert(region.into(), faction.into());
        self
    }

    pub fn with_last_occupier(
        mut self,
        region: impl Into<String>,
        faction: impl Into<FactionId>,
    ) -> Self {
        self.last_occupiers.insert(region.into(), faction.into());
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.orders.push(Arc::new(order));
        self
    }
}
