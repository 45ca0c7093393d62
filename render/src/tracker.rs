//! Per-region cache of attached visuals and last-rendered values.
//!
//! Region renders diff the current snapshot against the cache and only touch
//! the scene for what actually changed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parley_shared::{
    FactionId, MapDescriptor, PhaseKind, Point, RegionDef, SymbolSize, TurnSnapshot, Unit,
    UnitKind,
};
use tracing::warn;

use crate::error::MapError;
use crate::scene::{ElementHandle, SceneDocument};

pub const ARMY_SYMBOL: &str = "Army";
pub const FLEET_SYMBOL: &str = "Fleet";
pub const DISLODGED_ARMY_SYMBOL: &str = "DislodgedArmy";
pub const DISLODGED_FLEET_SYMBOL: &str = "DislodgedFleet";
pub const SUPPLY_CENTER_SYMBOL: &str = "SupplyCenter";

pub const UNORDERED_CLASS: &str = "unordered";

/// Required symbol templates, resolved once at init.
#[derive(Debug, Clone)]
pub struct SymbolSet {
    sizes: HashMap<&'static str, SymbolSize>,
}

impl SymbolSet {
    pub fn bind<S: SceneDocument>(scene: &S, descriptor: &MapDescriptor) -> Result<Self, MapError> {
        let mut sizes = HashMap::new();
        for symbol in [
            ARMY_SYMBOL,
            FLEET_SYMBOL,
            DISLODGED_ARMY_SYMBOL,
            DISLODGED_FLEET_SYMBOL,
            SUPPLY_CENTER_SYMBOL,
        ] {
            let template = scene.element_by_id(symbol).ok_or_else(|| {
                MapError::format(format!("required symbol template `{symbol}` is missing"))
            })?;
            let size = match descriptor.symbols.get(symbol) {
                Some(declared) => *declared,
                None => SymbolSize {
                    width: numeric_attribute(scene, template, symbol, "width")?,
                    height: numeric_attribute(scene, template, symbol, "height")?,
                },
            };
            sizes.insert(symbol, size);
        }
        Ok(Self { sizes })
    }

    pub fn size(&self, symbol: &str) -> SymbolSize {
        self.sizes.get(symbol).copied().unwrap_or(SymbolSize {
            width: 0.0,
            height: 0.0,
        })
    }
}

fn numeric_attribute<S: SceneDocument>(
    scene: &S,
    element: ElementHandle,
    symbol: &str,
    name: &str,
) -> Result<f64, MapError> {
    let raw = scene.attribute(element, name).ok_or_else(|| {
        MapError::format(format!("symbol `{symbol}` has no `{name}` attribute"))
    })?;
    raw.trim().parse::<f64>().map_err(|_| {
        MapError::format(format!(
            "symbol `{symbol}` has malformed `{name}` attribute: {raw:?}"
        ))
    })
}

/// Which unit of a region a visual stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSlot {
    Occupant,
    Dislodged,
}

impl UnitSlot {
    fn symbol(self, kind: UnitKind) -> &'static str {
        match (self, kind) {
            (UnitSlot::Occupant, UnitKind::Army) => ARMY_SYMBOL,
            (UnitSlot::Occupant, UnitKind::Fleet) => FLEET_SYMBOL,
            (UnitSlot::Dislodged, UnitKind::Army) => DISLODGED_ARMY_SYMBOL,
            (UnitSlot::Dislodged, UnitKind::Fleet) => DISLODGED_FLEET_SYMBOL,
        }
    }

    fn id_prefix(self) -> &'static str {
        match self {
            UnitSlot::Occupant => "u",
            UnitSlot::Dislodged => "d",
        }
    }
}

/// Outcome of comparing a cached unit with the snapshot's unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitChange {
    Unchanged,
    Detach,
    Attach,
    Replace,
}

/// Compare by reference: a new snapshot allocation counts as a change even
/// when the unit is equal by value.
pub fn diff_unit(cached: Option<&Arc<Unit>>, current: Option<&Arc<Unit>>, force: bool) -> UnitChange {
    let same = match (cached, current) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    };
    if same && !force {
        return UnitChange::Unchanged;
    }
    match (cached.is_some(), current.is_some()) {
        (false, false) => UnitChange::Unchanged,
        (true, false) => UnitChange::Detach,
        (false, true) => UnitChange::Attach,
        (true, true) => UnitChange::Replace,
    }
}

/// Inputs for picking a region's highlight class.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighlightRules {
    pub influence: bool,
    pub show_unordered: bool,
    pub show_supply_centers: bool,
}

/// Highlight class for `region`, or `None` for its original look.
///
/// Priority: influence overlay, unordered unit, supply-center owner.
pub fn highlight_class(
    region: &RegionDef,
    snapshot: &TurnSnapshot,
    rules: HighlightRules,
    is_ordered: impl Fn(&FactionId) -> bool,
) -> Option<String> {
    if rules.influence {
        return crate::influence::influence_class(region, snapshot);
    }
    if rules.show_unordered {
        let unit = match snapshot.phase.kind {
            PhaseKind::Movement => snapshot.unit(&region.name),
            PhaseKind::Retreat => snapshot.dislodged_unit(&region.name),
            PhaseKind::Adjustment => None,
        };
        if let Some(unit) = unit
            && !is_ordered(&unit.faction)
        {
            return Some(UNORDERED_CLASS.to_string());
        }
    }
    if rules.show_supply_centers
        && let Some(owner) = snapshot.supply_center_owner(&region.name)
    {
        return Some(format!("sc_{owner}"));
    }
    None
}

#[derive(Debug, Clone)]
pub struct RegionTracker {
    region: Arc<RegionDef>,
    unit_anchor: Point,
    dislodged_anchor: Point,
    unit_element: Option<ElementHandle>,
    dislodged_element: Option<ElementHandle>,
    supply_center_element: Option<ElementHandle>,
    highlight_element: Option<ElementHandle>,
    last_unit: Option<Arc<Unit>>,
    last_dislodged: Option<Arc<Unit>>,
    original_highlight: Option<String>,
    current_highlight: Option<String>,
}

fn anchor(region: &RegionDef, point: Option<Point>, what: &str, lenient: bool) -> Result<Point, MapError> {
    match point {
        Some(point) => Ok(point),
        None if lenient => {
            warn!(region = %region.name, anchor = what, "missing anchor, substituting origin");
            Ok(Point::ZERO)
        }
        None => Err(MapError::format(format!(
            "region `{}` has no {what} anchor",
            region.name
        ))),
    }
}

impl RegionTracker {
    /// Resolve anchors, place the supply-center marker and capture the
    /// highlight element's original class.
    pub fn bind<S: SceneDocument>(
        scene: &mut S,
        region: Arc<RegionDef>,
        symbols: &SymbolSet,
        supply_center_layer: ElementHandle,
        lenient: bool,
    ) -> Result<Self, MapError> {
        let unit_anchor = anchor(&region, region.anchors.unit, "unit", lenient)?;
        let dislodged_anchor = anchor(&region, region.anchors.dislodged, "dislodged", lenient)?;

        let supply_center_element = if region.supply_center {
            let point = anchor(&region, region.anchors.supply_center, "supply center", lenient)?;
            let id = format!("sc-{}", region.name);
            let element = place_symbol(scene, SUPPLY_CENTER_SYMBOL, &id, symbols, point);
            scene.set_class(element, "supply_center");
            scene.append_child(supply_center_layer, element);
            Some(element)
        } else {
            None
        };

        let highlight_element = scene.element_by_id(&region.highlight_element_id());
        let original_highlight =
            highlight_element.and_then(|element| scene.class(element).map(str::to_string));

        Ok(Self {
            region,
            unit_anchor,
            dislodged_anchor,
            unit_element: None,
            dislodged_element: None,
            supply_center_element,
            highlight_element,
            last_unit: None,
            last_dislodged: None,
            current_highlight: original_highlight.clone(),
            original_highlight,
        })
    }

    pub fn region(&self) -> &Arc<RegionDef> {
        &self.region
    }

    pub fn unit_element(&self) -> Option<ElementHandle> {
        self.unit_element
    }

    pub fn dislodged_element(&self) -> Option<ElementHandle> {
        self.dislodged_element
    }

    pub fn supply_center_element(&self) -> Option<ElementHandle> {
        self.supply_center_element
    }

    pub fn highlight_element(&self) -> Option<ElementHandle> {
        self.highlight_element
    }

    pub fn last_unit(&self) -> Option<&Arc<Unit>> {
        self.last_unit.as_ref()
    }

    pub fn last_dislodged(&self) -> Option<&Arc<Unit>> {
        self.last_dislodged.as_ref()
    }

    pub fn original_highlight(&self) -> Option<&str> {
        self.original_highlight.as_deref()
    }

    /// Placement point for `unit` in this region, coast variant first.
    pub fn unit_point(&self, slot: UnitSlot, coast: Option<parley_shared::Coast>) -> Point {
        match slot {
            UnitSlot::Occupant => self.region.unit_point(coast).unwrap_or(self.unit_anchor),
            UnitSlot::Dislodged => self
                .region
                .dislodged_point(coast)
                .unwrap_or(self.dislodged_anchor),
        }
    }

    /// Bring one unit slot in line with `current`.
    pub fn reconcile<S: SceneDocument>(
        &mut self,
        scene: &mut S,
        symbols: &SymbolSet,
        slot: UnitSlot,
        layer: ElementHandle,
        current: Option<&Arc<Unit>>,
        force: bool,
    ) -> UnitChange {
        let cached = match slot {
            UnitSlot::Occupant => self.last_unit.as_ref(),
            UnitSlot::Dislodged => self.last_dislodged.as_ref(),
        };
        let change = diff_unit(cached, current, force);
        if change == UnitChange::Unchanged {
            return change;
        }

        let old = match slot {
            UnitSlot::Occupant => self.unit_element.take(),
            UnitSlot::Dislodged => self.dislodged_element.take(),
        };
        if let Some(old) = old {
            scene.remove(old);
        }
        let element = current.map(|unit| {
            let id = format!("{}-{}", slot.id_prefix(), self.region.name);
            let point = self.unit_point(slot, unit.coast);
            let element = place_symbol(scene, slot.symbol(unit.kind), &id, symbols, point);
            scene.set_class(element, &format!("unit_{}", unit.faction));
            scene.append_child(layer, element);
            element
        });

        match slot {
            UnitSlot::Occupant => {
                self.unit_element = element;
                self.last_unit = current.cloned();
            }
            UnitSlot::Dislodged => {
                self.dislodged_element = element;
                self.last_dislodged = current.cloned();
            }
        }
        change
    }

    /// Write the highlight class (`None` = original) if it differs from what
    /// is on screen. Returns whether the scene was touched.
    pub fn apply_highlight<S: SceneDocument>(&mut self, scene: &mut S, class: Option<String>) -> bool {
        let Some(element) = self.highlight_element else {
            return false;
        };
        let target = class.or_else(|| self.original_highlight.clone());
        if target == self.current_highlight {
            return false;
        }
        match target.as_deref() {
            Some(class) => scene.set_class(element, class),
            None => scene.set_class(element, ""),
        }
        self.current_highlight = target;
        true
    }

    /// Element ids this tracker may own, for hit-testing.
    fn visual_ids(&self) -> [String; 3] {
        let name = &self.region.name;
        [format!("u-{name}"), format!("d-{name}"), format!("sc-{name}")]
    }
}

fn place_symbol<S: SceneDocument>(
    scene: &mut S,
    symbol: &str,
    id: &str,
    symbols: &SymbolSet,
    center: Point,
) -> ElementHandle {
    let size = symbols.size(symbol);
    let element = scene.create_element("use", Some(id));
    scene.set_attribute(element, "href", &format!("#{symbol}"));
    scene.set_attribute(element, "x", &(center.x - size.width / 2.0).to_string());
    scene.set_attribute(element, "y", &(center.y - size.height / 2.0).to_string());
    scene.set_attribute(element, "width", &size.width.to_string());
    scene.set_attribute(element, "height", &size.height.to_string());
    element
}

/// Exactly one tracker per descriptor region, keyed by region name.
#[derive(Debug, Clone, Default)]
pub struct TrackerTable {
    trackers: BTreeMap<String, RegionTracker>,
}

impl TrackerTable {
    pub fn bind<S: SceneDocument>(
        scene: &mut S,
        descriptor: &MapDescriptor,
        symbols: &SymbolSet,
        supply_center_layer: ElementHandle,
        lenient: bool,
    ) -> Result<Self, MapError> {
        let mut trackers = BTreeMap::new();
        for region in &descriptor.regions {
            if trackers.contains_key(&region.name) {
                return Err(MapError::format(format!(
                    "region `{}` is declared twice",
                    region.name
                )));
            }
            let tracker = RegionTracker::bind(
                scene,
                Arc::new(region.clone()),
                symbols,
                supply_center_layer,
                lenient,
            )?;
            trackers.insert(region.name.clone(), tracker);
        }
        Ok(Self { trackers })
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    pub fn get(&self, region: &str) -> Option<&RegionTracker> {
        self.trackers.get(region)
    }

    pub fn get_mut(&mut self, region: &str) -> Option<&mut RegionTracker> {
        self.trackers.get_mut(region)
    }

    pub fn names(&self) -> Vec<String> {
        self.trackers.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.trackers.clear();
    }

    /// Map every element id a tracker can own back to its region.
    pub fn visual_index<S: SceneDocument>(&self, scene: &S) -> HashMap<String, String> {
        let mut index = HashMap::new();
        for (name, tracker) in &self.trackers {
            for id in tracker.visual_ids() {
                index.insert(id, name.clone());
            }
            if let Some(id) = tracker
                .highlight_element
                .and_then(|element| scene.element_id(element))
            {
                index.insert(id.to_string(), name.clone());
            }
        }
        index
    }
}
