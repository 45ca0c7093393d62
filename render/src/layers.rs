use std::collections::{BTreeSet, HashMap};

use parley_shared::{FactionId, MapDescriptor, OrderKind};
use tracing::debug;

use crate::error::MapError;
use crate::scene::{ElementHandle, SceneDocument};
use crate::settings::{LabelLevel, SettingKey};

pub const MAP_LAYER: &str = "MapLayer";
pub const SUPPLY_CENTER_LAYER: &str = "SupplyCenterLayer";
pub const UNIT_LAYER: &str = "UnitLayer";
pub const DISLODGED_UNIT_LAYER: &str = "DislodgedUnitLayer";
pub const BRIEF_LABEL_LAYER: &str = "BriefLabelLayer";
pub const FULL_LABEL_LAYER: &str = "FullLabelLayer";
/// Pre-existing group that holds the highest-priority order tier.
pub const ORDER_LAYER: &str = "OrderLayer";

/// Layers with a plain on/off toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleLayer {
    Map,
    SupplyCenters,
    Units,
    DislodgedUnits,
}

impl ToggleLayer {
    pub const ALL: [ToggleLayer; 4] = [
        ToggleLayer::Map,
        ToggleLayer::SupplyCenters,
        ToggleLayer::Units,
        ToggleLayer::DislodgedUnits,
    ];

    pub const fn setting(self) -> SettingKey {
        match self {
            ToggleLayer::Map => SettingKey::ShowMap,
            ToggleLayer::SupplyCenters => SettingKey::ShowSupplyCenters,
            ToggleLayer::Units => SettingKey::ShowUnits,
            ToggleLayer::DislodgedUnits => SettingKey::ShowDislodgedUnits,
        }
    }
}

/// Stacking tier for order drawings; `Z0` paints on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ZPriority {
    Z0,
    Z1,
    Z2,
}

impl ZPriority {
    pub const ALL: [ZPriority; 3] = [ZPriority::Z0, ZPriority::Z1, ZPriority::Z2];

    pub const fn index(self) -> usize {
        match self {
            ZPriority::Z0 => 0,
            ZPriority::Z1 => 1,
            ZPriority::Z2 => 2,
        }
    }

    pub const fn for_order(kind: &OrderKind) -> ZPriority {
        match kind {
            OrderKind::Hold | OrderKind::Disband | OrderKind::Build | OrderKind::Remove => {
                ZPriority::Z0
            }
            OrderKind::Move { .. } | OrderKind::Retreat { .. } => ZPriority::Z1,
            OrderKind::Support { .. } | OrderKind::Convoy { .. } => ZPriority::Z2,
        }
    }
}

/// Named layer groups of the scene plus the (faction, z) order subgroups.
#[derive(Debug, Clone)]
pub struct LayerManager {
    map: ElementHandle,
    supply_centers: ElementHandle,
    units: ElementHandle,
    dislodged_units: ElementHandle,
    brief_labels: Option<ElementHandle>,
    full_labels: Option<ElementHandle>,
    tiers: [ElementHandle; 3],
    order_groups: HashMap<(FactionId, ZPriority), ElementHandle>,
}

fn required<S: SceneDocument>(scene: &S, id: &str) -> Result<ElementHandle, MapError> {
    scene
        .element_by_id(id)
        .ok_or_else(|| MapError::format(format!("required layer group `{id}` is missing")))
}

fn label_layer<S: SceneDocument>(
    scene: &S,
    supported: bool,
    id: &str,
) -> Result<Option<ElementHandle>, MapError> {
    if supported {
        required(scene, id).map(Some)
    } else {
        Ok(scene.element_by_id(id))
    }
}

impl LayerManager {
    /// Resolve the named layers and create the lower order tiers and the
    /// per-faction order subgroups.
    pub fn bind<S: SceneDocument>(
        scene: &mut S,
        descriptor: &MapDescriptor,
    ) -> Result<Self, MapError> {
        let map = required(scene, MAP_LAYER)?;
        let supply_centers = required(scene, SUPPLY_CENTER_LAYER)?;
        let units = required(scene, UNIT_LAYER)?;
        let dislodged_units = required(scene, DISLODGED_UNIT_LAYER)?;
        let brief_labels = label_layer(scene, descriptor.labels.brief, BRIEF_LABEL_LAYER)?;
        let full_labels = label_layer(scene, descriptor.labels.full, FULL_LABEL_LAYER)?;

        let z0 = required(scene, ORDER_LAYER)?;
        let parent = scene.parent(z0).ok_or_else(|| {
            MapError::format(format!("layer group `{ORDER_LAYER}` is not attached"))
        })?;
        // z2 goes in first so z1 lands between it and z0.
        let z2 = scene.create_element("g", Some("OrderLayer2"));
        scene.insert_before(parent, z2, z0);
        let z1 = scene.create_element("g", Some("OrderLayer1"));
        scene.insert_before(parent, z1, z0);
        let tiers = [z0, z1, z2];

        let mut order_groups = HashMap::new();
        for z in ZPriority::ALL {
            for faction in descriptor.faction_ids() {
                let id = format!("orders-{faction}-z{}", z.index());
                let group = scene.create_element("g", Some(&id));
                scene.append_child(tiers[z.index()], group);
                order_groups.insert((faction.clone(), z), group);
            }
        }
        debug!(
            factions = descriptor.factions.len(),
            "bound layer groups and order tiers"
        );

        Ok(Self {
            map,
            supply_centers,
            units,
            dislodged_units,
            brief_labels,
            full_labels,
            tiers,
            order_groups,
        })
    }

    pub fn layer(&self, layer: ToggleLayer) -> ElementHandle {
        match layer {
            ToggleLayer::Map => self.map,
            ToggleLayer::SupplyCenters => self.supply_centers,
            ToggleLayer::Units => self.units,
            ToggleLayer::DislodgedUnits => self.dislodged_units,
        }
    }

    pub fn tier(&self, z: ZPriority) -> ElementHandle {
        self.tiers[z.index()]
    }

    pub fn order_group(&self, faction: &FactionId, z: ZPriority) -> Option<ElementHandle> {
        self.order_groups.get(&(faction.clone(), z)).copied()
    }

    pub fn factions(&self) -> BTreeSet<FactionId> {
        self.order_groups
            .keys()
            .map(|(faction, _)| faction.clone())
            .collect()
    }

    pub fn set_layer_visible<S: SceneDocument>(
        &self,
        scene: &mut S,
        layer: ToggleLayer,
        visible: bool,
    ) {
        scene.set_visible(self.layer(layer), visible);
    }

    pub fn set_faction_visible<S: SceneDocument>(
        &self,
        scene: &mut S,
        faction: &FactionId,
        visible: bool,
    ) {
        for z in ZPriority::ALL {
            if let Some(group) = self.order_group(faction, z) {
                scene.set_visible(group, visible);
            }
        }
    }

    /// Show exactly the factions in `visible`, at every tier.
    pub fn apply_visible_factions<S: SceneDocument>(
        &self,
        scene: &mut S,
        visible: &BTreeSet<FactionId>,
    ) {
        for faction in self.factions() {
            self.set_faction_visible(scene, &faction, visible.contains(&faction));
        }
    }

    pub fn apply_label_level<S: SceneDocument>(&self, scene: &mut S, level: LabelLevel) {
        if let Some(brief) = self.brief_labels {
            scene.set_visible(brief, level == LabelLevel::Brief);
        }
        if let Some(full) = self.full_labels {
            scene.set_visible(full, level == LabelLevel::Full);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{RetainedScene, build_skeleton};
    use crate::test_support::descriptor;

    fn bound() -> (RetainedScene, LayerManager) {
        let desc = descriptor();
        let mut scene = build_skeleton(&desc);
        let layers = LayerManager::bind(&mut scene, &desc).expect("layers should bind");
        (scene, layers)
    }

    #[test]
    fn lower_tiers_stack_beneath_z0() {
        let (scene, layers) = bound();
        let root = scene.root();
        let children = scene.children(root);
        let pos = |el| children.iter().position(|c| *c == el).expect("tier attached");
        let (z0, z1, z2) = (
            pos(layers.tier(ZPriority::Z0)),
            pos(layers.tier(ZPriority::Z1)),
            pos(layers.tier(ZPriority::Z2)),
        );
        assert!(z2 < z1 && z1 < z0);
        assert_eq!(z0 - z2, 2);
    }

    #[test]
    fn one_subgroup_per_faction_and_tier() {
        let (scene, layers) = bound();
        for faction in descriptor().faction_ids() {
            for z in ZPriority::ALL {
                let group = layers.order_group(faction, z).expect("subgroup exists");
                assert_eq!(scene.parent(group), Some(layers.tier(z)));
            }
        }
        assert_eq!(
            scene.children(layers.tier(ZPriority::Z1)).len(),
            descriptor().factions.len()
        );
    }

    #[test]
    fn visible_factions_toggle_all_tiers() {
        let (mut scene, layers) = bound();
        let france = FactionId::new("france");
        let only_france = BTreeSet::from([france.clone()]);
        layers.apply_visible_factions(&mut scene, &only_france);

        for faction in layers.factions() {
            for z in ZPriority::ALL {
                let group = layers.order_group(&faction, z).expect("subgroup exists");
                assert_eq!(scene.is_visible(group), faction == france, "{faction} z{z:?}");
            }
        }
    }

    #[test]
    fn label_level_shows_one_label_layer() {
        let (mut scene, layers) = bound();
        let brief = scene.element_by_id(BRIEF_LABEL_LAYER).expect("brief layer");
        let full = scene.element_by_id(FULL_LABEL_LAYER).expect("full layer");

        layers.apply_label_level(&mut scene, LabelLevel::Full);
        assert!(!scene.is_visible(brief));
        assert!(scene.is_visible(full));

        layers.apply_label_level(&mut scene, LabelLevel::None);
        assert!(!scene.is_visible(brief));
        assert!(!scene.is_visible(full));
    }

    #[test]
    fn missing_layer_is_a_format_error() {
        let desc = descriptor();
        let mut scene = RetainedScene::new();
        let err = LayerManager::bind(&mut scene, &desc).expect_err("bind should fail");
        assert!(matches!(err, MapError::Format(msg) if msg.contains(MAP_LAYER)));
    }

    #[test]
    fn supported_label_layer_must_exist() {
        let mut desc = descriptor();
        desc.labels.full = false;
        let mut scene = build_skeleton(&desc);
        desc.labels.full = true;
        let err = LayerManager::bind(&mut scene, &desc).expect_err("bind should fail");
        assert!(matches!(err, MapError::Format(msg) if msg.contains(FULL_LABEL_LAYER)));
    }

    #[test]
    fn order_tiers_by_kind() {
        assert_eq!(ZPriority::for_order(&OrderKind::Hold), ZPriority::Z0);
        assert_eq!(
            ZPriority::for_order(&OrderKind::Retreat {
                dest: "gas".to_string()
            }),
            ZPriority::Z1
        );
        assert_eq!(
            ZPriority::for_order(&OrderKind::Convoy {
                from: "lon".to_string(),
                to: "nwy".to_string()
            }),
            ZPriority::Z2
        );
    }
}
