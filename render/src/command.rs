use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parley_shared::{FactionId, MapDescriptor, Order, TurnSnapshot};
use tracing::debug;

use crate::error::RenderError;
use crate::layers::ToggleLayer;
use crate::settings::LabelLevel;

/// The closed set of operations the render consumer understands.
#[derive(Debug, Clone)]
pub enum RenderCommand {
    RenderAll,
    SetSnapshot(Arc<TurnSnapshot>),
    RenderRegion { region: Arc<str>, force: bool },
    SetLabelLevel(LabelLevel),
    SetVisibility { layer: ToggleLayer, visible: bool },
    SetVisibleFactions(BTreeSet<FactionId>),
    SetInfluenceMode(bool),
    ShowMap,
    SetShowUnordered(bool),
    OrdersCreated(Vec<Arc<Order>>),
    OrdersDeleted(Vec<Arc<Order>>),
}

impl RenderCommand {
    pub const fn name(&self) -> &'static str {
        match self {
            RenderCommand::RenderAll => "render_all",
            RenderCommand::SetSnapshot(_) => "set_snapshot",
            RenderCommand::RenderRegion { .. } => "render_region",
            RenderCommand::SetLabelLevel(_) => "set_label_level",
            RenderCommand::SetVisibility { .. } => "set_visibility",
            RenderCommand::SetVisibleFactions(_) => "set_visible_factions",
            RenderCommand::SetInfluenceMode(_) => "set_influence_mode",
            RenderCommand::ShowMap => "show_map",
            RenderCommand::SetShowUnordered(_) => "set_show_unordered",
            RenderCommand::OrdersCreated(_) => "orders_created",
            RenderCommand::OrdersDeleted(_) => "orders_deleted",
        }
    }

    pub const fn is_snapshot(&self) -> bool {
        matches!(self, RenderCommand::SetSnapshot(_))
    }

    /// Run this command against a concrete backend.
    pub fn execute<E: CommandExecutor + ?Sized>(self, executor: &mut E) -> Result<(), RenderError> {
        match self {
            RenderCommand::RenderAll => executor.render_all(),
            RenderCommand::SetSnapshot(snapshot) => executor.set_snapshot(snapshot),
            RenderCommand::RenderRegion { region, force } => executor.render_region(&region, force),
            RenderCommand::SetLabelLevel(level) => executor.set_label_level(level),
            RenderCommand::SetVisibility { layer, visible } => {
                executor.set_visibility(layer, visible)
            }
            RenderCommand::SetVisibleFactions(factions) => executor.set_visible_factions(factions),
            RenderCommand::SetInfluenceMode(active) => return executor.set_influence_mode(active),
            RenderCommand::ShowMap => executor.show_map(),
            RenderCommand::SetShowUnordered(show) => executor.set_show_unordered(show),
            RenderCommand::OrdersCreated(orders) => executor.orders_created(&orders),
            RenderCommand::OrdersDeleted(orders) => executor.orders_deleted(&orders),
        }
        Ok(())
    }
}

/// One executor per command variant. A rendering backend implements this
/// once and receives the whole vocabulary.
pub trait CommandExecutor {
    fn render_all(&mut self);
    fn set_snapshot(&mut self, snapshot: Arc<TurnSnapshot>);
    fn render_region(&mut self, region: &str, force: bool);
    fn set_label_level(&mut self, level: LabelLevel);
    fn set_visibility(&mut self, layer: ToggleLayer, visible: bool);
    fn set_visible_factions(&mut self, factions: BTreeSet<FactionId>);
    fn set_influence_mode(&mut self, active: bool) -> Result<(), RenderError>;
    fn show_map(&mut self);
    fn set_show_unordered(&mut self, show: bool);
    fn orders_created(&mut self, orders: &[Arc<Order>]);
    fn orders_deleted(&mut self, orders: &[Arc<Order>]);
}

/// Builds commands, resolving region names against the loaded map once.
#[derive(Debug, Clone)]
pub struct CommandFactory {
    regions: Arc<HashMap<String, Arc<str>>>,
}

impl CommandFactory {
    pub fn new(descriptor: &MapDescriptor) -> Self {
        let regions = descriptor
            .regions
            .iter()
            .map(|region| (region.name.clone(), Arc::from(region.name.as_str())))
            .collect();
        Self {
            regions: Arc::new(regions),
        }
    }

    pub fn render_all(&self) -> RenderCommand {
        RenderCommand::RenderAll
    }

    pub fn set_snapshot(&self, snapshot: impl Into<Arc<TurnSnapshot>>) -> RenderCommand {
        RenderCommand::SetSnapshot(snapshot.into())
    }

    /// `None` when the map has no such region.
    pub fn render_region(&self, region: &str) -> Option<RenderCommand> {
        self.region_command(region, false)
    }

    /// Like [`render_region`](Self::render_region) but skips the diff check.
    pub fn force_render_region(&self, region: &str) -> Option<RenderCommand> {
        self.region_command(region, true)
    }

    fn region_command(&self, region: &str, force: bool) -> Option<RenderCommand> {
        let Some(name) = self.regions.get(region) else {
            debug!(region, "ignoring render request for unknown region");
            return None;
        };
        Some(RenderCommand::RenderRegion {
            region: Arc::clone(name),
            force,
        })
    }

    pub fn set_label_level(&self, level: LabelLevel) -> RenderCommand {
        RenderCommand::SetLabelLevel(level)
    }

    pub fn set_visibility(&self, layer: ToggleLayer, visible: bool) -> RenderCommand {
        RenderCommand::SetVisibility { layer, visible }
    }

    pub fn set_visible_factions(
        &self,
        factions: impl IntoIterator<Item = FactionId>,
    ) -> RenderCommand {
        RenderCommand::SetVisibleFactions(factions.into_iter().collect())
    }

    pub fn set_influence_mode(&self, active: bool) -> RenderCommand {
        RenderCommand::SetInfluenceMode(active)
    }

    pub fn show_map(&self) -> RenderCommand {
        RenderCommand::ShowMap
    }

    pub fn set_show_unordered(&self, show: bool) -> RenderCommand {
        RenderCommand::SetShowUnordered(show)
    }

    pub fn orders_created(&self, orders: Vec<Arc<Order>>) -> RenderCommand {
        RenderCommand::OrdersCreated(orders)
    }

    pub fn orders_deleted(&self, orders: Vec<Arc<Order>>) -> RenderCommand {
        RenderCommand::OrdersDeleted(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::descriptor;

    /// Backend that only records what it was asked to do.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        influence: bool,
    }

    impl CommandExecutor for Recorder {
        fn render_all(&mut self) {
            self.calls.push("render_all".into());
        }
        fn set_snapshot(&mut self, _snapshot: Arc<TurnSnapshot>) {
            self.calls.push("set_snapshot".into());
        }
        fn render_region(&mut self, region: &str, force: bool) {
            self.calls.push(format!("render_region {region} {force}"));
        }
        fn set_label_level(&mut self, level: LabelLevel) {
            self.calls.push(format!("labels {level}"));
        }
        fn set_visibility(&mut self, layer: ToggleLayer, visible: bool) {
            self.calls.push(format!("visibility {layer:?} {visible}"));
        }
        fn set_visible_factions(&mut self, factions: BTreeSet<FactionId>) {
            self.calls.push(format!("factions {}", factions.len()));
        }
        fn set_influence_mode(&mut self, active: bool) -> Result<(), RenderError> {
            if self.influence == active {
                return Err(if active {
                    RenderError::InfluenceAlreadyActive
                } else {
                    RenderError::InfluenceNotActive
                });
            }
            self.influence = active;
            self.calls.push(format!("influence {active}"));
            Ok(())
        }
        fn show_map(&mut self) {
            self.calls.push("show_map".into());
        }
        fn set_show_unordered(&mut self, show: bool) {
            self.calls.push(format!("unordered {show}"));
        }
        fn orders_created(&mut self, orders: &[Arc<Order>]) {
            self.calls.push(format!("created {}", orders.len()));
        }
        fn orders_deleted(&mut self, orders: &[Arc<Order>]) {
            self.calls.push(format!("deleted {}", orders.len()));
        }
    }

    #[test]
    fn factory_rejects_unknown_regions() {
        let factory = CommandFactory::new(&descriptor());
        assert!(factory.render_region("par").is_some());
        assert!(factory.render_region("mos").is_none());
        assert!(factory.force_render_region("mos").is_none());
    }

    #[test]
    fn factory_shares_interned_region_names() {
        let factory = CommandFactory::new(&descriptor());
        let (Some(RenderCommand::RenderRegion { region: a, .. }), Some(RenderCommand::RenderRegion { region: b, force })) =
            (factory.render_region("par"), factory.force_render_region("par"))
        else {
            panic!("expected region commands");
        };
        assert!(Arc::ptr_eq(&a, &b));
        assert!(force);
    }

    #[test]
    fn commands_dispatch_to_matching_executor() {
        let factory = CommandFactory::new(&descriptor());
        let mut recorder = Recorder::default();
        let commands = [
            factory.set_snapshot(TurnSnapshot::default()),
            factory.render_all(),
            factory.force_render_region("pic").expect("pic exists"),
            factory.set_label_level(LabelLevel::Full),
            factory.set_visibility(ToggleLayer::Units, false),
            factory.set_visible_factions([FactionId::new("france")]),
            factory.show_map(),
            factory.orders_created(Vec::new()),
        ];
        for command in commands {
            command.execute(&mut recorder).expect("command should run");
        }
        assert_eq!(
            recorder.calls,
            [
                "set_snapshot",
                "render_all",
                "render_region pic true",
                "labels full",
                "visibility Units false",
                "factions 1",
                "show_map",
                "created 0",
            ]
        );
    }

    #[test]
    fn influence_errors_surface_from_execute() {
        let factory = CommandFactory::new(&descriptor());
        let mut recorder = Recorder::default();
        assert_eq!(
            factory.set_influence_mode(false).execute(&mut recorder),
            Err(RenderError::InfluenceNotActive)
        );
        factory
            .set_influence_mode(true)
            .execute(&mut recorder)
            .expect("enter");
        assert_eq!(
            factory.set_influence_mode(true).execute(&mut recorder),
            Err(RenderError::InfluenceAlreadyActive)
        );
    }

    #[test]
    fn only_set_snapshot_is_a_snapshot() {
        let factory = CommandFactory::new(&descriptor());
        assert!(factory.set_snapshot(TurnSnapshot::default()).is_snapshot());
        assert!(!factory.render_all().is_snapshot());
    }
}
