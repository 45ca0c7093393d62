use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parley_shared::{FactionId, MapDescriptor, Order, TurnSnapshot};
use tracing::{debug, error, info};

use crate::command::{CommandExecutor, CommandFactory, RenderCommand};
use crate::config::EngineConfig;
use crate::error::{MapError, RenderError};
use crate::influence::DisplayMode;
use crate::layers::{LayerManager, ToggleLayer};
use crate::orders::{OrderLedger, OrderPainter};
use crate::queue::{Admission, CommandQueue, QueueStats};
use crate::scene::SceneDocument;
use crate::settings::{LabelLevel, RenderSettings, SettingKey, SettingValue, SharedSettings};
use crate::tracker::{HighlightRules, SymbolSet, TrackerTable, UnitSlot, highlight_class};

/// The single consumer of render commands. Owns the scene and every cache
/// derived from it.
pub struct MapRenderer<S: SceneDocument> {
    descriptor: Arc<MapDescriptor>,
    scene: S,
    symbols: SymbolSet,
    layers: LayerManager,
    trackers: TrackerTable,
    orders: OrderLedger,
    settings: SharedSettings,
    mode: DisplayMode,
    snapshot: Option<Arc<TurnSnapshot>>,
    queue: Arc<CommandQueue>,
    factory: CommandFactory,
    visual_index: Arc<HashMap<String, String>>,
    closed: bool,
}

impl<S: SceneDocument> MapRenderer<S> {
    /// Bind `scene` to `descriptor`: resolve templates and layers, create the
    /// order tiers, one tracker per region, and the initial settings.
    pub fn init(
        descriptor: impl Into<Arc<MapDescriptor>>,
        mut scene: S,
        config: EngineConfig,
    ) -> Result<Self, MapError> {
        let descriptor = descriptor.into();
        let symbols = SymbolSet::bind(&scene, &descriptor)?;
        let layers = LayerManager::bind(&mut scene, &descriptor)?;
        let trackers = TrackerTable::bind(
            &mut scene,
            &descriptor,
            &symbols,
            layers.layer(ToggleLayer::SupplyCenters),
            config.lenient_anchors,
        )?;

        let label_level = config.label_level.degrade(descriptor.labels);
        let mut initial = RenderSettings::default();
        initial.set_flag(SettingKey::ShowMap, true);
        initial.set_flag(SettingKey::ShowSupplyCenters, config.show_supply_centers);
        initial.set_flag(SettingKey::ShowUnits, true);
        initial.set_flag(SettingKey::ShowDislodgedUnits, true);
        initial.set_flag(SettingKey::ShowUnordered, config.show_unordered);
        initial.set(SettingKey::LabelLevel, SettingValue::Labels(label_level));
        initial.set(
            SettingKey::VisibleFactions,
            SettingValue::Factions(layers.factions()),
        );

        layers.apply_label_level(&mut scene, label_level);
        layers.set_layer_visible(
            &mut scene,
            ToggleLayer::SupplyCenters,
            config.show_supply_centers,
        );
        layers.apply_visible_factions(&mut scene, &layers.factions());

        let visual_index = Arc::new(trackers.visual_index(&scene));
        let factory = CommandFactory::new(&descriptor);
        info!(
            map = %descriptor.name,
            regions = trackers.len(),
            factions = descriptor.factions.len(),
            labels = %label_level,
            "map renderer initialized"
        );

        Ok(Self {
            descriptor,
            scene,
            symbols,
            layers,
            trackers,
            orders: OrderLedger::default(),
            settings: SharedSettings::new(initial),
            mode: DisplayMode::Normal,
            snapshot: None,
            queue: Arc::new(CommandQueue::new()),
            factory,
            visual_index,
            closed: false,
        })
    }

    /// A thread-safe handle for submitting commands and reading settings.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            queue: Arc::clone(&self.queue),
            settings: self.settings.clone(),
            factory: self.factory.clone(),
            visual_index: Arc::clone(&self.visual_index),
        }
    }

    pub fn commands(&self) -> &CommandFactory {
        &self.factory
    }

    /// Owner-side submission. The snapshot that opens the gate runs before
    /// this returns; everything else waits for [`run_pending`](Self::run_pending).
    pub fn submit(&mut self, command: RenderCommand) -> Result<(), RenderError> {
        if self.queue.submit(command)? == Admission::Opened {
            self.run_next();
        }
        Ok(())
    }

    /// Execute the next live command, if any.
    pub fn run_next(&mut self) -> bool {
        let Some(command) = self.queue.pop() else {
            return false;
        };
        self.execute(command);
        self.queue.finish();
        true
    }

    /// Drain the queue. Returns how many commands ran.
    pub fn run_pending(&mut self) -> usize {
        let mut executed = 0;
        while self.run_next() {
            executed += 1;
        }
        executed
    }

    /// Worker loop: drain, then wait for more, until the queue is closed.
    /// Tears the renderer down on the way out and hands it back.
    pub async fn run(mut self) -> Self {
        info!("render worker started");
        loop {
            self.run_pending();
            if self.queue.is_closed() {
                break;
            }
            self.queue.wait().await;
        }
        self.close();
        info!(executed = self.queue.stats().executed, "render worker stopped");
        self
    }

    fn execute(&mut self, command: RenderCommand) {
        let name = command.name();
        debug!(command = name, "executing render command");
        if let Err(err) = command.execute(self) {
            error!(command = name, error = %err, "render command failed");
        }
    }

    /// Stop accepting commands and drop every cache. Safe to call twice.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.queue.close();
        self.mode.release();
        self.trackers.clear();
        self.orders.clear();
        self.snapshot = None;
        self.closed = true;
        info!(map = %self.descriptor.name, "map renderer closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn descriptor(&self) -> &MapDescriptor {
        &self.descriptor
    }

    pub fn trackers(&self) -> &TrackerTable {
        &self.trackers
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    pub fn orders(&self) -> &OrderLedger {
        &self.orders
    }

    pub fn snapshot(&self) -> Option<&Arc<TurnSnapshot>> {
        self.snapshot.as_ref()
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings.snapshot()
    }

    pub fn is_influence(&self) -> bool {
        self.mode.is_influence()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    fn highlight_rules(&self) -> HighlightRules {
        self.settings.with(|settings| HighlightRules {
            influence: self.mode.is_influence(),
            show_unordered: settings.flag(SettingKey::ShowUnordered, false),
            show_supply_centers: settings.flag(SettingKey::ShowSupplyCenters, true),
        })
    }

    fn reconcile_region(&mut self, name: &str, force: bool) {
        let Some(snapshot) = self.snapshot.clone() else {
            return;
        };
        let units = self.layers.layer(ToggleLayer::Units);
        let dislodged = self.layers.layer(ToggleLayer::DislodgedUnits);
        let Some(tracker) = self.trackers.get_mut(name) else {
            return;
        };
        tracker.reconcile(
            &mut self.scene,
            &self.symbols,
            UnitSlot::Occupant,
            units,
            snapshot.unit(name),
            force,
        );
        tracker.reconcile(
            &mut self.scene,
            &self.symbols,
            UnitSlot::Dislodged,
            dislodged,
            snapshot.dislodged_unit(name),
            force,
        );
        self.refresh_highlight(name);
    }

    fn refresh_highlight(&mut self, name: &str) {
        let Some(snapshot) = self.snapshot.clone() else {
            return;
        };
        let rules = self.highlight_rules();
        let Some(tracker) = self.trackers.get_mut(name) else {
            return;
        };
        let orders = &self.orders;
        let class = highlight_class(tracker.region(), &snapshot, rules, |faction| {
            orders.has_order_from(name, faction)
        });
        tracker.apply_highlight(&mut self.scene, class);
    }

    fn refresh_all_highlights(&mut self) {
        for name in self.trackers.names() {
            self.refresh_highlight(&name);
        }
    }

    fn redraw_dependents(&mut self) -> usize {
        let painter = OrderPainter {
            descriptor: &self.descriptor,
            trackers: &self.trackers,
            layers: &self.layers,
        };
        self.orders.redraw_dependents(&mut self.scene, &painter)
    }

    /// Push the toggle-layer and faction visibility in the live settings
    /// onto the scene.
    fn reapply_visibility(&mut self) {
        let settings = self.settings.snapshot();
        for layer in ToggleLayer::ALL {
            let visible = settings.flag(layer.setting(), true);
            self.layers.set_layer_visible(&mut self.scene, layer, visible);
        }
        let factions = settings
            .visible_factions()
            .cloned()
            .unwrap_or_else(|| self.layers.factions());
        self.layers.apply_visible_factions(&mut self.scene, &factions);
    }
}

impl<S: SceneDocument> CommandExecutor for MapRenderer<S> {
    fn render_all(&mut self) {
        if self.snapshot.is_none() {
            debug!("no snapshot installed, nothing to render");
            return;
        }
        for name in self.trackers.names() {
            self.reconcile_region(&name, false);
        }
        let painter = OrderPainter {
            descriptor: &self.descriptor,
            trackers: &self.trackers,
            layers: &self.layers,
        };
        self.orders.redraw_all(&mut self.scene, &painter);
    }

    fn set_snapshot(&mut self, snapshot: Arc<TurnSnapshot>) {
        self.orders.clear_drawings(&mut self.scene);
        self.orders.load(snapshot.orders());
        info!(
            phase = ?snapshot.phase.kind,
            label = snapshot.phase.label.as_deref().unwrap_or(""),
            units = snapshot.units.len(),
            orders = snapshot.orders().len(),
            "snapshot installed"
        );
        self.snapshot = Some(snapshot);
    }

    fn render_region(&mut self, region: &str, force: bool) {
        self.reconcile_region(region, force);
    }

    fn set_label_level(&mut self, level: LabelLevel) {
        let effective = level.degrade(self.descriptor.labels);
        if effective != level {
            debug!(requested = %level, effective = %effective, "label level degraded");
        }
        self.settings
            .update(|settings| settings.set(SettingKey::LabelLevel, SettingValue::Labels(effective)));
        self.layers.apply_label_level(&mut self.scene, effective);
    }

    fn set_visibility(&mut self, layer: ToggleLayer, visible: bool) {
        self.settings
            .update(|settings| settings.set_flag(layer.setting(), visible));
        self.layers.set_layer_visible(&mut self.scene, layer, visible);
        if layer == ToggleLayer::SupplyCenters {
            self.refresh_all_highlights();
        }
    }

    fn set_visible_factions(&mut self, factions: BTreeSet<FactionId>) {
        self.layers.apply_visible_factions(&mut self.scene, &factions);
        self.settings.update(|settings| {
            settings.set(SettingKey::VisibleFactions, SettingValue::Factions(factions))
        });
    }

    fn set_influence_mode(&mut self, active: bool) -> Result<(), RenderError> {
        let mode = &mut self.mode;
        if active {
            self.settings.update(|settings| mode.enter(settings))?;
            self.layers
                .apply_visible_factions(&mut self.scene, &BTreeSet::new());
            for layer in [
                ToggleLayer::SupplyCenters,
                ToggleLayer::Units,
                ToggleLayer::DislodgedUnits,
            ] {
                self.layers.set_layer_visible(&mut self.scene, layer, false);
            }
            self.layers
                .set_layer_visible(&mut self.scene, ToggleLayer::Map, true);
            self.refresh_all_highlights();
            info!("influence mode entered");
        } else {
            self.settings.update(|settings| mode.exit(settings))?;
            for name in self.trackers.names() {
                self.reconcile_region(&name, false);
            }
            self.reapply_visibility();
            info!("influence mode left");
        }
        Ok(())
    }

    fn show_map(&mut self) {
        let root = self.scene.root();
        self.scene.set_visible(root, true);
    }

    fn set_show_unordered(&mut self, show: bool) {
        self.settings
            .update(|settings| settings.set_flag(SettingKey::ShowUnordered, show));
        self.refresh_all_highlights();
    }

    fn orders_created(&mut self, orders: &[Arc<Order>]) {
        for order in orders {
            self.orders.insert(&mut self.scene, Arc::clone(order));
            let painter = OrderPainter {
                descriptor: &self.descriptor,
                trackers: &self.trackers,
                layers: &self.layers,
            };
            self.orders.redraw(&mut self.scene, order.id, &painter);
        }
        let redrawn = self.redraw_dependents();
        debug!(created = orders.len(), redrawn, "orders created");
        for order in orders {
            self.refresh_highlight(&order.source);
        }
    }

    fn orders_deleted(&mut self, orders: &[Arc<Order>]) {
        for order in orders {
            self.orders.remove(&mut self.scene, order.id);
        }
        let redrawn = self.redraw_dependents();
        debug!(deleted = orders.len(), redrawn, "orders deleted");
        for order in orders {
            self.refresh_highlight(&order.source);
        }
    }
}

/// Cloneable, thread-safe surface for the host.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    queue: Arc<CommandQueue>,
    settings: SharedSettings,
    factory: CommandFactory,
    visual_index: Arc<HashMap<String, String>>,
}

impl EngineHandle {
    pub fn commands(&self) -> &CommandFactory {
        &self.factory
    }

    /// Queue a command. A first snapshot submitted here heads the queue
    /// rather than running inline.
    pub fn submit(&self, command: RenderCommand) -> Result<Admission, RenderError> {
        self.queue.submit(command)
    }

    pub fn clear_and_execute(
        &self,
        primary: RenderCommand,
        secondary: Option<RenderCommand>,
    ) -> Result<Admission, RenderError> {
        self.queue.clear_and_execute(primary, secondary)
    }

    pub fn render_setting(&self, key: SettingKey) -> Option<SettingValue> {
        self.settings.get(key)
    }

    /// Region owning the element with this id, for hit-testing.
    pub fn location_for_visual_id(&self, id: &str) -> Option<&str> {
        if self.queue.is_closed() {
            return None;
        }
        self.visual_index.get(id).map(String::as_str)
    }

    /// Replace the snapshot, dropping any render still queued against the
    /// old one.
    pub fn snapshot_changed(
        &self,
        snapshot: impl Into<Arc<TurnSnapshot>>,
    ) -> Result<Admission, RenderError> {
        self.clear_and_execute(
            self.factory.set_snapshot(snapshot),
            Some(self.factory.render_all()),
        )
    }

    pub fn orders_created(&self, orders: Vec<Arc<Order>>) -> Result<Admission, RenderError> {
        self.submit(self.factory.orders_created(orders))
    }

    pub fn orders_deleted(&self, orders: Vec<Arc<Order>>) -> Result<Admission, RenderError> {
        self.submit(self.factory.orders_deleted(orders))
    }

    pub fn visible_factions_changed(
        &self,
        factions: impl IntoIterator<Item = FactionId>,
    ) -> Result<Admission, RenderError> {
        self.submit(self.factory.set_visible_factions(factions))
    }

    /// `Ok(None)` when the region is unknown.
    pub fn render_region(&self, region: &str) -> Result<Option<Admission>, RenderError> {
        self.factory
            .render_region(region)
            .map(|command| self.submit(command))
            .transpose()
    }

    pub fn close(&self) -> bool {
        self.queue.close()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Live commands not yet picked up by the consumer.
    pub fn pending_len(&self) -> usize {
        self.queue.pending_len()
    }

    /// Resolves once the consumer has finished everything runnable.
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }
}
