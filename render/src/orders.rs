//! Order annotations: the ledger of orders currently on the map and how each
//! one is drawn into its (faction, z) subgroup.

use std::collections::BTreeMap;
use std::sync::Arc;

use parley_shared::{
    FactionId, MapDescriptor, Order, OrderId, OrderKind, Point, UnitKind, colors::rgb_hex,
};
use tracing::warn;

use crate::layers::{LayerManager, ZPriority};
use crate::scene::{ElementHandle, SceneDocument};
use crate::tracker::{TrackerTable, UnitSlot};

pub const UNMATCHED_CLASS: &str = "order_unmatched";

const HOLD_RADIUS: f64 = 12.0;

#[derive(Debug, Clone)]
struct OrderEntry {
    order: Arc<Order>,
    element: Option<ElementHandle>,
}

/// Orders the map currently knows about, with their drawn element if any.
#[derive(Debug, Clone, Default)]
pub struct OrderLedger {
    entries: BTreeMap<OrderId, OrderEntry>,
}

impl OrderLedger {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn element(&self, id: OrderId) -> Option<ElementHandle> {
        self.entries.get(&id).and_then(|entry| entry.element)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Arc<Order>> + '_ {
        self.entries.values().map(|entry| &entry.order)
    }

    /// Whether `faction` has given an order to the unit in `region`.
    pub fn has_order_from(&self, region: &str, faction: &FactionId) -> bool {
        self.orders()
            .any(|order| order.source == region && &order.faction == faction)
    }

    /// Replace the contents with `orders`, all undrawn. Callers detach the
    /// previous drawings first.
    pub fn load(&mut self, orders: &[Arc<Order>]) {
        self.entries = orders
            .iter()
            .map(|order| {
                (
                    order.id,
                    OrderEntry {
                        order: Arc::clone(order),
                        element: None,
                    },
                )
            })
            .collect();
    }

    /// Add or replace an order, removing the old drawing of a replaced one.
    pub fn insert<S: SceneDocument>(&mut self, scene: &mut S, order: Arc<Order>) {
        let previous = self.entries.insert(
            order.id,
            OrderEntry {
                order,
                element: None,
            },
        );
        if let Some(element) = previous.and_then(|entry| entry.element) {
            scene.remove(element);
        }
    }

    pub fn remove<S: SceneDocument>(&mut self, scene: &mut S, id: OrderId) -> Option<Arc<Order>> {
        let entry = self.entries.remove(&id)?;
        if let Some(element) = entry.element {
            scene.remove(element);
        }
        Some(entry.order)
    }

    pub fn clear_drawings<S: SceneDocument>(&mut self, scene: &mut S) {
        for entry in self.entries.values_mut() {
            if let Some(element) = entry.element.take() {
                scene.remove(element);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop the drawing of `id` (if any) and draw it again.
    pub fn redraw<S: SceneDocument>(
        &mut self,
        scene: &mut S,
        id: OrderId,
        painter: &OrderPainter<'_>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        let order = Arc::clone(&entry.order);
        if let Some(old) = entry.element.take() {
            scene.remove(old);
        }
        let element = painter.draw(scene, &order, self);
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.element = element;
        }
        true
    }

    pub fn redraw_all<S: SceneDocument>(&mut self, scene: &mut S, painter: &OrderPainter<'_>) {
        let ids: Vec<OrderId> = self.entries.keys().copied().collect();
        for id in ids {
            self.redraw(scene, id, painter);
        }
    }

    /// Redraw every dependent order. Returns how many were redrawn.
    pub fn redraw_dependents<S: SceneDocument>(
        &mut self,
        scene: &mut S,
        painter: &OrderPainter<'_>,
    ) -> usize {
        let ids: Vec<OrderId> = self
            .entries
            .values()
            .filter(|entry| entry.order.is_dependent())
            .map(|entry| entry.order.id)
            .collect();
        for id in &ids {
            self.redraw(scene, *id, painter);
        }
        ids.len()
    }
}

/// Whether a dependent order has the partner order it relies on.
pub fn is_matched(order: &Order, ledger: &OrderLedger) -> bool {
    match &order.kind {
        OrderKind::Support { supported, dest } => {
            let partner = ledger
                .orders()
                .find(|other| other.id != order.id && &other.source == supported);
            match (dest, partner) {
                (Some(dest), Some(partner)) => partner.destination() == Some(dest.as_str()),
                (Some(_), None) => false,
                (None, Some(partner)) => partner.destination().is_none(),
                (None, None) => true,
            }
        }
        OrderKind::Convoy { from, to } => ledger.orders().any(|other| {
            other.id != order.id
                && other.unit == UnitKind::Army
                && &other.source == from
                && matches!(&other.kind, OrderKind::Move { dest, .. } if dest == to)
        }),
        _ => true,
    }
}

/// Everything needed to turn an order into a scene element.
pub struct OrderPainter<'a> {
    pub descriptor: &'a MapDescriptor,
    pub trackers: &'a TrackerTable,
    pub layers: &'a LayerManager,
}

impl OrderPainter<'_> {
    fn point(&self, region: &str, slot: UnitSlot, order: &Order) -> Option<Point> {
        let tracker = self.trackers.get(region)?;
        let coast = if region == order.source {
            order.coast
        } else {
            None
        };
        Some(tracker.unit_point(slot, coast))
    }

    fn path(&self, order: &Order, offset: f64) -> Option<String> {
        let source_slot = match order.kind {
            OrderKind::Retreat { .. } => UnitSlot::Dislodged,
            _ => UnitSlot::Occupant,
        };
        let source = self.point(&order.source, source_slot, order)?;
        let occupant = |region: &str| self.point(region, UnitSlot::Occupant, order);

        let d = match &order.kind {
            OrderKind::Hold | OrderKind::Disband | OrderKind::Build | OrderKind::Remove => {
                let r = HOLD_RADIUS;
                format!(
                    "M {} {} h {} v {} h {} Z",
                    source.x - r,
                    source.y - r,
                    2.0 * r,
                    2.0 * r,
                    -2.0 * r
                )
            }
            OrderKind::Move { dest, .. } | OrderKind::Retreat { dest } => {
                let end = shorten(source, occupant(dest)?, offset);
                format!("M {} {} L {} {}", source.x, source.y, end.x, end.y)
            }
            OrderKind::Support { supported, dest } => {
                let via = occupant(supported)?;
                let mut d = format!("M {} {} L {} {}", source.x, source.y, via.x, via.y);
                if let Some(dest) = dest {
                    let end = shorten(via, occupant(dest)?, offset);
                    d.push_str(&format!(" L {} {}", end.x, end.y));
                }
                d
            }
            OrderKind::Convoy { from, to } => {
                let start = occupant(from)?;
                let end = shorten(source, occupant(to)?, offset);
                format!(
                    "M {} {} L {} {} L {} {}",
                    start.x, start.y, source.x, source.y, end.x, end.y
                )
            }
        };
        Some(d)
    }

    /// Draw `order` into its subgroup. Returns `None` (and logs) when the
    /// order refers to an unknown faction or region.
    pub fn draw<S: SceneDocument>(
        &self,
        scene: &mut S,
        order: &Order,
        ledger: &OrderLedger,
    ) -> Option<ElementHandle> {
        let z = ZPriority::for_order(&order.kind);
        let Some(group) = self.layers.order_group(&order.faction, z) else {
            warn!(order = %order.id, faction = %order.faction, "no order layer for faction");
            return None;
        };
        let kind = order.kind.name();
        let drawing = self.descriptor.drawing_for(kind);
        let Some(d) = self.path(order, drawing.highlight_offset) else {
            warn!(order = %order.id, source = %order.source, "order refers to an unknown region");
            return None;
        };

        let mut class = format!("order order_{kind} order_{}", order.faction);
        if order.is_dependent() && !is_matched(order, ledger) {
            class.push(' ');
            class.push_str(UNMATCHED_CLASS);
        }

        let element = scene.create_element("path", Some(&format!("order-{}", order.id)));
        scene.set_attribute(element, "d", &d);
        scene.set_class(element, &class);
        scene.set_attribute(element, "stroke", &rgb_hex(self.descriptor.faction_rgb(&order.faction)));
        scene.set_attribute(element, "stroke-width", &drawing.stroke_width.to_string());
        if let Some(marker) = &drawing.marker {
            scene.set_attribute(element, "marker-end", &format!("url(#{marker})"));
        }
        if let Some(filter) = &drawing.filter {
            scene.set_attribute(element, "filter", &format!("url(#{filter})"));
        }
        if drawing.dashed {
            scene.set_attribute(element, "stroke-dasharray", "4 2");
        }
        scene.append_child(group, element);
        Some(element)
    }
}

/// Pull `to` back towards `from` by `offset`, so lines stop short of the
/// symbol at their end.
fn shorten(from: Point, to: Point, offset: f64) -> Point {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let length = (dx * dx + dy * dy).sqrt();
    if offset <= 0.0 || length <= offset {
        return to;
    }
    let scale = (length - offset) / length;
    Point::new(from.x + dx * scale, from.y + dy * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::SUPPLY_CENTER_LAYER;
    use crate::scene::{RetainedScene, build_skeleton};
    use crate::test_support::descriptor;
    use crate::tracker::SymbolSet;

    struct Fixture {
        descriptor: MapDescriptor,
        scene: RetainedScene,
        trackers: TrackerTable,
        layers: LayerManager,
    }

    impl Fixture {
        fn new() -> Self {
            let descriptor = descriptor();
            let mut scene = build_skeleton(&descriptor);
            let symbols = SymbolSet::bind(&scene, &descriptor).expect("symbols");
            let layers = LayerManager::bind(&mut scene, &descriptor).expect("layers");
            let sc_layer = scene.element_by_id(SUPPLY_CENTER_LAYER).expect("sc layer");
            let trackers = TrackerTable::bind(&mut scene, &descriptor, &symbols, sc_layer, false)
                .expect("trackers");
            Self {
                descriptor,
                scene,
                trackers,
                layers,
            }
        }

        fn draw_all(&mut self, ledger: &mut OrderLedger) {
            let painter = OrderPainter {
                descriptor: &self.descriptor,
                trackers: &self.trackers,
                layers: &self.layers,
            };
            ledger.redraw_all(&mut self.scene, &painter);
        }
    }

    fn support_move(id: u64) -> Arc<Order> {
        Arc::new(Order::new(
            id,
            "france",
            UnitKind::Army,
            "pic",
            OrderKind::Support {
                supported: "par".to_string(),
                dest: Some("bre".to_string()),
            },
        ))
    }

    fn move_order(id: u64, from: &str, to: &str) -> Arc<Order> {
        Arc::new(Order::new(
            id,
            "france",
            UnitKind::Army,
            from,
            OrderKind::Move {
                dest: to.to_string(),
                dest_coast: None,
            },
        ))
    }

    #[test]
    fn move_is_drawn_in_z1_subgroup_with_descriptor_styling() {
        let mut fx = Fixture::new();
        let mut ledger = OrderLedger::default();
        ledger.load(&[move_order(1, "par", "pic")]);
        fx.draw_all(&mut ledger);

        let element = ledger.element(OrderId(1)).expect("drawn");
        let group = fx
            .layers
            .order_group(&FactionId::new("france"), ZPriority::Z1)
            .expect("group");
        assert_eq!(fx.scene.parent(element), Some(group));
        assert_eq!(fx.scene.class(element), Some("order order_move order_france"));
        assert_eq!(fx.scene.attribute(element, "d"), Some("M 200 200 L 100 100"));
        assert_eq!(fx.scene.attribute(element, "stroke-width"), Some("3"));
        assert_eq!(fx.scene.attribute(element, "marker-end"), Some("url(#arrow)"));
        assert_eq!(fx.scene.attribute(element, "stroke"), Some("#3050f0"));
    }

    #[test]
    fn support_without_partner_is_unmatched() {
        let mut fx = Fixture::new();
        let mut ledger = OrderLedger::default();
        ledger.load(&[support_move(1)]);
        fx.draw_all(&mut ledger);

        let element = ledger.element(OrderId(1)).expect("drawn");
        let class = fx.scene.class(element).expect("class");
        assert!(class.contains(UNMATCHED_CLASS));
        assert_eq!(fx.scene.attribute(element, "stroke-dasharray"), Some("4 2"));
    }

    #[test]
    fn redrawing_dependents_picks_up_new_partner() {
        let mut fx = Fixture::new();
        let mut ledger = OrderLedger::default();
        ledger.load(&[support_move(1)]);
        fx.draw_all(&mut ledger);
        let live = fx.scene.len();

        ledger.insert(&mut fx.scene, move_order(2, "par", "bre"));
        let painter = OrderPainter {
            descriptor: &fx.descriptor,
            trackers: &fx.trackers,
            layers: &fx.layers,
        };
        assert_eq!(ledger.redraw_dependents(&mut fx.scene, &painter), 1);

        let fresh = ledger.element(OrderId(1)).expect("redrawn");
        assert!(!fx.scene.class(fresh).expect("class").contains(UNMATCHED_CLASS));
        let group = fx
            .layers
            .order_group(&FactionId::new("france"), ZPriority::Z2)
            .expect("group");
        assert_eq!(fx.scene.children(group), &[fresh]);
        assert_eq!(fx.scene.len(), live);
    }

    #[test]
    fn support_hold_matches_unordered_or_holding_partner() {
        let hold_support = Order::new(
            1,
            "france",
            UnitKind::Army,
            "pic",
            OrderKind::Support {
                supported: "par".to_string(),
                dest: None,
            },
        );
        let mut ledger = OrderLedger::default();
        assert!(is_matched(&hold_support, &ledger));
        ledger.load(&[move_order(2, "par", "bre")]);
        assert!(!is_matched(&hold_support, &ledger));
    }

    #[test]
    fn convoy_needs_matching_army_move() {
        let convoy = Order::new(
            1,
            "england",
            UnitKind::Fleet,
            "eng",
            OrderKind::Convoy {
                from: "pic".to_string(),
                to: "bre".to_string(),
            },
        );
        let mut ledger = OrderLedger::default();
        ledger.load(&[move_order(2, "pic", "par")]);
        assert!(!is_matched(&convoy, &ledger));
        ledger.load(&[move_order(2, "pic", "bre")]);
        assert!(is_matched(&convoy, &ledger));

        let fleet_move = Order::new(
            3,
            "france",
            UnitKind::Fleet,
            "pic",
            OrderKind::Move {
                dest: "bre".to_string(),
                dest_coast: None,
            },
        );
        ledger.load(&[Arc::new(fleet_move)]);
        assert!(!is_matched(&convoy, &ledger));
    }

    #[test]
    fn unknown_faction_or_region_is_skipped() {
        let mut fx = Fixture::new();
        let mut ledger = OrderLedger::default();
        ledger.load(&[
            Arc::new(Order::new(1, "russia", UnitKind::Army, "par", OrderKind::Hold)),
            move_order(2, "par", "mos"),
        ]);
        fx.draw_all(&mut ledger);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.element(OrderId(1)).is_none());
        assert!(ledger.element(OrderId(2)).is_none());
    }

    #[test]
    fn remove_detaches_drawing() {
        let mut fx = Fixture::new();
        let mut ledger = OrderLedger::default();
        ledger.load(&[move_order(1, "par", "pic")]);
        fx.draw_all(&mut ledger);
        let element = ledger.element(OrderId(1)).expect("drawn");

        assert!(ledger.remove(&mut fx.scene, OrderId(1)).is_some());
        assert!(!fx.scene.is_attached(element));
        assert!(ledger.remove(&mut fx.scene, OrderId(1)).is_none());
    }

    #[test]
    fn shorten_stops_short_of_target() {
        let end = shorten(Point::new(0.0, 0.0), Point::new(10.0, 0.0), 4.0);
        assert_eq!(end, Point::new(6.0, 0.0));
        let end = shorten(Point::new(0.0, 0.0), Point::new(3.0, 0.0), 4.0);
        assert_eq!(end, Point::new(3.0, 0.0));
    }
}
