//! Adapter over the retained visual tree the engine mutates.
//!
//! The tree is supplied fully built (layer groups, symbol templates and one
//! highlight element per region). The engine creates and removes its own
//! elements, moves them between groups and rewrites attributes.

use std::collections::{BTreeMap, HashMap};

use parley_shared::MapDescriptor;

use crate::layers::{
    BRIEF_LABEL_LAYER, DISLODGED_UNIT_LAYER, FULL_LABEL_LAYER, MAP_LAYER, ORDER_LAYER,
    SUPPLY_CENTER_LAYER, UNIT_LAYER,
};
use crate::tracker::{
    ARMY_SYMBOL, DISLODGED_ARMY_SYMBOL, DISLODGED_FLEET_SYMBOL, FLEET_SYMBOL,
    SUPPLY_CENTER_SYMBOL,
};

/// Opaque handle to an element of a [`SceneDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(u32);

impl ElementHandle {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

pub trait SceneDocument {
    fn root(&self) -> ElementHandle;

    fn element_by_id(&self, id: &str) -> Option<ElementHandle>;

    fn element_id(&self, element: ElementHandle) -> Option<&str>;

    /// Create a detached element.
    fn create_element(&mut self, tag: &str, id: Option<&str>) -> ElementHandle;

    fn append_child(&mut self, parent: ElementHandle, child: ElementHandle);

    /// Insert `child` into `parent` directly before `reference`; appends when
    /// `reference` is not a child of `parent`.
    fn insert_before(&mut self, parent: ElementHandle, child: ElementHandle, reference: ElementHandle);

    fn detach(&mut self, element: ElementHandle);

    /// Detach `element` and destroy it with its subtree. The handle (and any
    /// handle into the subtree) must not be used afterwards.
    fn remove(&mut self, element: ElementHandle);

    fn parent(&self, element: ElementHandle) -> Option<ElementHandle>;

    fn attribute(&self, element: ElementHandle, name: &str) -> Option<&str>;

    fn set_attribute(&mut self, element: ElementHandle, name: &str, value: &str);

    fn class(&self, element: ElementHandle) -> Option<&str> {
        self.attribute(element, "class")
    }

    fn set_class(&mut self, element: ElementHandle, class: &str) {
        self.set_attribute(element, "class", class);
    }

    fn is_visible(&self, element: ElementHandle) -> bool {
        self.attribute(element, "visibility") != Some("hidden")
    }

    fn set_visible(&mut self, element: ElementHandle, visible: bool) {
        let value = if visible { "visible" } else { "hidden" };
        self.set_attribute(element, "visibility", value);
    }
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    id: Option<String>,
    attributes: BTreeMap<String, String>,
    parent: Option<ElementHandle>,
    children: Vec<ElementHandle>,
}

impl Node {
    fn new(tag: &str, id: Option<&str>) -> Self {
        Self {
            tag: tag.to_string(),
            id: id.map(str::to_string),
            attributes: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// In-memory [`SceneDocument`] backed by an arena.
///
/// Removed elements free their slot for the next [`create_element`]; a
/// handle is only valid until its element is removed. Every mutating call
/// bumps [`RetainedScene::mutation_count`].
///
/// [`create_element`]: SceneDocument::create_element
#[derive(Debug, Clone)]
pub struct RetainedScene {
    nodes: Vec<Option<Node>>,
    free: Vec<u32>,
    ids: HashMap<String, ElementHandle>,
    mutations: u64,
}

impl Default for RetainedScene {
    fn default() -> Self {
        Self::new()
    }
}

impl RetainedScene {
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node::new("svg", None))],
            free: Vec::new(),
            ids: HashMap::new(),
            mutations: 0,
        }
    }

    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    /// Live elements, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots ever allocated, live or free.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn tag(&self, element: ElementHandle) -> Option<&str> {
        self.node(element).map(|node| node.tag.as_str())
    }

    pub fn children(&self, element: ElementHandle) -> &[ElementHandle] {
        self.node(element)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the element is reachable from the root.
    pub fn is_attached(&self, element: ElementHandle) -> bool {
        let root = self.root();
        let mut current = Some(element);
        while let Some(handle) = current {
            if handle == root {
                return true;
            }
            current = self.parent(handle);
        }
        false
    }

    fn node(&self, element: ElementHandle) -> Option<&Node> {
        self.nodes.get(element.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, element: ElementHandle) -> Option<&mut Node> {
        self.nodes.get_mut(element.index()).and_then(Option::as_mut)
    }

    fn unlink(&mut self, element: ElementHandle) {
        let Some(parent) = self.node(element).and_then(|node| node.parent) else {
            return;
        };
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|child| *child != element);
        }
        if let Some(node) = self.node_mut(element) {
            node.parent = None;
        }
    }

    fn free_subtree(&mut self, element: ElementHandle) {
        let Some(node) = self.nodes.get_mut(element.index()).and_then(Option::take) else {
            return;
        };
        if let Some(id) = &node.id
            && self.ids.get(id) == Some(&element)
        {
            self.ids.remove(id);
        }
        self.free.push(element.0);
        for child in node.children {
            self.free_subtree(child);
        }
    }
}

impl SceneDocument for RetainedScene {
    fn root(&self) -> ElementHandle {
        ElementHandle(0)
    }

    fn element_by_id(&self, id: &str) -> Option<ElementHandle> {
        self.ids.get(id).copied()
    }

    fn element_id(&self, element: ElementHandle) -> Option<&str> {
        self.node(element).and_then(|node| node.id.as_deref())
    }

    fn create_element(&mut self, tag: &str, id: Option<&str>) -> ElementHandle {
        let node = Some(Node::new(tag, id));
        let handle = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot as usize] = node;
                ElementHandle(slot)
            }
            None => {
                self.nodes.push(node);
                ElementHandle((self.nodes.len() - 1) as u32)
            }
        };
        if let Some(id) = id {
            self.ids.insert(id.to_string(), handle);
        }
        self.mutations += 1;
        handle
    }

    fn append_child(&mut self, parent: ElementHandle, child: ElementHandle) {
        if self.node(parent).is_none() || self.node(child).is_none() || child == self.root() {
            return;
        }
        self.unlink(child);
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        self.mutations += 1;
    }

    fn insert_before(
        &mut self,
        parent: ElementHandle,
        child: ElementHandle,
        reference: ElementHandle,
    ) {
        if self.node(parent).is_none() || self.node(child).is_none() || child == self.root() {
            return;
        }
        self.unlink(child);
        if let Some(node) = self.node_mut(parent) {
            match node.children.iter().position(|c| *c == reference) {
                Some(pos) => node.children.insert(pos, child),
                None => node.children.push(child),
            }
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        self.mutations += 1;
    }

    fn detach(&mut self, element: ElementHandle) {
        if self.parent(element).is_none() {
            return;
        }
        self.unlink(element);
        self.mutations += 1;
    }

    fn remove(&mut self, element: ElementHandle) {
        if element == self.root() || self.node(element).is_none() {
            return;
        }
        self.unlink(element);
        self.free_subtree(element);
        self.mutations += 1;
    }

    fn parent(&self, element: ElementHandle) -> Option<ElementHandle> {
        self.node(element).and_then(|node| node.parent)
    }

    fn attribute(&self, element: ElementHandle, name: &str) -> Option<&str> {
        self.node(element)
            .and_then(|node| node.attributes.get(name))
            .map(String::as_str)
    }

    fn set_attribute(&mut self, element: ElementHandle, name: &str, value: &str) {
        if let Some(node) = self.node_mut(element) {
            node.attributes.insert(name.to_string(), value.to_string());
            self.mutations += 1;
        }
    }
}

const DEFAULT_UNIT_SYMBOL_SIZE: f64 = 40.0;
const DEFAULT_SUPPLY_CENTER_SYMBOL_SIZE: f64 = 12.0;

/// Build the pre-rendered tree a host would normally load for `descriptor`.
///
/// The root starts hidden; `ShowMap` reveals it.
pub fn build_skeleton(descriptor: &MapDescriptor) -> RetainedScene {
    let mut scene = RetainedScene::new();
    let root = scene.root();
    scene.set_visible(root, false);

    let defs = scene.create_element("defs", None);
    scene.append_child(root, defs);
    for (symbol, fallback) in [
        (ARMY_SYMBOL, DEFAULT_UNIT_SYMBOL_SIZE),
        (FLEET_SYMBOL, DEFAULT_UNIT_SYMBOL_SIZE),
        (DISLODGED_ARMY_SYMBOL, DEFAULT_UNIT_SYMBOL_SIZE),
        (DISLODGED_FLEET_SYMBOL, DEFAULT_UNIT_SYMBOL_SIZE),
        (SUPPLY_CENTER_SYMBOL, DEFAULT_SUPPLY_CENTER_SYMBOL_SIZE),
    ] {
        let template = scene.create_element("symbol", Some(symbol));
        let size = descriptor.symbols.get(symbol);
        let width = size.map(|s| s.width).unwrap_or(fallback);
        let height = size.map(|s| s.height).unwrap_or(fallback);
        scene.set_attribute(template, "width", &width.to_string());
        scene.set_attribute(template, "height", &height.to_string());
        scene.append_child(defs, template);
    }

    let map_layer = scene.create_element("g", Some(MAP_LAYER));
    scene.append_child(root, map_layer);
    for region in &descriptor.regions {
        let highlight = scene.create_element("path", Some(&region.highlight_element_id()));
        scene.set_class(highlight, if region.land { "land" } else { "water" });
        scene.append_child(map_layer, highlight);
    }

    let label_layers = [
        (descriptor.labels.brief, BRIEF_LABEL_LAYER),
        (descriptor.labels.full, FULL_LABEL_LAYER),
    ];
    for (supported, layer_id) in label_layers {
        if !supported {
            continue;
        }
        let layer = scene.create_element("g", Some(layer_id));
        scene.append_child(root, layer);
        for region in &descriptor.regions {
            let label = scene.create_element("text", None);
            let text = if layer_id == BRIEF_LABEL_LAYER {
                region.name.as_str()
            } else {
                region.display_name()
            };
            scene.set_attribute(label, "text", text);
            if let Some(point) = region.anchors.unit {
                scene.set_attribute(label, "x", &point.x.to_string());
                scene.set_attribute(label, "y", &point.y.to_string());
            }
            scene.append_child(layer, label);
        }
    }

    for layer_id in [
        SUPPLY_CENTER_LAYER,
        UNIT_LAYER,
        DISLODGED_UNIT_LAYER,
        ORDER_LAYER,
    ] {
        let layer = scene.create_element("g", Some(layer_id));
        scene.append_child(root, layer);
    }

    scene
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_places_child_ahead_of_reference() {
        let mut scene = RetainedScene::new();
        let root = scene.root();
        let a = scene.create_element("g", Some("a"));
        let b = scene.create_element("g", Some("b"));
        let c = scene.create_element("g", Some("c"));
        scene.append_child(root, a);
        scene.insert_before(root, b, a);
        scene.insert_before(root, c, a);
        assert_eq!(scene.children(root), &[b, c, a]);
    }

    #[test]
    fn detach_unlinks_and_is_idempotent() {
        let mut scene = RetainedScene::new();
        let root = scene.root();
        let el = scene.create_element("use", None);
        scene.append_child(root, el);
        assert!(scene.is_attached(el));

        scene.detach(el);
        let after_first = scene.mutation_count();
        scene.detach(el);
        assert!(!scene.is_attached(el));
        assert_eq!(scene.mutation_count(), after_first);
        assert!(scene.children(root).is_empty());
    }

    #[test]
    fn removed_slots_are_reused() {
        let mut scene = RetainedScene::new();
        let root = scene.root();
        let group = scene.create_element("g", Some("group"));
        let child = scene.create_element("use", Some("child"));
        scene.append_child(root, group);
        scene.append_child(group, child);
        assert_eq!(scene.len(), 3);

        scene.remove(group);
        assert_eq!(scene.len(), 1);
        assert!(scene.children(root).is_empty());
        assert!(scene.element_by_id("group").is_none());
        assert!(scene.element_by_id("child").is_none());
        assert_eq!(scene.tag(child), None);

        let again = scene.create_element("use", Some("again"));
        let other = scene.create_element("use", None);
        assert!(again.index() < 3 && other.index() < 3);
        assert_eq!(scene.capacity(), 3);
        assert_eq!(scene.element_by_id("again"), Some(again));
    }

    #[test]
    fn removing_root_or_freed_element_is_a_no_op() {
        let mut scene = RetainedScene::new();
        let root = scene.root();
        let el = scene.create_element("use", None);
        scene.remove(el);
        let after = scene.mutation_count();
        scene.remove(el);
        scene.remove(root);
        assert_eq!(scene.mutation_count(), after);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn reattaching_moves_element_between_parents() {
        let mut scene = RetainedScene::new();
        let root = scene.root();
        let left = scene.create_element("g", None);
        let right = scene.create_element("g", None);
        let el = scene.create_element("use", None);
        scene.append_child(root, left);
        scene.append_child(root, right);
        scene.append_child(left, el);
        scene.append_child(right, el);
        assert!(scene.children(left).is_empty());
        assert_eq!(scene.children(right), &[el]);
        assert_eq!(scene.parent(el), Some(right));
    }

    #[test]
    fn visibility_defaults_to_visible() {
        let mut scene = RetainedScene::new();
        let el = scene.create_element("g", None);
        assert!(scene.is_visible(el));
        scene.set_visible(el, false);
        assert!(!scene.is_visible(el));
        assert_eq!(scene.attribute(el, "visibility"), Some("hidden"));
    }

    #[test]
    fn skeleton_contains_layers_templates_and_highlights() {
        let descriptor: MapDescriptor = serde_json::from_str(
            r#"{"regions": [{"name": "par"}, {"name": "eng", "land": false}],
                "labels": {"brief": true}}"#,
        )
        .expect("descriptor should parse");
        let scene = build_skeleton(&descriptor);

        for id in [
            MAP_LAYER,
            SUPPLY_CENTER_LAYER,
            UNIT_LAYER,
            DISLODGED_UNIT_LAYER,
            ORDER_LAYER,
            BRIEF_LABEL_LAYER,
            ARMY_SYMBOL,
            SUPPLY_CENTER_SYMBOL,
        ] {
            assert!(scene.element_by_id(id).is_some(), "missing {id}");
        }
        assert!(scene.element_by_id(FULL_LABEL_LAYER).is_none());

        let par = scene.element_by_id("_par").expect("par highlight");
        let eng = scene.element_by_id("_eng").expect("eng highlight");
        assert_eq!(scene.class(par), Some("land"));
        assert_eq!(scene.class(eng), Some("water"));
        assert!(!scene.is_visible(scene.root()));
    }
}
