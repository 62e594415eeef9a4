//! In-memory host used by the `relay` script runner and by tests.
//!
//! Nothing here renders; the DOM is a parent map, the editor a string with
//! listeners, and the server channel a log of operations.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use crate::host::{Dom, EditorHandle, EditorLibrary, Listener, LocalBoxFuture, NodeId};
use crate::protocol::{ClientOperation, ContainerStyle, CreateOptions, EditorOptions, LoaderConfig};
use crate::registry::NotifySink;

// ---------------------------------------------------------------------------
// DOM
// ---------------------------------------------------------------------------

struct NodeRecord {
    parent: Option<NodeId>,
    style: Option<ContainerStyle>,
}

#[derive(Default)]
pub struct HeadlessDom {
    anchors: RefCell<HashMap<String, NodeId>>,
    nodes: RefCell<HashMap<NodeId, NodeRecord>>,
    resolve_counts: RefCell<HashMap<String, u32>>,
    container_error: RefCell<Option<String>>,
    next_id: Cell<u64>,
}

impl HeadlessDom {
    pub fn new() -> Self {
        HeadlessDom::default()
    }

    fn allocate(&self, record: NodeRecord) -> NodeId {
        let id = NodeId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.nodes.borrow_mut().insert(id, record);
        id
    }

    /// Render an element for `anchor`, making it resolvable.
    pub fn add_anchor(&self, anchor: &str) -> NodeId {
        if let Some(existing) = self.anchors.borrow().get(anchor) {
            return *existing;
        }
        let id = self.allocate(NodeRecord {
            parent: None,
            style: None,
        });
        self.anchors.borrow_mut().insert(anchor.to_string(), id);
        id
    }

    /// Make the next `create_container` call fail with `message`.
    pub fn fail_next_container(&self, message: &str) {
        *self.container_error.borrow_mut() = Some(message.to_string());
    }

    pub fn resolve_count(&self, anchor: &str) -> u32 {
        self.resolve_counts
            .borrow()
            .get(anchor)
            .copied()
            .unwrap_or(0)
    }

    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.borrow().get(&node).and_then(|n| n.parent)
    }

    pub fn style_of(&self, node: NodeId) -> Option<ContainerStyle> {
        self.nodes.borrow().get(&node).and_then(|n| n.style.clone())
    }

    pub fn children_of(&self, parent: NodeId) -> Vec<NodeId> {
        let mut children: Vec<NodeId> = self
            .nodes
            .borrow()
            .iter()
            .filter(|(_, n)| n.parent == Some(parent))
            .map(|(id, _)| *id)
            .collect();
        children.sort_by_key(|id| id.0);
        children
    }
}

impl Dom for HeadlessDom {
    fn resolve_anchor(&self, anchor: &str) -> Option<NodeId> {
        *self
            .resolve_counts
            .borrow_mut()
            .entry(anchor.to_string())
            .or_insert(0) += 1;
        self.anchors.borrow().get(anchor).copied()
    }

    fn create_container(&self, parent: NodeId, style: &ContainerStyle) -> Result<NodeId, String> {
        if let Some(message) = self.container_error.borrow_mut().take() {
            return Err(message);
        }
        if !self.nodes.borrow().contains_key(&parent) {
            return Err(format!("Parent node {} does not exist", parent.0));
        }
        Ok(self.allocate(NodeRecord {
            parent: Some(parent),
            style: Some(style.clone()),
        }))
    }

    fn is_attached(&self, node: NodeId) -> bool {
        self.nodes
            .borrow()
            .get(&node)
            .is_some_and(|n| n.parent.is_some())
    }

    fn remove_node(&self, node: NodeId) {
        if let Some(record) = self.nodes.borrow_mut().get_mut(&node) {
            record.parent = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

pub struct HeadlessEditor {
    value: RefCell<String>,
    language: RefCell<String>,
    options: RefCell<EditorOptions>,
    change_listeners: RefCell<Vec<Rc<dyn Fn()>>>,
    blur_listeners: RefCell<Vec<Rc<dyn Fn()>>>,
    set_value_count: Cell<u32>,
    dispose_error: RefCell<Option<String>>,
    disposed: Cell<bool>,
}

impl HeadlessEditor {
    fn new(options: &CreateOptions) -> Self {
        HeadlessEditor {
            value: RefCell::new(options.value.clone()),
            language: RefCell::new(options.language.clone()),
            options: RefCell::new(options.options.clone()),
            change_listeners: RefCell::new(Vec::new()),
            blur_listeners: RefCell::new(Vec::new()),
            set_value_count: Cell::new(0),
            dispose_error: RefCell::new(None),
            disposed: Cell::new(false),
        }
    }

    fn fire(listeners: &RefCell<Vec<Rc<dyn Fn()>>>) {
        let snapshot: Vec<Rc<dyn Fn()>> = listeners.borrow().clone();
        for listener in snapshot {
            listener();
        }
    }

    /// Replace the model text the way a user edit would.
    pub fn type_text(&self, text: &str) {
        if self.disposed.get() {
            return;
        }
        *self.value.borrow_mut() = text.to_string();
        Self::fire(&self.change_listeners);
    }

    pub fn blur(&self) {
        if self.disposed.get() {
            return;
        }
        Self::fire(&self.blur_listeners);
    }

    pub fn language(&self) -> String {
        self.language.borrow().clone()
    }

    pub fn options(&self) -> EditorOptions {
        self.options.borrow().clone()
    }

    /// Number of programmatic `set_value` calls.
    pub fn set_value_count(&self) -> u32 {
        self.set_value_count.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub fn fail_dispose(&self, message: &str) {
        *self.dispose_error.borrow_mut() = Some(message.to_string());
    }
}

impl EditorHandle for HeadlessEditor {
    fn value(&self) -> String {
        self.value.borrow().clone()
    }

    fn set_value(&self, value: &str) {
        self.set_value_count.set(self.set_value_count.get() + 1);
        *self.value.borrow_mut() = value.to_string();
        Self::fire(&self.change_listeners);
    }

    fn set_language(&self, language: &str) {
        *self.language.borrow_mut() = language.to_string();
    }

    fn update_options(&self, options: &EditorOptions) {
        let mut current = self.options.borrow_mut();
        if options.read_only.is_some() {
            current.read_only = options.read_only;
        }
        if options.automatic_layout.is_some() {
            current.automatic_layout = options.automatic_layout;
        }
        if options.scroll_beyond_last_line.is_some() {
            current.scroll_beyond_last_line = options.scroll_beyond_last_line;
        }
        if options.minimap_enabled.is_some() {
            current.minimap_enabled = options.minimap_enabled;
        }
        if options.font_size.is_some() {
            current.font_size = options.font_size;
        }
    }

    fn on_content_change(&self, listener: Listener) {
        self.change_listeners.borrow_mut().push(Rc::from(listener));
    }

    fn on_blur(&self, listener: Listener) {
        self.blur_listeners.borrow_mut().push(Rc::from(listener));
    }

    fn dispose(&self) -> Result<(), String> {
        self.disposed.set(true);
        self.change_listeners.borrow_mut().clear();
        self.blur_listeners.borrow_mut().clear();
        match self.dispose_error.borrow_mut().take() {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct HeadlessLibrary {
    configured: RefCell<Vec<LoaderConfig>>,
    load_count: Cell<u32>,
    load_delay: Cell<Duration>,
    load_error: RefCell<Option<String>>,
    created: RefCell<Vec<CreateOptions>>,
    editors: RefCell<HashMap<NodeId, Rc<HeadlessEditor>>>,
}

impl HeadlessLibrary {
    pub fn new() -> Self {
        HeadlessLibrary::default()
    }

    /// Make subsequent loads take `delay` to complete.
    pub fn set_load_delay(&self, delay: Duration) {
        self.load_delay.set(delay);
    }

    pub fn fail_next_load(&self, message: &str) {
        *self.load_error.borrow_mut() = Some(message.to_string());
    }

    pub fn load_count(&self) -> u32 {
        self.load_count.get()
    }

    pub fn configured(&self) -> Vec<LoaderConfig> {
        self.configured.borrow().clone()
    }

    pub fn created_options(&self) -> Vec<CreateOptions> {
        self.created.borrow().clone()
    }

    /// The live editor created in `container`. Disposed editors are forgotten.
    pub fn editor_in(&self, container: NodeId) -> Option<Rc<HeadlessEditor>> {
        let mut editors = self.editors.borrow_mut();
        if editors.get(&container).is_some_and(|e| e.is_disposed()) {
            editors.remove(&container);
        }
        editors.get(&container).cloned()
    }

    pub fn live_editors(&self) -> usize {
        self.editors
            .borrow()
            .values()
            .filter(|e| !e.is_disposed())
            .count()
    }
}

impl EditorLibrary for HeadlessLibrary {
    fn configure(&self, config: &LoaderConfig) {
        self.configured.borrow_mut().push(config.clone());
    }

    fn load(&self) -> LocalBoxFuture<'static, Result<(), String>> {
        self.load_count.set(self.load_count.get() + 1);
        let delay = self.load_delay.get();
        let error = self.load_error.borrow_mut().take();
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match error {
                Some(message) => Err(message),
                None => Ok(()),
            }
        })
    }

    fn create(
        &self,
        container: NodeId,
        options: &CreateOptions,
    ) -> Result<Rc<dyn EditorHandle>, String> {
        let editor = Rc::new(HeadlessEditor::new(options));
        self.created.borrow_mut().push(options.clone());
        let mut editors = self.editors.borrow_mut();
        editors.retain(|_, e| !e.is_disposed());
        editors.insert(container, editor.clone());
        Ok(editor as Rc<dyn EditorHandle>)
    }
}

// ---------------------------------------------------------------------------
// Server channel
// ---------------------------------------------------------------------------

/// Records every client operation; can be switched into a failing mode.
#[derive(Default)]
pub struct RecordingSink {
    operations: RefCell<Vec<ClientOperation>>,
    failing: Cell<bool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        RecordingSink::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn operations(&self) -> Vec<ClientOperation> {
        self.operations.borrow().clone()
    }

    pub fn take(&self) -> Vec<ClientOperation> {
        std::mem::take(&mut *self.operations.borrow_mut())
    }
}

impl NotifySink for RecordingSink {
    fn send(&self, operation: ClientOperation) -> Result<(), String> {
        if self.failing.get() {
            return Err("connection closed".to_string());
        }
        self.operations.borrow_mut().push(operation);
        Ok(())
    }
}
