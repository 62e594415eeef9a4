//! Server half of the remote editor widget.

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use relay_core::guard::EchoGuard;
use serde_json::Value;

use crate::language::PLAIN_TEXT;
use crate::protocol::{EVENT_CONTENT_CHANGED, PROP_CONTENT, PROP_LANGUAGE, PROP_READ_ONLY};

pub type ModifyListener = Rc<dyn Fn(&str)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Server-side handle on a client object: property pushes and teardown.
pub trait RemoteObject {
    fn set(&self, property: &str, value: Value) -> Result<(), String>;
    fn destroy(&self) -> Result<(), String>;
}

/// A text/code editor widget as seen by server-side application code.
pub trait ContentEditorWidget {
    fn text(&self) -> String;
    /// Replace the content. Modify listeners may fire.
    fn set_text(&self, text: Option<&str>);
    /// Replace the content without firing modify listeners, e.g. when loading
    /// a file so it is not marked as changed.
    fn set_text_suppress_modify(&self, text: Option<&str>);
    fn set_language(&self, language: Option<&str>);
    fn set_read_only(&self, read_only: bool);
    fn add_modify_listener(&self, listener: ModifyListener) -> ListenerId;
    fn remove_modify_listener(&self, id: ListenerId) -> bool;
}

pub struct RemoteEditorWidget {
    remote: Rc<dyn RemoteObject>,
    cached_content: RefCell<String>,
    listeners: RefCell<Vec<(ListenerId, ModifyListener)>>,
    next_listener: Cell<u64>,
    suppress_modify: EchoGuard,
    disposed: Cell<bool>,
}

impl RemoteEditorWidget {
    pub fn new(remote: Rc<dyn RemoteObject>) -> Self {
        RemoteEditorWidget::with_text(remote, "")
    }

    /// A widget whose client object was created with `text` already in place.
    pub fn with_text(remote: Rc<dyn RemoteObject>, text: &str) -> Self {
        RemoteEditorWidget {
            remote,
            cached_content: RefCell::new(text.to_string()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            suppress_modify: EchoGuard::new(),
            disposed: Cell::new(false),
        }
    }

    fn push(&self, property: &str, value: Value) {
        if self.disposed.get() {
            return;
        }
        if let Err(e) = self.remote.set(property, value) {
            log::warn!("Failed to push '{}' to editor widget: {}", property, e);
        }
    }

    /// Handle an event notification from the client.
    pub fn handle_notify(&self, event: &str, properties: &Value) {
        if event != EVENT_CONTENT_CHANGED || self.disposed.get() {
            return;
        }
        let Some(content) = properties.get(PROP_CONTENT) else {
            return;
        };
        *self.cached_content.borrow_mut() = content.as_str().unwrap_or_default().to_string();
        if self.suppress_modify.is_active() {
            return;
        }
        self.fire_modify();
    }

    fn fire_modify(&self) {
        let content = self.cached_content.borrow().clone();
        let snapshot: Vec<ModifyListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| listener(&content)));
            if result.is_err() {
                log::error!("Modify listener panicked; continuing with remaining listeners");
            }
        }
    }

    /// Destroy the client object. Errors are ignored; the widget is gone either way.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        if let Err(e) = self.remote.destroy() {
            log::debug!("Ignoring remote destroy error: {}", e);
        }
        self.listeners.borrow_mut().clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl ContentEditorWidget for RemoteEditorWidget {
    fn text(&self) -> String {
        self.cached_content.borrow().clone()
    }

    fn set_text(&self, text: Option<&str>) {
        let text = text.unwrap_or_default().to_string();
        *self.cached_content.borrow_mut() = text.clone();
        self.push(PROP_CONTENT, Value::String(text));
    }

    fn set_text_suppress_modify(&self, text: Option<&str>) {
        self.suppress_modify.run(|| self.set_text(text));
    }

    fn set_language(&self, language: Option<&str>) {
        let language = language.unwrap_or(PLAIN_TEXT).to_string();
        self.push(PROP_LANGUAGE, Value::String(language));
    }

    fn set_read_only(&self, read_only: bool) {
        self.push(PROP_READ_ONLY, Value::Bool(read_only));
    }

    fn add_modify_listener(&self, listener: ModifyListener) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    fn remove_modify_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}
