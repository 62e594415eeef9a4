//! Capabilities the adapter consumes from its host environment.
//!
//! All traits take `&self`: implementations live on a single UI thread and use
//! interior mutability. Listener callbacks may be invoked re-entrantly from
//! within `EditorHandle::set_value`, so implementations must not hold their own
//! borrows while calling them.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use serde_json::Value;

use crate::loader::LibraryLoader;
use crate::protocol::{ContainerStyle, CreateOptions, EditorOptions, LoaderConfig};

pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

pub type Listener = Box<dyn Fn()>;

/// Opaque handle to a DOM element owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

pub trait Dom {
    /// Resolve the element a server-side parent id is rendered into, if it
    /// exists yet.
    fn resolve_anchor(&self, anchor: &str) -> Option<NodeId>;
    /// Create a styled child element and append it to `parent`.
    fn create_container(&self, parent: NodeId, style: &ContainerStyle) -> Result<NodeId, String>;
    fn is_attached(&self, node: NodeId) -> bool;
    fn remove_node(&self, node: NodeId);
}

/// A live editor instance bound to a container element.
pub trait EditorHandle {
    fn value(&self) -> String;
    fn set_value(&self, value: &str);
    fn set_language(&self, language: &str);
    fn update_options(&self, options: &EditorOptions);
    /// Fires after every change to the model, programmatic or user-driven.
    fn on_content_change(&self, listener: Listener);
    /// Fires when the editor widget loses focus.
    fn on_blur(&self, listener: Listener);
    fn dispose(&self) -> Result<(), String>;
}

/// The editor library: loader configuration, async bootstrap and instance
/// factory.
pub trait EditorLibrary {
    fn configure(&self, config: &LoaderConfig);
    fn load(&self) -> LocalBoxFuture<'static, Result<(), String>>;
    fn create(
        &self,
        container: NodeId,
        options: &CreateOptions,
    ) -> Result<Rc<dyn EditorHandle>, String>;
}

/// Per-widget channel for pushing event notifications to the server.
pub trait RemoteChannel {
    fn notify(&self, event: &str, properties: Value) -> Result<(), String>;
}

/// Host services shared by every adapter on a page.
#[derive(Clone)]
pub struct Host {
    pub dom: Rc<dyn Dom>,
    pub loader: Rc<LibraryLoader>,
}

impl Host {
    pub fn new(dom: Rc<dyn Dom>, loader: Rc<LibraryLoader>) -> Self {
        Host { dom, loader }
    }
}
