use std::cell::{Cell, RefCell};
use std::rc::Rc;

use relay_core::debounce::Debouncer;
use relay_core::guard::EchoGuard;
use relay_core::readiness::{self, Readiness};
use tokio::task::JoinHandle;

use crate::host::{EditorHandle, Host, NodeId, RemoteChannel};
use crate::language::{self, PLAIN_TEXT};
use crate::protocol::{
    ContentChanged, CreateOptions, EditorOptions, EditorProperties, EVENT_CONTENT_CHANGED,
};
use crate::settings::AdapterSettings;

/// Where an adapter is in its one-way lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the parent element to appear in the DOM.
    AwaitingAnchor,
    /// Container attached; the editor library is still bootstrapping.
    Mounted,
    /// Editor created and wired to the server.
    Live,
    /// The anchor never appeared within the retry budget, or no container
    /// could be attached to it.
    Abandoned,
    Destroyed,
}

struct State {
    content: String,
    language: String,
    read_only: bool,
    phase: Phase,
    container: Option<NodeId>,
}

struct Shared {
    anchor: String,
    host: Host,
    channel: Rc<dyn RemoteChannel>,
    settings: AdapterSettings,
    state: RefCell<State>,
    editor: RefCell<Option<Rc<dyn EditorHandle>>>,
    echo: EchoGuard,
    notify: Debouncer,
    mount_poller: RefCell<Option<JoinHandle<()>>>,
    destroyed: Cell<bool>,
}

impl Shared {
    fn editor(&self) -> Option<Rc<dyn EditorHandle>> {
        self.editor.borrow().clone()
    }
}

/// Client half of a remote Monaco editor widget.
///
/// Owns at most one editor instance and the container element it lives in.
/// Server property pushes go through the `set_*` methods; user edits reach the
/// server as debounced `contentChanged` notifications on the channel.
///
/// Must be created from within a `tokio::task::LocalSet`.
pub struct EditorAdapter {
    shared: Rc<Shared>,
}

impl EditorAdapter {
    pub fn new(
        properties: EditorProperties,
        host: &Host,
        channel: Rc<dyn RemoteChannel>,
        settings: &AdapterSettings,
    ) -> Self {
        let shared = Rc::new(Shared {
            anchor: properties.parent,
            host: host.clone(),
            channel,
            settings: settings.clone(),
            state: RefCell::new(State {
                content: properties.content,
                language: properties.language,
                read_only: properties.read_only,
                phase: Phase::AwaitingAnchor,
                container: None,
            }),
            editor: RefCell::new(None),
            echo: EchoGuard::new(),
            notify: Debouncer::new(settings.debounce()),
            mount_poller: RefCell::new(None),
            destroyed: Cell::new(false),
        });
        begin_mount(&shared);
        EditorAdapter { shared }
    }

    pub fn anchor(&self) -> &str {
        &self.shared.anchor
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.borrow().phase
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.get()
    }

    pub fn container(&self) -> Option<NodeId> {
        self.shared.state.borrow().container
    }

    /// Current text: the live editor's value once mounted, the last known
    /// value otherwise.
    pub fn content(&self) -> String {
        match self.shared.editor() {
            Some(editor) => editor.value(),
            None => self.shared.state.borrow().content.clone(),
        }
    }

    /// Language tag as last received from the server.
    pub fn language(&self) -> String {
        self.shared.state.borrow().language.clone()
    }

    pub fn editor_language(&self) -> &'static str {
        language::to_monaco_language(Some(self.shared.state.borrow().language.as_str()))
    }

    pub fn is_read_only(&self) -> bool {
        self.shared.state.borrow().read_only
    }

    pub fn has_pending_notify(&self) -> bool {
        self.shared.notify.is_pending()
    }

    pub fn set_content(&self, value: Option<&str>) {
        let shared = &self.shared;
        if shared.destroyed.get() {
            return;
        }
        let value = value.unwrap_or_default().to_string();
        shared.state.borrow_mut().content = value.clone();

        // A server value supersedes any edit still inside the debounce window.
        if shared.notify.cancel() {
            log::debug!(
                "Server content for {} superseded a pending edit",
                shared.anchor
            );
        }

        let Some(editor) = shared.editor() else {
            return;
        };
        if editor.value() != value {
            shared.echo.run(|| editor.set_value(&value));
        }
    }

    pub fn set_language(&self, value: Option<&str>) {
        let shared = &self.shared;
        if shared.destroyed.get() {
            return;
        }
        let value = value.unwrap_or(PLAIN_TEXT).to_string();
        let mapped = language::to_monaco_language(Some(value.as_str()));
        shared.state.borrow_mut().language = value;
        if let Some(editor) = shared.editor() {
            editor.set_language(mapped);
        }
    }

    pub fn set_read_only(&self, read_only: bool) {
        let shared = &self.shared;
        if shared.destroyed.get() {
            return;
        }
        shared.state.borrow_mut().read_only = read_only;
        if let Some(editor) = shared.editor() {
            editor.update_options(&EditorOptions::read_only(read_only));
        }
    }

    /// Tear down the editor and its container. Safe to call more than once.
    ///
    /// An edit still waiting in the debounce window is dropped, not flushed.
    pub fn dispose(&self) {
        let shared = &self.shared;
        if shared.destroyed.replace(true) {
            return;
        }

        let poller = shared.mount_poller.borrow_mut().take();
        if let Some(poller) = poller {
            poller.abort();
        }
        if shared.notify.cancel() {
            log::debug!("Dropping unsent edit for {} on dispose", shared.anchor);
        }

        let editor = shared.editor.borrow_mut().take();
        if let Some(editor) = editor {
            if let Err(e) = editor.dispose() {
                log::debug!("Ignoring editor dispose error for {}: {}", shared.anchor, e);
            }
        }

        let container = {
            let mut state = shared.state.borrow_mut();
            state.phase = Phase::Destroyed;
            state.container.take()
        };
        if let Some(node) = container {
            if shared.host.dom.is_attached(node) {
                shared.host.dom.remove_node(node);
            }
        }
        log::debug!("Disposed editor adapter for {}", shared.anchor);
    }
}

impl Drop for EditorAdapter {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ---------------------------------------------------------------------------
// Mount
// ---------------------------------------------------------------------------

fn begin_mount(shared: &Rc<Shared>) {
    if let Some(parent) = shared.host.dom.resolve_anchor(&shared.anchor) {
        mount(shared, parent);
        return;
    }

    log::debug!("Anchor {} not rendered yet, polling", shared.anchor);
    let policy = shared.settings.mount_policy();
    let weak = Rc::downgrade(shared);
    let poller = tokio::task::spawn_local(async move {
        let readiness = readiness::poll_until(
            policy,
            || weak.upgrade().map_or(true, |s| s.destroyed.get()),
            || {
                let s = weak.upgrade()?;
                let node = s.host.dom.resolve_anchor(&s.anchor);
                node
            },
        )
        .await;
        let Some(shared) = weak.upgrade() else {
            return;
        };
        match readiness {
            Readiness::Ready(parent) => mount(&shared, parent),
            Readiness::Exhausted { attempts } => {
                log::debug!(
                    "Anchor {} not found after {} attempts, giving up",
                    shared.anchor,
                    attempts
                );
                shared.state.borrow_mut().phase = Phase::Abandoned;
            }
            Readiness::Cancelled => {}
        }
    });
    *shared.mount_poller.borrow_mut() = Some(poller);
}

fn mount(shared: &Rc<Shared>, parent: NodeId) {
    let style = shared.settings.container_style();
    let container = match shared.host.dom.create_container(parent, &style) {
        Ok(node) => node,
        Err(e) => {
            log::warn!("Failed to create editor container for {}: {}", shared.anchor, e);
            shared.state.borrow_mut().phase = Phase::Abandoned;
            return;
        }
    };
    {
        let mut state = shared.state.borrow_mut();
        state.container = Some(container);
        state.phase = Phase::Mounted;
    }

    let loader = shared.host.loader.clone();
    let weak = Rc::downgrade(shared);
    tokio::task::spawn_local(async move {
        let loaded = loader.ensure_loaded().await;
        let Some(shared) = weak.upgrade() else {
            return;
        };
        match loaded {
            Ok(()) => create_editor(&shared, container),
            Err(e) => log::warn!("{} (editor for {})", e, shared.anchor),
        }
    });
}

fn create_editor(shared: &Rc<Shared>, container: NodeId) {
    if shared.destroyed.get() || !shared.host.dom.is_attached(container) {
        log::debug!("Editor for {} torn down before bootstrap finished", shared.anchor);
        return;
    }

    let options = {
        let state = shared.state.borrow();
        CreateOptions {
            value: state.content.clone(),
            language: language::to_monaco_language(Some(state.language.as_str())).to_string(),
            options: EditorOptions {
                read_only: Some(state.read_only),
                ..shared.settings.layout_options()
            },
        }
    };
    let editor = match shared.host.loader.create(container, &options) {
        Ok(editor) => editor,
        Err(e) => {
            log::warn!("Failed to create editor for {}: {}", shared.anchor, e);
            return;
        }
    };

    let weak = Rc::downgrade(shared);
    editor.on_content_change(Box::new(move || {
        if let Some(shared) = weak.upgrade() {
            on_user_change(&shared);
        }
    }));
    let weak = Rc::downgrade(shared);
    editor.on_blur(Box::new(move || {
        if let Some(shared) = weak.upgrade() {
            flush(&shared);
        }
    }));

    *shared.editor.borrow_mut() = Some(editor);
    shared.state.borrow_mut().phase = Phase::Live;
    log::debug!("Editor for {} is live ({})", shared.anchor, options.language);
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

fn on_user_change(shared: &Rc<Shared>) {
    if shared.destroyed.get() || shared.echo.is_active() {
        return;
    }
    let weak = Rc::downgrade(shared);
    shared.notify.schedule(move || {
        if let Some(shared) = weak.upgrade() {
            notify_server(&shared);
        }
    });
}

fn flush(shared: &Shared) {
    shared.notify.cancel();
    notify_server(shared);
}

fn notify_server(shared: &Shared) {
    if shared.destroyed.get() || shared.state.borrow().read_only {
        return;
    }
    let Some(editor) = shared.editor() else {
        return;
    };
    let content = editor.value();
    shared.state.borrow_mut().content = content.clone();

    let payload = match serde_json::to_value(ContentChanged { content }) {
        Ok(v) => v,
        Err(e) => {
            log::error!("Failed to serialize content change: {}", e);
            return;
        }
    };
    if let Err(e) = shared.channel.notify(EVENT_CONTENT_CHANGED, payload) {
        log::warn!("Failed to notify server for {}: {}", shared.anchor, e);
    }
}
