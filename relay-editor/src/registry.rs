use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::adapter::EditorAdapter;
use crate::host::{Host, RemoteChannel};
use crate::protocol::{
    ClientOperation, EditorProperties, Properties, ServerOperation, EVENT_CONTENT_CHANGED,
    MONACO_REMOTE_TYPE, PROP_CONTENT, PROP_LANGUAGE, PROP_READ_ONLY,
};
use crate::settings::AdapterSettings;

/// Declares a remote widget type: which properties the server may push after
/// creation and which events the client may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeHandler {
    pub remote_type: &'static str,
    pub properties: &'static [&'static str],
    pub events: &'static [&'static str],
}

impl TypeHandler {
    pub fn syncs_property(&self, name: &str) -> bool {
        self.properties.contains(&name)
    }

    pub fn emits_event(&self, name: &str) -> bool {
        self.events.contains(&name)
    }
}

pub const MONACO_EDITOR_HANDLER: TypeHandler = TypeHandler {
    remote_type: MONACO_REMOTE_TYPE,
    properties: &[PROP_CONTENT, PROP_LANGUAGE, PROP_READ_ONLY],
    events: &[EVENT_CONTENT_CHANGED],
};

/// Transport carrying client operations back to the server.
pub trait NotifySink {
    fn send(&self, operation: ClientOperation) -> Result<(), String>;
}

/// A `RemoteChannel` bound to one remote object id.
pub struct BoundChannel {
    target: String,
    sink: Rc<dyn NotifySink>,
    events: &'static [&'static str],
}

impl BoundChannel {
    pub fn new(target: &str, sink: Rc<dyn NotifySink>, events: &'static [&'static str]) -> Self {
        BoundChannel {
            target: target.to_string(),
            sink,
            events,
        }
    }
}

impl RemoteChannel for BoundChannel {
    fn notify(&self, event: &str, properties: Value) -> Result<(), String> {
        if !self.events.contains(&event) {
            return Err(format!(
                "Event '{}' is not declared for {}",
                event, self.target
            ));
        }
        self.sink.send(ClientOperation::Notify {
            target: self.target.clone(),
            event: event.to_string(),
            properties,
        })
    }
}

/// Owns the live adapters of one UI session, keyed by remote object id.
pub struct AdapterRegistry {
    handler: TypeHandler,
    host: Host,
    sink: Rc<dyn NotifySink>,
    settings: AdapterSettings,
    adapters: HashMap<String, EditorAdapter>,
}

impl AdapterRegistry {
    pub fn new(host: Host, sink: Rc<dyn NotifySink>, settings: AdapterSettings) -> Self {
        AdapterRegistry {
            handler: MONACO_EDITOR_HANDLER,
            host,
            sink,
            settings,
            adapters: HashMap::new(),
        }
    }

    pub fn get(&self, target: &str) -> Option<&EditorAdapter> {
        self.adapters.get(target)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// True while any adapter holds an edit inside its debounce window.
    pub fn has_pending_notify(&self) -> bool {
        self.adapters.values().any(EditorAdapter::has_pending_notify)
    }

    pub fn apply(&mut self, operation: ServerOperation) -> Result<(), String> {
        match operation {
            ServerOperation::Create {
                target,
                remote_type,
                properties,
            } => self.create(target, &remote_type, &properties),
            ServerOperation::Set { target, properties } => self.set(&target, &properties),
            ServerOperation::Destroy { target } => self.destroy(&target),
        }
    }

    fn create(
        &mut self,
        target: String,
        remote_type: &str,
        properties: &Properties,
    ) -> Result<(), String> {
        if remote_type != self.handler.remote_type {
            return Err(format!("Unknown remote type '{}' for {}", remote_type, target));
        }
        if self.adapters.contains_key(&target) {
            return Err(format!("Remote object {} already exists", target));
        }
        let channel = Rc::new(BoundChannel::new(
            &target,
            self.sink.clone(),
            self.handler.events,
        ));
        let adapter = EditorAdapter::new(
            EditorProperties::from_properties(properties),
            &self.host,
            channel,
            &self.settings,
        );
        log::debug!("Created {} for anchor {}", target, adapter.anchor());
        self.adapters.insert(target, adapter);
        Ok(())
    }

    fn set(&mut self, target: &str, properties: &Properties) -> Result<(), String> {
        let adapter = self
            .adapters
            .get(target)
            .ok_or_else(|| format!("Unknown remote object {}", target))?;
        for (name, value) in properties {
            if !self.handler.syncs_property(name) {
                log::warn!("Ignoring unsynchronized property '{}' on {}", name, target);
                continue;
            }
            match name.as_str() {
                PROP_CONTENT => adapter.set_content(value.as_str()),
                PROP_LANGUAGE => adapter.set_language(value.as_str()),
                PROP_READ_ONLY => adapter.set_read_only(value == &Value::Bool(true)),
                _ => log::warn!("No setter for property '{}' on {}", name, target),
            }
        }
        Ok(())
    }

    fn destroy(&mut self, target: &str) -> Result<(), String> {
        let adapter = self
            .adapters
            .remove(target)
            .ok_or_else(|| format!("Unknown remote object {}", target))?;
        adapter.dispose();
        log::debug!("Destroyed {}", target);
        Ok(())
    }
}
