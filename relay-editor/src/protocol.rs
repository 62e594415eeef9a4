use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MONACO_REMOTE_TYPE: &str = "relay.MonacoEditor";

pub const PROP_PARENT: &str = "parent";
pub const PROP_CONTENT: &str = "content";
pub const PROP_LANGUAGE: &str = "language";
pub const PROP_READ_ONLY: &str = "readOnly";

pub const EVENT_CONTENT_CHANGED: &str = "contentChanged";

pub type Properties = Map<String, Value>;

// ---------------------------------------------------------------------------
// Operations: server → client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerOperation {
    #[serde(rename_all = "camelCase")]
    Create {
        target: String,
        remote_type: String,
        #[serde(default)]
        properties: Properties,
    },
    Set {
        target: String,
        #[serde(default)]
        properties: Properties,
    },
    Destroy {
        target: String,
    },
}

impl ServerOperation {
    pub fn target(&self) -> &str {
        match self {
            ServerOperation::Create { target, .. }
            | ServerOperation::Set { target, .. }
            | ServerOperation::Destroy { target } => target,
        }
    }
}

// ---------------------------------------------------------------------------
// Operations: client → server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientOperation {
    Notify {
        target: String,
        event: String,
        #[serde(default)]
        properties: Value,
    },
}

/// Payload of the `contentChanged` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChanged {
    pub content: String,
}

// ---------------------------------------------------------------------------
// Construction properties
// ---------------------------------------------------------------------------

/// Initial state of an editor widget as sent in the server's create operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorProperties {
    pub parent: String,
    pub content: String,
    pub language: String,
    pub read_only: bool,
}

impl Default for EditorProperties {
    fn default() -> Self {
        EditorProperties {
            parent: String::new(),
            content: String::new(),
            language: "plaintext".to_string(),
            read_only: false,
        }
    }
}

impl EditorProperties {
    /// Read construction properties leniently: nulls and wrongly typed values
    /// fall back to defaults, as a remote client would.
    pub fn from_properties(properties: &Properties) -> Self {
        let defaults = EditorProperties::default();
        EditorProperties {
            parent: string_prop(properties, PROP_PARENT).unwrap_or(defaults.parent),
            content: string_prop(properties, PROP_CONTENT).unwrap_or(defaults.content),
            language: string_prop(properties, PROP_LANGUAGE).unwrap_or(defaults.language),
            read_only: properties.get(PROP_READ_ONLY) == Some(&Value::Bool(true)),
        }
    }
}

pub fn string_prop(properties: &Properties, key: &str) -> Option<String> {
    properties
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Editor library options
// ---------------------------------------------------------------------------

/// Options passed to the editor library on creation and on `update_options`.
/// Unset fields are left untouched by the library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic_layout: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_beyond_last_line: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimap_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
}

impl EditorOptions {
    pub fn read_only(read_only: bool) -> Self {
        EditorOptions {
            read_only: Some(read_only),
            ..EditorOptions::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptions {
    pub value: String,
    pub language: String,
    #[serde(flatten)]
    pub options: EditorOptions,
}

/// Where the editor library is served from, applied once before loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderConfig {
    pub base_url: String,
}

impl LoaderConfig {
    /// Path of the editor's `vs` module root under the base URL.
    pub fn vs_path(&self) -> String {
        format!("{}/vs", self.base_url.trim_end_matches('/'))
    }
}

/// Inline style of the container element the editor is mounted into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStyle {
    pub width: String,
    pub height: String,
    pub position: String,
    pub min_height: String,
}

impl ContainerStyle {
    pub fn fill_parent(min_height_px: u32) -> Self {
        ContainerStyle {
            width: "100%".to_string(),
            height: "100%".to_string(),
            position: "relative".to_string(),
            min_height: format!("{}px", min_height_px),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_operation_wire_format() {
        let op: ServerOperation = serde_json::from_value(json!({
            "type": "create",
            "target": "r7",
            "remoteType": "relay.MonacoEditor",
            "properties": { "parent": "w3", "content": "x" }
        }))
        .unwrap();
        match &op {
            ServerOperation::Create {
                target,
                remote_type,
                properties,
            } => {
                assert_eq!(target, "r7");
                assert_eq!(remote_type, MONACO_REMOTE_TYPE);
                assert_eq!(properties.get("parent"), Some(&json!("w3")));
            }
            other => panic!("unexpected operation {:?}", other),
        }
        assert_eq!(op.target(), "r7");

        let destroy: ServerOperation =
            serde_json::from_str(r#"{"type":"destroy","target":"r7"}"#).unwrap();
        assert_eq!(
            destroy,
            ServerOperation::Destroy {
                target: "r7".to_string()
            }
        );
    }

    #[test]
    fn set_without_properties_defaults_to_empty() {
        let op: ServerOperation = serde_json::from_str(r#"{"type":"set","target":"a"}"#).unwrap();
        assert_eq!(
            op,
            ServerOperation::Set {
                target: "a".to_string(),
                properties: Properties::new()
            }
        );
    }

    #[test]
    fn notify_serializes_with_event_payload() {
        let op = ClientOperation::Notify {
            target: "r1".to_string(),
            event: EVENT_CONTENT_CHANGED.to_string(),
            properties: serde_json::to_value(ContentChanged {
                content: "hello".to_string(),
            })
            .unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({
                "type": "notify",
                "target": "r1",
                "event": "contentChanged",
                "properties": { "content": "hello" }
            })
        );
    }

    #[test]
    fn editor_properties_defaults_and_lenient_parsing() {
        let props = EditorProperties::from_properties(&Properties::new());
        assert_eq!(props, EditorProperties::default());
        assert_eq!(props.language, "plaintext");

        let mut raw = Properties::new();
        raw.insert("content".to_string(), Value::Null);
        raw.insert("language".to_string(), json!("yml"));
        raw.insert("readOnly".to_string(), json!("true"));
        let props = EditorProperties::from_properties(&raw);
        assert_eq!(props.content, "");
        assert_eq!(props.language, "yml");
        assert!(!props.read_only);

        raw.insert("readOnly".to_string(), json!(true));
        assert!(EditorProperties::from_properties(&raw).read_only);
    }

    #[test]
    fn editor_options_skip_unset_fields() {
        let json = serde_json::to_value(EditorOptions::read_only(true)).unwrap();
        assert_eq!(json, json!({ "readOnly": true }));
    }

    #[test]
    fn create_options_flatten_layout() {
        let create = CreateOptions {
            value: "{}".to_string(),
            language: "json".to_string(),
            options: EditorOptions {
                read_only: Some(false),
                font_size: Some(14),
                ..EditorOptions::default()
            },
        };
        assert_eq!(
            serde_json::to_value(&create).unwrap(),
            json!({ "value": "{}", "language": "json", "readOnly": false, "fontSize": 14 })
        );
    }

    #[test]
    fn loader_vs_path_handles_trailing_slash() {
        let config = LoaderConfig {
            base_url: "rwt-resources/monaco/".to_string(),
        };
        assert_eq!(config.vs_path(), "rwt-resources/monaco/vs");
    }

    #[test]
    fn container_fills_parent() {
        let style = ContainerStyle::fill_parent(100);
        assert_eq!(style.width, "100%");
        assert_eq!(style.height, "100%");
        assert_eq!(style.position, "relative");
        assert_eq!(style.min_height, "100px");
    }
}
