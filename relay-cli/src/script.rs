use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use relay_editor::headless::{HeadlessDom, HeadlessEditor, HeadlessLibrary};
use relay_editor::host::Host;
use relay_editor::loader::LibraryLoader;
use relay_editor::protocol::{
    ClientOperation, EditorProperties, Properties, ServerOperation, MONACO_REMOTE_TYPE,
};
use relay_editor::registry::{AdapterRegistry, NotifySink};
use relay_editor::settings::AdapterSettings;
use relay_editor::widget::{ContentEditorWidget, RemoteEditorWidget, RemoteObject};

/// Client-side events a script can simulate between server operations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScriptAction {
    /// Render the element for `anchor` so adapters waiting on it can mount.
    Anchor { anchor: String },
    /// Replace the editor text of `target` as a user edit.
    Type { target: String, text: String },
    Blur { target: String },
    Wait { ms: u64 },
    /// Server application code setting the widget text.
    SetText {
        target: String,
        text: Option<String>,
        #[serde(default, rename = "suppressModify")]
        suppress_modify: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Server(ServerOperation),
    Action(ScriptAction),
}

/// Parse one script line. Blank lines and `#` comments yield `None`.
pub fn parse_step(line: &str) -> Result<Option<Step>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(line).map_err(|e| format!("Invalid JSON: {}", e))?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "Missing \"type\" field".to_string())?
        .to_string();
    let step = match kind.as_str() {
        "create" | "set" | "destroy" => serde_json::from_value(value)
            .map(Step::Server)
            .map_err(|e| format!("Invalid {} operation: {}", kind, e))?,
        _ => serde_json::from_value(value)
            .map(Step::Action)
            .map_err(|e| format!("Invalid script step: {}", e))?,
    };
    Ok(Some(step))
}

type Outbox = Rc<RefCell<Vec<ServerOperation>>>;
type Widgets = Rc<RefCell<HashMap<String, Rc<RemoteEditorWidget>>>>;

/// Server side of one remote object. Pushes are queued for the runner to apply.
struct QueuedRemote {
    target: String,
    outbox: Outbox,
}

impl RemoteObject for QueuedRemote {
    fn set(&self, property: &str, value: Value) -> Result<(), String> {
        let mut properties = Properties::new();
        properties.insert(property.to_string(), value);
        self.outbox.borrow_mut().push(ServerOperation::Set {
            target: self.target.clone(),
            properties,
        });
        Ok(())
    }

    fn destroy(&self) -> Result<(), String> {
        self.outbox.borrow_mut().push(ServerOperation::Destroy {
            target: self.target.clone(),
        });
        Ok(())
    }
}

/// Forwards client operations to `inner`, then hands delivered
/// notifications to the server-side widget they target.
struct ServerSink {
    inner: Rc<dyn NotifySink>,
    widgets: Widgets,
}

impl NotifySink for ServerSink {
    fn send(&self, operation: ClientOperation) -> Result<(), String> {
        self.inner.send(operation.clone())?;
        let ClientOperation::Notify {
            target,
            event,
            properties,
        } = operation;
        let widget = self.widgets.borrow().get(&target).cloned();
        if let Some(widget) = widget {
            widget.handle_notify(&event, &properties);
        }
        Ok(())
    }
}

/// Drives an `AdapterRegistry` against the headless host, with a
/// `RemoteEditorWidget` standing in for the server side of each editor.
pub struct ScriptRunner {
    dom: Rc<HeadlessDom>,
    library: Rc<HeadlessLibrary>,
    registry: AdapterRegistry,
    widgets: Widgets,
    outbox: Outbox,
    debounce: Duration,
}

impl ScriptRunner {
    pub fn new(sink: Rc<dyn NotifySink>, settings: AdapterSettings) -> Self {
        let dom = Rc::new(HeadlessDom::new());
        let library = Rc::new(HeadlessLibrary::new());
        let loader = Rc::new(LibraryLoader::new(library.clone(), settings.loader_config()));
        let widgets: Widgets = Rc::default();
        let sink = Rc::new(ServerSink {
            inner: sink,
            widgets: widgets.clone(),
        });
        let debounce = settings.debounce();
        let registry = AdapterRegistry::new(Host::new(dom.clone(), loader), sink, settings);
        ScriptRunner {
            dom,
            library,
            registry,
            widgets,
            outbox: Rc::default(),
            debounce,
        }
    }

    fn editor(&self, target: &str) -> Result<Rc<HeadlessEditor>, String> {
        let adapter = self
            .registry
            .get(target)
            .ok_or_else(|| format!("Unknown remote object {}", target))?;
        adapter
            .container()
            .and_then(|container| self.library.editor_in(container))
            .ok_or_else(|| format!("Editor for {} is not mounted yet", target))
    }

    /// The server-side widget for `target`, while it exists.
    pub fn widget(&self, target: &str) -> Option<Rc<RemoteEditorWidget>> {
        self.widgets.borrow().get(target).cloned()
    }

    fn create(&mut self, operation: ServerOperation) -> Result<(), String> {
        let seeded = match &operation {
            ServerOperation::Create {
                target,
                remote_type,
                properties,
            } if remote_type == MONACO_REMOTE_TYPE => Some((
                target.clone(),
                EditorProperties::from_properties(properties).content,
            )),
            _ => None,
        };
        self.registry.apply(operation)?;
        if let Some((target, content)) = seeded {
            let remote = Rc::new(QueuedRemote {
                target: target.clone(),
                outbox: self.outbox.clone(),
            });
            let widget = Rc::new(RemoteEditorWidget::with_text(remote, &content));
            let name = target.clone();
            widget.add_modify_listener(Rc::new(move |content: &str| {
                log::debug!("{} modified ({} bytes)", name, content.len());
            }));
            self.widgets.borrow_mut().insert(target, widget);
        }
        Ok(())
    }

    fn destroy(&mut self, target: String) -> Result<(), String> {
        let widget = self.widgets.borrow_mut().remove(&target);
        match widget {
            Some(widget) => widget.dispose(),
            None => self
                .outbox
                .borrow_mut()
                .push(ServerOperation::Destroy { target }),
        }
        Ok(())
    }

    /// Apply operations queued by server-side widgets.
    fn deliver(&mut self) -> Result<(), String> {
        let queued: Vec<ServerOperation> = self.outbox.borrow_mut().drain(..).collect();
        for operation in queued {
            self.registry.apply(operation)?;
        }
        Ok(())
    }

    pub async fn run_step(&mut self, step: Step) -> Result<(), String> {
        match step {
            Step::Server(operation @ ServerOperation::Create { .. }) => self.create(operation)?,
            Step::Server(ServerOperation::Destroy { target }) => self.destroy(target)?,
            Step::Server(operation) => self.registry.apply(operation)?,
            Step::Action(ScriptAction::Anchor { anchor }) => {
                self.dom.add_anchor(&anchor);
            }
            Step::Action(ScriptAction::Type { target, text }) => {
                self.editor(&target)?.type_text(&text);
            }
            Step::Action(ScriptAction::Blur { target }) => {
                self.editor(&target)?.blur();
            }
            Step::Action(ScriptAction::Wait { ms }) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            Step::Action(ScriptAction::SetText {
                target,
                text,
                suppress_modify,
            }) => {
                let widget = self
                    .widget(&target)
                    .ok_or_else(|| format!("Unknown remote object {}", target))?;
                if suppress_modify {
                    widget.set_text_suppress_modify(text.as_deref());
                } else {
                    widget.set_text(text.as_deref());
                }
            }
        }
        self.deliver()?;
        // Let mount and bootstrap tasks spawned by this step make progress.
        tokio::task::yield_now().await;
        Ok(())
    }

    /// Wait until no edit is left inside a debounce window, so every pending
    /// notification has been sent.
    pub async fn finish(&mut self) {
        while self.registry.has_pending_notify() {
            tokio::time::sleep(self.debounce).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_editor::headless::RecordingSink;
    use relay_editor::host::EditorHandle;
    use serde_json::json;
    use tokio::task::LocalSet;

    #[test]
    fn parses_server_operations_and_actions() {
        let step = parse_step(r#"{"type":"destroy","target":"r1"}"#).unwrap();
        assert_eq!(
            step,
            Some(Step::Server(ServerOperation::Destroy {
                target: "r1".to_string()
            }))
        );

        let step = parse_step(r#"{"type":"type","target":"r1","text":"abc"}"#).unwrap();
        assert_eq!(
            step,
            Some(Step::Action(ScriptAction::Type {
                target: "r1".to_string(),
                text: "abc".to_string()
            }))
        );

        let step = parse_step(r#"  {"type":"wait","ms":300}  "#).unwrap();
        assert_eq!(step, Some(Step::Action(ScriptAction::Wait { ms: 300 })));
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        assert_eq!(parse_step("").unwrap(), None);
        assert_eq!(parse_step("   ").unwrap(), None);
        assert_eq!(parse_step("# set up anchors").unwrap(), None);
    }

    #[test]
    fn reports_malformed_steps() {
        assert!(parse_step("{oops").unwrap_err().starts_with("Invalid JSON"));
        assert_eq!(parse_step(r#"{"target":"r1"}"#).unwrap_err(), "Missing \"type\" field");
        assert!(parse_step(r#"{"type":"set"}"#)
            .unwrap_err()
            .starts_with("Invalid set operation"));
        assert!(parse_step(r#"{"type":"teleport"}"#)
            .unwrap_err()
            .starts_with("Invalid script step"));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_a_session_script() {
        LocalSet::new()
            .run_until(async {
                let sink = Rc::new(RecordingSink::new());
                let mut runner = ScriptRunner::new(sink.clone(), AdapterSettings::default());
                let script = [
                    r#"{"type":"create","target":"r1","remoteType":"relay.MonacoEditor","properties":{"parent":"w1","content":"a"}}"#,
                    r#"{"type":"anchor","anchor":"w1"}"#,
                    r#"{"type":"wait","ms":150}"#,
                    r#"{"type":"type","target":"r1","text":"ab"}"#,
                    r#"{"type":"type","target":"r1","text":"abc"}"#,
                    r#"{"type":"wait","ms":350}"#,
                    r#"{"type":"type","target":"r1","text":"abcd"}"#,
                    r#"{"type":"blur","target":"r1"}"#,
                    r#"{"type":"destroy","target":"r1"}"#,
                ];
                for line in script {
                    let step = parse_step(line).unwrap().unwrap();
                    runner.run_step(step).await.unwrap();
                }

                let contents: Vec<Value> = sink
                    .operations()
                    .into_iter()
                    .map(|op| match op {
                        ClientOperation::Notify { properties, .. } => properties,
                    })
                    .collect();
                assert_eq!(
                    contents,
                    vec![json!({ "content": "abc" }), json!({ "content": "abcd" })]
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn typing_before_mount_is_an_error() {
        LocalSet::new()
            .run_until(async {
                let sink = Rc::new(RecordingSink::new());
                let mut runner = ScriptRunner::new(sink, AdapterSettings::default());
                runner
                    .run_step(
                        parse_step(r#"{"type":"create","target":"r1","remoteType":"relay.MonacoEditor","properties":{"parent":"w1"}}"#)
                            .unwrap()
                            .unwrap(),
                    )
                    .await
                    .unwrap();
                let err = runner
                    .run_step(Step::Action(ScriptAction::Type {
                        target: "r1".to_string(),
                        text: "x".to_string(),
                    }))
                    .await
                    .unwrap_err();
                assert!(err.contains("not mounted"), "{}", err);

                let err = runner
                    .run_step(Step::Action(ScriptAction::Blur {
                        target: "r2".to_string(),
                    }))
                    .await
                    .unwrap_err();
                assert!(err.contains("Unknown remote object r2"), "{}", err);
            })
            .await;
    }

    fn notified_contents(sink: &RecordingSink) -> Vec<Value> {
        sink.operations()
            .into_iter()
            .map(|op| match op {
                ClientOperation::Notify { properties, .. } => properties,
            })
            .collect()
    }

    async fn run_lines(runner: &mut ScriptRunner, lines: &[&str]) {
        for line in lines {
            if let Some(step) = parse_step(line).unwrap() {
                runner.run_step(step).await.unwrap();
            }
        }
    }

    #[test]
    fn parses_set_text_action() {
        let step = parse_step(r#"{"type":"setText","target":"r1","text":"x","suppressModify":true}"#)
            .unwrap();
        assert_eq!(
            step,
            Some(Step::Action(ScriptAction::SetText {
                target: "r1".to_string(),
                text: Some("x".to_string()),
                suppress_modify: true,
            }))
        );
        let step = parse_step(r#"{"type":"setText","target":"r1"}"#).unwrap();
        assert_eq!(
            step,
            Some(Step::Action(ScriptAction::SetText {
                target: "r1".to_string(),
                text: None,
                suppress_modify: false,
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn finish_sends_edit_still_in_debounce_window() {
        LocalSet::new()
            .run_until(async {
                let sink = Rc::new(RecordingSink::new());
                let mut runner = ScriptRunner::new(sink.clone(), AdapterSettings::default());
                run_lines(
                    &mut runner,
                    &[
                        r#"{"type":"anchor","anchor":"w1"}"#,
                        r#"{"type":"create","target":"r1","remoteType":"relay.MonacoEditor","properties":{"parent":"w1"}}"#,
                        r#"{"type":"wait","ms":10}"#,
                        r#"{"type":"type","target":"r1","text":"hello"}"#,
                        "# trailing comment",
                    ],
                )
                .await;
                assert!(sink.operations().is_empty());

                runner.finish().await;
                assert_eq!(notified_contents(&sink), vec![json!({ "content": "hello" })]);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn finish_returns_immediately_when_idle() {
        LocalSet::new()
            .run_until(async {
                let sink = Rc::new(RecordingSink::new());
                let mut runner = ScriptRunner::new(sink, AdapterSettings::default());
                let start = tokio::time::Instant::now();
                runner.finish().await;
                assert_eq!(start.elapsed(), Duration::ZERO);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn server_widget_tracks_client_edits() {
        LocalSet::new()
            .run_until(async {
                let sink = Rc::new(RecordingSink::new());
                let mut runner = ScriptRunner::new(sink.clone(), AdapterSettings::default());
                run_lines(
                    &mut runner,
                    &[
                        r#"{"type":"anchor","anchor":"w1"}"#,
                        r#"{"type":"create","target":"r1","remoteType":"relay.MonacoEditor","properties":{"parent":"w1","content":"seed"}}"#,
                        r#"{"type":"wait","ms":10}"#,
                    ],
                )
                .await;
                let widget = runner.widget("r1").unwrap();
                assert_eq!(widget.text(), "seed");
                let modified = Rc::new(RefCell::new(Vec::new()));
                let seen = modified.clone();
                widget.add_modify_listener(Rc::new(move |content: &str| {
                    seen.borrow_mut().push(content.to_string())
                }));

                run_lines(
                    &mut runner,
                    &[
                        r#"{"type":"type","target":"r1","text":"typed"}"#,
                        r#"{"type":"wait","ms":350}"#,
                    ],
                )
                .await;
                assert_eq!(widget.text(), "typed");
                assert_eq!(*modified.borrow(), vec!["typed"]);

                run_lines(
                    &mut runner,
                    &[
                        r#"{"type":"setText","target":"r1","text":"loaded","suppressModify":true}"#,
                        r#"{"type":"wait","ms":350}"#,
                    ],
                )
                .await;
                assert_eq!(widget.text(), "loaded");
                assert_eq!(runner.editor("r1").unwrap().value(), "loaded");
                assert_eq!(*modified.borrow(), vec!["typed"]);
                assert_eq!(sink.operations().len(), 1);

                run_lines(&mut runner, &[r#"{"type":"destroy","target":"r1"}"#]).await;
                assert!(widget.is_disposed());
                assert!(runner.widget("r1").is_none());
                assert!(runner.registry.is_empty());
            })
            .await;
    }
}
