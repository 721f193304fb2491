use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use dtool::kernel::services::adapters::{
    load_settings, parse_keybinding, EditorAdapter, EditorCallbacks, EditorChangeHandle, Position,
    Shortcuts, Worker,
};
use dtool::kernel::{
    DataDictionary, Envelope, MessageSystem, MessageSystemConfig, NodeRecord, SchemaDictionary,
};

mod logging;

fn main() -> io::Result<()> {
    let settings = load_settings();
    let _logging = logging::init(settings.log_filter.as_deref());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(settings))
}

struct Session {
    system: MessageSystem,
    shortcuts: Rc<RefCell<Shortcuts>>,
    editor_buffer: Rc<RefCell<Vec<String>>>,
    editor_changes: EditorChangeHandle,
}

async fn run(settings: dtool::kernel::services::ports::Settings) -> io::Result<()> {
    let (channel, mut inbound, worker) = Worker::spawn(settings.channel_capacity)?.into_parts();

    let system = MessageSystem::new(MessageSystemConfig {
        channel: None,
        data_dictionary: Some(sample_document()),
        schema_dictionary: Some(sample_schemas()),
    });
    system.add_fn(print_envelope);

    let shortcuts = system
        .register(Shortcuts::new(system.handle()).with_rules(&settings.shortcuts))
        .map_err(io::Error::other)?;

    let editor_buffer = Rc::new(RefCell::new(Vec::new()));
    let mut editor = EditorAdapter::with_default_actions(system.handle());
    editor.bind(console_editor(Rc::clone(&editor_buffer)));
    let editor_changes = editor.change_handle();
    system.register(editor).map_err(io::Error::other)?;

    // Services are in place; the pending initialize goes out now.
    system.connect(Box::new(channel));

    let session = Session {
        system,
        shortcuts,
        editor_buffer,
        editor_changes,
    };

    println!("commands: nav <id> | key <combo> | set <id> <json> | edit <json> | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            payload = inbound.recv() => match payload {
                Some(payload) => session.system.receive(&payload),
                None => break,
            },
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !session.execute(line.trim()) {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    // Dropping the last sender lets the worker drain and exit.
    drop(session.system.disconnect());
    drop(inbound);
    worker.join();
    Ok(())
}

impl Session {
    /// Runs one command line. Returns false on `quit`.
    fn execute(&self, line: &str) -> bool {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match command {
            "" => {}
            "quit" | "exit" => return false,
            "nav" if !rest.is_empty() => {
                self.system
                    .post_message(Envelope::navigation_update(rest, None));
            }
            "key" => match parse_keybinding(rest) {
                Some(key) => {
                    let invoked = self.shortcuts.borrow().handle_key(&key.to_event());
                    println!("{} -> {} action(s)", key, invoked);
                }
                None => println!("invalid key: {}", rest),
            },
            "set" => {
                let (id, json) = rest.split_once(' ').unwrap_or((rest, ""));
                match serde_json::from_str(json.trim()) {
                    Ok(data) => self.system.post_message(Envelope::data_update(id, data)),
                    Err(e) => println!("invalid json: {}", e),
                }
            }
            "edit" => {
                let lines: Vec<String> = rest.lines().map(str::to_string).collect();
                *self.editor_buffer.borrow_mut() = lines.clone();
                if !self.editor_changes.model_changed(&lines) {
                    println!("edit ignored");
                }
            }
            _ => println!("unknown command: {}", line),
        }
        true
    }
}

fn console_editor(buffer: Rc<RefCell<Vec<String>>>) -> EditorCallbacks {
    let read = Rc::clone(&buffer);
    EditorCallbacks::new(
        move || read.borrow().clone(),
        move |lines, is_external| {
            if is_external {
                for line in &lines {
                    println!("  | {}", line);
                }
            }
            *buffer.borrow_mut() = lines;
        },
        |id| {
            if let Some(id) = id {
                println!("  @ {}", id);
            }
            Position::default()
        },
    )
}

fn print_envelope(envelope: &Envelope) {
    println!(
        "<- {} {} active={}",
        envelope.kind.as_str(),
        envelope.action.as_deref().unwrap_or("-"),
        envelope.active_dictionary_id.as_deref().unwrap_or("-"),
    );
    if let Some(serde_json::Value::String(error)) = &envelope.data {
        if envelope.kind == dtool::kernel::MessageType::Error {
            println!("   error: {}", error);
        }
    }
}

fn sample_schemas() -> SchemaDictionary {
    let mut schemas = SchemaDictionary::new();
    schemas.insert(
        "div".to_string(),
        json!({ "id": "div", "type": "object", "properties": { "class": { "type": "string" } } }),
    );
    schemas.insert(
        "span".to_string(),
        json!({ "id": "span", "type": "object", "properties": { "text": { "type": "string" } } }),
    );
    schemas
}

fn sample_document() -> DataDictionary {
    DataDictionary::new("root", NodeRecord::new("div", json!({ "class": "page" }))).with_node(
        "span",
        NodeRecord::new("span", json!({ "text": "Hello" })).with_parent("root", "children"),
    )
}
