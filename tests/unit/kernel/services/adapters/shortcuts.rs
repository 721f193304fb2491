use super::*;
use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use crate::core::event::{KeyEventKind, KeyModifiers};
use crate::kernel::dictionary::NodeRecord;
use crate::kernel::message::NavigationAction;
use crate::kernel::services::bus::{ChannelError, MessageChannel};
use crate::kernel::services::{MessageSystem, MessageSystemConfig};

#[derive(Clone, Default)]
struct Recorder {
    sent: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    fn envelopes(&self) -> Vec<Envelope> {
        self.sent
            .borrow()
            .iter()
            .map(|payload| Envelope::decode(payload).unwrap())
            .collect()
    }
}

impl MessageChannel for Recorder {
    fn post(&self, payload: String) -> Result<(), ChannelError> {
        self.sent.borrow_mut().push(payload);
        Ok(())
    }
}

fn document() -> DataDictionary {
    DataDictionary::new("root", NodeRecord::new("div", json!({})))
        .with_node(
            "span",
            NodeRecord::new("span", json!({ "text": "hi" })).with_parent("root", "children"),
        )
}

fn initialize_at(id: &str) -> Envelope {
    let mut envelope = Envelope::initialize(document(), Default::default());
    envelope.active_dictionary_id = Some(id.to_string());
    envelope
}

fn connected() -> (MessageSystem, Recorder) {
    let system = MessageSystem::new(MessageSystemConfig::default());
    let recorder = Recorder::default();
    system.connect(Box::new(recorder.clone()));
    (system, recorder)
}

fn press(key: Key) -> KeyEvent {
    key.to_event()
}

#[test]
fn test_initialize_announces_every_action_once() {
    let (system, recorder) = connected();
    system.register(Shortcuts::new(system.handle())).unwrap();

    system.dispatch(&initialize_at("root"));

    let sent = recorder.envelopes();
    assert_eq!(sent.len(), 1);
    let announce = &sent[0];
    assert_eq!(announce.kind, MessageType::Custom);
    assert_eq!(announce.action.as_deref(), Some("initialize"));
    assert_eq!(announce.id.as_deref(), Some(SHORTCUTS_ID));
    assert_eq!(announce.originator_id(), Some(SHORTCUTS_ID));

    let shortcuts = announce.extra["shortcuts"].as_array().unwrap();
    assert_eq!(shortcuts.len(), default_actions().len());
    for shortcut in shortcuts {
        assert_eq!(shortcut["activeDictionaryId"], "root");
        assert_eq!(shortcut["dataDictionary"][1], "root");
    }
    assert_eq!(shortcuts[1]["keys"], "ctrl+d");
}

#[test]
fn test_navigation_updates_cursor_for_key_path() {
    let (system, _recorder) = connected();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&seen);
    let shortcuts = system
        .register(Shortcuts::with_actions(
            system.handle(),
            [ShortcutAction::new(
                "peek",
                "Peek",
                Key::ctrl(KeyCode::Char('p')),
                move |ctx| {
                    record
                        .borrow_mut()
                        .push(ctx.active_dictionary_id.map(str::to_string))
                },
            )],
        ))
        .unwrap();

    system.dispatch(&initialize_at("root"));
    system.dispatch(&Envelope::navigation_update("span", None));

    let invoked = shortcuts
        .borrow()
        .handle_key(&press(Key::ctrl(KeyCode::Char('p'))));
    assert_eq!(invoked, 1);
    assert_eq!(*seen.borrow(), vec![Some("span".to_string())]);
}

#[test]
fn test_data_message_only_refreshes_dictionary() {
    let (system, _recorder) = connected();
    let shortcuts = system.register(Shortcuts::new(system.handle())).unwrap();
    system.dispatch(&initialize_at("span"));

    let mut data = Envelope::data(DataAction::Update, "root");
    data.data_dictionary = Some(DataDictionary::new("root", NodeRecord::new("div", json!({}))));
    data.active_dictionary_id = Some("root".to_string());
    system.dispatch(&data);

    let shortcuts = shortcuts.borrow();
    assert_eq!(shortcuts.active_dictionary_id(), Some("span"));
    assert_eq!(shortcuts.data_dictionary().map(|d| d.len()), Some(1));
}

#[test]
fn test_delete_posts_remove_for_active_node() {
    let (system, recorder) = connected();
    let shortcuts = system.register(Shortcuts::new(system.handle())).unwrap();
    system.dispatch(&initialize_at("span"));
    recorder.sent.borrow_mut().clear();

    assert_eq!(
        shortcuts
            .borrow()
            .handle_key(&press(Key::simple(KeyCode::Delete))),
        1
    );
    let sent = recorder.envelopes();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data_action(), Some(DataAction::Remove));
    assert_eq!(sent[0].dictionary_id.as_deref(), Some("span"));
    assert_eq!(sent[0].originator_id(), Some(SHORTCUTS_ID));
}

#[test]
fn test_delete_and_duplicate_skip_root() {
    let (system, recorder) = connected();
    let shortcuts = system.register(Shortcuts::new(system.handle())).unwrap();
    system.dispatch(&initialize_at("root"));
    recorder.sent.borrow_mut().clear();

    let shortcuts = shortcuts.borrow();
    shortcuts.handle_key(&press(Key::simple(KeyCode::Delete)));
    shortcuts.handle_key(&press(Key::ctrl(KeyCode::Char('d'))));
    shortcuts.handle_key(&press(Key::alt(KeyCode::Up)));
    assert!(recorder.sent.borrow().is_empty());
}

#[test]
fn test_select_parent_posts_navigation() {
    let (system, recorder) = connected();
    let shortcuts = system.register(Shortcuts::new(system.handle())).unwrap();
    system.dispatch(&initialize_at("span"));
    recorder.sent.borrow_mut().clear();

    shortcuts
        .borrow()
        .handle_key(&press(Key::alt(KeyCode::Up)));
    let sent = recorder.envelopes();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].navigation_action(), Some(NavigationAction::Update));
    assert_eq!(sent[0].active_dictionary_id.as_deref(), Some("root"));
}

#[test]
fn test_nothing_posted_before_initialize() {
    let (system, recorder) = connected();
    let shortcuts = system.register(Shortcuts::new(system.handle())).unwrap();

    shortcuts
        .borrow()
        .handle_key(&press(Key::simple(KeyCode::Delete)));
    assert!(recorder.sent.borrow().is_empty());
}

#[test]
fn test_key_release_and_other_keys_do_not_match() {
    let shortcuts = Shortcuts::new(MessageSystemHandle::new());
    let release =
        KeyEvent::new_with_kind(KeyCode::Delete, KeyModifiers::NONE, KeyEventKind::Release);
    assert_eq!(shortcuts.handle_key(&release), 0);
    assert_eq!(shortcuts.handle_key(&press(Key::simple(KeyCode::Char('d')))), 0);
}

#[test]
fn test_uppercase_event_matches_shift_binding() {
    let shortcuts = Shortcuts::new(MessageSystemHandle::new()).with_rules(&[ShortcutRule {
        id: "duplicate".to_string(),
        key: "ctrl+shift+d".to_string(),
    }]);
    let event = KeyEvent::new(KeyCode::Char('D'), KeyModifiers::CONTROL);
    assert_eq!(shortcuts.handle_key(&event), 1);
}

#[test]
fn test_rules_rebind_known_actions_only() {
    let shortcuts = Shortcuts::new(MessageSystemHandle::new()).with_rules(&[
        ShortcutRule {
            id: "delete".to_string(),
            key: "ctrl+backspace".to_string(),
        },
        ShortcutRule {
            id: "unknown".to_string(),
            key: "ctrl+u".to_string(),
        },
        ShortcutRule {
            id: "duplicate".to_string(),
            key: "ctrl+nonsense".to_string(),
        },
    ]);

    assert_eq!(
        shortcuts.get_action_config("delete").unwrap().keys,
        "ctrl+backspace"
    );
    assert_eq!(shortcuts.get_action_config("duplicate").unwrap().keys, "ctrl+d");
    assert_eq!(
        shortcuts.registered_actions(),
        vec!["delete", "duplicate", "select-parent"]
    );
}

#[test]
fn test_unknown_action_config_shape() {
    let shortcuts = Shortcuts::new(MessageSystemHandle::new());
    let err = shortcuts.get_action_config("nope").unwrap_err();
    assert_eq!(
        serde_json::to_value(err).unwrap(),
        json!({ "error": "No such action found." })
    );
}

#[test]
fn test_service_config_listens_for_keydown() {
    let shortcuts = Shortcuts::new(MessageSystemHandle::new());
    let config = shortcuts.config();
    assert_eq!(config.id, SHORTCUTS_ID);
    assert_eq!(config.event_listener_type.as_deref(), Some("keydown"));
}
