use super::*;
use tempfile::tempdir;

#[test]
fn test_parse_keybinding_with_modifiers() {
    assert_eq!(
        parse_keybinding("ctrl+d"),
        Some(Key::ctrl(KeyCode::Char('d')))
    );
    assert_eq!(parse_keybinding("Alt + Up"), Some(Key::alt(KeyCode::Up)));
    assert_eq!(
        parse_keybinding("ctrl+shift+x"),
        Some(Key::ctrl_shift(KeyCode::Char('x')))
    );
}

#[test]
fn test_parse_keybinding_uppercase_implies_shift() {
    assert_eq!(
        parse_keybinding("ctrl+D"),
        Some(Key::ctrl_shift(KeyCode::Char('d')))
    );
}

#[test]
fn test_parse_keybinding_rejects_garbage() {
    assert_eq!(parse_keybinding(""), None);
    assert_eq!(parse_keybinding("ctrl+"), None);
    assert_eq!(parse_keybinding("ctrl+banana"), None);
}

#[test]
fn test_parse_key_code_names() {
    assert_eq!(parse_key_code("del"), Some(KeyCode::Delete));
    assert_eq!(parse_key_code("F12"), Some(KeyCode::F(12)));
    assert_eq!(parse_key_code("space"), Some(KeyCode::Char(' ')));
    assert_eq!(parse_key_code("f"), Some(KeyCode::Char('f')));
}

#[test]
fn test_display_parses_back() {
    for text in ["delete", "ctrl+d", "alt+up", "ctrl+shift+x", "f5"] {
        let key = parse_keybinding(text).unwrap();
        assert_eq!(key.to_string(), text);
    }
}

#[test]
fn test_load_settings_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{ "channelCapacity": 8, "shortcuts": [{ "id": "delete", "key": "ctrl+backspace" }] }"#,
    )
    .unwrap();

    let settings = load_settings_from(&path).unwrap();
    assert_eq!(settings.channel_capacity, 8);
    assert_eq!(settings.shortcuts.len(), 1);
    assert_eq!(settings.shortcuts[0].key, "ctrl+backspace");
    assert_eq!(settings.log_filter, None);
}

#[test]
fn test_missing_fields_use_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{}").unwrap();

    assert_eq!(load_settings_from(&path).unwrap(), Settings::default());
}

#[test]
fn test_invalid_settings_report_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{ channelCapacity: ").unwrap();

    assert!(matches!(
        load_settings_from(&path),
        Err(SettingsError::Parse(_))
    ));
    assert!(matches!(
        load_settings_from(&dir.path().join("absent.json")),
        Err(SettingsError::Io(_))
    ));
}

#[test]
fn test_write_default_settings_keeps_existing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.json");

    write_default_settings(&path).unwrap();
    assert_eq!(load_settings_from(&path).unwrap(), Settings::default());

    std::fs::write(&path, r#"{ "channelCapacity": 3 }"#).unwrap();
    write_default_settings(&path).unwrap();
    assert_eq!(load_settings_from(&path).unwrap().channel_capacity, 3);
}
