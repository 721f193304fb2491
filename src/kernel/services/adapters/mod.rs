//! Service adapters: OS/runtime specific implementations (IO/async).

pub mod dirs;
pub mod editor;
pub mod settings;
pub mod shortcuts;
pub mod worker;

pub use dirs::{ensure_log_dir, get_app_data_dir, get_log_dir};
pub use editor::{
    EditorActionContext, EditorAdapter, EditorAdapterAction, EditorCallbacks, EditorChangeHandle,
    Position, EDITOR_ADAPTER_ID,
};
pub use settings::{
    ensure_settings_file, get_settings_path, load_settings, load_settings_from, parse_keybinding,
    SettingsError,
};
pub use shortcuts::{
    default_actions, ActionNotFound, ShortcutAction, ShortcutActionConfig, ShortcutContext,
    Shortcuts, SHORTCUTS_ID,
};
pub use worker::{run_worker, Worker, WorkerChannel, WorkerThread, WORKER_THREAD_NAME};
