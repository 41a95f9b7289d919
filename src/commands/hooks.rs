use crate::domain::session::HookEvent;
use crate::infra::tmux::{shell_quote, ENV_SESSION};
use serde_json::{json, Value};
use std::path::Path;

/// Agent hook names and the event each one reports.
pub const HOOK_EVENTS: [(&str, HookEvent); 6] = [
    ("SessionStart", HookEvent::Start),
    ("UserPromptSubmit", HookEvent::Prompt),
    ("PreToolUse", HookEvent::Working),
    ("Stop", HookEvent::Stop),
    ("Notification", HookEvent::Notification),
    ("SessionEnd", HookEvent::End),
];

/// Hook settings that report every lifecycle hook back through
/// `<exe> notify "$HANGAR_SESSION" <event>`.
pub fn hook_config(exe: &Path) -> Value {
    let exe = shell_quote(&exe.to_string_lossy());
    let mut hooks = serde_json::Map::new();
    for (hook, event) in HOOK_EVENTS {
        let command = format!("{exe} notify \"${ENV_SESSION}\" {event}");
        let mut entry = json!({
            "hooks": [{ "type": "command", "command": command }]
        });
        if hook == "PreToolUse" {
            entry["matcher"] = json!("*");
        }
        hooks.insert(hook.to_string(), json!([entry]));
    }
    json!({ "hooks": hooks })
}

pub fn execute(exe: &Path) -> Result<(), crate::error::HangarError> {
    println!("{}", serde_json::to_string_pretty(&hook_config(exe))?);
    Ok(())
}
