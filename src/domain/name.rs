/// Fallback identifier when a label contains nothing usable.
const EMPTY_NAME: &str = "session";

/// Convert a display label into a tmux-safe session identifier.
///
/// Anything outside `[A-Za-z0-9_-]` becomes `-`, dash runs collapse to one,
/// and leading/trailing dashes are dropped. `.` and `:` are tmux target
/// separators and never survive.
pub fn sanitize_name(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.trim().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            c
        } else {
            '-'
        };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        EMPTY_NAME.to_string()
    } else {
        out
    }
}

/// Name of the companion shell session for `name`.
pub fn shell_session_name(name: &str) -> String {
    format!("{name}-shell")
}
