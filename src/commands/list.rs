use crate::domain::session::Session;
use crate::error::HangarError;
use crate::infra::state::RegistryStore;
use std::fmt::Write;

/// One line per session, in manual order.
pub fn render_list(sessions: &[&Session]) -> String {
    let mut out = String::new();
    for s in sessions {
        let flag = if s.is_flagged { "⚑" } else { " " };
        let archived = if s.is_archived { " (archived)" } else { "" };
        let _ = write!(
            out,
            "{} {flag} {:<28} {:<13}",
            s.state.icon(),
            s.name,
            s.state.to_string()
        );
        if !s.status.is_empty() {
            let _ = write!(out, " [{}]", s.status);
        }
        if s.display_name != s.name {
            let _ = write!(out, " {}", s.display_name);
        }
        let _ = writeln!(out, "{archived}");
    }
    out
}

pub fn render_details(s: &Session) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Name: {}", s.name);
    let _ = writeln!(out, "Display: {}", s.display_name);
    let _ = writeln!(out, "State: {}", s.state);
    if let Some(dir) = s.start_dir() {
        let _ = writeln!(out, "Directory: {}", dir.display());
    }
    if let Some(repo) = &s.repo_info {
        let _ = writeln!(out, "Repo: {repo}");
    }
    if let Some(branch) = &s.branch_name {
        let _ = writeln!(out, "Branch: {branch}");
    }
    if !s.status.is_empty() {
        let _ = writeln!(out, "Status: {}", s.status);
    }
    if !s.comment.is_empty() {
        let _ = writeln!(out, "Comment: {}", s.comment);
    }
    if let Some(shell) = &s.shell_session {
        let _ = writeln!(out, "Shell: {shell}");
    }
    let _ = writeln!(out, "Flagged: {}", if s.is_flagged { "yes" } else { "no" });
    let _ = writeln!(out, "Archived: {}", if s.is_archived { "yes" } else { "no" });
    let _ = writeln!(out, "Execution: {}", s.execution_id);
    if let Some(last) = &s.last_hook_execution_id {
        let _ = writeln!(out, "Last hook execution: {last}");
    }
    let _ = writeln!(out, "Created: {}", s.created_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Updated: {}", s.last_updated.format("%Y-%m-%d %H:%M:%S"));
    out
}

pub fn execute(store: &RegistryStore, all: bool, json: bool) -> Result<(), HangarError> {
    let state = store.load()?;
    let sessions = state.visible(all);

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions. Run `hangar new <label>` to create one.");
        return Ok(());
    }
    print!("{}", render_list(&sessions));
    Ok(())
}

pub fn show(store: &RegistryStore, name: &str) -> Result<(), HangarError> {
    let session = store.get(name)?;
    print!("{}", render_details(&session));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionState;

    #[test]
    fn details_show_state_line() {
        let mut s = Session::new("test-session".into(), "test-session".into());
        assert!(render_details(&s).contains("State: idle\n"));
        s.state = SessionState::WaitingUser;
        assert!(render_details(&s).contains("State: waiting_user\n"));
    }

    #[test]
    fn list_marks_archived_and_flagged() {
        let mut a = Session::new("a".into(), "Alpha".into());
        a.is_archived = true;
        a.is_flagged = true;
        let b = Session::new("b".into(), "b".into());
        let out = render_list(&[&b, &a]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" b "));
        assert!(lines[1].contains("⚑"));
        assert!(lines[1].ends_with("Alpha (archived)"));
    }
}
