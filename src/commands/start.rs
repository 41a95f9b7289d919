use crate::commands::notify::apply_hook;
use crate::config::GlobalConfig;
use crate::domain::session::HookEvent;
use crate::error::HangarError;
use crate::infra::state::RegistryStore;
use tokio::process::Command;
use tracing::{info, warn};

fn record(
    store: &RegistryStore,
    name: &str,
    event: HookEvent,
    execution_id: Option<&str>,
    strict: bool,
) {
    if let Err(e) = apply_hook(store, name, event, execution_id, strict) {
        warn!(session = name, event = %event, error = %e, "failed to record agent lifecycle");
    }
}

/// Run the agent for `name` in the current terminal and return its exit
/// code. Bracketed by `start` and `end` events so the registry reflects the
/// process even when the agent has no hooks of its own.
pub async fn execute(
    store: &RegistryStore,
    config: &GlobalConfig,
    name: &str,
    execution_id: Option<&str>,
) -> Result<i32, HangarError> {
    let strict = config.strict_execution_id;
    record(store, name, HookEvent::Start, execution_id, strict);

    let shell = config.shell();
    info!(session = name, shell = %shell, command = %config.agent_command, "starting agent");
    let status = Command::new(&shell)
        .arg("-c")
        .arg(&config.agent_command)
        .status()
        .await;

    record(store, name, HookEvent::End, execution_id, strict);

    let status = status?;
    let code = status.code().unwrap_or(1);
    info!(session = name, code, "agent exited");
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::{Session, SessionState};

    fn config(cmd: &str) -> GlobalConfig {
        GlobalConfig {
            agent_command: cmd.into(),
            shell: Some("/bin/sh".into()),
            ..GlobalConfig::default()
        }
    }

    #[tokio::test]
    async fn runs_agent_and_marks_exited() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path());
        store.add(Session::new("a".into(), "a".into())).unwrap();

        let code = execute(&store, &config("exit 3"), "a", None).await.unwrap();
        assert_eq!(code, 3);
        assert_eq!(store.get("a").unwrap().state, SessionState::Exited);
    }

    #[tokio::test]
    async fn unregistered_session_still_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(dir.path());
        let code = execute(&store, &config("true"), "ghost", None).await.unwrap();
        assert_eq!(code, 0);
    }
}
