use crate::commands::Context;
use crate::domain::session::Session;
use crate::error::HangarError;
use crate::infra::tmux::kill_quietly;
use tracing::{info, warn};

/// Remove a session from the registry, killing its tmux session first
/// unless `keep_session` is set. The companion shell goes too, best-effort.
pub async fn delete_session(
    ctx: &Context,
    name: &str,
    keep_session: bool,
) -> Result<Session, HangarError> {
    let session = ctx.store.get(name)?;

    if !keep_session {
        match ctx.mux.exists(name).await {
            Ok(true) => {
                ctx.mux.kill(name).await?;
                info!(session = name, "tmux session killed");
            }
            Ok(false) => {}
            Err(e) => warn!(session = name, error = %e, "could not reach tmux, deleting registry entry anyway"),
        }
        if let Some(shell) = &session.shell_session {
            // Never kill another registered session's tmux session.
            match ctx.store.load() {
                Ok(reg) if reg.contains(shell) => {
                    warn!(session = name, shell = %shell, "shell name is a registered session, not killing it")
                }
                _ => kill_quietly(ctx.mux.as_ref(), shell).await,
            }
        }
    }

    let removed = ctx.store.delete(name)?;
    info!(session = name, "session deleted");
    Ok(removed)
}

pub async fn execute(ctx: &Context, name: &str, keep_session: bool) -> Result<(), HangarError> {
    delete_session(ctx, name, keep_session).await?;
    println!("Deleted session '{name}'");
    Ok(())
}
