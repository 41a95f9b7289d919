use crate::commands::{new, Context};
use crate::domain::session::{new_execution_id, Session};
use crate::error::HangarError;
use crate::infra::pty::wait_done;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Make sure the tmux side of a registered session is running, re-creating
/// it with a fresh execution ID if it vanished. Losing a creation race to
/// another process counts as success.
pub async fn ensure_running(ctx: &Context, name: &str) -> Result<Session, HangarError> {
    let session = ctx.store.get(name)?;
    if ctx.mux.exists(name).await? {
        return Ok(session);
    }

    info!(session = name, "tmux session gone, re-creating");
    let execution_id = new_execution_id();
    let launch = ctx.launch(&execution_id);
    // Recorded first: the new agent's first hook must match it.
    ctx.store.set_execution_id(name, &execution_id)?;
    match ctx
        .mux
        .create(name, session.start_dir().map(PathBuf::as_path), Some(&launch))
        .await
    {
        Ok(_) => new::configure(ctx, name).await,
        Err(HangarError::AlreadyExists(_)) => {
            debug!(session = name, "re-created concurrently by another process");
        }
        Err(e) => {
            // No new run started; keep the registry pointing at the old one.
            if let Err(re) = ctx.store.set_execution_id(name, &session.execution_id) {
                warn!(session = name, error = %re, "failed to restore execution id");
            }
            return Err(e);
        }
    }
    ctx.store.get(name)
}

/// Hand the terminal to `tmux_name` until the user detaches. The caller
/// owns the screen; this only toggles raw mode.
pub async fn attach_terminal(ctx: &Context, tmux_name: &str) -> Result<(), HangarError> {
    enable_raw_mode()?;
    let result: Result<(), HangarError> = async {
        let done = ctx.mux.attach(tmux_name).await?;
        wait_done(done).await;
        Ok(())
    }
    .await;
    disable_raw_mode()?;
    result
}

pub async fn execute(ctx: &Context, name: &str) -> Result<(), HangarError> {
    ensure_running(ctx, name).await?;
    eprintln!("Attaching to '{name}' (Ctrl+Q to detach)");
    attach_terminal(ctx, name).await?;
    eprintln!("Detached from '{name}'");
    Ok(())
}
