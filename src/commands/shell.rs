use crate::commands::{attach, Context};
use crate::domain::name::shell_session_name;
use crate::error::HangarError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Create (or reuse) the companion shell for `name` and record it. Returns
/// the shell session's name.
pub async fn open_shell(ctx: &Context, name: &str) -> Result<String, HangarError> {
    let reg = ctx.store.load()?;
    let Some(session) = reg.get(name).cloned() else {
        return Err(HangarError::NotFound(name.to_string()));
    };
    let shell = shell_session_name(name);
    if reg.contains(&shell) {
        // That tmux session belongs to another registry entry.
        return Err(HangarError::AlreadyExists(shell));
    }

    if !ctx.mux.exists(&shell).await? {
        match ctx
            .mux
            .create(&shell, session.start_dir().map(PathBuf::as_path), None)
            .await
        {
            Ok(_) => info!(session = name, shell = %shell, "companion shell created"),
            Err(HangarError::AlreadyExists(_)) => {
                debug!(shell = %shell, "companion shell created concurrently")
            }
            Err(e) => return Err(e),
        }
    }

    if session.shell_session.as_deref() != Some(shell.as_str()) {
        ctx.store.set_shell_session(name, Some(shell.clone()))?;
    }
    Ok(shell)
}

pub async fn execute(ctx: &Context, name: &str) -> Result<(), HangarError> {
    let shell = open_shell(ctx, name).await?;
    eprintln!("Attaching to '{shell}' (Ctrl+Q to detach)");
    attach::attach_terminal(ctx, &shell).await
}
