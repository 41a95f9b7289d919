use crate::commands::Context;
use crate::domain::name::sanitize_name;
use crate::domain::session::Session;
use crate::error::HangarError;
use crate::infra::git;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct WorktreeRequest {
    /// Repository to branch from; defaults to the one containing `dir`.
    pub repo: Option<PathBuf>,
    /// Defaults to the session name.
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub label: String,
    pub dir: Option<PathBuf>,
    pub worktree: Option<WorktreeRequest>,
}

/// Build the registry record for `req`, creating a worktree if asked.
async fn prepare(ctx: &Context, req: &NewSession) -> Result<Session, HangarError> {
    let label = req.label.trim();
    if label.is_empty() {
        return Err(HangarError::User("Session label cannot be empty".into()));
    }
    let name = sanitize_name(label);

    // Companion shell names count too; tmux has one namespace.
    if ctx.store.load()?.key_in_use(&name) {
        return Err(HangarError::AlreadyExists(name));
    }

    let mut session = Session::new(name.clone(), label.to_string());
    let work_dir = match &req.dir {
        Some(d) => d.clone(),
        None => std::env::current_dir()?,
    };
    session.work_dir = Some(work_dir.clone());

    if let Some(wt) = &req.worktree {
        let repo_root = git::find_repo_root(wt.repo.as_deref().unwrap_or(&work_dir))?;
        let branch = wt.branch.clone().unwrap_or_else(|| name.clone());
        let path = git::default_worktree_path(&repo_root, &name);
        git::create_worktree(&repo_root, &path, &branch).await?;
        session.worktree_path = Some(path);
        session.repo_path = Some(repo_root);
        session.branch_name = Some(branch);
    }

    if let Some(dir) = session.start_dir() {
        session.repo_info = git::repo_info(dir).map(|info| info.label());
    }
    Ok(session)
}

/// Register a session without touching tmux.
pub async fn add_session(ctx: &Context, req: &NewSession) -> Result<Session, HangarError> {
    let session = prepare(ctx, req).await?;
    ctx.store.add(session.clone())?;
    info!(session = %session.name, "session registered");
    Ok(session)
}

/// Bring up the tmux side for an already-registered session and start the
/// agent in it.
pub async fn start_tmux(ctx: &Context, session: &Session) -> Result<(), HangarError> {
    let launch = ctx.launch(&session.execution_id);
    ctx.mux
        .create(
            &session.name,
            session.start_dir().map(PathBuf::as_path),
            Some(&launch),
        )
        .await?;
    configure(ctx, &session.name).await;
    Ok(())
}

/// Apply per-session tmux options. Failures only cost cosmetics.
pub async fn configure(ctx: &Context, name: &str) {
    if let Err(e) = ctx
        .mux
        .apply_options(name, &ctx.config.session_options())
        .await
    {
        warn!(session = name, error = %e, "failed to apply tmux options");
    }
    if let Some(path) = &ctx.config.tmux_config {
        if let Err(e) = ctx.mux.source_config(path).await {
            warn!(path = %path.display(), error = %e, "failed to source tmux config");
        }
    }
}

/// Register a session and start it. The registry entry exists before the
/// agent runs, so its first hook finds it; if tmux cannot be started the
/// entry is rolled back.
pub async fn create_session(ctx: &Context, req: &NewSession) -> Result<Session, HangarError> {
    let session = prepare(ctx, req).await?;
    if ctx.mux.exists(&session.name).await? {
        return Err(HangarError::AlreadyExists(session.name));
    }
    ctx.store.add(session.clone())?;

    if let Err(e) = start_tmux(ctx, &session).await {
        warn!(session = %session.name, error = %e, "tmux start failed, removing registry entry");
        if let Err(re) = ctx.store.delete(&session.name) {
            warn!(session = %session.name, error = %re, "rollback failed");
        }
        return Err(e);
    }

    info!(session = %session.name, "session is ready");
    Ok(session)
}
