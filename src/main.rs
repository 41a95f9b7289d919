use clap::Parser;
use hangar::cli::{Cli, Commands};
use hangar::commands::{self, Context};
use hangar::config::{self, GlobalConfig};
use hangar::error::HangarError;
use hangar::infra::state::RegistryStore;
use hangar::infra::tmux::{TmuxClient, ENV_DEBUG, ENV_EXECUTION_ID};
use hangar::tui;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = config::resolve_data_dir(cli.data_dir);

    // Initialize tracing (log to <data_dir>/hangar.log)
    let guard = init_tracing(&data_dir);

    // Hook re-entry must not fail the agent over a bad config file.
    let cfg = match &cli.command {
        Some(Commands::Notify { .. } | Commands::Start { .. }) => {
            config::load_config().unwrap_or_else(|e| {
                warn!(error = %e, "ignoring unreadable config, using defaults");
                GlobalConfig::default()
            })
        }
        _ => config::load_config()?,
    };

    // Preflight checks
    if cli.command.as_ref().is_none_or(Commands::needs_tmux) {
        preflight_checks()?;
    }

    info!(
        command = ?cli.command,
        data_dir = %data_dir.display(),
        "hangar started"
    );

    let store = RegistryStore::new(&data_dir);
    let mux = Arc::new(TmuxClient::new(cfg.tmux_socket.clone()));
    let ctx = Context::new(store, mux, cfg);

    match cli.command {
        None => {
            tui::run(ctx).await?;
        }

        Some(Commands::New {
            label,
            dir,
            worktree,
            repo,
            branch,
            no_attach,
        }) => {
            let req = commands::new::NewSession {
                label,
                dir,
                worktree: worktree.then_some(commands::new::WorktreeRequest { repo, branch }),
            };
            let session = commands::new::create_session(&ctx, &req).await?;
            println!("Created session '{}'", session.name);
            if !no_attach {
                commands::attach::execute(&ctx, &session.name).await?;
            }
        }

        Some(Commands::Add { label, dir }) => {
            let req = commands::new::NewSession {
                label,
                dir,
                worktree: None,
            };
            let session = commands::new::add_session(&ctx, &req).await?;
            println!("Added session '{}'", session.name);
        }

        Some(Commands::List { all, json }) => {
            commands::list::execute(&ctx.store, all, json)?;
        }

        Some(Commands::Show { name }) => {
            commands::list::show(&ctx.store, &name)?;
        }

        Some(Commands::Attach { name }) => {
            commands::attach::execute(&ctx, &name).await?;
        }

        Some(Commands::Delete { name, keep_session }) => {
            commands::delete::execute(&ctx, &name, keep_session).await?;
        }

        Some(Commands::Rename { old, new }) => {
            commands::rename::execute(&ctx, &old, &new).await?;
        }

        Some(Commands::Move { name, direction }) => {
            commands::edit::execute_move(&ctx, &name, direction)?;
        }

        Some(Commands::Archive {
            name,
            remove_worktree,
        }) => {
            commands::edit::execute_archive(&ctx, &name, remove_worktree).await?;
        }

        Some(Commands::Flag { name }) => {
            commands::edit::execute_flag(&ctx, &name)?;
        }

        Some(Commands::Comment { name, text }) => {
            commands::edit::execute_comment(&ctx, &name, &text)?;
        }

        Some(Commands::Status { name, text }) => {
            commands::edit::execute_status(&ctx, &name, &text)?;
        }

        Some(Commands::Capture { name, start, copy }) => {
            commands::pane::execute_capture(&ctx, &name, start, copy).await?;
        }

        Some(Commands::Send { name, text }) => {
            commands::pane::execute_send(&ctx, &name, &text).await?;
        }

        Some(Commands::Notify {
            name,
            event,
            execution_id,
            strict,
        }) => {
            let strict = strict || ctx.config.strict_execution_id;
            commands::notify::execute(
                &ctx.store,
                &name,
                event.as_deref(),
                execution_id.as_deref(),
                strict,
            )?;
        }

        Some(Commands::Start { name }) => {
            let execution_id = std::env::var(ENV_EXECUTION_ID).ok();
            let code = commands::start::execute(
                &ctx.store,
                &ctx.config,
                &name,
                execution_id.as_deref(),
            )
            .await?;
            // exit skips destructors; flush the log first.
            drop(guard);
            std::process::exit(code);
        }

        Some(Commands::Shell { name }) => {
            commands::shell::execute(&ctx, &name).await?;
        }

        Some(Commands::Hooks) => {
            commands::hooks::execute(&ctx.exe)?;
        }
    }

    Ok(())
}

fn preflight_checks() -> Result<(), HangarError> {
    if !TmuxClient::is_available() {
        return Err(HangarError::TmuxNotInstalled);
    }
    Ok(())
}

/// Initialize tracing with a file appender. Returns a guard that must be held
/// for the lifetime of the program (dropping it flushes the writer).
fn init_tracing(data_dir: &Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, EnvFilter};

    if std::fs::create_dir_all(data_dir).is_err() {
        return None;
    }

    let file_appender = tracing_appender::rolling::never(data_dir, "hangar.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if std::env::var_os(ENV_DEBUG).is_some() {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    Some(guard)
}
