use crate::commands::Context;
use crate::domain::name::{sanitize_name, shell_session_name};
use crate::error::HangarError;
use tracing::{info, warn};

/// Rename a session to the sanitized form of `new_label`. tmux is renamed
/// first (when live) and put back if the registry update fails, so the two
/// never disagree. Returns the new name.
pub async fn rename_session(
    ctx: &Context,
    old: &str,
    new_label: &str,
) -> Result<String, HangarError> {
    let new_label = new_label.trim();
    if new_label.is_empty() {
        return Err(HangarError::User("New name cannot be empty".into()));
    }
    let new = sanitize_name(new_label);

    let reg = ctx.store.load()?;
    let Some(session) = reg.get(old).cloned() else {
        return Err(HangarError::NotFound(old.to_string()));
    };
    if new != old && reg.key_in_use(&new) {
        return Err(HangarError::AlreadyExists(new));
    }

    let live = new != old && ctx.mux.exists(old).await?;
    if live {
        ctx.mux.rename(old, &new).await?;
    }

    let committed = ctx.store.update(|reg| {
        if new != old {
            reg.rename(old, &new)?;
        }
        reg.update_display_name(&new, new_label)
    });
    if let Err(e) = committed {
        if live {
            if let Err(re) = ctx.mux.rename(&new, old).await {
                warn!(old, new = %new, error = %re, "failed to revert tmux rename");
            }
        }
        return Err(e);
    }

    if new != old {
        if let Some(shell) = &session.shell_session {
            rename_shell(ctx, shell, &new).await;
        }
    }

    info!(old, new = %new, "session renamed");
    Ok(new)
}

/// Keep the companion shell's name in step. Best-effort.
async fn rename_shell(ctx: &Context, shell: &str, new: &str) {
    let new_shell = shell_session_name(new);
    match ctx.store.load() {
        Ok(reg) if reg.contains(&new_shell) => {
            warn!(shell, taken = %new_shell, "companion shell name is a registered session, leaving it");
            return;
        }
        Err(e) => {
            warn!(shell, error = %e, "failed to rename companion shell");
            return;
        }
        Ok(_) => {}
    }
    let moved = match ctx.mux.exists(shell).await {
        Ok(true) => ctx.mux.rename(shell, &new_shell).await,
        Ok(false) => Ok(()),
        Err(e) => Err(e),
    };
    let result = moved.and_then(|_| ctx.store.set_shell_session(new, Some(new_shell)));
    if let Err(e) = result {
        warn!(shell, error = %e, "failed to rename companion shell");
    }
}

pub async fn execute(ctx: &Context, old: &str, new_label: &str) -> Result<(), HangarError> {
    let new = rename_session(ctx, old, new_label).await?;
    println!("Renamed '{old}' to '{new}'");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::TestContext;
    use crate::domain::session::Session;
    use crate::infra::tmux::Multiplexer;

    fn register(t: &TestContext, name: &str) {
        t.ctx
            .store
            .add(Session::new(name.to_string(), name.to_string()))
            .unwrap();
        t.mux.insert(name);
    }

    #[tokio::test]
    async fn renames_both_sides() {
        let t = TestContext::new();
        register(&t, "a");
        let new = rename_session(&t.ctx, "a", "Better name").await.unwrap();
        assert_eq!(new, "Better-name");
        assert!(t.mux.exists("Better-name").await.unwrap());
        assert!(!t.mux.exists("a").await.unwrap());
        let s = t.ctx.store.get("Better-name").unwrap();
        assert_eq!(s.display_name, "Better name");
    }

    #[tokio::test]
    async fn round_trip_restores_state() {
        let t = TestContext::new();
        register(&t, "a");
        register(&t, "b");
        let order = t.ctx.store.load().unwrap().order;
        rename_session(&t.ctx, "a", "c").await.unwrap();
        rename_session(&t.ctx, "c", "a").await.unwrap();
        assert_eq!(t.ctx.store.load().unwrap().order, order);
        assert!(t.mux.exists("a").await.unwrap());
        assert!(!t.mux.exists("c").await.unwrap());
    }

    #[tokio::test]
    async fn collisions_change_nothing() {
        let t = TestContext::new();
        register(&t, "a");
        register(&t, "b");
        let err = rename_session(&t.ctx, "a", "b").await.unwrap_err();
        assert!(matches!(err, HangarError::AlreadyExists(_)));
        let err = rename_session(&t.ctx, "zz", "q").await.unwrap_err();
        assert!(matches!(err, HangarError::NotFound(_)));
        assert!(t.mux.exists("a").await.unwrap());
        assert!(t.ctx.store.load().unwrap().contains("a"));
    }

    #[tokio::test]
    async fn cannot_take_a_companion_shell_name() {
        let t = TestContext::new();
        register(&t, "foo");
        register(&t, "bar");
        t.mux.insert("foo-shell");
        t.ctx
            .store
            .set_shell_session("foo", Some("foo-shell".into()))
            .unwrap();

        let err = rename_session(&t.ctx, "bar", "foo-shell").await.unwrap_err();
        assert!(matches!(err, HangarError::AlreadyExists(n) if n == "foo-shell"));
        assert!(t.mux.exists("bar").await.unwrap());
        assert!(t.mux.exists("foo-shell").await.unwrap());
        assert!(t.ctx.store.load().unwrap().contains("bar"));
    }

    #[tokio::test]
    async fn shell_stays_put_when_its_new_name_is_registered() {
        let t = TestContext::new();
        register(&t, "a");
        register(&t, "b-shell");
        t.mux.insert("a-shell");
        t.ctx
            .store
            .set_shell_session("a", Some("a-shell".into()))
            .unwrap();

        rename_session(&t.ctx, "a", "b").await.unwrap();
        // The registered b-shell session is untouched.
        assert!(t.mux.exists("b-shell").await.unwrap());
        assert!(t.mux.exists("a-shell").await.unwrap());
        assert_eq!(
            t.ctx.store.get("b").unwrap().shell_session.as_deref(),
            Some("a-shell")
        );
    }

    #[tokio::test]
    async fn same_name_only_updates_display() {
        let t = TestContext::new();
        register(&t, "alpha");
        let new = rename_session(&t.ctx, "alpha", " alpha ").await.unwrap();
        assert_eq!(new, "alpha");
        assert!(t.mux.exists("alpha").await.unwrap());
    }

    #[tokio::test]
    async fn dead_tmux_session_renames_registry_only() {
        let t = TestContext::new();
        register(&t, "a");
        t.mux.remove("a");
        rename_session(&t.ctx, "a", "b").await.unwrap();
        assert!(t.ctx.store.load().unwrap().contains("b"));
        assert!(t.mux.names().is_empty());
    }

    #[tokio::test]
    async fn companion_shell_follows() {
        let t = TestContext::new();
        register(&t, "a");
        t.mux.insert("a-shell");
        t.ctx
            .store
            .set_shell_session("a", Some("a-shell".into()))
            .unwrap();
        rename_session(&t.ctx, "a", "b").await.unwrap();
        assert!(t.mux.exists("b-shell").await.unwrap());
        assert_eq!(
            t.ctx.store.get("b").unwrap().shell_session.as_deref(),
            Some("b-shell")
        );
    }
}
