use crate::cli::Direction;
use crate::commands::Context;
use crate::error::HangarError;
use crate::infra::git;
use tracing::{info, warn};

/// Swap `name` with its nearest visible neighbour. Returns false when it is
/// already at that end of the list.
pub fn move_session(ctx: &Context, name: &str, direction: Direction) -> Result<bool, HangarError> {
    ctx.store.update_if(|reg| {
        if !reg.contains(name) {
            return Err(HangarError::NotFound(name.to_string()));
        }
        let Some(other) = reg
            .neighbour(name, direction == Direction::Up)
            .map(str::to_string)
        else {
            return Ok((false, false));
        };
        reg.swap_positions(name, &other)?;
        Ok((true, true))
    })
}

/// Toggle archived. When archiving with `remove_worktree`, the session's
/// worktree is removed best-effort. Returns the new archived value.
pub async fn archive_session(
    ctx: &Context,
    name: &str,
    remove_worktree: bool,
) -> Result<bool, HangarError> {
    let archived = ctx.store.toggle_archive(name)?;
    info!(session = name, archived, "archive toggled");

    if archived && remove_worktree {
        let session = ctx.store.get(name)?;
        if let (Some(repo), Some(path)) = (&session.repo_path, &session.worktree_path) {
            if let Err(e) = git::remove_worktree(repo, path).await {
                warn!(session = name, error = %e, "failed to remove worktree");
            }
        }
    }
    Ok(archived)
}

pub fn execute_move(ctx: &Context, name: &str, direction: Direction) -> Result<(), HangarError> {
    if !move_session(ctx, name, direction)? {
        println!("'{name}' is already at the edge");
    }
    Ok(())
}

pub async fn execute_archive(
    ctx: &Context,
    name: &str,
    remove_worktree: bool,
) -> Result<(), HangarError> {
    let archived = archive_session(ctx, name, remove_worktree).await?;
    let verb = if archived { "Archived" } else { "Unarchived" };
    println!("{verb} '{name}'");
    Ok(())
}

pub fn execute_flag(ctx: &Context, name: &str) -> Result<(), HangarError> {
    let flagged = ctx.store.toggle_flag(name)?;
    println!("'{name}' {}", if flagged { "flagged" } else { "unflagged" });
    Ok(())
}

pub fn execute_comment(ctx: &Context, name: &str, text: &str) -> Result<(), HangarError> {
    ctx.store.set_comment(name, text)
}

pub fn execute_status(ctx: &Context, name: &str, text: &str) -> Result<(), HangarError> {
    ctx.store.set_status(name, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::TestContext;
    use crate::domain::session::Session;

    fn setup(names: &[&str]) -> TestContext {
        let t = TestContext::new();
        for n in names {
            t.ctx
                .store
                .add(Session::new(n.to_string(), n.to_string()))
                .unwrap();
        }
        t
    }

    #[test]
    fn move_up_and_down() {
        // order after adds: c, b, a
        let t = setup(&["a", "b", "c"]);
        assert!(move_session(&t.ctx, "a", Direction::Up).unwrap());
        assert_eq!(t.ctx.store.load().unwrap().order, vec!["c", "a", "b"]);
        assert!(move_session(&t.ctx, "a", Direction::Down).unwrap());
        assert_eq!(t.ctx.store.load().unwrap().order, vec!["c", "b", "a"]);
    }

    #[test]
    fn move_at_edge_writes_nothing() {
        let t = setup(&["a", "b"]);
        let rev = t.ctx.store.load().unwrap().revision;
        assert!(!move_session(&t.ctx, "b", Direction::Up).unwrap());
        assert_eq!(t.ctx.store.load().unwrap().revision, rev);
    }

    #[test]
    fn move_skips_archived_neighbour() {
        let t = setup(&["a", "b", "c"]);
        t.ctx.store.toggle_archive("b").unwrap();
        move_session(&t.ctx, "a", Direction::Up).unwrap();
        assert_eq!(t.ctx.store.load().unwrap().order, vec!["a", "b", "c"]);
    }

    #[test]
    fn move_unknown_is_not_found() {
        let t = setup(&["a"]);
        assert!(matches!(
            move_session(&t.ctx, "zz", Direction::Down),
            Err(HangarError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn archive_toggles() {
        let t = setup(&["a"]);
        assert!(archive_session(&t.ctx, "a", true).await.unwrap());
        assert!(!archive_session(&t.ctx, "a", false).await.unwrap());
    }

    #[test]
    fn metadata_setters() {
        let t = setup(&["a"]);
        execute_comment(&t.ctx, "a", "waiting on CI").unwrap();
        execute_status(&t.ctx, "a", "blocked").unwrap();
        let s = t.ctx.store.get("a").unwrap();
        assert_eq!(s.comment, "waiting on CI");
        assert_eq!(s.status, "blocked");
        assert!(execute_comment(&t.ctx, "zz", "x").is_err());
    }
}
