use crate::domain::session::{HookEvent, SessionState};
use crate::error::HangarError;
use crate::infra::state::RegistryStore;
use tracing::{debug, info};

/// What a hook event did to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    Applied { from: SessionState, to: SessionState },
    Unchanged(SessionState),
    /// No registry entry; the event is dropped without error.
    MissingSession,
    /// Strict mode only: the event came from a different execution.
    Stale { current: String, supplied: String },
}

/// Apply `event` to session `name`.
///
/// Only persistence failures are errors. A missing session succeeds with
/// `MissingSession` and writes nothing. The execution ID is recorded but
/// does not gate the transition unless `strict` is set.
pub fn apply_hook(
    store: &RegistryStore,
    name: &str,
    event: HookEvent,
    execution_id: Option<&str>,
    strict: bool,
) -> Result<HookOutcome, HangarError> {
    let execution_id = execution_id.filter(|id| !id.is_empty());
    store.update_if(|reg| {
        let Some(session) = reg.get_mut(name) else {
            return Ok((HookOutcome::MissingSession, false));
        };

        if strict {
            if let Some(supplied) = execution_id {
                if !session.execution_id.is_empty() && session.execution_id != supplied {
                    return Ok((
                        HookOutcome::Stale {
                            current: session.execution_id.clone(),
                            supplied: supplied.to_string(),
                        },
                        false,
                    ));
                }
            }
        }

        if let Some(id) = execution_id {
            session.last_hook_execution_id = Some(id.to_string());
        }
        let from = session.state;
        let to = event.next_state(from);
        session.state = to;
        session.touch();

        let outcome = if from == to {
            HookOutcome::Unchanged(to)
        } else {
            HookOutcome::Applied { from, to }
        };
        Ok((outcome, true))
    })
}

pub fn execute(
    store: &RegistryStore,
    name: &str,
    event: Option<&str>,
    execution_id: Option<&str>,
    strict: bool,
) -> Result<(), HangarError> {
    let hook = HookEvent::from_name(event);
    match apply_hook(store, name, hook, execution_id, strict)? {
        HookOutcome::Applied { from, to } => {
            info!(session = name, event = %hook, %from, %to, "session state changed");
        }
        HookOutcome::Unchanged(state) => {
            if hook == HookEvent::Notification {
                info!(session = name, %state, "agent requested attention");
            } else {
                debug!(session = name, event = %hook, %state, "hook left state unchanged");
            }
        }
        HookOutcome::MissingSession => {
            debug!(session = name, event = %hook, "hook for unknown session ignored");
        }
        HookOutcome::Stale { current, supplied } => {
            info!(
                session = name,
                event = %hook,
                current = %current,
                supplied = %supplied,
                "hook from another execution ignored"
            );
        }
    }
    Ok(())
}
