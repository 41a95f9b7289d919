use crate::domain::session::{Session, SessionState};
use crate::error::HangarError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Persisted registry: `<data_dir>/registry.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryState {
    /// Bumped on every save; the controller compares it to skip no-op ticks.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sessions: BTreeMap<String, Session>,
    /// Manual order, head first.
    #[serde(default)]
    pub order: Vec<String>,
}

impl RegistryState {
    /// Repair `order` against `sessions`: stale names are dropped and
    /// unordered sessions are appended alphabetically. An empty order with
    /// sessions present is initialised alphabetically.
    pub fn normalize(&mut self) {
        let mut seen = HashSet::new();
        let sessions = &self.sessions;
        self.order
            .retain(|name| sessions.contains_key(name) && seen.insert(name.clone()));
        // BTreeMap iterates alphabetically.
        for name in self.sessions.keys() {
            if !seen.contains(name) {
                self.order.push(name.clone());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Session> {
        self.sessions.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Session> {
        self.sessions.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    /// Whether `name` already stands for a tmux session here: a registered
    /// session or some session's companion shell.
    pub fn key_in_use(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
            || self
                .sessions
                .values()
                .any(|s| s.shell_session.as_deref() == Some(name))
    }

    fn require_mut(&mut self, name: &str) -> Result<&mut Session, HangarError> {
        self.sessions
            .get_mut(name)
            .ok_or_else(|| HangarError::NotFound(name.to_string()))
    }

    /// Sessions in manual order, archived ones only when asked for.
    pub fn visible(&self, include_archived: bool) -> Vec<&Session> {
        self.order
            .iter()
            .filter_map(|name| self.sessions.get(name))
            .filter(|s| include_archived || !s.is_archived)
            .collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    /// Insert at the head of the manual order.
    pub fn add(&mut self, session: Session) -> Result<(), HangarError> {
        if self.key_in_use(&session.name) {
            return Err(HangarError::AlreadyExists(session.name));
        }
        self.order.insert(0, session.name.clone());
        self.sessions.insert(session.name.clone(), session);
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<Session, HangarError> {
        let session = self
            .sessions
            .remove(name)
            .ok_or_else(|| HangarError::NotFound(name.to_string()))?;
        self.order.retain(|n| n != name);
        Ok(session)
    }

    /// Exchange the order slots of `a` and `b`. The only reordering primitive.
    pub fn swap_positions(&mut self, a: &str, b: &str) -> Result<(), HangarError> {
        let ia = self
            .position(a)
            .ok_or_else(|| HangarError::NotFound(a.to_string()))?;
        let ib = self
            .position(b)
            .ok_or_else(|| HangarError::NotFound(b.to_string()))?;
        self.order.swap(ia, ib);
        Ok(())
    }

    /// Nearest non-archived neighbour of `name` in the manual order.
    /// `up` looks toward the head.
    pub fn neighbour(&self, name: &str, up: bool) -> Option<&str> {
        let idx = self.position(name)?;
        let candidates: Box<dyn Iterator<Item = &String>> = if up {
            Box::new(self.order[..idx].iter().rev())
        } else {
            Box::new(self.order[idx + 1..].iter())
        };
        candidates
            .filter(|n| self.sessions.get(*n).is_some_and(|s| !s.is_archived))
            .map(String::as_str)
            .next()
    }

    /// Rename the registry key in place, keeping the order slot.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), HangarError> {
        if !self.sessions.contains_key(old) {
            return Err(HangarError::NotFound(old.to_string()));
        }
        if self.key_in_use(new) {
            return Err(HangarError::AlreadyExists(new.to_string()));
        }
        let Some(mut session) = self.sessions.remove(old) else {
            return Err(HangarError::NotFound(old.to_string()));
        };
        session.name = new.to_string();
        session.touch();
        self.sessions.insert(new.to_string(), session);
        for slot in self.order.iter_mut().filter(|n| *n == old) {
            *slot = new.to_string();
        }
        Ok(())
    }

    pub fn update_state(&mut self, name: &str, state: SessionState) -> Result<(), HangarError> {
        let s = self.require_mut(name)?;
        s.state = state;
        s.touch();
        Ok(())
    }

    pub fn update_display_name(&mut self, name: &str, display: &str) -> Result<(), HangarError> {
        let s = self.require_mut(name)?;
        s.display_name = display.to_string();
        s.touch();
        Ok(())
    }

    /// Returns the new flag value.
    pub fn toggle_flag(&mut self, name: &str) -> Result<bool, HangarError> {
        let s = self.require_mut(name)?;
        s.is_flagged = !s.is_flagged;
        s.touch();
        Ok(s.is_flagged)
    }

    /// Returns the new archive value.
    pub fn toggle_archive(&mut self, name: &str) -> Result<bool, HangarError> {
        let s = self.require_mut(name)?;
        s.is_archived = !s.is_archived;
        s.touch();
        Ok(s.is_archived)
    }

    pub fn set_comment(&mut self, name: &str, comment: &str) -> Result<(), HangarError> {
        let s = self.require_mut(name)?;
        s.comment = comment.to_string();
        s.touch();
        Ok(())
    }

    pub fn set_status(&mut self, name: &str, status: &str) -> Result<(), HangarError> {
        let s = self.require_mut(name)?;
        s.status = status.to_string();
        s.touch();
        Ok(())
    }

    pub fn set_shell_session(
        &mut self,
        name: &str,
        shell: Option<String>,
    ) -> Result<(), HangarError> {
        if let Some(shell) = &shell {
            if self.sessions.contains_key(shell) {
                return Err(HangarError::AlreadyExists(shell.clone()));
            }
        }
        let s = self.require_mut(name)?;
        s.shell_session = shell;
        s.touch();
        Ok(())
    }

    pub fn set_execution_id(&mut self, name: &str, id: &str) -> Result<(), HangarError> {
        let s = self.require_mut(name)?;
        s.execution_id = id.to_string();
        s.touch();
        Ok(())
    }
}
