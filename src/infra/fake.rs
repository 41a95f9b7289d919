//! In-memory multiplexer for unit tests.

use crate::error::HangarError;
use crate::infra::pty::{AttachTable, DoneSignal, PtyLink};
use crate::infra::tmux::{LiveSession, Multiplexer};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default, Clone)]
struct Pane {
    content: String,
    keys: Vec<String>,
}

struct NoopLink;

impl PtyLink for NoopLink {
    fn close(&mut self) {}
}

#[derive(Default)]
pub struct FakeMultiplexer {
    panes: Mutex<BTreeMap<String, Pane>>,
    never_appear: AtomicBool,
    fail_exists: AtomicBool,
    captures: AtomicUsize,
    attachments: Arc<AttachTable>,
}

impl FakeMultiplexer {
    /// `new_session` succeeds but the session never becomes visible.
    pub fn set_never_appear(&self, v: bool) {
        self.never_appear.store(v, Ordering::SeqCst);
    }

    /// Make `exists` fail as if tmux could not be reached.
    pub fn set_fail_exists(&self, v: bool) {
        self.fail_exists.store(v, Ordering::SeqCst);
    }

    pub fn set_content(&self, name: &str, content: &str) {
        if let Some(p) = self.panes.lock().unwrap().get_mut(name) {
            p.content = content.to_string();
        }
    }

    pub fn insert(&self, name: &str) {
        self.panes
            .lock()
            .unwrap()
            .insert(name.to_string(), Pane::default());
    }

    pub fn remove(&self, name: &str) {
        self.panes.lock().unwrap().remove(name);
    }

    pub fn keys_sent(&self, name: &str) -> Vec<String> {
        self.panes
            .lock()
            .unwrap()
            .get(name)
            .map(|p| p.keys.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<String> {
        self.panes.lock().unwrap().keys().cloned().collect()
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Multiplexer for FakeMultiplexer {
    async fn exists(&self, name: &str) -> Result<bool, HangarError> {
        if self.fail_exists.load(Ordering::SeqCst) {
            return Err(HangarError::ExternalTool {
                command: "tmux has-session".into(),
                output: "server exited unexpectedly".into(),
            });
        }
        Ok(self.panes.lock().unwrap().contains_key(name))
    }

    async fn new_session(&self, name: &str, _workdir: Option<&Path>) -> Result<(), HangarError> {
        if self.never_appear.load(Ordering::SeqCst) {
            return Ok(());
        }
        let mut panes = self.panes.lock().unwrap();
        if panes.contains_key(name) {
            return Err(HangarError::ExternalTool {
                command: format!("tmux new-session -d -s {name}"),
                output: format!("duplicate session: {name}"),
            });
        }
        panes.insert(name.to_string(), Pane::default());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<LiveSession>, HangarError> {
        Ok(self
            .panes
            .lock()
            .unwrap()
            .keys()
            .map(|name| LiveSession {
                name: name.clone(),
                created: 0,
                attached: self.attachments.is_attached(name),
                windows: 1,
            })
            .collect())
    }

    async fn kill(&self, name: &str) -> Result<(), HangarError> {
        let _ = self.attachments.detach(name);
        match self.panes.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(HangarError::ExternalTool {
                command: format!("tmux kill-session -t ={name}"),
                output: format!("can't find session: {name}"),
            }),
        }
    }

    async fn rename_session(&self, old: &str, new: &str) -> Result<(), HangarError> {
        let mut panes = self.panes.lock().unwrap();
        let pane = panes
            .remove(old)
            .ok_or_else(|| HangarError::NotFound(old.to_string()))?;
        panes.insert(new.to_string(), pane);
        Ok(())
    }

    async fn send_keys(&self, name: &str, keys: &[&str]) -> Result<(), HangarError> {
        let mut panes = self.panes.lock().unwrap();
        let pane = panes
            .get_mut(name)
            .ok_or_else(|| HangarError::NotFound(name.to_string()))?;
        // A trailing Enter sent with other keys is folded into the line.
        pane.keys.push(keys.join(" ").trim_end_matches(" Enter").to_string());
        Ok(())
    }

    async fn capture_pane(&self, name: &str, _start_line: i32) -> Result<String, HangarError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.panes
            .lock()
            .unwrap()
            .get(name)
            .map(|p| p.content.clone())
            .ok_or_else(|| HangarError::NotFound(name.to_string()))
    }

    async fn attach(&self, name: &str) -> Result<DoneSignal, HangarError> {
        if !self.exists(name).await? {
            return Err(HangarError::NotFound(name.to_string()));
        }
        self.attachments
            .attach(name, || Ok(Box::new(NoopLink) as Box<dyn PtyLink>))
    }

    fn detach(&self, name: &str) -> Result<(), HangarError> {
        self.attachments.detach(name)
    }
}
