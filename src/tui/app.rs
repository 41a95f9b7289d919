use crate::cli::Direction;
use crate::commands::{self, Context};
use crate::domain::registry::RegistryState;
use crate::domain::session::Session;
use crate::infra::monitor::{spawn_monitor, MonitorHandle, PromptEvent};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::warn;

/// Lines of pane output shown in the preview panel.
const PREVIEW_LINES: i32 = -40;
/// Pending prompt events the monitors may queue before dropping.
const PROMPT_CHANNEL_CAPACITY: usize = 32;

pub struct App {
    pub ctx: Context,
    /// Visible sessions in manual order. A cache of the registry, never the
    /// source of truth.
    pub sessions: Vec<Session>,
    pub revision: Option<u64>,
    pub show_archived: bool,
    pub selected: usize,
    pub stats: HashMap<String, SessionStats>,
    pub input_mode: InputMode,
    pub input_buffer: String,
    pub input_label: String,
    pub notifications: VecDeque<Notification>,
    pub last_refresh: Instant,
    monitors: HashMap<String, MonitorHandle>,
    prompt_tx: mpsc::Sender<PromptEvent>,
}

/// Derived per-session data, kept across reloads while the name survives.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub live: bool,
    pub preview: String,
    pub captured_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    Normal,
    NewSession,
    Rename,
    Comment,
    Status,
    ConfirmDelete,
}

pub struct Notification {
    pub message: String,
    pub level: NotifyLevel,
    pub created_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotifyLevel {
    Info,
    Success,
    Error,
}

impl App {
    pub fn new(ctx: Context) -> (Self, mpsc::Receiver<PromptEvent>) {
        let (prompt_tx, prompt_rx) = mpsc::channel(PROMPT_CHANNEL_CAPACITY);
        let app = Self {
            ctx,
            sessions: vec![],
            revision: None,
            show_archived: false,
            selected: 0,
            stats: HashMap::new(),
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            input_label: String::new(),
            notifications: VecDeque::with_capacity(10),
            last_refresh: Instant::now(),
            monitors: HashMap::new(),
            prompt_tx,
        };
        (app, prompt_rx)
    }

    pub fn push_notification(&mut self, message: String, level: NotifyLevel) {
        self.notifications.push_back(Notification {
            message,
            level,
            created_at: Instant::now(),
        });
        // Keep only last 5
        while self.notifications.len() > 5 {
            self.notifications.pop_front();
        }
    }

    /// Drop messages older than the configured lifetime.
    pub fn expire_notifications(&mut self, now: Instant) {
        let ttl = self.ctx.config.error_clear_after();
        self.notifications
            .retain(|n| now.saturating_duration_since(n.created_at) < ttl);
    }

    pub fn selected_session(&self) -> Option<&Session> {
        self.sessions.get(self.selected)
    }

    pub fn selected_name(&self) -> Option<String> {
        self.selected_session().map(|s| s.name.clone())
    }

    pub fn select_next(&mut self) {
        if !self.sessions.is_empty() {
            self.selected = (self.selected + 1) % self.sessions.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.sessions.is_empty() {
            self.selected = self
                .selected
                .checked_sub(1)
                .unwrap_or(self.sessions.len() - 1);
        }
    }

    fn select_name(&mut self, name: &str) {
        if let Some(i) = self.sessions.iter().position(|s| s.name == name) {
            self.selected = i;
        }
    }

    /// Apply a freshly loaded registry. Returns false when the revision is
    /// the one already shown; applying the same state twice changes nothing.
    pub fn reconcile(&mut self, state: &RegistryState) -> bool {
        if self.revision == Some(state.revision) {
            return false;
        }
        let keep = self.selected_name();
        self.sessions = state
            .visible(self.show_archived)
            .into_iter()
            .cloned()
            .collect();
        self.stats.retain(|name, _| state.contains(name));
        self.revision = Some(state.revision);

        self.selected = self.selected.min(self.sessions.len().saturating_sub(1));
        if let Some(name) = keep {
            self.select_name(&name);
        }
        true
    }

    /// Poll tick: reload the registry and rebuild the view if it moved.
    pub fn refresh(&mut self) {
        self.last_refresh = Instant::now();
        match self.ctx.store.load() {
            Ok(state) => {
                if self.reconcile(&state) {
                    self.sync_monitors();
                }
            }
            Err(e) => {
                warn!(error = %e, "registry reload failed");
                self.push_notification(format!("Error: {e}"), NotifyLevel::Error);
            }
        }
    }

    /// Reload even if the revision looks unchanged (after our own writes, or
    /// when the archived filter flips).
    pub fn force_refresh(&mut self) {
        self.revision = None;
        self.refresh();
    }

    pub fn toggle_show_archived(&mut self) {
        self.show_archived = !self.show_archived;
        self.force_refresh();
    }

    /// Start monitors for visible sessions and stop those for vanished ones.
    /// No-op unless the prompt monitor is enabled.
    pub fn sync_monitors(&mut self) {
        if !self.ctx.config.prompt_monitor {
            return;
        }
        let names: Vec<String> = self.sessions.iter().map(|s| s.name.clone()).collect();
        self.monitors.retain(|name, _| names.contains(name));
        for name in names {
            if !self.monitors.contains_key(&name) {
                let handle = spawn_monitor(
                    self.ctx.mux.clone(),
                    name.clone(),
                    self.ctx.config.monitor_interval(),
                    self.prompt_tx.clone(),
                );
                self.monitors.insert(name, handle);
            }
        }
    }

    pub fn monitored(&self) -> usize {
        self.monitors.len()
    }

    pub fn stop_monitors(&mut self) {
        for handle in self.monitors.values_mut() {
            handle.stop();
        }
        self.monitors.clear();
    }

    /// Refresh the selected session's preview if it is stale.
    pub async fn update_selected_stats(&mut self, max_age: Duration) {
        let Some(name) = self.selected_name() else {
            return;
        };
        if self
            .stats
            .get(&name)
            .is_some_and(|s| s.captured_at.elapsed() < max_age)
        {
            return;
        }
        let live = self.ctx.mux.exists(&name).await.unwrap_or(false);
        let preview = if live {
            self.ctx
                .mux
                .capture_pane(&name, PREVIEW_LINES)
                .await
                .unwrap_or_default()
        } else {
            String::new()
        };
        self.stats.insert(
            name,
            SessionStats {
                live,
                preview,
                captured_at: Instant::now(),
            },
        );
    }

    fn report<T>(&mut self, result: Result<T, crate::error::HangarError>, ok: String) -> Option<T> {
        match result {
            Ok(v) => {
                self.push_notification(ok, NotifyLevel::Success);
                Some(v)
            }
            Err(e) => {
                self.push_notification(format!("Error: {e}"), NotifyLevel::Error);
                None
            }
        }
    }

    pub async fn create(&mut self, label: &str) {
        let req = commands::new::NewSession {
            label: label.to_string(),
            ..Default::default()
        };
        let result = commands::new::create_session(&self.ctx, &req).await;
        if let Some(s) = self.report(result, format!("Session '{label}' created")) {
            self.force_refresh();
            self.select_name(&s.name);
        }
    }

    pub async fn delete_selected(&mut self) {
        let Some(name) = self.selected_name() else {
            return;
        };
        let result = commands::delete::delete_session(&self.ctx, &name, false).await;
        if self.report(result, format!("Session '{name}' deleted")).is_some() {
            self.force_refresh();
        }
    }

    pub async fn rename_selected(&mut self, label: &str) {
        let Some(old) = self.selected_name() else {
            return;
        };
        let result = commands::rename::rename_session(&self.ctx, &old, label).await;
        if let Some(new) = self.report(result, format!("Renamed '{old}'")) {
            self.force_refresh();
            self.select_name(&new);
        }
    }

    pub fn move_selected(&mut self, direction: Direction) {
        let Some(name) = self.selected_name() else {
            return;
        };
        match commands::edit::move_session(&self.ctx, &name, direction) {
            Ok(true) => {
                self.force_refresh();
                self.select_name(&name);
            }
            Ok(false) => {}
            Err(e) => self.push_notification(format!("Error: {e}"), NotifyLevel::Error),
        }
    }

    pub async fn archive_selected(&mut self) {
        let Some(name) = self.selected_name() else {
            return;
        };
        let result = commands::edit::archive_session(&self.ctx, &name, false).await;
        if self.report(result, format!("Toggled archive on '{name}'")).is_some() {
            self.force_refresh();
        }
    }

    pub fn flag_selected(&mut self) {
        let Some(name) = self.selected_name() else {
            return;
        };
        if let Err(e) = self.ctx.store.toggle_flag(&name) {
            self.push_notification(format!("Error: {e}"), NotifyLevel::Error);
        }
        self.force_refresh();
    }

    pub fn set_comment_selected(&mut self, text: &str) {
        let Some(name) = self.selected_name() else {
            return;
        };
        let result = self.ctx.store.set_comment(&name, text);
        self.report(result, "Comment saved".into());
        self.force_refresh();
    }

    pub fn set_status_selected(&mut self, text: &str) {
        let Some(name) = self.selected_name() else {
            return;
        };
        let result = self.ctx.store.set_status(&name, text);
        self.report(result, "Status saved".into());
        self.force_refresh();
    }

    pub fn begin_input(&mut self, mode: InputMode, label: &str, initial: &str) {
        self.input_mode = mode;
        self.input_label = label.to_string();
        self.input_buffer = initial.to_string();
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.stop_monitors();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::TestContext;
    use crate::config::GlobalConfig;
    use crate::domain::session::SessionState;
    use crate::infra::fake::FakeMultiplexer;
    use crate::infra::state::RegistryStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Harness {
        mux: Arc<FakeMultiplexer>,
        _dir: TempDir,
    }

    fn app_for(t: TestContext) -> (App, Harness) {
        let (ctx, mux, dir) = t.into_parts();
        let (app, _rx) = App::new(ctx);
        (app, Harness { mux, _dir: dir })
    }

    fn add(store: &RegistryStore, name: &str) {
        store
            .add(Session::new(name.to_string(), name.to_string()))
            .unwrap();
    }

    fn names(app: &App) -> Vec<&str> {
        app.sessions.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn reconcile_skips_unchanged_revision() {
        let (mut app, _h) = app_for(TestContext::new());
        add(&app.ctx.store, "a");
        let state = app.ctx.store.load().unwrap();
        assert!(app.reconcile(&state));
        assert!(!app.reconcile(&state));
        assert_eq!(names(&app), vec!["a"]);
    }

    #[test]
    fn refresh_picks_up_external_writes() {
        let (mut app, _h) = app_for(TestContext::new());
        app.refresh();
        assert!(app.sessions.is_empty());

        // Another process (a hook) writes to the registry.
        add(&app.ctx.store, "a");
        let other = RegistryStore::new(app.ctx.store.data_dir());
        other.update_state("a", SessionState::Working).unwrap();

        app.refresh();
        assert_eq!(app.sessions[0].state, SessionState::Working);
    }

    #[test]
    fn selection_follows_name_across_reorders() {
        let (mut app, _h) = app_for(TestContext::new());
        for n in ["a", "b", "c"] {
            add(&app.ctx.store, n);
        }
        app.refresh();
        assert_eq!(names(&app), vec!["c", "b", "a"]);
        app.selected = 2; // "a"

        app.ctx.store.swap_positions("a", "c").unwrap();
        app.refresh();
        assert_eq!(names(&app), vec!["a", "b", "c"]);
        assert_eq!(app.selected_name().as_deref(), Some("a"));
    }

    #[test]
    fn selection_clamps_when_sessions_vanish() {
        let (mut app, _h) = app_for(TestContext::new());
        add(&app.ctx.store, "a");
        add(&app.ctx.store, "b");
        app.refresh();
        app.selected = 1;
        app.ctx.store.delete("a").unwrap();
        app.refresh();
        assert_eq!(app.selected, 0);
        assert_eq!(app.selected_name().as_deref(), Some("b"));
    }

    #[test]
    fn stats_survive_only_for_present_names() {
        let (mut app, _h) = app_for(TestContext::new());
        add(&app.ctx.store, "a");
        add(&app.ctx.store, "b");
        app.refresh();
        for n in ["a", "b"] {
            app.stats.insert(
                n.to_string(),
                SessionStats {
                    live: true,
                    preview: format!("{n} output"),
                    captured_at: Instant::now(),
                },
            );
        }
        app.ctx.store.delete("b").unwrap();
        app.refresh();
        assert!(app.stats.contains_key("a"));
        assert!(!app.stats.contains_key("b"));
    }

    #[test]
    fn archived_filter() {
        let (mut app, _h) = app_for(TestContext::new());
        add(&app.ctx.store, "a");
        add(&app.ctx.store, "b");
        app.ctx.store.toggle_archive("a").unwrap();
        app.refresh();
        assert_eq!(names(&app), vec!["b"]);
        app.toggle_show_archived();
        assert_eq!(names(&app), vec!["b", "a"]);
    }

    #[test]
    fn move_selected_swaps_with_neighbour() {
        let (mut app, _h) = app_for(TestContext::new());
        add(&app.ctx.store, "a");
        add(&app.ctx.store, "b");
        app.refresh();
        app.selected = 1; // "a"
        app.move_selected(Direction::Up);
        assert_eq!(names(&app), vec!["a", "b"]);
        assert_eq!(app.selected, 0);
    }

    #[tokio::test]
    async fn delete_selected_goes_through_mux_and_registry() {
        let (mut app, h) = app_for(TestContext::new());
        add(&app.ctx.store, "a");
        h.mux.insert("a");
        app.refresh();
        app.delete_selected().await;
        assert!(app.sessions.is_empty());
        assert!(h.mux.names().is_empty());
        assert_eq!(app.notifications.back().unwrap().level, NotifyLevel::Success);
    }

    #[tokio::test]
    async fn preview_is_cached_by_name() {
        let (mut app, h) = app_for(TestContext::new());
        add(&app.ctx.store, "a");
        h.mux.insert("a");
        h.mux.set_content("a", "hello");
        app.refresh();
        app.update_selected_stats(Duration::from_secs(60)).await;
        h.mux.set_content("a", "changed");
        app.update_selected_stats(Duration::from_secs(60)).await;
        assert_eq!(app.stats["a"].preview, "hello");
        assert!(app.stats["a"].live);
    }

    #[test]
    fn notifications_expire() {
        let (mut app, _h) = app_for(TestContext::new());
        app.push_notification("boom".into(), NotifyLevel::Error);
        let later = Instant::now() + Duration::from_secs(app.ctx.config.error_clear_secs + 1);
        app.expire_notifications(Instant::now());
        assert_eq!(app.notifications.len(), 1);
        app.expire_notifications(later);
        assert!(app.notifications.is_empty());
    }

    #[tokio::test]
    async fn monitors_follow_visible_sessions() {
        let mut t = TestContext::new();
        t.ctx.config = GlobalConfig {
            prompt_monitor: true,
            ..GlobalConfig::default()
        };
        let (mut app, _h) = app_for(t);
        add(&app.ctx.store, "a");
        add(&app.ctx.store, "b");
        app.refresh();
        assert_eq!(app.monitored(), 2);
        app.ctx.store.delete("a").unwrap();
        app.refresh();
        assert_eq!(app.monitored(), 1);
    }
}
