use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// A Session is one named tmux session wrapping one agent process, plus the
/// user-set metadata the registry keeps about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Registry key and tmux session name.
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub state: SessionState,
    #[serde(default)]
    pub worktree_path: Option<PathBuf>,
    #[serde(default)]
    pub repo_path: Option<PathBuf>,
    #[serde(default)]
    pub repo_info: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
    /// Working directory the tmux session is rooted at.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    pub execution_id: String,
    /// Execution ID carried by the most recent hook event, for debugging.
    #[serde(default)]
    pub last_hook_execution_id: Option<String>,
    /// Companion shell session, by name only.
    #[serde(default)]
    pub shell_session: Option<String>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_flagged: bool,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Session {
    pub fn new(name: String, display_name: String) -> Self {
        let now = Utc::now();
        Self {
            name,
            display_name,
            state: SessionState::default(),
            worktree_path: None,
            repo_path: None,
            repo_info: None,
            branch_name: None,
            work_dir: None,
            execution_id: new_execution_id(),
            last_hook_execution_id: None,
            shell_session: None,
            is_archived: false,
            is_flagged: false,
            comment: String::new(),
            status: String::new(),
            created_at: now,
            last_updated: now,
        }
    }

    /// Directory a (re-)created tmux session should start in.
    pub fn start_dir(&self) -> Option<&PathBuf> {
        self.worktree_path.as_ref().or(self.work_dir.as_ref())
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

pub fn new_execution_id() -> String {
    Uuid::new_v4().to_string()
}

/// Liveness of the agent inside a session. Only these four values are ever
/// persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Working,
    #[default]
    Idle,
    WaitingUser,
    Exited,
}

impl SessionState {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Working => "⟳",
            Self::Idle => "○",
            Self::WaitingUser => "●",
            Self::Exited => "✗",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Working => write!(f, "working"),
            Self::Idle => write!(f, "idle"),
            Self::WaitingUser => write!(f, "waiting_user"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Lifecycle event reported by the wrapped agent through `hangar notify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Start,
    Prompt,
    Working,
    Stop,
    Notification,
    End,
}

impl HookEvent {
    pub const ALL: [HookEvent; 6] = [
        Self::Start,
        Self::Prompt,
        Self::Working,
        Self::Stop,
        Self::Notification,
        Self::End,
    ];

    /// Parse an event name. Unknown or missing names behave like `stop`.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            Some("start") => Self::Start,
            Some("prompt") => Self::Prompt,
            Some("working") => Self::Working,
            Some("notification") => Self::Notification,
            Some("end") => Self::End,
            _ => Self::Stop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Prompt => "prompt",
            Self::Working => "working",
            Self::Stop => "stop",
            Self::Notification => "notification",
            Self::End => "end",
        }
    }

    /// State after applying this event to `current`.
    pub fn next_state(self, current: SessionState) -> SessionState {
        match self {
            Self::Start => SessionState::WaitingUser,
            Self::Prompt | Self::Working => SessionState::Working,
            Self::Stop => SessionState::Idle,
            Self::Notification => current,
            Self::End => SessionState::Exited,
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
