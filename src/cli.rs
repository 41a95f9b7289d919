use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hangar", version, about = "Named tmux sessions for coding agents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding the session registry and log
    #[arg(long, global = true, env = "HANGAR_HOME")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a session, start the agent in it and attach
    New {
        /// Display label; the session name is derived from it
        label: String,

        /// Working directory for the session
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Run the agent in a fresh git worktree
        #[arg(long)]
        worktree: bool,

        /// Repository to create the worktree from (defaults to cwd's repo)
        #[arg(long, requires = "worktree")]
        repo: Option<PathBuf>,

        /// Worktree branch (defaults to the session name)
        #[arg(long, requires = "worktree")]
        branch: Option<String>,

        /// Create and start, but do not attach
        #[arg(long)]
        no_attach: bool,
    },

    /// Register a session without starting tmux
    Add {
        label: String,

        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// List sessions in manual order
    List {
        /// Include archived sessions
        #[arg(short, long)]
        all: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one session
    Show { name: String },

    /// Attach to a session (Ctrl+Q detaches)
    Attach { name: String },

    /// Delete a session and kill its tmux session
    Delete {
        name: String,

        /// Leave the tmux session running
        #[arg(long)]
        keep_session: bool,
    },

    /// Rename a session
    Rename { old: String, new: String },

    /// Move a session one slot up or down
    Move {
        name: String,
        #[arg(value_enum)]
        direction: Direction,
    },

    /// Toggle the archived flag
    Archive {
        name: String,

        /// Also remove the session's git worktree
        #[arg(long)]
        remove_worktree: bool,
    },

    /// Toggle the flagged marker
    Flag { name: String },

    /// Set a free-form comment
    Comment { name: String, text: String },

    /// Set a short status label
    Status { name: String, text: String },

    /// Print pane content
    Capture {
        name: String,

        /// First line to capture; negative counts back from the bottom
        #[arg(long, default_value_t = -50, allow_hyphen_values = true)]
        start: i32,

        /// Copy to the clipboard instead of printing
        #[arg(long)]
        copy: bool,
    },

    /// Type text into a session, followed by Enter
    Send { name: String, text: String },

    /// Report an agent lifecycle event (used by agent hooks)
    Notify {
        name: String,

        /// start, prompt, working, stop, notification or end
        event: Option<String>,

        #[arg(long, env = "HANGAR_EXECUTION_ID")]
        execution_id: Option<String>,

        /// Ignore events from a different execution
        #[arg(long)]
        strict: bool,
    },

    /// Run the agent for a session (typed into the pane by `new`)
    #[command(hide = true)]
    Start { name: String },

    /// Open the companion shell session
    Shell { name: String },

    /// Print agent hook configuration wired to `notify`
    Hooks,
}

impl Commands {
    /// Whether the command cannot do its job without tmux. Delete and
    /// archive only clean tmux up best-effort, so they run without it.
    pub fn needs_tmux(&self) -> bool {
        matches!(
            self,
            Self::New { .. }
                | Self::Attach { .. }
                | Self::Rename { .. }
                | Self::Capture { .. }
                | Self::Send { .. }
                | Self::Shell { .. }
        )
    }
}
