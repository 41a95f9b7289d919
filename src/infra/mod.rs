pub mod clipboard;
#[cfg(test)]
pub mod fake;
pub mod git;
pub mod monitor;
pub mod pty;
pub mod state;
pub mod tmux;
