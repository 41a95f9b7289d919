pub mod app;
pub mod widgets;

use app::{App, InputMode, NotifyLevel};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Terminal;
use std::io;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::cli;
use crate::commands::{self, Context};
use crate::domain::session::SessionState;
use crate::infra::monitor::PromptEvent;
use tokio::sync::mpsc;

type Term = Terminal<CrosstermBackend<io::Stdout>>;

pub async fn run(ctx: Context) -> anyhow::Result<()> {
    let (mut app, mut prompt_rx) = App::new(ctx);
    app.refresh();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut app, &mut prompt_rx).await;
    app.stop_monitors();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn event_loop(
    terminal: &mut Term,
    app: &mut App,
    prompt_rx: &mut mpsc::Receiver<PromptEvent>,
) -> anyhow::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let refresh_interval = app.ctx.config.poll_interval();
    let mut last_tick = Instant::now();

    loop {
        // Draw
        terminal.draw(|f| draw(f, app))?;

        // Poll for events
        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && handle_key(terminal, app, key.code, key.modifiers).await?
                {
                    break;
                }
            }
        }

        while let Ok(event) = prompt_rx.try_recv() {
            on_prompt(app, event);
        }

        // Tick
        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();

            if app.last_refresh.elapsed() >= refresh_interval {
                app.refresh();
            }
            app.update_selected_stats(refresh_interval).await;
            app.expire_notifications(Instant::now());
        }
    }

    Ok(())
}

fn on_prompt(app: &mut App, event: PromptEvent) {
    info!(session = %event.session, "session is waiting for input");
    let label = app
        .sessions
        .iter()
        .find(|s| s.name == event.session)
        .map(|s| s.display_name.clone())
        .unwrap_or_else(|| event.session.clone());

    if app.ctx.config.notify_on_prompt {
        let _ = notify_rust::Notification::new()
            .summary(&format!("hangar: {label} is waiting"))
            .body(&event.excerpt)
            .show();
    }
    app.push_notification(format!("'{label}' is waiting for input"), NotifyLevel::Info);
}

fn draw(f: &mut ratatui::Frame, app: &App) {
    let size = f.area();

    // Main layout: header + body + status bar
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Min(5),   // body
            Constraint::Length(1), // status bar
        ])
        .split(size);

    render_header(f, app, main_chunks[0]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(main_chunks[1]);

    widgets::session_list::render(f, app, body_chunks[0]);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(11), Constraint::Min(4)])
        .split(body_chunks[1]);

    widgets::session_detail::render(f, app, right_chunks[0]);
    widgets::preview::render(f, app, right_chunks[1]);

    widgets::status_bar::render(f, app, main_chunks[2]);
}

fn render_header(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let working = app
        .sessions
        .iter()
        .filter(|s| s.state == SessionState::Working)
        .count();

    let line = Line::from(vec![
        Span::styled(
            " hangar",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" ({} sessions, {working} working)", app.sessions.len()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    f.render_widget(Paragraph::new(line), area);
}

/// Handle a key event. Returns true if the app should quit.
async fn handle_key(
    terminal: &mut Term,
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
) -> anyhow::Result<bool> {
    match &app.input_mode {
        InputMode::Normal => handle_normal_key(terminal, app, code, modifiers).await,
        InputMode::ConfirmDelete => {
            handle_confirm_key(app, code).await;
            Ok(false)
        }
        _ => {
            handle_input_key(app, code).await;
            Ok(false)
        }
    }
}

async fn handle_normal_key(
    terminal: &mut Term,
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
) -> anyhow::Result<bool> {
    match code {
        KeyCode::Char('q') => return Ok(true),
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),

        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
        KeyCode::Char('J') => app.move_selected(cli::Direction::Down),
        KeyCode::Char('K') => app.move_selected(cli::Direction::Up),

        KeyCode::Char('n') => app.begin_input(InputMode::NewSession, "New session name", ""),
        KeyCode::Char('R') => {
            if let Some(s) = app.selected_session() {
                let current = s.display_name.clone();
                app.begin_input(InputMode::Rename, "Rename to", &current);
            }
        }
        KeyCode::Char('c') => {
            if let Some(s) = app.selected_session() {
                let current = s.comment.clone();
                app.begin_input(InputMode::Comment, "Comment", &current);
            }
        }
        KeyCode::Char('s') => {
            if let Some(s) = app.selected_session() {
                let current = s.status.clone();
                app.begin_input(InputMode::Status, "Status", &current);
            }
        }
        KeyCode::Char('d') => {
            if app.selected_session().is_some() {
                app.input_mode = InputMode::ConfirmDelete;
            }
        }
        KeyCode::Char('A') => app.archive_selected().await,
        KeyCode::Char('f') => app.flag_selected(),
        KeyCode::Char('H') => app.toggle_show_archived(),

        KeyCode::Enter | KeyCode::Char('a') => attach_selected(terminal, app).await?,

        KeyCode::Char('r') => {
            app.force_refresh();
            app.stats.clear();
            app.push_notification("Refreshed".into(), NotifyLevel::Info);
        }

        _ => {}
    }

    Ok(false)
}

/// Hand the terminal to the selected session until the user detaches,
/// re-creating the tmux session first if it died.
async fn attach_selected(terminal: &mut Term, app: &mut App) -> anyhow::Result<()> {
    let Some(name) = app.selected_name() else {
        return Ok(());
    };

    if let Err(e) = commands::attach::ensure_running(&app.ctx, &name).await {
        app.push_notification(format!("Error: {e}"), NotifyLevel::Error);
        return Ok(());
    }

    execute!(io::stdout(), LeaveAlternateScreen)?;
    let result = commands::attach::attach_terminal(&app.ctx, &name).await;

    // Re-setup terminal after detach
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    terminal.clear()?;

    if let Err(e) = result {
        warn!(session = %name, error = %e, "attach failed");
        app.push_notification(format!("Error: {e}"), NotifyLevel::Error);
    }
    app.stats.remove(&name);
    app.force_refresh();
    Ok(())
}

async fn handle_input_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.input_buffer.clear();
        }
        KeyCode::Enter => {
            let input = app.input_buffer.trim().to_string();
            let mode = std::mem::replace(&mut app.input_mode, InputMode::Normal);
            app.input_buffer.clear();

            match mode {
                InputMode::NewSession if !input.is_empty() => app.create(&input).await,
                InputMode::Rename if !input.is_empty() => app.rename_selected(&input).await,
                InputMode::Comment => app.set_comment_selected(&input),
                InputMode::Status => app.set_status_selected(&input),
                _ => {}
            }
        }
        KeyCode::Backspace => {
            app.input_buffer.pop();
        }
        KeyCode::Char(c) => {
            app.input_buffer.push(c);
        }
        _ => {}
    }
}

async fn handle_confirm_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            app.input_mode = InputMode::Normal;
            app.delete_selected().await;
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        _ => {}
    }
}
