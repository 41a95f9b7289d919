use crate::domain::session::SessionState;
use crate::tui::app::{App, InputMode, NotifyLevel};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    match &app.input_mode {
        InputMode::Normal => render_normal(f, app, area),
        InputMode::ConfirmDelete => render_confirm_delete(f, app, area),
        InputMode::NewSession | InputMode::Rename | InputMode::Comment | InputMode::Status => {
            render_input(f, app, area)
        }
    }
}

fn render_normal(f: &mut Frame, app: &App, area: Rect) {
    let line = if let Some(n) = app.notifications.back() {
        let color = match n.level {
            NotifyLevel::Info => Color::Yellow,
            NotifyLevel::Success => Color::Green,
            NotifyLevel::Error => Color::Red,
        };
        Line::from(vec![
            Span::styled(" ", Style::default()),
            Span::styled(&n.message, Style::default().fg(color)),
        ])
    } else {
        let mut spans = vec![];
        for (key, rest) in [
            ("[n]", "ew "),
            ("[a/⏎]", "ttach "),
            ("[d]", "elete "),
            ("[R]", "ename "),
            ("[J/K]", " move "),
            ("[A]", "rchive "),
            ("[f]", "lag "),
            ("[c]", "omment "),
            ("[s]", "tatus "),
            ("[H]", " archived "),
            ("[q]", "uit"),
        ] {
            spans.push(key_span(key));
            spans.push(Span::raw(rest));
        }
        let waiting = app
            .sessions
            .iter()
            .filter(|s| s.state == SessionState::WaitingUser)
            .count();
        if waiting > 0 {
            spans.push(Span::styled(
                format!("  {waiting} waiting"),
                Style::default().fg(Color::Magenta),
            ));
        }
        Line::from(spans)
    };

    f.render_widget(Paragraph::new(line), area);
}

fn key_span(text: &str) -> Span<'_> {
    Span::styled(
        text,
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )
}

fn render_input(f: &mut Frame, app: &App, area: Rect) {
    let line = Line::from(vec![
        Span::styled(
            format!(" {}: ", app.input_label),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(&app.input_buffer, Style::default()),
        Span::styled("█", Style::default().fg(Color::Cyan)),
        Span::styled(
            "  (Enter to confirm, Esc to cancel)",
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    f.render_widget(Paragraph::new(line), area);
}

fn render_confirm_delete(f: &mut Frame, app: &App, area: Rect) {
    let name = app
        .selected_session()
        .map(|s| s.display_name.as_str())
        .unwrap_or("?");

    let line = Line::from(vec![
        Span::styled(
            format!(" Delete session '{name}' and kill its tmux session? "),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        key_span("[y]"),
        Span::raw("es "),
        key_span("[n]"),
        Span::raw("o"),
    ]);

    f.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::TestContext;
    use crate::domain::session::Session;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn rendered(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(160, 1)).unwrap();
        terminal.draw(|f| render(f, app, f.area())).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn counts_sessions_waiting_for_input() {
        let (ctx, _mux, _dir) = TestContext::new().into_parts();
        let (mut app, _rx) = App::new(ctx);
        assert!(!rendered(&app).contains("waiting"));

        for (name, state) in [
            ("a", SessionState::WaitingUser),
            ("b", SessionState::Working),
            ("c", SessionState::WaitingUser),
        ] {
            let mut s = Session::new(name.into(), name.into());
            s.state = state;
            app.sessions.push(s);
        }
        assert!(rendered(&app).contains("2 waiting"));
    }
}
