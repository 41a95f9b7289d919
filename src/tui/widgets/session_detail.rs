use crate::tui::app::App;
use crate::tui::widgets::{panel_block, state_color};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;

fn field<'a>(label: &'a str, value: String, style: Style) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Gray)),
        Span::styled(value, style),
    ])
}

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let Some(session) = app.selected_session() else {
        let paragraph = Paragraph::new("No session selected. Press 'n' to create one.")
            .block(panel_block("Session", Color::Gray, false))
            .style(Style::default().fg(Color::Gray));
        f.render_widget(paragraph, area);
        return;
    };

    let live = match app.stats.get(&session.name) {
        Some(s) if s.live => "running",
        Some(_) => "not running",
        None => "?",
    };

    let mut lines = vec![
        field(
            "State: ",
            session.state.to_string(),
            Style::default()
                .fg(state_color(session.state))
                .add_modifier(Modifier::BOLD),
        ),
        field("tmux: ", format!("{} ({live})", session.name), Style::default()),
    ];
    if let Some(dir) = session.start_dir() {
        lines.push(field("Dir: ", dir.display().to_string(), Style::default()));
    }
    if let Some(branch) = &session.branch_name {
        lines.push(field("Branch: ", branch.clone(), Style::default().fg(Color::Cyan)));
    }
    if let Some(repo) = &session.repo_info {
        lines.push(field("Repo: ", repo.clone(), Style::default()));
    }
    if let Some(shell) = &session.shell_session {
        lines.push(field("Shell: ", shell.clone(), Style::default()));
    }
    if !session.status.is_empty() {
        lines.push(field("Status: ", session.status.clone(), Style::default().fg(Color::Cyan)));
    }
    if !session.comment.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            session.comment.clone(),
            Style::default().fg(Color::White),
        )));
    }
    lines.push(Line::from(""));
    lines.push(field(
        "Updated: ",
        session.last_updated.format("%Y-%m-%d %H:%M:%S").to_string(),
        Style::default().fg(Color::DarkGray),
    ));

    let paragraph = Paragraph::new(lines)
        .block(panel_block(&session.display_name, state_color(session.state), false))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}
