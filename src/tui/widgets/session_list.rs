use crate::tui::app::App;
use crate::tui::widgets::{panel_block, state_color};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{List, ListItem, ListState};
use ratatui::Frame;

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let sessions: Vec<ListItem> = app
        .sessions
        .iter()
        .enumerate()
        .map(|(i, session)| {
            let mut spans = vec![Span::styled(
                format!(" {} ", session.state.icon()),
                Style::default().fg(state_color(session.state)),
            )];
            if session.is_flagged {
                spans.push(Span::styled("⚑ ", Style::default().fg(Color::Red)));
            }

            let mut name_style = if i == app.selected {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            if session.is_archived {
                name_style = name_style.fg(Color::DarkGray);
            }
            spans.push(Span::styled(session.display_name.clone(), name_style));

            if let Some(repo) = &session.repo_info {
                spans.push(Span::styled(
                    format!("  {repo}"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            if !session.status.is_empty() {
                spans.push(Span::styled(
                    format!("  {}", session.status),
                    Style::default().fg(Color::Cyan),
                ));
            }

            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = if app.show_archived {
        format!("Sessions ({}, incl. archived)", app.sessions.len())
    } else {
        format!("Sessions ({})", app.sessions.len())
    };

    let mut list_state = ListState::default();
    if !app.sessions.is_empty() {
        list_state.select(Some(app.selected));
    }

    let list = List::new(sessions)
        .block(panel_block(&title, Color::Cyan, true))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );

    f.render_stateful_widget(list, area, &mut list_state);
}
