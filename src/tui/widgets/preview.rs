use crate::tui::app::App;
use crate::tui::widgets::panel_block;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let block = panel_block("Pane", Color::DarkGray, false);

    let text = match app
        .selected_session()
        .and_then(|s| app.stats.get(&s.name))
    {
        Some(stats) if stats.live => stats.preview.trim_end().to_string(),
        Some(_) => "Not running. Press Enter to start and attach.".to_string(),
        None => String::new(),
    };

    // Pin to the bottom, like the pane itself.
    let inner_height = area.height.saturating_sub(2) as usize;
    let total = text.lines().count();
    let scroll = total.saturating_sub(inner_height) as u16;

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::Gray))
        .scroll((scroll, 0));
    f.render_widget(paragraph, area);
}
