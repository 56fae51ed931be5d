pub mod bookmarks;
pub mod help;
pub mod library;

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

/// Compute a centered popup area within the given area.
pub fn centered_popup_area(area: Rect, width_percent: u16, height_percent: u16) -> Rect {
    let width = (area.width * width_percent) / 100;
    let height = (area.height * height_percent) / 100;
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;

    Rect::new(x, y, width, height)
}

/// Popup list with a highlighted row, or a hint when there is nothing to show.
pub(crate) fn render_list_popup(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    entries: &[String],
    selected_index: usize,
    empty_text: &str,
) {
    let popup_area = centered_popup_area(area, 70, 70);
    frame.render_widget(Clear, popup_area);

    let block = Block::default().title(title.to_string()).borders(Borders::ALL);

    if entries.is_empty() {
        let text = vec![
            Line::from(empty_text.to_string()),
            Line::from(""),
            Line::from(Span::styled(
                "Esc to close",
                Style::default().add_modifier(Modifier::ITALIC),
            )),
        ];
        let paragraph = Paragraph::new(text)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, popup_area);
        return;
    }

    let items: Vec<ListItem> = entries
        .iter()
        .map(|entry| ListItem::new(Line::from(entry.clone())))
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White));

    let mut list_state = ListState::default();
    list_state.select(Some(selected_index.min(entries.len() - 1)));
    frame.render_stateful_widget(list, popup_area, &mut list_state);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_popup_area() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered_popup_area(area, 50, 50);
        assert_eq!(popup, Rect::new(25, 10, 50, 20));
    }
}
