use ratatui::{layout::Rect, Frame};

use super::render_list_popup;

pub struct LibraryWindow;

impl LibraryWindow {
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        title: &str,
        entries: &[String],
        selected_index: usize,
    ) {
        render_list_popup(
            frame,
            area,
            title,
            entries,
            selected_index,
            "Nothing read yet",
        );
    }
}
