use ratatui::{layout::Rect, Frame};

use super::render_list_popup;
use crate::models::Bookmark;

pub struct BookmarksWindow;

impl BookmarksWindow {
    pub fn format_entry(bookmark: &Bookmark) -> String {
        format!(
            "{}  [chapter={}&page={}]",
            bookmark.name, bookmark.chapter, bookmark.page
        )
    }

    pub fn render(
        frame: &mut Frame,
        area: Rect,
        title: &str,
        bookmarks: &[Bookmark],
        selected_index: usize,
    ) {
        let entries: Vec<String> = bookmarks.iter().map(Self::format_entry).collect();
        render_list_popup(
            frame,
            area,
            title,
            &entries,
            selected_index,
            "No bookmarks yet",
        );
    }
}
