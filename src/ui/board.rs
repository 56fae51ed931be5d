use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::locale::{Language, Message};
use crate::models::{PageSlot, ReadingDirection, ScaledDimensions};
use crate::session::ReaderSession;

/// Pixel size of one terminal cell when the terminal does not report one.
pub const FALLBACK_CELL_SIZE: (f64, f64) = (8.0, 16.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    Loading,
    Failed,
    Ready,
}

/// Which side of its column a panel hugs. Spread pages meet at the gutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Left,
    Center,
    Right,
}

/// Flip surface: one bordered panel per visible page slot.
pub struct Board {
    cell_width: f64,
    cell_height: f64,
    language: Language,
}

impl Board {
    pub fn new() -> Self {
        Self {
            cell_width: FALLBACK_CELL_SIZE.0,
            cell_height: FALLBACK_CELL_SIZE.1,
            language: Language::default(),
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_cell_size(mut self, width: f64, height: f64) -> Self {
        self.set_cell_size(width, height);
        self
    }

    pub fn set_cell_size(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 {
            self.cell_width = width;
            self.cell_height = height;
        }
    }

    pub fn cell_size(&self) -> (f64, f64) {
        (self.cell_width, self.cell_height)
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, session: &ReaderSession) {
        let visible = session.visible_slots();
        if visible.is_empty() {
            self.render_empty(frame, area, session);
            return;
        }

        let constraints = vec![Constraint::Ratio(1, visible.len() as u32); visible.len()];
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        let panel_size = self.panel_size(session.scaled());
        let status = if session.image_failed() {
            ImageStatus::Failed
        } else if session.awaiting_image() {
            ImageStatus::Loading
        } else {
            ImageStatus::Ready
        };

        for (n, (column, &index)) in columns.iter().zip(&visible).enumerate() {
            let Some(slot) = session.slots().get(index) else {
                continue;
            };
            let anchor = match (visible.len(), n) {
                (1, _) => Anchor::Center,
                (_, 0) => Anchor::Right,
                _ => Anchor::Left,
            };
            let rect = fit_panel(*column, panel_size, anchor);
            self.render_slot(frame, rect, session, index, slot, status);
        }
    }

    /// Panel size in cells for an image scaled to `scaled` pixels, borders included.
    pub fn panel_size(&self, scaled: Option<ScaledDimensions>) -> Option<(u16, u16)> {
        let scaled = scaled?;
        let width = (f64::from(scaled.width) / self.cell_width).ceil() as u16;
        let height = (f64::from(scaled.height) / self.cell_height).ceil() as u16;
        Some((width.saturating_add(2), height.saturating_add(2)))
    }

    fn render_slot(
        &self,
        frame: &mut Frame,
        rect: Rect,
        session: &ReaderSession,
        index: usize,
        slot: &PageSlot,
        status: ImageStatus,
    ) {
        let title = format!(
            " {} {} ",
            Message::Page.text(self.language),
            session.display_number(index)
        );
        let border_style = if index == session.current_page() {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title);
        let inner = block.inner(rect);
        frame.render_widget(block, rect);

        let alignment = match session.direction() {
            ReadingDirection::Rtl => Alignment::Right,
            ReadingDirection::Ltr => Alignment::Left,
        };
        let lines = self.slot_lines(slot, inner.width as usize, status);
        frame.render_widget(Paragraph::new(lines).alignment(alignment), inner);
    }

    /// Text content of one panel, wrapped to `width` columns.
    pub fn slot_lines(
        &self,
        slot: &PageSlot,
        width: usize,
        status: ImageStatus,
    ) -> Vec<Line<'static>> {
        let PageSlot::Page {
            url, translation, ..
        } = slot
        else {
            return Vec::new();
        };
        let width = width.max(1);
        let mut lines = Vec::new();

        match status {
            ImageStatus::Loading => lines.push(Line::from(Span::styled(
                Message::Loading.text(self.language),
                Style::default().fg(Color::DarkGray),
            ))),
            ImageStatus::Failed => lines.push(Line::from(Span::styled(
                Message::ImageUnavailable.text(self.language),
                Style::default().fg(Color::Red),
            ))),
            ImageStatus::Ready => {}
        }

        let url_style = Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC);
        for part in textwrap::wrap(url, textwrap::Options::new(width).break_words(true)) {
            lines.push(Line::from(Span::styled(part.into_owned(), url_style)));
        }

        if let Some(text) = translation {
            lines.push(Line::from(""));
            for paragraph in text.lines() {
                for part in textwrap::wrap(paragraph, width) {
                    lines.push(Line::from(part.into_owned()));
                }
            }
        }
        lines
    }

    fn render_empty(&self, frame: &mut Frame, area: Rect, session: &ReaderSession) {
        let message = if session.is_loading() {
            Message::Loading
        } else {
            Message::NoManga
        };
        let paragraph = Paragraph::new(message.text(self.language))
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// Shrink `column` to `size`, keeping the panel vertically centered.
pub fn fit_panel(column: Rect, size: Option<(u16, u16)>, anchor: Anchor) -> Rect {
    let Some((width, height)) = size else {
        return column;
    };
    let width = width.clamp(3, column.width.max(3)).min(column.width);
    let height = height.clamp(3, column.height.max(3)).min(column.height);
    let spare = column.width - width;
    let x = match anchor {
        Anchor::Left => column.x,
        Anchor::Center => column.x + spare / 2,
        Anchor::Right => column.x + spare,
    };
    let y = column.y + (column.height - height) / 2;
    Rect::new(x, y, width, height)
}
