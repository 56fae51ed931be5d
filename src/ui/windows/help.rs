use ratatui::{
    layout::Rect,
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

pub struct HelpWindow;

/// Keys that are fixed regardless of the keymap.
const FIXED_KEYS: &[(&str, &str)] = &[
    ("Left / Right", "Flip along the reading direction"),
    ("Space / PgDn", "Next page"),
    ("Bksp / PgUp", "Previous page"),
    ("Home / End", "First / last page"),
    ("<N> + next chapter", "Go to chapter N"),
];

impl HelpWindow {
    pub fn lines(entries: &[(&str, &str)]) -> Vec<String> {
        let mut lines = vec![" Key Bindings:".to_string()];
        for (key, description) in entries {
            lines.push(format!("   {key:<18} {description}"));
        }
        lines.push(String::new());
        lines.push(" Navigation:".to_string());
        for (key, description) in FIXED_KEYS {
            lines.push(format!("   {key:<18} {description}"));
        }
        lines
    }

    pub fn max_scroll_offset(area: Rect, total_lines: usize) -> u16 {
        let visible = area.height.saturating_sub(2) as usize;
        total_lines.saturating_sub(visible) as u16
    }

    pub fn render(
        frame: &mut Frame,
        area: Rect,
        title: &str,
        lines: &[String],
        scroll_offset: u16,
    ) {
        let help_content: Vec<Line> = lines.iter().map(|s| Line::from(s.as_str())).collect();

        let max_width = help_content.iter().map(|l| l.width()).max().unwrap_or(0) as u16;
        let width = (max_width + 4).min(area.width);
        let height = (help_content.len() as u16 + 2).min(area.height);

        let x = area.x + (area.width - width) / 2;
        let y = area.y + (area.height - height) / 2;
        let popup_area = Rect::new(x, y, width, height);

        frame.render_widget(Clear, popup_area);

        let help_paragraph = Paragraph::new(help_content)
            .block(Block::default().title(title.to_string()).borders(Borders::ALL))
            .scroll((scroll_offset, 0));

        frame.render_widget(help_paragraph, popup_area);
    }
}
