//! Terminal output helpers

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const YELLOW: &'static str = "\x1b[33m";
    pub const CYAN: &'static str = "\x1b[36m";
}

/// Wrap text in a color when colors are enabled
pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// Ten-cell bar such as `[#####.....]`
pub fn progress_bar(percent: u8) -> String {
    let filled = (percent.min(100) as usize + 5) / 10;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(10 - filled))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
