//! Console styling and terminal size detection.

use owo_colors::{OwoColorize, Style};

/// Terminals narrower than this get compact listings.
const NARROW: u16 = 60;

/// Horizontal rules never exceed this width.
const MAX_RULE: usize = 80;

fn width() -> Option<u16> {
    terminal_size::terminal_size().map(|(terminal_size::Width(w), _)| w)
}

/// Whether the terminal is too narrow for two-column output.
pub fn is_narrow() -> bool {
    width().is_some_and(|w| w < NARROW)
}

/// A line of `c`, as wide as the terminal up to 80 columns.
pub fn rule(c: char) -> String {
    let columns = width().map_or(MAX_RULE, |w| usize::from(w).min(MAX_RULE));
    std::iter::repeat_n(c, columns).collect()
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Success,
    Warning,
    Error,
    Info,
    Dim,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Success => Style::new().green(),
            Self::Warning => Style::new().yellow(),
            Self::Error => Style::new().red().bold(),
            Self::Info => Style::new().cyan(),
            Self::Dim => Style::new().dimmed(),
        }
    }
}

fn paint(text: &str, tone: Tone) -> String {
    if supports_color::on_cached(supports_color::Stream::Stdout).is_some() {
        text.style(tone.style()).to_string()
    } else {
        text.to_string()
    }
}

/// Semantic colouring for console output. Plain text when colour is off.
pub trait Colorize: AsRef<str> {
    /// Completed actions.
    fn success(&self) -> String {
        paint(self.as_ref(), Tone::Success)
    }

    /// Problems that do not stop the command.
    fn warning(&self) -> String {
        paint(self.as_ref(), Tone::Warning)
    }

    /// Problems that fail the command.
    fn error(&self) -> String {
        paint(self.as_ref(), Tone::Error)
    }

    /// IDs and headings.
    fn info(&self) -> String {
        paint(self.as_ref(), Tone::Info)
    }

    /// Secondary detail.
    fn dim(&self) -> String {
        paint(self.as_ref(), Tone::Dim)
    }
}

impl Colorize for str {}

impl Colorize for String {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_is_capped_at_eighty_columns() {
        let line = rule('=');
        assert!(line.chars().count() <= MAX_RULE);
        assert!(line.chars().all(|c| c == '='));
    }

    #[test]
    fn colouring_keeps_the_text() {
        assert!("Created".success().contains("Created"));
        assert!(String::from("app-comp-001-a").info().contains("app-comp-001-a"));
    }
}
