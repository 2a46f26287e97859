use std::fmt::Display;

use console::{Style, StyledObject};

/// Terminal styles by meaning rather than by colour.
fn paint(style: Style, text: impl Display) -> StyledObject<String> {
    style.apply_to(text.to_string())
}

pub fn success(text: impl Display) -> StyledObject<String> {
    paint(Style::new().bright().green(), text)
}

/// In-progress phases and counts worth a look.
pub fn pending(text: impl Display) -> StyledObject<String> {
    paint(Style::new().bright().yellow(), text)
}

pub fn failure(text: impl Display) -> StyledObject<String> {
    paint(Style::new().bright().red(), text)
}

pub fn muted(text: impl Display) -> StyledObject<String> {
    paint(Style::new().dim(), text)
}

pub fn emphasis(text: impl Display) -> StyledObject<String> {
    paint(Style::new().bright(), text)
}

pub fn accent(text: impl Display) -> StyledObject<String> {
    paint(Style::new().cyan(), text)
}

pub fn title(text: impl Display) -> StyledObject<String> {
    paint(Style::new().magenta().bold(), text)
}
