use std::fmt::Write;

use clap::builder::styling::{AnsiColor, Effects, Style, Styles};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

#[cfg(not(test))]
/// Whether stdout is an interactive terminal that understands ANSI escapes.
static IS_ANSI_TERMINAL: std::sync::LazyLock<bool> = std::sync::LazyLock::new(|| {
    std::io::IsTerminal::is_terminal(&std::io::stdout())
        && std::env::var("TERM").is_ok_and(|term| term != "dumb")
        && std::env::var_os("NO_COLOR").is_none()
});

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the styles used by the `crishim` help output.
pub fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Green.on_default() | Effects::BOLD)
        .invalid(AnsiColor::Red.on_default() | Effects::BOLD)
}

fn apply_style(text: String, style: &Style) -> String {
    #[cfg(not(test))]
    if !*IS_ANSI_TERMINAL {
        return text;
    }

    let mut styled = String::with_capacity(text.len() + 20);
    let _ = write!(styled, "{}", style);
    styled.push_str(&text);
    let _ = write!(styled, "{}", style.render_reset());
    styled
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Applies the styles of [`styles`] to text printed by the binary.
pub trait AnsiStyles {
    /// Apply header style to text
    fn header(&self) -> String;

    /// Apply literal style to text
    fn literal(&self) -> String;

    /// Apply placeholder style to text
    fn placeholder(&self) -> String;

    /// Apply error style to text
    fn error(&self) -> String;

    /// Apply valid style to text
    fn valid(&self) -> String;

    /// Apply invalid style to text
    fn invalid(&self) -> String;
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl AnsiStyles for str {
    fn header(&self) -> String {
        apply_style(self.to_string(), styles().get_header())
    }

    fn literal(&self) -> String {
        apply_style(self.to_string(), styles().get_literal())
    }

    fn placeholder(&self) -> String {
        apply_style(self.to_string(), styles().get_placeholder())
    }

    fn error(&self) -> String {
        apply_style(self.to_string(), styles().get_error())
    }

    fn valid(&self) -> String {
        apply_style(self.to_string(), styles().get_valid())
    }

    fn invalid(&self) -> String {
        apply_style(self.to_string(), styles().get_invalid())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ansi_styles_wrap_text() {
        let header = "sandbox".header();
        assert!(header.contains("\x1b[1m"));
        assert!(header.contains("\x1b[33m"));
        assert!(header.contains("sandbox"));
        assert!(header.ends_with("\x1b[0m"));

        let invalid = String::from("corrupt").invalid();
        assert!(invalid.contains("\x1b[31m"));
        assert!(invalid.contains("corrupt"));

        let placeholder = "default".placeholder();
        assert!(placeholder.contains("\x1b[32m"));
        assert!(!placeholder.contains("\x1b[1m"));
    }
}
