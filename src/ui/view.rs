//! Terminal scrollback view
//!
//! The presentation shim: applies [`DisplayEffect`]s from the controller to
//! the hosting terminal with crossterm. Fragments are appended, never
//! rewritten; under raw mode a bare `\n` only moves down, so line feeds are
//! expanded to `\r\n` to keep their visual significance.

use std::io::{self, Stdout, Write};

use crossterm::execute;
use crossterm::style::{
    Attribute, Color as CtColor, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::terminal;
use tracing::debug;

use crate::core::ansi::{AttrFlags, Color, Style, StyledFragment};
use crate::core::controller::{DisplayEffect, Visibility};

/// Sink for controller effects.
///
/// The production implementation is [`TerminalView`]; tests capture effects
/// directly instead.
pub trait ConsoleSurface {
    fn append_fragment(&mut self, fragment: &StyledFragment) -> io::Result<()>;
    fn append_notice(&mut self, text: &str) -> io::Result<()>;
    fn set_title(&mut self, title: &str) -> io::Result<()>;
    fn set_visibility(&mut self, visibility: Visibility) -> io::Result<()>;

    fn apply(&mut self, effects: &[DisplayEffect]) -> io::Result<()> {
        for effect in effects {
            match effect {
                DisplayEffect::Fragment(fragment) => self.append_fragment(fragment)?,
                DisplayEffect::Notice(text) => self.append_notice(text)?,
                DisplayEffect::Title(title) => self.set_title(title)?,
                DisplayEffect::Visibility(v) => self.set_visibility(*v)?,
            }
        }
        Ok(())
    }
}

/// Scrollback view on the hosting terminal.
pub struct TerminalView {
    stdout: Stdout,
    raw_mode: bool,
}

impl TerminalView {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
            raw_mode: false,
        }
    }

    /// Enter raw mode so single key presses arrive without Enter.
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        self.raw_mode = true;
        Ok(())
    }

    /// Restore the terminal. Safe to call more than once; failures are
    /// swallowed after one attempt so shutdown always completes.
    pub fn cleanup(&mut self) {
        if self.raw_mode {
            let _ = execute!(self.stdout, ResetColor, SetAttribute(Attribute::Reset));
            let _ = terminal::disable_raw_mode();
            self.raw_mode = false;
            let _ = self.stdout.write_all(b"\r\n");
        }
        let _ = self.stdout.flush();
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        // Raw mode disables output post-processing; expand line feeds
        if self.raw_mode {
            let mut parts = text.split('\n');
            if let Some(first) = parts.next() {
                self.stdout.write_all(first.as_bytes())?;
            }
            for part in parts {
                self.stdout.write_all(b"\r\n")?;
                self.stdout.write_all(part.as_bytes())?;
            }
            Ok(())
        } else {
            self.stdout.write_all(text.as_bytes())
        }
    }

    fn apply_style(&mut self, style: &Style) -> io::Result<()> {
        execute!(self.stdout, ResetColor, SetAttribute(Attribute::Reset))?;

        match style.fg {
            Color::Default => {}
            Color::Indexed(n) => execute!(self.stdout, SetForegroundColor(CtColor::AnsiValue(n)))?,
            Color::Rgb(r, g, b) => {
                execute!(self.stdout, SetForegroundColor(CtColor::Rgb { r, g, b }))?
            }
        }
        match style.bg {
            Color::Default => {}
            Color::Indexed(n) => execute!(self.stdout, SetBackgroundColor(CtColor::AnsiValue(n)))?,
            Color::Rgb(r, g, b) => {
                execute!(self.stdout, SetBackgroundColor(CtColor::Rgb { r, g, b }))?
            }
        }

        let flag_attrs = [
            (AttrFlags::BOLD, Attribute::Bold),
            (AttrFlags::DIM, Attribute::Dim),
            (AttrFlags::ITALIC, Attribute::Italic),
            (AttrFlags::UNDERLINE, Attribute::Underlined),
            (AttrFlags::BLINK, Attribute::SlowBlink),
            (AttrFlags::INVERSE, Attribute::Reverse),
            (AttrFlags::HIDDEN, Attribute::Hidden),
            (AttrFlags::STRIKETHROUGH, Attribute::CrossedOut),
        ];
        for (flag, attr) in flag_attrs {
            if style.flags.contains(flag) {
                execute!(self.stdout, SetAttribute(attr))?;
            }
        }

        Ok(())
    }
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TerminalView {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl ConsoleSurface for TerminalView {
    fn append_fragment(&mut self, fragment: &StyledFragment) -> io::Result<()> {
        for span in &fragment.spans {
            if span.style.is_plain() {
                self.write_text(&span.text)?;
            } else {
                self.apply_style(&span.style)?;
                self.write_text(&span.text)?;
                execute!(self.stdout, ResetColor, SetAttribute(Attribute::Reset))?;
            }
        }
        self.stdout.flush()
    }

    fn append_notice(&mut self, text: &str) -> io::Result<()> {
        self.write_text(text)?;
        self.stdout.flush()
    }

    fn set_title(&mut self, title: &str) -> io::Result<()> {
        // OSC 0 sets the host terminal's window title
        write!(self.stdout, "\x1b]0;{}\x07", title)?;
        self.stdout.flush()
    }

    fn set_visibility(&mut self, visibility: Visibility) -> io::Result<()> {
        // A terminal pane has no real minimize; hide means minimize, never
        // destroy, and here both collapse to a log line
        debug!("visibility change requested: {:?}", visibility);
        Ok(())
    }
}
