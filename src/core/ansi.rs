//! ANSI text rendering
//!
//! Parses SGR escape sequences embedded in decoded text and turns the text
//! into styled spans for the scrollback view. The renderer keeps its parse
//! state and the active style across calls: a sequence set in one chunk
//! applies to text delivered in a later chunk, and a sequence's characters
//! may themselves straddle a chunk boundary.
//!
//! Everything that is not text and not an SGR sequence (cursor movement,
//! erase, OSC strings, other C1 controls) is consumed and dropped silently;
//! this is a scrollback viewer, not a terminal emulator.

use bitflags::bitflags;

bitflags! {
    /// Text attribute flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AttrFlags: u16 {
        const BOLD          = 0b0000_0001;
        const DIM           = 0b0000_0010;
        const ITALIC        = 0b0000_0100;
        const UNDERLINE     = 0b0000_1000;
        const BLINK         = 0b0001_0000;
        const INVERSE       = 0b0010_0000;
        const HIDDEN        = 0b0100_0000;
        const STRIKETHROUGH = 0b1000_0000;
    }
}

/// Color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    /// Palette color (0-255; 0-7 standard, 8-15 bright)
    Indexed(u8),
    /// 24-bit color
    Rgb(u8, u8, u8),
}

/// Active text style derived from SGR state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub flags: AttrFlags,
}

impl Style {
    pub fn reset(&mut self) {
        *self = Style::default();
    }

    pub fn is_plain(&self) -> bool {
        *self == Style::default()
    }
}

/// A run of text sharing one style
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub style: Style,
}

/// Styled output of one render pass, appended as-is to the scrollback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledFragment {
    pub spans: Vec<StyledSpan>,
}

impl StyledFragment {
    /// Single-span fragment, mostly for notices produced by the controller.
    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self {
            spans: vec![StyledSpan {
                text: text.into(),
                style,
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.is_empty())
    }

    /// Concatenated text without styling.
    #[allow(dead_code)]
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

#[derive(Clone, Copy, Default, PartialEq)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    Csi,
    OscString,
    /// ESC received within OSC, waiting for the ST backslash
    EscapeInOsc,
}

/// Stream renderer turning ANSI-escaped text into styled spans.
///
/// Parse state and the active style survive across calls; reset only at
/// session start (construction).
pub struct AnsiTextRenderer {
    state: ParserState,
    style: Style,
    params: Vec<u16>,
    current_param: Option<u16>,
    intermediates: Vec<char>,
}

impl Default for AnsiTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnsiTextRenderer {
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            style: Style::default(),
            params: Vec::with_capacity(16),
            current_param: None,
            intermediates: Vec::with_capacity(4),
        }
    }

    /// Current active style (applies to the next literal text).
    #[allow(dead_code)]
    pub fn current_style(&self) -> Style {
        self.style
    }

    /// Render a chunk of decoded text into styled spans.
    ///
    /// Literal characters pass through; spaces, tabs and newlines keep their
    /// visual significance. Carriage returns are dropped: the scrollback is
    /// append-only, so overwriting a line has no meaning here.
    pub fn render(&mut self, text: &str) -> StyledFragment {
        let mut fragment = StyledFragment::default();
        let mut run = String::new();
        let mut run_style = self.style;

        for ch in text.chars() {
            match self.state {
                ParserState::Ground => match ch {
                    '\x1b' => self.enter_escape(),
                    '\n' | '\t' => run.push(ch),
                    c if (c as u32) < 0x20 || c == '\x7f' => {
                        // BEL, CR, backspace and friends: no visual content
                    }
                    c => run.push(c),
                },
                ParserState::Escape => self.escape(ch),
                ParserState::Csi => {
                    if let Some(style_changed) = self.csi(ch) {
                        if style_changed && !run.is_empty() {
                            // Style boundary: close the current run
                            fragment.spans.push(StyledSpan {
                                text: std::mem::take(&mut run),
                                style: run_style,
                            });
                        }
                        run_style = self.style;
                    }
                }
                ParserState::OscString => self.osc(ch),
                ParserState::EscapeInOsc => self.escape_in_osc(ch),
            }
        }

        if !run.is_empty() {
            fragment.spans.push(StyledSpan {
                text: run,
                style: run_style,
            });
        }

        fragment
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.params.clear();
        self.intermediates.clear();
        self.current_param = None;
    }

    fn escape(&mut self, ch: char) {
        match ch {
            '[' => self.state = ParserState::Csi,
            ']' => self.state = ParserState::OscString,
            // A second ESC restarts the sequence
            '\x1b' => {}
            // Other single-char escapes (DECSC, IND, RI, ...) carry no
            // style information; drop them
            _ => self.state = ParserState::Ground,
        }
    }

    /// Feed one character of a CSI sequence.
    ///
    /// Returns `None` while the sequence is still open, `Some(changed)` once
    /// a final byte completed it, where `changed` says whether the active
    /// style was updated.
    fn csi(&mut self, ch: char) -> Option<bool> {
        match ch {
            '\x1b' => {
                // Malformed sequence aborted by a fresh escape
                self.enter_escape();
                None
            }
            '0'..='9' => {
                let digit = ch as u16 - '0' as u16;
                self.current_param = Some(
                    self.current_param
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
                None
            }
            ';' | ':' => {
                self.params.push(self.current_param.take().unwrap_or(0));
                None
            }
            '?' | '>' | '=' | ' '..='/' => {
                self.intermediates.push(ch);
                None
            }
            '@'..='~' => {
                if let Some(p) = self.current_param.take() {
                    self.params.push(p);
                }
                self.state = ParserState::Ground;

                if ch == 'm' && self.intermediates.is_empty() {
                    self.execute_sgr();
                    Some(true)
                } else {
                    tracing::trace!(
                        "dropping CSI: params={:?}, intermediates={:?}, final={:?}",
                        self.params,
                        self.intermediates,
                        ch
                    );
                    Some(false)
                }
            }
            _ => {
                self.state = ParserState::Ground;
                Some(false)
            }
        }
    }

    fn osc(&mut self, ch: char) {
        match ch {
            // BEL or ST terminates the OSC string; content is dropped
            '\x07' | '\u{9c}' => self.state = ParserState::Ground,
            '\x1b' => self.state = ParserState::EscapeInOsc,
            _ => {}
        }
    }

    fn escape_in_osc(&mut self, ch: char) {
        if ch == '\\' {
            self.state = ParserState::Ground;
        } else {
            // Not ST; treat as a fresh escape sequence
            self.enter_escape();
            self.escape(ch);
        }
    }

    fn execute_sgr(&mut self) {
        if self.params.is_empty() {
            self.style.reset();
            return;
        }

        let mut iter = self.params.iter();

        while let Some(&param) = iter.next() {
            match param {
                0 => self.style.reset(),
                1 => self.style.flags |= AttrFlags::BOLD,
                2 => self.style.flags |= AttrFlags::DIM,
                3 => self.style.flags |= AttrFlags::ITALIC,
                4 => self.style.flags |= AttrFlags::UNDERLINE,
                5 => self.style.flags |= AttrFlags::BLINK,
                7 => self.style.flags |= AttrFlags::INVERSE,
                8 => self.style.flags |= AttrFlags::HIDDEN,
                9 => self.style.flags |= AttrFlags::STRIKETHROUGH,

                22 => self.style.flags &= !(AttrFlags::BOLD | AttrFlags::DIM),
                23 => self.style.flags &= !AttrFlags::ITALIC,
                24 => self.style.flags &= !AttrFlags::UNDERLINE,
                25 => self.style.flags &= !AttrFlags::BLINK,
                27 => self.style.flags &= !AttrFlags::INVERSE,
                28 => self.style.flags &= !AttrFlags::HIDDEN,
                29 => self.style.flags &= !AttrFlags::STRIKETHROUGH,

                30..=37 => self.style.fg = Color::Indexed((param - 30) as u8),
                38 => {
                    if let Some(color) = Self::extended_color(&mut iter) {
                        self.style.fg = color;
                    }
                }
                39 => self.style.fg = Color::Default,

                40..=47 => self.style.bg = Color::Indexed((param - 40) as u8),
                48 => {
                    if let Some(color) = Self::extended_color(&mut iter) {
                        self.style.bg = color;
                    }
                }
                49 => self.style.bg = Color::Default,

                90..=97 => self.style.fg = Color::Indexed((param - 90 + 8) as u8),
                100..=107 => self.style.bg = Color::Indexed((param - 100 + 8) as u8),

                _ => {}
            }
        }
    }

    /// Parse the tail of a 38/48 extended color: `5;n` or `2;r;g;b`.
    fn extended_color<'a>(iter: &mut std::slice::Iter<'a, u16>) -> Option<Color> {
        match iter.next() {
            Some(&5) => iter.next().map(|&n| Color::Indexed(n as u8)),
            Some(&2) => {
                let r = iter.next().copied().unwrap_or(0) as u8;
                let g = iter.next().copied().unwrap_or(0) as u8;
                let b = iter.next().copied().unwrap_or(0) as u8;
                Some(Color::Rgb(r, g, b))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_all(renderer: &mut AnsiTextRenderer, chunks: &[&str]) -> Vec<StyledSpan> {
        let mut spans = Vec::new();
        for chunk in chunks {
            spans.extend(renderer.render(chunk).spans);
        }
        spans
    }

    #[test]
    fn test_plain_text_passthrough() {
        let mut r = AnsiTextRenderer::new();
        let frag = r.render("hello world\n");
        assert_eq!(frag.spans.len(), 1);
        assert_eq!(frag.spans[0].text, "hello world\n");
        assert!(frag.spans[0].style.is_plain());
    }

    #[test]
    fn test_sgr_colors_split_into_spans() {
        let mut r = AnsiTextRenderer::new();
        let frag = r.render("ok \x1b[31merror\x1b[0m done");
        assert_eq!(frag.spans.len(), 3);
        assert_eq!(frag.spans[0].text, "ok ");
        assert_eq!(frag.spans[1].text, "error");
        assert_eq!(frag.spans[1].style.fg, Color::Indexed(1));
        assert_eq!(frag.spans[2].text, " done");
        assert!(frag.spans[2].style.is_plain());
    }

    #[test]
    fn test_style_carries_across_calls() {
        // ESC[31m in one chunk, the literal text in the next
        let mut r = AnsiTextRenderer::new();
        let spans = render_all(&mut r, &["\x1b[31m", "error"]);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "error");
        assert_eq!(spans[0].style.fg, Color::Indexed(1));
    }

    #[test]
    fn test_escape_sequence_split_across_calls() {
        let mut r = AnsiTextRenderer::new();
        let spans = render_all(&mut r, &["\x1b[3", "1;1mhot"]);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "hot");
        assert_eq!(spans[0].style.fg, Color::Indexed(1));
        assert!(spans[0].style.flags.contains(AttrFlags::BOLD));
    }

    #[test]
    fn test_unknown_csi_dropped_silently() {
        let mut r = AnsiTextRenderer::new();
        // Cursor movement and erase sequences carry no scrollback content
        let frag = r.render("a\x1b[2Jb\x1b[10;20Hc");
        assert_eq!(frag.plain_text(), "abc");
    }

    #[test]
    fn test_osc_title_sequence_dropped() {
        let mut r = AnsiTextRenderer::new();
        let frag = r.render("pre\x1b]0;some title\x07post");
        assert_eq!(frag.plain_text(), "prepost");

        // ST-terminated form as well
        let frag = r.render("a\x1b]2;t\x1b\\b");
        assert_eq!(frag.plain_text(), "ab");
    }

    #[test]
    fn test_whitespace_preserved() {
        let mut r = AnsiTextRenderer::new();
        let frag = r.render("  two  spaces\n\tand a tab");
        assert_eq!(frag.plain_text(), "  two  spaces\n\tand a tab");
    }

    #[test]
    fn test_carriage_return_dropped() {
        let mut r = AnsiTextRenderer::new();
        let frag = r.render("line\r\n");
        assert_eq!(frag.plain_text(), "line\n");
    }

    #[test]
    fn test_stripped_content_invariant_under_chunking() {
        // Rendering must equal the ANSI-stripped concatenation no matter
        // where the chunk boundaries fall
        let input = "x\x1b[1;32mgreen bold\x1b[0m rest\x1b[2K\n";
        let expected = "xgreen bold rest\n";

        for split in 0..=input.len() {
            if !input.is_char_boundary(split) {
                continue;
            }
            let mut r = AnsiTextRenderer::new();
            let spans = render_all(&mut r, &[&input[..split], &input[split..]]);
            let text: String = spans.iter().map(|s| s.text.as_str()).collect();
            assert_eq!(text, expected, "split at {}", split);
        }
    }

    #[test]
    fn test_256_and_rgb_colors() {
        let mut r = AnsiTextRenderer::new();
        let frag = r.render("\x1b[38;5;196mred\x1b[48;2;10;20;30mdeep");
        assert_eq!(frag.spans[0].style.fg, Color::Indexed(196));
        assert_eq!(frag.spans[1].style.bg, Color::Rgb(10, 20, 30));
    }

    #[test]
    fn test_sgr_reset_clears_everything() {
        let mut r = AnsiTextRenderer::new();
        r.render("\x1b[1;4;33;44m");
        assert!(!r.current_style().is_plain());
        r.render("\x1b[m");
        assert!(r.current_style().is_plain());
    }
}
