//! Terminal rendering of the error log.
//!
//! Token errors print the offending line with its neighbours and a caret
//! line under the token:
//!
//! ```text
//! error: unclosed string literal
//! file: src/main.tek:3:10
//! main: proc() {
//!     s := "oops
//!          ^^^^^
//! }
//! ```
//!
//! Path errors print the message only. Tabs are expanded to four columns
//! so carets line up with the echoed source.

use std::borrow::Cow;
use std::io::{self, Write};

use tek_ir::{FileId, StrId, TokenLoc};

use crate::{Error, ErrorArg, Layout};

/// ANSI color codes for terminal output.
mod colors {
    pub const ERROR: &str = "\x1b[1;91m"; // Bold bright red
    pub const MESSAGE: &str = "\x1b[93m"; // Bright yellow
    pub const FILE: &str = "\x1b[95m"; // Bright magenta
    pub const INFO: &str = "\x1b[97m"; // Bright white
    pub const ARROWS: &str = "\x1b[93m"; // Bright yellow
    pub const RESET: &str = "\x1b[0m";
}

const UNKNOWN: &str = "<unknown>";

/// Returns "s" for plural counts, "" for singular.
#[inline]
fn plural_s(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Color output mode for terminal emitter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Automatically detect based on terminal capabilities.
    #[default]
    Auto,
    /// Always use colors.
    Always,
    /// Never use colors.
    Never,
}

impl ColorMode {
    /// Resolve to a boolean; `is_tty` only matters for `Auto`.
    pub fn should_use_colors(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }

    /// Parses `auto`, `always` or `never`.
    pub fn parse(text: &str) -> Option<ColorMode> {
        match text {
            "auto" => Some(ColorMode::Auto),
            "always" => Some(ColorMode::Always),
            "never" => Some(ColorMode::Never),
            _ => None,
        }
    }
}

/// Read-only access to what rendering needs from a finished compilation.
pub trait SourceMap {
    fn file_path(&self, file: FileId) -> Option<String>;
    fn source(&self, file: FileId) -> Option<&[u8]>;
    fn token_loc(&self, file: FileId, token: u32) -> Option<TokenLoc>;
    fn string(&self, id: StrId) -> Option<String>;
}

/// Terminal emitter with optional color support.
pub struct TerminalEmitter<W: Write> {
    writer: W,
    colors: bool,
}

impl TerminalEmitter<io::Stderr> {
    /// Create a terminal emitter for stderr with explicit color mode.
    pub fn stderr(mode: ColorMode, is_tty: bool) -> Self {
        TerminalEmitter::with_color_mode(io::stderr(), mode, is_tty)
    }
}

impl<W: Write> TerminalEmitter<W> {
    /// `is_tty` decides colors for [`ColorMode::Auto`].
    pub fn with_color_mode(writer: W, mode: ColorMode, is_tty: bool) -> Self {
        TerminalEmitter {
            writer,
            colors: mode.should_use_colors(is_tty),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Renders every error in order and returns how many were written.
    pub fn emit_all<'a>(
        &mut self,
        errors: impl IntoIterator<Item = &'a Error>,
        sources: &dyn SourceMap,
    ) -> usize {
        let mut count = 0;
        for error in errors {
            self.emit(error, sources);
            count += 1;
        }
        count
    }

    pub fn emit(&mut self, error: &Error, sources: &dyn SourceMap) {
        self.write_colored("error", colors::ERROR);
        let _ = write!(self.writer, ": ");

        let [first, second] = error.args;
        let message = error.kind.message();
        match error.kind.layout() {
            Layout::Errno => {
                let text = fill(message, &[("reason", os_reason(first))]);
                self.write_message(&text);
            }
            Layout::PathReason => {
                let text = fill(
                    message,
                    &[
                        ("path", arg_text(first, sources)),
                        ("reason", os_reason(second)),
                    ],
                );
                self.write_message(&text);
            }
            Layout::PathPair => {
                let text = fill(
                    message,
                    &[
                        ("path", arg_text(first, sources)),
                        ("other", arg_text(second, sources)),
                    ],
                );
                self.write_message(&text);
            }
            Layout::FileOffset => {
                let text = fill(
                    message,
                    &[
                        ("path", arg_text(first, sources)),
                        ("offset", arg_text(second, sources)),
                    ],
                );
                self.write_message(&text);
            }
            Layout::Token => {
                self.write_message(message);
                self.write_location(first, sources);
            }
            Layout::TokenPair {
                first: first_info,
                second: second_info,
            } => {
                self.write_message(message);
                self.write_info(first_info);
                self.write_location(first, sources);
                self.write_info(second_info);
                self.write_location(second, sources);
            }
        }
        let _ = writeln!(self.writer);
    }

    pub fn emit_summary(&mut self, error_count: usize) {
        if error_count == 0 {
            return;
        }
        self.write_colored("error", colors::ERROR);
        let _ = writeln!(
            self.writer,
            ": aborting due to {error_count} previous error{}",
            plural_s(error_count)
        );
    }

    pub fn flush(&mut self) {
        let _ = self.writer.flush();
    }

    /// Write text with optional ANSI color codes.
    fn write_colored(&mut self, text: &str, color: &str) {
        if self.colors {
            let _ = write!(self.writer, "{color}{text}{}", colors::RESET);
        } else {
            let _ = write!(self.writer, "{text}");
        }
    }

    fn write_message(&mut self, text: &str) {
        self.write_colored(text, colors::MESSAGE);
        let _ = writeln!(self.writer);
    }

    fn write_info(&mut self, text: &str) {
        self.write_colored(text, colors::INFO);
        let _ = writeln!(self.writer);
    }

    fn write_location(&mut self, arg: ErrorArg, sources: &dyn SourceMap) {
        let ErrorArg::Token { file, token } = arg else {
            return;
        };
        let path = sources
            .file_path(file)
            .unwrap_or_else(|| UNKNOWN.to_string());
        let _ = write!(self.writer, "file: ");
        let Some(loc) = sources.token_loc(file, token) else {
            self.write_colored(&path, colors::FILE);
            let _ = writeln!(self.writer);
            return;
        };
        self.write_colored(&format!("{path}:{}:{}", loc.line, loc.column), colors::FILE);
        let _ = writeln!(self.writer);

        if let Some(source) = sources.source(file) {
            self.write_excerpt(source, loc);
        }
    }

    /// Previous line, token line, caret line, next line.
    fn write_excerpt(&mut self, source: &[u8], loc: TokenLoc) {
        let offset = (loc.offset as usize).min(source.len());
        let line_start = memchr::memrchr(b'\n', &source[..offset]).map_or(0, |i| i + 1);
        let line_end =
            memchr::memchr(b'\n', &source[offset..]).map_or(source.len(), |i| offset + i);

        if line_start > 0 {
            let prev_end = line_start - 1;
            let prev_start = memchr::memrchr(b'\n', &source[..prev_end]).map_or(0, |i| i + 1);
            self.write_code_line(&source[prev_start..prev_end]);
        }
        self.write_code_line(&source[line_start..line_end]);

        let span_end = (offset + loc.len as usize).clamp(offset, line_end);
        let pad = expand(&source[line_start..offset], ' ');
        let mut carets = expand(&source[offset..span_end], '^');
        if carets.is_empty() {
            carets.push('^');
        }
        let _ = write!(self.writer, "{pad}");
        self.write_colored(&carets, colors::ARROWS);
        let _ = writeln!(self.writer);

        let next_start = line_end + 1;
        if next_start < source.len() {
            let next_end = memchr::memchr(b'\n', &source[next_start..])
                .map_or(source.len(), |i| next_start + i);
            self.write_code_line(&source[next_start..next_end]);
        }
    }

    fn write_code_line(&mut self, line: &[u8]) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let text = String::from_utf8_lossy(line).replace('\t', "    ");
        let _ = writeln!(self.writer, "{text}");
    }
}

/// One `fill` character per source character, four per tab.
fn expand(bytes: &[u8], fill: char) -> String {
    let mut out = String::new();
    for c in String::from_utf8_lossy(bytes).chars() {
        let width = if c == '\t' { 4 } else { 1 };
        out.extend(std::iter::repeat(fill).take(width));
    }
    out
}

fn fill(template: &str, holes: &[(&str, Cow<'_, str>)]) -> String {
    let mut text = template.to_string();
    for (name, value) in holes {
        text = text.replace(&format!("{{{name}}}"), value);
    }
    text
}

fn arg_text(arg: ErrorArg, sources: &dyn SourceMap) -> Cow<'static, str> {
    let text = match arg {
        ErrorArg::Str(id) => sources.string(id),
        ErrorArg::File(file) | ErrorArg::Token { file, .. } => sources.file_path(file),
        ErrorArg::Errno(_) => return os_reason(arg),
        ErrorArg::Num(n) => Some(n.to_string()),
        ErrorArg::None => None,
    };
    text.map_or(Cow::Borrowed(UNKNOWN), Cow::Owned)
}

/// The OS description of an errno, without the "(os error N)" suffix.
fn os_reason(arg: ErrorArg) -> Cow<'static, str> {
    let ErrorArg::Errno(code) = arg else {
        return Cow::Borrowed(UNKNOWN);
    };
    let text = io::Error::from_raw_os_error(code).to_string();
    match text.rsplit_once(" (os error") {
        Some((reason, _)) => Cow::Owned(reason.to_string()),
        None => Cow::Owned(text),
    }
}
