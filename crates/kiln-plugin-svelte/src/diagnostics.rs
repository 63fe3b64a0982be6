//! Bundler-facing diagnostics.
//!
//! Compiler warnings and errors, read failures and cache misses all end up as
//! a [`Message`]: a kind tag, an optional detail tag (the compiler's own code),
//! human text and an optional [`Location`] used for code frames.

use crate::compiler::CompilerDiagnostic;
use crate::sourcemap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Matches one line of a compiler code frame, e.g. `  12: <div>`
static FRAME_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+): ?(.*)$").expect("frame line pattern is valid"));

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// What went wrong, as a stable tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    /// The component file could not be read
    ReadFileError,
    /// The compiler rejected the source
    CompilationError,
    /// The compiler accepted the source with a warning
    CompilationWarning,
    /// A stylesheet was requested for a file that never produced one
    UnknownCss,
    /// A module variant was loaded without a module compiler
    MissingModuleCompiler,
}

impl MessageKind {
    pub fn id(self) -> &'static str {
        match self {
            MessageKind::ReadFileError => "read-file-error",
            MessageKind::CompilationError => "compilation-error",
            MessageKind::CompilationWarning => "compilation-warning",
            MessageKind::UnknownCss => "unknown-css",
            MessageKind::MissingModuleCompiler => "missing-module-compiler",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            MessageKind::CompilationWarning => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Source location attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    /// 1-based
    pub line: u32,
    /// 0-based
    pub column: u32,
    /// Length of the highlighted range in characters, at least 1
    pub length: u32,
    /// The source line, without any frame label
    pub line_text: String,
}

/// A single error or warning reported for one load call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    /// Compiler code or I/O error detail
    pub detail: Option<String>,
    pub text: String,
    pub location: Option<Location>,
}

impl Message {
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            detail: None,
            text: text.into(),
            location: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }

    /// Shapes a compiler diagnostic into a message of the given kind.
    pub fn from_compiler(
        kind: MessageKind,
        diagnostic: &CompilerDiagnostic,
        filename: &str,
        preprocess_map: Option<&str>,
    ) -> Self {
        Self {
            kind,
            detail: Some(diagnostic.code.clone()),
            text: diagnostic.message.clone(),
            location: resolve_location(diagnostic, filename, preprocess_map),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(
                f,
                "{}:{}:{}: ",
                location.file, location.line, location.column
            )?;
        }
        write!(f, "{} [{}]: {}", self.severity(), self.kind, self.text)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        if let Some(location) = &self.location {
            let gutter = location.line.to_string();
            let pad = " ".repeat(gutter.len());
            write!(f, "\n {gutter} | {}", location.line_text)?;
            write!(
                f,
                "\n {pad} | {}{}",
                " ".repeat(location.column as usize),
                "^".repeat(location.length as usize)
            )?;
        }
        Ok(())
    }
}

/// Resolves where a compiler diagnostic points.
///
/// With a preprocessing map the start position is traced back to the
/// pre-preprocessing source; when tracing finds a source the traced line and
/// column replace the reported ones. The snippet is looked up in the
/// diagnostic's frame by its line label.
///
/// The start position alone decides whether there is a location: a
/// diagnostic without one resolves to `None` even when it names a file, since
/// a bare filename gives no line to frame. A diagnostic with a start position
/// but no filename is attributed to `fallback_filename`.
pub fn resolve_location(
    diagnostic: &CompilerDiagnostic,
    fallback_filename: &str,
    preprocess_map: Option<&str>,
) -> Option<Location> {
    let start = diagnostic.start?;
    let file = diagnostic
        .filename
        .clone()
        .unwrap_or_else(|| fallback_filename.to_string());

    let (line, column) = preprocess_map
        .and_then(|map| sourcemap::trace_original(map, start.line, start.column))
        .map(|traced| (traced.line, traced.column))
        .unwrap_or((start.line, start.column));

    let line_text = diagnostic
        .frame
        .as_deref()
        .and_then(|frame| frame_line(frame, line))
        .unwrap_or_default();

    Some(Location {
        file,
        line,
        column,
        length: span_length(diagnostic),
        line_text,
    })
}

fn span_length(diagnostic: &CompilerDiagnostic) -> u32 {
    match (diagnostic.start, diagnostic.end) {
        (Some(start), Some(end)) if end.character > start.character => {
            end.character - start.character
        }
        _ => 1,
    }
}

/// Finds the frame line labelled `line` and strips its label
fn frame_line(frame: &str, line: u32) -> Option<String> {
    frame.lines().find_map(|candidate| {
        let captures = FRAME_LINE.captures(candidate)?;
        let label: u32 = captures[1].parse().ok()?;
        (label == line).then(|| captures[2].to_string())
    })
}
