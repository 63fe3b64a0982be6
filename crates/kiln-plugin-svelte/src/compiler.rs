//! Capability interfaces for the collaborators the plugin drives.
//!
//! The plugin never parses or compiles Svelte itself. Callers hand it values
//! implementing these traits, usually thin bindings over the real Svelte
//! compiler and preprocessors:
//!
//! ```text
//! source → Preprocessor (optional) → ComponentCompiler → CompileOutput
//!                                  ↘ ModuleCompiler (for .svelte.js/.svelte.ts)
//! ```
//!
//! Compile failures are ordinary `Result` errors carrying a
//! [`CompilerDiagnostic`]; they are turned into bundler messages by the
//! bridge. Preprocessor and nested build failures are `anyhow` errors and are
//! propagated as-is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// How the compiler should emit component styles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CssMode {
    /// Styles come back as a separate stylesheet served through a virtual module
    #[default]
    External,
    /// Styles are inserted at runtime by the compiled script
    Injected,
}

/// Which runtime the compiled script targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generate {
    #[default]
    Client,
    Server,
}

/// Options handed to the compiler for a single file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileOptions {
    /// Build-root relative filename of the component
    pub filename: String,
    pub css: CssMode,
    pub generate: Generate,
    /// Source map produced by preprocessing, if any
    pub source_map: Option<String>,
    /// Compiler configuration forwarded untouched
    pub compiler_options: serde_json::Map<String, serde_json::Value>,
}

/// A line/column position reported by the compiler.
///
/// `line` is 1-based, `column` is 0-based, `character` is the 0-based
/// offset into the source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, column: u32, character: u32) -> Self {
        Self {
            line,
            column,
            character,
        }
    }
}

/// A warning or error emitted by the compiler
#[derive(Debug, Clone, Default, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} ({code})")]
pub struct CompilerDiagnostic {
    /// Stable compiler code, e.g. `element_unclosed`
    pub code: String,
    pub message: String,
    /// File the diagnostic belongs to when the compiler knows it
    pub filename: Option<String>,
    pub start: Option<Position>,
    pub end: Option<Position>,
    /// Multi-line code frame with `N: ` line labels
    pub frame: Option<String>,
}

impl CompilerDiagnostic {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_span(mut self, start: Position, end: Position) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_start(mut self, start: Position) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frame = Some(frame.into());
        self
    }
}

/// Compiled code and its JSON source map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledCode {
    pub code: String,
    pub map: String,
}

impl CompiledCode {
    pub fn new(code: impl Into<String>, map: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: map.into(),
        }
    }
}

/// Successful component compilation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
    pub js: CompiledCode,
    /// Present only in [`CssMode::External`] and when the component has styles
    pub css: Option<CompiledCode>,
    pub warnings: Vec<CompilerDiagnostic>,
}

/// Successful module compilation (`.svelte.js` / `.svelte.ts`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleOutput {
    pub js: CompiledCode,
    pub warnings: Vec<CompilerDiagnostic>,
}

/// Result of running the preprocessing step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preprocessed {
    pub code: String,
    pub map: Option<String>,
    /// Extra files the preprocessors read, watched for invalidation
    pub dependencies: Vec<PathBuf>,
}

impl Preprocessed {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }
}

/// Compiles `.svelte` components
pub trait ComponentCompiler: Send + Sync {
    fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompileOutput, CompilerDiagnostic>;
}

/// Compiles shared logic modules that use component runtime features
pub trait ModuleCompiler: Send + Sync {
    fn compile_module(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<ModuleOutput, CompilerDiagnostic>;
}

/// Rewrites component source before compilation
#[async_trait]
pub trait Preprocessor: Send + Sync {
    async fn preprocess(&self, source: &str, filename: &str) -> anyhow::Result<Preprocessed>;
}

/// Bundles a server entry module and renders it to HTML
#[async_trait]
pub trait NestedBuild: Send + Sync {
    async fn build(&self, entry: &Path) -> anyhow::Result<String>;
}

impl<F> ComponentCompiler for F
where
    F: Fn(&str, &CompileOptions) -> Result<CompileOutput, CompilerDiagnostic> + Send + Sync,
{
    fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompileOutput, CompilerDiagnostic> {
        self(source, options)
    }
}
