//! Error types for the Svelte plugin
//!
//! Compile problems are reported as [`Message`]s, not as errors. The variants
//! here cover failures that cannot be given a reliable source location and
//! therefore propagate unchanged, plus the wrapper used to hand fatal messages
//! to the bundler.

use crate::diagnostics::Message;
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn format_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|message| message.to_string())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Errors that can occur while loading Svelte modules
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A preprocessor failed
    #[error("Failed to preprocess {filename}: {source}")]
    #[diagnostic(
        code(kiln::svelte::preprocess_failed),
        help("The error comes from a configured preprocessor; its location cannot be recovered")
    )]
    Preprocess {
        filename: String,
        #[source]
        source: BoxError,
    },

    /// The nested server build of the HTML output failed
    #[error("Nested build for {path} failed: {source}")]
    #[diagnostic(code(kiln::svelte::nested_build_failed))]
    NestedBuild {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// HTML output was requested without a nested build
    #[error("Cannot render {path} to HTML: no nested build configured")]
    #[diagnostic(
        code(kiln::svelte::nested_build_unavailable),
        help("Configure one with SvelteBridge::with_nested_build")
    )]
    NestedBuildUnavailable { path: PathBuf },

    /// The temporary server entry could not be written
    #[error("Failed to write temporary entry next to {path}: {source}")]
    #[diagnostic(code(kiln::svelte::temp_file))]
    TempFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One or more fatal messages were produced for a load
    #[error("{}", format_messages(.messages))]
    #[diagnostic(code(kiln::svelte::build_failed))]
    Diagnostics { messages: Vec<Message> },

    /// Plugin options could not be loaded
    #[error("Invalid Svelte plugin configuration: {0}")]
    #[diagnostic(
        code(kiln::svelte::config),
        help("Check kiln-svelte.toml and KILN_SVELTE_* environment variables")
    )]
    Config(#[from] Box<figment::Error>),
}

impl Error {
    pub fn preprocess(filename: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Preprocess {
            filename: filename.into(),
            source: source.into(),
        }
    }

    pub fn nested_build(path: PathBuf, source: anyhow::Error) -> Self {
        Self::NestedBuild {
            path,
            source: source.into(),
        }
    }

    pub fn temp_file(path: PathBuf, source: std::io::Error) -> Self {
        Self::TempFile { path, source }
    }

    pub fn diagnostics(messages: Vec<Message>) -> Self {
        Self::Diagnostics { messages }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
