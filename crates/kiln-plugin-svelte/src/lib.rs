//! Rolldown plugin for Svelte components
//!
//! This crate bridges a bundler and a Svelte compiler it does not own. The
//! compiler, preprocessors and the nested server build are injected as trait
//! objects; the crate reads files, forwards them, and reshapes what comes back
//! into the bundler's load results and diagnostics.
//!
//! ## Architecture
//!
//! ```text
//! .svelte file → load() → SvelteBridge → Preprocessor? → ComponentCompiler
//!                                      ↓
//!                 JS + import "<path>.kiln-svelte-fake-css"
//!                                      ↓
//!   resolve_id() claims the synthetic import → load() serves cached CSS
//! ```
//!
//! ## Stylesheets as virtual modules
//!
//! With external CSS the compiler returns a stylesheet alongside the script.
//! The bridge caches it under the component path and appends an import of a
//! synthetic path (component path + [`paths::STYLESHEET_SUFFIX`]). When the
//! bundler follows that import, the plugin strips the suffix and serves the
//! cached stylesheet. Each load of a component replaces its entry, so the
//! stylesheet always matches the most recent successful compile.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use kiln_plugin_svelte::{KilnSveltePlugin, SvelteBridge, SveltePluginOptions};
//! use kiln_plugin_svelte::compiler::{CompileOptions, CompileOutput, CompilerDiagnostic};
//! use std::sync::Arc;
//!
//! # fn compile(_: &str, _: &CompileOptions) -> Result<CompileOutput, CompilerDiagnostic> { todo!() }
//! # fn example() -> kiln_plugin_svelte::Result<()> {
//! let options = SveltePluginOptions::load(".")?;
//! let bridge = SvelteBridge::with_options(Arc::new(compile), options)
//!     .filter_warnings(|warning| warning.code != "a11y_missing_attribute");
//! let plugin = Arc::new(KilnSveltePlugin::new(bridge));
//! // Add to your Rolldown bundler configuration
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod paths;
pub mod plugin;
pub mod sourcemap;

#[cfg(feature = "logging")]
pub mod logging;


pub use bridge::{LoadResult, Loader, ResolveResult, SvelteBridge, WarningFilter};
pub use compiler::{
    CompileOptions, CompileOutput, CompiledCode, CompilerDiagnostic, ComponentCompiler, CssMode,
    Generate, ModuleCompiler, ModuleOutput, NestedBuild, Position, Preprocessed, Preprocessor,
};
pub use config::SveltePluginOptions;
pub use diagnostics::{Location, Message, MessageKind, Severity};
pub use error::{Error, Result};
pub use plugin::KilnSveltePlugin;

#[cfg(feature = "logging")]
pub use logging::{init_logging, init_logging_from_env, LogLevel};
