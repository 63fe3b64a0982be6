//! Svelte plugin configuration
//!
//! Options can be built in code with the `with_*` methods or loaded from
//! `kiln-svelte.toml` and `KILN_SVELTE_*` environment variables.

use crate::compiler::CssMode;
use crate::error::Result;
use figment::{
    providers::{Env, Format as _, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up by [`SveltePluginOptions::load`]
pub const CONFIG_FILE: &str = "kiln-svelte.toml";

/// Prefix of environment overrides, e.g. `KILN_SVELTE_CSS=injected`
pub const ENV_PREFIX: &str = "KILN_SVELTE_";

/// Configuration for Svelte processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SveltePluginOptions {
    /// Component file extensions, without the dot
    pub extensions: Vec<String>,

    /// Script extensions that mark module variants (`App.svelte.js`)
    pub module_extensions: Vec<String>,

    /// Emit styles as a separate stylesheet or inject them at runtime
    pub css: CssMode,

    /// Reuse results of unchanged files across loads
    pub cache: bool,

    /// Build root that filenames are made relative to.
    ///
    /// Defaults to the current directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Passed through to the compiler untouched
    pub compiler_options: serde_json::Map<String, serde_json::Value>,
}

impl Default for SveltePluginOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["svelte".to_string()],
            module_extensions: vec!["js".to_string(), "ts".to_string()],
            css: CssMode::External,
            cache: true,
            root: None,
            compiler_options: serde_json::Map::new(),
        }
    }
}

impl SveltePluginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads options from `dir/kiln-svelte.toml` (if present) and the
    /// environment.
    ///
    /// Priority: environment variables > config file > defaults
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(CONFIG_FILE);
        let mut figment = Self::defaults();
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading svelte plugin config");
            figment = figment.merge(Toml::file(path));
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)).extract()?)
    }

    /// Loads options from a TOML file, ignoring the environment
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::defaults()
            .merge(Toml::file(path.as_ref()))
            .extract()?)
    }

    fn defaults() -> Figment {
        Figment::new().merge(Serialized::defaults(Self::default()))
    }

    pub fn with_css(mut self, css: CssMode) -> Self {
        self.css = css;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Add a component extension (without the dot)
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extensions.push(ext.into());
        self
    }

    /// Set a compiler option forwarded on every compile
    pub fn compiler_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.compiler_options.insert(key.into(), value);
        self
    }
}
