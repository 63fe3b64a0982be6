//! Module id classification and synthetic stylesheet paths
//!
//! A component `src/App.svelte` that produced a stylesheet imports
//! `src/App.svelte.kiln-svelte-fake-css`. The suffix doubles as the namespace
//! marker: anything ending in it belongs to this plugin, and stripping it
//! yields the original path again.

use std::path::{Path, PathBuf};

/// Appended to a component path to name its stylesheet
pub const STYLESHEET_SUFFIX: &str = ".kiln-svelte-fake-css";

/// Namespace synthetic stylesheet paths resolve into
pub const STYLESHEET_NAMESPACE: &str = "kiln-svelte-css";

/// Namespace module variants load in
pub const MODULE_NAMESPACE: &str = "kiln-svelte-module";

/// Query marking a request for server-rendered HTML
pub const HTML_QUERY: &str = "?html";

/// Forward-slash form of a path, regardless of host separators
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// Synthetic stylesheet path for a component
pub fn stylesheet_path(original: &str) -> String {
    let mut synthetic = normalize(original);
    synthetic.push_str(STYLESHEET_SUFFIX);
    synthetic
}

/// Recovers the component path from a synthetic stylesheet path
pub fn original_path(synthetic: &str) -> Option<&str> {
    synthetic.strip_suffix(STYLESHEET_SUFFIX)
}

pub fn is_stylesheet(id: &str) -> bool {
    id.ends_with(STYLESHEET_SUFFIX)
}

/// `App.svelte` for `extensions = ["svelte"]`
pub fn is_component(id: &str, extensions: &[String]) -> bool {
    extensions
        .iter()
        .any(|ext| id.strip_suffix(ext.as_str()).is_some_and(|rest| rest.ends_with('.')))
}

/// `store.svelte.js` for `extensions = ["svelte"]`, `module_extensions = ["js"]`
pub fn is_module_variant(id: &str, extensions: &[String], module_extensions: &[String]) -> bool {
    module_extensions.iter().any(|script_ext| {
        id.strip_suffix(script_ext.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .is_some_and(|rest| is_component(rest, extensions))
    })
}

/// Strips the HTML query, if present
pub fn strip_html_query(id: &str) -> Option<&str> {
    id.strip_suffix(HTML_QUERY)
}

/// Filename handed to preprocessors and the compiler, relative to `root`
/// when the path lives under it
pub fn relative_filename(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Resolves a build-root relative filename reported by the compiler
pub fn resolve_from_root(root: &Path, filename: &str) -> PathBuf {
    let filename = Path::new(filename);
    if filename.is_absolute() {
        filename.to_path_buf()
    } else {
        root.join(filename)
    }
}

/// Resolves a path referenced from `base_file` (e.g. a source map source)
pub fn resolve_from(base_file: &Path, reference: &str) -> PathBuf {
    let reference = Path::new(reference);
    if reference.is_absolute() {
        return reference.to_path_buf();
    }
    match base_file.parent() {
        Some(dir) => dir.join(reference),
        None => reference.to_path_buf(),
    }
}
