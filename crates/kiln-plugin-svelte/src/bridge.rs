//! Compile-and-bridge orchestration
//!
//! [`SvelteBridge`] is independent of any bundler. It answers four questions
//! for a module id and returns plain data the host adapter forwards:
//!
//! ```text
//! App.svelte          → load_component  → JS + import "App.svelte.kiln-svelte-fake-css"
//! App.svelte.kiln-…   → resolve_stylesheet → (same path, stylesheet namespace)
//!                     → load_stylesheet → CSS cached by load_component
//! store.svelte.js     → load_module     → JS
//! App.svelte?html     → load_html       → server compile → nested build → HTML
//! ```
//!
//! The stylesheet cache is shared by `load_component` (writer) and
//! `load_stylesheet` (reader). Each key is written by at most one in-flight
//! load, since bundlers deduplicate loads per path.

use crate::cache::{CompileCache, StylesheetCache};
use crate::compiler::{
    CompileOptions, CompilerDiagnostic, ComponentCompiler, CssMode, Generate, ModuleCompiler,
    NestedBuild, Preprocessor,
};
use crate::config::SveltePluginOptions;
use crate::diagnostics::{Message, MessageKind};
use crate::error::{Error, Result};
use crate::paths;
use crate::sourcemap;
use indexmap::IndexSet;
use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How the bundler should interpret returned contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    Js,
    Css,
    /// Emit the contents as-is
    Copy,
}

/// Outcome of one load call, in the bundler's plugin-result shape
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadResult {
    pub contents: Option<String>,
    pub loader: Option<Loader>,
    /// Directory relative imports inside `contents` resolve against
    pub resolve_dir: Option<PathBuf>,
    pub watch_files: Vec<PathBuf>,
    pub errors: Vec<Message>,
    pub warnings: Vec<Message>,
}

impl LoadResult {
    pub fn script(contents: String, watch_files: Vec<PathBuf>) -> Self {
        Self {
            contents: Some(contents),
            loader: Some(Loader::Js),
            watch_files,
            ..Default::default()
        }
    }

    /// A result carrying one fatal message and no contents
    pub fn failure(message: Message, watch_files: Vec<PathBuf>) -> Self {
        Self {
            errors: vec![message],
            watch_files,
            ..Default::default()
        }
    }

    fn read_failure(path: &Path, err: &std::io::Error) -> Self {
        Self::failure(
            Message::new(
                MessageKind::ReadFileError,
                format!("Failed to read {}: {err}", path.display()),
            )
            .with_detail(err.to_string()),
            vec![path.to_path_buf()],
        )
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Where a synthetic stylesheet path resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveResult {
    pub path: String,
    pub namespace: &'static str,
}

/// Decides whether a compiler warning is reported
pub type WarningFilter = Arc<dyn Fn(&CompilerDiagnostic) -> bool + Send + Sync>;

/// Owns the caches and collaborators for one build
pub struct SvelteBridge {
    options: SveltePluginOptions,
    root: PathBuf,
    compiler: Arc<dyn ComponentCompiler>,
    module_compiler: Option<Arc<dyn ModuleCompiler>>,
    preprocessor: Option<Arc<dyn Preprocessor>>,
    nested_build: Option<Arc<dyn NestedBuild>>,
    warning_filter: Option<WarningFilter>,
    stylesheets: StylesheetCache,
    compiled: CompileCache,
}

impl fmt::Debug for SvelteBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SvelteBridge")
            .field("options", &self.options)
            .field("root", &self.root)
            .field("module_compiler", &self.module_compiler.is_some())
            .field("preprocessor", &self.preprocessor.is_some())
            .field("nested_build", &self.nested_build.is_some())
            .field("stylesheets", &self.stylesheets.len())
            .finish_non_exhaustive()
    }
}

/// What a read + preprocess step produced
struct Prepared {
    source: String,
    filename: String,
    map: Option<String>,
    dependencies: Vec<PathBuf>,
}

impl SvelteBridge {
    pub fn new(compiler: Arc<dyn ComponentCompiler>) -> Self {
        Self::with_options(compiler, SveltePluginOptions::default())
    }

    pub fn with_options(compiler: Arc<dyn ComponentCompiler>, options: SveltePluginOptions) -> Self {
        let root = options
            .root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        Self {
            options,
            root,
            compiler,
            module_compiler: None,
            preprocessor: None,
            nested_build: None,
            warning_filter: None,
            stylesheets: StylesheetCache::new(),
            compiled: CompileCache::new(),
        }
    }

    pub fn with_module_compiler(mut self, compiler: Arc<dyn ModuleCompiler>) -> Self {
        self.module_compiler = Some(compiler);
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn Preprocessor>) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    pub fn with_nested_build(mut self, nested_build: Arc<dyn NestedBuild>) -> Self {
        self.nested_build = Some(nested_build);
        self
    }

    /// Overrides the build root that compiler filenames are relative to
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Only warnings for which `filter` returns true are reported
    pub fn filter_warnings<F>(mut self, filter: F) -> Self
    where
        F: Fn(&CompilerDiagnostic) -> bool + Send + Sync + 'static,
    {
        self.warning_filter = Some(Arc::new(filter));
        self
    }

    pub fn options(&self) -> &SveltePluginOptions {
        &self.options
    }

    pub fn stylesheets(&self) -> &StylesheetCache {
        &self.stylesheets
    }

    pub fn is_component(&self, id: &str) -> bool {
        paths::is_component(id, &self.options.extensions)
    }

    pub fn is_module_variant(&self, id: &str) -> bool {
        paths::is_module_variant(id, &self.options.extensions, &self.options.module_extensions)
    }

    /// Loads a `.svelte` component as a script module.
    ///
    /// # Returns
    ///
    /// - `Ok(result)` with contents on success, possibly with warnings
    /// - `Ok(result)` with one fatal message on read or compile failure
    /// - `Err(Error::Preprocess)` when a preprocessor fails
    pub async fn load_component(&self, path: &Path) -> Result<LoadResult> {
        if self.options.cache {
            if let Some(cached) = self.compiled.get_fresh(path).await {
                tracing::debug!(path = %path.display(), "reusing compiled component");
                return Ok(cached);
            }
        }

        let prepared = match self.prepare(path, true).await? {
            Ok(prepared) => prepared,
            Err(failure) => return Ok(failure),
        };

        let options = self.compile_options(&prepared, self.options.css, Generate::Client);
        let output = match self.compiler.compile(&prepared.source, &options) {
            Ok(output) => output,
            Err(err) => {
                self.compiled.evict(path);
                return Ok(self.compile_failure(path, &prepared, &err));
            }
        };

        let original = path.to_string_lossy();
        let mut watch = WatchFiles::new(path);
        watch.extend_from_map(path, &output.js.map);
        watch.extend(prepared.dependencies.iter().cloned());

        let mut contents = output.js.code;
        match output.css.filter(|css| !css.code.is_empty()) {
            Some(css) => {
                watch.extend_from_map(path, &css.map);
                let synthetic = paths::stylesheet_path(&original);
                contents.push_str("\nimport ");
                contents.push_str(&quote(&synthetic));
                contents.push(';');
                self.stylesheets.insert(&original, css);
            }
            None => {
                self.stylesheets.remove(&original);
            }
        }
        contents.push('\n');
        contents.push_str(&sourcemap::script_comment(&output.js.map));

        tracing::info!(
            path = %path.display(),
            code_len = contents.len(),
            warnings = output.warnings.len(),
            "compiled svelte component"
        );

        let result = LoadResult {
            warnings: self.warnings(&output.warnings, &prepared),
            ..LoadResult::script(contents, watch.into_vec())
        };
        if self.options.cache {
            self.compiled.store(path, &result).await;
        }
        Ok(result)
    }

    /// Loads a module variant (`.svelte.js` / `.svelte.ts`).
    ///
    /// Module variants are not preprocessed. Without a module compiler the
    /// file is not read and a `missing-module-compiler` message is returned.
    pub async fn load_module(&self, path: &Path) -> Result<LoadResult> {
        let Some(module_compiler) = &self.module_compiler else {
            return Ok(LoadResult::failure(
                Message::new(
                    MessageKind::MissingModuleCompiler,
                    format!(
                        "Cannot compile {}: no module compiler is configured. \
                         Pass one to SvelteBridge::with_module_compiler (Svelte 5+ `compileModule`) \
                         or remove the module extensions from the plugin options.",
                        path.display()
                    ),
                ),
                Vec::new(),
            ));
        };

        let prepared = match self.prepare(path, false).await? {
            Ok(prepared) => prepared,
            Err(failure) => return Ok(failure),
        };

        let options = self.compile_options(&prepared, self.options.css, Generate::Client);
        let output = match module_compiler.compile_module(&prepared.source, &options) {
            Ok(output) => output,
            Err(err) => return Ok(self.compile_failure(path, &prepared, &err)),
        };

        let mut watch = WatchFiles::new(path);
        watch.extend_from_map(path, &output.js.map);

        let mut contents = output.js.code;
        contents.push('\n');
        contents.push_str(&sourcemap::script_comment(&output.js.map));

        tracing::debug!(path = %path.display(), "compiled svelte module");
        Ok(LoadResult {
            warnings: self.warnings(&output.warnings, &prepared),
            ..LoadResult::script(contents, watch.into_vec())
        })
    }

    /// Routes a synthetic stylesheet path into the stylesheet namespace
    pub fn resolve_stylesheet(&self, path: &str) -> Option<ResolveResult> {
        paths::is_stylesheet(path).then(|| ResolveResult {
            path: path.to_string(),
            namespace: paths::STYLESHEET_NAMESPACE,
        })
    }

    /// Routes a module variant into the module namespace, for hosts that
    /// scope loaders by namespace
    pub fn resolve_module(&self, path: &str) -> Option<ResolveResult> {
        self.is_module_variant(path).then(|| ResolveResult {
            path: path.to_string(),
            namespace: paths::MODULE_NAMESPACE,
        })
    }

    /// Serves the stylesheet the component's last successful compile produced
    pub fn load_stylesheet(&self, path: &str) -> LoadResult {
        let original = paths::original_path(path).unwrap_or(path);
        let Some(css) = self.stylesheets.get(original) else {
            tracing::warn!(original, "stylesheet requested before its component compiled");
            return LoadResult::failure(
                Message::new(
                    MessageKind::UnknownCss,
                    format!("Unable to find stylesheet for {original}"),
                ),
                Vec::new(),
            );
        };

        let mut contents = css.code;
        contents.push('\n');
        contents.push_str(&sourcemap::stylesheet_comment(&css.map));

        LoadResult {
            contents: Some(contents),
            loader: Some(Loader::Css),
            resolve_dir: Path::new(path).parent().map(Path::to_path_buf),
            ..Default::default()
        }
    }

    /// Renders a component to HTML through a nested server build.
    ///
    /// The server module is written to a temporary file next to the component
    /// so its relative imports resolve, and removed on every exit path.
    pub async fn load_html(&self, path: &Path) -> Result<LoadResult> {
        let Some(nested_build) = &self.nested_build else {
            return Err(Error::NestedBuildUnavailable {
                path: path.to_path_buf(),
            });
        };

        let prepared = match self.prepare(path, true).await? {
            Ok(prepared) => prepared,
            Err(failure) => return Ok(failure),
        };

        let options = self.compile_options(&prepared, CssMode::Injected, Generate::Server);
        let output = match self.compiler.compile(&prepared.source, &options) {
            Ok(output) => output,
            Err(err) => return Ok(self.compile_failure(path, &prepared, &err)),
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut entry = tempfile::Builder::new()
            .prefix(".kiln-svelte-ssr-")
            .suffix(".js")
            .tempfile_in(dir)
            .map_err(|err| Error::temp_file(path.to_path_buf(), err))?;
        entry
            .write_all(output.js.code.as_bytes())
            .and_then(|()| entry.flush())
            .map_err(|err| Error::temp_file(path.to_path_buf(), err))?;

        tracing::debug!(
            path = %path.display(),
            entry = %entry.path().display(),
            "running nested build"
        );
        // `entry` is dropped (and deleted) on the error path as well
        let html = nested_build
            .build(entry.path())
            .await
            .map_err(|err| Error::nested_build(path.to_path_buf(), err))?;
        let _ = entry.close();

        let mut watch = WatchFiles::new(path);
        watch.extend(prepared.dependencies.iter().cloned());

        Ok(LoadResult {
            contents: Some(html),
            loader: Some(Loader::Copy),
            watch_files: watch.into_vec(),
            warnings: self.warnings(&output.warnings, &prepared),
            ..Default::default()
        })
    }

    /// Reads the file and runs the preprocessor if asked to.
    ///
    /// The inner `Err` is a finished read-failure result.
    async fn prepare(
        &self,
        path: &Path,
        preprocess: bool,
    ) -> Result<std::result::Result<Prepared, LoadResult>> {
        let source = match tokio::fs::read_to_string(path).await {
            Ok(source) => source,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "failed to read component");
                return Ok(Err(LoadResult::read_failure(path, &err)));
            }
        };
        let filename = paths::relative_filename(&self.root, path);

        let preprocessor = self.preprocessor.as_ref().filter(|_| preprocess);
        let Some(preprocessor) = preprocessor else {
            return Ok(Ok(Prepared {
                source,
                filename,
                map: None,
                dependencies: Vec::new(),
            }));
        };

        let processed = preprocessor
            .preprocess(&source, &filename)
            .await
            .map_err(|err| Error::preprocess(filename.as_str(), err))?;

        Ok(Ok(Prepared {
            source: processed.code,
            filename,
            map: processed.map,
            dependencies: processed
                .dependencies
                .iter()
                .map(|dependency| paths::resolve_from(path, &dependency.to_string_lossy()))
                .collect(),
        }))
    }

    /// Shapes a compile error; a sub-file the compiler names is watched too.
    ///
    /// Compiler filenames are relative to the build root, like the filename
    /// the compiler was given.
    fn compile_failure(
        &self,
        path: &Path,
        prepared: &Prepared,
        err: &CompilerDiagnostic,
    ) -> LoadResult {
        tracing::debug!(path = %path.display(), code = %err.code, "svelte compile failed");

        let mut watch = WatchFiles::new(path);
        if let Some(failing) = &err.filename {
            watch.insert(paths::resolve_from_root(&self.root, failing));
        }

        LoadResult::failure(
            Message::from_compiler(
                MessageKind::CompilationError,
                err,
                &prepared.filename,
                prepared.map.as_deref(),
            ),
            watch.into_vec(),
        )
    }

    fn compile_options(&self, prepared: &Prepared, css: CssMode, generate: Generate) -> CompileOptions {
        CompileOptions {
            filename: prepared.filename.clone(),
            css,
            generate,
            source_map: prepared.map.clone(),
            compiler_options: self.options.compiler_options.clone(),
        }
    }

    fn keep_warning(&self, warning: &CompilerDiagnostic) -> bool {
        match &self.warning_filter {
            Some(filter) => filter(warning),
            None => true,
        }
    }

    fn warnings(&self, warnings: &[CompilerDiagnostic], prepared: &Prepared) -> Vec<Message> {
        warnings
            .iter()
            .filter(|warning| self.keep_warning(warning))
            .map(|warning| {
                Message::from_compiler(
                    MessageKind::CompilationWarning,
                    warning,
                    &prepared.filename,
                    prepared.map.as_deref(),
                )
            })
            .collect()
    }
}

/// JS string literal for an import specifier
fn quote(specifier: &str) -> String {
    serde_json::Value::String(specifier.to_string()).to_string()
}

/// Ordered, deduplicated watch-file set
struct WatchFiles(IndexSet<PathBuf>);

impl WatchFiles {
    fn new(path: &Path) -> Self {
        let mut set = IndexSet::new();
        set.insert(path.to_path_buf());
        Self(set)
    }

    fn insert(&mut self, path: PathBuf) {
        self.0.insert(path);
    }

    fn extend(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.0.extend(paths);
    }

    /// Adds every source `map` references, relative to `base_file`
    fn extend_from_map(&mut self, base_file: &Path, map: &str) {
        for source in sourcemap::sources(map) {
            self.0.insert(paths::resolve_from(base_file, &source));
        }
    }

    fn into_vec(self) -> Vec<PathBuf> {
        self.0.into_iter().collect()
    }
}
