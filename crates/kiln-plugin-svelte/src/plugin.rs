//! Rolldown adapter for [`SvelteBridge`]
//!
//! ## Why `resolve_id` and `load`?
//!
//! - `.svelte` files aren't valid JavaScript, so they must be intercepted in
//!   `load` before Rolldown's parser runs
//! - the synthetic stylesheet import doesn't exist on disk; `resolve_id` claims
//!   it so Rolldown never tries the filesystem, and `load` serves it from the
//!   bridge's stylesheet cache
//!
//! The synthetic id is kept as-is (it still ends in the reserved suffix), so
//! relative `url()`s inside the stylesheet resolve next to the component.

use crate::bridge::{LoadResult, Loader, SvelteBridge};
use crate::error::Error;
use crate::paths;
use rolldown_common::{LogWithoutPlugin, ModuleType};
use rolldown_plugin::{
    HookLoadArgs, HookLoadOutput, HookLoadReturn, HookResolveIdArgs, HookResolveIdOutput,
    HookResolveIdReturn, HookUsage, Plugin, PluginContext,
};
use path_clean::PathClean;
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

/// Rolldown plugin that compiles Svelte components through a [`SvelteBridge`]
///
/// # Example
///
/// ```rust,no_run
/// use kiln_plugin_svelte::{KilnSveltePlugin, SvelteBridge};
/// # use kiln_plugin_svelte::compiler::{ComponentCompiler, CompileOptions, CompileOutput, CompilerDiagnostic};
/// # struct MyCompiler;
/// # impl ComponentCompiler for MyCompiler {
/// #     fn compile(&self, _: &str, _: &CompileOptions) -> Result<CompileOutput, CompilerDiagnostic> { todo!() }
/// # }
/// use std::sync::Arc;
///
/// let plugin = Arc::new(KilnSveltePlugin::new(SvelteBridge::new(Arc::new(MyCompiler))));
/// // Add to your Rolldown bundler configuration
/// ```
#[derive(Debug, Clone)]
pub struct KilnSveltePlugin {
    bridge: Arc<SvelteBridge>,
}

impl KilnSveltePlugin {
    pub fn new(bridge: SvelteBridge) -> Self {
        Self {
            bridge: Arc::new(bridge),
        }
    }

    /// Shares a bridge, e.g. with a second plugin instance of the same build
    pub fn from_shared(bridge: Arc<SvelteBridge>) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &Arc<SvelteBridge> {
        &self.bridge
    }
}

impl Plugin for KilnSveltePlugin {
    fn name(&self) -> Cow<'static, str> {
        "kiln-svelte".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::ResolveId | HookUsage::Load
    }

    /// Claims synthetic stylesheet specifiers.
    ///
    /// The bridge emits absolute specifiers for absolute component ids;
    /// relative ones are joined to the importer's directory and cleaned, so
    /// they match the component's cache key.
    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs<'_>,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let specifier = args.specifier.to_string();
        let importer = args.importer.map(|s| s.to_string());
        let bridge = Arc::clone(&self.bridge);

        async move {
            if !paths::is_stylesheet(&specifier) {
                return Ok(None);
            }

            let path = match importer.as_deref() {
                Some(importer) if specifier.starts_with("./") || specifier.starts_with("../") => {
                    let joined = paths::resolve_from(Path::new(importer), &specifier).clean();
                    paths::normalize(&joined.to_string_lossy())
                }
                _ => specifier,
            };

            Ok(bridge
                .resolve_stylesheet(&path)
                .map(|resolved| HookResolveIdOutput {
                    id: resolved.path.into(),
                    ..Default::default()
                }))
        }
    }

    /// Routes an id to the matching bridge operation
    ///
    /// - `*.kiln-svelte-fake-css` → cached stylesheet
    /// - `*.svelte?html` → server-rendered HTML
    /// - `*.svelte.js` / `*.svelte.ts` → module compile
    /// - `*.svelte` → component compile
    ///
    /// Anything else returns `Ok(None)` so other plugins can handle it.
    fn load(
        &self,
        ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let id = args.id.to_string();
        let bridge = Arc::clone(&self.bridge);
        let ctx = ctx.clone();

        async move { load_id(&bridge, &ctx, &id).await }
    }
}

/// What a load reports to the bundler besides its output
trait LoadHost {
    fn add_watch_file(&self, file: &str);
    fn warn(&self, log: LogWithoutPlugin);
}

impl LoadHost for PluginContext {
    fn add_watch_file(&self, file: &str) {
        PluginContext::add_watch_file(self, file);
    }

    fn warn(&self, log: LogWithoutPlugin) {
        PluginContext::warn(self, log);
    }
}

async fn load_id<H: LoadHost>(bridge: &SvelteBridge, host: &H, id: &str) -> HookLoadReturn {
    let result = if paths::is_stylesheet(id) {
        bridge.load_stylesheet(id)
    } else if let Some(component) =
        paths::strip_html_query(id).filter(|component| bridge.is_component(component))
    {
        bridge.load_html(Path::new(component)).await?
    } else if let Some(module) = bridge.resolve_module(id) {
        bridge.load_module(Path::new(&module.path)).await?
    } else if bridge.is_component(id) {
        bridge.load_component(Path::new(id)).await?
    } else {
        return Ok(None);
    };

    report(host, result)
}

/// Forwards watch files and warnings, then turns fatal messages into a hook error
fn report<H: LoadHost>(host: &H, result: LoadResult) -> HookLoadReturn {
    for file in &result.watch_files {
        host.add_watch_file(&file.to_string_lossy());
    }
    for warning in &result.warnings {
        host.warn(LogWithoutPlugin {
            message: warning.to_string(),
            id: warning.location.as_ref().map(|location| location.file.clone()),
            code: warning.detail.clone(),
            ..Default::default()
        });
    }

    into_hook_output(result)
}

fn into_hook_output(result: LoadResult) -> HookLoadReturn {
    if !result.errors.is_empty() {
        return Err(Error::diagnostics(result.errors).into());
    }

    let Some(code) = result.contents else {
        return Ok(None);
    };
    Ok(Some(HookLoadOutput {
        code: code.into(),
        module_type: result.loader.map(module_type),
        ..Default::default()
    }))
}

fn module_type(loader: Loader) -> ModuleType {
    match loader {
        Loader::Js => ModuleType::Js,
        Loader::Css => ModuleType::Css,
        Loader::Copy => ModuleType::Text,
    }
}
