//! Tests for the Rolldown adapter
//!
//! The napi test context cannot record watch files or warnings, so these
//! stick to loads that report neither.

mod common;

use common::{write_file, FakeSvelte};
use kiln_plugin_svelte::{paths, Error, KilnSveltePlugin, SveltePluginOptions, SvelteBridge};
use kiln_plugin_svelte::CompiledCode;
use rolldown_common::{ImportKind, ModuleType};
use rolldown_plugin::{CustomField, HookLoadArgs, HookResolveIdArgs, HookUsage, Plugin};
use std::sync::Arc;
use tempfile::TempDir;

fn plugin(dir: &TempDir) -> KilnSveltePlugin {
    KilnSveltePlugin::new(SvelteBridge::with_options(
        FakeSvelte::new(),
        SveltePluginOptions::new().with_root(dir.path()),
    ))
}

fn resolve_args<'a>(specifier: &'a str, importer: Option<&'a str>) -> HookResolveIdArgs<'a> {
    HookResolveIdArgs {
        importer,
        specifier,
        is_entry: false,
        kind: ImportKind::Import,
        custom: Arc::new(CustomField::default()),
    }
}

#[test]
fn test_hook_usage() {
    let dir = TempDir::new().unwrap();
    let usage = plugin(&dir).register_hook_usage();
    assert!(usage.contains(HookUsage::ResolveId));
    assert!(usage.contains(HookUsage::Load));
}

#[tokio::test]
async fn test_ignores_other_files() {
    let dir = TempDir::new().unwrap();
    let file_path = write_file(&dir, "main.js", "console.log('hi');\n");
    let file_path = file_path.to_string_lossy();

    let plugin = plugin(&dir);
    let ctx = rolldown_plugin::PluginContext::new_napi_context();
    let args = HookLoadArgs { id: &file_path };

    let result = plugin.load(&ctx, &args).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_unknown_stylesheet_is_an_error() {
    let dir = TempDir::new().unwrap();
    let component = dir.path().join("Never.svelte");
    let synthetic = paths::stylesheet_path(&component.to_string_lossy());

    let plugin = plugin(&dir);
    let ctx = rolldown_plugin::PluginContext::new_napi_context();
    let args = HookLoadArgs { id: &synthetic };

    let err = plugin.load(&ctx, &args).await.unwrap_err();
    assert!(err.to_string().contains("[unknown-css]"));
    assert!(err.to_string().contains("Unable to find stylesheet for"));
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Diagnostics { .. })));
}

#[tokio::test]
async fn test_html_without_nested_build_is_an_error() {
    let dir = TempDir::new().unwrap();
    let component = write_file(&dir, "Page.svelte", "<p>Hi</p>\n");
    let id = format!("{}{}", component.to_string_lossy(), paths::HTML_QUERY);

    let plugin = plugin(&dir);
    let ctx = rolldown_plugin::PluginContext::new_napi_context();
    let args = HookLoadArgs { id: &id };

    let err = plugin.load(&ctx, &args).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::NestedBuildUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_resolve_absolute_stylesheet_specifier() {
    let dir = TempDir::new().unwrap();
    let synthetic = paths::stylesheet_path(&dir.path().join("App.svelte").to_string_lossy());

    let plugin = plugin(&dir);
    let ctx = rolldown_plugin::PluginContext::new_napi_context();
    let args = resolve_args(&synthetic, Some("/elsewhere/main.js"));

    let resolved = plugin.resolve_id(&ctx, &args).await.unwrap().unwrap();
    assert_eq!(resolved.id.as_str(), synthetic);
}

#[tokio::test]
async fn test_resolve_relative_stylesheet_specifier() {
    let dir = TempDir::new().unwrap();
    let importer = dir.path().join("src").join("App.svelte");
    let importer = importer.to_string_lossy();

    let plugin = plugin(&dir);
    let ctx = rolldown_plugin::PluginContext::new_napi_context();

    let args = resolve_args("./App.svelte.kiln-svelte-fake-css", Some(&importer));
    let resolved = plugin.resolve_id(&ctx, &args).await.unwrap().unwrap();
    let component = dir.path().join("src").join("App.svelte");
    assert_eq!(
        resolved.id.as_str(),
        paths::stylesheet_path(&component.to_string_lossy())
    );

    // The resolved id serves the stylesheet cached for the component
    plugin
        .bridge()
        .stylesheets()
        .insert(&component.to_string_lossy(), CompiledCode::new("p{color:red}", "{}"));
    let args = HookLoadArgs { id: &resolved.id };
    let output = plugin.load(&ctx, &args).await.unwrap().unwrap();
    assert!(output.code.starts_with("p{color:red}\n"));
    assert!(matches!(output.module_type, Some(ModuleType::Css)));

    let args = resolve_args("../Button.svelte.kiln-svelte-fake-css", Some(&importer));
    let resolved = plugin.resolve_id(&ctx, &args).await.unwrap().unwrap();
    assert_eq!(
        resolved.id.as_str(),
        paths::stylesheet_path(&dir.path().join("Button.svelte").to_string_lossy())
    );
}

#[tokio::test]
async fn test_resolve_passes_other_specifiers() {
    let dir = TempDir::new().unwrap();
    let plugin = plugin(&dir);
    let ctx = rolldown_plugin::PluginContext::new_napi_context();

    for specifier in ["./App.svelte", "svelte/internal/client", "./theme.css"] {
        let args = resolve_args(specifier, Some("/app/src/main.js"));
        assert!(plugin.resolve_id(&ctx, &args).await.unwrap().is_none());
    }
}
