//! Scripted collaborators shared by the integration tests
//!
//! `FakeSvelte` understands just enough component syntax for the tests:
//! `<script>` and `<style>` blocks, opening/closing tags and `<img>` without
//! `alt`. It emits recognisable code instead of a real DOM program.

#![allow(dead_code)]

use async_trait::async_trait;
use kiln_plugin_svelte::compiler::{
    CompileOptions, CompileOutput, CompiledCode, CompilerDiagnostic, ComponentCompiler, CssMode,
    Generate, ModuleCompiler, ModuleOutput, NestedBuild, Position, Preprocessed, Preprocessor,
};
use parking_lot::Mutex;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const SCOPE: &str = "svelte-kx1n2";

pub fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

fn position_at(source: &str, offset: usize) -> Position {
    let before = &source[..offset];
    let line = before.matches('\n').count() as u32 + 1;
    let column = before
        .rsplit('\n')
        .next()
        .map(|tail| tail.chars().count())
        .unwrap_or(0) as u32;
    Position::new(line, column, before.chars().count() as u32)
}

/// Code frame in the compiler's `N: text` format ending at `line`
fn frame(source: &str, line: u32, column: u32) -> String {
    let first = line.saturating_sub(2).max(1);
    let mut out = Vec::new();
    for (index, text) in source.lines().enumerate() {
        let number = index as u32 + 1;
        if number >= first && number <= line {
            out.push(format!("{number}: {text}"));
        }
    }
    let gutter = line.to_string().len() + 2;
    out.push(format!("{}^", " ".repeat(gutter + column as usize)));
    out.join("\n")
}

fn basename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn map_for(filename: &str, inbound: Option<&str>) -> String {
    let mut sources = vec![basename(filename)];
    if let Some(inbound) = inbound {
        let parsed: serde_json::Value = serde_json::from_str(inbound).unwrap_or_default();
        if let Some(extra) = parsed["sources"].as_array() {
            for source in extra.iter().filter_map(|s| s.as_str()) {
                if !sources.iter().any(|known| known == source) {
                    sources.push(source.to_string());
                }
            }
        }
    }
    serde_json::json!({
        "version": 3,
        "sources": sources,
        "names": [],
        "mappings": "",
    })
    .to_string()
}

/// A pretend Svelte compiler
#[derive(Debug, Default)]
pub struct FakeSvelte {
    calls: AtomicUsize,
    last_options: Mutex<Option<CompileOptions>>,
}

impl FakeSvelte {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<CompileOptions> {
        self.last_options.lock().clone()
    }
}

impl ComponentCompiler for FakeSvelte {
    fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompileOutput, CompilerDiagnostic> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options.clone());

        let block = |tag: &str| {
            Regex::new(&format!(r"(?s)<{tag}[^>]*>(.*?)</{tag}>"))
                .unwrap()
                .captures(source)
                .map(|c| c[1].trim().to_string())
        };
        let script = block("script");
        let style = block("style");

        // Blank out script and style blocks so offsets stay valid for markup
        let mut markup = source.to_string();
        for tag in ["script", "style"] {
            let pattern = Regex::new(&format!(r"(?s)<{tag}[^>]*>.*?</{tag}>")).unwrap();
            markup = pattern
                .replace_all(&markup, |c: &regex::Captures| {
                    c[0].chars()
                        .map(|ch| if ch == '\n' { '\n' } else { ' ' })
                        .collect::<String>()
                })
                .into_owned();
        }

        let tag = Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9-]*)([^>]*?)(/?)>").unwrap();
        let mut open: Vec<(String, usize, usize)> = Vec::new();
        let mut elements = Vec::new();
        let mut warnings = Vec::new();
        for captures in tag.captures_iter(&markup) {
            let whole = captures.get(0).unwrap();
            let name = captures[2].to_string();
            let closing = &captures[1] == "/";
            let self_closing = &captures[4] == "/" || name == "img" || name == "input";
            if closing {
                match open.iter().rposition(|(open_name, _, _)| *open_name == name) {
                    Some(index) => {
                        open.truncate(index);
                    }
                    None => {
                        let start = position_at(source, whole.start());
                        let end = position_at(source, whole.end());
                        return Err(CompilerDiagnostic::new(
                            "element_invalid_closing_tag",
                            format!("`</{name}>` attempted to close an element that was not open"),
                        )
                        .with_filename(&options.filename)
                        .with_span(start, end)
                        .with_frame(frame(source, start.line, start.column)));
                    }
                }
                continue;
            }

            if name == "img" && !captures[3].contains("alt=") {
                let start = position_at(source, whole.start());
                warnings.push(
                    CompilerDiagnostic::new(
                        "a11y_missing_attribute",
                        "`<img>` element should have an alt attribute",
                    )
                    .with_filename(&options.filename)
                    .with_span(start, position_at(source, whole.end()))
                    .with_frame(frame(source, start.line, start.column)),
                );
            }

            elements.push(name.clone());
            if !self_closing {
                open.push((name, whole.start(), whole.end()));
            }
        }

        if let Some((name, start_offset, end_offset)) = open.first() {
            let start = position_at(source, *start_offset);
            return Err(CompilerDiagnostic::new(
                "element_unclosed",
                format!("`<{name}>` was left open"),
            )
            .with_filename(&options.filename)
            .with_span(start, position_at(source, *end_offset))
            .with_frame(frame(source, start.line, start.column)));
        }

        let class = if style.is_some() {
            format!(" class=\"{SCOPE}\"")
        } else {
            String::new()
        };
        let mut js = String::from("import * as $ from \"svelte/internal/client\";\n");
        if let Some(script) = &script {
            js.push_str(script);
            js.push('\n');
        }
        let generate = match options.generate {
            Generate::Client => "element",
            Generate::Server => "ssr_element",
        };
        for (index, name) in elements.iter().enumerate() {
            js.push_str(&format!(
                "const node_{index} = $.{generate}(\"<{name}{class}>\");\n"
            ));
        }

        let css_code = style.map(|style| {
            Regex::new(r"([a-zA-Z][a-zA-Z0-9-]*)\s*\{")
                .unwrap()
                .replace_all(&style, format!("$1.{SCOPE} {{").as_str())
                .into_owned()
        });

        let css = match (options.css, css_code) {
            (CssMode::External, Some(code)) => Some(CompiledCode::new(
                code,
                map_for(&options.filename, options.source_map.as_deref()),
            )),
            (CssMode::Injected, Some(code)) => {
                js.push_str(&format!(
                    "$.append_styles(document.head, \"{SCOPE}\", {});\n",
                    serde_json::Value::String(code)
                ));
                None
            }
            (_, None) => None,
        };
        js.push_str("export default function Component() {}\n");

        Ok(CompileOutput {
            js: CompiledCode::new(js, map_for(&options.filename, options.source_map.as_deref())),
            css,
            warnings,
        })
    }
}

impl ModuleCompiler for FakeSvelte {
    fn compile_module(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<ModuleOutput, CompilerDiagnostic> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options.clone());

        if let Some(offset) = source.find("$state(") {
            if !source[offset..].contains(')') {
                let start = position_at(source, offset);
                return Err(CompilerDiagnostic::new("js_parse_error", "Unexpected end of input")
                    .with_filename(&options.filename)
                    .with_start(start)
                    .with_frame(frame(source, start.line, start.column)));
            }
        }

        Ok(ModuleOutput {
            js: CompiledCode::new(
                format!("import * as $ from \"svelte/internal/client\";\n{}", source.replace("$state(", "$.state(")),
                map_for(&options.filename, None),
            ),
            warnings: Vec::new(),
        })
    }
}

/// Prepends a banner of `lines` comment lines and maps everything back
#[derive(Debug)]
pub struct BannerPreprocessor {
    pub lines: usize,
    pub dependencies: Vec<PathBuf>,
}

impl BannerPreprocessor {
    pub fn new(lines: usize) -> Self {
        Self {
            lines,
            dependencies: Vec::new(),
        }
    }
}

#[async_trait]
impl Preprocessor for BannerPreprocessor {
    async fn preprocess(&self, source: &str, filename: &str) -> anyhow::Result<Preprocessed> {
        let banner = "<!-- generated -->\n".repeat(self.lines);
        let original_lines = source.lines().count().max(1);
        let mut mappings = ";".repeat(self.lines);
        mappings.push_str("AAAA");
        for _ in 1..original_lines {
            mappings.push_str(";AACA");
        }

        let mut sources = vec![basename(filename)];
        sources.extend(
            self.dependencies
                .iter()
                .map(|dependency| dependency.to_string_lossy().into_owned()),
        );
        let map = serde_json::json!({
            "version": 3,
            "sources": sources,
            "names": [],
            "mappings": mappings,
        });

        Ok(Preprocessed {
            code: format!("{banner}{source}"),
            map: Some(map.to_string()),
            dependencies: self.dependencies.clone(),
        })
    }
}

/// Always fails
#[derive(Debug)]
pub struct BrokenPreprocessor;

#[async_trait]
impl Preprocessor for BrokenPreprocessor {
    async fn preprocess(&self, _source: &str, filename: &str) -> anyhow::Result<Preprocessed> {
        anyhow::bail!("scss: undefined variable in {filename}")
    }
}

/// Renders the server entry into an HTML shell, remembering the entry path
#[derive(Debug, Default)]
pub struct FakeNestedBuild {
    pub fail: bool,
    pub entries: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl NestedBuild for FakeNestedBuild {
    async fn build(&self, entry: &Path) -> anyhow::Result<String> {
        self.entries.lock().push(entry.to_path_buf());
        let module = fs::read_to_string(entry)?;
        if self.fail {
            anyhow::bail!("nested build exploded");
        }
        Ok(format!("<!doctype html><body><!-- {} bytes -->{}</body>", module.len(), module.lines().count()))
    }
}
