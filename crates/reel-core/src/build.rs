//! Build configuration assembly.
//!
//! Composes the entry map, pipeline rules, module-resolution aliases, and
//! output policy into the one object the external bundler consumes. The
//! configuration is built once, serialized across the process boundary, and
//! never mutated afterwards; all validation is the bundler's problem.

use crate::entries::EntryMap;
use crate::paths::ToolLayout;
use crate::pipeline::RuleSet;
use serde::Serialize;
use std::path::PathBuf;

/// Build mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Development,
    Production,
}

/// Source map emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapKind {
    Inline,
    External,
    None,
}

/// A module-resolution alias: a public package-style name mapped to an
/// internal source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alias {
    pub name: String,
    pub target: PathBuf,
}

/// Module resolution handed to the bundler.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    /// Search path list. The relative `node_modules` entry keeps the
    /// bundler's standard ancestor walk; the tool's internal module directory
    /// follows so the tool is self-contained even when the caller's project
    /// has no local dependency tree.
    pub modules: Vec<PathBuf>,
    /// Resolvable source extensions.
    pub extensions: Vec<String>,
    pub aliases: Vec<Alias>,
}

/// Loader resolution search paths, in fixed order: standard external first,
/// then package-local, then the private loader directory. Standard loaders
/// are never shadowed by same-named private ones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderSearchPaths {
    pub modules: Vec<PathBuf>,
}

/// Output policy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOptions {
    /// Per-entry output template.
    pub filename: String,
    pub path: PathBuf,
    /// Stable name namespacing the bundle's runtime globals.
    pub unique_name: String,
}

/// Chunking policy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Optimization {
    /// Name of the shared runtime chunk split out of every entry, so shared
    /// module machinery is not duplicated across entries.
    pub runtime_chunk: Option<String>,
}

/// Bundler feature switches.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiments {
    /// Deferred top-level asynchronous module initialization.
    pub top_level_await: bool,
}

/// A symbol made available to every module without an explicit import.
///
/// Some transform steps emit references to the syntax-highlighting library
/// without importing it; the binding is declared here explicitly rather than
/// installed as a magic global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvidedGlobal {
    pub symbol: String,
    pub module: String,
}

/// The complete configuration consumed by the external bundler.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    pub entries: EntryMap,
    pub mode: BuildMode,
    pub source_maps: SourceMapKind,
    pub rules: RuleSet,
    pub resolve: ResolveOptions,
    pub resolve_loader: LoaderSearchPaths,
    pub optimization: Optimization,
    pub output: OutputOptions,
    pub experiments: Experiments,
    pub provided_globals: Vec<ProvidedGlobal>,
}

impl BuildConfig {
    /// Assemble the development configuration for one invocation.
    #[must_use]
    pub fn assemble(entries: EntryMap, rules: RuleSet, layout: &ToolLayout) -> Self {
        Self {
            entries,
            mode: BuildMode::Development,
            source_maps: SourceMapKind::Inline,
            rules,
            resolve: ResolveOptions {
                modules: vec![
                    PathBuf::from("node_modules"),
                    layout.internal_modules_dir(),
                ],
                extensions: vec![".js".into(), ".ts".into(), ".tsx".into()],
                aliases: vec![
                    Alias {
                        name: "@reel/core".to_string(),
                        target: layout.core_src_dir(),
                    },
                    Alias {
                        name: "@reel/ui".to_string(),
                        target: layout.ui_dir().join("src"),
                    },
                ],
            },
            resolve_loader: LoaderSearchPaths {
                modules: vec![
                    PathBuf::from("node_modules"),
                    layout.internal_modules_dir(),
                    layout.loaders_dir(),
                ],
            },
            optimization: Optimization {
                runtime_chunk: Some("runtime".to_string()),
            },
            output: OutputOptions {
                filename: "[name].js".to_string(),
                path: layout.root().to_path_buf(),
                unique_name: "reel".to_string(),
            },
            experiments: Experiments {
                top_level_await: true,
            },
            provided_globals: vec![ProvidedGlobal {
                symbol: "Prism".to_string(),
                module: "prismjs".to_string(),
            }],
        }
    }
}
