//! Asset pipeline configuration.
//!
//! An ordered table of extension → transform-chain rules consumed by the
//! external bundler. Two rules may claim the same extension (typed sources in
//! the internal UI tree vs. the caller's project tree); scope filters keep
//! them disjoint so every file matches exactly one rule. Matching is explicit
//! two-level dispatch — extension first, then path-prefix predicate — never
//! declaration order.

pub mod tabular;

pub use tabular::{parse_records, TabularOptions};

use crate::paths::ToolLayout;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Include/exclude path-prefix predicate making same-extension rules disjoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeFilter {
    /// Rule applies only to files under this prefix.
    Include(PathBuf),
    /// Rule applies only to files outside this prefix.
    Exclude(PathBuf),
}

impl ScopeFilter {
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        match self {
            Self::Include(prefix) => path.starts_with(prefix),
            Self::Exclude(prefix) => !path.starts_with(prefix),
        }
    }
}

/// One step in a transform chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum Transform {
    /// Style-preprocessing-language compilation.
    SassPreprocess,
    /// CSS extraction; `modules` turns on locally scoped class identifiers.
    CssExtract { modules: bool },
    /// Inject extracted styles into the document at runtime.
    StyleInject,
    /// Type-aware transpilation. Each scope gets its own compiler instance so
    /// the UI and project trees never share type state.
    Transpile {
        /// Explicit type-configuration file; `None` uses default discovery.
        config_file: Option<PathBuf>,
        instance: String,
    },
    /// Emit the file verbatim as a text asset, embedded as a string.
    RawText,
    /// Emit as the bundler's generic binary asset (inlined or externalized at
    /// the bundler's default threshold).
    BinaryAsset,
    /// Eager parse into structured records.
    Tabular(TabularOptions),
    /// Dedicated named loader resolved through the loader search paths.
    Loader { name: String },
}

/// A single pipeline rule: which files, and what happens to them.
#[derive(Debug, Clone, Serialize)]
pub struct TransformRule {
    /// Extensions claimed by this rule, lower case, without the dot.
    pub extensions: &'static [&'static str],
    /// Transform chain, applied in order.
    pub chain: Vec<Transform>,
    /// Optional scope predicate; `None` means the extension alone decides.
    pub scope: Option<ScopeFilter>,
}

impl TransformRule {
    fn matches_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }

    /// Full match: extension plus scope predicate.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        self.matches_extension(path)
            && self.scope.as_ref().map_or(true, |scope| scope.matches(path))
    }
}

/// The ordered pipeline rule table.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<TransformRule>,
}

impl RuleSet {
    /// The standard rule table for an animation project, in priority order.
    #[must_use]
    pub fn standard(layout: &ToolLayout) -> Self {
        let ui_dir = layout.ui_dir();

        let rules = vec![
            // Stylesheets: preprocess, extract with locally scoped class
            // identifiers, inject at runtime.
            TransformRule {
                extensions: &["scss"],
                chain: vec![
                    Transform::SassPreprocess,
                    Transform::CssExtract { modules: true },
                    Transform::StyleInject,
                ],
                scope: None,
            },
            // Typed sources inside the internal UI tree use the UI's own type
            // configuration and a dedicated compiler instance.
            TransformRule {
                extensions: &["ts", "tsx"],
                chain: vec![Transform::Transpile {
                    config_file: Some(layout.ui_tsconfig()),
                    instance: "ui".to_string(),
                }],
                scope: Some(ScopeFilter::Include(ui_dir.clone())),
            },
            // Typed sources everywhere else use the project's own type
            // configuration via default discovery. Together with the rule
            // above this partitions the typed sources exhaustively.
            TransformRule {
                extensions: &["ts", "tsx"],
                chain: vec![Transform::Transpile {
                    config_file: None,
                    instance: "project".to_string(),
                }],
                scope: Some(ScopeFilter::Exclude(ui_dir)),
            },
            // Shader sources are embedded as raw strings.
            TransformRule {
                extensions: &["glsl"],
                chain: vec![Transform::RawText],
                scope: None,
            },
            // Media files go through the bundler's generic binary asset path.
            TransformRule {
                extensions: &["mp4"],
                chain: vec![Transform::BinaryAsset],
                scope: None,
            },
            TransformRule {
                extensions: &["wav"],
                chain: vec![Transform::BinaryAsset],
                scope: None,
            },
            // Tabular data is parsed eagerly into typed records.
            TransformRule {
                extensions: &["csv"],
                chain: vec![Transform::Tabular(TabularOptions::default())],
                scope: None,
            },
            // Domain assets handled by the private loaders.
            TransformRule {
                extensions: &["label"],
                chain: vec![Transform::Loader {
                    name: "label-loader".to_string(),
                }],
                scope: None,
            },
            TransformRule {
                extensions: &["anim"],
                chain: vec![Transform::Loader {
                    name: "animation-loader".to_string(),
                }],
                scope: None,
            },
            TransformRule {
                extensions: &["png"],
                chain: vec![Transform::Loader {
                    name: "sprite-loader".to_string(),
                }],
                scope: None,
            },
        ];

        Self { rules }
    }

    /// All rules in priority order.
    #[must_use]
    pub fn rules(&self) -> &[TransformRule] {
        &self.rules
    }

    /// Two-level dispatch: narrow by extension, then apply scope predicates.
    ///
    /// Returns the single applicable rule, or `None` for an unhandled
    /// extension. The standard table keeps same-extension scopes disjoint, so
    /// at most one candidate survives the second level.
    #[must_use]
    pub fn match_rule(&self, path: &Path) -> Option<&TransformRule> {
        let mut candidates = self
            .rules
            .iter()
            .filter(|rule| rule.matches_extension(path));

        candidates.find(|rule| rule.scope.as_ref().map_or(true, |scope| scope.matches(path)))
    }

    /// Number of rules matching `path` after scope filtering. Exists for the
    /// partition invariant: for every supported extension this is exactly 1.
    #[must_use]
    pub fn match_count(&self, path: &Path) -> usize {
        self.rules.iter().filter(|rule| rule.matches(path)).count()
    }
}

/// Resolves named loaders through the fixed search-path order.
///
/// Standard external modules are searched first, then the tool's package-local
/// modules, then the private loader directory — so a loader shipped under a
/// standard name is never shadowed by a private one.
#[derive(Debug, Clone)]
pub struct LoaderResolver {
    search_paths: Vec<PathBuf>,
}

impl LoaderResolver {
    /// Build the resolver for a project rooted at `project_root`.
    #[must_use]
    pub fn for_project(project_root: &Path, layout: &ToolLayout) -> Self {
        Self {
            search_paths: vec![
                project_root.join("node_modules"),
                layout.internal_modules_dir(),
                layout.loaders_dir(),
            ],
        }
    }

    /// Search paths in resolution order.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Resolve a loader name to its on-disk location, first hit wins.
    ///
    /// A loader may be a package directory or a single source file.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        for dir in &self.search_paths {
            let as_package = dir.join(name);
            if as_package.exists() {
                return Some(as_package);
            }
            let as_file = dir.join(format!("{name}.js"));
            if as_file.exists() {
                return Some(as_file);
            }
        }
        None
    }
}
