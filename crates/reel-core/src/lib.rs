#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod build;
pub mod bundler;
pub mod entries;
pub mod error;
pub mod paths;
pub mod pipeline;

pub use build::{Alias, BuildConfig, BuildMode, OutputOptions, ProvidedGlobal, SourceMapKind};
pub use bundler::{Bundler, BundlerEvent, BundlerHandle, ProcessBundler};
pub use entries::{EntryMap, PROJECT_ENTRY, UI_ENTRY};
pub use error::Error;
pub use paths::{resolve_paths, ResolvedPaths, ToolLayout};
pub use pipeline::{LoaderResolver, RuleSet, ScopeFilter, Transform, TransformRule};
