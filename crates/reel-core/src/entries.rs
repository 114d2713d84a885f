use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Logical name of the project entry, always present.
pub const PROJECT_ENTRY: &str = "index";

/// Logical name of the companion UI entry, present only with `--ui`.
pub const UI_ENTRY: &str = "ui";

/// Named compilation entry points handed to the bundler.
///
/// Built once at startup and immutable afterwards. Iteration order is
/// deterministic (name order), which keeps the serialized build configuration
/// stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EntryMap(BTreeMap<String, PathBuf>);

impl EntryMap {
    /// Build the entry set for one invocation.
    ///
    /// Without the UI flag the map is `{index: project_entry}`; with it, the
    /// fixed internal UI entry is added under `ui`. Neither path is validated.
    #[must_use]
    pub fn build(project_entry: &Path, include_ui: bool, ui_entry: &Path) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(PROJECT_ENTRY.to_string(), project_entry.to_path_buf());
        if include_ui {
            entries.insert(UI_ENTRY.to_string(), ui_entry.to_path_buf());
        }
        Self(entries)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.0.get(name).map(PathBuf::as_path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }
}
