use std::path::{Path, PathBuf};

/// Environment variable to override the tool root (for testing).
pub const TOOL_ROOT_ENV: &str = "REEL_ROOT";

/// Project entry and render output directory, resolved once at startup.
///
/// Resolution is pure path arithmetic against the working directory; neither
/// path is checked for existence. A bad entry surfaces as a bundler load
/// failure and a bad output directory as a write failure in the render sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Absolute path to the project entry file.
    pub project_entry: PathBuf,
    /// Absolute path to the directory render uploads are written to.
    pub output_dir: PathBuf,
}

/// Resolve the caller-supplied project file and output directory against `cwd`.
///
/// Paths that are already absolute are kept as-is.
#[must_use]
pub fn resolve_paths(cwd: &Path, project: &Path, output: &Path) -> ResolvedPaths {
    ResolvedPaths {
        project_entry: absolutize(cwd, project),
        output_dir: absolutize(cwd, output),
    }
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// The tool's own install layout.
///
/// The root is discovered explicitly: the `REEL_ROOT` environment variable
/// wins, then the directory holding the executable, then the working
/// directory. Everything below the root is a fixed relative path.
#[derive(Debug, Clone)]
pub struct ToolLayout {
    root: PathBuf,
}

impl ToolLayout {
    /// Create a layout rooted at an explicit directory.
    #[must_use]
    pub fn from_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// Discover the tool root.
    ///
    /// Checks `REEL_ROOT` first (test hook), then the executable's parent
    /// directory, then falls back to `.`.
    #[must_use]
    pub fn discover() -> Self {
        if let Ok(root) = std::env::var(TOOL_ROOT_ENV) {
            return Self::from_root(PathBuf::from(root));
        }

        let root = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        Self::from_root(root)
    }

    /// The tool root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The internal UI source tree.
    #[must_use]
    pub fn ui_dir(&self) -> PathBuf {
        self.root.join("ui")
    }

    /// The fixed UI bundle entry point.
    #[must_use]
    pub fn ui_entry(&self) -> PathBuf {
        self.ui_dir().join("src").join("index.ts")
    }

    /// The UI tree's own type configuration.
    #[must_use]
    pub fn ui_tsconfig(&self) -> PathBuf {
        self.ui_dir().join("tsconfig.json")
    }

    /// The framework core source tree, aliased into project code.
    #[must_use]
    pub fn core_src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    /// The tool's bundled module directory, appended to standard resolution so
    /// the tool works even when the caller's project has no dependency tree.
    #[must_use]
    pub fn internal_modules_dir(&self) -> PathBuf {
        self.root.join("node_modules")
    }

    /// The private loader directory holding the domain-specific transforms.
    #[must_use]
    pub fn loaders_dir(&self) -> PathBuf {
        self.root.join("loaders")
    }

    /// Static assets served by the dev server.
    #[must_use]
    pub fn public_dir(&self) -> PathBuf {
        self.root.join("public")
    }

    /// The external bundler executable shipped with the tool.
    #[must_use]
    pub fn bundler_program(&self) -> PathBuf {
        self.root.join("bin").join("reel-bundler")
    }
}
