//! External bundler interface.
//!
//! Compilation, module resolution, and hot-module machinery all live in the
//! external bundler; this module only defines the boundary. The shipped
//! adapter spawns the bundler executable as a child process, hands it the
//! serialized [`BuildConfig`] as a single JSON line on stdin, and turns its
//! line-delimited JSON stdout into [`BundlerEvent`]s. Stderr is inherited so
//! build diagnostics reach the user on the bundler's own channel, uninspected.

use crate::build::BuildConfig;
use crate::error::Error;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

/// Events emitted by a running bundler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BundlerEvent {
    /// A build or rebuild finished; served assets are fresh.
    Rebuilt,
    /// A structured diagnostic line, forwarded verbatim.
    Diagnostic { message: String },
}

/// A source of build/rebuild notifications.
pub trait Bundler {
    /// Hand over the configuration and start building.
    fn start(&self, config: &BuildConfig) -> Result<BundlerHandle, Error>;
}

/// Handle to a started bundler: an event stream plus the child, if any.
#[derive(Debug)]
pub struct BundlerHandle {
    events: mpsc::Receiver<BundlerEvent>,
    child: Option<Child>,
}

impl BundlerHandle {
    /// Wrap a bare event stream (used by in-process test bundlers).
    #[must_use]
    pub fn from_events(events: mpsc::Receiver<BundlerEvent>) -> Self {
        Self {
            events,
            child: None,
        }
    }

    /// Next event, or `None` once the bundler's stream closes.
    pub async fn next_event(&mut self) -> Option<BundlerEvent> {
        self.events.recv().await
    }

    /// Stop the bundler, killing the child process if one is attached.
    pub async fn shutdown(mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
    }
}

/// Bundler adapter driving an external executable.
#[derive(Debug, Clone)]
pub struct ProcessBundler {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessBundler {
    #[must_use]
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
        }
    }

    /// Append an argument to the bundler command line.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Bundler for ProcessBundler {
    fn start(&self, config: &BuildConfig) -> Result<BundlerHandle, Error> {
        let payload = serde_json::to_string(config)
            .map_err(|e| Error::other(format!("failed to serialize build config: {e}")))?;

        tracing::debug!("starting bundler: {}", self.program.display());

        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| Error::BundlerSpawn {
                program: self.program.clone(),
                source,
            })?;

        // Config goes over as one line; closing stdin signals end-of-config.
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                let _ = stdin.write_all(payload.as_bytes()).await;
                let _ = stdin.write_all(b"\n").await;
            });
        }

        let stdout = child
            .stdout
            .take()
            .ok_or(Error::BundlerClosed)?;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let event = match serde_json::from_str::<BundlerEvent>(&line) {
                    Ok(event) => event,
                    // Anything the bundler prints that is not an event is
                    // still its output; forward it untouched.
                    Err(_) => BundlerEvent::Diagnostic { message: line },
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(BundlerHandle {
            events: rx,
            child: Some(child),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        assert_eq!(
            serde_json::from_str::<BundlerEvent>(r#"{"type":"rebuilt"}"#).unwrap(),
            BundlerEvent::Rebuilt
        );
        assert_eq!(
            serde_json::from_str::<BundlerEvent>(
                r#"{"type":"diagnostic","message":"TS2304: cannot find name"}"#
            )
            .unwrap(),
            BundlerEvent::Diagnostic {
                message: "TS2304: cannot find name".to_string()
            }
        );
        assert!(serde_json::from_str::<BundlerEvent>(r#"{"type":"unknown"}"#).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_bundler_streams_events() {
        use crate::entries::EntryMap;
        use crate::paths::ToolLayout;
        use crate::pipeline::RuleSet;
        use std::path::Path;

        let layout = ToolLayout::from_root(PathBuf::from("/opt/reel"));
        let entries = EntryMap::build(Path::new("/work/scene.ts"), false, &layout.ui_entry());
        let config = BuildConfig::assemble(entries, RuleSet::standard(&layout), &layout);

        let bundler = ProcessBundler::new(PathBuf::from("/bin/sh"))
            .arg("-c")
            .arg(r#"echo '{"type":"rebuilt"}'; echo 'plain text line'"#);

        let mut handle = bundler.start(&config).unwrap();

        assert_eq!(handle.next_event().await, Some(BundlerEvent::Rebuilt));
        assert_eq!(
            handle.next_event().await,
            Some(BundlerEvent::Diagnostic {
                message: "plain text line".to_string()
            })
        );
        assert_eq!(handle.next_event().await, None);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        use crate::paths::ToolLayout;
        let layout = ToolLayout::from_root(PathBuf::from("/opt/reel"));
        let entries = crate::entries::EntryMap::build(
            std::path::Path::new("/work/scene.ts"),
            false,
            &layout.ui_entry(),
        );
        let config = BuildConfig::assemble(
            entries,
            crate::pipeline::RuleSet::standard(&layout),
            &layout,
        );

        let bundler = ProcessBundler::new(PathBuf::from("/definitely/not/a/bundler"));
        match bundler.start(&config) {
            Err(Error::BundlerSpawn { program, .. }) => {
                assert_eq!(program, PathBuf::from("/definitely/not/a/bundler"));
            }
            other => panic!("expected spawn error, got {other:?}"),
        }
    }
}
