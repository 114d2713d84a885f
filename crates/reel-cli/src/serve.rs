//! Dev-server orchestration.
//!
//! A [`ServeSession`] owns everything one `reel` invocation runs: the
//! assembled build configuration, the external bundler child, the reload
//! broadcast, and the HTTP server. The render sink is registered as a route
//! and static files only as the router fallback, so upload requests are
//! never intercepted by static-file handling.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use miette::{IntoDiagnostic, Result};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use reel_core::{
    resolve_paths, BuildConfig, Bundler, BundlerEvent, EntryMap, ProcessBundler, RuleSet,
    ToolLayout,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;

/// Fixed listening port (not configurable via flags).
pub const PORT: u16 = 9000;

/// One `reel` invocation's inputs.
#[derive(Debug, Clone)]
pub struct ServeAction {
    /// Project entry file.
    pub project: PathBuf,
    /// Also bundle the companion UI.
    pub ui: bool,
    /// Destination directory for rendered artifacts.
    pub output: PathBuf,
    /// Working directory.
    pub cwd: PathBuf,
}

/// Messages pushed to connected reload clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReloadMessage {
    Connected,
    Reload,
}

impl ReloadMessage {
    fn to_json(self) -> String {
        match self {
            Self::Connected => r#"{"type":"connected"}"#.to_string(),
            Self::Reload => r#"{"type":"reload"}"#.to_string(),
        }
    }
}

/// Fan-out point for reload notifications.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Tell every connected client to reload.
    pub fn notify(&self) {
        let _ = self.tx.send(ReloadMessage::Reload);
    }

    fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.tx.subscribe()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the full dev-server router: sink routes first, reload websocket,
/// static fallback, compression.
#[must_use]
pub fn router(output_dir: PathBuf, public_dir: PathBuf, reload: ReloadHub) -> Router {
    Router::new()
        .route("/__reload", get(reload_websocket))
        .with_state(Arc::new(reload))
        .merge(crate::sink::router(output_dir))
        .fallback_service(ServeDir::new(public_dir))
        .layer(CompressionLayer::new())
}

/// Handle to stop a running session.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(watch::Sender<bool>);

impl ShutdownHandle {
    pub fn stop(&self) {
        let _ = self.0.send(true);
    }
}

/// A caller-owned serve session: built once, started once, stoppable.
pub struct ServeSession {
    config: BuildConfig,
    output_dir: PathBuf,
    public_dir: PathBuf,
    bundler: Box<dyn Bundler + Send>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ServeSession {
    /// Resolve paths, build the entry set, and assemble the configuration.
    #[must_use]
    pub fn new(action: &ServeAction, layout: &ToolLayout, bundler: Box<dyn Bundler + Send>) -> Self {
        let paths = resolve_paths(&action.cwd, &action.project, &action.output);
        let entries = EntryMap::build(&paths.project_entry, action.ui, &layout.ui_entry());
        let config = BuildConfig::assemble(entries, RuleSet::standard(layout), layout);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            output_dir: paths.output_dir,
            public_dir: layout.public_dir(),
            bundler,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// The configuration that will be handed to the bundler.
    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Directory render uploads land in.
    #[must_use]
    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }

    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown_tx.clone())
    }

    /// Start the bundler and serve until shutdown.
    ///
    /// Startup failure (port already bound, bundler missing) is fatal: it is
    /// returned to the caller, reported on the error channel, and nothing
    /// retries or falls back to another port.
    pub async fn run(self) -> Result<()> {
        let Self {
            config,
            output_dir,
            public_dir,
            bundler,
            shutdown_tx,
            shutdown_rx,
        } = self;

        // The sink writes here from the first upload on.
        tokio::fs::create_dir_all(&output_dir).await.into_diagnostic()?;

        let mut handle = bundler.start(&config).into_diagnostic()?;

        let reload = ReloadHub::new();

        // Bundler events drive reloads; diagnostics pass through verbatim.
        let bundler_reload = reload.clone();
        let mut bundler_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = handle.next_event() => match event {
                        Some(BundlerEvent::Rebuilt) => bundler_reload.notify(),
                        Some(BundlerEvent::Diagnostic { message }) => eprintln!("{message}"),
                        None => return,
                    },
                    _ = bundler_shutdown.changed() => break,
                }
            }
            handle.shutdown().await;
        });

        // Static assets are served as-is, so a change to them reloads too.
        let (fs_tx, mut fs_rx) = mpsc::channel::<()>(16);
        let watched = public_dir.clone();
        std::thread::spawn(move || {
            if let Err(e) = watch_static(&watched, &fs_tx) {
                eprintln!("  Watch error: {e}");
            }
        });
        let fs_reload = reload.clone();
        tokio::spawn(async move {
            while fs_rx.recv().await.is_some() {
                fs_reload.notify();
            }
        });

        let app = router(output_dir, public_dir, reload);

        let addr: SocketAddr = ([127, 0, 0, 1], PORT).into();
        let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;

        println!();
        println!("  Dev server running at http://localhost:{PORT}");
        println!("  Render sink at http://localhost:{PORT}/render/:name");
        println!();
        println!("  Press Ctrl+C to stop");
        println!();

        let mut shutdown = shutdown_rx;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .into_diagnostic()?;

        drop(shutdown_tx);
        Ok(())
    }
}

/// Run one invocation end to end with the shipped bundler.
pub async fn run(action: ServeAction) -> Result<()> {
    let layout = ToolLayout::discover();
    let bundler = ProcessBundler::new(layout.bundler_program());
    let session = ServeSession::new(&action, &layout, Box::new(bundler));

    let shutdown = session.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.stop();
        }
    });

    session.run().await
}

// ============================================================================
// Reload WebSocket
// ============================================================================

async fn reload_websocket(
    ws: WebSocketUpgrade,
    State(reload): State<Arc<ReloadHub>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_reload_socket(socket, reload))
}

async fn handle_reload_socket(mut socket: WebSocket, reload: Arc<ReloadHub>) {
    let mut rx = reload.subscribe();

    let _ = socket
        .send(Message::Text(ReloadMessage::Connected.to_json()))
        .await;

    while let Ok(msg) = rx.recv().await {
        if socket.send(Message::Text(msg.to_json())).await.is_err() {
            break;
        }
    }
}

// ============================================================================
// Static-Asset Watching
// ============================================================================

/// Watch the public directory and signal debounced changes.
fn watch_static(dir: &std::path::Path, changes: &mpsc::Sender<()>) -> notify::Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();

    let mut watcher = RecommendedWatcher::new(tx, Config::default())?;
    watcher.watch(dir, RecursiveMode::Recursive)?;

    let mut last_change = std::time::Instant::now();

    loop {
        match rx.recv() {
            Ok(Ok(event)) => {
                if event.paths.is_empty() {
                    continue;
                }

                let now = std::time::Instant::now();
                if now.duration_since(last_change).as_millis() < 50 {
                    continue;
                }
                last_change = now;

                if changes.blocking_send(()).is_err() {
                    break;
                }
            }
            Ok(Err(e)) => {
                eprintln!("  Watch error: {e}");
            }
            Err(_) => break,
        }
    }

    Ok(())
}
