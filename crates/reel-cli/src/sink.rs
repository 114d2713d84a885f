//! Render-ingestion endpoint.
//!
//! `PUT/POST /render/:name` accepts a base64-encoded byte stream and persists
//! the decoded bytes at `output_dir/name`. The body is decoded and written as
//! it arrives — the whole payload is never buffered, and the next body frame
//! is not pulled until the previous write has completed, so the destination's
//! write capacity governs how fast the source is drained.
//!
//! Each upload moves through an explicit state machine:
//! Receiving → Writing (per frame) → Completed, or Failed from either state
//! on a decode or I/O error. Failures produce a structured error response
//! (400 for malformed base64, 500 for I/O) rather than letting the stream
//! fault propagate and hanging the client.
//!
//! `name` is untrusted: it must be a single path segment, so empty names,
//! separators, and `..` are rejected outright instead of being joined into
//! the output path unchecked. The happy path performs no payload validation.
//!
//! Concurrency: uploads to distinct names proceed independently. Two
//! concurrent uploads to the same name race on one destination path —
//! last-writer-wins via truncate-on-create, interleaving undefined, no
//! locking. A client disconnect mid-stream leaves a partial file behind with
//! no cleanup.

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::put;
use axum::Router;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Build the sink router bound to an output directory.
#[must_use]
pub fn router(output_dir: PathBuf) -> Router {
    Router::new()
        .route("/render/:name", put(receive).post(receive))
        .with_state(Arc::new(output_dir))
}

/// Where an I/O failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkPhase {
    /// Opening the destination file.
    Opening,
    /// Pushing decoded bytes to the destination.
    Writing,
}

impl SinkPhase {
    fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Writing => "writing",
        }
    }
}

/// A failed upload: which state it failed from, and why.
#[derive(Debug)]
enum SinkFailure {
    BadName(String),
    Body {
        message: String,
    },
    Decode {
        message: String,
    },
    Io {
        phase: SinkPhase,
        source: std::io::Error,
    },
}

impl SinkFailure {
    fn io(phase: SinkPhase, source: std::io::Error) -> Self {
        Self::Io { phase, source }
    }
}

impl IntoResponse for SinkFailure {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::BadName(name) => (
                StatusCode::BAD_REQUEST,
                format!("invalid render destination name: {name:?}"),
            ),
            Self::Body { message } => (
                StatusCode::BAD_REQUEST,
                format!("request body failed while receiving: {message}"),
            ),
            Self::Decode { message } => (
                StatusCode::BAD_REQUEST,
                format!("malformed base64 payload: {message}"),
            ),
            Self::Io { phase, source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("render write failed while {}: {source}", phase.as_str()),
            ),
        };
        tracing::warn!("{body}");
        (status, body).into_response()
    }
}

/// Handle one upload.
async fn receive(
    State(output_dir): State<Arc<PathBuf>>,
    UrlPath(name): UrlPath<String>,
    body: Body,
) -> Response {
    if !is_single_segment(&name) {
        return SinkFailure::BadName(name).into_response();
    }

    match write_stream(&output_dir.join(&name), body).await {
        // Stream end finalizes the response: empty body, default success.
        Ok(()) => StatusCode::OK.into_response(),
        Err(failure) => failure.into_response(),
    }
}

/// The destination name must stay inside the output directory: one non-empty
/// path segment, no separators, no `..`.
fn is_single_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Stream the body into `dest`, decoding base64 as it arrives.
async fn write_stream(dest: &Path, body: Body) -> Result<(), SinkFailure> {
    // Truncate-on-create is the whole concurrency story: last writer wins.
    let mut file = File::create(dest)
        .await
        .map_err(|e| SinkFailure::io(SinkPhase::Opening, e))?;

    let mut decoder = StreamingDecoder::default();
    let mut stream = body.into_data_stream();

    while let Some(frame) = stream.next().await {
        // State: Receiving. A body error here is a client disconnect; the
        // partially written destination is left as-is.
        let chunk = frame.map_err(|e| SinkFailure::Body {
            message: e.to_string(),
        })?;

        let decoded = decoder.push(&chunk).map_err(|e| SinkFailure::Decode {
            message: e.to_string(),
        })?;

        // State: Writing. Awaiting the write before pulling the next frame
        // is what propagates back-pressure to the source stream.
        file.write_all(&decoded)
            .await
            .map_err(|e| SinkFailure::io(SinkPhase::Writing, e))?;
    }

    let tail = decoder.finish().map_err(|e| SinkFailure::Decode {
        message: e.to_string(),
    })?;
    file.write_all(&tail)
        .await
        .map_err(|e| SinkFailure::io(SinkPhase::Writing, e))?;
    file.flush()
        .await
        .map_err(|e| SinkFailure::io(SinkPhase::Writing, e))?;

    // State: Completed.
    Ok(())
}

/// Incremental base64 decoder.
///
/// Frames split the base64 text at arbitrary byte offsets, so complete
/// 4-character quanta are decoded as they accumulate and the remainder is
/// carried into the next frame. Whitespace is tolerated anywhere; padding is
/// optional (the carry tail decodes without it at end of stream).
#[derive(Debug, Default)]
struct StreamingDecoder {
    carry: Vec<u8>,
}

impl StreamingDecoder {
    /// Decode the complete quanta available after appending `chunk`.
    fn push(&mut self, chunk: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
        self.carry.extend(
            chunk
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace() && *b != b'='),
        );

        let usable = self.carry.len() - self.carry.len() % 4;
        let decoded = STANDARD_NO_PAD.decode(&self.carry[..usable])?;
        self.carry.drain(..usable);
        Ok(decoded)
    }

    /// Decode the final partial quantum at end of stream.
    fn finish(self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD_NO_PAD.decode(&self.carry)
    }
}
