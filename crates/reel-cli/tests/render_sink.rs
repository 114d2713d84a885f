//! Integration tests for the render sink and dev-server routing.
//!
//! Each test mounts the real router on an ephemeral port and drives it over
//! HTTP, the way external render clients do.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reel_cli::serve::{router, ReloadHub};
use std::net::SocketAddr;
use std::path::PathBuf;

async fn spawn_server(output_dir: PathBuf, public_dir: PathBuf) -> SocketAddr {
    let app = router(output_dir, public_dir, ReloadHub::new());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

fn render_url(addr: SocketAddr, name: &str) -> String {
    format!("http://{addr}/render/{name}")
}

#[tokio::test]
async fn test_upload_writes_decoded_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("renders");
    std::fs::create_dir_all(&output).unwrap();

    let addr = spawn_server(output.clone(), dir.path().join("public")).await;

    // Scenario: base64 "aGVsbG8=" lands as the bytes `hello`.
    let response = reqwest::Client::new()
        .put(render_url(addr, "out.bin"))
        .body("aGVsbG8=")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "");
    assert_eq!(std::fs::read(output.join("out.bin")).unwrap(), b"hello");
}

#[tokio::test]
async fn test_round_trip_binary_payload() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().to_path_buf();
    let addr = spawn_server(output.clone(), dir.path().join("public")).await;

    let payload: Vec<u8> = (0u8..=255).cycle().take(64 * 1024).collect();

    let response = reqwest::Client::new()
        .post(render_url(addr, "frame001"))
        .body(STANDARD.encode(&payload))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(std::fs::read(output.join("frame001")).unwrap(), payload);
}

#[tokio::test]
async fn test_chunked_upload_splits_quanta() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().to_path_buf();
    let addr = spawn_server(output.clone(), dir.path().join("public")).await;

    // Frames split the base64 text mid-quantum; the sink must reassemble.
    let encoded = STANDARD.encode(b"frame payload bytes");
    let chunks: Vec<Result<String, std::io::Error>> = encoded
        .as_bytes()
        .chunks(5)
        .map(|c| Ok(String::from_utf8(c.to_vec()).unwrap()))
        .collect();

    let response = reqwest::Client::new()
        .put(render_url(addr, "chunked.bin"))
        .body(reqwest::Body::wrap_stream(futures::stream::iter(chunks)))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        std::fs::read(output.join("chunked.bin")).unwrap(),
        b"frame payload bytes"
    );
}

#[tokio::test]
async fn test_reupload_overwrites_last_writer_wins() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().to_path_buf();
    let addr = spawn_server(output.clone(), dir.path().join("public")).await;

    let client = reqwest::Client::new();

    let first = client
        .put(render_url(addr, "frame.bin"))
        .body(STANDARD.encode(b"a much longer first payload"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let second = client
        .put(render_url(addr, "frame.bin"))
        .body(STANDARD.encode(b"short"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 200);

    // No merging, no atomicity guarantee: the last writer's bytes are all
    // that remain.
    assert_eq!(std::fs::read(output.join("frame.bin")).unwrap(), b"short");
}

#[tokio::test]
async fn test_path_traversal_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    std::fs::create_dir_all(&output).unwrap();
    let addr = spawn_server(output.clone(), dir.path().join("public")).await;

    let client = reqwest::Client::new();

    // Dot-segment names that survive client-side URL normalization: the
    // encoded separator keeps each probe a single URL segment on the wire.
    for name in ["..%2F..%2Fetc%2Fpasswd", "..%2Fescape", "a%2Fb", "a%5Cb"] {
        let response = client
            .put(render_url(addr, name))
            .body("aGVsbG8=")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "name {name} must be rejected");
    }

    // Nothing escaped the output directory.
    assert!(!dir.path().join("etc").exists());
    assert!(std::fs::read_dir(&output).unwrap().next().is_none());
}

#[tokio::test]
async fn test_malformed_base64_is_a_structured_400() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_server(dir.path().to_path_buf(), dir.path().join("public")).await;

    let response = reqwest::Client::new()
        .put(render_url(addr, "bad.bin"))
        .body("this is !!! not base64 ???")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body = response.text().await.unwrap();
    assert!(body.contains("base64"), "unexpected body: {body}");
}

#[tokio::test]
async fn test_unwritable_destination_is_a_structured_500() {
    let dir = tempfile::tempdir().unwrap();
    // The output directory vanished after startup: the open fails and the
    // client gets a structured error, not a hung connection.
    let missing = dir.path().join("deleted").join("later");
    let addr = spawn_server(missing, dir.path().join("public")).await;

    let response = reqwest::Client::new()
        .put(render_url(addr, "frame.bin"))
        .body("aGVsbG8=")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body = response.text().await.unwrap();
    assert!(body.contains("opening"), "unexpected body: {body}");
}

#[tokio::test]
async fn test_static_fallback_never_intercepts_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let public = dir.path().join("public");
    std::fs::create_dir_all(&output).unwrap();
    // A static file shadowing the upload path must not matter: the sink
    // route is consulted before static-file handling.
    std::fs::create_dir_all(public.join("render")).unwrap();
    std::fs::write(public.join("render").join("frame.bin"), b"static").unwrap();
    std::fs::write(public.join("index.html"), b"<html>reel</html>").unwrap();

    let addr = spawn_server(output.clone(), public).await;
    let client = reqwest::Client::new();

    let upload = client
        .put(render_url(addr, "frame.bin"))
        .body(STANDARD.encode(b"uploaded"))
        .send()
        .await
        .unwrap();
    assert_eq!(upload.status(), 200);
    assert_eq!(std::fs::read(output.join("frame.bin")).unwrap(), b"uploaded");

    // Static serving still works for everything else.
    let page = client
        .get(format!("http://{addr}/index.html"))
        .send()
        .await
        .unwrap();
    assert_eq!(page.status(), 200);
    assert_eq!(page.text().await.unwrap(), "<html>reel</html>");
}

#[tokio::test]
async fn test_concurrent_uploads_to_distinct_names() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().to_path_buf();
    let addr = spawn_server(output.clone(), dir.path().join("public")).await;

    let client = reqwest::Client::new();
    let mut tasks = Vec::new();

    for i in 0..8u32 {
        let client = client.clone();
        let url = render_url(addr, &format!("frame{i:03}"));
        let payload = format!("payload number {i}").into_bytes();
        tasks.push(tokio::spawn(async move {
            let response = client
                .put(url)
                .body(STANDARD.encode(&payload))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 200);
            payload
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let payload = task.await.unwrap();
        let written = std::fs::read(output.join(format!("frame{i:03}"))).unwrap();
        assert_eq!(written, payload);
    }
}

#[tokio::test]
async fn test_output_path_joins_name_verbatim() {
    // The accepted name is used verbatim under the output directory; dots
    // that do not form a `..` segment are legal file names.
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().to_path_buf();
    let addr = spawn_server(output.clone(), dir.path().join("public")).await;

    let response = reqwest::Client::new()
        .put(render_url(addr, "..frame.bin"))
        .body("aGVsbG8=")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        std::fs::read(output.join("..frame.bin")).unwrap(),
        b"hello"
    );
}
