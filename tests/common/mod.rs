//! In-process stand-in for the platform API.

#![allow(dead_code)]

use axum::Router;
use axum::body::{Body, Bytes};
use axum::response::Response;
use futures::StreamExt;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use ml_label::{AccessToken, Client};

pub const TOKEN: &str = "APP_USR-test-token";

/// Serves `app` on an ephemeral port from a background runtime and returns its base URL.
pub fn serve(app: Router) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    format!("http://{}", addr)
}

pub fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

/// Writes a credentials file pointing at `api_url`. Keep the tempdir alive while using the path.
pub fn env_file(api_url: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(
        f,
        "# test credentials\nML_CLIENT_ID=1234\nML_CLIENT_SECRET=\"shh\"\nML_REFRESH_TOKEN='TG-refresh'\nML_API_URL={}",
        api_url
    )
    .unwrap();
    (dir, path)
}

pub fn client(api_url: &str) -> (tempfile::TempDir, Client) {
    let (dir, path) = env_file(api_url);
    let client = Client::from_env_file(&path).unwrap().with_progress(false);
    (dir, client)
}

pub fn token() -> AccessToken {
    AccessToken {
        token: TOKEN.to_string(),
        expires_in: Some(21600),
        token_type: Some("Bearer".to_string()),
    }
}

/// 200 response whose body starts with `prefix` and then breaks off.
pub fn broken_body(prefix: &'static str) -> Response {
    let head = futures::stream::once(async move { Ok::<_, std::io::Error>(Bytes::from_static(prefix.as_bytes())) });
    let tail = futures::stream::once(async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Err(std::io::Error::other("connection reset mid-body"))
    });
    Response::builder()
        .header("content-type", "application/json")
        .body(Body::from_stream(head.chain(tail)))
        .unwrap()
}
