#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use serde_json::Value;
use tokio::net::TcpListener;

/// Mock upstream that replays scripted responses in order, repeating the last
/// one once the script runs out, and records every request it sees.
#[derive(Clone, Default)]
pub struct MockUpstream {
    script: Arc<Mutex<VecDeque<(StatusCode, String)>>>,
    hits: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl MockUpstream {
    pub fn new(script: Vec<(StatusCode, String)>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Self::default()
        }
    }

    pub fn json(status: StatusCode, body: Value) -> Self {
        Self::new(vec![(status, body.to_string())])
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }

    /// Serves on an ephemeral local port and returns the base URL.
    pub async fn start(&self) -> String {
        let router = Router::new()
            .fallback(respond)
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        format!("http://{addr}")
    }
}

async fn respond(State(mock): State<MockUpstream>, uri: Uri, body: Bytes) -> impl IntoResponse {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    mock.paths.lock().unwrap().push(uri.path().to_string());
    if let Ok(value) = serde_json::from_slice::<Value>(&body) {
        mock.bodies.lock().unwrap().push(value);
    }

    let mut script = mock.script.lock().unwrap();
    let next = if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    };
    let (status, body) = next.unwrap_or((StatusCode::OK, String::new()));

    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body,
    )
}

pub fn results_page(rows: usize) -> String {
    let results: Vec<Value> = (0..rows)
        .map(|i| serde_json::json!({ "Award ID": format!("AWARD{i:06}"), "Award Amount": 1000.0 }))
        .collect();
    serde_json::json!({
        "results": results,
        "page_metadata": { "page": 1, "hasNext": false }
    })
    .to_string()
}
