//! Serves a real socket and talks raw HTTP/1.1 to it.

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sextant_core::{Context, ServiceDescriptor, ServiceError};
use sextant_macros::service;
use sextant_server::{Server, ShutdownSignal};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Note {
    text: String,
}

#[derive(Default)]
struct Notes {
    notes: Mutex<Vec<String>>,
}

#[service]
impl Notes {
    pub fn add(&self, _ctx: &Context, note: Note) -> Result<Note, ServiceError> {
        if note.text.is_empty() {
            return Err(ServiceError::validation("text is required"));
        }
        self.notes.lock().push(note.text.clone());
        Ok(note)
    }

    pub fn count(&self, _ctx: &Context) -> Result<usize, ServiceError> {
        Ok(self.notes.lock().len())
    }
}

async fn send(addr: std::net::SocketAddr, raw: String) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8(response).unwrap()
}

fn post(path: &str, body: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\nhost: localhost\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn get(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n")
}

#[tokio::test]
async fn serves_service_over_tcp() {
    let mut notes = ServiceDescriptor::build(Notes::default()).unwrap();
    notes.post("/", "add").unwrap();

    let mut server = Server::builder().max_body_bytes(64).build();
    server.bind(&notes, "/notes").unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let handle = tokio::spawn(server.serve(listener, shutdown.clone()));

    let response = send(addr, post("/notes/", r#"{"text":"hello"}"#)).await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("x-request-id"));
    assert!(response.ends_with("{\"text\":\"hello\"}\n"), "{response}");

    let response = send(addr, get("/notes/count")).await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("1\n"), "{response}");

    let response = send(addr, post("/notes/", r#"{"text":""}"#)).await;
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");

    let oversized = format!(r#"{{"text":"{}"}}"#, "x".repeat(100));
    let response = send(addr, post("/notes/", &oversized)).await;
    assert!(response.starts_with("HTTP/1.1 413"), "{response}");

    let response = send(addr, get("/elsewhere")).await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn bind_error_is_reported() {
    let server = Server::builder().http_addr("not an address").build();
    let err = server
        .run_with_shutdown(ShutdownSignal::new())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Bind error"));
}
