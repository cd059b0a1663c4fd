//! # Sextant Test
//!
//! In-memory testing for Sextant services. Requests go through
//! [`Server::dispatch`](sextant_server::Server::dispatch), so routing,
//! request ids, timeouts and the error policy all apply, but no port is
//! bound.
//!
//! ## Example
//!
//! ```ignore
//! use sextant_test::TestClient;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn create_job() {
//!     let mut server = Server::builder().build();
//!     server.register(JobsApi::default()).unwrap();
//!     let client = TestClient::new(server);
//!
//!     let response = client
//!         .post("/JobsApi/create")
//!         .json(&json!({"name": "build"}))
//!         .send()
//!         .await;
//!
//!     response
//!         .assert_status(StatusCode::OK)
//!         .assert_json_eq(&json!({"id": 1, "name": "build"}));
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
