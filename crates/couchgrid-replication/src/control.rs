//! Generic request primitive against one node's database control API.
//!
//! Every higher-level operation (ping, create database, manage replicator
//! documents) is expressed as `method, path, credentials, body -> response`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use couchgrid_core::Credentials;
use http_body_util::{BodyExt, Full};
use serde_json::Value;
use tracing::debug;

use crate::error::{ControlError, ControlResult};

/// Status and decoded JSON body of one control call.
///
/// A body that is empty or not JSON decodes to `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlResponse {
    pub status: u16,
    pub body: Value,
}

impl ControlResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues requests against a node's control API.
///
/// Only transport failures are errors; every HTTP status comes back as a
/// [`ControlResponse`] so callers decide what each code means.
#[async_trait]
pub trait CouchControl: Send + Sync {
    async fn request(
        &self,
        method: http::Method,
        address: &str,
        path: &str,
        credentials: Option<&Credentials>,
        body: Option<&Value>,
    ) -> ControlResult<ControlResponse>;
}

/// Plain HTTP/1.1 client, one connection per request.
#[derive(Debug, Clone)]
pub struct HttpControl {
    timeout: Duration,
}

impl HttpControl {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpControl {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// `Authorization` header value for basic auth.
pub fn basic_auth(credentials: &Credentials) -> String {
    let raw = format!("{}:{}", credentials.username, credentials.password);
    format!("Basic {}", STANDARD.encode(raw))
}

#[async_trait]
impl CouchControl for HttpControl {
    async fn request(
        &self,
        method: http::Method,
        address: &str,
        path: &str,
        credentials: Option<&Credentials>,
        body: Option<&Value>,
    ) -> ControlResult<ControlResponse> {
        let uri = format!("http://{address}{path}");
        let request_error = |reason: String| ControlError::Request {
            address: address.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            reason,
        };

        let mut builder = http::Request::builder()
            .method(method.clone())
            .uri(&uri)
            .header("host", address)
            .header("accept", "application/json")
            .header("user-agent", "couchgrid/0.1");
        if let Some(creds) = credentials {
            builder = builder.header("authorization", basic_auth(creds));
        }
        let payload = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Bytes::from(
                    serde_json::to_vec(value).map_err(|e| request_error(e.to_string()))?,
                )
            }
            None => Bytes::new(),
        };
        let req = builder
            .body(Full::new(payload))
            .map_err(|e| request_error(e.to_string()))?;

        let exchange = async {
            let stream = tokio::net::TcpStream::connect(address)
                .await
                .map_err(|e| ControlError::Connect {
                    address: address.to_string(),
                    reason: e.to_string(),
                })?;
            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| ControlError::Connect {
                    address: address.to_string(),
                    reason: e.to_string(),
                })?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| request_error(e.to_string()))?;
            let status = resp.status().as_u16();
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| request_error(e.to_string()))?
                .to_bytes();
            Ok::<_, ControlError>((status, bytes))
        };

        let (status, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ControlError::Connect {
                address: address.to_string(),
                reason: format!("timed out after {:?}", self.timeout),
            })??;

        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        debug!(%method, %uri, status, "control call");
        Ok(ControlResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one connection, capture the request head, reply with `response`.
    async fn one_shot_server(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut seen = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                seen.extend_from_slice(&buf[..n]);
                if n == 0 || seen.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&seen).into_owned()
        });
        (address, handle)
    }

    #[test]
    fn basic_auth_encodes_pair() {
        let header = basic_auth(&Credentials::new("alice", "s3cret"));
        assert_eq!(header, "Basic YWxpY2U6czNjcmV0");
    }

    #[tokio::test]
    async fn request_sends_auth_and_decodes_json() {
        let (address, server) = one_shot_server(
            "HTTP/1.1 201 Created\r\ncontent-type: application/json\r\ncontent-length: 11\r\nconnection: close\r\n\r\n{\"ok\":true}",
        )
        .await;

        let creds = Credentials::new("alice", "s3cret");
        let resp = HttpControl::default()
            .request(http::Method::PUT, &address, "/orders", Some(&creds), None)
            .await
            .unwrap();
        assert_eq!(resp.status, 201);
        assert_eq!(resp.body, json!({"ok": true}));
        assert!(resp.is_success());

        let head = server.await.unwrap().to_ascii_lowercase();
        assert!(head.starts_with("put /orders http/1.1"));
        assert!(head.contains("authorization: basic ywxpy2u6cznjcmv0"));
    }

    #[tokio::test]
    async fn non_json_body_decodes_to_null() {
        let (address, server) = one_shot_server(
            "HTTP/1.1 404 Not Found\r\ncontent-length: 7\r\nconnection: close\r\n\r\nmissing",
        )
        .await;
        let resp = HttpControl::default()
            .request(http::Method::GET, &address, "/_replicator/x", None, None)
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, Value::Null);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = HttpControl::new(Duration::from_secs(2))
            .request(http::Method::GET, &address, "/", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Connect { .. }));
        assert!(err.is_connectivity());
    }
}
