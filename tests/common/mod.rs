#![allow(dead_code)] // Different tests use different parts.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::TempDir;

use ephca::api::{
    CaInit, CaInitResponse, CertificateList, CertificateListRequest, CsrSubmission,
    ErrorResponse, IssuedCertificate, ValidationRequest, ValidationResponse,
};
use ephca::storage::StorageType;
use ephca::test::{TEST_API_KEY, start_test_server};


//------------ EphcaServer ---------------------------------------------------

/// A running test daemon and a client to talk to it.
pub struct EphcaServer {
    base: String,
    client: reqwest::Client,
}

impl EphcaServer {
    /// Starts a daemon with memory storage.
    ///
    /// The temporary directory must be kept alive for as long as the
    /// server is used.
    pub async fn start() -> (Self, TempDir) {
        let tempdir = TempDir::new().unwrap();
        let server = Self::start_in(StorageType::Memory, tempdir.path()).await;
        (server, tempdir)
    }

    /// Starts a daemon with the given storage under `data_dir`.
    pub async fn start_in(storage_type: StorageType, data_dir: &Path) -> Self {
        EphcaServer {
            base: start_test_server(storage_type, data_dir).await,
            client: reqwest::Client::new(),
        }
    }

    pub fn uri(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.uri(path)).send().await.unwrap()
    }

    /// Posts a raw body with the test API key.
    pub async fn post_raw(&self, path: &str, body: impl Into<reqwest::Body>) -> reqwest::Response {
        self.client
            .post(self.uri(path))
            .header("X-API-Key", TEST_API_KEY)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap()
    }

    /// Posts a body with chunked transfer encoding over a plain socket.
    ///
    /// Returns the status line of the response.
    pub async fn post_chunked(&self, path: &str, body: Vec<u8>) -> String {
        let addr = self.base.trim_start_matches("http://").trim_end_matches('/').to_string();
        let request = format!(
            "POST /{} HTTP/1.1\r\n\
             Host: {}\r\n\
             X-API-Key: {}\r\n\
             Content-Type: application/json\r\n\
             Transfer-Encoding: chunked\r\n\
             Connection: close\r\n\r\n\
             {:x}\r\n",
            path,
            addr,
            TEST_API_KEY,
            body.len()
        );

        tokio::task::spawn_blocking(move || {
            let mut stream = TcpStream::connect(&addr).unwrap();
            // The server may answer and hang up before it has read it all.
            for part in [request.as_bytes(), &body[..], &b"\r\n0\r\n\r\n"[..]] {
                if stream.write_all(part).is_err() {
                    break;
                }
            }

            let mut response = Vec::new();
            let mut buf = [0u8; 1024];
            while !response.windows(2).any(|w| w == b"\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => response.extend_from_slice(&buf[..n]),
                }
            }
            let response = String::from_utf8_lossy(&response).to_string();
            response.lines().next().unwrap_or_default().to_string()
        })
        .await
        .unwrap()
    }

    /// Posts a JSON body with an optional API key.
    pub async fn post_with_key(
        &self,
        path: &str,
        key: Option<&str>,
        body: &impl Serialize,
    ) -> reqwest::Response {
        let mut req = self.client.post(self.uri(path)).json(body);
        if let Some(key) = key {
            req = req.header("X-API-Key", key);
        }
        req.send().await.unwrap()
    }

    /// Posts a JSON body and expects a successful JSON response.
    pub async fn post_ok<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> T {
        let res = self.post_with_key(path, Some(TEST_API_KEY), body).await;
        assert_eq!(res.status(), StatusCode::OK, "POST {} failed", path);
        res.json().await.unwrap()
    }

    pub async fn create_ca(&self, common_name: &str) -> CaInitResponse {
        self.post_ok("crypto/ca", &CaInit { common_name: common_name.into() }).await
    }

    pub async fn sign(&self, id: &str, csr: &str) -> IssuedCertificate {
        self.post_ok("crypto/csr", &CsrSubmission { id: id.into(), csr: csr.into() }).await
    }

    pub async fn validate(&self, id: &str, crt: &str) -> bool {
        let res: ValidationResponse = self
            .post_ok("crypto/validate", &ValidationRequest { id: id.into(), crt: crt.into() })
            .await;
        res.valid
    }

    pub async fn list_certs(&self, id: &str) -> Vec<String> {
        let res: CertificateList = self
            .post_ok("crypto/certs", &CertificateListRequest { id: id.into() })
            .await;
        res.serials
    }
}

/// Checks the status of an error response and returns its body.
pub async fn expect_error(res: reqwest::Response, status: StatusCode) -> ErrorResponse {
    assert_eq!(res.status(), status);
    res.json().await.unwrap()
}
