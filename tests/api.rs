//! Integration tests for the JSON API of a running daemon.

use reqwest::StatusCode;
use serde_json::json;

use ephca::ca::{CaId, Certificate};
use ephca::test::{TEST_API_KEY, test_csr, unrelated_certificate_pem};

mod common;
use common::{EphcaServer, expect_error};


#[tokio::test]
async fn health_needs_no_key() {
    let (server, _tempdir) = EphcaServer::start().await;

    let res = server.get("health").await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.get("health/").await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_sign_validate() {
    let (server, _tempdir) = EphcaServer::start().await;

    let ca = server.create_ca("Integration CA").await;
    let id: CaId = ca.id.parse().unwrap();
    assert_eq!(id.to_string(), ca.id);

    let root = Certificate::from_pem(ca.crt.as_bytes()).unwrap();
    assert_eq!(root.subject(), "CN=Integration CA");
    assert_eq!(root.issuer(), "CN=Integration CA");

    let (_, csr) = test_csr("client.example");
    let csr_pem = String::from_utf8(csr.to_pem().unwrap()).unwrap();
    let issued = server.sign(&ca.id, &csr_pem).await;

    let leaf = Certificate::from_pem(issued.crt.as_bytes()).unwrap();
    assert_eq!(leaf.subject(), "CN=client.example");
    assert_eq!(leaf.issuer(), "CN=Integration CA");

    assert!(server.validate(&ca.id, &issued.crt).await);
    assert!(!server.validate(&ca.id, &unrelated_certificate_pem()).await);

    // A certificate of one authority is not valid for another.
    let other = server.create_ca("Other CA").await;
    assert!(!server.validate(&other.id, &issued.crt).await);

    assert_eq!(server.list_certs(&ca.id).await, vec![leaf.serial_hex().unwrap()]);
    assert!(server.list_certs(&other.id).await.is_empty());
}

#[tokio::test]
async fn api_key_is_required() {
    let (server, _tempdir) = EphcaServer::start().await;
    let body = json!({ "common_name": "Nope" });

    let res = server.post_with_key("crypto/ca", None, &body).await;
    let err = expect_error(res, StatusCode::FORBIDDEN).await;
    assert_eq!(err.msg, "Unauthorized");

    let res = server.post_with_key("crypto/ca", Some("wrong secret"), &body).await;
    expect_error(res, StatusCode::FORBIDDEN).await;

    let wrong_length = format!("{}-and-more", TEST_API_KEY);
    let res = server.post_with_key("crypto/ca", Some(&wrong_length), &body).await;
    expect_error(res, StatusCode::FORBIDDEN).await;
}

#[tokio::test]
async fn bad_requests() {
    let (server, _tempdir) = EphcaServer::start().await;

    let res = server.post_raw("crypto/ca", "this is not json").await;
    let err = expect_error(res, StatusCode::BAD_REQUEST).await;
    assert_eq!(err.label, "api-invalid-json");

    let res = server.post_raw("crypto/ca", r#"{"name":"missing field"}"#).await;
    expect_error(res, StatusCode::BAD_REQUEST).await;

    let res = server.post_raw("crypto/ca", r#"{"common_name":"   "}"#).await;
    let err = expect_error(res, StatusCode::BAD_REQUEST).await;
    assert_eq!(err.label, "api-invalid-common-name");

    let (_, csr) = test_csr("client.example");
    let csr_pem = String::from_utf8(csr.to_pem().unwrap()).unwrap();
    let body = json!({ "id": "../../etc/passwd", "csr": csr_pem });
    let res = server.post_with_key("crypto/csr", Some(TEST_API_KEY), &body).await;
    let err = expect_error(res, StatusCode::BAD_REQUEST).await;
    assert_eq!(err.label, "api-invalid-ca-id");

    let ca = server.create_ca("Strict CA").await;
    let body = json!({ "id": ca.id, "csr": "-----BEGIN CERTIFICATE REQUEST-----\nnope\n" });
    let res = server.post_with_key("crypto/csr", Some(TEST_API_KEY), &body).await;
    let err = expect_error(res, StatusCode::INTERNAL_SERVER_ERROR).await;
    assert_eq!(err.label, "crypto-invalid-csr");

    let body = json!({ "id": ca.id, "crt": "garbage" });
    let res = server.post_with_key("crypto/validate", Some(TEST_API_KEY), &body).await;
    let err = expect_error(res, StatusCode::INTERNAL_SERVER_ERROR).await;
    assert_eq!(err.label, "crypto-invalid-certificate");
}

#[tokio::test]
async fn unknown_ca_and_paths() {
    let (server, _tempdir) = EphcaServer::start().await;

    let (_, csr) = test_csr("client.example");
    let csr_pem = String::from_utf8(csr.to_pem().unwrap()).unwrap();
    let unknown = CaId::random().to_string();
    let body = json!({ "id": unknown, "csr": csr_pem });
    let res = server.post_with_key("crypto/csr", Some(TEST_API_KEY), &body).await;
    let err = expect_error(res, StatusCode::NOT_FOUND).await;
    assert_eq!(err.label, "ca-unknown");
    assert_eq!(err.args.get("ca"), Some(&unknown));

    let body = json!({ "id": unknown });
    let res = server.post_with_key("crypto/certs", Some(TEST_API_KEY), &body).await;
    expect_error(res, StatusCode::NOT_FOUND).await;

    let res = server.get("crypto/unknown").await;
    expect_error(res, StatusCode::NOT_FOUND).await;

    let res = server.get("crypto/ca/extra").await;
    expect_error(res, StatusCode::NOT_FOUND).await;

    let res = server.get("").await;
    expect_error(res, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn wrong_method() {
    let (server, _tempdir) = EphcaServer::start().await;

    let res = server.get("crypto/ca").await;
    let err = expect_error(res, StatusCode::METHOD_NOT_ALLOWED).await;
    assert_eq!(err.label, "api-method-not-allowed");

    let res = server.post_raw("health", "{}").await;
    expect_error(res, StatusCode::METHOD_NOT_ALLOWED).await;
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let (server, _tempdir) = EphcaServer::start().await;

    let name = "x".repeat(ephca::constants::HTTP_POST_LIMIT_API as usize + 1);
    let body = serde_json::to_vec(&json!({ "common_name": name })).unwrap();

    let res = server.post_raw("crypto/ca", body.clone()).await;
    let err = expect_error(res, StatusCode::PAYLOAD_TOO_LARGE).await;
    assert_eq!(err.label, "api-post-body-exceeds-limit");

    // Without a Content-Length the body is cut off while reading.
    let status_line = server.post_chunked("crypto/ca", body).await;
    assert!(status_line.starts_with("HTTP/1.1 413"), "got: {}", status_line);
}
