use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use keel_configutil::parse_config;
use keel_server::{REQUEST_HEADER, Server};
use serde_json::Value;
use std::net::SocketAddr;
use tower::ServiceExt;

const CONFIG: &str = r#"
cluster_name = "keel-test"
service_only = "left for the embedding service"

listener "tcp" {
  address         = "127.0.0.1:0"
  tls_disable     = true
  max_request_size = 64

  custom_response_headers = {
    "default" = { "Server" = "keel" }
    "4xx"     = { "Cache-Control" = "no-store" }
  }
}

listener "tcp" {
  address                          = "127.0.0.1:0"
  tls_disable                      = true
  require_request_header           = true
  x_forwarded_for_authorized_addrs = "10.0.0.0/8"
}

seal "transit" {
  address = "https://vault:8200"
  token   = "s.very-secret"
}
"#;

fn server() -> Server {
    Server::builder().config(parse_config(CONFIG).unwrap()).build().unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_cluster_and_custom_headers() {
    let router = server().router(0).unwrap();
    let response = router
        .oneshot(Request::get("/v1/sys/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["server"], "keel");
    assert!(response.headers().get("cache-control").is_none());
    let body = json_body(response).await;
    assert_eq!(body["cluster_name"], "keel-test");
    assert_eq!(body["initialized"], true);
}

#[tokio::test]
async fn sanitized_config_hides_seal_values() {
    let router = server().router(0).unwrap();
    let response = router
        .oneshot(Request::get("/v1/sys/config/state/sanitized").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let rendered = json_body(response).await.to_string();
    assert!(rendered.contains("transit"));
    assert!(!rendered.contains("s.very-secret"));
}

#[tokio::test]
async fn oversized_body_is_rejected_with_headers() {
    let router = server().router(0).unwrap();
    let request = Request::post("/v1/sys/health")
        .header("content-length", "128")
        .body(Body::from(vec![b'x'; 128]))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.headers()["cache-control"], "no-store");
}

#[tokio::test]
async fn required_header_and_forwarded_for() {
    let router = server().router(1).unwrap();
    let peer: SocketAddr = "10.1.2.3:50000".parse().unwrap();

    let mut missing =
        Request::get("/v1/sys/health").header("x-forwarded-for", "203.0.113.9").body(Body::empty()).unwrap();
    missing.extensions_mut().insert(ConnectInfo(peer));
    let response = router.clone().oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let mut no_xff = Request::get("/v1/sys/health").header(REQUEST_HEADER, "true").body(Body::empty()).unwrap();
    no_xff.extensions_mut().insert(ConnectInfo(peer));
    let response = router.clone().oneshot(no_xff).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut forwarded = Request::get("/v1/sys/health")
        .header(REQUEST_HEADER, "true")
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::empty())
        .unwrap();
    forwarded.extensions_mut().insert(ConnectInfo(peer));
    let response = router.oneshot(forwarded).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn config_without_listeners_is_rejected() {
    let err = Server::builder().config(parse_config("cluster_name = \"x\"").unwrap()).build().unwrap_err();
    assert!(err.to_string().contains("no listener"));
}

#[test]
fn tls_listener_requires_files() {
    let config = parse_config(
        r#"
listener "tcp" {
  address       = "127.0.0.1:8200"
  tls_cert_file = "/no/such/cert.pem"
  tls_key_file  = "/no/such/key.pem"
}
"#,
    )
    .unwrap();
    let err = Server::builder().config(config).build().unwrap_err();
    assert!(format!("{err:#}").contains("TLS file not found"));
}

#[cfg(unix)]
#[tokio::test]
async fn failed_tcp_bind_stops_unix_listeners_too() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("keel.sock");

    let config = parse_config(&format!(
        r#"
listener "tcp" {{
  address     = "127.0.0.1:{port}"
  tls_disable = true
}}

listener "unix" {{
  address = "{}"
}}
"#,
        socket.display()
    ))
    .unwrap();
    let server = Server::builder().config(config).build().unwrap();

    let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), server.run())
        .await
        .expect("run should return once a listener fails");
    let err = outcome.unwrap_err();
    assert!(format!("{err:#}").contains("HTTP listener failed"));
    drop(taken);
}
