use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::get;
use http_body_util::BodyExt;
use keel_configutil::parse_config;
use keel_listenerutil::{
    ClientAddr, ListenerCustomHeaders, XffConfig, custom_headers_middleware, forwarded_for_middleware,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

const LISTENER: &str = r#"
listener "tcp" {
  address                          = "127.0.0.1:8200"
  x_forwarded_for_authorized_addrs = "127.0.0.1"
  x_forwarded_for_hop_skips        = 1

  custom_response_headers = {
    "default" = { "X-Frame-Options" = "deny", "Server" = "keel" }
    "4xx"     = { "Cache-Control" = "no-store" }
    "418"     = { "X-Teapot" = ["short", "stout"] }
  }
}
"#;

async fn echo_client(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> impl IntoResponse {
    let forwarded = request.extensions().get::<ClientAddr>().map(ToString::to_string).unwrap_or_default();
    ([("Server", "handler")], format!("{addr}|{forwarded}"))
}

fn app() -> Router {
    let listener = parse_config(LISTENER).unwrap().listeners.remove(0);
    let headers = Arc::new(ListenerCustomHeaders::new(&listener).unwrap());
    let xff = Arc::new(XffConfig::from_listener(&listener).unwrap());

    Router::new()
        .route("/", get(echo_client))
        .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }))
        .layer(from_fn_with_state(xff, forwarded_for_middleware))
        .layer(from_fn_with_state(headers, custom_headers_middleware))
}

fn request(uri: &str, peer: &str, xff: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(xff) = xff {
        builder = builder.header("X-Forwarded-For", xff);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request.extensions_mut().insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    request
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_forwarded_client_replaces_peer() {
    let response = app()
        .oneshot(request("/", "127.0.0.1:5555", Some("203.0.113.9, 10.0.0.2")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["server"], "keel");
    assert_eq!(response.headers()["x-frame-options"], "deny");
    assert!(response.headers().get("cache-control").is_none());
    assert_eq!(body_text(response).await, "203.0.113.9:5555|203.0.113.9:5555");
}

#[tokio::test]
async fn test_rejections_still_get_custom_headers() {
    let response = app().oneshot(request("/", "127.0.0.1:5555", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()["cache-control"], "no-store");
    assert!(body_text(response).await.contains("missing x-forwarded-for header"));

    let response = app().oneshot(request("/", "192.0.2.1:5555", Some("203.0.113.9, 10.0.0.2"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app().oneshot(request("/", "127.0.0.1:5555", Some("203.0.113.9"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("hops to skip (1)"));
}

#[tokio::test]
async fn test_exact_status_headers() {
    let response = app().oneshot(request("/teapot", "127.0.0.1:1", Some("198.51.100.1, 10.0.0.2"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(response.headers()["x-teapot"], "short; stout");
    assert_eq!(response.headers()["cache-control"], "no-store");
    assert_eq!(response.headers()["x-frame-options"], "deny");
}
