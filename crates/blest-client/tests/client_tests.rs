//! Client round-trip tests against a live server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{extract::Json, http::HeaderMap, routing::post};
use serde_json::{json, Value};

use blest_client::{ClientError, ClientOptions, HttpClient};
use blest_core::{BlestError, Handler, JsonMap, Router, RouterOptions};

fn test_router() -> Router {
    let mut router = Router::new(RouterOptions::new().with_timeout_ms(1000));
    router
        .route(
            "greet",
            vec![Handler::controller(|body, _context| async move {
                let name = body.get("name").and_then(Value::as_str).unwrap_or("world");
                Ok(Some(json!({"greeting": format!("Hi, {name}!")})))
            })],
        )
        .unwrap();
    router
        .route(
            "alwaysFails",
            vec![Handler::controller(|_body, _context| async {
                Err(BlestError::new("nope").with_status(403).with_code("DENIED"))
            })],
        )
        .unwrap();
    router
}

/// Boots an axum app on an ephemeral port and returns its endpoint URL.
async fn spawn_server(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

/// App that counts POSTs, runs the batch, and optionally reverses the
/// response order before answering.
fn counting_app(router: Arc<Router>, hits: Arc<AtomicUsize>, reverse: bool) -> axum::Router {
    axum::Router::new().route(
        "/",
        post(move |headers: HeaderMap, Json(batch): Json<Vec<Value>>| {
            let router = router.clone();
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);

                let mut header_map = JsonMap::new();
                for (name, value) in &headers {
                    if let Ok(value) = value.to_str() {
                        header_map
                            .insert(name.as_str().to_string(), Value::String(value.to_string()));
                    }
                }
                let mut context = JsonMap::new();
                context.insert("headers".to_string(), Value::Object(header_map));

                let mut results = router.handle(&batch, &context).await.unwrap();
                if reverse {
                    results.reverse();
                }
                Json(serde_json::to_value(results).unwrap())
            }
        }),
    )
}

fn body(value: Value) -> Option<JsonMap> {
    value.as_object().cloned()
}

/// Test: concurrent calls inside the flush window share one HTTP POST
#[tokio::test]
async fn test_concurrent_calls_batch_into_one_post() {
    let hits = Arc::new(AtomicUsize::new(0));
    let url = spawn_server(counting_app(Arc::new(test_router()), hits.clone(), false)).await;
    let client = HttpClient::new(url);

    let (first, second) = tokio::join!(
        client.request("greet", body(json!({"name": "ada"})), None),
        client.request("greet", body(json!({"name": "grace"})), None),
    );

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(
        first.unwrap().unwrap()["greeting"],
        json!("Hi, ada!")
    );
    assert_eq!(
        second.unwrap().unwrap()["greeting"],
        json!("Hi, grace!")
    );
}

/// Test: replies correlate by id even when the server reorders its batch
#[tokio::test]
async fn test_replies_correlate_by_id_under_reordering() {
    let hits = Arc::new(AtomicUsize::new(0));
    let url = spawn_server(counting_app(Arc::new(test_router()), hits.clone(), true)).await;
    let client = HttpClient::new(url);

    let (first, second) = tokio::join!(
        client.request("greet", body(json!({"name": "ada"})), None),
        client.request("greet", body(json!({"name": "grace"})), None),
    );

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(first.unwrap().unwrap()["greeting"], json!("Hi, ada!"));
    assert_eq!(second.unwrap().unwrap()["greeting"], json!("Hi, grace!"));
}

#[tokio::test]
async fn test_server_error_reaches_the_caller() {
    let hits = Arc::new(AtomicUsize::new(0));
    let url = spawn_server(counting_app(Arc::new(test_router()), hits, false)).await;
    let client = HttpClient::new(url);

    let err = client.request("alwaysFails", None, None).await.unwrap_err();
    match err {
        ClientError::Rpc(error) => {
            assert_eq!(error.message, "nope");
            assert_eq!(error.status_code, 403);
            assert_eq!(error.code.as_deref(), Some("DENIED"));
        }
        other => panic!("expected Rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_oversized_burst_splits_at_max_batch_size() {
    let hits = Arc::new(AtomicUsize::new(0));
    let url = spawn_server(counting_app(Arc::new(test_router()), hits.clone(), false)).await;
    let client = HttpClient::with_options(
        url,
        ClientOptions {
            max_batch_size: 2,
            ..Default::default()
        },
    );

    let (a, b, c) = tokio::join!(
        client.request("greet", body(json!({"name": "a"})), None),
        client.request("greet", body(json!({"name": "b"})), None),
        client.request("greet", body(json!({"name": "c"})), None),
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_configured_headers_sent_with_every_post() {
    let mut echo_router = Router::new(RouterOptions::new());
    echo_router
        .route(
            "echoHeaders",
            vec![Handler::controller(|_body, context| async move {
                Ok(Some(json!({"headers": context.get("headers")})))
            })],
        )
        .unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let url = spawn_server(counting_app(Arc::new(echo_router), hits, false)).await;

    let mut http_headers = std::collections::HashMap::new();
    http_headers.insert("x-api-key".to_string(), "secret".to_string());
    let client = HttpClient::with_options(
        url,
        ClientOptions {
            http_headers,
            ..Default::default()
        },
    );

    let result = client.request("echoHeaders", None, None).await.unwrap().unwrap();
    assert_eq!(result["headers"]["x-api-key"], json!("secret"));
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    // Nothing listens on this port.
    let client = HttpClient::new("http://127.0.0.1:9/");
    let err = client.request("greet", None, None).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn test_batch_level_rejection_fails_all_waiters() {
    // A server that always answers 400 with a message body.
    let app = axum::Router::new().route(
        "/",
        post(|| async { (axum::http::StatusCode::BAD_REQUEST, "go away") }),
    );
    let url = spawn_server(app).await;
    let client = HttpClient::new(url);

    let (first, second) = tokio::join!(
        client.request("greet", None, None),
        client.request("greet", None, None),
    );
    for outcome in [first, second] {
        match outcome.unwrap_err() {
            ClientError::Transport(message) => assert!(message.contains("go away")),
            other => panic!("expected Transport error, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_sequential_calls_fire_separate_posts() {
    let hits = Arc::new(AtomicUsize::new(0));
    let url = spawn_server(counting_app(Arc::new(test_router()), hits.clone(), false)).await;
    let client = HttpClient::new(url);

    client
        .request("greet", body(json!({"name": "a"})), None)
        .await
        .unwrap();
    client
        .request("greet", body(json!({"name": "b"})), None)
        .await
        .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
