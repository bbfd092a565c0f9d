//! Per-item pipeline execution.
//!
//! The reducer turns one batch item into exactly one result tuple. The
//! pipeline runs in its own task; when the route carries a timeout, a
//! deadline races the task and the first outcome wins. A pipeline that loses
//! the race keeps running detached, but its result is discarded; handlers
//! are cooperative and never forcibly terminated.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::{error, warn};

use crate::error::{BlestError, ErrorObject};
use crate::handler::Handler;
use crate::selector::{project, JsonMap};
use crate::types::{CallTuple, ResultTuple};

/// Milliseconds since the unix epoch, for the context `time` field.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

fn internal_server_error() -> ErrorObject {
    ErrorObject {
        message: "Internal Server Error".to_string(),
        status_code: 500,
        code: None,
    }
}

/// Executes `pipeline` for one batch item and produces its result tuple.
///
/// The context is deep-copied before any handler runs; sibling batch items
/// never observe each other's mutations. `timeout_ms` of zero disables the
/// deadline.
pub async fn reduce(
    pipeline: Vec<Handler>,
    call: CallTuple,
    context: &JsonMap,
    timeout_ms: u64,
) -> ResultTuple {
    let id = call.id.clone();
    let route = call.route.clone();
    let safe_context = context.clone();

    let mut task = tokio::spawn(run_pipeline(pipeline, call, safe_context));

    let joined = if timeout_ms > 0 {
        match tokio::time::timeout(Duration::from_millis(timeout_ms), &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(route = %route, timeout_ms, "route timed out");
                return ResultTuple::err(id, route, internal_server_error());
            }
        }
    } else {
        (&mut task).await
    };

    match joined {
        Ok(tuple) => tuple,
        Err(join_error) => {
            // A panicking handler fails its own item only.
            error!(route = %route, error = %join_error, "route pipeline aborted");
            ResultTuple::err(id, route, internal_server_error())
        }
    }
}

async fn run_pipeline(pipeline: Vec<Handler>, call: CallTuple, mut context: JsonMap) -> ResultTuple {
    let CallTuple {
        id,
        route,
        body,
        selector,
        ..
    } = call;
    let body = body.unwrap_or_default();

    let mut result: Option<Value> = None;
    let mut err: Option<BlestError> = None;

    for step in &pipeline {
        match step {
            Handler::Middleware(f) => {
                if err.is_none() {
                    f(&body, &mut context);
                }
            }
            Handler::Controller(f) => {
                if err.is_some() {
                    continue;
                }
                match f(body.clone(), context.clone()).await {
                    Ok(Some(value)) => {
                        if result.is_none() {
                            result = Some(value);
                        } else {
                            err = Some(BlestError::new(
                                "Middleware should not return anything but may mutate context",
                            ));
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(handler_error) => err = Some(handler_error),
                }
            }
            Handler::Afterware(f) => {
                if let Some(current) = &err {
                    f(&body, &context, current);
                }
            }
        }
    }

    if let Some(err) = err {
        return ResultTuple::err(id, route, err.into());
    }

    match result {
        Some(Value::Object(map)) => {
            let map = match &selector {
                Some(selector) => project(&map, selector),
                None => map,
            };
            ResultTuple::ok(id, route, Some(Value::Object(map)))
        }
        Some(_) => ResultTuple::err(
            id,
            route,
            ErrorObject {
                message: "The result, if any, should be a JSON object".to_string(),
                status_code: 500,
                code: None,
            },
        ),
        None => ResultTuple::ok(id, route, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str, route: &str, body: Value) -> CallTuple {
        let mut call = CallTuple::new(id, route);
        call.body = body.as_object().cloned();
        call
    }

    fn echo_controller() -> Handler {
        Handler::controller(|body, context| async move {
            Ok(Some(json!({"parameters": body, "context": context})))
        })
    }

    #[tokio::test]
    async fn test_controller_sees_middleware_mutations() {
        let pipeline = vec![
            Handler::middleware(|body, context| {
                context.insert("test".into(), json!({"value": body.get("testValue").cloned()}));
            }),
            echo_controller(),
        ];
        let context = json!({"ambient": true}).as_object().cloned().unwrap();

        let tuple = reduce(pipeline, call("id-1", "ab", json!({"testValue": 0.5})), &context, 0).await;
        assert!(tuple.error.is_none());
        let result = tuple.result.unwrap();
        assert_eq!(result["context"]["test"]["value"], json!(0.5));
        assert_eq!(result["context"]["ambient"], json!(true));
    }

    #[tokio::test]
    async fn test_no_result_no_error_yields_double_null() {
        let pipeline = vec![Handler::controller(|_, _| async { Ok(None) })];
        let tuple = reduce(pipeline, CallTuple::new("id-1", "ab"), &JsonMap::new(), 0).await;
        assert!(tuple.result.is_none());
        assert!(tuple.error.is_none());
    }

    #[tokio::test]
    async fn test_handler_error_propagates_status_and_code() {
        let pipeline = vec![Handler::controller(|_, _| async {
            Err(BlestError::new("Unauthorized").with_status(401).with_code("NO_AUTH"))
        })];
        let tuple = reduce(pipeline, CallTuple::new("id-1", "ab"), &JsonMap::new(), 0).await;
        let err = tuple.error.unwrap();
        assert_eq!(err.message, "Unauthorized");
        assert_eq!(err.status_code, 401);
        assert_eq!(err.code.as_deref(), Some("NO_AUTH"));
    }

    #[tokio::test]
    async fn test_second_result_is_a_composition_error() {
        let some = || Handler::controller(|_, _| async { Ok(Some(json!({"v": 1}))) });
        let pipeline = vec![some(), some()];
        let tuple = reduce(pipeline, CallTuple::new("id-1", "ab"), &JsonMap::new(), 0).await;
        let err = tuple.error.unwrap();
        assert_eq!(
            err.message,
            "Middleware should not return anything but may mutate context"
        );
        assert_eq!(err.status_code, 500);
    }

    #[tokio::test]
    async fn test_non_object_result_rejected() {
        let pipeline = vec![Handler::controller(|_, _| async { Ok(Some(json!([1, 2]))) })];
        let tuple = reduce(pipeline, CallTuple::new("id-1", "ab"), &JsonMap::new(), 0).await;
        let err = tuple.error.unwrap();
        assert_eq!(err.message, "The result, if any, should be a JSON object");
        assert_eq!(err.status_code, 500);
    }

    #[tokio::test]
    async fn test_afterware_runs_only_on_error() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let observed = Arc::new(AtomicUsize::new(0));

        let counting_afterware = |observed: Arc<AtomicUsize>| {
            Handler::afterware(move |_, _, _| {
                observed.fetch_add(1, Ordering::SeqCst);
            })
        };

        // Successful pipeline: afterware skipped.
        let pipeline = vec![echo_controller(), counting_afterware(observed.clone())];
        reduce(pipeline, call("id-1", "ab", json!({})), &JsonMap::new(), 0).await;
        assert_eq!(observed.load(Ordering::SeqCst), 0);

        // Failing pipeline: afterware observes the error.
        let pipeline = vec![
            Handler::controller(|_, _| async { Err(BlestError::new("boom")) }),
            counting_afterware(observed.clone()),
        ];
        let tuple = reduce(pipeline, CallTuple::new("id-2", "ab"), &JsonMap::new(), 0).await;
        assert_eq!(observed.load(Ordering::SeqCst), 1);
        assert_eq!(tuple.error.unwrap().message, "boom");
    }

    #[tokio::test]
    async fn test_controllers_skipped_after_error() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        let pipeline = vec![
            Handler::controller(|_, _| async { Err(BlestError::new("first")) }),
            Handler::controller(move |_, _| {
                let ran = ran_clone.clone();
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }
            }),
        ];
        let tuple = reduce(pipeline, CallTuple::new("id-1", "ab"), &JsonMap::new(), 0).await;
        assert_eq!(tuple.error.unwrap().message, "first");
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    /// Test: a handler sleeping past its deadline yields exactly one 500 tuple
    #[tokio::test]
    async fn test_timeout_emits_single_error_tuple() {
        let pipeline = vec![Handler::controller(|_, _| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(Some(json!({"late": true})))
        })];
        let tuple = reduce(pipeline, CallTuple::new("id-1", "slow"), &JsonMap::new(), 10).await;
        let err = tuple.error.unwrap();
        assert_eq!(err.message, "Internal Server Error");
        assert_eq!(err.status_code, 500);
        assert!(tuple.result.is_none());
    }

    #[tokio::test]
    async fn test_fast_handler_beats_its_deadline() {
        let pipeline = vec![echo_controller()];
        let tuple = reduce(pipeline, call("id-1", "ab", json!({})), &JsonMap::new(), 1000).await;
        assert!(tuple.error.is_none());
        assert!(tuple.result.is_some());
    }

    #[tokio::test]
    async fn test_selector_applied_to_object_result() {
        let pipeline = vec![Handler::controller(|_, _| async {
            Ok(Some(json!({"keep": 1, "drop": 2})))
        })];
        let mut call = CallTuple::new("id-1", "ab");
        call.selector = Some(vec![json!("keep")]);
        let tuple = reduce(pipeline, call, &JsonMap::new(), 0).await;
        assert_eq!(tuple.result.unwrap(), json!({"keep": 1}));
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_500() {
        let pipeline = vec![Handler::controller(|_, _| async { panic!("boom") })];
        let tuple = reduce(pipeline, CallTuple::new("id-1", "ab"), &JsonMap::new(), 0).await;
        let err = tuple.error.unwrap();
        assert_eq!(err.status_code, 500);
    }
}
