//! Batch request handling.
//!
//! One HTTP request carries an ordered batch of call tuples. Shape violations
//! (empty batch, malformed item, duplicate id) abort the batch with a single
//! 400 error; per-item failures are carried in that item's result tuple and
//! never affect siblings. The response order always equals the request order,
//! even though items execute concurrently.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use serde_json::{json, Value};

use crate::error::{BatchError, BlestError};
use crate::handler::Handler;
use crate::reducer::{reduce, unix_millis};
use crate::route_name::validate_route_name;
use crate::router::Router;
use crate::selector::JsonMap;
use crate::types::{CallTuple, ResultTuple};

/// Maximum batch items executing concurrently within one request.
/// Bounds resource use when a client sends a large batch.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 10;

/// The route name answered with introspection data when enabled.
const INTROSPECTION_ROUTE: &str = "_routes";

fn not_found_pipeline() -> Vec<Handler> {
    vec![Handler::controller(|_body, _context| async {
        Err(BlestError::not_found())
    })]
}

impl Router {
    /// Handles one request batch against this registry.
    ///
    /// `context` is the ambient request context (typically the transport
    /// headers); each item receives a fresh copy enriched with its `id`,
    /// `route`, per-call `headers`, and a `time` timestamp in unix
    /// milliseconds.
    pub async fn handle(
        &self,
        requests: &[Value],
        context: &JsonMap,
    ) -> Result<Vec<ResultTuple>, BatchError> {
        if requests.is_empty() {
            return Err(BatchError::bad_request(
                "Request body should be a JSON array",
            ));
        }

        let mut unique_ids: HashSet<String> = HashSet::with_capacity(requests.len());
        let mut work: Vec<(Vec<Handler>, CallTuple, JsonMap, u64)> =
            Vec::with_capacity(requests.len());

        for item in requests {
            let call = CallTuple::parse(item)?;

            let system = call.route.starts_with('_');
            validate_route_name(&call.route, system)
                .map_err(|reason| BatchError::bad_request(reason.to_string()))?;

            if !unique_ids.insert(call.id.clone()) {
                return Err(BatchError::bad_request(
                    "Request items should have unique IDs",
                ));
            }

            let (pipeline, timeout_ms) = match self.get(&call.route) {
                Some(route) => (route.pipeline().to_vec(), route.timeout_ms),
                None if self.introspection() && call.route == INTROSPECTION_ROUTE => {
                    (self.introspection_pipeline(), self.timeout_ms())
                }
                None => (not_found_pipeline(), 0),
            };

            let mut item_context = context.clone();
            item_context.insert("id".to_string(), Value::String(call.id.clone()));
            item_context.insert("route".to_string(), Value::String(call.route.clone()));
            if let Some(headers) = &call.headers {
                item_context.insert("headers".to_string(), Value::Object(headers.clone()));
            }
            item_context.insert("time".to_string(), Value::from(unix_millis()));

            work.push((pipeline, call, item_context, timeout_ms));
        }

        let mut indexed: Vec<(usize, ResultTuple)> = stream::iter(work.into_iter().enumerate())
            .map(|(index, (pipeline, call, item_context, timeout_ms))| async move {
                (index, reduce(pipeline, call, &item_context, timeout_ms).await)
            })
            .buffer_unordered(DEFAULT_BATCH_CONCURRENCY)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, tuple)| tuple).collect())
    }

    fn introspection_pipeline(&self) -> Vec<Handler> {
        let routes = self.visible_routes();
        vec![Handler::controller(move |_body, _context| {
            let routes = routes.clone();
            async move {
                let listing = serde_json::to_value(&routes)
                    .map_err(|err| BlestError::new(err.to_string()))?;
                Ok(Some(json!({ "routes": listing })))
            }
        })]
    }
}
