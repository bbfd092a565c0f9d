//! blest-client: batching HTTP client for BLEST services
//!
//! Calls made within a short window coalesce into a single HTTP POST. Each
//! call enqueues a call tuple and registers a one-shot waiter keyed by the
//! call's id; a 1 ms flush timer drains the queue, fires one POST carrying
//! the batched array, and dispatches every response tuple back to its waiter
//! by id. Correlation is by id, never by position, so a server is free to
//! reorder its response batch.
//!
//! # Example
//!
//! ```ignore
//! use blest_client::HttpClient;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), blest_client::ClientError> {
//! let client = HttpClient::new("http://localhost:8080/");
//! let body = json!({"name": "ada"}).as_object().cloned();
//! let result = client.request("greet", body, None).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use blest_core::{CallTuple, ErrorObject, JsonMap, ResultTuple};

/// How long enqueued calls wait for more calls to batch with.
const FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Overall per-call deadline, covering queueing and the network round trip.
const REQUEST_DEADLINE: Duration = Duration::from_secs(5);

/// Default cap on calls per HTTP POST.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Client construction options.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Headers merged into every outgoing POST.
    pub http_headers: HashMap<String, String>,
    /// Maximum calls per HTTP POST.
    pub max_batch_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            http_headers: HashMap::new(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

/// Errors surfaced to a caller of [`HttpClient::request`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The route argument was empty.
    #[error("Route is required")]
    RouteRequired,

    /// The server answered this call with an error object.
    #[error("{}", .0.message)]
    Rpc(ErrorObject),

    /// The 5 second overall deadline elapsed.
    #[error("Request timed out")]
    DeadlineExceeded,

    /// The POST failed, the response could not be decoded, or the response
    /// did not contain this call's id.
    #[error("request failed: {0}")]
    Transport(String),

    /// The result element was neither null nor an object.
    #[error("Invalid response format")]
    InvalidResponse,
}

enum Reply {
    Tuple(Option<serde_json::Value>, Option<ErrorObject>),
    Failed(String),
}

#[derive(Default)]
struct ClientState {
    queue: Vec<CallTuple>,
    waiters: HashMap<String, oneshot::Sender<Reply>>,
    flush_armed: bool,
}

struct ClientInner {
    url: String,
    http_headers: HashMap<String, String>,
    max_batch_size: usize,
    http: reqwest::Client,
    state: Mutex<ClientState>,
}

impl ClientInner {
    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn post_batch(&self, batch: &[CallTuple]) -> Result<Vec<ResultTuple>, String> {
        let mut request = self.http.post(&self.url).json(&batch);
        for (name, value) in &self.http_headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|err| format!("POST request failed: {err}"))?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(format!("server answered {status}: {message}"));
        }

        response
            .json::<Vec<ResultTuple>>()
            .await
            .map_err(|err| format!("failed to decode response body: {err}"))
    }

    /// Sends one drained batch and routes every reply to its waiter by id.
    async fn dispatch(&self, batch: Vec<CallTuple>) {
        let ids: Vec<String> = batch.iter().map(|call| call.id.clone()).collect();
        debug!(calls = batch.len(), "flushing batch");

        match self.post_batch(&batch).await {
            Ok(tuples) => {
                let mut state = self.lock_state();
                for tuple in tuples {
                    if let Some(waiter) = state.waiters.remove(&tuple.id) {
                        let _ = waiter.send(Reply::Tuple(tuple.result, tuple.error));
                    }
                    // No waiter: the caller already gave up; drop the reply.
                }
                // A response that omits one of our ids is a protocol fault;
                // fail the call now instead of letting it hit the deadline.
                for id in ids {
                    if let Some(waiter) = state.waiters.remove(&id) {
                        let _ = waiter.send(Reply::Failed(format!(
                            "no response for request {id}"
                        )));
                    }
                }
            }
            Err(message) => {
                let mut state = self.lock_state();
                for id in ids {
                    if let Some(waiter) = state.waiters.remove(&id) {
                        let _ = waiter.send(Reply::Failed(message.clone()));
                    }
                }
            }
        }
    }
}

/// Flush loop: one task owns the timer while calls keep arriving.
async fn flush_task(inner: Arc<ClientInner>) {
    loop {
        tokio::time::sleep(FLUSH_INTERVAL).await;

        let (batch, more_pending) = {
            let mut state = inner.lock_state();
            let take = state.queue.len().min(inner.max_batch_size);
            let batch: Vec<CallTuple> = state.queue.drain(..take).collect();
            let more_pending = !state.queue.is_empty();
            if !more_pending {
                state.flush_armed = false;
            }
            (batch, more_pending)
        };

        if !batch.is_empty() {
            inner.dispatch(batch).await;
        }
        if !more_pending {
            return;
        }
    }
}

/// A BLEST client bound to one endpoint URL.
///
/// Cheap to clone; clones share the queue and flush timer.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

impl HttpClient {
    /// Creates a client with default options.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_options(url, ClientOptions::default())
    }

    /// Creates a client with explicit options.
    pub fn with_options(url: impl Into<String>, options: ClientOptions) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                url: url.into(),
                http_headers: options.http_headers,
                max_batch_size: options.max_batch_size.max(1),
                http: reqwest::Client::new(),
                state: Mutex::new(ClientState::default()),
            }),
        }
    }

    /// Issues one call and awaits its reply.
    ///
    /// The call joins the pending batch; concurrent calls within the flush
    /// window share a single HTTP POST. Resolves with the call's own result,
    /// the server-reported error, or a transport error; after five seconds
    /// the caller is released with [`ClientError::DeadlineExceeded`] and any
    /// late reply is dropped.
    pub async fn request(
        &self,
        route: &str,
        body: Option<JsonMap>,
        headers: Option<JsonMap>,
    ) -> Result<Option<JsonMap>, ClientError> {
        if route.is_empty() {
            return Err(ClientError::RouteRequired);
        }

        let id = Uuid::new_v4().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();

        let start_flush = {
            let mut state = self.inner.lock_state();
            state.waiters.insert(id.clone(), reply_tx);

            let mut call = CallTuple::new(id.clone(), route);
            call.body = body;
            call.headers = headers;
            state.queue.push(call);

            !std::mem::replace(&mut state.flush_armed, true)
        };

        if start_flush {
            tokio::spawn(flush_task(Arc::clone(&self.inner)));
        }

        let reply = match tokio::time::timeout(REQUEST_DEADLINE, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_closed)) => {
                return Err(ClientError::Transport("reply channel closed".to_string()));
            }
            Err(_elapsed) => {
                self.inner.lock_state().waiters.remove(&id);
                return Err(ClientError::DeadlineExceeded);
            }
        };

        match reply {
            Reply::Failed(message) => Err(ClientError::Transport(message)),
            Reply::Tuple(_, Some(error)) => Err(ClientError::Rpc(error)),
            Reply::Tuple(None, None) => Ok(None),
            Reply::Tuple(Some(serde_json::Value::Object(result)), None) => Ok(Some(result)),
            Reply::Tuple(Some(_), None) => Err(ClientError::InvalidResponse),
        }
    }

    /// The endpoint this client posts to.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Number of calls currently queued for the next flush.
    pub fn pending(&self) -> usize {
        self.inner.lock_state().queue.len()
    }
}
