//! blest-core: BLEST protocol runtime
//!
//! BLEST transports an ordered batch of procedure calls in a single JSON
//! array and answers with an ordered batch of four-element result tuples.
//! This crate is the transport-agnostic core:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 blest-core                   │
//! ├─────────────────────────────────────────────┤
//! │  route_name.rs - route grammar validation   │
//! │  selector.rs   - result projection          │
//! │  types.rs      - call/result wire tuples    │
//! │  handler.rs    - pipeline step kinds        │
//! │  router.rs     - route registry             │
//! │  reducer.rs    - per-item execution         │
//! │  batch.rs      - batch fan-out              │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use blest_core::{Handler, Router, RouterOptions};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut router = Router::new(RouterOptions::new().with_timeout_ms(1000));
//! router.route(
//!     "greet",
//!     vec![Handler::controller(|body, _context| async move {
//!         let name = body.get("name").and_then(|v| v.as_str()).unwrap_or("world");
//!         Ok(Some(json!({ "greeting": format!("Hi, {name}!") })))
//!     })],
//! )?;
//!
//! let batch = [json!(["id-1", "greet", {"name": "ada"}])];
//! let results = router.handle(&batch, &Default::default()).await?;
//! assert_eq!(results[0].result.as_ref().unwrap()["greeting"], "Hi, ada!");
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod error;
pub mod handler;
pub mod reducer;
pub mod route_name;
pub mod router;
pub mod selector;
pub mod types;

// Re-exports for convenience
pub use batch::DEFAULT_BATCH_CONCURRENCY;
pub use error::{
    BatchError, BlestError, ErrorObject, RegistrationError, RegistrationResult, RouteNameError,
};
pub use handler::{ControllerOutput, Handler};
pub use reducer::reduce;
pub use route_name::validate_route_name;
pub use router::{Route, RouteConfig, RouteDescription, Router, RouterOptions};
pub use selector::{project, JsonMap};
pub use types::{CallTuple, ResultTuple};
