//! Wire data model: call tuples and result tuples.
//!
//! Requests travel as a JSON array of call tuples `[id, route, body?, extra?]`
//! where `extra` is a headers object or a selector array. Responses are a JSON
//! array of four-element result tuples `[id, route, result, error]`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{BatchError, ErrorObject};
use crate::selector::JsonMap;

/// One parsed element of a request batch.
#[derive(Debug, Clone, Default)]
pub struct CallTuple {
    /// Batch-unique correlation id.
    pub id: String,
    /// Route name.
    pub route: String,
    /// Request body, when supplied.
    pub body: Option<JsonMap>,
    /// Per-call headers, when the 4th element is an object.
    pub headers: Option<JsonMap>,
    /// Result projection, when the 4th element is an array.
    pub selector: Option<Vec<Value>>,
}

impl CallTuple {
    pub fn new(id: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            route: route.into(),
            ..Default::default()
        }
    }

    /// Parses one batch element, reporting shape violations as batch errors.
    ///
    /// A non-string or empty id, a missing route, or a non-array item each
    /// abort the whole batch; body and headers of the wrong JSON type are
    /// ignored rather than rejected, matching the lenient reference behavior.
    pub fn parse(item: &Value) -> Result<Self, BatchError> {
        let parts = item
            .as_array()
            .ok_or_else(|| BatchError::bad_request("Request item should be an array"))?;

        let id = match parts.first().and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(BatchError::bad_request("Request item should have an ID")),
        };

        let route = match parts.get(1).and_then(Value::as_str) {
            Some(route) if !route.is_empty() => route.to_string(),
            _ => return Err(BatchError::bad_request("Request item should have a route")),
        };

        let body = parts.get(2).and_then(Value::as_object).cloned();

        let (headers, selector) = match parts.get(3) {
            Some(Value::Object(headers)) => (Some(headers.clone()), None),
            Some(Value::Array(selector)) => (None, Some(selector.clone())),
            _ => (None, None),
        };

        Ok(Self {
            id,
            route,
            body,
            headers,
            selector,
        })
    }
}

impl Serialize for CallTuple {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = self.body.as_ref().map(|b| Value::Object(b.clone()));
        let extra = match (&self.headers, &self.selector) {
            (Some(headers), _) => Some(Value::Object(headers.clone())),
            (None, Some(selector)) => Some(Value::Array(selector.clone())),
            (None, None) => None,
        };
        (&self.id, &self.route, body, extra).serialize(serializer)
    }
}

/// One element of a response batch: `[id, route, result, error]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTuple {
    pub id: String,
    pub route: String,
    pub result: Option<Value>,
    pub error: Option<ErrorObject>,
}

impl ResultTuple {
    pub fn ok(id: impl Into<String>, route: impl Into<String>, result: Option<Value>) -> Self {
        Self {
            id: id.into(),
            route: route.into(),
            result,
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, route: impl Into<String>, error: ErrorObject) -> Self {
        Self {
            id: id.into(),
            route: route.into(),
            result: None,
            error: Some(error),
        }
    }
}

impl Serialize for ResultTuple {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.id, &self.route, &self.result, &self.error).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResultTuple {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (id, route, result, error) =
            <(String, String, Option<Value>, Option<ErrorObject>)>::deserialize(deserializer)?;
        if id.is_empty() {
            return Err(D::Error::custom("result tuple id must be non-empty"));
        }
        Ok(Self {
            id,
            route,
            result,
            error,
        })
    }
}
