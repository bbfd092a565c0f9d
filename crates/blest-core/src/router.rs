//! Route registry.
//!
//! A [`Router`] maps route names to pipelines of middleware, controllers, and
//! afterware. Router-level middleware is captured into a route's pipeline at
//! registration time, so a later `use_handlers` call never retroactively
//! alters an already-registered route. Router-level afterware is appended
//! only when a sub-router is merged or namespaced in, which is how
//! cross-cutting observers attach to nested route trees.
//!
//! All configuration errors are startup faults: callers are expected to
//! propagate them with `?` and let the process exit.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::{RegistrationError, RegistrationResult};
use crate::handler::Handler;
use crate::route_name::validate_route_name;

/// Options recognized when creating a router.
///
/// Transport-level settings (port, url, response headers) belong to the HTTP
/// adapter's configuration, not to the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// Default per-route timeout in milliseconds; 0 means no timeout.
    pub timeout_ms: u64,
    /// Whether routes default to being visible via the `_routes` system route.
    pub introspection: bool,
}

impl RouterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_introspection(mut self, introspection: bool) -> Self {
        self.introspection = introspection;
        self
    }
}

/// A registered route: its composed pipeline and introspection metadata.
#[derive(Debug, Clone)]
pub struct Route {
    pub(crate) handler: Vec<Handler>,
    pub description: String,
    pub schema: Option<Value>,
    pub visible: bool,
    pub validate: bool,
    pub timeout_ms: u64,
}

impl Route {
    /// The composed pipeline, in execution order.
    pub fn pipeline(&self) -> &[Handler] {
        &self.handler
    }
}

/// Metadata changes applied to a route after registration.
#[derive(Debug, Clone, Default)]
pub struct RouteConfig {
    pub description: Option<String>,
    pub schema: Option<Value>,
    pub visible: Option<bool>,
    pub validate: Option<bool>,
    pub timeout_ms: Option<u64>,
}

impl RouteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Introspection record for one visible route.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDescription {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Registry of named routes with router-level middleware and afterware.
#[derive(Debug, Default)]
pub struct Router {
    options: RouterOptions,
    middleware: Vec<Handler>,
    afterware: Vec<Handler>,
    routes: BTreeMap<String, Route>,
}

impl Router {
    pub fn new(options: RouterOptions) -> Self {
        Self {
            options,
            middleware: Vec::new(),
            afterware: Vec::new(),
            routes: BTreeMap::new(),
        }
    }

    /// The options the router was created with.
    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    /// Default timeout applied to routes registered without their own.
    pub fn timeout_ms(&self) -> u64 {
        self.options.timeout_ms
    }

    /// Whether the `_routes` introspection route is served.
    pub fn introspection(&self) -> bool {
        self.options.introspection
    }

    /// Registers router-wide middleware and afterware.
    ///
    /// Middleware is prepended to the pipeline of every route registered
    /// *after* this call. Afterware is appended to routes brought in through
    /// [`merge`](Self::merge) or [`namespace`](Self::namespace). Controllers
    /// cannot be registered router-wide.
    pub fn use_handlers<I>(&mut self, handlers: I) -> RegistrationResult<()>
    where
        I: IntoIterator<Item = Handler>,
    {
        for handler in handlers {
            match handler {
                Handler::Middleware(_) => self.middleware.push(handler),
                Handler::Afterware(_) => self.afterware.push(handler),
                Handler::Controller(_) => return Err(RegistrationError::ControllerNotAllowed),
            }
        }
        Ok(())
    }

    /// Registers a route under `name` with the given pipeline steps.
    ///
    /// The route's pipeline becomes the router's current middleware followed
    /// by `handlers`, fixed at this point.
    pub fn route(
        &mut self,
        name: impl Into<String>,
        handlers: Vec<Handler>,
    ) -> RegistrationResult<()> {
        let name = name.into();
        validate_route_name(&name, false)?;
        if self.routes.contains_key(&name) {
            return Err(RegistrationError::DuplicateRoute { route: name });
        }
        if handlers.is_empty() {
            return Err(RegistrationError::NoHandlers);
        }

        let mut pipeline = self.middleware.clone();
        pipeline.extend(handlers);

        self.routes.insert(
            name,
            Route {
                handler: pipeline,
                description: String::new(),
                schema: None,
                visible: self.options.introspection,
                validate: false,
                timeout_ms: self.options.timeout_ms,
            },
        );
        Ok(())
    }

    /// Registers a route and applies `config` in one step.
    pub fn route_with(
        &mut self,
        name: impl Into<String>,
        handlers: Vec<Handler>,
        config: RouteConfig,
    ) -> RegistrationResult<()> {
        let name = name.into();
        self.route(name.clone(), handlers)?;
        self.describe(&name, config)
    }

    /// Updates a registered route's metadata.
    ///
    /// A timeout of zero is rejected; routes opt out of timeouts by never
    /// setting one and using a router default of zero.
    pub fn describe(&mut self, name: &str, config: RouteConfig) -> RegistrationResult<()> {
        if let Some(0) = config.timeout_ms {
            return Err(RegistrationError::InvalidTimeout);
        }
        let route = self
            .routes
            .get_mut(name)
            .ok_or_else(|| RegistrationError::UnknownRoute {
                route: name.to_string(),
            })?;

        if let Some(description) = config.description {
            route.description = description;
        }
        if let Some(schema) = config.schema {
            route.schema = Some(schema);
        }
        if let Some(visible) = config.visible {
            route.visible = visible;
        }
        if let Some(validate) = config.validate {
            route.validate = validate;
        }
        if let Some(timeout_ms) = config.timeout_ms {
            route.timeout_ms = timeout_ms;
        }
        Ok(())
    }

    /// Imports every route of `other` under its existing name.
    ///
    /// Imported pipelines become `[self.middleware, other pipeline,
    /// self.afterware]`. A route that never set its own timeout inherits this
    /// router's default.
    pub fn merge(&mut self, other: Router) -> RegistrationResult<()> {
        self.import(None, other)
    }

    /// Imports every route of `other` under `prefix + "/" + name`.
    pub fn namespace(&mut self, prefix: &str, other: Router) -> RegistrationResult<()> {
        validate_route_name(prefix, false)?;
        self.import(Some(prefix), other)
    }

    fn import(&mut self, prefix: Option<&str>, other: Router) -> RegistrationResult<()> {
        if other.routes.is_empty() {
            return Err(RegistrationError::NothingToMerge);
        }

        let imported: Vec<(String, Route)> = other
            .routes
            .into_iter()
            .map(|(name, route)| {
                let name = match prefix {
                    Some(prefix) => format!("{prefix}/{name}"),
                    None => name,
                };
                (name, route)
            })
            .collect();

        for (name, _) in &imported {
            if self.routes.contains_key(name) {
                return Err(RegistrationError::MergeCollision {
                    route: name.clone(),
                });
            }
        }

        for (name, route) in imported {
            let Route {
                handler,
                description,
                schema,
                visible,
                validate,
                timeout_ms,
            } = route;

            let mut pipeline = self.middleware.clone();
            pipeline.extend(handler);
            pipeline.extend(self.afterware.iter().cloned());

            let timeout_ms = if timeout_ms > 0 {
                timeout_ms
            } else {
                self.options.timeout_ms
            };

            self.routes.insert(
                name,
                Route {
                    handler: pipeline,
                    description,
                    schema,
                    visible,
                    validate,
                    timeout_ms,
                },
            );
        }
        Ok(())
    }

    /// Looks up a registered route.
    pub fn get(&self, name: &str) -> Option<&Route> {
        self.routes.get(name)
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Names of all registered routes, in sorted order.
    pub fn route_names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Introspection records for the routes marked visible.
    pub fn visible_routes(&self) -> Vec<RouteDescription> {
        self.routes
            .iter()
            .filter(|(_, route)| route.visible)
            .map(|(name, route)| RouteDescription {
                name: name.clone(),
                description: route.description.clone(),
                schema: route.schema.clone(),
                timeout: (route.timeout_ms > 0).then_some(route.timeout_ms),
            })
            .collect()
    }
}
