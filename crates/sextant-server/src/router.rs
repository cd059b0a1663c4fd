//! Request routing and path matching.
//!
//! Routes are keyed by HTTP method and a path pattern. Patterns are split on
//! `/`; a `{name}` segment captures one path segment. Empty segments are
//! ignored, so `/jobs`, `/jobs/` and `//jobs` all name the same route.
//!
//! When several patterns match one path, the one with the most literal
//! segments wins; ties go to the route added first.
//!
//! # Example
//!
//! ```rust
//! use sextant_core::{BoxFuture, Context, Endpoint, Verb};
//! use sextant_server::Router;
//! use http::Method;
//!
//! let endpoint = Endpoint::new("jobs", "get", |_ctx: Context| {
//!     Box::pin(async { Ok(()) }) as BoxFuture<_>
//! });
//!
//! let mut router = Router::new();
//! router.add_route(Verb::Get, "/jobs/{id}", endpoint).unwrap();
//!
//! let found = router.match_route(&Method::GET, "/jobs/42").unwrap();
//! assert_eq!(found.endpoint().method(), "get");
//! assert_eq!(found.params().get("id"), Some("42"));
//! ```

use http::Method;
use sextant_core::{BindError, Endpoint, Params, RouteBinder, Verb};

/// Result of a successful match.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    endpoint: Endpoint,
    params: Params,
    pattern: String,
}

impl RouteMatch {
    /// The bound endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Parameters captured from `{name}` segments.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Pattern the route was registered under.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Splits the match into its endpoint and parameters.
    #[must_use]
    pub fn into_parts(self) -> (Endpoint, Params) {
        (self.endpoint, self.params)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Literal(String),
    Param(String),
}

impl PathSegment {
    fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Param(_), Self::Param(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
struct Route {
    verb: Verb,
    segments: Vec<PathSegment>,
    pattern: String,
    endpoint: Endpoint,
}

impl Route {
    fn parse_segments(pattern: &str) -> Result<Vec<PathSegment>, BindError> {
        let invalid = |reason: &str| BindError::InvalidPath {
            path: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("pattern must start with '/'"));
        }

        pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    if name.is_empty() || name.contains(['{', '}']) {
                        return Err(invalid("malformed parameter segment"));
                    }
                    Ok(PathSegment::Param(name.to_string()))
                } else if s.contains(['{', '}']) {
                    Err(invalid("braces are only allowed around a whole segment"))
                } else {
                    Ok(PathSegment::Literal(s.to_string()))
                }
            })
            .collect()
    }

    fn match_path(&self, path_segments: &[&str]) -> Option<Params> {
        if path_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = Params::new();
        for (pattern, actual) in self.segments.iter().zip(path_segments) {
            match pattern {
                PathSegment::Literal(expected) => {
                    if expected != actual {
                        return None;
                    }
                }
                PathSegment::Param(name) => params.insert(name.as_str(), *actual),
            }
        }
        Some(params)
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, PathSegment::Literal(_)))
            .count()
    }

    fn conflicts_with(&self, verb: Verb, segments: &[PathSegment]) -> bool {
        self.verb == verb
            && self.segments.len() == segments.len()
            && self
                .segments
                .iter()
                .zip(segments)
                .all(|(a, b)| a.same_shape(b))
    }
}

/// Method + path router.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route.
    ///
    /// Fails with [`BindError::Conflict`] when a route with the same verb and
    /// an equivalent pattern exists (parameter names do not matter), and with
    /// [`BindError::InvalidPath`] when the pattern cannot be parsed.
    pub fn add_route(
        &mut self,
        verb: Verb,
        pattern: impl AsRef<str>,
        endpoint: Endpoint,
    ) -> Result<(), BindError> {
        let pattern = pattern.as_ref();
        let segments = Route::parse_segments(pattern)?;

        if self
            .routes
            .iter()
            .any(|route| route.conflicts_with(verb, &segments))
        {
            return Err(BindError::Conflict {
                verb,
                path: pattern.to_string(),
            });
        }

        self.routes.push(Route {
            verb,
            segments,
            pattern: pattern.to_string(),
            endpoint,
        });
        Ok(())
    }

    /// Number of routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Finds the route for `method` and `path`.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let path_segments = split_path(path);
        let mut best: Option<(&Route, Params)> = None;

        for route in &self.routes {
            if route.verb.as_method() != *method {
                continue;
            }
            if let Some(params) = route.match_path(&path_segments) {
                let better = best
                    .as_ref()
                    .map_or(true, |(current, _)| route.literal_count() > current.literal_count());
                if better {
                    best = Some((route, params));
                }
            }
        }

        best.map(|(route, params)| RouteMatch {
            endpoint: route.endpoint.clone(),
            params,
            pattern: route.pattern.clone(),
        })
    }

    /// Methods that have a route matching `path`, in registration order.
    ///
    /// Empty when no route matches the path under any method.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let path_segments = split_path(path);
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let method = route.verb.as_method();
            if !allowed.contains(&method) && route.match_path(&path_segments).is_some() {
                allowed.push(method);
            }
        }
        allowed
    }

    /// Iterates over `(verb, pattern, endpoint)` for every route.
    pub fn routes(&self) -> impl Iterator<Item = (Verb, &str, &Endpoint)> {
        self.routes
            .iter()
            .map(|route| (route.verb, route.pattern.as_str(), &route.endpoint))
    }
}

impl RouteBinder for Router {
    fn bind(&mut self, verb: Verb, path: &str, endpoint: Endpoint) -> Result<(), BindError> {
        self.add_route(verb, path, endpoint)
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
