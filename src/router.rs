//! Compiled routes and the lookup table the dispatcher consults.
//!
//! Matching is deliberately simple: a fully literal path is matched by exact
//! string comparison first, then parameterized patterns are tried in
//! registration order. Registering the same verb and path twice is allowed;
//! the first registration wins at dispatch time.

use std::collections::HashMap;

use crate::error::Error;
use crate::handler::{ErrorHandler, Middleware, RouteHandler, Serializer};
use crate::method::Method;

/// One segment of a compiled route path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled route path, split into segments once at startup.
#[derive(Clone, Debug)]
pub(crate) struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compiles a normalized path. `:`-prefixed segments become named
    /// parameters; an unnamed parameter is a configuration error.
    pub(crate) fn compile(path: &str) -> Result<Self, Error> {
        let mut segments = Vec::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            match part.strip_prefix(':') {
                Some("") => return Err(Error::InvalidPath(path.to_owned())),
                Some(name) => segments.push(Segment::Param(name.to_owned())),
                None => segments.push(Segment::Literal(part.to_owned())),
            }
        }
        Ok(Self { segments })
    }

    pub(crate) fn is_static(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Matches a request path, returning the extracted parameters.
    pub(crate) fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        let mut parts = path.split('/').filter(|p| !p.is_empty());

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_owned());
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

/// A fully compiled route: the matcher plus every step of its pipeline.
pub(crate) struct RouteDefinition {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) pattern: PathPattern,
    pub(crate) middlewares: Vec<Middleware>,
    pub(crate) handler: RouteHandler,
    pub(crate) serializer: Serializer,
    pub(crate) error_handler: ErrorHandler,
    pub(crate) documentation: Option<serde_json::Value>,
}

impl std::fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// The route table: static routes by exact path, parameterized routes in
/// registration order.
#[derive(Default)]
pub(crate) struct RouteTable {
    statics: HashMap<(Method, String), usize>,
    patterns: Vec<usize>,
    routes: Vec<RouteDefinition>,
}

impl RouteTable {
    pub(crate) fn insert(&mut self, route: RouteDefinition) {
        let index = self.routes.len();
        if route.pattern.is_static() {
            // first registration wins
            self.statics.entry((route.method, route.path.clone())).or_insert(index);
        } else {
            self.patterns.push(index);
        }
        self.routes.push(route);
    }

    /// Resolves a request, literal matches before parameterized ones.
    pub(crate) fn lookup(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(&RouteDefinition, HashMap<String, String>)> {
        if let Some(&index) = self.statics.get(&(method, path.to_owned())) {
            return Some((&self.routes[index], HashMap::new()));
        }

        self.patterns.iter().map(|&i| &self.routes[i]).find_map(|route| {
            if route.method != method {
                return None;
            }
            route.pattern.matches(path).map(|params| (route, params))
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{BoxFuture, HandlerResult, error_handler, pass_through};

    fn route(method: Method, path: &str) -> RouteDefinition {
        RouteDefinition {
            method,
            path: path.to_owned(),
            pattern: PathPattern::compile(path).unwrap(),
            middlewares: Vec::new(),
            handler: std::sync::Arc::new(|ex| -> BoxFuture<HandlerResult> {
                Box::pin(async move { (ex, Ok(None)) })
            }),
            serializer: pass_through(),
            error_handler: error_handler(|_e, ex| async move { ex }),
            documentation: None,
        }
    }

    #[test]
    fn unnamed_parameter_is_rejected() {
        assert!(matches!(PathPattern::compile("/users/:"), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn pattern_extracts_named_parameters() {
        let pattern = PathPattern::compile("/users/:id/orders/:orderId").unwrap();
        let params = pattern.matches("/users/7/orders/99").unwrap();
        assert_eq!(params["id"], "7");
        assert_eq!(params["orderId"], "99");
        assert!(pattern.matches("/users/7").is_none());
        assert!(pattern.matches("/users/7/orders/99/x").is_none());
    }

    #[test]
    fn literal_routes_win_over_parameterized_ones() {
        let mut table = RouteTable::default();
        table.insert(route(Method::Get, "/users/:id"));
        table.insert(route(Method::Get, "/users/me"));

        let (found, params) = table.lookup(Method::Get, "/users/me").unwrap();
        assert_eq!(found.path, "/users/me");
        assert!(params.is_empty());

        let (found, params) = table.lookup(Method::Get, "/users/7").unwrap();
        assert_eq!(found.path, "/users/:id");
        assert_eq!(params["id"], "7");
    }

    #[test]
    fn duplicate_registration_keeps_the_first() {
        let mut table = RouteTable::default();
        table.insert(route(Method::Get, "/a/:x"));
        table.insert(route(Method::Get, "/a/:y"));
        assert_eq!(table.len(), 2);

        let (found, params) = table.lookup(Method::Get, "/a/1").unwrap();
        assert_eq!(found.path, "/a/:x");
        assert_eq!(params["x"], "1");
    }

    #[test]
    fn method_must_match() {
        let mut table = RouteTable::default();
        table.insert(route(Method::Get, "/users"));
        assert!(table.lookup(Method::Post, "/users").is_none());
    }
}
