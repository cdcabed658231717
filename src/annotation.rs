//! Route annotations: the declarative input to the route compiler.
//!
//! One annotation describes one HTTP verb's routing and processing options
//! for a handler; a handler may carry several annotations sharing one
//! parameter list. The original surface accepts many call shapes (a limit, a
//! schema, a path, a middleware list, a full options object), so annotation
//! construction goes through a single argument classifier that turns any
//! accepted shape into one tagged options record and rejects everything else
//! with a descriptive error.

use std::sync::Arc;

use crate::error::Error;
use crate::handler::{ErrorHandler, Middleware, PlainHandler, Serializer};
use crate::method::Method;
use crate::middleware::authorize::AuthorizeSpec;

/// The declared format of a request body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    Binary,
    Json,
}

/// A body validation schema.
///
/// Schema checking itself is an external concern; the engine only needs a
/// verdict for a parsed JSON body. Wrap whatever validator you use:
///
/// ```rust
/// use ruta::Schema;
///
/// let schema = Schema::new(|body| {
///     if body.get("name").map(|v| v.is_string()).unwrap_or(false) {
///         Ok(())
///     } else {
///         Err("`name` must be a string".into())
///     }
/// });
/// ```
#[derive(Clone)]
pub struct Schema(Arc<dyn Fn(&serde_json::Value) -> Result<(), String> + Send + Sync>);

impl Schema {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self(Arc::new(check))
    }

    pub fn check(&self, body: &serde_json::Value) -> Result<(), Error> {
        (self.0)(body).map_err(Error::Validation)
    }
}

/// One positional argument of a route annotation, before classification.
pub enum RouteArg {
    /// A body size limit in MiB.
    Limit(f64),
    Format(InputFormat),
    Path(String),
    Schema(Schema),
    Middlewares(Vec<Middleware>),
    Options(Box<RouteOptions>),
}

/// The tagged options record every accepted call shape resolves to.
#[derive(Clone, Default)]
pub struct RouteOptions {
    /// Explicit route path. Replaces the method-name segment when present.
    pub path: Option<String>,
    /// Body size limit in bytes.
    pub limit: Option<u64>,
    pub format: Option<InputFormat>,
    pub schema: Option<Schema>,
    /// Route-specific middleware, run after controller-wide middleware.
    pub middlewares: Vec<Middleware>,
    pub authorize: Option<AuthorizeSpec>,
    pub on_error: Option<ErrorHandler>,
    pub on_validation_failed: Option<ErrorHandler>,
    pub on_parsing_failed: Option<ErrorHandler>,
    pub on_limit_reached: Option<PlainHandler>,
    pub serializer: Option<Serializer>,
    /// Route-level override of the query-parser toggle.
    pub no_query_params: Option<bool>,
    /// Documentation fragment registered under this route's doc path.
    pub documentation: Option<serde_json::Value>,
}

/// Declarative route metadata for one (handler, verb) pair.
#[derive(Clone)]
pub struct RouteAnnotation {
    pub method: Method,
    pub options: RouteOptions,
}

impl std::fmt::Debug for RouteAnnotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteAnnotation")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl RouteAnnotation {
    /// An annotation with default options: path derived from the method
    /// name, no body handling, no overrides.
    pub fn new(method: Method) -> Self {
        Self { method, options: RouteOptions::default() }
    }

    pub fn with(method: Method, options: RouteOptions) -> Self {
        Self { method, options }
    }

    /// Classifies a positional argument list into one options record.
    ///
    /// Accepted shapes:
    /// - *(nothing)*
    /// - `limit` `[format]`
    /// - `options`
    /// - `schema` `[limit]`
    /// - `middlewares`
    /// - `path` `[middlewares | schema [limit]]`
    ///
    /// Every other shape is rejected with a descriptive error.
    pub fn from_args(method: Method, args: Vec<RouteArg>) -> Result<Self, Error> {
        let mut args = args.into_iter();
        let options = match args.next() {
            None => RouteOptions::default(),

            Some(RouteArg::Options(options)) => {
                if args.next().is_some() {
                    return Err(Error::InvalidRouteArgument(
                        "an options record must be the only argument".into(),
                    ));
                }
                *options
            }

            Some(RouteArg::Limit(mb)) => {
                let mut options = RouteOptions { limit: Some(mb_to_bytes(mb)), ..Default::default() };
                match args.next() {
                    None => {}
                    Some(RouteArg::Format(format)) => options.format = Some(format),
                    Some(_) => {
                        return Err(Error::InvalidRouteArgument(
                            "the second argument after a limit must be an input format".into(),
                        ));
                    }
                }
                options
            }

            Some(RouteArg::Schema(schema)) => {
                let mut options = RouteOptions { schema: Some(schema), ..Default::default() };
                match args.next() {
                    None => {}
                    Some(RouteArg::Limit(mb)) => options.limit = Some(mb_to_bytes(mb)),
                    Some(_) => {
                        return Err(Error::InvalidRouteArgument(
                            "the second argument after a schema must be a limit".into(),
                        ));
                    }
                }
                options
            }

            Some(RouteArg::Middlewares(middlewares)) => {
                if args.next().is_some() {
                    return Err(Error::InvalidRouteArgument(
                        "a middleware list must be the only argument".into(),
                    ));
                }
                RouteOptions { middlewares, ..Default::default() }
            }

            Some(RouteArg::Path(path)) => {
                let mut options = RouteOptions { path: Some(path), ..Default::default() };
                match args.next() {
                    None => {}
                    Some(RouteArg::Middlewares(middlewares)) => options.middlewares = middlewares,
                    Some(RouteArg::Schema(schema)) => {
                        options.schema = Some(schema);
                        match args.next() {
                            None => {}
                            Some(RouteArg::Limit(mb)) => options.limit = Some(mb_to_bytes(mb)),
                            Some(_) => {
                                return Err(Error::InvalidRouteArgument(
                                    "the third argument after a path and schema must be a limit"
                                        .into(),
                                ));
                            }
                        }
                    }
                    Some(_) => {
                        return Err(Error::InvalidRouteArgument(
                            "the second argument after a path must be a middleware list or a schema"
                                .into(),
                        ));
                    }
                }
                options
            }

            Some(RouteArg::Format(_)) => {
                return Err(Error::InvalidRouteArgument(
                    "an input format is only valid after a limit".into(),
                ));
            }
        };

        if args.next().is_some() {
            return Err(Error::InvalidRouteArgument("too many arguments".into()));
        }

        Ok(Self { method, options })
    }
}

/// Annotation limits are given in MiB; routes store bytes.
pub(crate) fn mb_to_bytes(mb: f64) -> u64 {
    (mb * 1_048_576.0) as u64
}
