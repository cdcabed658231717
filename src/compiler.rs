//! The route compiler: annotations plus controller and global defaults in,
//! compiled route definitions out.
//!
//! Every declarative input is resolved here, once, at startup. Option
//! precedence is route over controller over global over built-in default,
//! per field. Paths are normalized and parameter markers rewritten before
//! the matcher is compiled, so the dispatcher only ever sees one canonical
//! path syntax.

use std::sync::Arc;

use crate::annotation::{InputFormat, RouteAnnotation, Schema};
use crate::binding::Bindings;
use crate::controller::{Controller, GlobalOptions};
use crate::error::Error;
use crate::handler::{
    BoxFuture, ErrorHandler, HandlerResult, MethodFn, Middleware, PlainHandler, RouteHandler,
    Serializer, pass_through,
};
use crate::method::Method;
use crate::middleware::authorize::AuthorizeSpec;
use crate::middleware::{self, chain};
use crate::router::{PathPattern, RouteDefinition};

/// A route with every option resolved to its effective value. Input to the
/// chain assembler.
pub(crate) struct ResolvedRoute {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) use_query: bool,
    pub(crate) schema: Option<Schema>,
    pub(crate) limit: Option<u64>,
    pub(crate) format: Option<InputFormat>,
    pub(crate) controller_middlewares: Vec<Middleware>,
    pub(crate) route_middlewares: Vec<Middleware>,
    pub(crate) authorize: Option<AuthorizeSpec>,
    pub(crate) on_error: ErrorHandler,
    pub(crate) on_validation_failed: ErrorHandler,
    pub(crate) on_parsing_failed: ErrorHandler,
    pub(crate) on_limit_reached: PlainHandler,
    pub(crate) serializer: Option<Serializer>,
    pub(crate) documentation: Option<serde_json::Value>,
}

/// Compiles one (annotation, handler) pair into a route definition.
pub(crate) fn compile(
    annotation: &RouteAnnotation,
    method_name: &str,
    bindings: &Arc<Bindings>,
    func: &MethodFn,
    controller: &Controller,
    global: &GlobalOptions,
) -> Result<RouteDefinition, Error> {
    let options = &annotation.options;
    let method = annotation.method;

    if !method.can_have_body()
        && (options.schema.is_some() || options.limit.is_some() || options.format.is_some())
    {
        return Err(Error::BodyNotAllowed { method });
    }

    // a schema validates parsed JSON; a binary body can never satisfy it
    if options.schema.is_some() && options.format == Some(InputFormat::Binary) {
        return Err(Error::InvalidRouteArgument(
            "a schema requires a JSON input format".into(),
        ));
    }

    let path = resolve_path(controller.path(), method_name, options.path.as_deref());
    let pattern = PathPattern::compile(&path)?;

    let no_query = options.no_query_params.unwrap_or(global.no_query_params);

    // Authorization opts in at the route or controller level; global options
    // only contribute defaults for the fields the opted-in spec leaves unset.
    let authorize = match (&options.authorize, controller.authorize_spec()) {
        (Some(route_spec), Some(ctrl_spec)) => Some(route_spec.clone().or_defaults(ctrl_spec)),
        (Some(route_spec), None) => Some(route_spec.clone()),
        (None, Some(ctrl_spec)) => Some(ctrl_spec.clone()),
        (None, None) => None,
    }
    .map(|spec| match &global.authorize {
        Some(defaults) => spec.or_defaults(defaults),
        None => spec,
    });

    let resolved = ResolvedRoute {
        method,
        path: path.clone(),
        use_query: !no_query,
        schema: options.schema.clone(),
        limit: options.limit,
        format: options.format,
        controller_middlewares: controller.middlewares().to_vec(),
        route_middlewares: options.middlewares.clone(),
        authorize,
        on_error: options
            .on_error
            .clone()
            .or_else(|| controller.error_handler().cloned())
            .or_else(|| global.on_error.clone())
            .unwrap_or_else(middleware::default_error_handler),
        on_validation_failed: options
            .on_validation_failed
            .clone()
            .or_else(|| controller.validation_failed_handler().cloned())
            .or_else(|| global.on_validation_failed.clone())
            .unwrap_or_else(middleware::default_validation_failed_handler),
        on_parsing_failed: options
            .on_parsing_failed
            .clone()
            .or_else(|| controller.parsing_failed_handler().cloned())
            .or_else(|| global.on_parsing_failed.clone())
            .unwrap_or_else(middleware::default_parse_error_handler),
        on_limit_reached: options
            .on_limit_reached
            .clone()
            .or_else(|| global.on_limit_reached.clone())
            .unwrap_or_else(middleware::default_limit_reached_handler),
        serializer: options.serializer.clone().or_else(|| controller.serializer_override().cloned()),
        documentation: options.documentation.clone(),
    };

    let middlewares = chain::build(&resolved);

    Ok(RouteDefinition {
        method,
        path,
        pattern,
        middlewares,
        handler: bind_handler(Arc::clone(bindings), MethodFn::clone(func)),
        serializer: resolved.serializer.unwrap_or_else(pass_through),
        error_handler: resolved.on_error,
        documentation: resolved.documentation,
    })
}

/// Wraps a handler with its frozen bindings: the argument array is evaluated
/// against the matched request before the handler body runs, and a binding
/// failure (a transform error) is surfaced as the handler's error.
fn bind_handler(bindings: Arc<Bindings>, func: MethodFn) -> RouteHandler {
    Arc::new(move |ex| -> BoxFuture<HandlerResult> {
        let bindings = Arc::clone(&bindings);
        let func = MethodFn::clone(&func);
        Box::pin(async move {
            let args = match bindings.bind(&ex.request) {
                Ok(args) => args,
                Err(error) => return (ex, Err(error)),
            };
            func(ex, args).await
        })
    })
}

/// Joins the controller's base path with the method's segment. The method
/// name `index` maps to the base path itself; an explicit annotation path
/// replaces the method-name segment.
pub(crate) fn resolve_path(
    controller_path: &str,
    method_name: &str,
    explicit: Option<&str>,
) -> String {
    let tail = match explicit {
        Some(path) => path,
        None if method_name == "index" => "",
        None => method_name,
    };
    normalize_path(&format!("{controller_path}/{tail}"))
}

/// Canonical path form: a single leading slash, no empty or trailing
/// segments, and `@name` parameter markers rewritten to `:name`.
pub(crate) fn normalize_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('@') {
            Some(name) => format!(":{name}"),
            None => s.to_owned(),
        })
        .collect();

    if segments.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}", segments.join("/"))
    }
}
