//! Controllers and the application registrar.
//!
//! A controller groups handlers under a base path and supplies shared
//! middleware, failure handlers, a serializer, and authorization defaults.
//! [`App::build`] walks every controller in registration order, freezes each
//! handler's bindings once, compiles every annotation into a route, and
//! produces the dispatcher. All configuration errors surface here, before a
//! single request is served.

use std::sync::Arc;

use tracing::debug;

use crate::annotation::RouteAnnotation;
use crate::binding::{BindingSpec, Bindings};
use crate::compiler;
use crate::dispatcher::Dispatcher;
use crate::docs::ApiDocument;
use crate::error::Error;
use crate::handler::{
    Args, ErrorHandler, Exchange, HandlerResult, MethodFn, Middleware, PlainHandler, Serializer,
    handler, middleware as lift_middleware,
};
use crate::middleware::authorize::AuthorizeSpec;
use crate::middleware::default_not_found_handler;
use crate::router::RouteTable;

/// One handler with its name, bindings, and route annotations.
pub struct ControllerMethod {
    name: String,
    func: MethodFn,
    bindings: Vec<BindingSpec>,
    annotations: Vec<RouteAnnotation>,
}

impl ControllerMethod {
    /// A handler named `name`. The name becomes the route's path segment
    /// unless an annotation declares an explicit path; the name `index` maps
    /// to the controller's base path.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Exchange, Args) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: handler(f),
            bindings: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Attaches a route annotation. A handler may carry several, one per
    /// verb or path; they all share the handler's parameter bindings.
    pub fn route(mut self, annotation: RouteAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Declares where one handler argument comes from.
    pub fn bind(mut self, spec: BindingSpec) -> Self {
        self.bindings.push(spec);
        self
    }
}

/// A group of handlers sharing a base path and common options.
pub struct Controller {
    path: String,
    methods: Vec<ControllerMethod>,
    middlewares: Vec<Middleware>,
    on_error: Option<ErrorHandler>,
    on_validation_failed: Option<ErrorHandler>,
    on_parsing_failed: Option<ErrorHandler>,
    serializer: Option<Serializer>,
    authorize: Option<AuthorizeSpec>,
}

impl Controller {
    /// A controller rooted at `path`. The path may carry `@name` parameter
    /// markers; it is normalized when routes are compiled.
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: Vec::new(),
            middlewares: Vec::new(),
            on_error: None,
            on_validation_failed: None,
            on_parsing_failed: None,
            serializer: None,
            authorize: None,
        }
    }

    /// Adds a middleware that runs for every route of this controller,
    /// before route-specific middleware.
    pub fn middleware<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Exchange) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = crate::handler::MiddlewareResult> + Send + 'static,
    {
        self.middlewares.push(lift_middleware(f));
        self
    }

    pub fn on_error(mut self, handler: ErrorHandler) -> Self {
        self.on_error = Some(handler);
        self
    }

    pub fn on_validation_failed(mut self, handler: ErrorHandler) -> Self {
        self.on_validation_failed = Some(handler);
        self
    }

    pub fn on_parsing_failed(mut self, handler: ErrorHandler) -> Self {
        self.on_parsing_failed = Some(handler);
        self
    }

    pub fn serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Protects every route of this controller. Route-level specs override
    /// this one field by field.
    pub fn authorize(mut self, spec: AuthorizeSpec) -> Self {
        self.authorize = Some(spec);
        self
    }

    pub fn method(mut self, method: ControllerMethod) -> Self {
        self.methods.push(method);
        self
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn middlewares(&self) -> &[Middleware] {
        &self.middlewares
    }

    pub(crate) fn error_handler(&self) -> Option<&ErrorHandler> {
        self.on_error.as_ref()
    }

    pub(crate) fn validation_failed_handler(&self) -> Option<&ErrorHandler> {
        self.on_validation_failed.as_ref()
    }

    pub(crate) fn parsing_failed_handler(&self) -> Option<&ErrorHandler> {
        self.on_parsing_failed.as_ref()
    }

    pub(crate) fn serializer_override(&self) -> Option<&Serializer> {
        self.serializer.as_ref()
    }

    pub(crate) fn authorize_spec(&self) -> Option<&AuthorizeSpec> {
        self.authorize.as_ref()
    }
}

/// Details of one registered route, passed to the registration observer.
pub struct RouteRegistered {
    pub controller: String,
    pub method: String,
    pub name: String,
    pub path: String,
}

/// Application-wide defaults and registration observers.
#[derive(Clone, Default)]
pub struct GlobalOptions {
    /// Disables the query parser for every route that does not opt back in.
    pub no_query_params: bool,
    pub on_error: Option<ErrorHandler>,
    pub on_validation_failed: Option<ErrorHandler>,
    pub on_parsing_failed: Option<ErrorHandler>,
    pub on_limit_reached: Option<PlainHandler>,
    /// Authorization defaults for routes and controllers that opt in.
    pub authorize: Option<AuthorizeSpec>,
    pub on_method_registered: Option<Arc<dyn Fn(&RouteRegistered) + Send + Sync>>,
    pub on_controller_registered: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

/// The application under construction: global options, controllers, and the
/// not-found hook.
pub struct App {
    options: GlobalOptions,
    controllers: Vec<Controller>,
    not_found: Option<PlainHandler>,
}

impl App {
    pub fn new() -> Self {
        Self::with_options(GlobalOptions::default())
    }

    pub fn with_options(options: GlobalOptions) -> Self {
        Self { options, controllers: Vec::new(), not_found: None }
    }

    pub fn controller(mut self, controller: Controller) -> Self {
        self.controllers.push(controller);
        self
    }

    /// Handler for requests no route matches. Defaults to an empty `404`.
    pub fn not_found(mut self, handler: PlainHandler) -> Self {
        self.not_found = Some(handler);
        self
    }

    /// Compiles every controller into the dispatcher. Configuration errors
    /// (invalid annotation shapes, duplicate bindings, body options on
    /// body-less verbs, duplicate documentation) abort the build.
    pub fn build(self) -> Result<Dispatcher, Error> {
        let mut table = RouteTable::default();
        let mut docs = ApiDocument::default();

        for controller in &self.controllers {
            for method in &controller.methods {
                let bindings = Arc::new(Bindings::freeze(method.bindings.clone())?);

                for annotation in &method.annotations {
                    let route = compiler::compile(
                        annotation,
                        &method.name,
                        &bindings,
                        &method.func,
                        controller,
                        &self.options,
                    )?;

                    if let Some(fragment) = &route.documentation {
                        docs.register(route.method, &route.path, fragment.clone())?;
                    }

                    debug!(method = %route.method, path = %route.path, "route registered");
                    if let Some(observer) = &self.options.on_method_registered {
                        observer(&RouteRegistered {
                            controller: controller.path.clone(),
                            method: route.method.to_string(),
                            name: method.name.clone(),
                            path: route.path.clone(),
                        });
                    }

                    table.insert(route);
                }
            }

            debug!(path = %controller.path, "controller registered");
            if let Some(observer) = &self.options.on_controller_registered {
                observer(&controller.path);
            }
        }

        Ok(Dispatcher::new(
            table,
            self.not_found.unwrap_or_else(default_not_found_handler),
            docs,
        ))
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
