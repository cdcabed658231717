//! # ruta
//!
//! Declarative controller routing and dispatch for HTTP services.
//!
//! ## The contract
//!
//! Routing behavior is declared, not coded. A handler carries annotations —
//! verb, path, body limit, schema, middleware — and binding specs that say
//! where each of its arguments comes from. [`App::build`] compiles all of it
//! into one normalized route table, and every configuration mistake (an
//! unknown parameter source, a schema on a GET route, two bindings for one
//! index, conflicting documentation) fails there, at startup, never at
//! request time.
//!
//! Per request the pipeline is fixed: query parsing, body parsing with an
//! incremental byte limit, schema validation, controller-wide middleware,
//! route middleware, authorization, parameter binding, the handler, and the
//! serializer. Any step can halt with a finished response; any error is
//! recovered by the route's error handler. The transport never sees a
//! failure.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ruta::{
//!     App, BindingSpec, Controller, ControllerMethod, Method, RouteAnnotation, Server, Value,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = App::new()
//!         .controller(
//!             Controller::at("/users")
//!                 .method(
//!                     ControllerMethod::new("index", |ex, _args| async move {
//!                         (ex, Ok(Some(Value::from(r#"[{"id":"1"}]"#))))
//!                     })
//!                     .route(RouteAnnotation::new(Method::Get)),
//!                 )
//!                 .method(
//!                     ControllerMethod::new("details", |ex, args| async move {
//!                         let id = args[2].to_text();
//!                         (ex, Ok(Some(Value::from(format!(r#"{{"id":"{id}"}}"#)))))
//!                     })
//!                     .route({
//!                         let mut a = RouteAnnotation::new(Method::Get);
//!                         a.options.path = Some("@id".into());
//!                         a
//!                     })
//!                     .bind(BindingSpec::new(2, "id")),
//!                 ),
//!         )
//!         .build()
//!         .unwrap();
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//! ```

mod annotation;
mod binding;
mod compiler;
mod controller;
mod dispatcher;
mod docs;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod value;

pub mod middleware;

pub use annotation::{InputFormat, RouteAnnotation, RouteArg, RouteOptions, Schema};
pub use binding::{BindingSpec, Source};
pub use controller::{App, Controller, ControllerMethod, GlobalOptions, RouteRegistered};
pub use dispatcher::Dispatcher;
pub use docs::ApiDocument;
pub use error::{BoxError, Error};
pub use handler::{
    Args, BoxFuture, ErrorHandler, Exchange, Flow, HandlerResult, MethodFn, Middleware,
    MiddlewareResult, PlainHandler, Serializer, SerializerResult, error_handler, handler,
    middleware, request_handler, serializer,
};
pub use method::Method;
pub use middleware::authorize::{
    AuthorizeSpec, AuthorizedUser, RoleValidator, UserLookup, user_lookup,
};
pub use request::{Body, ReqBody, Request, RequestBuilder};
pub use response::Response;
pub use server::Server;
pub use value::{Transform, TransformFn, Value};
