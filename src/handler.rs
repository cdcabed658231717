//! Handler, middleware, and failure-handler contracts.
//!
//! # How the pipeline stores its steps
//!
//! Every step of a compiled route — middleware, the bound handler, the
//! serializer, the failure handlers — is a different concrete type, yet one
//! route table has to hold them all. Each contract is therefore a boxed
//! `dyn Fn` returning a boxed future, and each has a small constructor
//! (`middleware`, `handler`, …) that lifts a plain `async` closure into the
//! erased form:
//!
//! ```text
//! |ex, args| async move { … }          ← user writes this
//!        ↓ handler(f)
//! Arc<dyn Fn(Exchange, Args) -> BoxFuture<…>>   ← stored in the route table
//! ```
//!
//! Ownership of the request/response pair travels *through* each step as an
//! [`Exchange`] and comes back out, so no step ever borrows across an await
//! point and the whole pipeline stays `Send`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::value::Value;

/// A heap-allocated, type-erased future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// The bound argument array produced by the parameter binder.
pub type Args = Vec<Value>;

/// One request's mutable state: the decoded request and the response being
/// built. Owned exclusively by that request's task.
pub struct Exchange {
    pub request: Request,
    pub response: Response,
}

impl Exchange {
    pub fn new(request: Request) -> Self {
        Self { request, response: Response::new() }
    }
}

/// What a middleware tells the dispatcher to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Hand the exchange to the next step. The equivalent of calling `next`
    /// exactly once.
    Continue,
    /// Stop the chain. The response has been written (validation failure,
    /// parse failure, limit reached, authorization denied).
    Halt,
}

pub type MiddlewareResult = (Exchange, Result<Flow, Error>);
pub type HandlerResult = (Exchange, Result<Option<Value>, Error>);
pub type SerializerResult = (Exchange, Result<(), Error>);

/// A request-processing step. Errors abort the remaining chain and route
/// control to the chain's governing error handler.
pub type Middleware = Arc<dyn Fn(Exchange) -> BoxFuture<MiddlewareResult> + Send + Sync>;

/// A controller method: bound arguments in, candidate result out.
pub type MethodFn = Arc<dyn Fn(Exchange, Args) -> BoxFuture<HandlerResult> + Send + Sync>;

/// A compiled handler with its parameter bindings already applied.
pub(crate) type RouteHandler = Arc<dyn Fn(Exchange) -> BoxFuture<HandlerResult> + Send + Sync>;

/// Turns a handler's raw return value into response bytes.
pub type Serializer =
    Arc<dyn Fn(Option<Value>, Exchange) -> BoxFuture<SerializerResult> + Send + Sync>;

/// Receives a request-time error and must produce (and end) a response.
pub type ErrorHandler = Arc<dyn Fn(Error, Exchange) -> BoxFuture<Exchange> + Send + Sync>;

/// A bare request handler: not-found and limit-reached hooks.
pub type PlainHandler = Arc<dyn Fn(Exchange) -> BoxFuture<Exchange> + Send + Sync>;

/// Lifts an async closure into a [`Middleware`].
pub fn middleware<F, Fut>(f: F) -> Middleware
where
    F: Fn(Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    Arc::new(move |ex| -> BoxFuture<MiddlewareResult> { Box::pin(f(ex)) })
}

/// Lifts an async closure into a [`MethodFn`].
pub fn handler<F, Fut>(f: F) -> MethodFn
where
    F: Fn(Exchange, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ex, args| -> BoxFuture<HandlerResult> { Box::pin(f(ex, args)) })
}

/// Lifts an async closure into a [`Serializer`].
pub fn serializer<F, Fut>(f: F) -> Serializer
where
    F: Fn(Option<Value>, Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SerializerResult> + Send + 'static,
{
    Arc::new(move |value, ex| -> BoxFuture<SerializerResult> { Box::pin(f(value, ex)) })
}

/// Lifts an async closure into an [`ErrorHandler`].
pub fn error_handler<F, Fut>(f: F) -> ErrorHandler
where
    F: Fn(Error, Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Exchange> + Send + 'static,
{
    Arc::new(move |error, ex| -> BoxFuture<Exchange> { Box::pin(f(error, ex)) })
}

/// Lifts an async closure into a [`PlainHandler`].
pub fn request_handler<F, Fut>(f: F) -> PlainHandler
where
    F: Fn(Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Exchange> + Send + 'static,
{
    Arc::new(move |ex| -> BoxFuture<Exchange> { Box::pin(f(ex)) })
}

/// The pass-through serializer, used when a route configures none: the
/// handler's raw return value is written to the response unchanged. Strings
/// and bytes go out verbatim; structured values are rendered as JSON.
pub(crate) fn pass_through() -> Serializer {
    serializer(|value, mut ex| async move {
        if let Some(value) = value {
            if !ex.response.is_ended() {
                write_value(&mut ex.response, &value);
            }
        }
        (ex, Ok(()))
    })
}

fn write_value(response: &mut Response, value: &Value) {
    match value {
        Value::None | Value::Request | Value::Response => {}
        Value::Str(s) => response.write(s.as_bytes()),
        Value::Bytes(b) => response.write(b),
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => response.write(value.to_text()),
        Value::Json(_) | Value::Map(_) => {
            if response.header("content-type").is_none() {
                response.set_header("content-type", "application/json");
            }
            response.write(value.to_json().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    fn exchange() -> Exchange {
        Exchange::new(Request::builder(Method::Get, "/").build())
    }

    #[tokio::test]
    async fn pass_through_writes_strings_verbatim() {
        let (ex, result) = pass_through()(Some(Value::from("hello")), exchange()).await;
        assert!(result.is_ok());
        assert_eq!(ex.response.body(), b"hello");
        assert!(ex.response.header("content-type").is_none());
    }

    #[tokio::test]
    async fn pass_through_renders_structured_values_as_json() {
        let value = Value::Json(serde_json::json!({ "id": 7 }));
        let (ex, _) = pass_through()(Some(value), exchange()).await;
        assert_eq!(ex.response.header("content-type"), Some("application/json"));
        assert_eq!(ex.response.body(), br#"{"id":7}"#);
    }

    #[tokio::test]
    async fn pass_through_respects_an_ended_response() {
        let mut ex = exchange();
        ex.response.text("done");
        ex.response.end();
        let (ex, _) = pass_through()(Some(Value::from("late")), ex).await;
        assert_eq!(ex.response.body(), b"done");
    }
}
