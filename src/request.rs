//! Incoming HTTP request type.
//!
//! The transport layer has already decoded one request into method, path,
//! headers, and a byte/stream body before this type is built. Body parsing
//! is a middleware concern: the body starts as a stream and is replaced by
//! its buffered or parsed form once a body middleware has run.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use http::HeaderMap;
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;

use crate::error::{BoxError, Error};
use crate::method::Method;
use crate::value::Value;

/// The type-erased request body stream handed over by the transport.
pub type ReqBody = UnsyncBoxBody<Bytes, BoxError>;

/// The state of the request body as it moves through the middleware chain.
pub enum Body {
    /// Untouched — no body middleware has run yet.
    Stream(ReqBody),
    /// Buffered raw bytes (`buffer` middleware, or a limit without a schema).
    Buffered(Bytes),
    /// Parsed JSON (`json` middleware, schema-driven routes).
    Json(serde_json::Value),
    Empty,
}

/// An incoming HTTP request.
pub struct Request {
    method: Method,
    path: String,
    raw_query: Option<String>,
    headers: HeaderMap,
    params: HashMap<String, String>,
    query: Option<HashMap<String, String>>,
    body: Body,
}

impl Request {
    pub fn new(method: Method, path_and_query: &str, headers: HeaderMap, body: Body) -> Self {
        let (path, raw_query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p.to_owned(), Some(q.to_owned())),
            None => (path_and_query.to_owned(), None),
        };

        Self {
            method,
            path,
            raw_query,
            headers,
            params: HashMap::new(),
            query: None,
            body,
        }
    }

    /// Builder for transports and tests.
    pub fn builder(method: Method, path_and_query: &str) -> RequestBuilder {
        RequestBuilder {
            method,
            path_and_query: path_and_query.to_owned(),
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string, without the leading `?`.
    pub fn raw_query(&self) -> Option<&str> {
        self.raw_query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// The parsed query map. `None` until the query middleware has run.
    pub fn query(&self) -> Option<&HashMap<String, String>> {
        self.query.as_ref()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn set_query(&mut self, query: HashMap<String, String>) {
        self.query = Some(query);
    }

    pub(crate) fn set_body_json(&mut self, value: serde_json::Value) {
        self.body = Body::Json(value);
    }

    /// The body as a bindable [`Value`]. `Value::None` until a body
    /// middleware has buffered or parsed it.
    pub(crate) fn body_value(&self) -> Value {
        match &self.body {
            Body::Json(v) => Value::Json(v.clone()),
            Body::Buffered(b) => Value::Bytes(b.clone()),
            Body::Stream(_) | Body::Empty => Value::None,
        }
    }

    /// Buffers the body stream, enforcing `limit` frame by frame as bytes
    /// arrive. An oversized payload is rejected before the remainder is
    /// buffered, and the stream is dropped so further reads short-circuit.
    pub(crate) async fn read_body(&mut self, limit: Option<u64>) -> Result<Bytes, Error> {
        match std::mem::replace(&mut self.body, Body::Empty) {
            Body::Buffered(bytes) => {
                self.body = Body::Buffered(bytes.clone());
                Ok(bytes)
            }
            Body::Json(value) => {
                let bytes = Bytes::from(value.to_string().into_bytes());
                self.body = Body::Json(value);
                Ok(bytes)
            }
            Body::Empty => Ok(Bytes::new()),
            Body::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(frame) = stream.frame().await {
                    let frame = frame.map_err(Error::Body)?;
                    if let Ok(data) = frame.into_data() {
                        if let Some(limit) = limit {
                            if (buf.len() + data.len()) as u64 > limit {
                                return Err(Error::PayloadTooLarge);
                            }
                        }
                        buf.extend_from_slice(&data);
                    }
                }

                let bytes = buf.freeze();
                self.body = Body::Buffered(bytes.clone());
                Ok(bytes)
            }
        }
    }
}

/// Builds a [`Request`] piece by piece. Transports use it to hand decoded
/// requests to the dispatcher; tests use it to fabricate them.
pub struct RequestBuilder {
    method: Method,
    path_and_query: String,
    headers: HeaderMap,
    body: Body,
}

impl RequestBuilder {
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.parse::<http::header::HeaderName>(),
            value.parse::<http::header::HeaderValue>(),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Single-frame byte body.
    pub fn body_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        let full = http_body_util::Full::new(bytes.into())
            .map_err(|never| match never {})
            .boxed_unsync();
        self.body = Body::Stream(full);
        self
    }

    /// Arbitrary body stream, e.g. a multi-frame transport body.
    pub fn body_stream<B>(mut self, body: B) -> Self
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        self.body = Body::Stream(body.map_err(Into::into).boxed_unsync());
        self
    }

    pub fn build(self) -> Request {
        Request::new(self.method, &self.path_and_query, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_query() {
        let req = Request::builder(Method::Get, "/users/7?page=2&full=1").build();
        assert_eq!(req.path(), "/users/7");
        assert_eq!(req.raw_query(), Some("page=2&full=1"));
        assert!(req.query().is_none());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = Request::builder(Method::Get, "/")
            .header("X-Api-Key", "secret")
            .build();
        assert_eq!(req.header("x-api-key"), Some("secret"));
    }

    #[tokio::test]
    async fn read_body_buffers_once() {
        let mut req = Request::builder(Method::Post, "/").body_bytes("hello").build();
        assert_eq!(req.read_body(None).await.unwrap(), Bytes::from_static(b"hello"));
        // second read serves the buffered copy
        assert_eq!(req.read_body(None).await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn read_body_enforces_limit() {
        let mut req = Request::builder(Method::Post, "/").body_bytes(vec![0u8; 9]).build();
        assert!(matches!(req.read_body(Some(8)).await, Err(Error::PayloadTooLarge)));
        // the stream is gone; a retry yields nothing instead of re-reading
        assert_eq!(req.read_body(Some(8)).await.unwrap(), Bytes::new());
    }

    #[tokio::test]
    async fn exact_limit_is_accepted() {
        let mut req = Request::builder(Method::Post, "/").body_bytes(vec![0u8; 8]).build();
        assert_eq!(req.read_body(Some(8)).await.unwrap().len(), 8);
    }
}
