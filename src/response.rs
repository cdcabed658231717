//! Outgoing HTTP response type.
//!
//! Unlike a build-once value, this response is mutated as the request moves
//! through the chain: middleware and failure handlers may write to it, and
//! [`end`](Response::end) seals it. All writes after `end` are ignored, which
//! is what makes the default failure handlers idempotent against a response
//! another handler already closed.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

/// An outgoing HTTP response, owned by exactly one request's task.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    ended: bool,
}

impl Response {
    /// A fresh `200 OK` response with no headers and no body.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            ended: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        if !self.ended {
            self.status = status;
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets a header. Invalid names or values are dropped.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if self.ended {
            return;
        }
        if let (Ok(name), Ok(value)) = (
            name.parse::<http::header::HeaderName>(),
            value.parse::<http::header::HeaderValue>(),
        ) {
            self.headers.insert(name, value);
        }
    }

    /// Appends bytes to the body. Ignored once the response is ended.
    pub fn write(&mut self, bytes: impl AsRef<[u8]>) {
        if !self.ended {
            self.body.extend_from_slice(bytes.as_ref());
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Writes a JSON body and sets the content type.
    pub fn json(&mut self, bytes: impl AsRef<[u8]>) {
        self.set_header("content-type", "application/json");
        self.write(bytes);
    }

    /// Writes a plain-text body and sets the content type.
    pub fn text(&mut self, body: impl AsRef<str>) {
        self.set_header("content-type", "text/plain; charset=utf-8");
        self.write(body.as_ref().as_bytes());
    }

    /// Seals the response. Further mutation is ignored.
    pub fn end(&mut self) {
        self.ended = true;
    }

    /// Sets `status` with an empty body and ends the response, unless it is
    /// already ended. The default failure handlers are built on this.
    pub fn end_with(&mut self, status: StatusCode) {
        if !self.ended {
            self.status = status;
            self.end();
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_ignored_after_end() {
        let mut res = Response::new();
        res.text("hello");
        res.end();
        res.write("world");
        res.set_status(StatusCode::IM_A_TEAPOT);
        assert_eq!(res.body(), b"hello");
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn end_with_is_idempotent() {
        let mut res = Response::new();
        res.end_with(StatusCode::BAD_REQUEST);
        res.end_with(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.is_ended());
        assert!(res.body().is_empty());
    }
}
