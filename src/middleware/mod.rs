//! Built-in middleware and default failure handlers.
//!
//! The route compiler assembles these into each route's chain: the query
//! parser, the raw and JSON body parsers, and the schema validator. Each
//! body parser enforces its byte limit incrementally as frames arrive and
//! routes an oversized payload to the limit-reached handler with a forced
//! response end, so an attacker cannot make the server buffer an unbounded
//! body.

pub(crate) mod authorize;
pub(crate) mod chain;

use std::collections::HashMap;

use http::StatusCode;

use crate::annotation::{InputFormat, Schema};
use crate::error::Error;
use crate::handler::{
    ErrorHandler, Exchange, Flow, Middleware, PlainHandler, error_handler, middleware,
    request_handler,
};
use crate::request::Body;

/// Default limit of a body parser: 128 MiB.
pub const DEFAULT_BODY_LIMIT: u64 = 134_217_728;

// ── Default failure handlers ──────────────────────────────────────────────────
//
// All of them are idempotent against a response another handler already
// ended: `end_with` is a no-op on an ended response.

/// Default validation-failure handler: empty `400`.
pub fn default_validation_failed_handler() -> ErrorHandler {
    error_handler(|_error, mut ex| async move {
        ex.response.end_with(StatusCode::BAD_REQUEST);
        ex
    })
}

/// Default parse-failure handler: empty `400`.
pub fn default_parse_error_handler() -> ErrorHandler {
    error_handler(|_error, mut ex| async move {
        ex.response.end_with(StatusCode::BAD_REQUEST);
        ex
    })
}

/// Default limit-reached handler: empty `413`.
pub fn default_limit_reached_handler() -> PlainHandler {
    request_handler(|mut ex| async move {
        ex.response.end_with(StatusCode::PAYLOAD_TOO_LARGE);
        ex
    })
}

/// Default error handler: empty `500`, no detail leaked.
pub fn default_error_handler() -> ErrorHandler {
    error_handler(|_error, mut ex| async move {
        ex.response.end_with(StatusCode::INTERNAL_SERVER_ERROR);
        ex
    })
}

/// Default not-found handler: empty `404`.
pub fn default_not_found_handler() -> PlainHandler {
    request_handler(|mut ex| async move {
        ex.response.end_with(StatusCode::NOT_FOUND);
        ex
    })
}

// ── Query parsing ─────────────────────────────────────────────────────────────

/// Parses the query string into the request's query map.
pub fn query() -> Middleware {
    middleware(|mut ex: Exchange| async move {
        let parsed = ex.request.raw_query().map(parse_query).unwrap_or_default();
        ex.request.set_query(parsed);
        (ex, Ok(Flow::Continue))
    })
}

pub(crate) fn parse_query(raw: &str) -> HashMap<String, String> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_component(k), decode_component(v)),
            None => (decode_component(pair), String::new()),
        })
        .collect()
}

/// Form decoding: `+` means space, then percent-unescaping. Decoding goes
/// through bytes so an invalid or truncated escape stays literal instead of
/// failing the whole pair.
fn decode_component(text: &str) -> String {
    let spaced = text.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

// ── Body parsing ──────────────────────────────────────────────────────────────

/// Buffers the raw body, enforcing `limit` as bytes arrive.
pub fn buffer(limit: Option<u64>, on_limit_reached: PlainHandler) -> Middleware {
    middleware(move |mut ex: Exchange| {
        let on_limit = PlainHandler::clone(&on_limit_reached);
        async move {
            match ex.request.read_body(Some(limit.unwrap_or(DEFAULT_BODY_LIMIT))).await {
                Ok(_) => (ex, Ok(Flow::Continue)),
                Err(Error::PayloadTooLarge) => (limit_reached(ex, on_limit).await, Ok(Flow::Halt)),
                Err(other) => (ex, Err(other)),
            }
        }
    })
}

/// Buffers and JSON-parses the body. Malformed bytes are routed to the
/// parse-failure handler, which terminates the response.
pub fn json(
    limit: Option<u64>,
    on_parsing_failed: ErrorHandler,
    on_limit_reached: PlainHandler,
) -> Middleware {
    middleware(move |mut ex: Exchange| {
        let on_parse = ErrorHandler::clone(&on_parsing_failed);
        let on_limit = PlainHandler::clone(&on_limit_reached);
        async move {
            let bytes = match ex.request.read_body(Some(limit.unwrap_or(DEFAULT_BODY_LIMIT))).await
            {
                Ok(bytes) => bytes,
                Err(Error::PayloadTooLarge) => {
                    return (limit_reached(ex, on_limit).await, Ok(Flow::Halt));
                }
                Err(other) => return (ex, Err(other)),
            };

            let parsed = if bytes.is_empty() {
                Ok(serde_json::Value::Null)
            } else {
                serde_json::from_slice(&bytes)
            };

            match parsed {
                Ok(value) => {
                    ex.request.set_body_json(value);
                    (ex, Ok(Flow::Continue))
                }
                Err(e) => {
                    let mut ex = on_parse(Error::Parse(e.to_string()), ex).await;
                    ex.response.end();
                    (ex, Ok(Flow::Halt))
                }
            }
        }
    })
}

/// Picks the body parser for a declared input format.
pub(crate) fn by_format(
    format: InputFormat,
    limit: Option<u64>,
    on_parsing_failed: ErrorHandler,
    on_limit_reached: PlainHandler,
) -> Middleware {
    match format {
        InputFormat::Binary => buffer(limit, on_limit_reached),
        InputFormat::Json => json(limit, on_parsing_failed, on_limit_reached),
    }
}

async fn limit_reached(ex: Exchange, on_limit: PlainHandler) -> Exchange {
    let mut ex = on_limit(ex).await;
    // a size-limit violation always force-ends the response
    ex.response.end();
    ex
}

// ── Schema validation ─────────────────────────────────────────────────────────

/// Checks the parsed body against `schema`. The failure handler observes a
/// response that is not yet ended; after it runs the response is always
/// terminated, so a violating body can never reach the handler.
pub fn validate(schema: Schema, on_validation_failed: ErrorHandler) -> Middleware {
    middleware(move |ex: Exchange| {
        let schema = schema.clone();
        let on_failed = ErrorHandler::clone(&on_validation_failed);
        async move {
            let verdict = match ex.request.body() {
                Body::Json(value) => schema.check(value),
                _ => Err(Error::Validation("request body was not parsed as JSON".into())),
            };

            match verdict {
                Ok(()) => (ex, Ok(Flow::Continue)),
                Err(error) => {
                    let mut ex = on_failed(error, ex).await;
                    ex.response.end();
                    (ex, Ok(Flow::Halt))
                }
            }
        }
    })
}
