//! Request dispatch: route lookup and pipeline execution.
//!
//! One dispatch owns the exchange for the whole request. Any request-time
//! error — from a middleware, the binder, or the handler itself — is routed
//! to the route's resolved error handler; errors never escape to the
//! transport, and a handler that forgets to end the response still gets a
//! terminated one.

use tracing::{debug, warn};

use crate::compiler::normalize_path;
use crate::docs::ApiDocument;
use crate::error::Error;
use crate::handler::{Exchange, Flow, PlainHandler};
use crate::router::{RouteDefinition, RouteTable};

/// The compiled application: the route table plus the not-found hook and
/// the aggregated API documentation.
pub struct Dispatcher {
    table: RouteTable,
    not_found: PlainHandler,
    docs: ApiDocument,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("route_count", &self.table.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub(crate) fn new(table: RouteTable, not_found: PlainHandler, docs: ApiDocument) -> Self {
        Self { table, not_found, docs }
    }

    pub fn route_count(&self) -> usize {
        self.table.len()
    }

    pub fn api_document(&self) -> &ApiDocument {
        &self.docs
    }

    /// Runs one request through its matched route's pipeline. Always returns
    /// an ended response.
    pub async fn dispatch(&self, mut ex: Exchange) -> Exchange {
        let method = ex.request.method();
        let path = normalize_path(ex.request.path());

        let Some((route, params)) = self.table.lookup(method, &path) else {
            debug!(%method, %path, "no route matched");
            let mut ex = (self.not_found)(ex).await;
            ex.response.end();
            return ex;
        };

        ex.request.set_params(params);

        for step in &route.middlewares {
            let (next, result) = step(ex).await;
            ex = next;
            match result {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => {
                    // the halting middleware has written the response
                    ex.response.end();
                    return ex;
                }
                Err(error) => return self.fail(route, error, ex).await,
            }
        }

        let (next, result) = (route.handler)(ex).await;
        ex = next;
        let value = match result {
            Ok(value) => value,
            Err(error) => return self.fail(route, error, ex).await,
        };

        let (next, result) = (route.serializer)(value, ex).await;
        ex = next;
        if let Err(error) = result {
            return self.fail(route, error, ex).await;
        }

        ex.response.end();
        ex
    }

    /// Recovers a request-time error through the route's error handler.
    async fn fail(&self, route: &RouteDefinition, error: Error, ex: Exchange) -> Exchange {
        debug!(method = %route.method, path = %route.path, %error, "request failed");
        let mut ex = (route.error_handler)(error, ex).await;
        if !ex.response.is_ended() {
            warn!(
                method = %route.method,
                path = %route.path,
                "error handler did not end the response"
            );
            ex.response.end();
        }
        ex
    }
}
