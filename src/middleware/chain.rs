//! Assembles a resolved route's middleware chain.
//!
//! The order is fixed and not configurable: query parser, body parser,
//! schema validator, controller-wide middleware, route middleware,
//! authorization. Parsing precedes validation so the validator sees a
//! decoded body; authorization runs last so custom middleware can enrich
//! the request before the user lookup sees it.

use crate::annotation::InputFormat;
use crate::compiler::ResolvedRoute;
use crate::handler::Middleware;
use crate::middleware::{authorize, by_format, query, validate};

pub(crate) fn build(route: &ResolvedRoute) -> Vec<Middleware> {
    let mut chain = Vec::new();

    if route.use_query {
        chain.push(query());
    }

    match &route.schema {
        Some(schema) => {
            // a schema implies a JSON body unless the route says otherwise
            chain.push(by_format(
                route.format.unwrap_or(InputFormat::Json),
                route.limit,
                route.on_parsing_failed.clone(),
                route.on_limit_reached.clone(),
            ));
            chain.push(validate(schema.clone(), route.on_validation_failed.clone()));
        }
        None if route.limit.is_some() || route.format.is_some() => {
            chain.push(by_format(
                route.format.unwrap_or(InputFormat::Binary),
                route.limit,
                route.on_parsing_failed.clone(),
                route.on_limit_reached.clone(),
            ));
        }
        None => {}
    }

    chain.extend(route.controller_middlewares.iter().cloned());
    chain.extend(route.route_middlewares.iter().cloned());

    if let Some(spec) = &route.authorize {
        chain.push(authorize::build(spec.clone()));
    }

    chain
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::annotation::Schema;
    use crate::handler::{Exchange, Flow, middleware};
    use crate::method::Method;
    use crate::middleware::{
        self, authorize::AuthorizeSpec, authorize::AuthorizedUser, authorize::user_lookup,
    };
    use crate::request::Request;

    fn marker(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Middleware {
        let log = log.clone();
        middleware(move |ex: Exchange| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(name);
                (ex, Ok(Flow::Continue))
            }
        })
    }

    fn logging_route(log: &Arc<Mutex<Vec<&'static str>>>) -> ResolvedRoute {
        let query_seen = log.clone();
        ResolvedRoute {
            method: Method::Post,
            path: "/items".into(),
            use_query: true,
            schema: Some(Schema::new(move |_| {
                query_seen.lock().unwrap().push("validate");
                Ok(())
            })),
            limit: None,
            format: None,
            controller_middlewares: vec![marker(log, "controller")],
            route_middlewares: vec![marker(log, "route")],
            authorize: Some(AuthorizeSpec::default().find_user({
                let log = log.clone();
                user_lookup(move |ex: Exchange| {
                    let log = log.clone();
                    async move {
                        log.lock().unwrap().push("authorize");
                        (ex, Some(AuthorizedUser::default()))
                    }
                })
            })),
            on_error: middleware::default_error_handler(),
            on_validation_failed: middleware::default_validation_failed_handler(),
            on_parsing_failed: middleware::default_parse_error_handler(),
            on_limit_reached: middleware::default_limit_reached_handler(),
            serializer: None,
            documentation: None,
        }
    }

    #[tokio::test]
    async fn steps_run_in_the_fixed_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = build(&logging_route(&log));

        let mut ex =
            Exchange::new(Request::builder(Method::Post, "/items").body_bytes("{}").build());
        for step in &chain {
            let (next, result) = step(ex).await;
            assert_eq!(result.unwrap(), Flow::Continue);
            ex = next;
        }

        assert_eq!(*log.lock().unwrap(), vec!["validate", "controller", "route", "authorize"]);
        assert!(ex.request.query().is_some());
    }

    #[tokio::test]
    async fn no_body_options_means_no_body_parser() {
        let route = ResolvedRoute {
            schema: None,
            use_query: false,
            authorize: None,
            controller_middlewares: vec![],
            route_middlewares: vec![],
            ..logging_route(&Arc::new(Mutex::new(Vec::new())))
        };
        assert!(build(&route).is_empty());
    }
}
