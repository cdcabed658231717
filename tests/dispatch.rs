//! End-to-end dispatch tests against the public API: routes are declared the
//! way an application would declare them, compiled with `App::build`, and
//! exercised through `Dispatcher::dispatch`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use http::StatusCode;
use ruta::{
    App, AuthorizeSpec, AuthorizedUser, BindingSpec, Controller, ControllerMethod, Dispatcher,
    Exchange, GlobalOptions, Method, Request, RouteAnnotation, RouteArg, Schema, Source,
    Transform, Value, user_lookup,
};

fn dispatch_blocking(dispatcher: &Dispatcher, request: Request) -> Exchange {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(dispatcher.dispatch(Exchange::new(request)))
}

#[tokio::test]
async fn path_parameters_bind_into_handler_arguments() {
    let dispatcher = App::new()
        .controller(
            Controller::at("/users").method(
                ControllerMethod::new("getOrder", |ex, args| async move {
                    let Value::Map(params) = &args[2] else {
                        panic!("expected the bound parameter map");
                    };
                    let body = format!(
                        r#"{{"user":"{}","order":"{}"}}"#,
                        params["id"].to_text(),
                        params["orderid"].to_text()
                    );
                    (ex, Ok(Some(Value::from(body))))
                })
                .route(
                    RouteAnnotation::from_args(
                        Method::Get,
                        vec![RouteArg::Path("@id/orders/@orderId".into())],
                    )
                    .unwrap(),
                )
                .bind(BindingSpec::new(2, "params").source(Source::Urls)),
            ),
        )
        .build()
        .unwrap();

    let ex = dispatcher
        .dispatch(Exchange::new(Request::builder(Method::Get, "/users/7/orders/99").build()))
        .await;

    assert_eq!(ex.response.status(), StatusCode::OK);
    assert_eq!(ex.response.body(), br#"{"user":"7","order":"99"}"#);
}

#[tokio::test]
async fn query_parameters_bind_with_transforms() {
    let dispatcher = App::new()
        .controller(
            Controller::at("/search").method(
                ControllerMethod::new("index", |ex, args| async move {
                    assert_eq!(args[2], Value::Int(3));
                    assert_eq!(args[3], Value::Bool(true));
                    (ex, Ok(Some(Value::from("ok"))))
                })
                .route(RouteAnnotation::new(Method::Get))
                .bind(BindingSpec::new(2, "page").source(Source::Query).transform(Transform::Int))
                .bind(BindingSpec::new(3, "full").source(Source::Query).transform(Transform::Bool)),
            ),
        )
        .build()
        .unwrap();

    let ex = dispatcher
        .dispatch(Exchange::new(Request::builder(Method::Get, "/search?page=3&full=yes").build()))
        .await;
    assert_eq!(ex.response.body(), b"ok");
}

#[tokio::test]
async fn query_parsing_can_be_disabled_globally() {
    let options = GlobalOptions { no_query_params: true, ..Default::default() };

    let dispatcher = App::with_options(options)
        .controller(
            Controller::at("/raw").method(
                ControllerMethod::new("index", |ex, _args| async move {
                    assert!(ex.request.query().is_none(), "query parser must not run");
                    let raw = ex.request.raw_query().unwrap_or_default().to_owned();
                    (ex, Ok(Some(Value::from(raw))))
                })
                .route(RouteAnnotation::new(Method::Get)),
            ),
        )
        .build()
        .unwrap();

    let ex = dispatcher
        .dispatch(Exchange::new(Request::builder(Method::Get, "/raw?page=2").build()))
        .await;

    // the raw query string is still there for the handler to use
    assert_eq!(ex.response.body(), b"page=2");
}

#[tokio::test]
async fn a_route_can_override_the_global_query_toggle() {
    let options = GlobalOptions { no_query_params: true, ..Default::default() };

    let mut opted_in = RouteAnnotation::new(Method::Get);
    opted_in.options.no_query_params = Some(false);

    let dispatcher = App::with_options(options)
        .controller(
            Controller::at("/search").method(
                ControllerMethod::new("index", |ex, args| async move {
                    assert_eq!(args[2], Value::from("2"));
                    (ex, Ok(Some(Value::from("parsed"))))
                })
                .route(opted_in)
                .bind(BindingSpec::new(2, "page").source(Source::Query)),
            ),
        )
        .build()
        .unwrap();

    let ex = dispatcher
        .dispatch(Exchange::new(Request::builder(Method::Get, "/search?page=2").build()))
        .await;
    assert_eq!(ex.response.body(), b"parsed");
}

#[tokio::test]
async fn schema_violations_never_reach_the_handler() {
    let invoked = Arc::new(AtomicBool::new(false));
    let seen = invoked.clone();

    let schema = Schema::new(|body| {
        if body.get("name").map(|v| v.is_string()).unwrap_or(false) {
            Ok(())
        } else {
            Err("`name` must be a string".into())
        }
    });

    let dispatcher = App::new()
        .controller(
            Controller::at("/users").method(
                ControllerMethod::new("create", move |ex, _args| {
                    let seen = seen.clone();
                    async move {
                        seen.store(true, Ordering::SeqCst);
                        (ex, Ok(None))
                    }
                })
                .route(
                    RouteAnnotation::from_args(
                        Method::Post,
                        vec![
                            RouteArg::Path("/".into()),
                            RouteArg::Schema(schema),
                            RouteArg::Limit(1.0),
                        ],
                    )
                    .unwrap(),
                ),
            ),
        )
        .build()
        .unwrap();

    let ex = dispatcher
        .dispatch(Exchange::new(
            Request::builder(Method::Post, "/users").body_bytes(r#"{"name":123}"#).build(),
        ))
        .await;

    assert_eq!(ex.response.status(), StatusCode::BAD_REQUEST);
    assert!(ex.response.is_ended());
    assert!(!invoked.load(Ordering::SeqCst), "handler must not run on a schema violation");

    // a conforming body goes through
    let ex = dispatcher
        .dispatch(Exchange::new(
            Request::builder(Method::Post, "/users").body_bytes(r#"{"name":"alice"}"#).build(),
        ))
        .await;
    assert_eq!(ex.response.status(), StatusCode::OK);
    assert!(invoked.load(Ordering::SeqCst));
}

/// Multi-frame body that counts how many bytes the reader actually pulled.
struct CountingBody {
    frames: std::collections::VecDeque<Bytes>,
    delivered: Arc<AtomicUsize>,
}

impl hyper::body::Body for CountingBody {
    type Data = Bytes;
    type Error = std::convert::Infallible;

    fn poll_frame(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Result<hyper::body::Frame<Bytes>, Self::Error>>> {
        let this = self.get_mut();
        std::task::Poll::Ready(this.frames.pop_front().map(|data| {
            this.delivered.fetch_add(data.len(), Ordering::SeqCst);
            Ok(hyper::body::Frame::data(data))
        }))
    }
}

#[test]
fn oversized_bodies_are_rejected_before_full_buffering() {
    // 1 MiB limit, body of five 512 KiB frames: the third frame crosses the
    // limit, so the last two must never be pulled off the transport.
    const FRAME: usize = 512 * 1024;

    let dispatcher = App::new()
        .controller(
            Controller::at("/upload").method(
                ControllerMethod::new("index", |ex, _args| async move { (ex, Ok(None)) }).route(
                    RouteAnnotation::from_args(Method::Post, vec![RouteArg::Limit(1.0)]).unwrap(),
                ),
            ),
        )
        .build()
        .unwrap();

    let delivered = Arc::new(AtomicUsize::new(0));
    let body = CountingBody {
        frames: std::iter::repeat_n(Bytes::from(vec![0u8; FRAME]), 5).collect(),
        delivered: delivered.clone(),
    };

    let request = Request::builder(Method::Post, "/upload").body_stream(body).build();
    let ex = dispatch_blocking(&dispatcher, request);

    assert_eq!(ex.response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(ex.response.is_ended());
    assert_eq!(delivered.load(Ordering::SeqCst), 3 * FRAME);
}

#[tokio::test]
async fn a_body_at_exactly_the_limit_is_accepted() {
    let dispatcher = App::new()
        .controller(
            Controller::at("/upload").method(
                ControllerMethod::new("index", |ex, args| async move {
                    let Value::Bytes(body) = &args[2] else { panic!("expected buffered bytes") };
                    (ex, Ok(Some(Value::from(body.len().to_string()))))
                })
                .route(
                    RouteAnnotation::from_args(Method::Post, vec![RouteArg::Limit(1.0)]).unwrap(),
                )
                .bind(BindingSpec::new(2, "body").source(Source::Body)),
            ),
        )
        .build()
        .unwrap();

    let exact = vec![0u8; 1024 * 1024];
    let ex = dispatcher
        .dispatch(Exchange::new(
            Request::builder(Method::Post, "/upload").body_bytes(exact).build(),
        ))
        .await;

    assert_eq!(ex.response.status(), StatusCode::OK);
    assert_eq!(ex.response.body(), (1024 * 1024).to_string().as_bytes());
}

#[tokio::test]
async fn unmatched_paths_get_404() {
    let dispatcher = App::new()
        .controller(Controller::at("/users").method(
            ControllerMethod::new("index", |ex, _args| async move { (ex, Ok(None)) })
                .route(RouteAnnotation::new(Method::Get)),
        ))
        .build()
        .unwrap();

    let ex = dispatcher
        .dispatch(Exchange::new(Request::builder(Method::Get, "/orders").build()))
        .await;
    assert_eq!(ex.response.status(), StatusCode::NOT_FOUND);
    assert!(ex.response.is_ended());
}

#[tokio::test]
async fn duplicate_routes_dispatch_to_the_first_registration() {
    let dispatcher = App::new()
        .controller(
            Controller::at("/things")
                .method(
                    ControllerMethod::new("byId", |ex, _args| async move {
                        (ex, Ok(Some(Value::from("first"))))
                    })
                    .route(
                        RouteAnnotation::from_args(Method::Get, vec![RouteArg::Path("@id".into())])
                            .unwrap(),
                    ),
                )
                .method(
                    ControllerMethod::new("byKey", |ex, _args| async move {
                        (ex, Ok(Some(Value::from("second"))))
                    })
                    .route(
                        RouteAnnotation::from_args(
                            Method::Get,
                            vec![RouteArg::Path("@key".into())],
                        )
                        .unwrap(),
                    ),
                ),
        )
        .build()
        .unwrap();

    assert_eq!(dispatcher.route_count(), 2);
    let ex = dispatcher
        .dispatch(Exchange::new(Request::builder(Method::Get, "/things/7").build()))
        .await;
    assert_eq!(ex.response.body(), b"first");
}

#[tokio::test]
async fn authorization_runs_after_route_middleware_and_denies_with_403() {
    let lookup = user_lookup(|ex: Exchange| async move {
        let user = ex
            .request
            .header("x-role")
            .map(|role| AuthorizedUser::with_roles([role.to_owned()]));
        (ex, user)
    });

    let dispatcher = App::new()
        .controller(
            Controller::at("/admin")
                .authorize(AuthorizeSpec::roles(["admin"]).find_user(lookup))
                .method(
                    ControllerMethod::new("index", |ex, _args| async move {
                        (ex, Ok(Some(Value::from("secrets"))))
                    })
                    .route(RouteAnnotation::new(Method::Get)),
                ),
        )
        .build()
        .unwrap();

    let denied = dispatcher
        .dispatch(Exchange::new(Request::builder(Method::Get, "/admin").build()))
        .await;
    assert_eq!(denied.response.status(), StatusCode::FORBIDDEN);
    assert!(denied.response.body().is_empty());

    let granted = dispatcher
        .dispatch(Exchange::new(
            Request::builder(Method::Get, "/admin").header("x-role", "admin").build(),
        ))
        .await;
    assert_eq!(granted.response.status(), StatusCode::OK);
    assert_eq!(granted.response.body(), b"secrets");
}

#[tokio::test]
async fn route_serializer_overrides_the_controller_serializer() {
    let controller_serializer = ruta::serializer(|value, mut ex: Exchange| async move {
        if let Some(value) = value {
            ex.response.text(format!("controller:{}", value.to_text()));
        }
        (ex, Ok(()))
    });
    let route_serializer = ruta::serializer(|value, mut ex: Exchange| async move {
        if let Some(value) = value {
            ex.response.text(format!("route:{}", value.to_text()));
        }
        (ex, Ok(()))
    });

    let mut annotated = RouteAnnotation::new(Method::Get);
    annotated.options.serializer = Some(route_serializer);

    let dispatcher = App::new()
        .controller(
            Controller::at("/values")
                .serializer(controller_serializer)
                .method(
                    ControllerMethod::new("index", |ex, _args| async move {
                        (ex, Ok(Some(Value::from("x"))))
                    })
                    .route(annotated),
                )
                .method(
                    ControllerMethod::new("plain", |ex, _args| async move {
                        (ex, Ok(Some(Value::from("y"))))
                    })
                    .route(RouteAnnotation::new(Method::Get)),
                ),
        )
        .build()
        .unwrap();

    let ex = dispatcher
        .dispatch(Exchange::new(Request::builder(Method::Get, "/values").build()))
        .await;
    assert_eq!(ex.response.body(), b"route:x");

    let ex = dispatcher
        .dispatch(Exchange::new(Request::builder(Method::Get, "/values/plain").build()))
        .await;
    assert_eq!(ex.response.body(), b"controller:y");
}

#[tokio::test]
async fn documentation_is_collected_per_path_and_verb() {
    let mut get_users = RouteAnnotation::new(Method::Get);
    get_users.options.documentation = Some(serde_json::json!({ "summary": "list users" }));

    let mut get_user = RouteAnnotation::from_args(
        Method::Get,
        vec![RouteArg::Path("@id".into())],
    )
    .unwrap();
    get_user.options.documentation = Some(serde_json::json!({ "summary": "one user" }));

    let dispatcher = App::new()
        .controller(
            Controller::at("/users")
                .method(
                    ControllerMethod::new("index", |ex, _args| async move { (ex, Ok(None)) })
                        .route(get_users),
                )
                .method(
                    ControllerMethod::new("details", |ex, _args| async move { (ex, Ok(None)) })
                        .route(get_user),
                ),
        )
        .build()
        .unwrap();

    let doc = dispatcher.api_document().to_json();
    assert_eq!(doc["paths"]["/users"]["get"]["summary"], "list users");
    assert_eq!(doc["paths"]["/users/{id}"]["get"]["summary"], "one user");
}
