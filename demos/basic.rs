//! Minimal ruta example — a users controller with bindings and a schema.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X POST http://localhost:3000/users -d '{"name":123}'   # → 400

use ruta::{
    App, BindingSpec, Controller, ControllerMethod, Method, RouteAnnotation, RouteArg, Schema,
    Server, Source, Transform, Value,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = App::new()
        .controller(users_controller())
        .build()
        .expect("invalid route configuration");

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

fn users_controller() -> Controller {
    // POST bodies must be {"name": <string>}; larger than 1 MiB is rejected.
    let create_schema = Schema::new(|body| {
        if body.get("name").map(|v| v.is_string()).unwrap_or(false) {
            Ok(())
        } else {
            Err("`name` must be a string".into())
        }
    });

    Controller::at("/users")
        // GET /users — method name `index` maps to the base path
        .method(
            ControllerMethod::new("index", |ex, _args| async move {
                (ex, Ok(Some(Value::Json(serde_json::json!([{ "id": 42, "name": "alice" }])))))
            })
            .route(RouteAnnotation::new(Method::Get)),
        )
        // GET /users/:id — the `id` path parameter is bound (and coerced)
        // into argument slot 2; slots 0 and 1 stay the raw request/response
        .method(
            ControllerMethod::new("details", |ex, args| async move {
                let Value::Int(id) = &args[2] else {
                    return (ex, Err(ruta::Error::handler("id was not bound")));
                };
                let id = *id;
                (ex, Ok(Some(Value::Json(serde_json::json!({ "id": id, "name": "alice" })))))
            })
            .route(
                RouteAnnotation::from_args(Method::Get, vec![RouteArg::Path("@id".into())])
                    .expect("invalid annotation"),
            )
            .bind(BindingSpec::new(2, "id").source(Source::Url).transform(Transform::Int)),
        )
        // POST /users — schema-validated JSON body, bound from the body source
        .method(
            ControllerMethod::new("create", |ex, args| async move {
                let name = match &args[2] {
                    Value::Json(body) => body["name"].as_str().unwrap_or("unknown").to_owned(),
                    _ => "unknown".to_owned(),
                };
                (ex, Ok(Some(Value::Json(serde_json::json!({ "id": 99, "name": name })))))
            })
            .route(
                RouteAnnotation::from_args(
                    Method::Post,
                    vec![
                        RouteArg::Path("/".into()),
                        RouteArg::Schema(create_schema),
                        RouteArg::Limit(1.0),
                    ],
                )
                .expect("invalid annotation"),
            )
            .bind(BindingSpec::new(2, "body").source(Source::Body)),
        )
}
