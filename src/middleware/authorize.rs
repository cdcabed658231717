//! Authorization middleware.
//!
//! An authorize spec names the roles a route requires, how to look up the
//! requesting user, how to validate the user against the roles, and what to
//! do on failure. Lookup, validator, and failure handler each resolve
//! route > controller > global; a missing lookup means no request is ever
//! authorized, which keeps a misconfigured protected route closed rather
//! than open.

use std::sync::Arc;

use http::StatusCode;

use crate::handler::{BoxFuture, Exchange, Flow, Middleware, PlainHandler, middleware};

/// The user resolved for a request, carrying its granted roles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorizedUser {
    pub roles: Vec<String>,
}

impl AuthorizedUser {
    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { roles: roles.into_iter().map(Into::into).collect() }
    }
}

/// Resolves the requesting user, if any, from the live request.
pub type UserLookup =
    Arc<dyn Fn(Exchange) -> BoxFuture<(Exchange, Option<AuthorizedUser>)> + Send + Sync>;

/// Decides whether a resolved user satisfies the route's required roles.
pub type RoleValidator = Arc<dyn Fn(&AuthorizedUser, &[String]) -> bool + Send + Sync>;

/// Lifts an async closure into a [`UserLookup`].
pub fn user_lookup<F, Fut>(f: F) -> UserLookup
where
    F: Fn(Exchange) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = (Exchange, Option<AuthorizedUser>)> + Send + 'static,
{
    Arc::new(move |ex| -> BoxFuture<(Exchange, Option<AuthorizedUser>)> { Box::pin(f(ex)) })
}

/// Authorization options for a route, a controller, or the global defaults.
#[derive(Clone, Default)]
pub struct AuthorizeSpec {
    /// Roles the route requires. Empty means any resolved user passes.
    pub roles: Vec<String>,
    pub find_user: Option<UserLookup>,
    pub validator: Option<RoleValidator>,
    pub on_failed: Option<PlainHandler>,
}

impl AuthorizeSpec {
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { roles: roles.into_iter().map(Into::into).collect(), ..Default::default() }
    }

    pub fn find_user(mut self, lookup: UserLookup) -> Self {
        self.find_user = Some(lookup);
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&AuthorizedUser, &[String]) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn on_failed(mut self, handler: PlainHandler) -> Self {
        self.on_failed = Some(handler);
        self
    }

    /// Fills unset fields from a lower-precedence spec.
    pub(crate) fn or_defaults(mut self, defaults: &AuthorizeSpec) -> Self {
        if self.find_user.is_none() {
            self.find_user = defaults.find_user.clone();
        }
        if self.validator.is_none() {
            self.validator = defaults.validator.clone();
        }
        if self.on_failed.is_none() {
            self.on_failed = defaults.on_failed.clone();
        }
        self
    }
}

/// Builds the authorization middleware from a fully resolved spec. Runs
/// last among pre-handler steps, so parsing and validation are done by the
/// time the user lookup sees the request.
pub(crate) fn build(spec: AuthorizeSpec) -> Middleware {
    middleware(move |ex: Exchange| {
        let spec = spec.clone();
        async move {
            let (ex, user) = match &spec.find_user {
                Some(lookup) => lookup(ex).await,
                None => (ex, None),
            };

            let granted = match &user {
                Some(user) => match &spec.validator {
                    Some(validator) => validator(user, &spec.roles),
                    None => {
                        spec.roles.is_empty()
                            || user.roles.iter().any(|role| spec.roles.contains(role))
                    }
                },
                None => false,
            };

            if granted {
                return (ex, Ok(Flow::Continue));
            }

            let mut ex = match &spec.on_failed {
                Some(handler) => handler(ex).await,
                None => {
                    let mut ex = ex;
                    ex.response.end_with(StatusCode::FORBIDDEN);
                    ex
                }
            };
            // a denied request always gets a terminated response
            ex.response.end();
            (ex, Ok(Flow::Halt))
        }
    })
}
