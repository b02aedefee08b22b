use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    error::AppError,
    models::{session::Session, user::User},
    state::AppState,
    utils::{
        cookies::{build_clear_cookie, build_session_cookie, extract_cookie_value},
        time::now_utc,
    },
};

/// Who the current request belongs to. Inserted into the request extensions
/// by [`attach_session`] on every route.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user: Option<User>,
    pub session: Option<Session>,
}

impl RequestContext {
    pub fn require_user(&self) -> Result<&User, AppError> {
        self.user
            .as_ref()
            .ok_or_else(|| AppError::Forbidden("Login required".into()))
    }
}

/// Response extension set by handlers that end the session themselves, so the
/// middleware does not re-issue the cookie.
#[derive(Debug, Clone, Copy)]
pub struct SessionEnded;

#[derive(Debug, Deserialize)]
struct LoginQuery {
    login_token: Option<String>,
}

/// Establishes the request's identity.
///
/// A `login_token` query parameter takes precedence; otherwise the session
/// cookie is resolved. Either way a live session gets its cookie re-issued
/// with a fresh lifetime, and a stale cookie is cleared.
pub async fn attach_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let now = now_utc();
    let cookie_name = state.config.cookie_name.as_str();
    let cookie_options = state.config.cookie_options();
    let max_age = state.sessions.cookie_max_age();

    let mut context = RequestContext::default();
    let mut set_cookie = None;

    let login_token = Query::<LoginQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.login_token)
        .filter(|token| !token.is_empty());

    if let Some(token) = login_token {
        match state.sessions.login_with_token(&token, now).await {
            Ok(Some(established)) => {
                set_cookie = Some(build_session_cookie(
                    cookie_name,
                    &established.cookie.encode(),
                    max_age,
                    cookie_options,
                ));
                context.user = Some(established.user);
                context.session = Some(established.session);
            }
            Ok(None) => {}
            Err(err) => return AppError::InternalServerError(err.into()).into_response(),
        }
    }

    if context.user.is_none() {
        let presented = request
            .headers()
            .get(header::COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| extract_cookie_value(raw, cookie_name));

        if let Some(value) = presented {
            match state.sessions.resume(&value, now).await {
                Ok(Some((user, session))) => {
                    set_cookie = Some(build_session_cookie(
                        cookie_name,
                        &value,
                        max_age,
                        cookie_options,
                    ));
                    context.user = Some(user);
                    context.session = Some(session);
                }
                Ok(None) => {
                    set_cookie = Some(build_clear_cookie(cookie_name, cookie_options));
                }
                Err(err) => return AppError::InternalServerError(err.into()).into_response(),
            }
        }
    }

    request.extensions_mut().insert(context);
    let mut response = next.run(request).await;

    if response.extensions().get::<SessionEnded>().is_some() {
        return response;
    }
    if let Some(cookie) = set_cookie {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Guard for protected routes: no attached user means 403. The user is also
/// inserted on its own so handlers can extract `Extension<User>`.
pub async fn require_session(mut request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<RequestContext>()
        .and_then(|context| context.user.clone())
        .ok_or_else(|| AppError::Forbidden("Login required".into()))?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
