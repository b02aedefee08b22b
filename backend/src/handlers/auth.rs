use axum::{
    extract::{rejection::FormRejection, Extension, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    middleware::session::{RequestContext, SessionEnded},
    models::user::{User, UserResponse},
    state::AppState,
    utils::cookies::build_clear_cookie,
};

#[derive(Debug, Deserialize)]
pub struct BackchannelLogoutForm {
    pub logout_token: Option<String>,
}

pub async fn me(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(user.into())
}

/// Ends the current session (if any), clears the cookie and points the
/// browser back at the member portal.
pub async fn logout(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> Result<Response, AppError> {
    if let Some(session) = &context.session {
        state.sessions.logout(session.id).await?;
    }

    let clear = build_clear_cookie(&state.config.cookie_name, state.config.cookie_options());
    let mut response = Json(json!({
        "message": "Logged out",
        "portal_url": state.config.portal_url,
    }))
    .into_response();
    if let Ok(value) = HeaderValue::from_str(&clear) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response.extensions_mut().insert(SessionEnded);
    Ok(response)
}

/// Identity provider callback. Answers 200 whether or not the token was
/// accepted or matched a session.
pub async fn backchannel_logout(
    State(state): State<AppState>,
    form: Result<Form<BackchannelLogoutForm>, FormRejection>,
) -> Result<StatusCode, AppError> {
    let token = match form {
        Ok(Form(BackchannelLogoutForm {
            logout_token: Some(token),
        })) => token,
        Ok(_) => {
            tracing::warn!("Backchannel logout without logout_token");
            return Ok(StatusCode::OK);
        }
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Unreadable backchannel logout request");
            return Ok(StatusCode::OK);
        }
    };

    state.sessions.process_backchannel_logout(&token).await?;
    Ok(StatusCode::OK)
}
