//! Auth callback endpoint.
//!
//! The identity provider redirects the browser here with a one-time code.
//! We exchange it for a session, set the session cookie, and redirect to
//! the `next` path. `next` must be a relative path; anything else falls
//! back to `/dashboard` so the callback cannot be used as an open redirect.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::state::ApiContext;
use crate::events::Event;

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: String,
    pub next: Option<String>,
}

fn safe_redirect_target(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/dashboard",
    }
}

fn login_error_redirect(reason: &str) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, format!("/login?error={reason}"))],
    )
        .into_response()
}

/// `GET /auth/callback?code=...&next=/documents` — finish the login flow.
///
/// This is a browser flow, so failures redirect to the login page with an
/// error parameter instead of returning a JSON error body.
pub async fn callback(
    State(ctx): State<ApiContext>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    if params.code.is_empty() {
        return Ok(login_error_redirect("missing_code"));
    }

    // The provider exchange is blocking HTTP
    let provider = ctx.auth_provider.clone();
    let code = params.code.clone();
    let exchange = tokio::task::spawn_blocking(move || provider.exchange_code(&code))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let session = match exchange {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(error = %err, "Auth code exchange failed");
            return Ok(login_error_redirect("auth_failed"));
        }
    };

    tracing::info!(user_id = %session.user_id, "Session established");
    let token = ctx.issue_session(&session.user_id);
    ctx.events.publish(Event::SessionEstablished {
        user_id: session.user_id.clone(),
    });

    let target = safe_redirect_target(params.next.as_deref()).to_string();
    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::SET_COOKIE, ApiContext::session_cookie_header(&token)),
            (header::LOCATION, target),
        ],
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_urls_are_not_redirect_targets() {
        assert_eq!(safe_redirect_target(Some("/documents")), "/documents");
        assert_eq!(safe_redirect_target(Some("https://evil.test")), "/dashboard");
        assert_eq!(safe_redirect_target(Some("//evil.test")), "/dashboard");
        assert_eq!(safe_redirect_target(None), "/dashboard");
    }
}
