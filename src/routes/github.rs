use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    responses::{escape_html, html_page, JsonResponse},
    services::github::{
        models::GitHubCallback, AccessGrant, ApiError, AuthExchangeError, OAuth2Parameters,
    },
    session::{build_session_cookie, CurrentSession, ACCESS_GRANT_KEY, OAUTH_STATE_KEY},
    state::AppState,
    utils::csrf::{generate_csrf_token, tokens_match},
};

pub const INDEX_PATH: &str = "/GitHub/Index";
pub const CALLBACK_PATH: &str = "/GitHub/Callback";
pub const SIGN_OUT_PATH: &str = "/GitHub/SignOut";

/// Lists the user's repositories when the session holds a grant, otherwise
/// sends the browser to GitHub's authorize page.
pub async fn index(
    State(state): State<AppState>,
    jar: CookieJar,
    session: CurrentSession,
) -> Response {
    let (Some(session_id), Some(grant)) = (session.id, session.grant) else {
        return start_authorization(&state, jar, session.id);
    };

    let client = state.github.get_client(Some(&grant.access_token));
    match client.list_user_repositories().await {
        Ok(result) => render_repositories(&grant, &result).into_response(),
        Err(err) if err.needs_reauthentication() => {
            warn!(%session_id, error = %err, "GitHub rejected stored grant, restarting authorization");
            state.sessions.remove(session_id, ACCESS_GRANT_KEY);
            start_authorization(&state, jar, Some(session_id))
        }
        Err(err) => {
            error!(%session_id, error = %err, "Failed to list GitHub repositories");
            api_error_response(&err)
        }
    }
}

/// Exchanges the authorization code and stores the resulting grant in the
/// session. Nothing is stored when the exchange fails.
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    session: CurrentSession,
    Query(params): Query<GitHubCallback>,
) -> Response {
    if let Some(error) = params.error {
        warn!(error = %error, "GitHub authorization was not granted");
        let message = params.error_description.unwrap_or_else(|| error.clone());
        return JsonResponse::bad_request_with_code(&message, &error).into_response();
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return JsonResponse::bad_request("Missing code").into_response();
    };

    // The pending state is single use, whatever the outcome below.
    let pending_state = session
        .id
        .and_then(|id| state.sessions.remove(id, OAUTH_STATE_KEY))
        .and_then(|value| value.as_str().map(str::to_string));

    if state.config.github.verify_state {
        match (pending_state, params.state) {
            (Some(expected), Some(provided)) if tokens_match(&expected, &provided) => {}
            (None, _) => {
                return JsonResponse::bad_request_with_code("Missing state", "missing_state")
                    .into_response();
            }
            _ => {
                warn!(session_id = ?session.id, "OAuth state mismatch on GitHub callback");
                return JsonResponse::bad_request_with_code("Invalid state", "invalid_state")
                    .into_response();
            }
        }
    }

    let grant = match state
        .github
        .exchange_for_access_grant(&code, &state.config.github.redirect_uri)
        .await
    {
        Ok(grant) => grant,
        Err(err) => {
            error!(error = %err, "GitHub code exchange failed");
            return exchange_error_response(&err);
        }
    };

    let (jar, session_id) = ensure_session(&state, jar, session.id);
    match state.sessions.insert(session_id, ACCESS_GRANT_KEY, &grant) {
        Ok(true) => {}
        Ok(false) => {
            error!(%session_id, "Session vanished before the access grant could be stored");
            return JsonResponse::server_error("Session expired").into_response();
        }
        Err(err) => {
            error!(%session_id, error = %err, "Failed to serialize access grant");
            return JsonResponse::server_error("Could not store access grant").into_response();
        }
    }

    info!(%session_id, "Stored GitHub access grant in session");
    (jar, Redirect::to(INDEX_PATH)).into_response()
}

pub async fn sign_out(State(state): State<AppState>, session: CurrentSession) -> Response {
    if let Some(session_id) = session.id {
        if state.sessions.remove(session_id, ACCESS_GRANT_KEY).is_some() {
            info!(%session_id, "Removed GitHub access grant from session");
        }
    }
    Redirect::to("/").into_response()
}

fn start_authorization(state: &AppState, jar: CookieJar, session_id: Option<Uuid>) -> Response {
    let (jar, session_id) = ensure_session(state, jar, session_id);
    let github = &state.config.github;

    let oauth_state = if github.verify_state {
        let token = generate_csrf_token();
        match state.sessions.insert(session_id, OAUTH_STATE_KEY, &token) {
            Ok(true) => Some(token),
            Ok(false) | Err(_) => {
                error!(%session_id, "Could not record OAuth state in session");
                return JsonResponse::server_error("Could not start GitHub authorization")
                    .into_response();
            }
        }
    } else {
        None
    };

    let parameters = OAuth2Parameters {
        redirect_url: github.redirect_uri.clone(),
        scope: github.scope.clone(),
        state: oauth_state,
    };
    let authorize_url = state.github.build_authorize_url(&parameters);

    (jar, Redirect::to(&authorize_url)).into_response()
}

/// Reuses the caller's live session or starts a new one and sets its cookie.
fn ensure_session(state: &AppState, jar: CookieJar, session_id: Option<Uuid>) -> (CookieJar, Uuid) {
    if let Some(id) = session_id.filter(|id| state.sessions.get(*id).is_some()) {
        return (jar, id);
    }

    let (id, _) = state.sessions.create();
    let cookie = build_session_cookie(id, state.config.session.cookie_secure, state.sessions.ttl());
    (jar.add(cookie), id)
}

fn render_repositories(grant: &AccessGrant, result: &Value) -> impl IntoResponse {
    let result_text = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
    let summary = match result.as_array() {
        Some(repos) => format!("<p>{} repositories</p>", repos.len()),
        None => String::new(),
    };
    let scope = grant
        .scope
        .as_deref()
        .map(|s| format!("<p>Scope: {}</p>", escape_html(s)))
        .unwrap_or_default();

    let body = format!(
        "<p>Access token: <code>{}</code></p>\n{}{}\n<pre>{}</pre>\n<p><a href=\"{}\">Sign out</a></p>",
        escape_html(&grant.access_token),
        scope,
        summary,
        escape_html(&result_text),
        SIGN_OUT_PATH,
    );
    html_page("GitHub repositories", &body)
}

fn exchange_error_response(err: &AuthExchangeError) -> Response {
    if err.is_transient() {
        JsonResponse::bad_gateway("GitHub token request failed. Please try again.").into_response()
    } else {
        JsonResponse::bad_request(&err.to_string()).into_response()
    }
}

fn api_error_response(err: &ApiError) -> Response {
    if err.is_transient() {
        JsonResponse::bad_gateway(&err.to_string()).into_response()
    } else {
        JsonResponse::server_error(&err.to_string()).into_response()
    }
}
