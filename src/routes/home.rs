use axum::response::{IntoResponse, Response};

use crate::responses::{html_page, JsonResponse};
use crate::routes::github::INDEX_PATH;

pub async fn index() -> Response {
    html_page(
        "Welcome to GitHub Connect!",
        &format!("<p><a href=\"{INDEX_PATH}\">List my GitHub repositories</a></p>"),
    )
    .into_response()
}

pub async fn about() -> Response {
    html_page(
        "About",
        "<p>Signs in with GitHub over OAuth2 and lists the repositories the granted token can see.</p>",
    )
    .into_response()
}

pub async fn health() -> Response {
    JsonResponse::success("ok").into_response()
}
