//! Server-rendered pages and the HTML error responses.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};

use crate::utils::{format_clock, get_ist_time};

pub const HX_REQUEST: &str = "hx-request";

/// True for requests made by htmx, which expect a fragment back.
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key(HX_REQUEST)
}

pub fn error_fragment(message: &str) -> String {
    format!("<div class='alert alert-danger'>{}</div>", message)
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title} | Bite Me Buddy</title>
    <link rel="stylesheet" href="/static/css/app.css">
</head>
<body>
<main>
{body}
</main>
</body>
</html>"#
    )
}

/// Fragment for htmx requests, a full page otherwise.
pub fn error_response(status: StatusCode, message: &str, htmx: bool) -> Response {
    let body = if htmx {
        error_fragment(message)
    } else {
        layout(
            message,
            &format!("<h1>{}</h1>\n{}\n<p><a href=\"/\">Back to home</a></p>", status.as_u16(), error_fragment(message)),
        )
    };
    (status, Html(body)).into_response()
}

pub async fn home() -> Html<String> {
    let now = get_ist_time();
    Html(layout(
        "Home",
        &format!(
            r#"<h1>Bite Me Buddy</h1>
<p>Fresh food, delivered fast.</p>
<div class="clock" id="clock" data-iso="{iso}">{clock}</div>
<p>India Standard Time</p>
<nav class="nav">
    <a href="/api/services">Menu</a>
    <a href="/admin-login">Admin login</a>
</nav>"#,
            iso = now.to_rfc3339(),
            clock = format_clock(&now),
        ),
    ))
}

pub async fn admin_login() -> Html<String> {
    Html(layout(
        "Admin login",
        r#"<h1>Admin login</h1>
<form id="admin-login" method="post" action="/api/auth/login">
    <input type="text" name="username" placeholder="Username" autocomplete="username" required>
    <input type="password" name="password" placeholder="Password" autocomplete="current-password" required>
    <button type="submit">Sign in</button>
</form>"#,
    ))
}

pub async fn not_found(headers: HeaderMap) -> Response {
    error_response(StatusCode::NOT_FOUND, "Page not found", is_htmx(&headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_fragment_markup() {
        assert_eq!(error_fragment("Page not found"), "<div class='alert alert-danger'>Page not found</div>");
    }

    #[test]
    fn test_detects_htmx() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx(&headers));
        headers.insert("HX-Request", HeaderValue::from_static("true"));
        assert!(is_htmx(&headers));
    }
}
