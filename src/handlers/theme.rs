use crate::extractors::{ThemeCookie, THEME_COOKIE};
use crate::response::HX_REFRESH;
use axum::{
    http::{header::SET_COOKIE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// POST /theme: Flips the theme cookie and asks the page to reload.
pub async fn toggle(ThemeCookie(current): ThemeCookie) -> Response {
    let next = current.toggled();
    let cookie = format!("{}={}; Path=/; Max-Age=31536000; SameSite=Lax", THEME_COOKIE, next.as_str());
    let mut res = StatusCode::OK.into_response();
    if let Ok(v) = HeaderValue::from_str(&cookie) {
        res.headers_mut().insert(SET_COOKIE, v);
    }
    res.headers_mut().insert(HX_REFRESH, HeaderValue::from_static("true"));
    tracing::debug!(theme = next.as_str(), "theme toggled");
    res
}
