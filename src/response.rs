//! HTML fragment response helpers.

use axum::{
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};

pub const HX_RETARGET: HeaderName = HeaderName::from_static("hx-retarget");
pub const HX_RESWAP: HeaderName = HeaderName::from_static("hx-reswap");
pub const HX_REFRESH: HeaderName = HeaderName::from_static("hx-refresh");

/// Concatenated fragments with a status.
pub fn fragment(status: StatusCode, parts: &[&str]) -> Response {
    (status, Html(parts.concat())).into_response()
}

pub fn ok(parts: &[&str]) -> Response {
    fragment(StatusCode::OK, parts)
}

/// Fragment swapped into `target` instead of the element that made the request.
pub fn retarget(status: StatusCode, target: &'static str, parts: &[&str]) -> Response {
    let mut res = fragment(status, parts);
    res.headers_mut().insert(HX_RETARGET, HeaderValue::from_static(target));
    res
}

/// Only out-of-band parts (notices) are applied; the requesting element's target is left alone.
pub fn out_of_band(status: StatusCode, parts: &[&str]) -> Response {
    let mut res = fragment(status, parts);
    res.headers_mut().insert(HX_RESWAP, HeaderValue::from_static("none"));
    res
}

/// A load superseded by a newer one for the same session.
pub fn stale() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retarget_sets_htmx_header() {
        let res = retarget(StatusCode::UNPROCESSABLE_ENTITY, "#modal", &["<form>", "</form>"]);
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.headers().get("hx-retarget").unwrap(), "#modal");
        assert_eq!(stale().status(), StatusCode::NO_CONTENT);
        assert_eq!(out_of_band(StatusCode::CONFLICT, &[]).headers().get("hx-reswap").unwrap(), "none");
    }
}
