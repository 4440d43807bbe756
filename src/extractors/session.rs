//! Extract the session id (X-Session-ID header) and theme preference (theme cookie).

use crate::session::{Theme, DEFAULT_SESSION};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::COOKIE, request::Parts},
};

/// Header name for the session id. Default: `X-Session-ID`.
pub const SESSION_ID_HEADER: &str = "X-Session-ID";

pub const THEME_COOKIE: &str = "theme";

/// Optional session id from the `X-Session-ID` header. Malformed ids count as absent.
#[derive(Clone, Debug)]
pub struct SessionId(pub Option<String>);

impl SessionId {
    /// The id, or the shared default session.
    pub fn or_default(&self) -> &str {
        self.0.as_deref().unwrap_or(DEFAULT_SESSION)
    }
}

fn valid_session_id(s: &str) -> bool {
    !s.is_empty() && s.len() <= 64 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| valid_session_id(s));
        Ok(SessionId(value))
    }
}

/// Theme from the `theme` cookie; light when absent.
#[derive(Clone, Copy, Debug)]
pub struct ThemeCookie(pub Theme);

#[async_trait]
impl<S> FromRequestParts<S> for ThemeCookie
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let theme = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == THEME_COOKIE)
            .map(|(_, value)| Theme::parse(value))
            .unwrap_or_default();
        Ok(ThemeCookie(theme))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> (SessionId, ThemeCookie) {
        let (mut parts, _) = req.into_parts();
        let id = SessionId::from_request_parts(&mut parts, &()).await.unwrap();
        let theme = ThemeCookie::from_request_parts(&mut parts, &()).await.unwrap();
        (id, theme)
    }

    #[tokio::test]
    async fn reads_header_and_cookie() {
        let req = Request::builder()
            .header(SESSION_ID_HEADER, " tab-1 ")
            .header(COOKIE, "foo=bar; theme=dark")
            .body(())
            .unwrap();
        let (id, theme) = extract(req).await;
        assert_eq!(id.or_default(), "tab-1");
        assert_eq!(theme.0, Theme::Dark);
    }

    #[tokio::test]
    async fn falls_back_to_defaults() {
        let req = Request::builder()
            .header(SESSION_ID_HEADER, "not valid!")
            .body(())
            .unwrap();
        let (id, theme) = extract(req).await;
        assert_eq!(id.or_default(), DEFAULT_SESSION);
        assert_eq!(theme.0, Theme::Light);
    }
}
