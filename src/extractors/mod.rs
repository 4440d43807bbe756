mod session;

pub use session::{SessionId, ThemeCookie, SESSION_ID_HEADER, THEME_COOKIE};
