//! Safe SQL builder: identifiers are validated and quoted, values travel as one jsonb parameter each.

mod builder;
pub use builder::*;

use regex::Regex;
use std::sync::OnceLock;

/// Plain SQL identifier: letters, digits and underscores, not starting with a digit.
pub fn is_identifier(s: &str) -> bool {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"))
        .is_match(s)
}
