pub mod handlers;
pub mod password;
pub mod session;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left readable in a `next` query value.
const NEXT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Login page URL that sends the user back to `next` afterwards.
pub fn login_url(next: &str) -> String {
    format!("/login/?next={}", utf8_percent_encode(next, NEXT_ENCODE_SET))
}

/// Accept only same-site absolute paths as post-login targets.
/// Browsers drop tabs and newlines inside URLs, so `/\t/host` would become
/// `//host`; any whitespace or control character is refused.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| {
        n.starts_with('/')
            && !n.starts_with("//")
            && !n.contains('\\')
            && !n.chars().any(|c| c.is_control() || c.is_whitespace())
    })
}
