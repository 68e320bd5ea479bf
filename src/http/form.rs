//! Form value extraction
//!
//! Looks a field up in an `application/x-www-form-urlencoded` request body
//! first and falls back to the query string, so `POST /save/Foo` with
//! `body=...` and `/save/Foo?body=...` both work.

use url::form_urlencoded;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Whether a `Content-Type` header value denotes a urlencoded form
pub fn is_form_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// First value of `key` in urlencoded data
fn lookup(data: &[u8], key: &str) -> Option<String> {
    form_urlencoded::parse(data)
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Get a form field from the request body (if it is a form) or the query string
pub fn form_value(
    query: Option<&str>,
    content_type: Option<&str>,
    body: &[u8],
    key: &str,
) -> Option<String> {
    let from_body = if is_form_content_type(content_type) {
        lookup(body, key)
    } else {
        None
    };

    from_body.or_else(|| query.and_then(|q| lookup(q.as_bytes(), key)))
}
