//! Page model
//!
//! A page is a title plus raw body bytes. Titles double as URL components
//! and storage keys, so they are restricted to ASCII letters and digits.

use std::fmt;

/// Validated page title (`[A-Za-z0-9]+`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Title(String);

impl Title {
    /// Validate and wrap a title, `None` if it is empty or not alphanumeric
    pub fn new(raw: &str) -> Option<Self> {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Title {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A page: title and raw body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: Title,
    pub body: Vec<u8>,
}

impl Page {
    pub const fn new(title: Title, body: Vec<u8>) -> Self {
        Self { title, body }
    }

    /// Page with an empty body, used when editing a page that does not exist yet
    pub const fn empty(title: Title) -> Self {
        Self {
            title,
            body: Vec::new(),
        }
    }
}
