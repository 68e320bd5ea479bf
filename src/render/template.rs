//! Template compilation and execution
//!
//! Templates are plain text with `{{ title }}` and `{{ body }}` placeholders.
//! They are compiled once into a list of segments; rendering walks the list
//! and HTML-escapes every substituted value.

use crate::store::Page;
use std::fmt::{self, Write};

/// Error raised while compiling a template
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template {name}: unterminated '{{{{' at byte {offset}")]
    Unterminated { name: String, offset: usize },

    #[error("template {name}: unknown field '{field}' at byte {offset}")]
    UnknownField {
        name: String,
        field: String,
        offset: usize,
    },
}

/// Error raised while executing a compiled template
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template {template}: failed to write output for page '{title}'")]
    Write {
        template: String,
        title: String,
        #[source]
        source: fmt::Error,
    },
}

/// Page field a placeholder refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Body,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "body" => Some(Self::Body),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(Field),
}

/// A compiled template
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Compile template source
    pub fn compile(name: &str, source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                return Err(TemplateError::Unterminated {
                    name: name.to_string(),
                    offset: offset + start,
                });
            };

            let field_name = after_open[..end].trim();
            let field = Field::parse(field_name).ok_or_else(|| TemplateError::UnknownField {
                name: name.to_string(),
                field: field_name.to_string(),
                offset: offset + start,
            })?;
            segments.push(Segment::Field(field));

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            segments,
        })
    }

    /// Fill the template with a page's fields
    pub fn render(&self, page: &Page) -> Result<String, RenderError> {
        let mut out = String::new();
        self.render_to(page, &mut out)?;
        Ok(out)
    }

    /// Fill the template into `out`
    ///
    /// The body is raw bytes; invalid UTF-8 sequences are shown as U+FFFD.
    pub fn render_to<W: Write>(&self, page: &Page, out: &mut W) -> Result<(), RenderError> {
        self.write_segments(page, out)
            .map_err(|source| RenderError::Write {
                template: self.name.clone(),
                title: page.title.to_string(),
                source,
            })
    }

    fn write_segments<W: Write>(&self, page: &Page, out: &mut W) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.write_str(text)?,
                Segment::Field(Field::Title) => write_escaped(page.title.as_str(), out)?,
                Segment::Field(Field::Body) => {
                    write_escaped(&String::from_utf8_lossy(&page.body), out)?;
                }
            }
        }
        Ok(())
    }
}

/// Write `s` to `out` with HTML special characters escaped
fn write_escaped<W: Write>(s: &str, out: &mut W) -> fmt::Result {
    for c in s.chars() {
        match c {
            '&' => out.write_str("&amp;")?,
            '<' => out.write_str("&lt;")?,
            '>' => out.write_str("&gt;")?,
            '"' => out.write_str("&#34;")?,
            '\'' => out.write_str("&#39;")?,
            c => out.write_char(c)?,
        }
    }
    Ok(())
}
