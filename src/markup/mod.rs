//! Markup conversion, dispatched by [`Markup`] kind.
//!
//! | Kind     | Output                                         |
//! |----------|------------------------------------------------|
//! | html     | passthrough                                    |
//! | md       | HTML with heading ids, plus a table of contents |
//! | jade     | Tera template source                           |
//!
//! Conversion runs before template compilation, so template tags inside a
//! page body survive every converter unchanged.

pub mod jade;
pub mod markdown;

use crate::types::Markup;
use thiserror::Error;

pub use jade::JadeError;

#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("Jade conversion failed: {0}")]
    Jade(#[from] JadeError),
}

/// A converted page body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Converted {
    pub html: String,
    /// Table of contents (Markdown only).
    pub toc: Option<String>,
}

pub fn convert(markup: Markup, source: &str) -> Result<Converted, MarkupError> {
    match markup {
        Markup::Html => Ok(Converted {
            html: source.to_string(),
            toc: None,
        }),
        Markup::Markdown => {
            let (html, toc) = markdown::convert(source);
            Ok(Converted {
                html,
                toc: Some(toc),
            })
        }
        Markup::Jade => Ok(Converted {
            html: jade::convert(source)?,
            toc: None,
        }),
    }
}
