//! Files served by the HTTP front end.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// Content type of the three fixed documents.
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// Content type used when the extension is unknown.
pub const FALLBACK_CONTENT_TYPE: &str = "text/plain";

/// The fixed documents the front end serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    /// Home page, served for `GET /`.
    Index,
    /// Message form, served for `GET /message`.
    Message,
    /// Not-found page, served with status 404.
    Error,
}

/// The site root and the document names within it.
#[derive(Debug, Clone)]
pub struct Site {
    root: PathBuf,
    index: PathBuf,
    message: PathBuf,
    error: PathBuf,
}

impl Site {
    /// Build the site layout from the HTTP configuration.
    #[must_use]
    pub fn from_config(config: &HttpConfig) -> Self {
        let root = config.site_root.clone();
        Self {
            index: root.join(&config.index_document),
            message: root.join(&config.message_document),
            error: root.join(&config.error_document),
            root,
        }
    }

    /// Path of one of the fixed documents.
    #[must_use]
    pub fn document_path(&self, document: Document) -> &Path {
        match document {
            Document::Index => &self.index,
            Document::Message => &self.message,
            Document::Error => &self.error,
        }
    }

    /// Read one of the fixed documents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentRead`] if the file cannot be read.
    pub async fn read_document(&self, document: Document) -> Result<Vec<u8>> {
        let path = self.document_path(document);
        tokio::fs::read(path)
            .await
            .map_err(|source| Error::DocumentRead {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Map a request path to a regular file under the site root.
    ///
    /// The path is percent-decoded first. Paths that would leave the site
    /// root, or that do not name an existing regular file, resolve to `None`.
    #[must_use]
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
        let relative = Path::new(decoded.trim_start_matches('/'));

        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return None;
                }
            }
        }

        resolved.is_file().then_some(resolved)
    }
}

/// Guess a content type from a file's extension.
#[must_use]
pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}
