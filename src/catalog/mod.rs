// Book catalog loading and full-summary lookup
// The catalog is a static JSON file loaded wholesale at startup and
// read-only for the lifetime of the process.


use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{LibrarianError, Result};

/// A single book record as stored in the catalog file.
///
/// All fields are required; a record missing any of them makes the whole
/// catalog fail to load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    pub title: String,
    pub short_summary: String,
    pub themes: Vec<String>,
    pub full_summary: String,
}

/// The loaded catalog plus a title-keyed map for full-summary lookup.
///
/// Construction cost is a single O(n) pass over the records; the map is
/// built once here rather than hiding behind process-wide lazy state.
#[derive(Debug, Clone)]
pub struct Catalog {
    books: Vec<Book>,
    summaries: HashMap<String, String>,
}

impl Catalog {
    /// Load and validate the catalog from a JSON array file.
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading book catalog from {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| {
            LibrarianError::Catalog(format!(
                "Failed to read catalog file {}: {}",
                path.display(),
                e
            ))
        })?;

        let books: Vec<Book> = serde_json::from_str(&content).map_err(|e| {
            LibrarianError::Catalog(format!(
                "Failed to parse catalog file {}: {}",
                path.display(),
                e
            ))
        })?;

        let catalog = Self::from_books(books)?;
        info!("Loaded catalog with {} books", catalog.len());
        Ok(catalog)
    }

    /// Build a catalog from already-deserialized records.
    #[inline]
    pub fn from_books(books: Vec<Book>) -> Result<Self> {
        let mut summaries = HashMap::with_capacity(books.len());

        for book in &books {
            if book.title.trim().is_empty() {
                return Err(LibrarianError::Catalog(
                    "Catalog contains a book with an empty title".to_string(),
                ));
            }
            if summaries
                .insert(book.title.clone(), book.full_summary.clone())
                .is_some()
            {
                return Err(LibrarianError::Catalog(format!(
                    "Duplicate title in catalog: {}",
                    book.title
                )));
            }
        }

        Ok(Self { books, summaries })
    }

    #[inline]
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.books.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Full summary for a title: exact match first, case-insensitive as a
    /// fallback, otherwise a fixed message naming the requested title.
    /// Always returns displayable text, never an error.
    #[inline]
    pub fn summary_by_title(&self, title: &str) -> String {
        if let Some(summary) = self.summaries.get(title) {
            return summary.clone();
        }

        let wanted = title.to_lowercase();
        for (key, summary) in &self.summaries {
            if key.to_lowercase() == wanted {
                debug!("Case-insensitive summary match for '{}'", title);
                return summary.clone();
            }
        }

        debug!("No summary found for title '{}'", title);
        format!("(Nu am găsit un rezumat pentru titlul: {})", title)
    }
}
