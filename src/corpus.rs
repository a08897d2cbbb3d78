//! Read-only access to the input file.
//!
//! The corpus is memory-mapped and shared by every worker. Bytes that are
//! not valid UTF-8 are replaced with U+FFFD, which costs one owned copy of
//! the file; a clean file is used in place.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::Mmap;

pub struct Corpus {
    inner: Inner,
}

enum Inner {
    /// Validated as UTF-8 when opened.
    Mapped(Mmap),
    Owned(String),
}

impl Corpus {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open corpus: {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("Failed to stat corpus: {}", path.display()))?
            .len();
        if len == 0 {
            return Ok(Self::from_string(String::new()));
        }

        // SAFETY: the mapping is read-only and the file is not expected to
        // change during a load.
        let map = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to map corpus: {}", path.display()))?;

        let inner = match std::str::from_utf8(&map) {
            Ok(_) => Inner::Mapped(map),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    offset = e.valid_up_to(),
                    "corpus is not valid UTF-8, replacing invalid bytes"
                );
                Inner::Owned(String::from_utf8_lossy(&map).into_owned())
            }
        };
        Ok(Self { inner })
    }

    pub fn from_string(text: String) -> Self {
        Self {
            inner: Inner::Owned(text),
        }
    }

    pub fn text(&self) -> &str {
        match &self.inner {
            // SAFETY: checked with `from_utf8` in `open`, and the mapping
            // is never written through.
            Inner::Mapped(map) => unsafe { std::str::from_utf8_unchecked(map) },
            Inner::Owned(s) => s,
        }
    }

    pub fn len(&self) -> usize {
        self.text().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn maps_clean_file_in_place() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"Id: 1\nASIN: B001\n").unwrap();
        let corpus = Corpus::open(f.path()).unwrap();
        assert!(matches!(corpus.inner, Inner::Mapped(_)));
        assert_eq!(corpus.text(), "Id: 1\nASIN: B001\n");
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"Id: 1\n  title: caf\xe9\n").unwrap();
        let corpus = Corpus::open(f.path()).unwrap();
        assert_eq!(corpus.text(), "Id: 1\n  title: caf\u{FFFD}\n");
    }

    #[test]
    fn empty_file_is_empty_corpus() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let corpus = Corpus::open(f.path()).unwrap();
        assert!(corpus.is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Corpus::open(&dir.path().join("nope.txt")).err().unwrap();
        assert!(err.to_string().contains("Failed to open corpus"));
    }
}
