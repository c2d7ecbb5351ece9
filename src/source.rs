//! Input descriptors for schema material and candidate instances.
//!
//! A [`Source`] is the uniform "readable bytes plus optional system
//! identifier" shape every collaborator consumes: schema sources, candidate
//! instances, and diagnostics all speak in terms of it. Opening the
//! underlying file is deferred until the first validation pass.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::schema::ParsedSchema;

/// A readable input with an optional system identifier for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A file on disk; the path doubles as the system identifier.
    Path(PathBuf),
    /// An in-memory buffer with an optional caller-supplied identifier.
    Memory {
        data: Vec<u8>,
        system_id: Option<String>,
    },
}

impl Source {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Source::Path(path.into())
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Source::Memory {
            data: data.into(),
            system_id: None,
        }
    }

    pub fn from_bytes_with_id(data: impl Into<Vec<u8>>, system_id: impl Into<String>) -> Self {
        Source::Memory {
            data: data.into(),
            system_id: Some(system_id.into()),
        }
    }

    /// The diagnostic identifier of this source, if it has one.
    pub fn system_id(&self) -> Option<String> {
        match self {
            Source::Path(path) => Some(path.display().to_string()),
            Source::Memory { system_id, .. } => system_id.clone(),
        }
    }

    /// The identifier used in error messages; in-memory sources without a
    /// system id render as `<memory>`.
    pub(crate) fn describe(&self) -> String {
        self.system_id().unwrap_or_else(|| "<memory>".to_string())
    }

    /// The on-disk location backing this source, when there is one.
    pub(crate) fn local_path(&self) -> Option<&Path> {
        match self {
            Source::Path(path) => Some(path),
            Source::Memory { .. } => None,
        }
    }

    /// Read the full content. File-backed sources hit the filesystem here,
    /// not at construction.
    pub(crate) fn read(&self) -> io::Result<Cow<'_, [u8]>> {
        match self {
            Source::Path(path) => fs::read(path).map(Cow::Owned),
            Source::Memory { data, .. } => Ok(Cow::Borrowed(data)),
        }
    }
}

impl From<&str> for Source {
    fn from(data: &str) -> Self {
        Source::from_bytes(data.as_bytes())
    }
}

impl From<String> for Source {
    fn from(data: String) -> Self {
        Source::from_bytes(data.into_bytes())
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::from_path(path)
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::from_path(path)
    }
}

/// The schema material an engine instance is configured with: an ordered
/// list of sources, a directly supplied pre-parsed schema, or both.
///
/// When both are present the parsed schema governs validation and the source
/// list is inert. That precedence lives in exactly one place,
/// [`SchemaSet::selection`], so call sites never re-derive it from field
/// presence.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    sources: Vec<Source>,
    parsed: Option<ParsedSchema>,
}

/// The schema material actually in effect for a validation pass.
#[derive(Debug)]
pub(crate) enum Selection<'a> {
    Parsed(&'a ParsedSchema),
    Sources(&'a [Source]),
}

impl SchemaSet {
    /// No schema material at all: instance validation degrades to
    /// well-formedness-only checking.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_sources(sources: Vec<Source>) -> Self {
        Self {
            sources,
            parsed: None,
        }
    }

    pub fn from_parsed(schema: ParsedSchema) -> Self {
        Self {
            sources: Vec::new(),
            parsed: Some(schema),
        }
    }

    /// A parsed schema alongside a source list. The parsed schema wins; the
    /// sources are retained only for inspection.
    pub fn from_parsed_and_sources(schema: ParsedSchema, sources: Vec<Source>) -> Self {
        Self {
            sources,
            parsed: Some(schema),
        }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn parsed(&self) -> Option<&ParsedSchema> {
        self.parsed.as_ref()
    }

    /// True when neither sources nor a parsed schema are configured.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.parsed.is_none()
    }

    /// Resolve which schema material governs validation.
    pub(crate) fn selection(&self) -> Selection<'_> {
        match &self.parsed {
            Some(schema) => Selection::Parsed(schema),
            None => Selection::Sources(&self.sources),
        }
    }
}
