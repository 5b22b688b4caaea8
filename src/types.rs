use serde::{Deserialize, Serialize};
use std::fmt;


/// A zero-based position inside a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based line number
    pub line: u32,
    /// Zero-based character offset within the line
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A span of text, half-open on the end position
///
/// Invariant: `start <= end` in lexicographic (line, character) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start_line: u32, start_char: u32, end_line: u32, end_char: u32) -> Self {
        Self {
            start: Position::new(start_line, start_char),
            end: Position::new(end_line, end_char),
        }
    }

    /// Whether the position falls inside this range (end exclusive)
    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos < self.end
    }

    /// Whether this range lies within `other` and is not equal to it
    ///
    /// Used to pick the innermost of several nested ranges covering one
    /// position.
    pub fn is_inside(&self, other: &Range) -> bool {
        other.start <= self.start && self.end <= other.end && self != other
    }
}

/// Identifies one document as a repository + revision + path triple
///
/// Rendered as `nav://<repository>?<revision>#<path>`: the scheme part
/// carries the repository, the query the revision, and the fragment the
/// path, so hosts can treat the whole thing as an opaque URI string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentUri {
    pub repository: String,
    pub revision: String,
    pub path: String,
}

impl DocumentUri {
    pub fn new(
        repository: impl Into<String>,
        revision: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            revision: revision.into(),
            path: path.into(),
        }
    }

    /// Parse a `nav://repo?revision#path` string
    ///
    /// Returns `None` for anything that does not carry all three parts.
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("nav://")?;
        let (repository, rest) = rest.split_once('?')?;
        let (revision, path) = rest.split_once('#')?;
        if repository.is_empty() || revision.is_empty() || path.is_empty() {
            return None;
        }
        Some(Self::new(repository, revision, path))
    }

    /// The de-duplication identity of this document
    pub fn file_key(&self) -> FileKey {
        FileKey {
            repository: self.repository.clone(),
            revision: self.revision.clone(),
            path: self.path.clone(),
        }
    }
}

impl fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nav://{}?{}#{}", self.repository, self.revision, self.path)
    }
}

/// File identity used when de-duplicating reference results
///
/// Keyed on repository, revision, and path but not on the exact range. Two
/// revisions of the same path are distinct files: their contents can differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub repository: String,
    pub revision: String,
    pub path: String,
}

/// One navigation result: a range inside a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub uri: DocumentUri,
    pub range: Range,
}

impl Location {
    pub fn new(uri: DocumentUri, range: Range) -> Self {
        Self { uri, range }
    }

    pub fn file_key(&self) -> FileKey {
        self.uri.file_key()
    }
}

/// Hover content for a position
///
/// Adapters fill in `contents` and `range` only; provenance alerts are
/// attached by the aggregation engine, never by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hover {
    /// Markdown text shown to the user
    pub contents: String,
    /// The range the hover applies to, when the source knows it
    #[serde(default)]
    pub range: Option<Range>,
}

/// One symbol's local code intelligence inside a cached window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeIntelRange {
    pub range: Range,
    #[serde(default)]
    pub definitions: Option<Vec<Location>>,
    #[serde(default)]
    pub references: Option<Vec<Location>>,
    #[serde(default)]
    pub hover: Option<Hover>,
}

/// One page of a paginated reference query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePage {
    pub locations: Vec<Location>,
    /// Opaque continuation token; absent on the final page
    #[serde(default)]
    pub cursor: Option<String>,
}

/// An open document handed to the engine by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub uri: DocumentUri,
    /// Host language identifier, e.g. "go" or "typescript"
    pub language: String,
    /// Full text of the document, used for identifier heuristics
    pub text: String,
}

/// Extra context for reference requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReferenceContext {
    /// Include the declaration of the symbol in the results
    #[serde(default)]
    pub include_declaration: bool,
}

/// A symbol's defining package or import identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Package or import path name, e.g. "github.com/gorilla/mux"
    pub name: String,
    /// Package manager namespace when known, e.g. "npm" or "gomod"
    #[serde(default)]
    pub manager: Option<String>,
}

/// A symbol identity precise enough to query other repositories for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Fully qualified symbol name within its package
    pub name: String,
    /// The package the symbol is defined in
    pub package: PackageDescriptor,
}

/// A location as reported by a remote repository connection
///
/// The connection speaks its own local URI scheme: the repository part may
/// be missing entirely when the connection assumes "this repository". The
/// discoverer translates these back into the caller's scheme and discards
/// anything that maps outside the expected repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLocation {
    #[serde(default)]
    pub repository: Option<String>,
    pub path: String,
    pub range: Range,
}

/// How well a language is served by semantic indexing
///
/// Affects the wording of search-based provenance alerts only, never the
/// tier selection itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingSupport {
    Robust,
    Experimental,
    Unsupported,
}

/// Indexing support for a host language identifier
pub fn indexing_support(language: &str) -> IndexingSupport {
    match language {
        "go" | "typescript" | "javascript" | "java" | "scala" | "kotlin" | "python" | "rust"
        | "c" | "cpp" => IndexingSupport::Robust,
        "ruby" | "csharp" | "dart" | "swift" | "haskell" => IndexingSupport::Experimental,
        _ => IndexingSupport::Unsupported,
    }
}

/// Which tier produced a result, shown to end users as an alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Provenance {
    /// Precomputed index data, semantically exact within its coverage
    Semantic,
    /// Computed on demand by a running language-analysis service
    LiveAnalysis,
    /// Heuristic identifier search
    SearchBased { support: IndexingSupport },
}

impl Provenance {
    /// User-facing alert for this provenance
    pub fn alert(&self) -> Alert {
        let message = match self {
            Provenance::Semantic => {
                "Results are from a precise code intelligence index".to_string()
            }
            Provenance::LiveAnalysis => {
                "Results are computed by a live language analysis service".to_string()
            }
            Provenance::SearchBased { support } => match support {
                IndexingSupport::Robust => {
                    "Search-based results; precise indexing is available for this language"
                        .to_string()
                }
                IndexingSupport::Experimental => {
                    "Search-based results; precise indexing for this language is experimental"
                        .to_string()
                }
                IndexingSupport::Unsupported => {
                    "Search-based results; this language has no precise indexing support"
                        .to_string()
                }
            },
        };
        Alert {
            provenance: self.clone(),
            message,
        }
    }
}

/// Provenance metadata attached to a result by the aggregation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub provenance: Provenance,
    pub message: String,
}

/// Per-location badge, attached when tiers are blended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    /// The location came from the approximate tier
    Approximate,
}

/// A reference result with its optional provenance badge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedLocation {
    pub location: Location,
    #[serde(default)]
    pub badge: Option<Badge>,
}

impl TaggedLocation {
    pub fn untagged(location: Location) -> Self {
        Self {
            location,
            badge: None,
        }
    }

    pub fn approximate(location: Location) -> Self {
        Self {
            location,
            badge: Some(Badge::Approximate),
        }
    }
}

/// One engine emission for definition, implementation, and highlight requests
///
/// Each emission replaces the previous one. The alert is set on the first
/// non-empty emission only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionResult {
    pub locations: Vec<Location>,
    #[serde(default)]
    pub alert: Option<Alert>,
}

/// One engine emission for hover requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoverResult {
    pub hover: Hover,
    #[serde(default)]
    pub alert: Option<Alert>,
}

/// One engine emission for document highlight requests
///
/// Each emission replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightsResult {
    pub ranges: Vec<Range>,
    #[serde(default)]
    pub alert: Option<Alert>,
}

/// One engine emission for reference requests
///
/// Emissions are cumulative: every emission is a superset of the previous
/// one, so a consumer can render each as the complete current result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencesResult {
    pub locations: Vec<TaggedLocation>,
    #[serde(default)]
    pub alert: Option<Alert>,
}
