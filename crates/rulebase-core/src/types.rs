//! Domain types shared by the chunker, the scoped stores and the retriever.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::error::Error;

pub type ChunkId = String;

/// Label used for rule/section on chunks whose content type is not `body`.
pub const NOT_APPLICABLE: &str = "N/A";

/// One corner of a block's bounding polygon, normalized to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingPoly {
    #[serde(default)]
    pub normalized_vertices: Vec<Vertex>,
}

/// Byte range into the shard's backing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    #[serde(default)]
    pub start_index: usize,
    pub end_index: usize,
}

/// Where a block's text lives: either inline, or as anchor segments into the
/// shard text (the layout-analysis wire shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextRef {
    Inline(String),
    Anchor { text_segments: Vec<TextSegment> },
}

/// A block as produced by the upstream layout analysis. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBlock {
    pub text: TextRef,
    #[serde(default)]
    pub bounding_poly: Option<BoundingPoly>,
}

impl RawBlock {
    pub fn inline(text: impl Into<String>, vertices: Vec<Vertex>) -> Self {
        Self { text: TextRef::Inline(text.into()), bounding_poly: Some(BoundingPoly { normalized_vertices: vertices }) }
    }

    /// Axis-aligned rectangle spanning `top..bottom` vertically and `left..right` horizontally.
    pub fn rect(text: impl Into<String>, top: f32, bottom: f32, left: f32, right: f32) -> Self {
        Self::inline(
            text,
            vec![
                Vertex { x: left, y: top },
                Vertex { x: right, y: top },
                Vertex { x: right, y: bottom },
                Vertex { x: left, y: bottom },
            ],
        )
    }

    pub fn without_geometry(text: impl Into<String>) -> Self {
        Self { text: TextRef::Inline(text.into()), bounding_poly: None }
    }

    fn finite_vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.bounding_poly
            .iter()
            .flat_map(|p| p.normalized_vertices.iter())
            .filter(|v| v.x.is_finite() && v.y.is_finite())
    }

    /// Lowest edge of the block, `None` when the geometry is missing.
    pub fn max_y(&self) -> Option<f32> {
        self.finite_vertices().map(|v| v.y).reduce(f32::max)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Body,
    Definitions,
    Intro,
    Outro,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Body => "body",
            ContentType::Definitions => "definitions",
            ContentType::Intro => "intro",
            ContentType::Outro => "outro",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "body" => Some(ContentType::Body),
            "definitions" => Some(ContentType::Definitions),
            "intro" => Some(ContentType::Intro),
            "outro" => Some(ContentType::Outro),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
    #[serde(default)]
    pub content_type: Option<ContentType>,
}

/// Ordered pages plus the raw text their anchors point into. Chunking context
/// is threaded continuously across the pages of a shard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl Shard {
    /// Resolve a block's text reference. Out-of-range or non-UTF-8-boundary
    /// segments are skipped rather than failing the shard.
    pub fn resolve<'a>(&'a self, text: &'a TextRef) -> Cow<'a, str> {
        match text {
            TextRef::Inline(s) => Cow::Borrowed(s.as_str()),
            TextRef::Anchor { text_segments } => {
                if let [seg] = text_segments.as_slice() {
                    return Cow::Borrowed(self.text.get(seg.start_index..seg.end_index).unwrap_or(""));
                }
                let mut out = String::new();
                for seg in text_segments {
                    if let Some(part) = self.text.get(seg.start_index..seg.end_index) {
                        out.push_str(part);
                    }
                }
                Cow::Owned(out)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Official,
    Local,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Official => "official",
            DocType::Local => "local",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "official" => Some(DocType::Official),
            "local" => Some(DocType::Local),
            _ => None,
        }
    }
}

/// Fixed-shape chunk metadata. Absent values are `None`; defaulting happens
/// where chunks are built, never at lookup time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub rule: Option<String>,
    pub chapter: Option<String>,
    pub section: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
    pub page: Option<u32>,
    pub variant: String,
    pub source: String,
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<DocType>,
}

impl ChunkMetadata {
    pub fn scope(&self) -> crate::error::Result<ScopeKey> {
        ScopeKey::new(&self.variant, self.country.as_deref())
    }
}

/// An emitted unit of retrievable text. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Text fed to the full-text index: content plus the rule and section labels.
    pub fn search_text(&self) -> String {
        let mut parts = vec![self.content.as_str()];
        for label in [&self.metadata.rule, &self.metadata.section].into_iter().flatten() {
            if label != NOT_APPLICABLE && !label.trim().is_empty() {
                parts.push(label.as_str());
            }
        }
        parts.join(" ")
    }
}

/// Full-text language configuration chosen per scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextConfig {
    /// Stemming + stop words for the primary language (official rules).
    English,
    /// Lowercasing only, safe across mixed languages (local rules).
    Simple,
}

impl TextConfig {
    pub fn for_country(country: Option<&str>) -> Self {
        if country.is_some() { TextConfig::Simple } else { TextConfig::English }
    }
}

/// (variant, country | official). Every scoped read or write targets exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeKey {
    variant: String,
    country: Option<String>,
}

impl ScopeKey {
    /// Validates both parts. An empty country string is rejected rather than
    /// being read as "official", which would silently widen the scope.
    pub fn new(variant: &str, country: Option<&str>) -> crate::error::Result<Self> {
        let variant = variant.trim();
        if variant.is_empty() {
            return Err(Error::ScopeViolation("variant must not be empty".into()));
        }
        if !variant.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(Error::ScopeViolation(format!("variant '{variant}' contains unsupported characters")));
        }
        let country = match country {
            None => None,
            Some(c) => {
                let c = c.trim();
                if c.is_empty() {
                    return Err(Error::ScopeViolation("country code must not be empty; omit it for the official scope".into()));
                }
                if !c.chars().all(|ch| ch.is_ascii_alphanumeric()) {
                    return Err(Error::ScopeViolation(format!("country code '{c}' must be alphanumeric")));
                }
                Some(c.to_ascii_uppercase())
            }
        };
        Ok(Self { variant: variant.to_string(), country })
    }

    pub fn official(variant: &str) -> crate::error::Result<Self> { Self::new(variant, None) }

    pub fn local(variant: &str, country: &str) -> crate::error::Result<Self> { Self::new(variant, Some(country)) }

    pub fn variant(&self) -> &str { &self.variant }

    pub fn country(&self) -> Option<&str> { self.country.as_deref() }

    pub fn is_official(&self) -> bool { self.country.is_none() }

    pub fn text_config(&self) -> TextConfig { TextConfig::for_country(self.country()) }

    /// Single-token encoding used as an exact-match partition key.
    /// `-` never collides with a country code since codes are alphanumeric.
    pub fn tag(&self) -> String {
        format!("{}|{}", self.variant, self.country.as_deref().unwrap_or("-"))
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.country {
            Some(c) => write!(f, "{}/{}", self.variant, c),
            None => write!(f, "{}/official", self.variant),
        }
    }
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// A ranked candidate from one engine. `score` is engine-specific but higher
/// is always better; list position is what fusion consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
    pub chunk: Chunk,
}

/// A fused result. `fused_score` is a rank-fusion artifact: it is not a
/// probability and is not comparable across queries or `k` values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: ChunkId,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub fused_score: f64,
    pub vector_rank: Option<usize>,
    pub keyword_rank: Option<usize>,
}
