//! Evidence records backing a causal edge.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CausenetError;

/// Where a piece of evidence was extracted from.
///
/// The discriminant is the one-byte type tag written to the content section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SourceType {
    WikipediaInfobox = 0,
    WikipediaList = 1,
    WikipediaSentence = 2,
    #[serde(rename = "clueweb12_sentence")]
    ClueWeb12Sentence = 3,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::WikipediaInfobox,
        SourceType::WikipediaList,
        SourceType::WikipediaSentence,
        SourceType::ClueWeb12Sentence,
    ];

    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Name used by the ingestion format.
    pub const fn as_str(self) -> &'static str {
        match self {
            SourceType::WikipediaInfobox => "wikipedia_infobox",
            SourceType::WikipediaList => "wikipedia_list",
            SourceType::WikipediaSentence => "wikipedia_sentence",
            SourceType::ClueWeb12Sentence => "clueweb12_sentence",
        }
    }
}

impl TryFrom<u8> for SourceType {
    type Error = CausenetError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        SourceType::ALL
            .get(tag as usize)
            .copied()
            .ok_or(CausenetError::UnknownSourceTag(tag))
    }
}

impl FromStr for SourceType {
    type Err = CausenetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CausenetError::UnknownSourceType(s.to_string()))
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of evidence for an edge.
///
/// Equality is structural over all three fields; the writer stores each
/// distinct support once and edges refer to it by offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Support {
    pub source_type: SourceType,
    /// Wikipedia revision id or ClueWeb12 page id.
    pub id: String,
    /// Extracted sentence; empty for sources without one.
    #[serde(default)]
    pub content: String,
}

impl Support {
    pub fn new(source_type: SourceType, id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source_type,
            id: id.into(),
            content: content.into(),
        }
    }

    /// Reject strings that cannot be stored NUL-terminated.
    pub fn validate(&self) -> Result<(), CausenetError> {
        if self.id.as_bytes().contains(&0) {
            return Err(CausenetError::NulInString { field: "support id" });
        }
        if self.content.as_bytes().contains(&0) {
            return Err(CausenetError::NulInString {
                field: "support content",
            });
        }
        Ok(())
    }

    /// Size of the encoded record: tag byte plus two NUL-terminated strings.
    pub fn encoded_len(&self) -> usize {
        1 + self.id.len() + 1 + self.content.len() + 1
    }
}
