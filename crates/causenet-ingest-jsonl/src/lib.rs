//! CauseNet JSONL ingestion
//!
//! Turns the line-delimited JSON export of CauseNet into [`CausalRelation`]s:
//! - `causal_relation.cause.concept` / `causal_relation.effect.concept`
//! - one [`Support`] per entry of `sources`, typed by `sources[].type`
//! - ClueWeb12 page ids pass through an injected [`IdRemap`]

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ahash::AHashMap;
use anyhow::{anyhow, bail, Context, Result};
use causenet_store::{CausalRelation, SourceType, Support};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RawRecord {
    causal_relation: RawRelation,
    #[serde(default)]
    sources: Vec<RawSource>,
}

#[derive(Debug, Deserialize)]
struct RawRelation {
    cause: RawConcept,
    effect: RawConcept,
}

#[derive(Debug, Deserialize)]
struct RawConcept {
    concept: String,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(rename = "type")]
    source_type: String,
    #[serde(default)]
    payload: RawPayload,
}

#[derive(Debug, Default, Deserialize)]
struct RawPayload {
    sentence: Option<String>,
    wikipedia_revision_id: Option<Value>,
    clueweb12_page_id: Option<Value>,
}

/// Maps a source-specific id to the id stored in the graph.
pub trait IdRemap {
    fn remap<'a>(&'a self, id: &'a str) -> Cow<'a, str>;
}

/// Keeps ids unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRemap;

impl IdRemap for NoRemap {
    fn remap<'a>(&'a self, id: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(id)
    }
}

/// WARC record id -> ClueWeb12 TREC id table.
///
/// Ids missing from the table are kept as-is.
#[derive(Debug, Clone, Default)]
pub struct ClueWebIdMap {
    map: AHashMap<String, String>,
}

impl ClueWebIdMap {
    /// Load a table of `<warc-id>\t<trec-id>` lines.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open id map {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to read id map {}", path.display()))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut map = AHashMap::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let (warc, trec) = line
                .strip_prefix('<')
                .and_then(|rest| rest.split_once(">\t"))
                .ok_or_else(|| anyhow!("line {}: expected `<warc-id>\\t<trec-id>`", lineno + 1))?;
            map.insert(warc.to_string(), trec.to_string());
        }
        Ok(Self { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl IdRemap for ClueWebIdMap {
    fn remap<'a>(&'a self, id: &'a str) -> Cow<'a, str> {
        match self.map.get(id) {
            Some(trec) => Cow::Borrowed(trec.as_str()),
            None => {
                debug!(id, "no TREC id for WARC record; keeping it");
                Cow::Borrowed(id)
            }
        }
    }
}

fn id_string(value: Option<&Value>, field: &str) -> Result<String> {
    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => bail!("{field} must be a string or number, got {other}"),
        None => bail!("missing {field}"),
    }
}

fn convert_source(source: RawSource, remap: &dyn IdRemap) -> Result<Support> {
    let source_type: SourceType = source.source_type.parse()?;
    let payload = source.payload;
    let id = match source_type {
        SourceType::WikipediaInfobox
        | SourceType::WikipediaList
        | SourceType::WikipediaSentence => {
            id_string(payload.wikipedia_revision_id.as_ref(), "wikipedia_revision_id")?
        }
        SourceType::ClueWeb12Sentence => {
            let raw = id_string(payload.clueweb12_page_id.as_ref(), "clueweb12_page_id")?;
            remap.remap(&raw).into_owned()
        }
    };
    Ok(Support {
        source_type,
        id,
        content: payload.sentence.unwrap_or_default(),
    })
}

/// Parse one line; blank lines yield `None`.
pub fn parse_line(line: &str, remap: &dyn IdRemap) -> Result<Option<CausalRelation>> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let record: RawRecord = serde_json::from_str(line)?;
    let supports = record
        .sources
        .into_iter()
        .map(|s| convert_source(s, remap))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(CausalRelation {
        cause: record.causal_relation.cause.concept,
        effect: record.causal_relation.effect.concept,
        supports,
    }))
}

/// Iterator over the relations of a JSONL stream.
pub struct JsonlRelations<'m, R> {
    lines: std::io::Lines<R>,
    lineno: usize,
    remap: &'m dyn IdRemap,
}

pub fn read_relations<R: BufRead>(reader: R, remap: &dyn IdRemap) -> JsonlRelations<'_, R> {
    JsonlRelations {
        lines: reader.lines(),
        lineno: 0,
        remap,
    }
}

impl<R: BufRead> Iterator for JsonlRelations<'_, R> {
    type Item = Result<CausalRelation>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.lineno += 1;
            let parsed = line
                .map_err(anyhow::Error::from)
                .and_then(|line| parse_line(&line, self.remap))
                .with_context(|| format!("line {}", self.lineno));
            match parsed {
                Ok(Some(relation)) => return Some(Ok(relation)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Count non-blank lines, for progress reporting.
pub fn count_records(path: &Path) -> Result<u64> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    for line in reader.lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"{"causal_relation": {"cause": {"concept": "smoking"}, "effect": {"concept": "cancer"}},
        "sources": [
            {"type": "wikipedia_sentence", "payload": {"wikipedia_revision_id": "801", "sentence": "Smoking causes cancer."}},
            {"type": "wikipedia_infobox", "payload": {"wikipedia_revision_id": 802}},
            {"type": "clueweb12_sentence", "payload": {"clueweb12_page_id": "urn:uuid:abc", "sentence": "s"}}
        ]}"#;

    fn one_line(s: &str) -> String {
        s.lines().map(str::trim).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn parses_all_source_types() {
        let rel = parse_line(&one_line(LINE), &NoRemap).unwrap().unwrap();
        assert_eq!(rel.cause, "smoking");
        assert_eq!(rel.effect, "cancer");
        assert_eq!(
            rel.supports,
            vec![
                Support::new(SourceType::WikipediaSentence, "801", "Smoking causes cancer."),
                Support::new(SourceType::WikipediaInfobox, "802", ""),
                Support::new(SourceType::ClueWeb12Sentence, "urn:uuid:abc", "s"),
            ]
        );
    }

    #[test]
    fn clueweb_ids_are_remapped() {
        let map = ClueWebIdMap::from_reader("<urn:uuid:abc>\tclueweb12-0000tw-00-00001\n".as_bytes())
            .unwrap();
        assert_eq!(map.len(), 1);
        let rel = parse_line(&one_line(LINE), &map).unwrap().unwrap();
        assert_eq!(rel.supports[2].id, "clueweb12-0000tw-00-00001");
        // Wikipedia ids are untouched.
        assert_eq!(rel.supports[0].id, "801");
    }

    #[test]
    fn unknown_source_type_fails() {
        let line = r#"{"causal_relation": {"cause": {"concept": "a"}, "effect": {"concept": "b"}}, "sources": [{"type": "tweet", "payload": {}}]}"#;
        let err = parse_line(line, &NoRemap).unwrap_err();
        assert!(err.to_string().contains("invalid source type: tweet"));
    }

    #[test]
    fn iterator_skips_blank_lines_and_reports_line_numbers() {
        let ok = r#"{"causal_relation": {"cause": {"concept": "a"}, "effect": {"concept": "b"}}, "sources": []}"#;
        let input = format!("{ok}\n\n{ok}\nnot json\n");
        let results: Vec<_> = read_relations(input.as_bytes(), &NoRemap).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        let err = results[2].as_ref().unwrap_err();
        assert_eq!(err.to_string(), "line 4");
    }

    #[test]
    fn counts_non_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.jsonl");
        std::fs::write(&path, "{}\n\n  \n{}\n{}").unwrap();
        assert_eq!(count_records(&path).unwrap(), 3);

        let map_path = dir.path().join("ids.txt");
        std::fs::write(&map_path, "<a>\tb\n\n<c>\td\n").unwrap();
        assert_eq!(ClueWebIdMap::load(&map_path).unwrap().len(), 2);
    }

    #[test]
    fn malformed_id_map_line_fails() {
        assert!(ClueWebIdMap::from_reader("warc\ttrec\n".as_bytes()).is_err());
    }
}
