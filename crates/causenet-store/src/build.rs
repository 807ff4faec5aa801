//! Build entry point: a stream of parsed relations in, a finished file out.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CausenetError, Result};
use crate::support::Support;
use crate::writer::{BuildSummary, CausenetWriter, WriterOptions};

/// One observed causal relation with the evidence extracted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalRelation {
    pub cause: String,
    pub effect: String,
    #[serde(default)]
    pub supports: Vec<Support>,
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub writer: WriterOptions,
    /// Log progress every this many records; 0 disables progress logging.
    pub progress_every: u64,
    /// Total record count, if known, to report progress as a percentage.
    pub expected_records: Option<u64>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            writer: WriterOptions::default(),
            progress_every: 100_000,
            expected_records: None,
        }
    }
}

/// Write every relation in `records` into a new file at `out`.
///
/// The first failing record aborts the build; no partial file is left at `out`.
pub fn build_causenet<I, E>(
    records: I,
    out: impl AsRef<Path>,
    options: &BuildOptions,
) -> Result<BuildSummary>
where
    I: IntoIterator<Item = std::result::Result<CausalRelation, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut writer = CausenetWriter::with_options(out, options.writer.clone())?;
    let mut count = 0u64;
    for record in records {
        let record = record.map_err(|e| CausenetError::Input(e.into()))?;
        writer.add_edge(&record.cause, &record.effect, &record.supports)?;
        count += 1;

        if options.progress_every > 0 && count % options.progress_every == 0 {
            match options.expected_records {
                Some(total) if total > 0 => info!(
                    records = count,
                    percent = %format!("{:.1}", count as f64 * 100.0 / total as f64),
                    "building causenet"
                ),
                _ => info!(
                    records = count,
                    concepts = writer.concept_count(),
                    supports = writer.distinct_supports(),
                    "building causenet"
                ),
            }
        }
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::SourceType;
    use std::convert::Infallible;
    use tempfile::tempdir;

    #[test]
    fn builds_from_relation_stream() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("g.causenet");
        let records = vec![
            CausalRelation {
                cause: "heat".into(),
                effect: "drought".into(),
                supports: vec![Support::new(SourceType::WikipediaList, "5", "")],
            },
            CausalRelation {
                cause: "drought".into(),
                effect: "famine".into(),
                supports: vec![],
            },
        ];
        let summary = build_causenet(
            records.into_iter().map(Ok::<_, Infallible>),
            &out,
            &BuildOptions::default(),
        )
        .unwrap();
        assert_eq!(summary.concepts, 3);
        assert_eq!(summary.edges, 2);
        assert!(out.exists());
    }

    #[test]
    fn failing_record_aborts_without_output() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("g.causenet");
        let records: Vec<std::result::Result<CausalRelation, String>> = vec![
            Ok(CausalRelation {
                cause: "a".into(),
                effect: "b".into(),
                supports: vec![],
            }),
            Err("bad line".to_string()),
        ];
        let err = build_causenet(records, &out, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, CausenetError::Input(_)));
        assert!(!out.exists());
    }
}
