//! Builds a `.causenet` file from a stream of cause/effect/support triples.
//!
//! Concepts and their edge maps are kept in memory; support records are
//! streamed to a content staging file as soon as they are first seen, so the
//! evidence text is never held in memory twice. [`CausenetWriter::finish`]
//! lays out the node index and node info sections into their own staging
//! files and concatenates everything behind the header.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use tracing::{debug, info};

use crate::content_store::ContentStore;
use crate::error::{CausenetError, Result};
use crate::format::{self, EdgeEntry, Header, NodeEntry, CONTENT_OFFSET_SIZE, MAX_CONCEPTS};
use crate::support::Support;

#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    /// Where staging files go; defaults to the output file's directory.
    pub staging_dir: Option<PathBuf>,
}

/// Counts reported once a build completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BuildSummary {
    pub concepts: u64,
    pub edges: u64,
    pub distinct_supports: u64,
    /// Support references across all edges (after per-edge dedup).
    pub support_refs: u64,
    /// Supports passed to `add_edge`, duplicates included.
    pub observations: u64,
    pub bytes: u64,
}

struct PendingConcept {
    name: String,
    /// target index -> content offsets, kept sorted by target.
    effects: BTreeMap<u32, Vec<u64>>,
}

struct StagingFiles {
    nodes: PathBuf,
    info: PathBuf,
    content: PathBuf,
}

impl StagingFiles {
    fn new(dir: &Path, out: &Path) -> Self {
        let stem = out
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("causenet"));
        let named = |suffix: &str| {
            let mut name = stem.clone();
            name.push(suffix);
            dir.join(name)
        };
        Self {
            nodes: named(".nodes.tmp"),
            info: named(".info.tmp"),
            content: named(".content.tmp"),
        }
    }

    fn remove(&self) {
        for path in [&self.nodes, &self.info, &self.content] {
            if let Err(err) = fs::remove_file(path) {
                if err.kind() != io::ErrorKind::NotFound {
                    debug!(path = %path.display(), %err, "failed to remove staging file");
                }
            }
        }
    }
}

/// Single-threaded, single-use builder for one output file.
///
/// `finish` consumes the writer, so it runs at most once and no edge can be
/// added afterwards. Dropping an unfinished writer discards its staging files
/// without producing output.
pub struct CausenetWriter {
    out_path: PathBuf,
    staging: StagingFiles,
    content: ContentStore<BufWriter<File>>,
    concept_to_idx: AHashMap<String, u32>,
    concepts: Vec<PendingConcept>,
    edges: u64,
    observations: u64,
    /// Set when an `add_edge` failed after the writer had started changing.
    poisoned: Option<String>,
}

impl CausenetWriter {
    pub fn create(out_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(out_path, WriterOptions::default())
    }

    pub fn with_options(out_path: impl AsRef<Path>, options: WriterOptions) -> Result<Self> {
        let out_path = out_path.as_ref().to_path_buf();
        let staging_dir = match options.staging_dir {
            Some(dir) => dir,
            None => match out_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        };
        let staging = StagingFiles::new(&staging_dir, &out_path);
        let content_file = File::create(&staging.content)?;
        debug!(dir = %staging_dir.display(), "created staging files");

        Ok(Self {
            out_path,
            staging,
            content: ContentStore::new(BufWriter::new(content_file)),
            concept_to_idx: AHashMap::new(),
            concepts: Vec::new(),
            edges: 0,
            observations: 0,
            poisoned: None,
        })
    }

    /// Record a `cause -> effect` observation with its supports.
    ///
    /// Repeated pairs merge into one edge; a support already attached to the
    /// edge is not attached again.
    ///
    /// A rejected record leaves the writer unchanged. If writing the content
    /// staging file fails midway, the writer is poisoned and `finish` fails.
    pub fn add_edge(&mut self, cause: &str, effect: &str, supports: &[Support]) -> Result<()> {
        if let Some(reason) = &self.poisoned {
            return Err(CausenetError::Poisoned(reason.clone()));
        }
        check_name(cause)?;
        check_name(effect)?;
        for support in supports {
            support.validate()?;
        }
        let mut new_concepts = usize::from(!self.concept_to_idx.contains_key(cause));
        if effect != cause && !self.concept_to_idx.contains_key(effect) {
            new_concepts += 1;
        }
        if (self.concepts.len() + new_concepts) as u64 > MAX_CONCEPTS {
            return Err(CausenetError::TooManyConcepts);
        }

        let cause_idx = self.concept_index(cause);
        let effect_idx = self.concept_index(effect);
        let node = &mut self.concepts[cause_idx as usize];
        let offsets = match node.effects.entry(effect_idx) {
            std::collections::btree_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::btree_map::Entry::Vacant(e) => {
                self.edges += 1;
                e.insert(Vec::new())
            }
        };
        // Duplicates within an edge are dropped in `write_node_sections`.
        for support in supports {
            self.observations += 1;
            match self.content.intern_or_get(support) {
                Ok((offset, _)) => offsets.push(offset),
                Err(err) => {
                    self.poisoned = Some(err.to_string());
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn concept_index(&mut self, name: &str) -> u32 {
        if let Some(&idx) = self.concept_to_idx.get(name) {
            return idx;
        }
        let idx = self.concepts.len() as u32;
        self.concept_to_idx.insert(name.to_string(), idx);
        self.concepts.push(PendingConcept {
            name: name.to_string(),
            effects: BTreeMap::new(),
        });
        idx
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    pub fn edge_count(&self) -> u64 {
        self.edges
    }

    pub fn distinct_supports(&self) -> usize {
        self.content.len()
    }

    /// Lay out the node sections and write the final file.
    pub fn finish(mut self) -> Result<BuildSummary> {
        if let Some(reason) = self.poisoned.take() {
            return Err(CausenetError::Poisoned(reason));
        }
        let tmp_out = tmp_sibling(&self.out_path);
        let summary = self
            .write_output(&tmp_out)
            .and_then(|summary| {
                fs::rename(&tmp_out, &self.out_path)?;
                Ok(summary)
            })
            .map_err(|err| {
                let _ = fs::remove_file(&tmp_out);
                err
            })?;
        info!(
            path = %self.out_path.display(),
            concepts = summary.concepts,
            edges = summary.edges,
            distinct_supports = summary.distinct_supports,
            observations = summary.observations,
            bytes = summary.bytes,
            "causenet build complete"
        );
        Ok(summary)
    }

    fn write_output(&mut self, tmp_out: &Path) -> Result<BuildSummary> {
        self.content.flush()?;
        let content_len = self.content.bytes_written();
        let (info_len, support_refs) = self.write_node_sections()?;
        let node_index_len = (self.concepts.len() * NodeEntry::SIZE) as u64;
        let header = Header::for_sections(self.concepts.len() as u64, node_index_len, info_len);

        let mut out = BufWriter::new(File::create(tmp_out)?);
        out.write_all(&header.to_bytes())?;
        copy_section(&self.staging.nodes, &mut out, node_index_len, "node index")?;
        copy_section(&self.staging.info, &mut out, info_len, "node info")?;
        copy_section(&self.staging.content, &mut out, content_len, "content")?;
        out.into_inner()
            .map_err(|e| CausenetError::Io(e.into_error()))?
            .sync_all()?;

        Ok(BuildSummary {
            concepts: self.concepts.len() as u64,
            edges: self.edges,
            distinct_supports: self.content.len() as u64,
            support_refs,
            observations: self.observations,
            bytes: header.support_offset + content_len,
        })
    }

    /// Write the node index and node info staging files.
    ///
    /// Returns the node info length and the total number of support references.
    fn write_node_sections(&mut self) -> Result<(u64, u64)> {
        let mut seen = AHashSet::new();
        for node in &mut self.concepts {
            for offsets in node.effects.values_mut() {
                seen.clear();
                offsets.retain(|&offset| seen.insert(offset));
            }
        }

        let mut nodes = BufWriter::new(File::create(&self.staging.nodes)?);
        let mut info = BufWriter::new(File::create(&self.staging.info)?);
        let mut info_pos = 0u64;
        let mut support_refs = 0u64;

        for (cause, node) in self.concepts.iter().enumerate() {
            let name_offset = info_pos;
            let effect_offset = name_offset + node.name.len() as u64 + 1;
            nodes.write_all(
                &NodeEntry {
                    name_offset,
                    effect_offset,
                }
                .to_bytes(),
            )?;

            info.write_all(node.name.as_bytes())?;
            info.write_all(&[0])?;
            let mut list_offset =
                effect_offset + ((node.effects.len() + 1) * EdgeEntry::SIZE) as u64;
            for (&target, offsets) in &node.effects {
                let support_count =
                    u32::try_from(offsets.len()).map_err(|_| CausenetError::TooManySupports {
                        cause: cause as u32,
                        effect: target,
                    })?;
                let edge = EdgeEntry {
                    target,
                    support_count,
                    support_list_offset: list_offset,
                };
                info.write_all(&edge.to_bytes())?;
                list_offset += (offsets.len() * CONTENT_OFFSET_SIZE) as u64;
            }
            info.write_all(&EdgeEntry::SENTINEL.to_bytes())?;

            let mut refs = 0usize;
            for offsets in node.effects.values() {
                for offset in offsets {
                    info.write_all(&offset.to_le_bytes())?;
                }
                refs += offsets.len();
            }

            info_pos += format::node_info_len(node.name.len(), node.effects.len(), refs);
            debug_assert_eq!(info_pos, list_offset);
            support_refs += refs as u64;
        }

        nodes.flush()?;
        info.flush()?;
        Ok((info_pos, support_refs))
    }
}

impl Drop for CausenetWriter {
    fn drop(&mut self) {
        self.staging.remove();
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CausenetError::EmptyConceptName);
    }
    if name.as_bytes().contains(&0) {
        return Err(CausenetError::NulInString {
            field: "concept name",
        });
    }
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Append a staging file to `out`, checking it has the length the header promises.
fn copy_section(src: &Path, out: &mut impl Write, expected: u64, section: &str) -> Result<()> {
    let mut reader = BufReader::new(File::open(src)?);
    let copied = io::copy(&mut reader, out)?;
    if copied != expected {
        return Err(CausenetError::corrupt(format!(
            "{section} staging section is {copied} bytes, expected {expected}"
        )));
    }
    Ok(())
}
