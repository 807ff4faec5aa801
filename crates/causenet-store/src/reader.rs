//! Read-only random access over a finished `.causenet` file.
//!
//! The header is validated when the file is opened. Everything else is read
//! with bounds-checked slice accesses, so a damaged file makes a query panic
//! rather than read out of bounds; [`Causenet::verify`] walks the whole file
//! up front for callers that do not trust its origin.
//!
//! Nothing is mutated after open, so a `Causenet` can be shared across
//! threads freely.

use std::borrow::Cow;
use std::fs::File;
use std::iter::FusedIterator;
use std::ops::Deref;
use std::path::Path;

use ahash::AHashSet;
use memmap2::Mmap;
use serde::Serialize;
use tracing::info;

use crate::error::{CausenetError, Result};
use crate::format::{
    read_cstr, read_u64, EdgeEntry, EdgeSlot, Header, NodeEntry, CONTENT_OFFSET_SIZE,
};
use crate::support::{SourceType, Support};

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Backing {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Backing::Mapped(map) => map,
            Backing::Owned(bytes) => bytes,
        }
    }
}

/// An opened CauseNet graph.
pub struct Causenet {
    data: Backing,
    header: Header,
}

/// Result of a full structural check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VerifyReport {
    pub concepts: u64,
    pub edges: u64,
    pub support_refs: u64,
    pub distinct_supports: u64,
}

impl Causenet {
    /// Memory-map the file at `path`.
    ///
    /// Only the header is checked. A file damaged past the header makes later
    /// queries panic; use [`Causenet::open_verified`] for files of unknown
    /// origin.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let cannot_load = |source| CausenetError::CannotLoad {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(cannot_load)?;
        // SAFETY: the file is opened read-only and the format is write-once;
        // callers must not truncate or rewrite it while it is mapped.
        let map = unsafe { Mmap::map(&file) }.map_err(cannot_load)?;
        let causenet = Self::from_backing(Backing::Mapped(map))?;
        info!(
            path = %path.display(),
            concepts = causenet.header.node_count,
            bytes = causenet.data.len(),
            "loaded causenet"
        );
        Ok(causenet)
    }

    /// Memory-map the file at `path` and run [`Causenet::verify`] before
    /// returning it, so no later query can hit a malformed offset.
    pub fn open_verified(path: impl AsRef<Path>) -> Result<Self> {
        let causenet = Self::open(path)?;
        causenet.verify()?;
        Ok(causenet)
    }

    /// Use an in-memory copy of a file.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_backing(Backing::Owned(bytes))
    }

    fn from_backing(data: Backing) -> Result<Self> {
        let header = Header::parse(&data)?;
        Ok(Self { data, header })
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn file_len(&self) -> usize {
        self.data.len()
    }

    fn info(&self) -> &[u8] {
        &self.data[self.header.info_offset as usize..self.header.support_offset as usize]
    }

    fn content(&self) -> &[u8] {
        &self.data[self.header.support_offset as usize..]
    }

    fn node(&self, idx: u32) -> NodeEntry {
        assert!(
            (idx as u64) < self.header.node_count,
            "concept index {idx} out of range ({} concepts)",
            self.header.node_count
        );
        let at = self.header.concept_offset as usize + idx as usize * NodeEntry::SIZE;
        NodeEntry::read(&self.data, at)
    }

    fn name_bytes(&self, idx: u32) -> &[u8] {
        let offset = self.node(idx).name_offset as usize;
        let info = self.info();
        match read_cstr(info, offset) {
            Some(name) => name,
            None => panic!("name of concept {idx} is not NUL-terminated"),
        }
    }

    pub fn concept_count(&self) -> usize {
        self.header.node_count as usize
    }

    /// Index of the concept called `name`.
    ///
    /// This is a linear scan over all names; use
    /// [`ConceptLookup`](crate::query::ConceptLookup) for repeated lookups.
    pub fn concept_index(&self, name: &str) -> Option<u32> {
        let needle = name.as_bytes();
        (0..self.header.node_count as u32).find(|&i| self.name_bytes(i) == needle)
    }

    /// Name of the concept at `idx`. Panics if `idx` is out of range.
    pub fn concept_name(&self, idx: u32) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes(idx))
    }

    /// All concept names in index order.
    pub fn concepts(&self) -> Concepts<'_> {
        Concepts {
            causenet: self,
            next: 0,
            end: self.header.node_count as u32,
        }
    }

    fn edge_entries(&self, idx: u32) -> EdgeEntries<'_> {
        EdgeEntries {
            info: self.info(),
            pos: self.node(idx).effect_offset as usize,
            done: false,
        }
    }

    /// `(target index, support count)` of every effect of `idx`, by ascending target.
    pub fn effects(&self, idx: u32) -> Effects<'_> {
        Effects {
            edges: self.edge_entries(idx),
        }
    }

    pub fn effect_count(&self, idx: u32) -> usize {
        self.edge_entries(idx).count()
    }

    /// Supports of the edge `cause -> effect`; empty when there is no such edge.
    pub fn support(&self, cause: u32, effect: u32) -> Supports<'_> {
        let edge = self
            .edge_entries(cause)
            .take_while(|e| e.target <= effect)
            .find(|e| e.target == effect);
        let (list_at, remaining) = match edge {
            Some(e) => (e.support_list_offset as usize, e.support_count),
            None => (0, 0),
        };
        Supports {
            info: self.info(),
            content: self.content(),
            list_at,
            remaining,
        }
    }

    /// Walk every node, edge and support reference, checking all offsets.
    pub fn verify(&self) -> Result<VerifyReport> {
        let info = self.info();
        let content = self.content();
        let node_count = self.header.node_count;
        let mut report = VerifyReport {
            concepts: node_count,
            ..VerifyReport::default()
        };
        let mut seen_supports = AHashSet::new();

        for idx in 0..node_count as u32 {
            let node = self.node(idx);
            let name = usize::try_from(node.name_offset)
                .ok()
                .and_then(|at| read_cstr(info, at))
                .ok_or_else(|| {
                    CausenetError::corrupt(format!("concept {idx}: name out of bounds"))
                })?;
            if name.is_empty() || std::str::from_utf8(name).is_err() {
                return Err(CausenetError::corrupt(format!(
                    "concept {idx}: name is empty or not UTF-8"
                )));
            }
            if node.effect_offset != node.name_offset + name.len() as u64 + 1 {
                return Err(CausenetError::corrupt(format!(
                    "concept {idx}: edge array does not follow its name"
                )));
            }

            let mut pos = node.effect_offset as usize;
            let mut last_target: Option<u32> = None;
            loop {
                if pos + EdgeEntry::SIZE > info.len() {
                    return Err(CausenetError::corrupt(format!(
                        "concept {idx}: edge array runs past the node info section"
                    )));
                }
                let edge = match EdgeEntry::read(info, pos) {
                    EdgeSlot::End => break,
                    EdgeSlot::Edge(edge) => edge,
                };
                pos += EdgeEntry::SIZE;
                if edge.target as u64 >= node_count {
                    return Err(CausenetError::corrupt(format!(
                        "concept {idx}: edge target {} out of range",
                        edge.target
                    )));
                }
                if last_target.is_some_and(|last| last >= edge.target) {
                    return Err(CausenetError::corrupt(format!(
                        "concept {idx}: edge targets not strictly ascending"
                    )));
                }
                last_target = Some(edge.target);

                let list_len = edge.support_count as u64 * CONTENT_OFFSET_SIZE as u64;
                let list_end = edge.support_list_offset.checked_add(list_len);
                if list_end.map_or(true, |end| end > info.len() as u64) {
                    return Err(CausenetError::corrupt(format!(
                        "concept {idx}: support list of edge to {} out of bounds",
                        edge.target
                    )));
                }
                for i in 0..edge.support_count as usize {
                    let offset =
                        read_u64(info, edge.support_list_offset as usize + i * CONTENT_OFFSET_SIZE);
                    if seen_supports.insert(offset) {
                        decode_support(content, offset)?;
                    }
                }
                report.edges += 1;
                report.support_refs += edge.support_count as u64;
            }
        }

        report.distinct_supports = seen_supports.len() as u64;
        Ok(report)
    }
}

/// Decode the content record at `offset`.
fn decode_support(content: &[u8], offset: u64) -> Result<Support> {
    let at = usize::try_from(offset)
        .ok()
        .filter(|&at| at < content.len())
        .ok_or_else(|| CausenetError::corrupt(format!("content offset {offset} out of bounds")))?;
    let source_type = SourceType::try_from(content[at])?;
    let id = read_cstr(content, at + 1)
        .ok_or_else(|| CausenetError::corrupt(format!("support id at {offset} unterminated")))?;
    let text = read_cstr(content, at + 1 + id.len() + 1).ok_or_else(|| {
        CausenetError::corrupt(format!("support content at {offset} unterminated"))
    })?;
    Ok(Support {
        source_type,
        id: String::from_utf8_lossy(id).into_owned(),
        content: String::from_utf8_lossy(text).into_owned(),
    })
}

/// Iterator over concept names. See [`Causenet::concepts`].
pub struct Concepts<'a> {
    causenet: &'a Causenet,
    next: u32,
    end: u32,
}

impl<'a> Iterator for Concepts<'a> {
    type Item = Cow<'a, str>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let name = self.causenet.concept_name(self.next);
        self.next += 1;
        Some(name)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.end - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Concepts<'_> {}
impl FusedIterator for Concepts<'_> {}

struct EdgeEntries<'a> {
    info: &'a [u8],
    pos: usize,
    done: bool,
}

impl Iterator for EdgeEntries<'_> {
    type Item = EdgeEntry;

    fn next(&mut self) -> Option<EdgeEntry> {
        if self.done {
            return None;
        }
        match EdgeEntry::read(self.info, self.pos) {
            EdgeSlot::End => {
                self.done = true;
                None
            }
            EdgeSlot::Edge(edge) => {
                self.pos += EdgeEntry::SIZE;
                Some(edge)
            }
        }
    }
}

/// Iterator over `(target, support count)` pairs. See [`Causenet::effects`].
pub struct Effects<'a> {
    edges: EdgeEntries<'a>,
}

impl Iterator for Effects<'_> {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<(u32, u32)> {
        self.edges.next().map(|e| (e.target, e.support_count))
    }
}

impl FusedIterator for Effects<'_> {}

/// Iterator over the supports of one edge. See [`Causenet::support`].
pub struct Supports<'a> {
    info: &'a [u8],
    content: &'a [u8],
    list_at: usize,
    remaining: u32,
}

impl Iterator for Supports<'_> {
    type Item = Support;

    fn next(&mut self) -> Option<Support> {
        if self.remaining == 0 {
            return None;
        }
        let offset = read_u64(self.info, self.list_at);
        self.list_at += CONTENT_OFFSET_SIZE;
        self.remaining -= 1;
        match decode_support(self.content, offset) {
            Ok(support) => Some(support),
            Err(err) => panic!("{err}"),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

impl ExactSizeIterator for Supports<'_> {}
impl FusedIterator for Supports<'_> {}
