//! On-disk layout of a `.causenet` file.
//!
//! All integers are little-endian. The file is four consecutive sections:
//!
//! ```text
//! +--------------------------------+
//! | Header (32 bytes)              |  node_count, concept/info/support offsets
//! +--------------------------------+
//! | NodeEntry[node_count]          |  16 bytes each, addressed by concept index
//! +--------------------------------+
//! | node info, per concept:        |
//! |   name, NUL-terminated         |
//! |   EdgeEntry[..] by target asc  |  16 bytes each
//! |   sentinel EdgeEntry           |  {u32::MAX, 0, 0}
//! |   u64 content offsets, per edge|
//! +--------------------------------+
//! | content, per distinct support: |
//! |   u8 source type tag           |
//! |   id, NUL-terminated           |
//! |   content, NUL-terminated      |
//! +--------------------------------+
//! ```
//!
//! Header offsets are relative to the start of the file. `NodeEntry` offsets
//! and `EdgeEntry::support_list_offset` are relative to the node info section;
//! the content offsets stored in support lists are relative to the content
//! section. The file is therefore position independent.

use crate::error::{CausenetError, Result};

/// Target index reserved for the end-of-list edge.
pub const SENTINEL_TARGET: u32 = u32::MAX;

/// Largest number of concepts a file can hold (indices must stay below the sentinel).
pub const MAX_CONCEPTS: u64 = SENTINEL_TARGET as u64;

/// Width of one entry in an edge's support offset list.
pub const CONTENT_OFFSET_SIZE: usize = 8;

/// File header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub node_count: u64,
    pub concept_offset: u64,
    pub info_offset: u64,
    pub support_offset: u64,
}

impl Header {
    pub const SIZE: usize = 32;

    /// Header for a file whose node index and node info sections have the given lengths.
    pub fn for_sections(node_count: u64, node_index_len: u64, info_len: u64) -> Self {
        let concept_offset = Self::SIZE as u64;
        let info_offset = concept_offset + node_index_len;
        Self {
            node_count,
            concept_offset,
            info_offset,
            support_offset: info_offset + info_len,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.node_count.to_le_bytes());
        out[8..16].copy_from_slice(&self.concept_offset.to_le_bytes());
        out[16..24].copy_from_slice(&self.info_offset.to_le_bytes());
        out[24..32].copy_from_slice(&self.support_offset.to_le_bytes());
        out
    }

    /// Parse and validate a header against the length of the whole file.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(CausenetError::corrupt(format!(
                "file is {} bytes, shorter than the {}-byte header",
                bytes.len(),
                Self::SIZE
            )));
        }
        let header = Self {
            node_count: read_u64(bytes, 0),
            concept_offset: read_u64(bytes, 8),
            info_offset: read_u64(bytes, 16),
            support_offset: read_u64(bytes, 24),
        };
        header.validate(bytes.len() as u64)?;
        Ok(header)
    }

    fn validate(&self, file_len: u64) -> Result<()> {
        if self.node_count >= MAX_CONCEPTS {
            return Err(CausenetError::corrupt(format!(
                "node count {} collides with the sentinel index",
                self.node_count
            )));
        }
        if self.concept_offset != Self::SIZE as u64 {
            return Err(CausenetError::corrupt(format!(
                "node index section starts at {}, expected {}",
                self.concept_offset,
                Self::SIZE
            )));
        }
        let index_len = self
            .node_count
            .checked_mul(NodeEntry::SIZE as u64)
            .ok_or_else(|| CausenetError::corrupt("node index length overflows"))?;
        if self.info_offset.checked_sub(self.concept_offset) != Some(index_len) {
            return Err(CausenetError::corrupt(format!(
                "node index section is {} bytes, expected {} for {} nodes",
                self.info_offset.wrapping_sub(self.concept_offset),
                index_len,
                self.node_count
            )));
        }
        if self.support_offset < self.info_offset || self.support_offset > file_len {
            return Err(CausenetError::corrupt(format!(
                "section offsets {}/{} out of order or beyond file length {}",
                self.info_offset, self.support_offset, file_len
            )));
        }
        Ok(())
    }
}

/// Per-concept descriptor in the node index section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEntry {
    pub name_offset: u64,
    pub effect_offset: u64,
}

impl NodeEntry {
    pub const SIZE: usize = 16;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.name_offset.to_le_bytes());
        out[8..16].copy_from_slice(&self.effect_offset.to_le_bytes());
        out
    }

    pub fn read(bytes: &[u8], at: usize) -> Self {
        Self {
            name_offset: read_u64(bytes, at),
            effect_offset: read_u64(bytes, at + 8),
        }
    }
}

/// One outgoing edge as stored in a concept's edge array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEntry {
    pub target: u32,
    pub support_count: u32,
    pub support_list_offset: u64,
}

impl EdgeEntry {
    pub const SIZE: usize = 16;

    pub const SENTINEL: EdgeEntry = EdgeEntry {
        target: SENTINEL_TARGET,
        support_count: 0,
        support_list_offset: 0,
    };

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.target.to_le_bytes());
        out[4..8].copy_from_slice(&self.support_count.to_le_bytes());
        out[8..16].copy_from_slice(&self.support_list_offset.to_le_bytes());
        out
    }

    /// Decode the slot at `at`, mapping the sentinel to [`EdgeSlot::End`].
    pub fn read(bytes: &[u8], at: usize) -> EdgeSlot {
        let target = read_u32(bytes, at);
        if target == SENTINEL_TARGET {
            return EdgeSlot::End;
        }
        EdgeSlot::Edge(Self {
            target,
            support_count: read_u32(bytes, at + 4),
            support_list_offset: read_u64(bytes, at + 8),
        })
    }
}

/// A decoded edge array slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSlot {
    Edge(EdgeEntry),
    End,
}

/// Bytes a concept occupies in the node info section.
///
/// Depends only on the name length, the edge count and the total number of
/// support references, which is what lets the writer assign every offset in
/// one forward pass.
pub fn node_info_len(name_len: usize, edge_count: usize, support_refs: usize) -> u64 {
    (name_len + 1 + (edge_count + 1) * EdgeEntry::SIZE + support_refs * CONTENT_OFFSET_SIZE) as u64
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

pub(crate) fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

/// The NUL-terminated string starting at `at`, without its terminator.
pub(crate) fn read_cstr(bytes: &[u8], at: usize) -> Option<&[u8]> {
    let tail = bytes.get(at..)?;
    let end = tail.iter().position(|&b| b == 0)?;
    Some(&tail[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip_and_validation() {
        let header = Header::for_sections(2, 32, 100);
        assert_eq!(header.concept_offset, 32);
        assert_eq!(header.info_offset, 64);
        assert_eq!(header.support_offset, 164);

        let mut file = header.to_bytes().to_vec();
        file.resize(200, 0);
        assert_eq!(Header::parse(&file).unwrap(), header);

        // Truncated before the content section.
        assert!(Header::parse(&file[..150]).is_err());
    }

    #[test]
    fn header_rejects_mismatched_node_index() {
        let mut header = Header::for_sections(3, 48, 0);
        header.node_count = 4;
        let mut file = header.to_bytes().to_vec();
        file.resize(128, 0);
        assert!(matches!(Header::parse(&file), Err(CausenetError::Corrupt(_))));
        assert!(Header::parse(&[0u8; 10]).is_err());
    }

    #[test]
    fn sentinel_decodes_as_end() {
        let bytes = EdgeEntry::SENTINEL.to_bytes();
        assert_eq!(EdgeEntry::read(&bytes, 0), EdgeSlot::End);

        let edge = EdgeEntry {
            target: 7,
            support_count: 2,
            support_list_offset: 99,
        };
        assert_eq!(EdgeEntry::read(&edge.to_bytes(), 0), EdgeSlot::Edge(edge));
    }

    #[test]
    fn node_info_len_counts_terminators() {
        // "ab\0" + one edge + sentinel + one offset
        assert_eq!(node_info_len(2, 1, 1), 3 + 32 + 8);
        assert_eq!(node_info_len(0, 0, 0), 1 + 16);
    }

    #[test]
    fn cstr_requires_terminator() {
        let bytes = b"abc\0de";
        assert_eq!(read_cstr(bytes, 0), Some(&b"abc"[..]));
        assert_eq!(read_cstr(bytes, 4), None);
        assert_eq!(read_cstr(bytes, 10), None);
    }
}
