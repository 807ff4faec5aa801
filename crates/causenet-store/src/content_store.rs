//! Content-addressed support storage.
//!
//! Every distinct `(source type, id, content)` triple is appended to the
//! content section exactly once; later requests for an equal support return
//! the offset recorded the first time.

use std::io::Write;

use ahash::AHashMap;

use crate::error::Result;
use crate::support::Support;

/// Deduplicating appender for the content section.
pub struct ContentStore<W: Write> {
    out: W,
    /// Bytes appended so far; the offset the next new record will get.
    position: u64,
    offsets: AHashMap<Support, u64>,
}

impl<W: Write> ContentStore<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            position: 0,
            offsets: AHashMap::new(),
        }
    }

    /// Offset of `support` in the content section, appending it on first sight.
    ///
    /// The flag is `true` when the record was written by this call.
    pub fn intern_or_get(&mut self, support: &Support) -> Result<(u64, bool)> {
        if let Some(&offset) = self.offsets.get(support) {
            return Ok((offset, false));
        }
        support.validate()?;

        let offset = self.position;
        self.out.write_all(&[support.source_type.tag()])?;
        self.out.write_all(support.id.as_bytes())?;
        self.out.write_all(&[0])?;
        self.out.write_all(support.content.as_bytes())?;
        self.out.write_all(&[0])?;
        self.position += support.encoded_len() as u64;
        self.offsets.insert(support.clone(), offset);
        Ok((offset, true))
    }

    /// Number of distinct supports stored.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Total length of the content section so far.
    pub fn bytes_written(&self) -> u64 {
        self.position
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
