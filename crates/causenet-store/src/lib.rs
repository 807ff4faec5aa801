//! CauseNet store: compact, memory-mapped storage for a large causal graph.
//!
//! Key pieces:
//! 1. **Binary layout** (`format`): a header, a fixed-stride node index, a
//!    variable-length node info section and a deduplicated content section.
//!    Offsets are section-relative, so files are position independent.
//! 2. **Content deduplication** (`content_store`): each distinct support is
//!    stored once and referenced by offset from every edge that cites it.
//! 3. **Writer** (`writer`, `build`): single-pass layout of concepts and
//!    sorted edge arrays from a stream of cause/effect/support triples.
//! 4. **Reader** (`reader`): random access over a mapped file without
//!    loading it.
//! 5. **Traversal** (`algorithms`): shortest path and connected components
//!    over any neighbor function.
//!
//! ```no_run
//! use causenet_store::{Causenet, CausenetWriter, SourceType, Support};
//!
//! # fn main() -> causenet_store::Result<()> {
//! let mut writer = CausenetWriter::create("graph.causenet")?;
//! writer.add_edge(
//!     "smoking",
//!     "cancer",
//!     &[Support::new(SourceType::WikipediaSentence, "123", "Smoking causes cancer.")],
//! )?;
//! writer.finish()?;
//!
//! let causenet = Causenet::open("graph.causenet")?;
//! let smoking = causenet.concept_index("smoking").expect("present");
//! for (effect, supports) in causenet.effects(smoking) {
//!     println!("{} ({supports})", causenet.concept_name(effect));
//! }
//! # Ok(())
//! # }
//! ```

pub mod algorithms;
pub mod build;
pub mod content_store;
pub mod error;
pub mod format;
pub mod query;
pub mod reader;
pub mod support;
pub mod writer;

pub use algorithms::{component_sizes, connected_components, shortest_path, NodeId};
pub use build::{build_causenet, BuildOptions, CausalRelation};
pub use content_store::ContentStore;
pub use error::{CausenetError, Result};
pub use format::{EdgeEntry, EdgeSlot, Header, NodeEntry, SENTINEL_TARGET};
pub use query::{CausenetQueries, ConceptLookup, ConceptView, PathWeighting};
pub use reader::{Causenet, Concepts, Effects, Supports, VerifyReport};
pub use support::{SourceType, Support};
pub use writer::{BuildSummary, CausenetWriter, WriterOptions};
