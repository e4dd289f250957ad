//! Document capability interface consumed by the mutator.
//! Hosts expose top-level blocks by position and tables as rows of cells;
//! the mutator only reads, appends siblings, and rewrites cell lines.

pub mod memory;
pub mod mutator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::Document;
pub use mutator::{DocumentMutator, FailedUnit, Location, TranslationReport};

/// Named paragraph style carried over from a source block to its translation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleRef(pub String);

impl StyleRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StyleRef {
    fn default() -> Self {
        Self("Normal".to_string())
    }
}

/// One rendered line of a table cell and the paragraph style it sits in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledLine {
    pub text: String,
    pub style: StyleRef,
}

impl StyledLine {
    pub fn new(text: impl Into<String>, style: StyleRef) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// Stable position of a cell: table, row and column index in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellPos {
    pub table: usize,
    pub row: usize,
    pub column: usize,
}

impl CellPos {
    pub fn new(table: usize, row: usize, column: usize) -> Self {
        Self { table, row, column }
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no {0} in document")]
    OutOfRange(String),
}

/// Mutation capability over a structured document.
///
/// Block indices count top-level paragraphs only (tables are addressed
/// separately). Inserting a block shifts the indices of the blocks after it.
pub trait DocumentTree {
    fn block_count(&self) -> usize;

    fn block_text(&self, index: usize) -> Result<&str, DocumentError>;

    fn block_style(&self, index: usize) -> Result<StyleRef, DocumentError>;

    /// Insert a new top-level block directly after `index`.
    fn insert_block_after(
        &mut self,
        index: usize,
        text: String,
        style: StyleRef,
    ) -> Result<(), DocumentError>;

    fn table_count(&self) -> usize;

    fn row_count(&self, table: usize) -> usize;

    fn cell_count(&self, table: usize, row: usize) -> usize;

    /// Lines of a cell in order, one per line break or paragraph.
    fn cell_lines(&self, pos: CellPos) -> Result<Vec<StyledLine>, DocumentError>;

    /// Clear the cell and write `lines`, one paragraph each.
    fn set_cell_lines(&mut self, pos: CellPos, lines: Vec<StyledLine>) -> Result<(), DocumentError>;

    /// Identity used to visit each cell once. Hosts whose merged cells show up
    /// at several positions return the anchor position for all of them.
    fn cell_key(&self, pos: CellPos) -> CellPos {
        pos
    }
}
