//! In-memory document model with a JSON on-disk form.
//! The body is an ordered mix of paragraphs and tables, like a word-processor
//! body; paragraphs and tables are indexed separately for `DocumentTree`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CellPos, DocumentError, DocumentTree, StyleRef, StyledLine};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub body: Vec<BodyItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyItem {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    #[serde(default)]
    pub style: StyleRef,
}

impl Paragraph {
    pub fn new(text: impl Into<String>, style: StyleRef) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    /// Build a table of single-paragraph cells in the default style.
    pub fn from_text<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|cells| Row {
                    cells: cells.into_iter().map(Cell::from_text).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub paragraphs: Vec<Paragraph>,
    /// Column of the cell this one is merged into (same row).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_with: Option<usize>,
}

impl Cell {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            paragraphs: vec![Paragraph::new(text, StyleRef::default())],
            merged_with: None,
        }
    }

    fn lines(&self) -> Vec<StyledLine> {
        let mut out = Vec::new();
        for p in &self.paragraphs {
            if p.text.is_empty() {
                out.push(StyledLine::new("", p.style.clone()));
                continue;
            }
            out.extend(split_lines(&p.text).map(|l| StyledLine::new(l, p.style.clone())));
        }
        out
    }
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c'..='\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split on every line boundary a text run may carry, with `\r\n` as one
/// break. A trailing break does not open an empty line.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let Some((at, brk)) = rest.char_indices().find(|&(_, c)| is_line_break(c)) else {
            return Some(std::mem::take(&mut rest));
        };
        let line = &rest[..at];
        let skip = if rest[at..].starts_with("\r\n") { 2 } else { brk.len_utf8() };
        rest = &rest[at + skip..];
        Some(line)
    })
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let raw = std::fs::read_to_string(path)?;
        let doc = Self::from_json(&raw)?;
        debug!(
            path = %path.display(),
            blocks = doc.block_count(),
            tables = doc.table_count(),
            "document loaded"
        );
        Ok(doc)
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn push_paragraph(&mut self, text: impl Into<String>, style: StyleRef) -> &mut Self {
        self.body.push(BodyItem::Paragraph(Paragraph::new(text, style)));
        self
    }

    pub fn push_table(&mut self, table: Table) -> &mut Self {
        self.body.push(BodyItem::Table(table));
        self
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.body.iter().filter_map(|item| match item {
            BodyItem::Paragraph(p) => Some(p),
            BodyItem::Table(_) => None,
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.body.iter().filter_map(|item| match item {
            BodyItem::Table(t) => Some(t),
            BodyItem::Paragraph(_) => None,
        })
    }

    /// Body position of the `index`-th top-level paragraph.
    fn paragraph_slot(&self, index: usize) -> Result<usize, DocumentError> {
        self.body
            .iter()
            .enumerate()
            .filter(|(_, item)| matches!(item, BodyItem::Paragraph(_)))
            .nth(index)
            .map(|(slot, _)| slot)
            .ok_or_else(|| DocumentError::OutOfRange(format!("block {index}")))
    }

    fn paragraph(&self, index: usize) -> Result<&Paragraph, DocumentError> {
        match &self.body[self.paragraph_slot(index)?] {
            BodyItem::Paragraph(p) => Ok(p),
            BodyItem::Table(_) => Err(DocumentError::OutOfRange(format!("block {index}"))),
        }
    }

    fn table(&self, index: usize) -> Option<&Table> {
        self.tables().nth(index)
    }

    fn cell(&self, pos: CellPos) -> Result<&Cell, DocumentError> {
        self.table(pos.table)
            .and_then(|t| t.rows.get(pos.row))
            .and_then(|r| r.cells.get(pos.column))
            .ok_or_else(|| DocumentError::OutOfRange(format!("cell {pos:?}")))
    }

    fn cell_mut(&mut self, pos: CellPos) -> Result<&mut Cell, DocumentError> {
        self.body
            .iter_mut()
            .filter_map(|item| match item {
                BodyItem::Table(t) => Some(t),
                BodyItem::Paragraph(_) => None,
            })
            .nth(pos.table)
            .and_then(|t| t.rows.get_mut(pos.row))
            .and_then(|r| r.cells.get_mut(pos.column))
            .ok_or_else(|| DocumentError::OutOfRange(format!("cell {pos:?}")))
    }
}

impl DocumentTree for Document {
    fn block_count(&self) -> usize {
        self.paragraphs().count()
    }

    fn block_text(&self, index: usize) -> Result<&str, DocumentError> {
        Ok(self.paragraph(index)?.text.as_str())
    }

    fn block_style(&self, index: usize) -> Result<StyleRef, DocumentError> {
        Ok(self.paragraph(index)?.style.clone())
    }

    fn insert_block_after(
        &mut self,
        index: usize,
        text: String,
        style: StyleRef,
    ) -> Result<(), DocumentError> {
        let slot = self.paragraph_slot(index)?;
        self.body
            .insert(slot + 1, BodyItem::Paragraph(Paragraph { text, style }));
        Ok(())
    }

    fn table_count(&self) -> usize {
        self.tables().count()
    }

    fn row_count(&self, table: usize) -> usize {
        self.table(table).map_or(0, |t| t.rows.len())
    }

    fn cell_count(&self, table: usize, row: usize) -> usize {
        self.table(table)
            .and_then(|t| t.rows.get(row))
            .map_or(0, |r| r.cells.len())
    }

    fn cell_lines(&self, pos: CellPos) -> Result<Vec<StyledLine>, DocumentError> {
        Ok(self.cell(pos)?.lines())
    }

    fn set_cell_lines(&mut self, pos: CellPos, lines: Vec<StyledLine>) -> Result<(), DocumentError> {
        let cell = self.cell_mut(pos)?;
        cell.paragraphs = lines
            .into_iter()
            .map(|l| Paragraph::new(l.text, l.style))
            .collect();
        Ok(())
    }

    fn cell_key(&self, pos: CellPos) -> CellPos {
        match self.cell(pos).ok().and_then(|c| c.merged_with) {
            Some(column) => CellPos { column, ..pos },
            None => pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut doc = Document::new();
        doc.push_paragraph("Title", StyleRef::new("Heading1"))
            .push_table(Table::from_text([["a", "b"], ["c", "d"]]))
            .push_paragraph("Body", StyleRef::default());
        doc
    }

    #[test]
    fn test_blocks_skip_tables() {
        let doc = sample();
        assert_eq!(doc.block_count(), 2);
        assert_eq!(doc.block_text(1).unwrap(), "Body");
        assert_eq!(doc.block_style(0).unwrap(), StyleRef::new("Heading1"));
        assert!(matches!(doc.block_text(2), Err(DocumentError::OutOfRange(_))));
    }

    #[test]
    fn test_insert_after_lands_next_to_source() {
        let mut doc = sample();
        doc.insert_block_after(0, "Titre".into(), StyleRef::new("Heading1"))
            .unwrap();
        assert_eq!(doc.block_count(), 3);
        assert_eq!(doc.block_text(1).unwrap(), "Titre");
        // Still before the table in body order.
        assert!(matches!(doc.body[1], BodyItem::Paragraph(_)));
        assert!(matches!(doc.body[2], BodyItem::Table(_)));
    }

    #[test]
    fn test_table_geometry() {
        let doc = sample();
        assert_eq!(doc.table_count(), 1);
        assert_eq!(doc.row_count(0), 2);
        assert_eq!(doc.cell_count(0, 1), 2);
        assert_eq!(doc.row_count(5), 0);
        assert_eq!(doc.cell_count(0, 9), 0);
    }

    #[test]
    fn test_cell_lines_split_paragraphs_and_breaks() {
        let mut doc = Document::new();
        doc.push_table(Table {
            rows: vec![Row {
                cells: vec![Cell {
                    paragraphs: vec![
                        Paragraph::new("one\ntwo", StyleRef::new("Cell")),
                        Paragraph::new("", StyleRef::default()),
                        Paragraph::new("three", StyleRef::new("Emph")),
                    ],
                    merged_with: None,
                }],
            }],
        });
        let lines = doc.cell_lines(CellPos::new(0, 0, 0)).unwrap();
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["one", "two", "", "three"]);
        assert_eq!(lines[1].style, StyleRef::new("Cell"));
        assert_eq!(lines[3].style, StyleRef::new("Emph"));
    }

    #[test]
    fn test_split_lines_on_every_boundary() {
        let split = |t: &'static str| split_lines(t).collect::<Vec<_>>();
        assert_eq!(split("one\rtwo"), ["one", "two"]);
        assert_eq!(split("a\r\nb\n"), ["a", "b"]);
        assert_eq!(split("a\n\nb"), ["a", "", "b"]);
        assert_eq!(split("a\x0bb\x0cc\x1dd"), ["a", "b", "c", "d"]);
        assert_eq!(split("x\u{85}y\u{2028}z\u{2029}w"), ["x", "y", "z", "w"]);
        assert_eq!(split("\r\r\n"), ["", ""]);
        assert!(split("").is_empty());
    }

    #[test]
    fn test_set_cell_lines_replaces_content() {
        let mut doc = sample();
        let pos = CellPos::new(0, 1, 0);
        doc.set_cell_lines(
            pos,
            vec![
                StyledLine::new("c", StyleRef::default()),
                StyledLine::new("C", StyleRef::default()),
            ],
        )
        .unwrap();
        let texts: Vec<String> = doc.cell_lines(pos).unwrap().into_iter().map(|l| l.text).collect();
        assert_eq!(texts, ["c", "C"]);
        assert_eq!(doc.cell(pos).unwrap().paragraphs.len(), 2);
        assert_eq!(doc.cell(CellPos::new(0, 0, 0)).unwrap().paragraphs[0].text, "a");
    }

    #[test]
    fn test_merged_cell_key() {
        let mut doc = sample();
        if let BodyItem::Table(t) = &mut doc.body[1] {
            t.rows[0].cells[1].merged_with = Some(0);
        }
        assert_eq!(doc.cell_key(CellPos::new(0, 0, 1)), CellPos::new(0, 0, 0));
        assert_eq!(doc.cell_key(CellPos::new(0, 1, 1)), CellPos::new(0, 1, 1));
    }

    #[test]
    fn test_json_round_trip_and_default_style() {
        let raw = r#"{"body":[
            {"paragraph":{"text":"Hi"}},
            {"table":{"rows":[{"cells":[{"paragraphs":[{"text":"x","style":"Cell"}]}]}]}}
        ]}"#;
        let doc = Document::from_json(raw).unwrap();
        assert_eq!(doc.block_style(0).unwrap(), StyleRef::new("Normal"));
        let again = Document::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Document::load(Path::new("/nonexistent/interleaf/doc.json")).unwrap_err();
        assert!(matches!(err, DocumentError::Io(_)));
    }
}
