//! Bilingual document pass.
//! Paragraph pass: every non-empty top-level block gets its translation
//! inserted as the next sibling, same style. Table pass: every cell is
//! rewritten as original/translated line pairs.
//! Single sequential walk: each lookup is awaited before the next unit.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{CellPos, DocumentError, DocumentTree, StyledLine};
use crate::cancellation::{CancelScope, StopReason};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::translate::cache::{CacheStats, Lookup, TranslationCache};
use crate::translate::{TranslateError, Translator};

/// Where a translated unit came from. Paragraph indices count source
/// paragraphs in the original document, ignoring inserted translations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Paragraph { index: usize },
    Cell { pos: CellPos, line: usize },
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Paragraph { index } => write!(f, "paragraph {}", index + 1),
            Location::Cell { pos, line } => write!(
                f,
                "table {} row {} column {} line {}",
                pos.table + 1,
                pos.row + 1,
                pos.column + 1,
                line + 1
            ),
        }
    }
}

/// A unit whose translation was replaced by the sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUnit {
    pub location: Location,
    pub text: String,
    pub error: TranslateError,
}

/// What one run did to the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationReport {
    pub paragraphs_translated: usize,
    pub cells_translated: usize,
    pub lines_translated: usize,
    pub failures: Vec<FailedUnit>,
    pub cache: CacheStats,
    /// Set when the run stopped before visiting every unit.
    pub stopped: Option<StopReason>,
}

impl TranslationReport {
    pub fn is_complete(&self) -> bool {
        self.stopped.is_none() && self.failures.is_empty()
    }

    /// One `warn` per failed text so they can be redone by hand, then a summary.
    pub fn log(&self) {
        for failure in &self.failures {
            warn!(
                location = %failure.location,
                text = %failure.text,
                error = %failure.error,
                "translation missing, sentinel written"
            );
        }
        info!(
            paragraphs = self.paragraphs_translated,
            cells = self.cells_translated,
            lines = self.lines_translated,
            failed = self.failures.len(),
            cache_hits = self.cache.hits,
            network_calls = self.cache.misses,
            stopped = ?self.stopped,
            "document pass finished"
        );
    }
}

/// Outcome of translating one unit.
enum Step {
    Done(String),
    Stop(StopReason),
}

/// Walks a document and inserts translations through the cache.
pub struct DocumentMutator<'c, T> {
    cache: &'c mut TranslationCache<T>,
    scope: CancelScope,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<'c, T: Translator> DocumentMutator<'c, T> {
    pub fn new(cache: &'c mut TranslationCache<T>, scope: CancelScope) -> Self {
        Self {
            cache,
            scope,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run both passes. Translation failures never abort the run; only a
    /// host reporting an out-of-range position does.
    pub async fn translate_document<D: DocumentTree>(
        &mut self,
        doc: &mut D,
    ) -> Result<TranslationReport, DocumentError> {
        let mut report = TranslationReport::default();
        let before = self.cache.stats();

        let span = self.metrics.as_ref().map(|m| m.span(metric_names::PARAGRAPH_PASS));
        self.paragraph_pass(doc, &mut report).await?;
        if let Some(span) = span {
            span.finish();
        }

        if report.stopped.is_none() {
            let span = self.metrics.as_ref().map(|m| m.span(metric_names::TABLE_PASS));
            self.table_pass(doc, &mut report).await?;
            if let Some(span) = span {
                span.finish();
            }
        }

        let after = self.cache.stats();
        report.cache = CacheStats {
            hits: after.hits - before.hits,
            misses: after.misses - before.misses,
            failures: after.failures - before.failures,
        };
        report.log();
        Ok(report)
    }

    /// Translate one text, recording a failure against `location`.
    async fn translate_unit(
        &mut self,
        text: &str,
        location: Location,
        report: &mut TranslationReport,
    ) -> Step {
        if let Some(reason) = self.scope.stop_reason() {
            return Step::Stop(reason);
        }
        let lookup = self.cache.get_or_translate(text, self.scope.token()).await;
        if let Some(err) = lookup.error() {
            if !err.is_recoverable() {
                let reason = self.scope.stop_reason().unwrap_or(StopReason::Cancelled);
                return Step::Stop(reason);
            }
            report.failures.push(FailedUnit {
                location,
                text: text.to_string(),
                error: err.clone(),
            });
        }
        Step::Done(lookup.into_text())
    }

    async fn paragraph_pass<D: DocumentTree>(
        &mut self,
        doc: &mut D,
        report: &mut TranslationReport,
    ) -> Result<(), DocumentError> {
        let mut index = 0;
        let mut source_index = 0;

        while index < doc.block_count() {
            let text = doc.block_text(index)?.to_string();
            if text.is_empty() {
                index += 1;
                source_index += 1;
                continue;
            }

            let location = Location::Paragraph { index: source_index };
            let translated = match self.translate_unit(&text, location, report).await {
                Step::Done(t) => t,
                Step::Stop(reason) => {
                    info!(?reason, at = %location, "paragraph pass stopped");
                    report.stopped = Some(reason);
                    return Ok(());
                }
            };

            let style = doc.block_style(index)?;
            doc.insert_block_after(index, translated, style)?;
            report.paragraphs_translated += 1;

            // Skip the block just inserted.
            index += 2;
            source_index += 1;
        }

        debug!(paragraphs = report.paragraphs_translated, "paragraph pass done");
        Ok(())
    }

    /// Rewrite every cell as source/translation line pairs. A blank line
    /// inside a cell is kept once with no translation after it, so the
    /// pairs are not strict.
    async fn table_pass<D: DocumentTree>(
        &mut self,
        doc: &mut D,
        report: &mut TranslationReport,
    ) -> Result<(), DocumentError> {
        let mut visited: HashSet<CellPos> = HashSet::new();

        for table in 0..doc.table_count() {
            for row in 0..doc.row_count(table) {
                for column in 0..doc.cell_count(table, row) {
                    let pos = CellPos::new(table, row, column);
                    let key = doc.cell_key(pos);
                    if !visited.insert(key) {
                        continue;
                    }

                    let lines = trim_cell(doc.cell_lines(key)?);
                    if lines.is_empty() {
                        continue;
                    }

                    let mut rewritten = Vec::with_capacity(lines.len() * 2);
                    let mut translated_lines = 0;
                    for (line_no, line) in lines.into_iter().enumerate() {
                        let source = line.text.trim();
                        if source.is_empty() {
                            rewritten.push(line);
                            continue;
                        }
                        let location = Location::Cell { pos: key, line: line_no };
                        let translated = match self.translate_unit(source, location, report).await {
                            Step::Done(t) => t,
                            Step::Stop(reason) => {
                                // Leave the half-done cell as it was.
                                info!(?reason, at = %location, "table pass stopped");
                                report.stopped = Some(reason);
                                return Ok(());
                            }
                        };
                        let style = line.style.clone();
                        rewritten.push(line);
                        rewritten.push(StyledLine::new(translated, style));
                        translated_lines += 1;
                    }

                    doc.set_cell_lines(key, rewritten)?;
                    report.cells_translated += 1;
                    report.lines_translated += translated_lines;
                }
            }
        }

        debug!(cells = report.cells_translated, "table pass done");
        Ok(())
    }
}

/// Strip the cell text as a whole: drop blank lines at both ends and the
/// outer whitespace of the first and last line.
fn trim_cell(mut lines: Vec<StyledLine>) -> Vec<StyledLine> {
    let Some(first) = lines.iter().position(|l| !l.text.trim().is_empty()) else {
        return Vec::new();
    };
    let last = lines
        .iter()
        .rposition(|l| !l.text.trim().is_empty())
        .unwrap_or(first);

    lines.truncate(last + 1);
    lines.drain(..first);

    if let Some(line) = lines.first_mut() {
        line.text = line.text.trim_start().to_string();
    }
    if let Some(line) = lines.last_mut() {
        line.text = line.text.trim_end().to_string();
    }
    lines
}
