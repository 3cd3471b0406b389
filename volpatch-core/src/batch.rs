//! Batch input parsing and the per-index patch loop.

use serde::Serialize;
use std::fmt::Display;
use std::io::{Read, Seek, Write};
use tracing::{info, warn};

use crate::archive::Archive;
use crate::writer::{PatchOptions, PatchPlan};

/// One well-formed `index|text` input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLine {
    pub line: usize,
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    pub lines: Vec<BatchLine>,
    pub skipped: Vec<SkippedLine>,
}

fn parse_line(raw: &str) -> Result<(usize, &str), String> {
    let (index, text) = raw
        .split_once('|')
        .ok_or_else(|| "missing '|' separator".to_string())?;
    let index = index.trim();
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("non-numeric index '{index}'"));
    }
    let index = index
        .parse::<usize>()
        .map_err(|_| format!("index '{index}' out of range"))?;
    Ok((index, text.trim_start()))
}

/// Parses newline-separated `index|text` records.
///
/// Empty lines are ignored. Lines without a separator or with a non-numeric
/// index are collected as skipped rather than failing the batch.
pub fn parse_batch(src: &str) -> ParsedBatch {
    let mut parsed = ParsedBatch::default();

    for (idx, raw) in src.lines().enumerate() {
        let line = idx + 1;
        let raw = raw.trim_end_matches('\r');
        if raw.is_empty() {
            continue;
        }
        match parse_line(raw) {
            Ok((index, text)) => parsed.lines.push(BatchLine {
                line,
                index,
                text: text.to_string(),
            }),
            Err(reason) => {
                warn!("line {line}: {reason}");
                parsed.skipped.push(SkippedLine { line, reason });
            }
        }
    }

    parsed
}

/// A replacement for one index: encoded bytes, or why encoding failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub line: usize,
    pub index: usize,
    pub text: std::result::Result<Vec<u8>, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchInput {
    pub requests: Vec<UpdateRequest>,
    pub skipped: Vec<SkippedLine>,
}

impl BatchInput {
    /// Encodes every parsed line with `encode`. A refused text is kept as a
    /// failed request so it is reported against its index.
    pub fn from_parsed<F, E>(parsed: ParsedBatch, mut encode: F) -> Self
    where
        F: FnMut(&str) -> std::result::Result<Vec<u8>, E>,
        E: Display,
    {
        let requests = parsed
            .lines
            .into_iter()
            .map(|BatchLine { line, index, text }| UpdateRequest {
                line,
                index,
                text: encode(&text).map_err(|err| format!("cannot encode text: {err}")),
            })
            .collect();

        BatchInput {
            requests,
            skipped: parsed.skipped,
        }
    }
}

/// Inclusive index filter; an unset bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl IndexRange {
    pub fn contains(&self, index: usize) -> bool {
        self.start.map_or(true, |start| index >= start) && self.end.map_or(true, |end| index <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PatchStatus {
    Patched(PatchPlan),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchOutcome {
    pub line: usize,
    pub index: usize,
    #[serde(flatten)]
    pub status: PatchStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub ok: usize,
    pub skipped: usize,
    pub outcomes: Vec<PatchOutcome>,
    pub skipped_lines: Vec<SkippedLine>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.processed - self.ok
    }
}

/// Applies every request in input order.
///
/// Requests outside `range` are ignored entirely. A failing index is logged
/// and recorded, and the loop moves on; earlier writes stay in place.
pub fn apply_all<S: Read + Write + Seek>(
    archive: &mut Archive<S>,
    input: &BatchInput,
    range: IndexRange,
    options: PatchOptions,
) -> BatchReport {
    let mut report = BatchReport {
        skipped: input.skipped.len(),
        skipped_lines: input.skipped.clone(),
        ..BatchReport::default()
    };

    for req in &input.requests {
        if !range.contains(req.index) {
            continue;
        }
        report.processed += 1;

        let result = match &req.text {
            Ok(text) => archive
                .patch(req.index, text, options)
                .map_err(|err| err.to_string()),
            Err(reason) => Err(reason.clone()),
        };

        let status = match result {
            Ok(plan) => {
                if plan.dry_run {
                    info!(
                        "would write {} bytes at {} for index {} (capacity={}, content_cap={}, trailing_nul={})",
                        plan.capacity,
                        plan.payload_start,
                        req.index,
                        plan.capacity,
                        plan.content_capacity,
                        plan.trailing_terminator
                    );
                } else {
                    info!(
                        "updated index {}: {} bytes at {} (message bytes={}, padded={}, trailing_nul={})",
                        req.index,
                        plan.capacity,
                        plan.payload_start,
                        plan.text_len,
                        plan.padding,
                        plan.trailing_terminator
                    );
                }
                report.ok += 1;
                PatchStatus::Patched(plan)
            }
            Err(reason) => {
                warn!("index {}: {reason}", req.index);
                PatchStatus::Failed { reason }
            }
        };

        report.outcomes.push(PatchOutcome {
            line: req.line,
            index: req.index,
            status,
        });
    }

    report
}
