use std::io::Write;

use anyhow::{Context, Result};

/// Fixed TSV column order; the header row uses exactly these names.
pub const COLUMNS: [&str; 7] = [
    "line_no",
    "line",
    "username",
    "site",
    "last_edit_utc",
    "last_edit_date",
    "threshold_result",
];

/// One output row of the audit report. Degenerate rows (lines that produced
/// no lookups) carry only the line number and raw line text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionRecord {
    pub line_no: usize,
    pub line: String,
    pub username: String,
    pub site: String,
    pub last_edit_utc: String,
    pub last_edit_date: String,
    pub threshold_result: String,
}

impl ContributionRecord {
    /// Full row for one processed (username, site) pair. The calendar date
    /// is the timestamp portion before the first `T`, or empty.
    pub fn new(
        line_no: usize,
        line: &str,
        username: &str,
        site: &str,
        last_edit_utc: &str,
        threshold_result: &str,
    ) -> Self {
        let last_edit_date = last_edit_utc
            .split('T')
            .next()
            .unwrap_or("")
            .to_string();
        Self {
            line_no,
            line: line.to_string(),
            username: username.to_string(),
            site: site.to_string(),
            last_edit_utc: last_edit_utc.to_string(),
            last_edit_date,
            threshold_result: threshold_result.to_string(),
        }
    }

    /// Placeholder row for a line with nothing to look up.
    pub fn line_only(line_no: usize, line: &str) -> Self {
        Self {
            line_no,
            line: line.to_string(),
            username: String::new(),
            site: String::new(),
            last_edit_utc: String::new(),
            last_edit_date: String::new(),
            threshold_result: String::new(),
        }
    }
}

/// Incremental tab-separated writer. Rows are flushed as they are written,
/// so an interrupted run leaves a well-formed prefix behind.
pub struct TsvWriter<W: Write> {
    out: W,
}

impl<W: Write> TsvWriter<W> {
    /// Wrap a sink and write the header row immediately.
    pub fn new(mut out: W) -> Result<Self> {
        writeln!(out, "{}", COLUMNS.join("\t")).context("failed to write TSV header")?;
        Ok(Self { out })
    }

    pub fn write_record(&mut self, record: &ContributionRecord) -> Result<()> {
        let fields = [
            record.line_no.to_string(),
            sanitize_field(&record.line),
            sanitize_field(&record.username),
            sanitize_field(&record.site),
            sanitize_field(&record.last_edit_utc),
            sanitize_field(&record.last_edit_date),
            sanitize_field(&record.threshold_result),
        ];
        writeln!(self.out, "{}", fields.join("\t")).context("failed to write TSV row")?;
        self.out.flush().context("failed to flush TSV output")
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

// Tabs and line breaks inside a field would break the row structure.
fn sanitize_field(value: &str) -> String {
    if value.contains(['\t', '\n', '\r']) {
        value.replace(['\t', '\n', '\r'], " ")
    } else {
        value.to_string()
    }
}
