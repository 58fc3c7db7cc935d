use std::collections::{BTreeSet, HashSet};
use std::io::Write;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::Reporter;
use crate::classify::Thresholds;
use crate::lookup::LastEditSource;
use crate::parse::{UsernameWithSite, parse_line};
use crate::report::{ContributionRecord, TsvWriter};

/// Self-imposed pause between input lines, independent of the lookup
/// client's retry backoff.
pub const DEFAULT_LINE_DELAY: Duration = Duration::from_millis(1_500);

/// Kind of delivery list held in the input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    MediaWiki,
}

impl InputType {
    pub fn parse(value: &str) -> Result<Self> {
        if value.eq_ignore_ascii_case("mediawiki") {
            return Ok(Self::MediaWiki);
        }
        bail!("unsupported input type: {value} (expected mediawiki)")
    }
}

/// One already-read input, named for reporting.
#[derive(Debug, Clone)]
pub struct InputSource {
    pub name: String,
    pub content: String,
}

impl InputSource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Counts reported after a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub lines: usize,
    pub usernames: usize,
    /// Distinct sites that were looked up, sorted.
    pub sites: Vec<String>,
    pub records: usize,
}

/// Drives one audit run: parse each line, expand usernames across their
/// declared site plus any additional sites, deduplicate pairs for the whole
/// run, look up and classify each new pair, and write the report rows.
pub struct Processor<'a, S: LastEditSource> {
    source: &'a S,
    thresholds: Thresholds,
    line_delay: Duration,
    reporter: &'a dyn Reporter,
    processed: HashSet<UsernameWithSite>,
}

impl<'a, S: LastEditSource> Processor<'a, S> {
    pub fn new(
        source: &'a S,
        thresholds: Thresholds,
        line_delay: Duration,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            source,
            thresholds,
            line_delay,
            reporter,
            processed: HashSet::new(),
        }
    }

    /// Process every line of every source in order. Line numbers are
    /// cumulative across sources and 1-indexed. Lines that produce no rows
    /// get one placeholder row so the report stays line-complete.
    pub fn run<W: Write>(
        &mut self,
        input_type: InputType,
        sources: &[InputSource],
        writer: &mut TsvWriter<W>,
        additional_sites: &[String],
    ) -> Result<RunSummary> {
        let total_lines: usize = sources
            .iter()
            .map(|source| source.content.lines().count())
            .sum();

        let mut line_no = 0;
        let mut records = 0;
        for source in sources {
            self.reporter.info(&format!(
                "processing {} ({} lines)",
                source.name,
                source.content.lines().count()
            ));
            for line in source.content.lines() {
                line_no += 1;
                let written = match input_type {
                    InputType::MediaWiki => {
                        self.process_line(line, line_no, total_lines, writer, additional_sites)?
                    }
                };
                if written == 0 {
                    writer.write_record(&ContributionRecord::line_only(line_no, line))?;
                }
                records += written;
                if !self.line_delay.is_zero() {
                    sleep(self.line_delay);
                }
            }
        }

        Ok(self.summary(line_no, records))
    }

    fn process_line<W: Write>(
        &mut self,
        line: &str,
        line_no: usize,
        total_lines: usize,
        writer: &mut TsvWriter<W>,
        additional_sites: &[String],
    ) -> Result<usize> {
        let mut written = 0;
        for target in parse_line(line) {
            // A username with no declared site and no additional sites has
            // nothing to look up; the sorted set keeps site order stable.
            let mut sites = BTreeSet::new();
            if let Some(site) = &target.site {
                sites.insert(site.clone());
            }
            sites.extend(additional_sites.iter().cloned());

            for site in sites {
                let key = UsernameWithSite::new(target.username.clone(), Some(site.clone()));
                if !self.processed.insert(key) {
                    continue;
                }
                let last_edit = self.source.last_edit(&target.username, &site, self.reporter);
                let status = self.thresholds.classify(&last_edit);
                self.reporter.info(&format!(
                    "last edit for {}@{site} found as {last_edit:?} ({status}) on line {line_no} out of {total_lines} ({:.2}%)",
                    target.username,
                    line_no as f64 / total_lines.max(1) as f64 * 100.0
                ));
                let record = ContributionRecord::new(
                    line_no,
                    line,
                    &target.username,
                    &site,
                    &last_edit,
                    status.as_str(),
                );
                writer.write_record(&record)?;
                written += 1;
            }
        }
        Ok(written)
    }

    fn summary(&self, lines: usize, records: usize) -> RunSummary {
        let usernames: HashSet<&str> = self
            .processed
            .iter()
            .map(|key| key.username.as_str())
            .collect();
        let sites: BTreeSet<String> = self
            .processed
            .iter()
            .filter_map(|key| key.site.clone())
            .collect();
        RunSummary {
            lines,
            usernames: usernames.len(),
            sites: sites.into_iter().collect(),
            records,
        }
    }
}
