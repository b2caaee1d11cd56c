//! Reader for SPEC experiment logs.
//!
//! Header records are kept as text and decoded on demand, so one malformed
//! scan does not prevent the rest of the log from being listed.

use crate::domain::{RsmError, RsmResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_LOG_VERSION: AtomicU64 = AtomicU64::new(1);

/// A parsed SPEC log. Every parse gets a fresh version number, which scan
/// pipelines use to notice that their cached stages are out of date.
#[derive(Debug, Clone)]
pub struct SpecLog {
    path: Option<PathBuf>,
    version: u64,
    scans: Vec<SpecScan>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecScan {
    number: u32,
    command: String,
    version: u64,
    positioner_names: Vec<Vec<String>>,
    positioner_lines: Vec<(usize, String)>,
    geometry_lines: Vec<(String, String)>,
    labels: Vec<String>,
    data_rows: Vec<String>,
    raw: String,
}

impl SpecLog {
    pub fn open(path: impl AsRef<Path>) -> RsmResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|error| {
            RsmError::io_system(
                "IO.SPEC_READ",
                format!("failed to read SPEC log '{}': {}", path.display(), error),
            )
        })?;
        let mut log = Self::parse(&source)?;
        log.path = Some(path.to_path_buf());
        Ok(log)
    }

    pub fn parse(source: &str) -> RsmResult<Self> {
        let version = NEXT_LOG_VERSION.fetch_add(1, Ordering::Relaxed);
        let mut header_names: Vec<Vec<String>> = Vec::new();
        let mut scans: Vec<SpecScan> = Vec::new();
        let mut current: Option<SpecScan> = None;

        for line in source.lines() {
            if let Some(rest) = line.strip_prefix("#S") {
                finish_scan(&mut scans, current.take());
                current = Some(start_scan(rest, version, &header_names)?);
                continue;
            }
            if line.starts_with("#F") || line.starts_with("#E") {
                finish_scan(&mut scans, current.take());
                continue;
            }

            match current.as_mut() {
                Some(scan) => scan.push_line(line),
                None => {
                    if let Some((index, rest)) = numbered_record(line, "#O") {
                        if index == 0 {
                            header_names.clear();
                        }
                        if header_names.len() <= index {
                            header_names.resize(index + 1, Vec::new());
                        }
                        header_names[index] = split_labels(rest);
                    }
                }
            }
        }
        finish_scan(&mut scans, current.take());

        Ok(Self {
            path: None,
            version,
            scans,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn scans(&self) -> &[SpecScan] {
        &self.scans
    }

    pub fn scan_numbers(&self) -> Vec<u32> {
        self.scans.iter().map(|scan| scan.number).collect()
    }

    pub fn scan(&self, number: u32) -> Option<&SpecScan> {
        self.scans.iter().find(|scan| scan.number == number)
    }
}

impl SpecScan {
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Version of the log this scan was parsed from.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of data rows, i.e. scan points.
    pub fn data_lines(&self) -> usize {
        self.data_rows.len()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// First line of the scan that starts with `marker`.
    pub fn header_line(&self, marker: &str) -> Option<&str> {
        self.raw.lines().find(|line| line.starts_with(marker))
    }

    /// Positioner name to value, pairing `#P<n>` values with the `#O<n>`
    /// names of the file header in effect when the scan started.
    pub fn positioners(&self) -> RsmResult<BTreeMap<String, f64>> {
        let mut positioners = BTreeMap::new();
        for (index, values) in &self.positioner_lines {
            let Some(names) = self.positioner_names.get(*index) else {
                return Err(RsmError::metadata_parse(
                    "META.POSITIONERS",
                    format!(
                        "scan {} has #P{} but the file header defines no #O{}",
                        self.number, index, index
                    ),
                ));
            };
            let values = parse_number_list(values).ok_or_else(|| {
                RsmError::metadata_parse(
                    "META.POSITIONERS",
                    format!("scan {} #P{} holds a non-numeric value", self.number, index),
                )
            })?;
            if values.len() != names.len() {
                return Err(RsmError::metadata_parse(
                    "META.POSITIONERS",
                    format!(
                        "scan {} #P{} has {} values for {} positioner names",
                        self.number,
                        index,
                        values.len(),
                        names.len()
                    ),
                ));
            }
            positioners.extend(names.iter().cloned().zip(values));
        }
        Ok(positioners)
    }

    /// Raw text of the `#G<n>` records keyed by `G<n>`.
    pub fn geometry_records(&self) -> BTreeMap<String, String> {
        self.geometry_lines.iter().cloned().collect()
    }

    pub fn geometry_values(&self, key: &str) -> RsmResult<Option<Vec<f64>>> {
        let Some((_, text)) = self.geometry_lines.iter().find(|(name, _)| name == key) else {
            return Ok(None);
        };
        parse_number_list(text).map(Some).ok_or_else(|| {
            RsmError::metadata_parse(
                "META.GEOMETRY_RECORD",
                format!("scan {} #{} holds a non-numeric value", self.number, key),
            )
        })
    }

    pub fn has_column(&self, label: &str) -> bool {
        self.labels.iter().any(|candidate| candidate == label)
    }

    /// Values of one data column, or `None` when no such label exists.
    pub fn column(&self, label: &str) -> RsmResult<Option<Vec<f64>>> {
        let Some(index) = self.labels.iter().position(|candidate| candidate == label) else {
            return Ok(None);
        };
        let rows = self.data_table()?;
        Ok(Some(rows.iter().map(|row| row[index]).collect()))
    }

    /// Every data row, each with exactly one value per label.
    pub fn data_table(&self) -> RsmResult<Vec<Vec<f64>>> {
        self.data_rows
            .iter()
            .enumerate()
            .map(|(point, row)| {
                let values = parse_number_list(row).ok_or_else(|| {
                    RsmError::metadata_parse(
                        "META.DATA_ROW",
                        format!("scan {} point {} holds a non-numeric value", self.number, point),
                    )
                })?;
                if values.len() != self.labels.len() {
                    return Err(RsmError::metadata_parse(
                        "META.DATA_ROW",
                        format!(
                            "scan {} point {} has {} values for {} column labels",
                            self.number,
                            point,
                            values.len(),
                            self.labels.len()
                        ),
                    ));
                }
                Ok(values)
            })
            .collect()
    }

    fn push_line(&mut self, line: &str) {
        self.raw.push('\n');
        self.raw.push_str(line);

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('@') {
            return;
        }
        if let Some((index, rest)) = numbered_record(line, "#P") {
            self.positioner_lines.push((index, rest.to_string()));
        } else if let Some((index, rest)) = numbered_record(line, "#G") {
            self.geometry_lines
                .push((format!("G{}", index), rest.trim().to_string()));
        } else if let Some(rest) = line.strip_prefix("#L") {
            self.labels = split_labels(rest);
        } else if !trimmed.starts_with('#') {
            self.data_rows.push(trimmed.to_string());
        }
    }
}

fn start_scan(rest: &str, version: u64, header_names: &[Vec<String>]) -> RsmResult<SpecScan> {
    let rest = rest.trim();
    let (number_token, command) = match rest.split_once(char::is_whitespace) {
        Some((number, command)) => (number, command.trim()),
        None => (rest, ""),
    };
    let number = number_token.parse::<u32>().map_err(|_| {
        RsmError::metadata_parse(
            "META.SCAN_HEADER",
            format!("scan header '#S {}' does not start with a scan number", rest),
        )
    })?;

    Ok(SpecScan {
        number,
        command: command.to_string(),
        version,
        positioner_names: header_names.to_vec(),
        positioner_lines: Vec::new(),
        geometry_lines: Vec::new(),
        labels: Vec::new(),
        data_rows: Vec::new(),
        raw: format!("#S {}", rest),
    })
}

fn finish_scan(scans: &mut Vec<SpecScan>, scan: Option<SpecScan>) {
    let Some(mut scan) = scan else {
        return;
    };
    if scans.iter().any(|existing| existing.number == scan.number) {
        debug!(scan = scan.number, "ignoring repeated scan number");
        return;
    }
    let trimmed_len = scan.raw.trim_end().len();
    scan.raw.truncate(trimmed_len);
    scans.push(scan);
}

/// Splits `#X<n> rest` into `(n, rest)`.
fn numbered_record<'a>(line: &'a str, prefix: &str) -> Option<(usize, &'a str)> {
    let tail = line.strip_prefix(prefix)?;
    let digits = tail
        .find(|character: char| !character.is_ascii_digit())
        .unwrap_or(tail.len());
    if digits == 0 {
        return None;
    }
    let index = tail[..digits].parse::<usize>().ok()?;
    Some((index, &tail[digits..]))
}

/// Labels are separated by two or more spaces; single spaces belong to a name.
fn split_labels(text: &str) -> Vec<String> {
    text.trim()
        .split("  ")
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number_list(text: &str) -> Option<Vec<f64>> {
    text.split_whitespace()
        .map(|token| token.parse::<f64>().ok())
        .collect()
}
