//! z/OS `LIST` output parsers.
//!
//! Three listing shapes come back over the data channel:
//! 1. **Datasets** (MVS catalog):
//!    `Volume Referred Ext Used Recfm Lrecl BlkSz Dsorg Dsname`
//! 2. **PDS members** (optionally with ISPF statistics):
//!    `Name     VV.MM   Created       Changed      Size  Init   Mod   Id`
//! 3. **JES jobs** (`SITE FILETYPE=JES`):
//!    `JOBNAME  JOBID    OWNER    STATUS CLASS`
//!
//! Every parser is line-local. Header lines, noise and malformed lines come
//! back as `None` and are skipped by the listing helpers.

use crate::mvsftp::types::*;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

const DEFAULT_LRECL: u32 = 80;
const DEFAULT_BLKSIZE: u32 = 0;

lazy_static! {
    static ref RETURN_CODE: Regex = Regex::new(r"\bRC=(\d+)").expect("valid RC regex");
    static ref JES_JOB_ID: Regex =
        Regex::new(r"(?i)known to JES as\s+([A-Z0-9]+)").expect("valid JES id regex");
}

// ─── Datasets ────────────────────────────────────────────────────────

/// Parse a full dataset listing.
pub fn parse_dataset_listing(raw: &str) -> Vec<DataSetInfo> {
    raw.lines().filter_map(parse_dataset_line).collect()
}

/// Parse one catalog line:
/// ```text
/// Volume Referred Ext Used Recfm Lrecl BlkSz Dsorg Dsname
/// WRK001 2024/01/15  1   15  FB      80 27920  PO  USER1.JCL.CNTL
/// ```
/// Fewer than nine fields (migrated datasets, blank lines) yields `None`.
/// Unreadable Recfm/Lrecl/BlkSz columns fall back to `FB`/`80`/`0`.
pub fn parse_dataset_line(line: &str) -> Option<DataSetInfo> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 9 || fields[0].eq_ignore_ascii_case("Volume") {
        return None;
    }

    let name = fields[8].trim_matches('\'').to_string();
    if name.is_empty() {
        return None;
    }

    Some(DataSetInfo {
        name,
        dataset_type: DatasetType::from_dsorg(fields[7]),
        volume: fields[0].to_string(),
        record_format: RecordFormat::parse(fields[4]).unwrap_or_default(),
        record_length: fields[5].parse().unwrap_or(DEFAULT_LRECL),
        block_size: fields[6].parse().unwrap_or(DEFAULT_BLKSIZE),
        last_referenced: parse_listing_date(fields[1]),
        is_member: false,
        parent_pds: None,
        raw: Some(line.to_string()),
    })
}

// ─── Members ─────────────────────────────────────────────────────────

/// Parse a full member listing of `parent_pds`.
pub fn parse_member_listing(raw: &str, parent_pds: &str) -> Vec<DataSetInfo> {
    raw.lines()
        .filter_map(|l| parse_member_line(l, parent_pds))
        .collect()
}

/// Parse one member line. The first token is the member name; a first
/// token starting with `-` or equal to `NAME` marks a header.
///
/// With ISPF statistics the fourth column is the last-changed date, which
/// becomes `last_referenced`.
pub fn parse_member_line(line: &str, parent_pds: &str) -> Option<DataSetInfo> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let first = *fields.first()?;
    if first.starts_with('-') || first.eq_ignore_ascii_case("NAME") {
        return None;
    }

    Some(DataSetInfo {
        name: first.to_string(),
        dataset_type: DatasetType::Unknown,
        volume: String::new(),
        record_format: RecordFormat::default(),
        record_length: DEFAULT_LRECL,
        block_size: DEFAULT_BLKSIZE,
        last_referenced: fields.get(3).and_then(|d| parse_listing_date(d)),
        is_member: true,
        parent_pds: Some(parent_pds.trim_matches('\'').to_string()),
        raw: Some(line.to_string()),
    })
}

/// `YYYY/MM/DD` as printed by the z/OS FTP server; `**NONE**` and anything
/// else unparseable is `None`.
fn parse_listing_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y/%m/%d").ok()
}

// ─── JES ─────────────────────────────────────────────────────────────

/// Numeric value of an `RC=<n>` token, if present.
pub fn parse_return_code(line: &str) -> Option<u32> {
    RETURN_CODE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Derive a job's status from a JES listing.
///
/// Looks at lines containing `job_id`: `OUTPUT` → Completed, `ACTIVE` →
/// Active, `INPUT` → Queued. The return code comes from the same line. No
/// matching line → `Unknown`.
pub fn parse_job_status(listing: &str, job_id: &str) -> JobStatusReport {
    if job_id.is_empty() {
        return JobStatusReport::unknown();
    }
    for line in listing.lines().filter(|l| l.contains(job_id)) {
        let upper = line.to_ascii_uppercase();
        let status = if upper.contains("OUTPUT") {
            JobStatus::Completed
        } else if upper.contains("ACTIVE") {
            JobStatus::Active
        } else if upper.contains("INPUT") {
            JobStatus::Queued
        } else {
            continue;
        };
        return JobStatusReport {
            status,
            return_code: parse_return_code(line),
        };
    }
    JobStatusReport::unknown()
}

/// Job id from a JES submit reply such as
/// `250-It is known to JES as JOB01234`.
pub fn parse_jes_job_id(reply: &str) -> Option<String> {
    JES_JOB_ID
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}
