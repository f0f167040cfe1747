//! Shared types for the MVS FTP crate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ─── Connection / Session ────────────────────────────────────────────

/// Configuration for one z/OS FTP control connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MvsConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// SITE parameter strings run right after login, e.g. `"LRECL=80"`.
    #[serde(default)]
    pub site_commands: Vec<String>,
    /// Bounds TCP connect, greeting, login and the `QUIT` reply (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    /// Reply timeout for every other control command (seconds).
    #[serde(default = "default_command_timeout")]
    pub command_timeout_sec: u64,
    /// Data-channel connect timeout in seconds.
    #[serde(default = "default_data_timeout")]
    pub data_timeout_sec: u64,
    /// Chunk size for streamed reads/writes (bytes).
    #[serde(default = "default_chunk")]
    pub chunk_size: usize,
    /// Friendly label shown in the UI.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_port() -> u16 {
    21
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_command_timeout() -> u64 {
    60
}
fn default_data_timeout() -> u64 {
    30
}
fn default_chunk() -> usize {
    65_536
}
fn default_true() -> bool {
    true
}

impl Default for MvsConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            site_commands: Vec::new(),
            connect_timeout_sec: default_connect_timeout(),
            command_timeout_sec: default_command_timeout(),
            data_timeout_sec: default_data_timeout(),
            chunk_size: default_chunk(),
            label: None,
        }
    }
}

/// Information about a live control session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MvsSessionInfo {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub label: Option<String>,
    pub server_banner: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub bytes_uploaded: u64,
    pub bytes_downloaded: u64,
}

// ─── Control-channel reply ───────────────────────────────────────────

/// A complete (possibly multi-line) reply from the control channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpResponse {
    /// Full reply text (all lines joined).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether this is a positive-completion reply (2xx).
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// `150` or `125`: the data connection is about to carry the payload.
    pub fn opens_data_transfer(&self) -> bool {
        self.code == 150 || self.code == 125
    }
}

// ─── Datasets ────────────────────────────────────────────────────────

/// Dataset organisation (`Dsorg` column).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DatasetType {
    Sequential,
    Partitioned,
    Vsam,
    Unknown,
}

impl DatasetType {
    pub fn from_dsorg(dsorg: &str) -> Self {
        match dsorg.to_ascii_uppercase().as_str() {
            "PO" => Self::Partitioned,
            "PS" => Self::Sequential,
            "VS" => Self::Vsam,
            _ => Self::Unknown,
        }
    }
}

/// Record format (`Recfm` column / `RECFM=` allocation attribute).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RecordFormat {
    Fixed,
    Variable,
    FixedBlocked,
    VariableBlocked,
    Undefined,
}

impl RecordFormat {
    /// Parse a listing/allocation record format. Carriage-control suffixes
    /// (`A`, `M`) and the spanned flag (`S`) are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let base = upper.trim_end_matches(|c| c == 'A' || c == 'M' || c == 'S');
        match base {
            "F" => Some(Self::Fixed),
            "V" => Some(Self::Variable),
            "FB" => Some(Self::FixedBlocked),
            "VB" => Some(Self::VariableBlocked),
            "U" => Some(Self::Undefined),
            _ => None,
        }
    }

    /// The keyword used in `SITE RECFM=`.
    pub fn as_site_value(&self) -> &'static str {
        match self {
            Self::Fixed => "F",
            Self::Variable => "V",
            Self::FixedBlocked => "FB",
            Self::VariableBlocked => "VB",
            Self::Undefined => "U",
        }
    }
}

impl Default for RecordFormat {
    fn default() -> Self {
        Self::FixedBlocked
    }
}

/// One dataset or PDS member parsed from a `LIST` line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSetInfo {
    pub name: String,
    pub dataset_type: DatasetType,
    pub volume: String,
    pub record_format: RecordFormat,
    pub record_length: u32,
    pub block_size: u32,
    pub last_referenced: Option<NaiveDate>,
    pub is_member: bool,
    /// Owning PDS when `is_member` is set.
    pub parent_pds: Option<String>,
    /// Raw line from the server (for debugging).
    pub raw: Option<String>,
}

impl DataSetInfo {
    /// Fully-qualified name usable in RETR/STOR (`PDS(MEMBER)` for members).
    pub fn qualified_name(&self) -> String {
        match (&self.parent_pds, self.is_member) {
            (Some(pds), true) => crate::mvsftp::file_ops::member_dataset_name(pds, &self.name),
            _ => self.name.clone(),
        }
    }
}

// ─── Allocation ──────────────────────────────────────────────────────

/// Space unit for primary/secondary allocation amounts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SpaceUnit {
    Tracks,
    Cylinders,
    Blocks,
}

impl Default for SpaceUnit {
    fn default() -> Self {
        Self::Tracks
    }
}

impl SpaceUnit {
    pub fn as_site_keyword(&self) -> &'static str {
        match self {
            Self::Tracks => "TRACKS",
            Self::Cylinders => "CYLINDERS",
            Self::Blocks => "BLOCKS",
        }
    }
}

/// Dataset attributes applied through `SITE` before a STOR creates the dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllocationParams {
    #[serde(default)]
    pub record_format: RecordFormat,
    pub record_length: u32,
    pub block_size: u32,
    pub primary: u32,
    #[serde(default)]
    pub secondary: u32,
    #[serde(default)]
    pub space_unit: SpaceUnit,
    /// Directory blocks; only meaningful for partitioned datasets.
    #[serde(default)]
    pub directory_blocks: Option<u32>,
}

impl Default for AllocationParams {
    /// A small FB 80 sequential dataset.
    fn default() -> Self {
        Self {
            record_format: RecordFormat::FixedBlocked,
            record_length: 80,
            block_size: 27920,
            primary: 10,
            secondary: 5,
            space_unit: SpaceUnit::Tracks,
            directory_blocks: None,
        }
    }
}

impl AllocationParams {
    /// Parameters for a single `SITE` command, e.g.
    /// `RECFM=FB LRECL=80 BLKSIZE=27920 TRACKS PRIMARY=10 SECONDARY=5 DIRECTORY=20`.
    pub fn site_parameters(&self) -> String {
        let mut params = format!(
            "RECFM={} LRECL={} BLKSIZE={} {} PRIMARY={} SECONDARY={}",
            self.record_format.as_site_value(),
            self.record_length,
            self.block_size,
            self.space_unit.as_site_keyword(),
            self.primary,
            self.secondary,
        );
        if let Some(dir) = self.directory_blocks.filter(|d| *d > 0) {
            params.push_str(&format!(" DIRECTORY={}", dir));
        }
        params
    }
}

// ─── Transfer ────────────────────────────────────────────────────────

/// Transfer type (RFC 959 TYPE command).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferMode {
    Binary,
    Ascii,
}

impl Default for TransferMode {
    fn default() -> Self {
        Self::Binary
    }
}

impl TransferMode {
    pub fn type_command(&self) -> &'static str {
        match self {
            Self::Binary => "TYPE I",
            Self::Ascii => "TYPE A",
        }
    }
}

/// Per-transfer options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOptions {
    #[serde(default)]
    pub mode: TransferMode,
    /// Transcode CP037 ↔ ASCII per chunk. Ignored in binary mode.
    #[serde(default)]
    pub convert_ebcdic: bool,
    #[serde(default)]
    pub allocation: Option<AllocationParams>,
}

impl TransferOptions {
    pub fn binary() -> Self {
        Self::default()
    }

    pub fn ascii(convert_ebcdic: bool) -> Self {
        Self {
            mode: TransferMode::Ascii,
            convert_ebcdic,
            allocation: None,
        }
    }

    pub fn with_allocation(mut self, params: AllocationParams) -> Self {
        self.allocation = Some(params);
        self
    }

    /// Whether chunks go through the EBCDIC codec.
    pub fn transcodes(&self) -> bool {
        self.convert_ebcdic && self.mode != TransferMode::Binary
    }
}

/// Outcome of one transfer call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub success: bool,
    pub source: String,
    pub destination: String,
    pub bytes_transferred: u64,
    pub error: Option<String>,
    /// Closing control reply (226/250 text) of a successful transfer.
    pub reply: Option<String>,
}

impl TransferResult {
    pub(crate) fn succeeded(source: &str, destination: &str, bytes: u64, reply: String) -> Self {
        Self {
            success: true,
            source: source.to_string(),
            destination: destination.to_string(),
            bytes_transferred: bytes,
            error: None,
            reply: Some(reply),
        }
    }

    pub(crate) fn failed(source: &str, destination: &str, bytes: u64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            source: source.to_string(),
            destination: destination.to_string(),
            bytes_transferred: bytes,
            error: Some(error.into()),
            reply: None,
        }
    }
}

/// Direction of a file transfer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransferDirection {
    Upload,
    Download,
}

/// Snapshot handed to the progress callback after every chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub direction: TransferDirection,
    pub dataset: String,
    pub local_path: String,
    pub bytes_transferred: u64,
    /// Known for uploads (local file size); downloads report `None`.
    pub total_bytes: Option<u64>,
    pub percent: Option<f32>,
    pub speed_bps: u64,
}

/// Cooperative cancellation flag, checked once per transfer chunk.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─── JES ─────────────────────────────────────────────────────────────

/// Status of a batch job as seen in the JES listing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Unknown,
    Queued,
    Active,
    Completed,
}

/// Result of a single poll; recomputed on every call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    pub status: JobStatus,
    pub return_code: Option<u32>,
}

impl JobStatusReport {
    pub fn unknown() -> Self {
        Self {
            status: JobStatus::Unknown,
            return_code: None,
        }
    }
}

/// Handle for a submitted JCL deck.
///
/// `submitted_name` is the remote name the JCL was stored under. The host
/// may report the real job id in the closing STOR reply; that value lands in
/// `resolved_job_id`. The two are not interchangeable: a job name search
/// with the submitted name only works when it happens to match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    pub submitted_name: String,
    pub resolved_job_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    /// Identifier for `poll`/`fetch_output`: the host-reported job id when
    /// one was seen, otherwise the submitted name.
    pub fn lookup_key(&self) -> &str {
        self.resolved_job_id
            .as_deref()
            .unwrap_or(&self.submitted_name)
    }
}

// ─── Listing options / pool stats ────────────────────────────────────

/// Sorting field for dataset listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum DatasetSortField {
    Name,
    Volume,
    LastReferenced,
}

/// Sort order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Options for listing datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    /// Glob applied to dataset names after parsing (e.g. `"USER.*.JCL"`).
    pub filter: Option<String>,
    pub sort_by: Option<DatasetSortField>,
    pub sort_order: Option<SortOrder>,
    /// Keep records whose DSORG is not PS/PO/VS.
    #[serde(default = "default_true")]
    pub include_unknown: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            filter: None,
            sort_by: None,
            sort_order: None,
            include_unknown: true,
        }
    }
}

/// Statistics about the session pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub total_sessions: u32,
    pub active_sessions: u32,
    pub idle_sessions: u32,
    pub max_sessions: u32,
}
