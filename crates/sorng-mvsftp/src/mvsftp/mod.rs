//! # z/OS FTP protocol engine
//!
//! Speaks the subset of RFC 959 that the z/OS Communications Server FTP
//! daemon needs for dataset work, plus its `SITE` side channel.
//!
//! Architecture:
//! - `types`: config, dataset records, transfer options/results, job types
//! - `error`: FTP error type and reply-code classification
//! - `ebcdic`: CP037 ↔ ISO-8859-1 byte transcoding
//! - `protocol`: command writer and multi-line reply framer
//! - `connection`: TCP control connection + greeting
//! - `session`: `ControlSession`: login, SITE, command dispatch
//! - `transfer`: PASV negotiation and data socket setup
//! - `parser`: dataset/member/JES listing parsers
//! - `file_ops`: RETR/STOR streaming, allocation-only create
//! - `catalog`: LIST of datasets/members, DELE, RNFR/RNTO
//! - `jobs`: JES submit / poll / output retrieval
//! - `pool`: session registry with idle reaping and keepalive
//! - `service`: high-level orchestrator over the pool

pub mod types;
pub mod error;
pub mod ebcdic;
pub mod protocol;
pub mod connection;
pub mod session;
pub mod transfer;
pub mod parser;
pub mod file_ops;
pub mod catalog;
pub mod jobs;
pub mod pool;
pub mod service;

pub use types::*;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use session::{ControlSession, SessionState};
pub use service::{MvsFtpService, MvsFtpServiceState};
