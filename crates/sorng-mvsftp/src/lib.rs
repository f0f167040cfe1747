//! # sorng-mvsftp
//!
//! FTP engine for IBM z/OS (MVS) hosts, written directly against the wire
//! protocol. Covers the control-channel state machine, passive data
//! channels, CP037 EBCDIC transcoding, dataset and PDS member listings, and
//! JES batch job submission through `SITE FILETYPE=JES`.

pub mod mvsftp;

pub use mvsftp::*;
