//! TCP transport: establishes the control connection and reads the greeting.

use crate::mvsftp::error::{FtpError, FtpResult};
use crate::mvsftp::protocol::FtpCodec;
use crate::mvsftp::types::{FtpResponse, MvsConnectionConfig};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Establish the control connection and return a ready-to-use codec
/// **plus** the server greeting.
///
/// The greeting must be a 2xx (z/OS sends `220`); anything else (`421`
/// when the daemon is at its session limit) is a connection failure.
pub async fn connect(config: &MvsConnectionConfig) -> FtpResult<(FtpCodec, FtpResponse)> {
    if config.host.is_empty() {
        return Err(FtpError::invalid_config("Host must not be empty"));
    }

    let addr = format!("{}:{}", config.host, config.port);
    let dur = Duration::from_secs(config.connect_timeout_sec);

    let tcp = timeout(dur, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::timeout(format!("TCP connect to {} timed out", addr)))?
        .map_err(|e| FtpError::connection_failed(format!("TCP connect to {}: {}", addr, e)))?;

    tcp.set_nodelay(true).ok();

    let mut codec = FtpCodec::from_tcp(tcp);
    let banner = timeout(dur, codec.read_response())
        .await
        .map_err(|_| FtpError::timeout(format!("No greeting from {} within {:?}", addr, dur)))??;

    if !banner.is_completion() {
        return Err(FtpError::from_reply(banner.code, &banner.text()));
    }
    Ok((codec, banner))
}
