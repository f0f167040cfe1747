//! Passive data-channel negotiation.
//!
//! Only PASV is spoken: z/OS answers with
//! `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` and the client connects to
//! `h1.h2.h3.h4:(p1*256+p2)`. One call opens exactly one data socket; the
//! caller drains and drops it before the next control command.

use crate::mvsftp::error::{FtpError, FtpResult};
use crate::mvsftp::session::ControlSession;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Host/port pair announced by a `227` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassiveEndpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for PassiveEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parse the `(h1,h2,h3,h4,p1,p2)` tuple out of a `227` reply text.
///
/// Takes the text between the first `(` and the first `)` after it; exactly
/// six comma-separated decimal fields, each 0–255.
pub fn parse_pasv_reply(text: &str) -> Option<PassiveEndpoint> {
    let open = text.find('(')?;
    let close = open + text[open..].find(')')?;
    let fields: Vec<u8> = text[open + 1..close]
        .split(',')
        .map(|f| {
            let f = f.trim();
            if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            f.parse::<u8>().ok()
        })
        .collect::<Option<Vec<_>>>()?;
    if fields.len() != 6 {
        return None;
    }
    Some(PassiveEndpoint {
        host: format!("{}.{}.{}.{}", fields[0], fields[1], fields[2], fields[3]),
        port: u16::from(fields[4]) * 256 + u16::from(fields[5]),
    })
}

/// Send `PASV` and decode the endpoint. Anything other than a well-formed
/// `227` yields `None`.
pub async fn negotiate(session: &mut ControlSession) -> Option<PassiveEndpoint> {
    request_passive(session).await.ok()
}

/// Like [`negotiate`], keeping the raw reply in the error.
pub async fn request_passive(session: &mut ControlSession) -> FtpResult<PassiveEndpoint> {
    let resp = session.send_command("PASV").await?;
    if resp.code != 227 {
        return Err(FtpError::from_reply(resp.code, &resp.text()));
    }
    parse_pasv_reply(&resp.text()).ok_or_else(|| {
        FtpError::protocol_error(format!("Cannot parse PASV reply: {}", resp.text()))
            .with_code(resp.code)
    })
}

/// Negotiate PASV and connect the data socket.
pub async fn open_data_channel(session: &mut ControlSession) -> FtpResult<TcpStream> {
    let data_timeout = Duration::from_secs(
        session
            .config()
            .map(|c| c.data_timeout_sec)
            .ok_or_else(|| FtpError::disconnected("Session is not connected"))?,
    );
    let endpoint = request_passive(session).await?;
    log::debug!("PASV data channel -> {}", endpoint);
    let addr = endpoint.to_string();
    let tcp = timeout(data_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::data_channel(format!("PASV data connect to {} timed out", addr)))?
        .map_err(|e| FtpError::data_channel(format!("PASV data connect to {}: {}", addr, e)))?;
    tcp.set_nodelay(true).ok();
    Ok(tcp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_reply() {
        let ep = parse_pasv_reply("227 Entering Passive Mode (10,0,0,5,19,136).").unwrap();
        assert_eq!(ep.host, "10.0.0.5");
        assert_eq!(ep.port, 5000);
        assert_eq!(ep.to_string(), "10.0.0.5:5000");
    }

    #[test]
    fn tolerates_spaces_inside_tuple() {
        let ep = parse_pasv_reply("227 Entering Passive Mode (192, 168, 1, 20, 4, 1)").unwrap();
        assert_eq!(ep.host, "192.168.1.20");
        assert_eq!(ep.port, 1025);
    }

    #[test]
    fn rejects_missing_parentheses() {
        assert!(parse_pasv_reply("227 Entering Passive Mode 10,0,0,5,19,136").is_none());
        assert!(parse_pasv_reply("227 Entering Passive Mode (10,0,0,5,19,136").is_none());
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(parse_pasv_reply("227 (10,0,0,5,19)").is_none());
        assert!(parse_pasv_reply("227 (10,0,0,5,19,136,7)").is_none());
    }

    #[test]
    fn rejects_non_numeric_and_out_of_range_fields() {
        assert!(parse_pasv_reply("227 (10,0,0,x,19,136)").is_none());
        assert!(parse_pasv_reply("227 (10,0,0,5,300,136)").is_none());
        assert!(parse_pasv_reply("227 (10,0,0,5,-1,136)").is_none());
        assert!(parse_pasv_reply("227 (10,0,0,+5,19,136)").is_none());
        assert!(parse_pasv_reply("227 (10,0,0,,19,136)").is_none());
    }

    #[tokio::test]
    async fn negotiate_without_connection_is_none() {
        let mut session = ControlSession::new();
        assert!(negotiate(&mut session).await.is_none());
    }
}
