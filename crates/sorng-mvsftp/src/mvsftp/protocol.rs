//! Low-level FTP command/response codec (RFC 959 §4).
//!
//! Handles:
//! - Sending FTP commands terminated with `\r\n`
//! - Framing single-line and multi-line replies
//! - Parsing the 3-digit reply code
//!
//! A reply ends at the first line whose first three characters are digits
//! and whose fourth character is a space. Everything before it (`NNN-`
//! continuation lines, or free text some z/OS messages emit) belongs to the
//! same reply.

use crate::mvsftp::error::{FtpError, FtpResult};
use crate::mvsftp::types::FtpResponse;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The FTP command/response codec operating on split halves.
pub struct FtpCodec {
    reader: BufReader<BoxedReader>,
    writer: BoxedWriter,
}

impl FtpCodec {
    /// Create a codec from a plain TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        let (rd, wr) = stream.into_split();
        Self::from_parts(rd, wr)
    }

    /// Create a codec from any read/write pair.
    pub fn from_parts<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: BufReader::new(Box::new(reader)),
            writer: Box::new(writer),
        }
    }

    /// Send a raw FTP command (CRLF is appended).
    pub async fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        write_command(&mut self.writer, cmd).await
    }

    /// Read a complete FTP reply (possibly multi-line).
    pub async fn read_response(&mut self) -> FtpResult<FtpResponse> {
        read_reply(&mut self.reader).await
    }

    /// Send a command and return the reply.
    pub async fn execute(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.send_command(cmd).await?;
        self.read_response().await
    }

    /// Convenience: send a command, expect a specific reply-code class.
    pub async fn expect(&mut self, cmd: &str, expected_first_digit: u16) -> FtpResult<FtpResponse> {
        let resp = self.execute(cmd).await?;
        if resp.code / 100 != expected_first_digit {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(resp)
    }

    /// Expect a 2xx reply.
    pub async fn expect_ok(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.expect(cmd, 2).await
    }

    /// Flush and close the write half.
    pub async fn shutdown(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

/// Write one command line.
pub async fn write_command<W>(writer: &mut W, cmd: &str) -> FtpResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let line = format!("{}\r\n", cmd);
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    log::trace!(">>> {}", redact(cmd));
    Ok(())
}

/// Read lines until the terminating reply line.
///
/// Multi-line replies look like:
/// ```text
/// 250-It is known to JES as JOB01234
/// 250 Transfer completed successfully.
/// ```
/// End of stream before the terminator is a `Disconnected` error. Reply
/// text is decoded lossily; z/OS may echo national characters from dataset
/// names in the host code page.
pub async fn read_reply<R>(reader: &mut R) -> FtpResult<FtpResponse>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut lines = Vec::new();
    loop {
        let mut raw = Vec::new();
        let n = reader.read_until(b'\n', &mut raw).await?;
        if n == 0 {
            return Err(FtpError::disconnected(if lines.is_empty() {
                "Server closed connection".to_string()
            } else {
                format!("Server closed connection mid-reply: {}", lines.join(" | "))
            }));
        }
        let buf = String::from_utf8_lossy(&raw);
        let line = buf.trim_end_matches(|c| c == '\r' || c == '\n').to_string();
        let code = terminal_code(&line);
        lines.push(line);
        if let Some(code) = code {
            let resp = FtpResponse { code, lines };
            log::trace!("<<< {}", resp.lines.last().map(String::as_str).unwrap_or(""));
            return Ok(resp);
        }
    }
}

/// The reply code if `line` terminates a reply (`^\d{3} `).
pub fn terminal_code(line: &str) -> Option<u16> {
    let bytes = line.as_bytes();
    if bytes.len() < 4 || bytes[3] != b' ' || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    line[..3].parse().ok()
}

fn redact(cmd: &str) -> &str {
    if cmd.get(..5).is_some_and(|verb| verb.eq_ignore_ascii_case("PASS ")) {
        "PASS ****"
    } else {
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvsftp::error::FtpErrorKind;

    #[tokio::test]
    async fn multi_line_reply_stops_at_terminator() {
        let mut input: &[u8] = b"150-abc\r\n150 def\r\n226 next reply\r\n";
        let resp = read_reply(&mut input).await.unwrap();
        assert_eq!(resp.code, 150);
        assert_eq!(resp.lines, vec!["150-abc", "150 def"]);
        // Second reply is still buffered for the next read.
        let next = read_reply(&mut input).await.unwrap();
        assert_eq!(next.code, 226);
    }

    #[tokio::test]
    async fn single_line_reply_with_bare_lf() {
        let mut input: &[u8] = b"220 FTPD1 IBM FTP CS V2R5 at ZOS, 10:00:00\n";
        let resp = read_reply(&mut input).await.unwrap();
        assert_eq!(resp.code, 220);
        assert_eq!(resp.lines.len(), 1);
    }

    #[tokio::test]
    async fn free_text_continuation_lines_are_kept() {
        let mut input: &[u8] = b"230-Welcome\r\n  USER1 is logged on.\r\n230 Working directory is \"USER1.\".\r\n";
        let resp = read_reply(&mut input).await.unwrap();
        assert_eq!(resp.code, 230);
        assert_eq!(resp.lines.len(), 3);
        assert!(resp.text().contains("logged on"));
    }

    #[tokio::test]
    async fn eof_before_terminator_is_disconnect() {
        let mut input: &[u8] = b"150-abc\r\n";
        let err = read_reply(&mut input).await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::Disconnected);
    }

    #[tokio::test]
    async fn non_utf8_reply_text_is_kept() {
        let mut input: &[u8] = b"550 Data set USER.\xC9T\xC9 not found\r\n200 OK\r\n";
        let resp = read_reply(&mut input).await.unwrap();
        assert_eq!(resp.code, 550);
        assert!(resp.text().starts_with("550 Data set USER."));
        assert!(resp.text().ends_with("not found"));
        let next = read_reply(&mut input).await.unwrap();
        assert_eq!(next.code, 200);
    }

    #[tokio::test]
    async fn codec_survives_non_utf8_reply() {
        let mock = tokio_test::io::Builder::new()
            .write(b"NOOP\r\n")
            .read(b"550 Data set USER.\xC9T\xC9 not found\r\n")
            .write(b"NOOP\r\n")
            .read(b"200 OK\r\n")
            .build();
        let (rd, wr) = tokio::io::split(mock);
        let mut codec = FtpCodec::from_parts(rd, wr);
        let err = codec.expect_ok("NOOP").await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::NotFound);
        assert_eq!(err.code, Some(550));
        assert_eq!(codec.expect_ok("NOOP").await.unwrap().code, 200);
    }

    #[tokio::test]
    async fn write_command_appends_crlf() {
        let mut out: Vec<u8> = Vec::new();
        write_command(&mut out, "SITE FILETYPE=JES").await.unwrap();
        assert_eq!(out, b"SITE FILETYPE=JES\r\n");
    }

    #[tokio::test]
    async fn codec_execute_round_trip() {
        let mock = tokio_test::io::Builder::new()
            .write(b"NOOP\r\n")
            .read(b"200 NOOP command successful\r\n")
            .build();
        let (rd, wr) = tokio::io::split(mock);
        let mut codec = FtpCodec::from_parts(rd, wr);
        let resp = codec.expect_ok("NOOP").await.unwrap();
        assert_eq!(resp.code, 200);
    }

    #[tokio::test]
    async fn expect_ok_rejects_other_classes() {
        let mock = tokio_test::io::Builder::new()
            .write(b"DELE 'USER.GONE'\r\n")
            .read(b"550 DELE fails: USER.GONE does not exist.\r\n")
            .build();
        let (rd, wr) = tokio::io::split(mock);
        let mut codec = FtpCodec::from_parts(rd, wr);
        let err = codec.expect_ok("DELE 'USER.GONE'").await.unwrap_err();
        assert_eq!(err.code, Some(550));
    }

    #[test]
    fn terminal_code_rules() {
        assert_eq!(terminal_code("227 Entering Passive Mode"), Some(227));
        assert_eq!(terminal_code("227-more"), None);
        assert_eq!(terminal_code("22 x"), None);
        assert_eq!(terminal_code("abc def"), None);
        assert_eq!(terminal_code("200"), None);
    }

    #[test]
    fn password_is_masked() {
        assert_eq!(redact("PASS hunter2"), "PASS ****");
        assert_eq!(redact("USER IBMUSER"), "USER IBMUSER");
    }
}
