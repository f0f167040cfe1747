//! `ControlSession`: owns the control connection and dispatches commands.
//!
//! Lifecycle: `connect()` → greeting → USER/PASS → post-login SITE commands.
//! The session is strictly sequential: every method takes `&mut self`, and
//! data-bearing operations (`file_ops`, `catalog`, `jobs`) drain and close
//! their passive socket before the next command goes out.
//!
//! Any I/O failure on the control channel drops the session back to
//! `Disconnected`; the reply stream can no longer be trusted after that.
//! A reply that does not arrive within `command_timeout_sec` counts as one.

use crate::mvsftp::connection;
use crate::mvsftp::error::{FtpError, FtpErrorKind, FtpResult};
use crate::mvsftp::protocol::FtpCodec;
use crate::mvsftp::types::*;
use chrono::Utc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

/// Connection state of a `ControlSession`.
pub enum SessionState {
    Disconnected,
    Connected {
        codec: FtpCodec,
        config: MvsConnectionConfig,
        info: MvsSessionInfo,
    },
}

/// One logged-in (or not yet logged-in) z/OS FTP session.
pub struct ControlSession {
    id: String,
    state: SessionState,
}

impl Default for ControlSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: SessionState::Disconnected,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected { .. })
    }

    pub fn info(&self) -> Option<&MvsSessionInfo> {
        match &self.state {
            SessionState::Connected { info, .. } => Some(info),
            SessionState::Disconnected => None,
        }
    }

    pub fn config(&self) -> Option<&MvsConnectionConfig> {
        match &self.state {
            SessionState::Connected { config, .. } => Some(config),
            SessionState::Disconnected => None,
        }
    }

    // ─── Connect / disconnect ────────────────────────────────────

    /// Open the control connection and log in.
    ///
    /// Returns `false` on any failure; the socket is closed and the session
    /// stays `Disconnected`. Use [`try_connect`](Self::try_connect) for the
    /// reason.
    pub async fn connect(&mut self, config: &MvsConnectionConfig) -> bool {
        match self.try_connect(config).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("MVS FTP connect to {}:{} failed: {}", config.host, config.port, e);
                false
            }
        }
    }

    /// Open the control connection and log in, returning the typed error on
    /// failure.
    pub async fn try_connect(&mut self, config: &MvsConnectionConfig) -> FtpResult<()> {
        if self.is_connected() {
            self.disconnect().await;
        }

        let (mut codec, banner) = connection::connect(config).await?;
        let wait = Duration::from_secs(config.connect_timeout_sec);
        let login = match timeout(wait, Self::login(&mut codec, config)).await {
            Ok(result) => result,
            Err(_) => Err(FtpError::timeout(format!(
                "Login to {}:{} did not complete within {:?}",
                config.host, config.port, wait
            ))),
        };
        if let Err(e) = login {
            codec.shutdown().await;
            return Err(e.with_session(self.id.clone()));
        }

        let now = Utc::now();
        let info = MvsSessionInfo {
            id: self.id.clone(),
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            label: config.label.clone(),
            server_banner: Some(banner.text()),
            connected_at: now,
            last_activity: now,
            bytes_uploaded: 0,
            bytes_downloaded: 0,
        };
        self.state = SessionState::Connected {
            codec,
            config: config.clone(),
            info,
        };
        log::info!(
            "MVS FTP session {} logged on to {}:{} as {}",
            self.id,
            config.host,
            config.port,
            config.username
        );
        Ok(())
    }

    async fn login(codec: &mut FtpCodec, config: &MvsConnectionConfig) -> FtpResult<()> {
        let mut reply = codec.execute(&format!("USER {}", config.username)).await?;
        if reply.code == 331 {
            reply = codec.execute(&format!("PASS {}", config.password)).await?;
        }
        if reply.code != 230 {
            return Err(FtpError::auth_failed(format!("Login failed: {}", reply.text()))
                .with_code(reply.code));
        }

        for params in &config.site_commands {
            let resp = codec.execute(&format!("SITE {}", params)).await?;
            if !site_succeeded(resp.code) {
                return Err(FtpError::from_reply(resp.code, &resp.text()));
            }
        }
        Ok(())
    }

    /// Best-effort `QUIT`, then drop the socket. Safe to call repeatedly.
    ///
    /// The `QUIT` reply is awaited for at most `connect_timeout_sec`.
    pub async fn disconnect(&mut self) {
        let state = std::mem::replace(&mut self.state, SessionState::Disconnected);
        if let SessionState::Connected { mut codec, config, info } = state {
            let wait = Duration::from_secs(config.connect_timeout_sec);
            match timeout(wait, codec.expect_ok("QUIT")).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::debug!("QUIT on session {} failed: {}", self.id, e),
                Err(_) => log::debug!("QUIT on session {} got no reply within {:?}", self.id, wait),
            }
            codec.shutdown().await;
            log::info!("MVS FTP session {} to {} disconnected", self.id, info.host);
        }
    }

    /// Drop the control socket without `QUIT` (broken or cancelled session).
    pub(crate) fn abandon(&mut self) {
        if self.is_connected() {
            log::warn!("MVS FTP session {} abandoned; control channel state unknown", self.id);
        }
        self.state = SessionState::Disconnected;
    }

    // ─── Command dispatch ────────────────────────────────────────

    fn codec_mut(&mut self) -> FtpResult<&mut FtpCodec> {
        match &mut self.state {
            SessionState::Connected { codec, .. } => Ok(codec),
            SessionState::Disconnected => Err(FtpError::disconnected("Session is not connected")
                .with_session(self.id.clone())),
        }
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.config().map_or(60, |c| c.command_timeout_sec))
    }

    /// Write one command line and read its full reply.
    pub async fn send_command(&mut self, text: &str) -> FtpResult<FtpResponse> {
        let wait = self.command_timeout();
        let result = match timeout(wait, self.codec_mut()?.execute(text)).await {
            Ok(result) => result,
            Err(_) => Err(FtpError::timeout(format!(
                "No reply to {} within {:?}",
                text.split_whitespace().next().unwrap_or_default(),
                wait
            ))),
        };
        self.after_io(result)
    }

    /// Read one reply without sending anything (closing reply of a transfer).
    pub async fn read_reply(&mut self) -> FtpResult<FtpResponse> {
        let wait = self.command_timeout();
        let result = match timeout(wait, self.codec_mut()?.read_response()).await {
            Ok(result) => result,
            Err(_) => Err(FtpError::timeout(format!("No reply within {:?}", wait))),
        };
        self.after_io(result)
    }

    fn after_io(&mut self, result: FtpResult<FtpResponse>) -> FtpResult<FtpResponse> {
        match result {
            Ok(resp) => {
                self.touch();
                Ok(resp)
            }
            Err(e) => {
                if matches!(
                    e.kind,
                    FtpErrorKind::Disconnected | FtpErrorKind::IoError | FtpErrorKind::Timeout
                ) {
                    self.abandon();
                }
                Err(e.with_session(self.id.clone()))
            }
        }
    }

    /// `SITE <parameters>`; success iff the reply is `200` or `250`.
    ///
    /// Returns the raw reply text (or the error text when the command could
    /// not be sent at all).
    pub async fn execute_site(&mut self, parameters: &str) -> (bool, String) {
        match self.send_command(&format!("SITE {}", parameters)).await {
            Ok(resp) => (site_succeeded(resp.code), resp.text()),
            Err(e) => (false, e.to_string()),
        }
    }

    /// Switch TYPE for the next transfer.
    pub async fn set_type(&mut self, mode: TransferMode) -> FtpResult<()> {
        let resp = self.send_command(mode.type_command()).await?;
        if !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(())
    }

    /// Send a NOOP to keep the control connection alive.
    pub async fn noop(&mut self) -> FtpResult<()> {
        let resp = self.send_command("NOOP").await?;
        if !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(())
    }

    // ─── Bookkeeping ─────────────────────────────────────────────

    fn touch(&mut self) {
        if let SessionState::Connected { info, .. } = &mut self.state {
            info.last_activity = Utc::now();
        }
    }

    pub(crate) fn record_transfer(&mut self, direction: TransferDirection, bytes: u64) {
        if let SessionState::Connected { info, .. } = &mut self.state {
            match direction {
                TransferDirection::Upload => info.bytes_uploaded += bytes,
                TransferDirection::Download => info.bytes_downloaded += bytes,
            }
        }
    }
}

fn site_succeeded(code: u16) -> bool {
    code == 200 || code == 250
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnect_twice_is_harmless() {
        let mut session = ControlSession::new();
        session.disconnect().await;
        session.disconnect().await;
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn commands_on_disconnected_session_fail() {
        let mut session = ControlSession::new();
        let err = session.send_command("NOOP").await.unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::Disconnected);
        let (ok, raw) = session.execute_site("FILETYPE=JES").await;
        assert!(!ok);
        assert!(raw.contains("not connected"));
    }

    #[tokio::test]
    async fn connect_with_empty_host_returns_false() {
        let mut session = ControlSession::new();
        assert!(!session.connect(&MvsConnectionConfig::default()).await);
        assert!(!session.is_connected());
    }

    #[test]
    fn site_success_codes() {
        assert!(site_succeeded(200));
        assert!(site_succeeded(250));
        assert!(!site_succeeded(202));
        assert!(!site_succeeded(501));
    }
}
