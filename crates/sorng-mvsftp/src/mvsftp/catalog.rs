//! Catalog operations: dataset/member listings, delete, rename.

use crate::mvsftp::error::{FtpError, FtpResult};
use crate::mvsftp::file_ops::quote_dataset;
use crate::mvsftp::parser;
use crate::mvsftp::session::ControlSession;
use crate::mvsftp::transfer;
use crate::mvsftp::types::*;
use tokio::io::AsyncReadExt;

impl ControlSession {
    // ─── LIST ────────────────────────────────────────────────────

    /// List catalogued datasets, optionally restricted to a pattern such as
    /// `USER1.**` or `USER1.*.CNTL`.
    pub async fn list_datasets(&mut self, pattern: Option<&str>) -> FtpResult<Vec<DataSetInfo>> {
        let cmd = match pattern.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => format!("LIST {}", quote_dataset(p)),
            None => "LIST".to_string(),
        };
        let raw = self.retrieve_text(&cmd).await?;
        Ok(parser::parse_dataset_listing(&raw))
    }

    /// List the members of a partitioned dataset.
    pub async fn list_members(&mut self, pds: &str) -> FtpResult<Vec<DataSetInfo>> {
        let bare = pds.trim().trim_matches('\'');
        let raw = self.retrieve_text(&format!("LIST '{}(*)'", bare)).await?;
        Ok(parser::parse_member_listing(&raw, bare))
    }

    /// Run a data-bearing command in ASCII mode and return the payload as
    /// text (listings, JES spool output).
    pub(crate) async fn retrieve_text(&mut self, cmd: &str) -> FtpResult<String> {
        self.set_type(TransferMode::Ascii).await?;
        let mut data = transfer::open_data_channel(self).await?;
        let resp = self.send_command(cmd).await?;
        if !resp.opens_data_transfer() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }

        let mut buf = Vec::new();
        let read = data.read_to_end(&mut buf).await;
        drop(data);
        if let Err(e) = read {
            let e = FtpError::from(e);
            self.recover_after_stream_error(&e).await;
            return Err(e);
        }

        self.closing_reply().await?;
        log::debug!("{} returned {} bytes", cmd, buf.len());
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    // ─── DELE ────────────────────────────────────────────────────

    /// Delete a dataset (or `PDS(MEMBER)`).
    pub async fn delete_dataset(&mut self, name: &str) -> FtpResult<()> {
        let resp = self
            .send_command(&format!("DELE {}", quote_dataset(name)))
            .await?;
        if resp.code != 250 {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        log::info!("Deleted {}", name);
        Ok(())
    }

    // ─── RNFR / RNTO ─────────────────────────────────────────────

    /// Rename a dataset.
    pub async fn rename_dataset(&mut self, from: &str, to: &str) -> FtpResult<()> {
        let resp = self
            .send_command(&format!("RNFR {}", quote_dataset(from)))
            .await?;
        if resp.code != 350 {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        let resp = self
            .send_command(&format!("RNTO {}", quote_dataset(to)))
            .await?;
        if resp.code != 250 {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        log::info!("Renamed {} -> {}", from, to);
        Ok(())
    }
}
