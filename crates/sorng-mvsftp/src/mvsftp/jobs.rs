//! JES job handling over `SITE FILETYPE=JES`.
//!
//! In JES mode a STOR submits the payload as a job, LIST shows the spool
//! queue and RETR of a job id returns its output. Each call switches the
//! session back to `FILETYPE=SEQ` when done.

use crate::mvsftp::error::{FtpError, FtpErrorKind, FtpResult};
use crate::mvsftp::parser;
use crate::mvsftp::session::ControlSession;
use crate::mvsftp::types::*;
use chrono::Utc;

/// Remote name JCL is stored under; JES ignores it.
const JCL_REMOTE_NAME: &str = "JCL";

impl ControlSession {
    /// Submit a local JCL file. `None` when any step fails.
    pub async fn submit(&mut self, jcl_path: &str) -> Option<JobHandle> {
        let handle = match self.enter_jes_mode(None).await {
            Ok(()) => self.submit_inner(jcl_path).await,
            Err(e) => {
                log::warn!("JES submit of {} failed: {}", jcl_path, e);
                None
            }
        };
        self.leave_jes_mode().await;
        handle
    }

    async fn submit_inner(&mut self, jcl_path: &str) -> Option<JobHandle> {
        let result = self
            .upload(
                jcl_path,
                JCL_REMOTE_NAME,
                &TransferOptions::ascii(true),
                |_| {},
                &CancelToken::new(),
            )
            .await;
        if !result.success {
            log::warn!(
                "JES submit of {} failed: {}",
                jcl_path,
                result.error.as_deref().unwrap_or("unknown error")
            );
            return None;
        }

        let resolved_job_id = result.reply.as_deref().and_then(parser::parse_jes_job_id);
        log::info!(
            "Submitted {} ({})",
            jcl_path,
            resolved_job_id.as_deref().unwrap_or("job id not reported")
        );
        Some(JobHandle {
            submitted_name: result.destination,
            resolved_job_id,
            submitted_at: Utc::now(),
        })
    }

    /// Current status of a job. Protocol failures come back as `Unknown`.
    pub async fn poll(&mut self, job_id: &str) -> JobStatusReport {
        let listing = self.jes_retrieve(job_id, "LIST").await;
        match listing {
            Ok(raw) => parser::parse_job_status(&raw, job_id),
            Err(e) => {
                log::debug!("Polling {} failed: {}", job_id, e);
                JobStatusReport::unknown()
            }
        }
    }

    /// Spool output of a job as text.
    pub async fn fetch_output(&mut self, job_id: &str) -> Option<String> {
        match self.jes_retrieve(job_id, &format!("RETR {}", job_id)).await {
            Ok(output) => Some(output),
            Err(e) => {
                log::warn!("Fetching output of {} failed: {}", job_id, e);
                None
            }
        }
    }

    async fn jes_retrieve(&mut self, job_id: &str, cmd: &str) -> FtpResult<String> {
        let result = match self.enter_jes_mode(Some(job_id)).await {
            Ok(()) => self.retrieve_text(cmd).await,
            Err(e) => Err(e),
        };
        self.leave_jes_mode().await;
        result
    }

    async fn enter_jes_mode(&mut self, job_id: Option<&str>) -> FtpResult<()> {
        self.require_site("FILETYPE=JES").await?;
        if let Some(id) = job_id {
            self.require_site(&format!("JESJOBNAME={}", id)).await?;
        }
        Ok(())
    }

    async fn leave_jes_mode(&mut self) {
        if !self.is_connected() {
            return;
        }
        let (ok, raw) = self.execute_site("FILETYPE=SEQ").await;
        if !ok {
            log::debug!("SITE FILETYPE=SEQ not accepted: {}", raw);
        }
    }

    async fn require_site(&mut self, parameters: &str) -> FtpResult<()> {
        let (ok, raw) = self.execute_site(parameters).await;
        if ok {
            Ok(())
        } else {
            Err(FtpError::new(FtpErrorKind::CommandRejected, raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn job_calls_on_disconnected_session() {
        let mut session = ControlSession::new();
        assert!(session.submit("/nonexistent.jcl").await.is_none());
        assert_eq!(session.poll("JOB00001").await, JobStatusReport::unknown());
        assert!(session.fetch_output("JOB00001").await.is_none());
    }
}
