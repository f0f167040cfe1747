//! High-level orchestrator: owns the session pool and exposes the
//! operations host commands delegate to.
//!
//! Errors cross this boundary as `String`s. Transfers report failure inside
//! `TransferResult`; only an unknown session id is an `Err` for those.

use crate::mvsftp::error::FtpError;
use crate::mvsftp::pool::MvsSessionPool;
use crate::mvsftp::session::ControlSession;
use crate::mvsftp::types::*;
use log::info;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Shared service handle held by the host application.
pub type MvsFtpServiceState = Arc<Mutex<MvsFtpService>>;

pub struct MvsFtpService {
    pub pool: MvsSessionPool,
}

impl MvsFtpService {
    pub fn new() -> MvsFtpServiceState {
        Self::with_pool(MvsSessionPool::new())
    }

    pub fn with_pool(pool: MvsSessionPool) -> MvsFtpServiceState {
        Arc::new(Mutex::new(MvsFtpService { pool }))
    }

    fn session(&mut self, session_id: &str) -> Result<&mut ControlSession, String> {
        self.pool.get_mut(session_id).map_err(|e| e.to_string())
    }

    // ─── Connection lifecycle ────────────────────────────────────

    /// Connect and log in a new session, then add it to the pool.
    pub async fn connect(&mut self, config: MvsConnectionConfig) -> Result<MvsSessionInfo, String> {
        if !self.pool.has_capacity() {
            return Err(FtpError::pool_exhausted(format!(
                "Pool limit reached ({})",
                self.pool.max_sessions
            ))
            .to_string());
        }
        info!("MVS FTP connecting to {}:{}", config.host, config.port);
        let mut session = ControlSession::new();
        session.try_connect(&config).await.map_err(|e| e.to_string())?;
        let info = session
            .info()
            .cloned()
            .ok_or_else(|| "Session closed during login".to_string())?;
        self.pool.insert(session).map_err(|e| e.to_string())?;
        Ok(info)
    }

    pub async fn disconnect(&mut self, session_id: &str) -> Result<(), String> {
        match self.pool.remove(session_id) {
            Some(mut session) => {
                session.disconnect().await;
                Ok(())
            }
            None => Err(FtpError::session_not_found(session_id).to_string()),
        }
    }

    pub async fn disconnect_all(&mut self) {
        self.pool.disconnect_all().await;
    }

    pub fn get_session_info(&self, session_id: &str) -> Result<MvsSessionInfo, String> {
        let session = self.pool.get(session_id).map_err(|e| e.to_string())?;
        session
            .info()
            .cloned()
            .ok_or_else(|| FtpError::disconnected("Session is not connected").to_string())
    }

    pub fn list_sessions(&self) -> Vec<MvsSessionInfo> {
        self.pool.list_sessions()
    }

    pub fn get_pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// NOOP; `Ok(false)` when the server did not answer positively.
    pub async fn ping(&mut self, session_id: &str) -> Result<bool, String> {
        let session = self.session(session_id)?;
        Ok(session.noop().await.is_ok())
    }

    // ─── Catalog ─────────────────────────────────────────────────

    pub async fn list_datasets(
        &mut self,
        session_id: &str,
        pattern: Option<&str>,
        options: Option<ListOptions>,
    ) -> Result<Vec<DataSetInfo>, String> {
        let session = self.session(session_id)?;
        let mut datasets = session
            .list_datasets(pattern)
            .await
            .map_err(|e| e.to_string())?;
        let opts = options.unwrap_or_default();
        if !opts.include_unknown {
            datasets.retain(|d| d.dataset_type != DatasetType::Unknown);
        }
        apply_list_options(&mut datasets, &opts)?;
        Ok(datasets)
    }

    pub async fn list_members(
        &mut self,
        session_id: &str,
        pds: &str,
        options: Option<ListOptions>,
    ) -> Result<Vec<DataSetInfo>, String> {
        let session = self.session(session_id)?;
        let mut members = session.list_members(pds).await.map_err(|e| e.to_string())?;
        apply_list_options(&mut members, &options.unwrap_or_default())?;
        Ok(members)
    }

    pub async fn delete_dataset(&mut self, session_id: &str, name: &str) -> Result<(), String> {
        let session = self.session(session_id)?;
        session.delete_dataset(name).await.map_err(|e| e.to_string())
    }

    pub async fn rename_dataset(
        &mut self,
        session_id: &str,
        from: &str,
        to: &str,
    ) -> Result<(), String> {
        let session = self.session(session_id)?;
        session.rename_dataset(from, to).await.map_err(|e| e.to_string())
    }

    // ─── Transfers ───────────────────────────────────────────────

    pub async fn download_dataset(
        &mut self,
        session_id: &str,
        dataset: &str,
        local_path: &str,
        options: TransferOptions,
        progress: Option<mpsc::Sender<TransferProgress>>,
        cancel: Option<CancelToken>,
    ) -> Result<TransferResult, String> {
        let session = self.session(session_id)?;
        let cancel = cancel.unwrap_or_default();
        Ok(session
            .download(dataset, local_path, &options, progress_sink(progress), &cancel)
            .await)
    }

    pub async fn upload_dataset(
        &mut self,
        session_id: &str,
        local_path: &str,
        dataset: &str,
        options: TransferOptions,
        progress: Option<mpsc::Sender<TransferProgress>>,
        cancel: Option<CancelToken>,
    ) -> Result<TransferResult, String> {
        let session = self.session(session_id)?;
        let cancel = cancel.unwrap_or_default();
        Ok(session
            .upload(local_path, dataset, &options, progress_sink(progress), &cancel)
            .await)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn download_member(
        &mut self,
        session_id: &str,
        pds: &str,
        member: &str,
        local_path: &str,
        options: TransferOptions,
        progress: Option<mpsc::Sender<TransferProgress>>,
        cancel: Option<CancelToken>,
    ) -> Result<TransferResult, String> {
        let session = self.session(session_id)?;
        let cancel = cancel.unwrap_or_default();
        Ok(session
            .download_member(pds, member, local_path, &options, progress_sink(progress), &cancel)
            .await)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn upload_member(
        &mut self,
        session_id: &str,
        local_path: &str,
        pds: &str,
        member: &str,
        options: TransferOptions,
        progress: Option<mpsc::Sender<TransferProgress>>,
        cancel: Option<CancelToken>,
    ) -> Result<TransferResult, String> {
        let session = self.session(session_id)?;
        let cancel = cancel.unwrap_or_default();
        Ok(session
            .upload_member(local_path, pds, member, &options, progress_sink(progress), &cancel)
            .await)
    }

    pub async fn allocate(
        &mut self,
        session_id: &str,
        dataset: &str,
        params: AllocationParams,
    ) -> Result<TransferResult, String> {
        let session = self.session(session_id)?;
        Ok(session.allocate(dataset, &params).await)
    }

    // ─── JES ─────────────────────────────────────────────────────

    pub async fn submit_job(&mut self, session_id: &str, jcl_path: &str) -> Result<JobHandle, String> {
        let session = self.session(session_id)?;
        session
            .submit(jcl_path)
            .await
            .ok_or_else(|| format!("Submitting {} failed", jcl_path))
    }

    pub async fn poll_job(&mut self, session_id: &str, job_id: &str) -> Result<JobStatusReport, String> {
        let session = self.session(session_id)?;
        Ok(session.poll(job_id).await)
    }

    pub async fn fetch_job_output(&mut self, session_id: &str, job_id: &str) -> Result<String, String> {
        let session = self.session(session_id)?;
        session
            .fetch_output(job_id)
            .await
            .ok_or_else(|| format!("No output retrieved for {}", job_id))
    }

    // ─── SITE / raw ──────────────────────────────────────────────

    /// `SITE <args>`; the raw reply either way.
    pub async fn site_command(&mut self, session_id: &str, args: &str) -> Result<String, String> {
        let session = self.session(session_id)?;
        match session.execute_site(args).await {
            (true, raw) => Ok(raw),
            (false, raw) => Err(raw),
        }
    }

    /// Send any command line and return the reply (debugging aid).
    pub async fn raw_command(&mut self, session_id: &str, command: &str) -> Result<FtpResponse, String> {
        let session = self.session(session_id)?;
        session.send_command(command).await.map_err(|e| e.to_string())
    }
}

/// Adapt a bounded channel to the transfer callback. Full channel → the
/// update is dropped; the transfer never waits on the receiver.
fn progress_sink(
    tx: Option<mpsc::Sender<TransferProgress>>,
) -> impl FnMut(TransferProgress) + Send {
    move |update| {
        if let Some(tx) = &tx {
            let _ = tx.try_send(update);
        }
    }
}

/// Glob filter on the record name, then sort.
fn apply_list_options(entries: &mut Vec<DataSetInfo>, opts: &ListOptions) -> Result<(), String> {
    if let Some(ref filter) = opts.filter {
        let pattern = glob::Pattern::new(filter).map_err(|e| e.to_string())?;
        entries.retain(|e| pattern.matches(&e.name));
    }

    if let Some(ref sort_by) = opts.sort_by {
        match sort_by {
            DatasetSortField::Name => entries.sort_by(|a, b| a.name.cmp(&b.name)),
            DatasetSortField::Volume => entries.sort_by(|a, b| a.volume.cmp(&b.volume)),
            DatasetSortField::LastReferenced => {
                entries.sort_by(|a, b| a.last_referenced.cmp(&b.last_referenced))
            }
        }
    }

    if opts.sort_order == Some(SortOrder::Desc) {
        entries.reverse();
    }
    Ok(())
}
