//! Dataset transfers: download (RETR), upload (STOR), allocation-only create.
//!
//! Per transfer: `TYPE` → [`SITE` allocation] → `PASV` → `RETR`/`STOR` →
//! stream chunks → closing reply. Every step short of its success code ends
//! the transfer with a failed `TransferResult` carrying the raw reply.
//! Partially written local files are left where they are.

use crate::mvsftp::ebcdic;
use crate::mvsftp::error::{FtpError, FtpErrorKind, FtpResult};
use crate::mvsftp::session::ControlSession;
use crate::mvsftp::transfer;
use crate::mvsftp::types::*;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Default chunk size for streaming transfers (64 KiB).
const DEFAULT_CHUNK: usize = 65_536;

/// `'NAME'`. z/OS treats unquoted names as relative to the user prefix.
pub fn quote_dataset(name: &str) -> String {
    format!("'{}'", name.trim().trim_matches('\''))
}

/// `PDS(MEMBER)`; members are not a separate wire operation.
pub fn member_dataset_name(pds: &str, member: &str) -> String {
    format!("{}({})", pds.trim().trim_matches('\''), member.trim())
}

impl ControlSession {
    // ─── DOWNLOAD (RETR) ─────────────────────────────────────────

    /// Download a dataset to a local file.
    pub async fn download<P>(
        &mut self,
        dataset: &str,
        local_path: &str,
        options: &TransferOptions,
        mut on_progress: P,
        cancel: &CancelToken,
    ) -> TransferResult
    where
        P: FnMut(TransferProgress) + Send,
    {
        let started = Instant::now();
        let mut transferred = 0u64;
        let mut on_chunk = |bytes: u64| {
            on_progress(progress_snapshot(
                TransferDirection::Download,
                dataset,
                local_path,
                bytes,
                None,
                &started,
            ))
        };

        let outcome = self
            .download_inner(dataset, local_path, options, &mut on_chunk, cancel, &mut transferred)
            .await;

        match outcome {
            Ok(reply) => {
                self.record_transfer(TransferDirection::Download, transferred);
                log::debug!("RETR {} -> {} done ({} bytes)", dataset, local_path, transferred);
                TransferResult::succeeded(dataset, local_path, transferred, reply)
            }
            Err(e) => {
                log::warn!("RETR {} -> {} failed: {}", dataset, local_path, e);
                TransferResult::failed(dataset, local_path, transferred, e.message)
            }
        }
    }

    async fn download_inner(
        &mut self,
        dataset: &str,
        local_path: &str,
        options: &TransferOptions,
        on_chunk: &mut (dyn FnMut(u64) + Send),
        cancel: &CancelToken,
        transferred: &mut u64,
    ) -> FtpResult<String> {
        let chunk = self.chunk_size();
        let transcode: Option<fn(&mut [u8])> = if options.transcodes() {
            Some(ebcdic::to_ascii_in_place)
        } else {
            None
        };

        self.set_type(options.mode).await?;
        let mut data = transfer::open_data_channel(self).await?;
        let resp = self
            .send_command(&format!("RETR {}", quote_dataset(dataset)))
            .await?;
        if !resp.opens_data_transfer() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }

        let streamed: FtpResult<()> = async {
            let mut file = create_local_file(local_path).await?;
            pump(&mut data, &mut file, chunk, transcode, cancel, &mut *transferred, &mut *on_chunk).await?;
            file.flush().await?;
            Ok(())
        }
        .await;
        drop(data);

        if let Err(e) = streamed {
            self.recover_after_stream_error(&e).await;
            return Err(e);
        }
        self.closing_reply().await
    }

    /// Download `PDS(MEMBER)`.
    pub async fn download_member<P>(
        &mut self,
        pds: &str,
        member: &str,
        local_path: &str,
        options: &TransferOptions,
        on_progress: P,
        cancel: &CancelToken,
    ) -> TransferResult
    where
        P: FnMut(TransferProgress) + Send,
    {
        let dataset = member_dataset_name(pds, member);
        self.download(&dataset, local_path, options, on_progress, cancel)
            .await
    }

    // ─── UPLOAD (STOR) ───────────────────────────────────────────

    /// Upload a local file to a dataset.
    ///
    /// With `options.allocation` set, the `SITE` allocation command is sent
    /// before PASV so STOR creates the dataset with those attributes.
    pub async fn upload<P>(
        &mut self,
        local_path: &str,
        dataset: &str,
        options: &TransferOptions,
        mut on_progress: P,
        cancel: &CancelToken,
    ) -> TransferResult
    where
        P: FnMut(TransferProgress) + Send,
    {
        let started = Instant::now();
        let mut transferred = 0u64;
        let total = fs::metadata(local_path).await.ok().map(|m| m.len());
        let mut on_chunk = |bytes: u64| {
            on_progress(progress_snapshot(
                TransferDirection::Upload,
                dataset,
                local_path,
                bytes,
                total,
                &started,
            ))
        };

        let outcome = self
            .upload_inner(local_path, dataset, options, &mut on_chunk, cancel, &mut transferred)
            .await;

        match outcome {
            Ok(reply) => {
                self.record_transfer(TransferDirection::Upload, transferred);
                log::debug!("STOR {} -> {} done ({} bytes)", local_path, dataset, transferred);
                TransferResult::succeeded(local_path, dataset, transferred, reply)
            }
            Err(e) => {
                log::warn!("STOR {} -> {} failed: {}", local_path, dataset, e);
                TransferResult::failed(local_path, dataset, transferred, e.message)
            }
        }
    }

    async fn upload_inner(
        &mut self,
        local_path: &str,
        dataset: &str,
        options: &TransferOptions,
        on_chunk: &mut (dyn FnMut(u64) + Send),
        cancel: &CancelToken,
        transferred: &mut u64,
    ) -> FtpResult<String> {
        let chunk = self.chunk_size();
        let transcode: Option<fn(&mut [u8])> = if options.transcodes() {
            Some(ebcdic::to_ebcdic_in_place)
        } else {
            None
        };

        let mut file = fs::File::open(local_path).await?;

        self.set_type(options.mode).await?;
        if let Some(params) = &options.allocation {
            self.apply_allocation(params).await?;
        }
        let mut data = transfer::open_data_channel(self).await?;
        let resp = self
            .send_command(&format!("STOR {}", quote_dataset(dataset)))
            .await?;
        if !resp.opens_data_transfer() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }

        let streamed: FtpResult<()> = async {
            pump(&mut file, &mut data, chunk, transcode, cancel, &mut *transferred, &mut *on_chunk).await?;
            data.flush().await?;
            data.shutdown().await?;
            Ok(())
        }
        .await;
        drop(data);

        if let Err(e) = streamed {
            self.recover_after_stream_error(&e).await;
            return Err(e);
        }
        self.closing_reply().await
    }

    /// Upload a local file into `PDS(MEMBER)`.
    pub async fn upload_member<P>(
        &mut self,
        local_path: &str,
        pds: &str,
        member: &str,
        options: &TransferOptions,
        on_progress: P,
        cancel: &CancelToken,
    ) -> TransferResult
    where
        P: FnMut(TransferProgress) + Send,
    {
        let dataset = member_dataset_name(pds, member);
        self.upload(local_path, &dataset, options, on_progress, cancel)
            .await
    }

    // ─── ALLOCATE (empty STOR) ───────────────────────────────────

    /// Create an empty dataset with the given attributes: SITE allocation,
    /// PASV, STOR, then close the data socket without writing.
    pub async fn allocate(&mut self, dataset: &str, params: &AllocationParams) -> TransferResult {
        match self.allocate_inner(dataset, params).await {
            Ok(reply) => {
                log::info!("Allocated {} ({})", dataset, params.site_parameters());
                TransferResult::succeeded("", dataset, 0, reply)
            }
            Err(e) => {
                log::warn!("Allocation of {} failed: {}", dataset, e);
                TransferResult::failed("", dataset, 0, e.message)
            }
        }
    }

    async fn allocate_inner(&mut self, dataset: &str, params: &AllocationParams) -> FtpResult<String> {
        self.apply_allocation(params).await?;
        let mut data = transfer::open_data_channel(self).await?;
        let resp = self
            .send_command(&format!("STOR {}", quote_dataset(dataset)))
            .await?;
        if !resp.opens_data_transfer() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        let _ = data.shutdown().await;
        drop(data);
        self.closing_reply().await
    }

    // ─── Helpers ─────────────────────────────────────────────────

    async fn apply_allocation(&mut self, params: &AllocationParams) -> FtpResult<()> {
        let (ok, raw) = self.execute_site(&params.site_parameters()).await;
        if ok {
            Ok(())
        } else {
            Err(FtpError::new(FtpErrorKind::CommandRejected, raw))
        }
    }

    /// Read the 226/250 that follows the data connection closing.
    pub(crate) async fn closing_reply(&mut self) -> FtpResult<String> {
        let done = self.read_reply().await?;
        if !done.is_completion() {
            return Err(FtpError::from_reply(done.code, &done.text()));
        }
        Ok(done.text())
    }

    /// After a broken stream: a cancelled session is abandoned, otherwise
    /// try to consume the server's error reply so the control channel stays
    /// in step.
    pub(crate) async fn recover_after_stream_error(&mut self, error: &FtpError) {
        if error.kind == FtpErrorKind::Cancelled {
            self.abandon();
            return;
        }
        let wait = Duration::from_secs(self.config().map(|c| c.data_timeout_sec).unwrap_or(30));
        match timeout(wait, self.read_reply()).await {
            Ok(Ok(resp)) => log::debug!("Reply after failed transfer: {}", resp.text()),
            Ok(Err(_)) => {}
            Err(_) => self.abandon(),
        }
    }

    pub(crate) fn chunk_size(&self) -> usize {
        self.config()
            .map(|c| c.chunk_size)
            .filter(|c| *c > 0)
            .unwrap_or(DEFAULT_CHUNK)
    }
}

/// Copy `reader` into `writer` chunk by chunk, transcoding each chunk and
/// checking `cancel` before every read.
pub(crate) async fn pump<R, W>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    transcode: Option<fn(&mut [u8])>,
    cancel: &CancelToken,
    transferred: &mut u64,
    on_chunk: &mut (dyn FnMut(u64) + Send),
) -> FtpResult<()>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; chunk_size];
    loop {
        if cancel.is_cancelled() {
            return Err(FtpError::cancelled("Transfer cancelled"));
        }
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        if let Some(convert) = transcode {
            convert(&mut buf[..n]);
        }
        writer.write_all(&buf[..n]).await?;
        *transferred += n as u64;
        on_chunk(*transferred);
    }
}

async fn create_local_file(local_path: &str) -> FtpResult<fs::File> {
    if let Some(parent) = Path::new(local_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(fs::File::create(local_path).await?)
}

fn progress_snapshot(
    direction: TransferDirection,
    dataset: &str,
    local_path: &str,
    transferred: u64,
    total: Option<u64>,
    started: &Instant,
) -> TransferProgress {
    let elapsed = started.elapsed().as_secs_f64().max(0.001);
    let percent = total.map(|t| {
        if t > 0 {
            (transferred as f64 / t as f64 * 100.0) as f32
        } else {
            100.0
        }
    });
    TransferProgress {
        direction,
        dataset: dataset.to_string(),
        local_path: local_path.to_string(),
        bytes_transferred: transferred,
        total_bytes: total,
        percent,
        speed_bps: (transferred as f64 / elapsed) as u64,
    }
}
