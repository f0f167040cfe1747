//! Session pool: `ControlSession`s keyed by id, with idle reaping and
//! keepalive NOOPs.

use crate::mvsftp::error::{FtpError, FtpResult};
use crate::mvsftp::session::ControlSession;
use crate::mvsftp::types::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{self, Duration};

const DEFAULT_IDLE_TIMEOUT_SEC: u64 = 300;

pub struct MvsSessionPool {
    pub sessions: HashMap<String, ControlSession>,
    /// 0 = unlimited.
    pub max_sessions: usize,
    pub idle_timeout_sec: u64,
}

impl Default for MvsSessionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MvsSessionPool {
    pub fn new() -> Self {
        Self::with_limits(0, DEFAULT_IDLE_TIMEOUT_SEC)
    }

    pub fn with_limits(max_sessions: usize, idle_timeout_sec: u64) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
            idle_timeout_sec,
        }
    }

    /// Whether another session may be added.
    pub fn has_capacity(&self) -> bool {
        self.max_sessions == 0 || self.sessions.len() < self.max_sessions
    }

    pub fn insert(&mut self, session: ControlSession) -> FtpResult<String> {
        if !self.has_capacity() {
            return Err(FtpError::pool_exhausted(format!(
                "Pool limit reached ({})",
                self.max_sessions
            )));
        }
        let id = session.id().to_string();
        self.sessions.insert(id.clone(), session);
        Ok(id)
    }

    pub fn get_mut(&mut self, id: &str) -> FtpResult<&mut ControlSession> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| FtpError::session_not_found(id))
    }

    pub fn get(&self, id: &str) -> FtpResult<&ControlSession> {
        self.sessions
            .get(id)
            .ok_or_else(|| FtpError::session_not_found(id))
    }

    pub fn remove(&mut self, id: &str) -> Option<ControlSession> {
        self.sessions.remove(id)
    }

    /// Infos of all connected sessions.
    pub fn list_sessions(&self) -> Vec<MvsSessionInfo> {
        self.sessions.values().filter_map(|s| s.info().cloned()).collect()
    }

    pub fn stats(&self) -> PoolStats {
        let total = self.sessions.len() as u32;
        let active = self.sessions.values().filter(|s| s.is_connected()).count() as u32;
        PoolStats {
            total_sessions: total,
            active_sessions: active,
            idle_sessions: total - active,
            max_sessions: self.max_sessions as u32,
        }
    }

    /// Drop sessions idle past `idle_timeout_sec` and sessions whose
    /// control connection is already gone. Returns how many were removed.
    ///
    /// An idle timeout too large to represent never expires a live session.
    pub async fn reap_idle(&mut self) -> usize {
        let cutoff = i64::try_from(self.idle_timeout_sec)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|idle| Utc::now().checked_sub_signed(idle));
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, s)| {
                s.info()
                    .map_or(true, |i| cutoff.is_some_and(|c| i.last_activity < c))
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            if let Some(mut session) = self.sessions.remove(id) {
                session.disconnect().await;
            }
        }
        if !stale.is_empty() {
            log::info!("MVS FTP pool: reaped {} idle sessions", stale.len());
        }
        stale.len()
    }

    /// NOOP on every connected session.
    pub async fn keepalive_all(&mut self) {
        for session in self.sessions.values_mut() {
            if session.is_connected() {
                if let Err(e) = session.noop().await {
                    log::debug!("Keepalive on {} failed: {}", session.id(), e);
                }
            }
        }
    }

    pub async fn disconnect_all(&mut self) {
        for (_, mut session) in self.sessions.drain() {
            session.disconnect().await;
        }
    }
}

/// Periodically reap idle sessions and keep the rest alive.
pub fn spawn_pool_maintenance(
    pool: Arc<Mutex<MvsSessionPool>>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            ticker.tick().await;
            let mut guard = pool.lock().await;
            guard.reap_idle().await;
            guard.keepalive_all().await;
        }
    })
}
