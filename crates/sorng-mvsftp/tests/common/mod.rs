//! In-process stand-in for a z/OS FTP daemon: control listener plus one
//! PASV listener per data command.

#![allow(dead_code)]

use sorng_mvsftp::MvsConnectionConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

pub const PASSWORD: &str = "secret";
pub const SUBMITTED_JOB_ID: &str = "JOB00042";

pub const DATASET_LISTING: &str = "\
Volume Referred Ext Used Recfm Lrecl BlkSz Dsorg Dsname\r
WRK001 2024/01/15  1   15  FB      80 27920  PO  USER1.JCL.CNTL\r
WRK002 2024/02/01  2  120  VB     255 27998  PS  USER1.REPORT.OUT\r
WRK003 2023/12/30  1    1  U        0  6144  DA  USER1.DIRECT\r
Migrated                                         USER1.OLD.DATA\r
";

pub const MEMBER_LISTING: &str = "\
 Name     VV.MM   Created       Changed      Size  Init   Mod   Id\r
COMPILE   01.03 2023/11/02 2024/01/20 14:05    42    40     0 USER1\r
LINK      01.00 2023/11/02 2023/11/02 09:12    10    10     0 USER1\r
";

pub const JES_LISTING: &str = "\
JOBNAME  JOBID    OWNER    STATUS CLASS\r
MYJOB    JOB00042 USER1    OUTPUT A        RC=0004 3 spool files\r
OTHER    JOB00043 USER1    ACTIVE A\r
";

#[derive(Default)]
pub struct MockState {
    /// Dataset contents keyed by unquoted name, as stored on the "host".
    pub datasets: HashMap<String, Vec<u8>>,
    pub job_output: HashMap<String, String>,
    pub submitted_jcl: Vec<Vec<u8>>,
    /// Every command line received, in order.
    pub commands: Vec<String>,
    /// Report the job id in the STOR reply while in JES mode.
    pub report_job_id: bool,
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<MockState>>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(MockState {
            report_job_id: true,
            ..Default::default()
        }));
        state
            .lock()
            .unwrap()
            .job_output
            .insert(SUBMITTED_JOB_ID.into(), "J E S 2  J O B  L O G\nIEF142I MYJOB STEP1 - STEP WAS EXECUTED - COND CODE 0004\n".into());

        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = shared.clone();
                tokio::spawn(async move {
                    let _ = handle_client(stream, state).await;
                });
            }
        });
        Self { addr, state }
    }

    pub fn config(&self) -> MvsConnectionConfig {
        MvsConnectionConfig {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            username: "USER1".into(),
            password: PASSWORD.into(),
            connect_timeout_sec: 5,
            data_timeout_sec: 5,
            chunk_size: 1024,
            ..Default::default()
        }
    }

    pub fn put_dataset(&self, name: &str, content: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .datasets
            .insert(name.to_string(), content.to_vec());
    }

    pub fn dataset(&self, name: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().datasets.get(name).cloned()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }
}

/// A daemon that greets, answers the first commands from `script`, then
/// reads everything else without ever replying.
pub async fn start_unresponsive(script: &'static [&'static str]) -> MvsConnectionConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (r, mut w) = stream.into_split();
                let mut lines = BufReader::new(r).lines();
                if reply(&mut w, "220 FTPD1 IBM FTP CS V2R5 at MOCK.HOST").await.is_err() {
                    return;
                }
                let mut pending = script.iter();
                while let Ok(Some(_)) = lines.next_line().await {
                    if let Some(text) = pending.next() {
                        let _ = reply(&mut w, text).await;
                    }
                }
            });
        }
    });
    MvsConnectionConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        username: "USER1".into(),
        password: PASSWORD.into(),
        connect_timeout_sec: 1,
        command_timeout_sec: 1,
        data_timeout_sec: 1,
        ..Default::default()
    }
}

pub const LOGIN_SCRIPT: &[&str] = &[
    "331 Send password please.",
    "230 USER1 is logged on.  Working directory is \"USER1.\".",
];

fn unquote(arg: &str) -> String {
    arg.trim().trim_matches('\'').to_string()
}

async fn reply(w: &mut (impl AsyncWriteExt + Unpin), text: &str) -> std::io::Result<()> {
    w.write_all(text.as_bytes()).await?;
    w.write_all(b"\r\n").await?;
    w.flush().await
}

async fn accept_data(pasv: &mut Option<TcpListener>) -> std::io::Result<TcpStream> {
    let listener = pasv
        .take()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "no PASV"))?;
    let (stream, _) = listener.accept().await?;
    Ok(stream)
}

async fn send_payload(
    w: &mut (impl AsyncWriteExt + Unpin),
    pasv: &mut Option<TcpListener>,
    payload: &[u8],
) -> std::io::Result<()> {
    let mut data = accept_data(pasv).await?;
    reply(w, "125 Sending data set").await?;
    let _ = data.write_all(payload).await;
    let _ = data.shutdown().await;
    drop(data);
    reply(w, "250 Transfer completed successfully.").await
}

async fn handle_client(stream: TcpStream, state: Arc<Mutex<MockState>>) -> std::io::Result<()> {
    let (r, mut w) = stream.into_split();
    let mut lines = BufReader::new(r).lines();
    let mut pasv: Option<TcpListener> = None;
    let mut jes_mode = false;
    let mut rename_from: Option<String> = None;

    reply(&mut w, "220-FTPD1 IBM FTP CS V2R5 at MOCK.HOST").await?;
    reply(&mut w, "220 Connection will close if idle for more than 5 minutes.").await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end().to_string();
        state.lock().unwrap().commands.push(line.clone());
        let (verb, arg) = match line.split_once(' ') {
            Some((v, a)) => (v.to_ascii_uppercase(), a.to_string()),
            None => (line.to_ascii_uppercase(), String::new()),
        };

        match verb.as_str() {
            "USER" => reply(&mut w, "331 Send password please.").await?,
            "PASS" if arg == PASSWORD => reply(&mut w, "230 USER1 is logged on.  Working directory is \"USER1.\".").await?,
            "PASS" => reply(&mut w, "530 PASS command failed").await?,
            "SITE" => {
                let upper = arg.to_ascii_uppercase();
                if upper.contains("BAD") || upper.contains("LRECL=0 ") {
                    reply(&mut w, "501 Invalid SITE parameter").await?;
                } else {
                    if upper == "FILETYPE=JES" {
                        jes_mode = true;
                    } else if upper == "FILETYPE=SEQ" {
                        jes_mode = false;
                    }
                    reply(&mut w, "200 SITE command was accepted").await?;
                }
            }
            "TYPE" => reply(&mut w, &format!("200 Representation type is {}", arg)).await?,
            "NOOP" => reply(&mut w, "200 OK").await?,
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                pasv = Some(listener);
                reply(
                    &mut w,
                    &format!("227 Entering Passive Mode (127,0,0,1,{},{})", port / 256, port % 256),
                )
                .await?;
            }
            "LIST" => {
                let payload = if jes_mode {
                    JES_LISTING.to_string()
                } else if arg.ends_with("(*)'") {
                    MEMBER_LISTING.to_string()
                } else {
                    DATASET_LISTING.to_string()
                };
                send_payload(&mut w, &mut pasv, payload.as_bytes()).await?;
            }
            "RETR" => {
                let name = unquote(&arg);
                let content = {
                    let st = state.lock().unwrap();
                    if jes_mode {
                        st.job_output.get(&name).map(|s| s.clone().into_bytes())
                    } else {
                        st.datasets.get(&name).cloned()
                    }
                };
                match content {
                    Some(bytes) => send_payload(&mut w, &mut pasv, &bytes).await?,
                    None => {
                        pasv = None;
                        reply(&mut w, &format!("550 Data set {} not found", name)).await?;
                    }
                }
            }
            "STOR" => {
                let name = unquote(&arg);
                let mut data = accept_data(&mut pasv).await?;
                reply(&mut w, "125 Storing data set").await?;
                let mut buf = Vec::new();
                let complete = data.read_to_end(&mut buf).await.is_ok();
                drop(data);
                if !complete {
                    reply(&mut w, "426 Connection closed; transfer aborted.").await?;
                    continue;
                }
                if jes_mode {
                    let report = {
                        let mut st = state.lock().unwrap();
                        st.submitted_jcl.push(buf);
                        st.report_job_id
                    };
                    if report {
                        reply(&mut w, &format!("250-It is known to JES as {}", SUBMITTED_JOB_ID)).await?;
                    }
                    reply(&mut w, "250 Transfer completed successfully.").await?;
                } else {
                    state.lock().unwrap().datasets.insert(name, buf);
                    reply(&mut w, "250 Transfer completed successfully.").await?;
                }
            }
            "DELE" => {
                let removed = state.lock().unwrap().datasets.remove(&unquote(&arg)).is_some();
                if removed {
                    reply(&mut w, &format!("250 {} deleted.", unquote(&arg))).await?;
                } else {
                    reply(&mut w, "550 DELE fails: data set not found").await?;
                }
            }
            "RNFR" => {
                rename_from = Some(unquote(&arg));
                reply(&mut w, "350 RNFR accepted. Please supply new name for RNTO.").await?;
            }
            "RNTO" => {
                let to = unquote(&arg);
                let moved = rename_from.take().map_or(false, |from| {
                    let mut st = state.lock().unwrap();
                    match st.datasets.remove(&from) {
                        Some(content) => {
                            st.datasets.insert(to.clone(), content);
                            true
                        }
                        None => false,
                    }
                });
                if moved {
                    reply(&mut w, &format!("250 {} renamed.", to)).await?;
                } else {
                    reply(&mut w, "550 RNTO fails: no such data set").await?;
                }
            }
            "QUIT" => {
                reply(&mut w, "221 Quit command received. Goodbye.").await?;
                return Ok(());
            }
            _ => reply(&mut w, "502 Command not implemented").await?,
        }
    }
    Ok(())
}
