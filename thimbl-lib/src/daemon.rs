use crate::error::{Error, ErrorKind};
use crate::settings::DaemonSettings;
use std::ffi::OsStr;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// Longest request line we will read. Anything longer is dropped.
pub const MAX_REQUEST_BYTES: usize = 512;

/// Sent in place of any lookup when a request names another host
pub const REFUSAL: &str = "Sorry, this server doesn't support delegated fingering!";

/// Maps a requested username to the directory holding that user's plan
pub trait HomeResolver: Send + Sync {
    fn home_dir(&self, username: &str) -> Option<PathBuf>;
}

/// Home directories laid out as `<root>/<username>`, whether or not such an
/// account exists. The empty username (a bare `finger @host`) is answered
/// from the daemon user's own home.
#[derive(Clone, Debug)]
pub struct HomeDirs {
    pub root: PathBuf,
    pub own_home: Option<PathBuf>,
}

impl HomeDirs {
    pub fn new(root: PathBuf) -> HomeDirs {
        HomeDirs {
            root,
            own_home: dirs::home_dir(),
        }
    }
}

impl HomeResolver for HomeDirs {
    fn home_dir(&self, username: &str) -> Option<PathBuf> {
        if username.is_empty() {
            return self.own_home.clone();
        }
        if !is_simple_username(username) {
            return None;
        }
        Some(self.root.join(username))
    }
}

/// Each account's real home directory, as recorded in the user database.
/// Users whose home lies outside `/home` (such as `root`) are found too.
#[cfg(unix)]
#[derive(Clone, Debug)]
pub struct AccountHomes {
    pub own_home: Option<PathBuf>,
}

#[cfg(unix)]
impl AccountHomes {
    pub fn new() -> AccountHomes {
        AccountHomes {
            own_home: dirs::home_dir(),
        }
    }
}

#[cfg(unix)]
impl Default for AccountHomes {
    fn default() -> AccountHomes {
        AccountHomes::new()
    }
}

#[cfg(unix)]
impl HomeResolver for AccountHomes {
    fn home_dir(&self, username: &str) -> Option<PathBuf> {
        if username.is_empty() {
            return self.own_home.clone();
        }
        if !is_simple_username(username) {
            return None;
        }
        match nix::unistd::User::from_name(username) {
            Ok(Some(user)) => Some(user.dir),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("User lookup for {} failed: {}", username, e);
                None
            }
        }
    }
}

// A single plain path component, so a home can't escape its root
fn is_simple_username(username: &str) -> bool {
    let simple = Path::new(username).file_name() == Some(OsStr::new(username));
    if !simple {
        tracing::info!("Not a simple username: {}", username);
    }
    simple
}

/// Serves plan files over finger, one connection at a time
pub struct FingerDaemon<R: HomeResolver> {
    listener: TcpListener,
    resolver: R,
    plan_filename: String,
    request_timeout: Duration,
}

impl<R: HomeResolver> FingerDaemon<R> {
    pub async fn bind(settings: &DaemonSettings, resolver: R) -> Result<FingerDaemon<R>, Error> {
        let listener = TcpListener::bind((settings.bind_address.as_str(), settings.port)).await?;
        Ok(FingerDaemon {
            listener,
            resolver,
            plan_filename: settings.plan_filename.clone(),
            request_timeout: settings.request_timeout(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and answer connections until the task is dropped. A failed
    /// connection is logged and closed; it never stops the loop.
    pub async fn run(&self) -> Result<(), Error> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    // e.g. out of file descriptors; don't spin
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            if let Err(e) = self.serve_connection(stream).await {
                tracing::warn!("Dropped connection from {}: {}", peer, e);
            }
        }
    }

    async fn serve_connection(&self, mut stream: TcpStream) -> Result<(), Error> {
        let request = timeout(self.request_timeout, read_request_line(&mut stream)).await??;
        let response = self.respond(&request).await?;
        timeout(self.request_timeout, stream.write_all(response.as_bytes())).await??;
        stream.shutdown().await?;
        Ok(())
    }

    /// The full reply to one request line
    pub async fn respond(&self, request: &[u8]) -> Result<String, Error> {
        match parse_request(request) {
            Ok(username) => self.user_info(&username).await,
            Err(e) if matches!(e.kind, ErrorKind::DelegatedFinger) => {
                tracing::info!("Refusing delegated finger request");
                Ok(REFUSAL.to_owned())
            }
            Err(e) => Err(e),
        }
    }

    async fn user_info(&self, username: &str) -> Result<String, Error> {
        tracing::info!("Request made for user: {}", username);
        let mut text = format!("You fingered the user '{}'\n", username);

        let home = match self.resolver.home_dir(username) {
            Some(home) => home,
            None => return Ok(text),
        };
        let plan_file = home.join(&self.plan_filename);
        tracing::debug!("Seeking plan file: {}", plan_file.display());

        if tokio::fs::metadata(&plan_file)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            let plan = tokio::fs::read_to_string(&plan_file).await?;
            text.push_str(crate::plan::PLAN_MARKER);
            text.push('\n');
            text.push_str(&plan);
        }
        Ok(text)
    }
}

/// Extract the username from a request line
pub fn parse_request(line: &[u8]) -> Result<String, Error> {
    let username = std::str::from_utf8(line)?.trim();
    if username.contains('@') {
        return Err(ErrorKind::DelegatedFinger.into());
    }
    Ok(username.to_owned())
}

/// Read up to and including the first newline, or to end of stream.
/// Fails if no newline shows up within `MAX_REQUEST_BYTES`.
pub async fn read_request_line<S>(stream: &mut S) -> Result<Vec<u8>, Error>
where
    S: AsyncRead + Unpin,
{
    let mut line: Vec<u8> = Vec::new();
    let mut reader = BufReader::new(stream.take(MAX_REQUEST_BYTES as u64));
    reader.read_until(b'\n', &mut line).await?;
    if line.len() >= MAX_REQUEST_BYTES && line.last() != Some(&b'\n') {
        return Err(ErrorKind::RequestTooLong(MAX_REQUEST_BYTES).into());
    }
    Ok(line)
}
