use crate::address::Address;
use crate::error::{Error, ErrorKind};
use crate::settings::Settings;
use crate::sync::PlanSource;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;

/// Finger protocol client (RFC 1288)
#[derive(Clone, Debug)]
pub struct FingerClient {
    pub port: u16,

    /// Applies separately to resolving, connecting, and each read or write
    pub timeout: Duration,

    pub max_response_bytes: usize,
}

impl FingerClient {
    pub fn new(settings: &Settings) -> FingerClient {
        FingerClient {
            port: settings.finger_port,
            timeout: settings.timeout(),
            max_response_bytes: settings.max_response_bytes,
        }
    }

    /// Finger `user@host` (or just `host`) and return everything the server
    /// sent before closing the connection.
    pub async fn finger(&self, address: &str) -> Result<String, Error> {
        let address: Address = address.parse()?;
        self.finger_address(&address).await
    }

    pub async fn finger_address(&self, address: &Address) -> Result<String, Error> {
        let host = &address.host;
        tracing::debug!("Fingering {:?} at host {}", address.user, host);

        let addrs: Vec<SocketAddr> =
            match timeout(self.timeout, lookup_host((host.as_str(), self.port))).await? {
                Ok(addrs) => addrs.collect(),
                Err(e) => return Err(ErrorKind::Dns(host.clone(), e).into()),
            };
        if addrs.is_empty() {
            return Err(ErrorKind::DnsNoAddress(host.clone()).into());
        }

        let mut stream = match timeout(self.timeout, TcpStream::connect(&addrs[..])).await? {
            Ok(stream) => stream,
            Err(e) => return Err(ErrorKind::Connect(host.clone(), e).into()),
        };
        tracing::debug!("Connected to {}", host);

        let query = format!("{}\r\n", address.user);
        if let Err(e) = timeout(self.timeout, stream.write_all(query.as_bytes())).await? {
            return Err(ErrorKind::Transfer(host.clone(), e).into());
        }

        // No framing: the response ends when the server closes
        let mut response: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = match timeout(self.timeout, stream.read(&mut buf)).await? {
                Ok(n) => n,
                Err(e) => return Err(ErrorKind::Transfer(host.clone(), e).into()),
            };
            if n == 0 {
                break;
            }
            if response.len() + n > self.max_response_bytes {
                return Err(ErrorKind::ResponseTooLarge(self.max_response_bytes).into());
            }
            response.extend_from_slice(&buf[..n]);
        }

        Ok(String::from_utf8(response)?)
    }
}

#[async_trait]
impl PlanSource for FingerClient {
    async fn fetch(&self, address: &str) -> Result<String, Error> {
        self.finger(address).await
    }
}
