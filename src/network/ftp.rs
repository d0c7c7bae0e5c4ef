//! Minimal anonymous FTP client
//!
//! Speaks just enough of RFC 959 to log in anonymously and list the root
//! directory over a passive data connection. Every read, write and connect
//! is bounded by the caller's timeout, and every read is bounded in size:
//! a reply line may not exceed [`MAX_REPLY_LINE`] bytes and a listing may
//! not exceed [`MAX_LISTING`] bytes.

use async_trait::async_trait;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::collaborators::FtpLister;
use crate::ScanError;

/// Longest control reply line accepted, terminator included
pub const MAX_REPLY_LINE: u64 = 8 * 1024;
/// Largest NLST listing accepted
pub const MAX_LISTING: u64 = 4 * 1024 * 1024;

/// Reply from the control connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpReply {
    pub code: u16,
    pub text: String,
}

impl FtpReply {
    fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    fn is_positive_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }
}

/// Anonymous FTP lister with configurable credentials
#[derive(Debug, Clone)]
pub struct AnonymousFtpClient {
    user: String,
    password: String,
}

impl Default for AnonymousFtpClient {
    fn default() -> Self {
        Self {
            user: "anonymous".to_string(),
            password: "anomic@".to_string(),
        }
    }
}

#[async_trait]
impl FtpLister for AnonymousFtpClient {
    async fn list_anonymous(
        &self,
        addr: IpAddr,
        port: u16,
        timeout: Duration,
    ) -> crate::Result<Vec<String>> {
        let mut session = FtpSession::open(SocketAddr::new(addr, port), timeout).await?;
        session.login(&self.user, &self.password).await?;
        let listing = session.list("/").await?;
        session.quit().await;
        Ok(listing)
    }
}

/// One control connection
struct FtpSession {
    peer: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout: Duration,
}

impl FtpSession {
    async fn open(peer: SocketAddr, timeout: Duration) -> crate::Result<Self> {
        let stream = bounded(timeout, TcpStream::connect(peer)).await??;
        let (read_half, write_half) = stream.into_split();
        let mut session = Self {
            peer,
            reader: BufReader::new(read_half),
            writer: write_half,
            timeout,
        };

        let greeting = session.read_reply().await?;
        if greeting.code != 220 {
            return Err(ScanError::ProtocolError(format!(
                "unexpected greeting {} {}",
                greeting.code, greeting.text
            )));
        }
        Ok(session)
    }

    async fn login(&mut self, user: &str, password: &str) -> crate::Result<()> {
        let reply = self.command(&format!("USER {}", user)).await?;
        let reply = match reply.code {
            230 => return Ok(()),
            331 | 332 => self.command(&format!("PASS {}", password)).await?,
            _ => reply,
        };

        if reply.code == 230 || reply.code == 202 {
            Ok(())
        } else {
            Err(ScanError::ProtocolError(format!(
                "login rejected: {} {}",
                reply.code, reply.text
            )))
        }
    }

    async fn list(&mut self, path: &str) -> crate::Result<Vec<String>> {
        let pasv = self.command("PASV").await?;
        if pasv.code != 227 {
            return Err(ScanError::ProtocolError(format!(
                "passive mode refused: {} {}",
                pasv.code, pasv.text
            )));
        }
        let data_port = parse_pasv(&pasv.text)?;

        // Data goes to the control peer; the advertised host is often a
        // private address of a NATed server.
        let data_addr = SocketAddr::new(self.peer.ip(), data_port);
        let mut data = bounded(self.timeout, TcpStream::connect(data_addr)).await??;

        let reply = self.command(&format!("NLST {}", path)).await?;
        // Servers answer "no files" for an empty directory
        if reply.code == 450 || reply.code == 550 {
            log::debug!("{} has nothing to list: {} {}", self.peer, reply.code, reply.text);
            return Ok(Vec::new());
        }
        if !reply.is_positive_preliminary() && !reply.is_positive_completion() {
            return Err(ScanError::ProtocolError(format!(
                "listing refused: {} {}",
                reply.code, reply.text
            )));
        }

        let mut raw = Vec::new();
        bounded(self.timeout, (&mut data).take(MAX_LISTING + 1).read_to_end(&mut raw)).await??;
        drop(data);
        if raw.len() as u64 > MAX_LISTING {
            return Err(ScanError::ResponseTooLarge(format!(
                "listing from {} exceeds {} bytes",
                self.peer, MAX_LISTING
            )));
        }

        if reply.is_positive_preliminary() {
            let done = self.read_reply().await?;
            if !done.is_positive_completion() {
                return Err(ScanError::ProtocolError(format!(
                    "listing aborted: {} {}",
                    done.code, done.text
                )));
            }
        }

        Ok(String::from_utf8_lossy(&raw)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn quit(&mut self) {
        let _ = self.command("QUIT").await;
    }

    async fn command(&mut self, line: &str) -> crate::Result<FtpReply> {
        let wire = format!("{}\r\n", line);
        bounded(self.timeout, self.writer.write_all(wire.as_bytes())).await??;
        self.read_reply().await
    }

    /// Read a possibly multi-line reply (`123-...` up to `123 ...`)
    async fn read_reply(&mut self) -> crate::Result<FtpReply> {
        let first = self.read_line().await?;
        let code = parse_code(&first)?;
        let mut text = first.get(4..).unwrap_or("").to_string();

        if first.as_bytes().get(3) == Some(&b'-') {
            let terminator = format!("{} ", code);
            loop {
                let line = self.read_line().await?;
                if line.starts_with(&terminator) {
                    text = line[4..].to_string();
                    break;
                }
            }
        }

        Ok(FtpReply { code, text })
    }

    async fn read_line(&mut self) -> crate::Result<String> {
        let mut line = String::new();
        let mut limited = (&mut self.reader).take(MAX_REPLY_LINE);
        let n = bounded(self.timeout, limited.read_line(&mut line)).await??;
        if n == 0 {
            return Err(ScanError::ProtocolError("connection closed".to_string()));
        }
        if n as u64 >= MAX_REPLY_LINE && !line.ends_with('\n') {
            return Err(ScanError::ResponseTooLarge(format!(
                "reply line from {} exceeds {} bytes",
                self.peer, MAX_REPLY_LINE
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

async fn bounded<F: Future>(timeout: Duration, fut: F) -> crate::Result<F::Output> {
    Ok(tokio::time::timeout(timeout, fut).await?)
}

fn parse_code(line: &str) -> crate::Result<u16> {
    line.get(..3)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| ScanError::ProtocolError(format!("malformed reply: {:?}", line)))
}

/// Extract the data port from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply
pub fn parse_pasv(text: &str) -> crate::Result<u16> {
    let inner = match (text.find('('), text.rfind(')')) {
        (Some(s), Some(e)) if s < e => &text[s + 1..e],
        _ => {
            // Some servers omit the parentheses: "=h1,h2,h3,h4,p1,p2"
            let trimmed = text.trim_end_matches(|c: char| !c.is_ascii_digit());
            let start = trimmed
                .rfind(|c: char| !(c.is_ascii_digit() || c == ','))
                .map_or(0, |i| i + 1);
            &trimmed[start..]
        }
    };

    let fields: Vec<u8> = inner
        .split(',')
        .map(|f| f.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| ScanError::ProtocolError(format!("malformed PASV reply: {}", text)))?;

    if fields.len() != 6 {
        return Err(ScanError::ProtocolError(format!(
            "malformed PASV reply: {}",
            text
        )));
    }

    Ok(u16::from(fields[4]) << 8 | u16::from(fields[5]))
}
