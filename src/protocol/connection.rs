//! Framed TCP connection carrying protocol lines.
//!
//! Wraps `Framed<TcpStream, LineCodec>` and adds the request/reply helpers
//! used on both sides: servers read requests with `read_request`, clients
//! issue commands with `call` and `fetch_listing`.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use super::codec::{Frame, LineCodec};
use super::{Command, LIST_END, LIST_START, MAX_LINE_LENGTH, parse_status, unescape_content};
use crate::error::{DfsError, Result};

pub struct Connection {
    framed: Framed<TcpStream, LineCodec>,
    peer: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr()?;
        Ok(Self {
            framed: Framed::new(stream, LineCodec::new(MAX_LINE_LENGTH)),
            peer,
        })
    }

    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::new(stream)
    }

    /// Connects with exponential backoff and jitter between attempts.
    pub async fn connect_with_retry(addr: &str, attempts: usize) -> Result<Self> {
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Self::new(stream),
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(e.into());
                    }
                    tracing::warn!(
                        "Connect to {} failed (attempt {}/{}): {}",
                        addr,
                        attempt + 1,
                        attempts,
                        e
                    );
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(DfsError::Connection("Retry attempts exhausted".to_string()))
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sends all lines as one logical message.
    pub async fn send_lines<I>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        for line in lines {
            self.framed.feed(line).await?;
        }
        SinkExt::<String>::flush(&mut self.framed).await?;
        Ok(())
    }

    /// Next line, or `None` once the peer has closed the stream.
    ///
    /// An oversized line yields `LineTooLong`; it has been consumed and the
    /// connection stays usable.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        match self.framed.next().await {
            Some(Ok(Frame::Line(line))) => Ok(Some(line)),
            Some(Ok(Frame::Oversized)) => Err(DfsError::LineTooLong),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    pub async fn expect_line(&mut self) -> Result<String> {
        self.read_line()
            .await?
            .ok_or_else(|| DfsError::Connection(format!("{} closed the connection", self.peer)))
    }

    /// Reads one request: a non-empty header line plus, for `UPDATE`, its
    /// unescaped content line.
    pub async fn read_request(&mut self) -> Result<Option<(String, Option<String>)>> {
        loop {
            let Some(line) = self.read_line().await? else {
                return Ok(None);
            };
            let header = line.trim().to_string();
            if header.is_empty() {
                continue;
            }

            let body = if Command::has_body(&header) {
                Some(unescape_content(&self.expect_line().await?))
            } else {
                None
            };
            return Ok(Some((header, body)));
        }
    }

    /// Sends a command and returns the payload of its `OK` status line.
    pub async fn call(&mut self, command: &Command) -> Result<String> {
        self.send_lines(command.to_lines()).await?;
        let status = self.expect_line().await?;
        parse_status(&status).map(str::to_string)
    }

    /// Sends `LIST` and collects the lines between the listing markers.
    pub async fn fetch_listing(&mut self) -> Result<Vec<String>> {
        self.send_lines(Command::List.to_lines()).await?;

        let first = self.expect_line().await?;
        if first != LIST_START {
            return Err(DfsError::from_reply(&first));
        }

        let mut lines = Vec::new();
        loop {
            let line = self.expect_line().await?;
            if line == LIST_END {
                return Ok(lines);
            }
            lines.push(line);
        }
    }
}
