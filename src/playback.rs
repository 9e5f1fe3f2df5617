/*
 *  playback.rs
 *
 *  dacpanel - Boss2 front panel
 *  (c) 2024-26 dacpanel contributors
 *
 *  Playback client - MPD line protocol behind a self-healing wrapper
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UnixStream};

/// Commands that never get a liveness probe before they run. Probing
/// before a ping would just ping twice.
const PING_DENYLIST: &[&str] = &["ping"];

#[derive(Debug)]
pub enum PlaybackError {
    /// No live connection; transports return this before connect and
    /// after a detected drop.
    NotConnected,
    /// The server closed the connection under us.
    BrokenPipe,
    Io(io::Error),
    /// An ACK reply, or a malformed one.
    Protocol(String),
    /// The server never advertised this command.
    UnknownCommand(String),
    Handshake(String),
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackError::NotConnected => write!(f, "Not connected to player"),
            PlaybackError::BrokenPipe => write!(f, "Player connection broken"),
            PlaybackError::Io(e) => write!(f, "Player I/O error: {}", e),
            PlaybackError::Protocol(msg) => write!(f, "Player protocol error: {}", msg),
            PlaybackError::UnknownCommand(cmd) => {
                write!(f, "Command '{}' not offered by player", cmd)
            }
            PlaybackError::Handshake(line) => {
                write!(f, "Unexpected player greeting: {}", line)
            }
        }
    }
}

impl std::error::Error for PlaybackError {}

impl From<io::Error> for PlaybackError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe => PlaybackError::BrokenPipe,
            _ => PlaybackError::Io(e),
        }
    }
}

impl PlaybackError {
    /// Errors that just mean the old socket is already dead; safe to
    /// ignore while tearing down before a reconnect.
    pub fn is_disconnected_class(&self) -> bool {
        match self {
            PlaybackError::NotConnected => true,
            PlaybackError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, PlaybackError::BrokenPipe)
    }
}

/// The wire side of a playback connection. Implementations own the
/// socket; the reconnect policy lives in [`ReconnectingClient`].
pub trait PlaybackTransport: Send {
    fn connect(&mut self) -> impl std::future::Future<Output = Result<(), PlaybackError>> + Send;
    fn disconnect(&mut self) -> impl std::future::Future<Output = Result<(), PlaybackError>> + Send;
    fn ping(&mut self) -> impl std::future::Future<Output = Result<(), PlaybackError>> + Send;
    fn run(&mut self, command: &str)
        -> impl std::future::Future<Output = Result<(), PlaybackError>> + Send;
    fn commands(&mut self)
        -> impl std::future::Future<Output = Result<Vec<String>, PlaybackError>> + Send;
}

/// Wraps a transport with a ping-probe-then-reconnect policy: every
/// command first checks the link is alive and rebuilds it if not, then
/// runs exactly once. The command's own failure always surfaces.
pub struct ReconnectingClient<T> {
    transport: T,
    allowed: Vec<String>,
}

impl<T: PlaybackTransport> ReconnectingClient<T> {
    /// Connect and learn the server's command set up front so typos and
    /// permission-filtered commands fail locally.
    pub async fn connect(mut transport: T) -> Result<Self, PlaybackError> {
        transport.connect().await?;
        let allowed = transport.commands().await?;
        info!("player offers {} commands", allowed.len());
        Ok(Self { transport, allowed })
    }

    pub async fn invoke(&mut self, command: &str) -> Result<(), PlaybackError> {
        if !self.allowed.iter().any(|c| c == command) {
            return Err(PlaybackError::UnknownCommand(command.to_string()));
        }
        if !PING_DENYLIST.contains(&command) && self.transport.ping().await.is_err() {
            debug!("player probe failed before '{}', reconnecting", command);
            self.reconnect().await;
        }
        self.transport.run(command).await
    }

    /// Best-effort teardown and reconnect. A disconnect error on a
    /// socket that is already dead is expected; a broken pipe gets one
    /// more teardown attempt before we give up on being tidy.
    async fn reconnect(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            if e.is_broken_pipe() {
                if let Err(e2) = self.transport.disconnect().await {
                    warn!("player teardown failed twice: {}", e2);
                }
            } else if !e.is_disconnected_class() {
                warn!("player teardown failed: {}", e);
            }
        }
        if let Err(e) = self.transport.connect().await {
            warn!("player reconnect failed: {}", e);
        }
    }

    pub async fn next(&mut self) -> Result<(), PlaybackError> {
        self.invoke("next").await
    }

    pub async fn previous(&mut self) -> Result<(), PlaybackError> {
        self.invoke("previous").await
    }

    pub async fn pause(&mut self) -> Result<(), PlaybackError> {
        self.invoke("pause").await
    }
}

/// Where the MPD server lives. A socket path wins over host/port when
/// both are configured.
#[derive(Debug, Clone)]
pub enum MpdEndpoint {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl fmt::Display for MpdEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpdEndpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
            MpdEndpoint::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

enum MpdStream {
    Tcp(BufReader<TcpStream>),
    Unix(BufReader<UnixStream>),
}

impl MpdStream {
    async fn write_line(&mut self, line: &str) -> Result<(), PlaybackError> {
        let payload = format!("{}\n", line);
        match self {
            MpdStream::Tcp(s) => s.get_mut().write_all(payload.as_bytes()).await?,
            MpdStream::Unix(s) => s.get_mut().write_all(payload.as_bytes()).await?,
        }
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, PlaybackError> {
        let mut line = String::new();
        let n = match self {
            MpdStream::Tcp(s) => s.read_line(&mut line).await?,
            MpdStream::Unix(s) => s.read_line(&mut line).await?,
        };
        if n == 0 {
            return Err(PlaybackError::BrokenPipe);
        }
        Ok(line.trim_end().to_string())
    }
}

/// MPD line protocol: newline commands, replies terminated by "OK" or
/// an "ACK" error line.
pub struct MpdTransport {
    endpoint: MpdEndpoint,
    stream: Option<MpdStream>,
}

impl MpdTransport {
    pub fn new(endpoint: MpdEndpoint) -> Self {
        Self {
            endpoint,
            stream: None,
        }
    }

    fn stream(&mut self) -> Result<&mut MpdStream, PlaybackError> {
        self.stream.as_mut().ok_or(PlaybackError::NotConnected)
    }

    /// Send one command and collect data lines up to the terminator.
    async fn exchange(&mut self, command: &str) -> Result<Vec<String>, PlaybackError> {
        let stream = self.stream()?;
        stream.write_line(command).await?;
        let mut lines = Vec::new();
        loop {
            let line = stream.read_line().await?;
            if line == "OK" {
                return Ok(lines);
            }
            if line.starts_with("ACK") {
                return Err(PlaybackError::Protocol(line));
            }
            lines.push(line);
        }
    }
}

impl PlaybackTransport for MpdTransport {
    async fn connect(&mut self) -> Result<(), PlaybackError> {
        let mut stream = match &self.endpoint {
            MpdEndpoint::Tcp { host, port } => {
                MpdStream::Tcp(BufReader::new(TcpStream::connect((host.as_str(), *port)).await?))
            }
            MpdEndpoint::Unix(path) => {
                MpdStream::Unix(BufReader::new(UnixStream::connect(path).await?))
            }
        };
        let banner = stream.read_line().await?;
        if !banner.starts_with("OK MPD") {
            return Err(PlaybackError::Handshake(banner));
        }
        debug!("connected to player at {} ({})", self.endpoint, banner);
        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), PlaybackError> {
        let Some(mut stream) = self.stream.take() else {
            return Err(PlaybackError::NotConnected);
        };
        // "close" gets no reply, the server just drops the connection
        stream.write_line("close").await
    }

    async fn ping(&mut self) -> Result<(), PlaybackError> {
        self.exchange("ping").await.map(|_| ())
    }

    async fn run(&mut self, command: &str) -> Result<(), PlaybackError> {
        self.exchange(command).await.map(|_| ())
    }

    async fn commands(&mut self) -> Result<Vec<String>, PlaybackError> {
        let lines = self.exchange("commands").await?;
        Ok(lines
            .iter()
            .filter_map(|line| line.strip_prefix("command: "))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
pub use mock::{MockTransport, MockTransportState};

#[cfg(test)]
mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// What the next disconnect call should do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum DisconnectBehavior {
        Ok,
        BrokenPipeOnce,
        AlwaysBrokenPipe,
        StaleSocket,
    }

    #[derive(Debug)]
    pub struct MockTransportState {
        pub connects: usize,
        pub disconnects: usize,
        pub pings: usize,
        pub runs: Vec<String>,
        pub fail_next_ping: bool,
        pub disconnect_behavior: DisconnectBehavior,
        pub offered: Vec<String>,
    }

    impl Default for MockTransportState {
        fn default() -> Self {
            Self {
                connects: 0,
                disconnects: 0,
                pings: 0,
                runs: Vec::new(),
                fail_next_ping: false,
                disconnect_behavior: DisconnectBehavior::Ok,
                offered: ["next", "previous", "pause", "ping"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }
        }
    }

    /// In-memory transport recording every call.
    #[derive(Debug, Clone, Default)]
    pub struct MockTransport {
        state: Arc<Mutex<MockTransportState>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn state(&self) -> Arc<Mutex<MockTransportState>> {
            Arc::clone(&self.state)
        }
    }

    impl PlaybackTransport for MockTransport {
        async fn connect(&mut self) -> Result<(), PlaybackError> {
            self.state.lock().unwrap().connects += 1;
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), PlaybackError> {
            let mut state = self.state.lock().unwrap();
            state.disconnects += 1;
            match state.disconnect_behavior {
                DisconnectBehavior::Ok => Ok(()),
                DisconnectBehavior::BrokenPipeOnce => {
                    state.disconnect_behavior = DisconnectBehavior::Ok;
                    Err(PlaybackError::BrokenPipe)
                }
                DisconnectBehavior::AlwaysBrokenPipe => Err(PlaybackError::BrokenPipe),
                DisconnectBehavior::StaleSocket => Err(PlaybackError::NotConnected),
            }
        }

        async fn ping(&mut self) -> Result<(), PlaybackError> {
            let mut state = self.state.lock().unwrap();
            state.pings += 1;
            if state.fail_next_ping {
                state.fail_next_ping = false;
                return Err(PlaybackError::BrokenPipe);
            }
            Ok(())
        }

        async fn run(&mut self, command: &str) -> Result<(), PlaybackError> {
            self.state.lock().unwrap().runs.push(command.to_string());
            Ok(())
        }

        async fn commands(&mut self) -> Result<Vec<String>, PlaybackError> {
            Ok(self.state.lock().unwrap().offered.clone())
        }
    }
}
