//! Line-based TCP front end for the SCPI processor.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;

use crate::arbiter::CommandArbiter;
use crate::link::Link;
use crate::scpi::ScpiProcessor;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5050";
pub const GREETING: &str = "WANPTEK SCPI Server Ready";
pub const FAREWELL: &str = "Goodbye";

/// Longest line a client may send, newline included.
pub const MAX_LINE_LEN: usize = 4096;

/// Accepts SCPI clients and serves each on its own thread.
pub struct ScpiServer<L: Link> {
    listener: TcpListener,
    arbiter: CommandArbiter<L>,
}

impl<L: Link + Send + 'static> ScpiServer<L> {
    pub fn bind(addr: impl ToSocketAddrs, arbiter: CommandArbiter<L>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener, arbiter })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients forever. A failed accept is logged and does not stop the loop.
    pub fn run(self) {
        match self.local_addr() {
            Ok(addr) => tracing::info!("SCPI server listening on {addr}"),
            Err(err) => tracing::warn!("SCPI server listening on unknown address: {err}"),
        }

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => self.spawn_client(stream),
                Err(err) => tracing::warn!("Error accepting connection: {err}"),
            }
        }
    }

    fn spawn_client(&self, stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let processor = ScpiProcessor::new(self.arbiter.clone());

        let client = peer.clone();
        let spawned = thread::Builder::new()
            .name(format!("scpi-{peer}"))
            .spawn(move || {
                let span = tracing::info_span!("client", peer = %client);
                let _enter = span.enter();
                tracing::info!("Client connected");
                match handle_client(stream, processor) {
                    Ok(()) => tracing::info!("Client disconnected"),
                    Err(err) => tracing::warn!("Client connection closed: {err}"),
                }
            });
        if let Err(err) = spawned {
            tracing::warn!("Could not start a thread for {peer}: {err}");
        }
    }
}

// TcpStream is moved in so the connection closes when we return.
fn handle_client<L: Link + Send + 'static>(
    stream: TcpStream,
    mut processor: ScpiProcessor<L>,
) -> io::Result<()> {
    let mut writer = &stream;
    let mut reader = BufReader::new(&stream);
    writer.write_all(format!("{GREETING}\n").as_bytes())?;

    let mut line = String::new();
    loop {
        line.clear();
        let read = (&mut reader)
            .take(MAX_LINE_LEN as u64)
            .read_line(&mut line)?;
        if !line.ends_with('\n') {
            if read == MAX_LINE_LEN {
                writer.write_all(b"ERROR: Line too long\n")?;
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line exceeds {MAX_LINE_LEN} bytes"),
                ));
            }
            // Peer hung up, possibly mid-line.
            return Ok(());
        }

        let command = line.trim();
        if command.eq_ignore_ascii_case("QUIT") || command.eq_ignore_ascii_case("EXIT") {
            writer.write_all(format!("{FAREWELL}\n").as_bytes())?;
            return Ok(());
        }
        if command.is_empty() {
            continue;
        }

        tracing::debug!("<- {command}");
        let reply = processor.process_line(command);
        if !reply.is_empty() {
            tracing::debug!("-> {reply}");
            writer.write_all(format!("{reply}\n").as_bytes())?;
        }
    }
}
