//! Async presence worker. A dropped connection is a vanished bus name.

use std::io;
use std::net::SocketAddr;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::handles::validate_holder_name;

use super::protocol::{decode_name, FrameHeader, FrameKind};

/// Presence listener configuration.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Local TCP bind address for client registration.
    pub tcp_bind: SocketAddr,
    /// Command/event channel depth.
    pub channel_depth: usize,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            tcp_bind: "127.0.0.1:5298".parse().unwrap(),
            channel_depth: 1024,
        }
    }
}

/// Commands sent to the presence worker.
#[derive(Debug)]
pub enum PresenceCommand {
    /// Stop accepting clients and exit.
    Shutdown,
}

/// Events received from the bus.
#[derive(Debug)]
pub enum PresenceEvent {
    /// A client registered its bus name.
    NameAppeared { name: String, peer: SocketAddr },
    /// A client departed or its connection died. The owner of the handle
    /// repositories applies this via `release_all(&name)`.
    NameVanished { name: String },
    /// Listener or protocol error.
    Error { message: String },
}

/// Async presence worker handle.
pub struct PresenceWorker {
    command_tx: mpsc::Sender<PresenceCommand>,
    event_rx: mpsc::Receiver<PresenceEvent>,
    local_addr: SocketAddr,
}

impl PresenceWorker {
    /// Bind the listener and spawn the worker on the Tokio runtime.
    pub async fn spawn(config: PresenceConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(config.tcp_bind).await?;
        let local_addr = listener.local_addr()?;
        let (command_tx, command_rx) = mpsc::channel(config.channel_depth);
        let (event_tx, event_rx) = mpsc::channel(config.channel_depth);

        tokio::spawn(run(listener, command_rx, event_tx));

        Ok(Self {
            command_tx,
            event_rx,
            local_addr,
        })
    }

    /// The bound listener address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive the next presence event.
    pub async fn recv(&mut self) -> Option<PresenceEvent> {
        self.event_rx.recv().await
    }

    /// Ask the worker to exit. True iff it was still running.
    pub async fn shutdown(&self) -> bool {
        self.command_tx.send(PresenceCommand::Shutdown).await.is_ok()
    }
}

async fn run(
    listener: TcpListener,
    mut command_rx: mpsc::Receiver<PresenceCommand>,
    event_tx: mpsc::Sender<PresenceEvent>,
) {
    loop {
        tokio::select! {
            cmd = command_rx.recv() => match cmd {
                Some(PresenceCommand::Shutdown) | None => break,
            },
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(watch_client(stream, peer, event_tx.clone()));
                }
                Err(e) => {
                    let _ = event_tx
                        .send(PresenceEvent::Error { message: e.to_string() })
                        .await;
                }
            },
        }
    }
}

async fn watch_client(
    mut stream: TcpStream,
    peer: SocketAddr,
    event_tx: mpsc::Sender<PresenceEvent>,
) {
    let name = match read_hello(&mut stream).await {
        Ok(name) => name,
        Err(message) => {
            let _ = event_tx.send(PresenceEvent::Error { message }).await;
            return;
        }
    };
    let _ = event_tx
        .send(PresenceEvent::NameAppeared {
            name: name.clone(),
            peer,
        })
        .await;

    // Every exit from the frame loop counts as disappearance: clean Bye,
    // EOF, protocol garbage, or a dead socket.
    loop {
        match read_frame(&mut stream).await {
            Ok(Some((FrameKind::Ping, _))) => {}
            Ok(Some(_)) | Ok(None) | Err(_) => break,
        }
    }
    let _ = event_tx.send(PresenceEvent::NameVanished { name }).await;
}

async fn read_hello(stream: &mut TcpStream) -> Result<String, String> {
    match read_frame(stream).await {
        Ok(Some((FrameKind::Hello, name))) => {
            if validate_holder_name(&name).is_err() {
                return Err(format!("malformed bus name in hello: {name:?}"));
            }
            Ok(name)
        }
        Ok(_) => Err("client did not say hello".to_owned()),
        Err(e) => Err(e),
    }
}

/// One frame off the wire. `Ok(None)` on clean EOF.
async fn read_frame(stream: &mut TcpStream) -> Result<Option<(FrameKind, String)>, String> {
    let mut header_buf = [0u8; FrameHeader::SIZE];
    if let Err(e) = stream.read_exact(&mut header_buf).await {
        return if e.kind() == io::ErrorKind::UnexpectedEof {
            Ok(None)
        } else {
            Err(e.to_string())
        };
    }
    let header = match FrameHeader::from_bytes(&header_buf) {
        Some(h) => h,
        None => return Err("short frame header".to_owned()),
    };
    let kind = header.validate().map_err(|e| format!("bad frame: {e:?}"))?;

    let mut name_buf = vec![0u8; header.name_len() as usize];
    stream
        .read_exact(&mut name_buf)
        .await
        .map_err(|e| e.to_string())?;
    let name = decode_name(&header, &name_buf).map_err(|e| format!("bad frame: {e:?}"))?;
    Ok(Some((kind, name.to_owned())))
}
