//! Bus-driven cleanup: a client registers, pins handles, and dies; the
//! presence worker's vanish event releases everything it held.
//!
//! Run with: cargo run --example presence --features networking

use mantle::bus::{encode_frame, FrameKind, PresenceConfig, PresenceEvent, PresenceWorker};
use mantle::{DynamicRepo, HandleType};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    // 1. Spawn the presence worker on a loopback port.
    let config = PresenceConfig {
        tcp_bind: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    };
    let mut worker = PresenceWorker::spawn(config).await?;
    let addr = worker.local_addr();
    println!("presence listener on {addr}");

    // 2. The connection's contact repository.
    let mut contacts = DynamicRepo::new(HandleType::Contact);

    // 3. A client registers its bus name, then abruptly drops the socket.
    tokio::spawn(async move {
        let mut client = TcpStream::connect(addr).await?;
        client
            .write_all(&encode_frame(FrameKind::Hello, ":1.42"))
            .await?;
        client.write_all(&encode_frame(FrameKind::Ping, "")).await?;
        // No Bye: simulate a crash.
        Ok::<(), std::io::Error>(())
    });

    // 4. The event loop: pin handles on appearance, release on vanish.
    while let Some(event) = worker.recv().await {
        match event {
            PresenceEvent::NameAppeared { name, peer } => {
                println!("client {name} appeared from {peer}");
                let alice = contacts.request("alice@example.com", true).unwrap();
                let bob = contacts.request("bob@example.com", true).unwrap();
                contacts
                    .hold_batch(&name, &[alice.get(), bob.get()])
                    .expect("fresh handles are valid");
                println!("{name} now holds {} handles", contacts.held_by(&name).unwrap().len());
            }
            PresenceEvent::NameVanished { name } => {
                let released = contacts.release_all(&name);
                println!(
                    "client {name} vanished, released {} handle(s), {} live",
                    released.map_or(0, |s| s.len()),
                    contacts.live_handles()
                );
                break;
            }
            PresenceEvent::Error { message } => {
                eprintln!("presence error: {message}");
            }
        }
    }

    worker.shutdown().await;
    Ok(())
}
