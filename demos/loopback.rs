//! Example: server and client over a local TCP socket
//!
//! Starts a server on an ephemeral port, connects a client, negotiates a
//! version and exchanges a few messages.
//!
//! Run with: `cargo run --example loopback`

use tokio::net::TcpListener;
use voxel_protocol::config::ProtocolConfig;
use voxel_protocol::protocol::opcode::to_server;
use voxel_protocol::utils::logging::init_logging;
use voxel_protocol::utils::metrics::{global_metrics, init_metrics};
use voxel_protocol::{
    Connection, Direction, Dispatcher, Message, ToClientMessage, ToServerMessage, WorldParams,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ProtocolConfig::from_env()?;
    config.validate_strict()?;
    init_logging(&config.logging)?;
    init_metrics();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    println!("Listening on {addr}");

    let server_config = config.clone();
    let server = tokio::spawn(async move {
        let (stream, peer) = listener.accept().await?;
        println!("Accepted {peer}");

        let world = WorldParams {
            deployed: server_config.server.deployed_ser_fmt,
            seed: 0x5eed,
            step: 0.09,
            spawn: [0.0, 12.0, 0.0],
        };
        let mut conn = Connection::server(stream, &server_config, world);
        let version = conn.handshake().await?;
        println!("Server negotiated version {version}");

        conn.send(&ToClientMessage::TimeOfDay { time: 6000, speed: 72.0 }.into())
            .await?;
        conn.send(&ToClientMessage::ChatMessage { text: "Welcome!".into() }.into())
            .await?;

        let dispatcher = Dispatcher::new();
        dispatcher.register(Direction::ToServer, to_server::CHAT_MESSAGE, |msg| {
            println!("Server got: {msg:?}");
            Ok(())
        })?;
        dispatcher.set_fallback(|msg| {
            println!("Server ignored {}", msg.name());
            Ok(())
        })?;
        conn.run(&dispatcher).await?;
        Ok::<_, voxel_protocol::ProtocolError>(())
    });

    let stream = tokio::net::TcpStream::connect(addr).await?;
    let mut client = Connection::client(stream, &config, "demo_player", "")?;
    let version = client.handshake().await?;
    println!("Client negotiated version {version}");

    for _ in 0..2 {
        match client.recv().await? {
            Message::ToClient(msg) => println!("Client got: {msg:?}"),
            other => println!("Client got unexpected {other:?}"),
        }
    }

    client
        .send(&ToServerMessage::ChatMessage { text: "hello from the client".into() }.into())
        .await?;
    client.send(&ToServerMessage::Respawn.into()).await?;
    client.close().await?;

    server.await??;
    global_metrics().log_metrics();
    Ok(())
}
