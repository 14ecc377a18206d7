//! End-to-end tests of the async driver over in-memory streams.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
use voxel_protocol::config::{ProtocolConfig, PROTOCOL_ID};
use voxel_protocol::protocol::opcode::to_server;
use voxel_protocol::{
    Connection, Direction, Dispatcher, Message, ProtocolError, ToClientMessage, ToServerMessage,
    VersionRange, WorldParams,
};

fn world() -> WorldParams {
    WorldParams {
        deployed: 25,
        seed: 1234,
        step: 0.09,
        spawn: [0.0, 20.0, 0.0],
    }
}

#[tokio::test]
async fn test_handshake_and_exchange() {
    let (a, b) = duplex(64 * 1024);
    let config = ProtocolConfig::default();

    let server_config = config.clone();
    let server = tokio::spawn(async move {
        let mut conn = Connection::server(a, &server_config, world());
        let version = conn.handshake().await.unwrap();
        let msg = conn.recv().await.unwrap();
        conn.send(&ToClientMessage::ChatMessage { text: "welcome".into() }.into())
            .await
            .unwrap();
        (version, msg, conn.session().player_name().map(str::to_owned))
    });

    let mut client = Connection::client(b, &config, "alice", "").unwrap();
    assert_eq!(client.handshake().await.unwrap(), 23);
    assert_eq!(client.session().world().unwrap().seed, 1234);

    client
        .send(&ToServerMessage::ChatMessage { text: "hello".into() }.into())
        .await
        .unwrap();
    let reply = client.recv().await.unwrap();
    assert_eq!(reply, Message::from(ToClientMessage::ChatMessage { text: "welcome".into() }));

    let (version, msg, player) = server.await.unwrap();
    assert_eq!(version, 23);
    assert_eq!(msg, Message::from(ToServerMessage::ChatMessage { text: "hello".into() }));
    assert_eq!(player.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_incompatible_client_receives_farewell() {
    let (a, b) = duplex(64 * 1024);
    let config = ProtocolConfig::default();
    let old = ProtocolConfig::default_with_overrides(|c| {
        c.client.versions = VersionRange { min: 5, max: 12 };
    });

    let server = tokio::spawn(async move {
        let mut conn = Connection::server(a, &config, world());
        conn.handshake().await
    });

    let mut client = Connection::client(b, &old, "oldtimer", "").unwrap();
    let err = client.handshake().await.unwrap_err();
    match err {
        ProtocolError::AccessDenied(reason) => assert!(reason.contains("[13, 23]")),
        other => panic!("expected access denied, got {other:?}"),
    }

    assert!(matches!(
        server.await.unwrap(),
        Err(ProtocolError::IncompatibleVersion { .. })
    ));
}

#[tokio::test]
async fn test_run_dispatches_until_peer_hangs_up() {
    let (a, b) = duplex(64 * 1024);
    let config = ProtocolConfig::default();

    let dispatcher = Dispatcher::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    dispatcher
        .register(Direction::ToServer, to_server::DAMAGE, move |msg| {
            log.lock().unwrap().push(msg);
            Ok(())
        })
        .unwrap();

    let server_config = config.clone();
    let server = tokio::spawn(async move {
        let mut conn = Connection::server(a, &server_config, world());
        conn.handshake().await?;
        conn.run(&dispatcher).await
    });

    let mut client = Connection::client(b, &config, "bob", "").unwrap();
    client.handshake().await.unwrap();
    for amount in 1..=3 {
        client
            .send(&ToServerMessage::Damage { amount }.into())
            .await
            .unwrap();
    }
    client.send(&ToServerMessage::Respawn.into()).await.unwrap();
    client.close().await.unwrap();

    server.await.unwrap().unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2], Message::from(ToServerMessage::Damage { amount: 3 }));
}

#[tokio::test]
async fn test_premature_traffic_closes_connection() {
    let (a, mut b) = duplex(64 * 1024);
    let config = ProtocolConfig::default();

    let server = tokio::spawn(async move {
        let mut conn = Connection::server(a, &config, world());
        conn.handshake().await
    });

    // A scripted peer that skips the handshake and sends PlayerPos.
    let mut raw = PROTOCOL_ID.to_be_bytes().to_vec();
    let body = [0x00, 0x23, 0, 0, 0, 0];
    raw.extend_from_slice(&(body.len() as u32).to_be_bytes());
    raw.extend_from_slice(&body);
    b.write_all(&raw).await.unwrap();

    assert!(matches!(
        server.await.unwrap(),
        Err(ProtocolError::PrematureMessage { .. })
    ));
}

#[tokio::test]
async fn test_foreign_protocol_rejected() {
    let (a, mut b) = duplex(1024);
    let config = ProtocolConfig::default();

    let server = tokio::spawn(async move {
        let mut conn = Connection::server(a, &config, world());
        conn.handshake().await
    });

    b.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    assert!(matches!(
        server.await.unwrap(),
        Err(ProtocolError::ProtocolMismatch(_))
    ));
}

#[tokio::test]
async fn test_malformed_message_is_skipped() {
    let (a, mut b) = duplex(64 * 1024);
    let config = ProtocolConfig::default();

    let server = tokio::spawn(async move {
        let mut conn = Connection::server(a, &config, world());
        conn.handshake().await.unwrap();
        let msg = conn.recv().await;
        (msg, conn.hostile_count(), conn.session().is_closed())
    });

    let frame = |body: &[u8]| {
        let mut out = (body.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(body);
        out
    };
    let mut init = vec![0x00, 0x10, 25];
    init.extend_from_slice(b"raw");
    init.extend_from_slice(&[0; 17 + 28]);
    init.extend_from_slice(&[0, 13, 0, 23]);

    let mut raw = PROTOCOL_ID.to_be_bytes().to_vec();
    raw.extend(frame(&init));
    raw.extend(frame(&[0x00, 0x11]));
    // Unknown opcode, then a chat whose length overruns, then a good one.
    raw.extend(frame(&[0x7f, 0x7f, 1, 2, 3]));
    raw.extend(frame(&[0x00, 0x32, 0x10, 0x00, b'x']));
    raw.extend(frame(&[0x00, 0x32, 0x00, 0x02, b'o', b'k']));
    b.write_all(&raw).await.unwrap();

    // Drain the server's preamble and Init reply so it never blocks.
    let mut sink = vec![0u8; 256];
    let _ = b.read(&mut sink).await.unwrap();

    let (msg, hostile, closed) = server.await.unwrap();
    assert_eq!(msg.unwrap(), Message::from(ToServerMessage::ChatMessage { text: "ok".into() }));
    // Only the overrunning chat counts against the peer; the session stays open.
    assert_eq!(hostile, 1);
    assert!(!closed);
}

#[tokio::test]
async fn test_handshake_timeout() {
    let (a, _b) = duplex(1024);
    let config = ProtocolConfig::default_with_overrides(|c| {
        c.server.handshake_timeout = Duration::from_millis(100);
    });
    let mut conn = Connection::server(a, &config, world());
    assert!(matches!(
        conn.handshake().await,
        Err(ProtocolError::HandshakeError(_))
    ));
}
