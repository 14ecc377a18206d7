#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;
use voxel_protocol::core::codec::FrameCodec;
use voxel_protocol::Session;
use voxel_protocol::{VersionRange, WorldParams};

fuzz_target!(|data: &[u8]| {
    // Raw stream into a fresh server session.
    let mut codec = FrameCodec::new(64 * 1024);
    let mut buf = BytesMut::from(data);
    let Ok(range) = VersionRange::new(13, 23) else {
        return;
    };
    let mut session = Session::server(
        range,
        WorldParams { deployed: 25, seed: 0, step: 0.1, spawn: [0.0; 3] },
    );
    while let Ok(Some(packet)) = codec.decode(&mut buf) {
        if session.receive(&packet.payload).is_err() && session.is_closed() {
            break;
        }
    }
});
