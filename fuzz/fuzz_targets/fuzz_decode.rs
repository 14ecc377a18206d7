#![no_main]

use libfuzzer_sys::fuzz_target;
use voxel_protocol::protocol::codec::decode;
use voxel_protocol::Direction;

fuzz_target!(|data: &[u8]| {
    // First byte picks the version, the rest is a payload.
    let Some((&version, payload)) = data.split_first() else {
        return;
    };
    let version = u16::from(version % 32);
    let _ = decode(payload, Direction::ToServer, version);
    let _ = decode(payload, Direction::ToClient, version);
});
