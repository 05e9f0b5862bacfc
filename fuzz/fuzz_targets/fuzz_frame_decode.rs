//! Fuzz target: `frame::decode`
//!
//! Feeds arbitrary vendor-data bytes to the frame decoder and asserts that
//! it never panics, that accepted frames carry one of the three known tags,
//! and that re-encoding an accepted frame reproduces the input.
//!
//! cargo fuzz run fuzz_frame_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use tempnode::frame::{self, FrameTag, HEADER_SIZE, MAX_PAYLOAD_LEN};

fuzz_target!(|data: &[u8]| {
    let Ok((tag, payload)) = frame::decode(data) else {
        return;
    };

    assert!(FrameTag::ALL.contains(&tag), "decoder yielded an unknown tag");
    assert_eq!(payload.len() + HEADER_SIZE, data.len());

    if payload.len() <= MAX_PAYLOAD_LEN {
        let encoded = frame::encode(tag, payload).expect("payload fits");
        assert_eq!(encoded.as_slice(), data);
    }
});
