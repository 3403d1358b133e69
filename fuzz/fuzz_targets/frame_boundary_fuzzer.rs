//! Fuzz target for frame decoding.
//!
//! # Strategy
//!
//! - Raw bytes straight into the header parser and both payload decoders
//! - Anything that decodes is re-encoded and decoded again
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - A decoded header never claims more than `MAX_PAYLOAD_SIZE`
//! - Decode of an encoded value yields the same value

#![no_main]

use gavel_proto::{decode_frame, encode_frame, FrameHeader, Reply, Request, MAX_PAYLOAD_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = FrameHeader::from_bytes(data) {
        assert!(header.payload_len() <= MAX_PAYLOAD_SIZE);
    }

    if let Ok(request) = decode_frame::<Request>(data) {
        let mut buf = Vec::new();
        encode_frame(&request, &mut buf).expect("decoded request re-encodes");
        let again: Request = decode_frame(&buf).expect("re-encoded request decodes");
        assert_eq!(request, again);
    }

    if let Ok(reply) = decode_frame::<Reply>(data) {
        let mut buf = Vec::new();
        encode_frame(&reply, &mut buf).expect("decoded reply re-encodes");
        let again: Reply = decode_frame(&buf).expect("re-encoded reply decodes");
        assert_eq!(reply, again);
    }
});
