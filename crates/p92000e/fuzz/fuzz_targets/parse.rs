#![no_main]
//! Fuzz target for the wire framing and message parser.
//!
//! Feeds arbitrary bytes through `Parser::parse_header` and, when a header
//! validates, through the matching payload entry point. Framing errors are
//! the expected outcome for most inputs; the invariant under test is that
//! no input can cause a panic, unbounded allocation, or an out-of-bounds
//! read of the input buffer.

use libfuzzer_sys::fuzz_target;
use p92000e::{Decoder, Parser};

fuzz_target!(|data: &[u8]| {
    let parser = Parser::default();
    let mut cursor = Decoder::new(data);

    let header = match parser.parse_header(&mut cursor) {
        Ok(header) => header,
        Err(_) => return, // expected for most fuzz inputs
    };

    if header.typ.is_t() {
        let _ = parser.parse_request(header, &mut cursor);
    } else {
        let _ = parser.parse_response(header, &mut cursor);
    }
});
