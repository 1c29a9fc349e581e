//! Frame-level golden bytes and framing guards.

use p92000e::{
    write_request, write_response, Decoder, DirListingWriter, Encoder, Error, MessageHeader,
    MessageType, Parser, Qid, QidType, Request, Response, Stat, NOTAG, VERSION_UNKNOWN,
};

#[test]
fn version_request_golden_bytes() {
    let request = Request::Version {
        msize: 8192,
        version: "9P2000.e",
    };

    let mut buf = [0u8; 64];
    let mut enc = Encoder::new(&mut buf);
    let size = write_request(&mut enc, NOTAG, &request).unwrap();
    assert_eq!(size, 19);

    let expected = [
        0x13, 0x00, 0x00, 0x00, // size = 19
        0x64, // TVersion
        0xff, 0xff, // NOTAG
        0x00, 0x20, 0x00, 0x00, // msize = 8192
        0x08, 0x00, // len("9P2000.e")
        0x39, 0x50, 0x32, 0x30, 0x30, 0x30, 0x2e, 0x65,
    ];
    assert_eq!(enc.written(), &expected[..]);

    let parser = Parser::default();
    let mut dec = Decoder::new(enc.written());
    let header = parser.parse_header(&mut dec).unwrap();
    assert_eq!(header.size, 19);
    assert_eq!(header.typ, MessageType::TVersion);
    assert_eq!(header.tag, NOTAG);
    assert_eq!(parser.parse_request(header, &mut dec).unwrap(), request);
}

#[test]
fn walk_reply_with_two_qids() {
    let response = Response::Walk {
        wqids: vec![
            Qid {
                typ: QidType::DIR,
                version: 1,
                path: 100,
            },
            Qid {
                typ: QidType::FILE,
                version: 2,
                path: 200,
            },
        ],
    };

    let mut buf = [0u8; 64];
    let mut enc = Encoder::new(&mut buf);
    let size = write_response(&mut enc, 7, &response).unwrap();

    // size[4] type[1] tag[2] nqids[2] qid[13] qid[13]
    assert_eq!(size, 35);
    assert_eq!(&enc.written()[..4], &35u32.to_le_bytes());
    assert_eq!(&enc.written()[7..9], &[0x02, 0x00]);

    let parser = Parser::default();
    let mut dec = Decoder::new(enc.written());
    let header = parser.parse_header(&mut dec).unwrap();
    assert_eq!(header.tag, 7);
    assert_eq!(parser.parse_response(header, &mut dec).unwrap(), response);
}

#[test]
fn truncated_header_is_ill_formed() {
    let parser = Parser::default();
    for len in 0..7 {
        let bytes = vec![0xfe; len];
        assert_eq!(
            parser.parse_header(&mut Decoder::new(&bytes)),
            Err(Error::IllFormedHeader)
        );
    }
}

#[test]
fn frame_size_below_header_is_rejected() {
    let bytes = [0x05, 0x00, 0x00, 0x00, 0x64, 0x00, 0x00];
    let parser = Parser::default();
    assert_eq!(
        parser.parse_header(&mut Decoder::new(&bytes)),
        Err(Error::FrameTooShort)
    );
}

#[test]
fn frame_over_negotiated_size_is_rejected() {
    let mut parser = Parser::default();
    assert_eq!(parser.set_max_negotiated_message_size(256), 256);

    // declared size 4096 against a 256 byte session limit
    let bytes = [0x00, 0x10, 0x00, 0x00, 0x64, 0x00, 0x00];
    assert_eq!(
        parser.parse_header(&mut Decoder::new(&bytes)),
        Err(Error::TooBig)
    );
}

#[test]
fn unknown_message_types_are_rejected() {
    let parser = Parser::default();
    for code in [0u8, 99, 106, 128, 149, 156, 200, 255] {
        let bytes = [0x07, 0x00, 0x00, 0x00, code, 0x00, 0x00];
        assert_eq!(
            parser.parse_header(&mut Decoder::new(&bytes)),
            Err(Error::UnsupportedMessageType(code))
        );
    }
}

#[test]
fn payload_length_must_match_header_exactly() {
    // TClunk tag=1 fid=42
    let frame = [
        0x0b, 0x00, 0x00, 0x00, 0x78, 0x01, 0x00, 0x2a, 0x00, 0x00, 0x00,
    ];
    let parser = Parser::default();

    let mut dec = Decoder::new(&frame);
    let header = parser.parse_header(&mut dec).unwrap();
    assert_eq!(header.payload_size(), 4);

    let mut short = Decoder::new(&frame[7..10]);
    assert_eq!(
        parser.parse_request(header, &mut short),
        Err(Error::NotEnoughData)
    );

    let extended: Vec<u8> = frame[7..].iter().copied().chain([0u8]).collect();
    let mut long = Decoder::new(&extended);
    assert_eq!(
        parser.parse_request(header, &mut long),
        Err(Error::MoreThenExpectedData)
    );

    assert_eq!(
        parser.parse_request(header, &mut dec).unwrap(),
        Request::Clunk { fid: 42 }
    );
}

#[test]
fn oversized_header_is_rejected_before_the_payload() {
    let parser = Parser::default();
    let header = MessageHeader {
        size: 9000,
        typ: MessageType::TClunk,
        tag: 0,
    };
    let payload = [0u8; 4];
    assert_eq!(
        parser.parse_request(header, &mut Decoder::new(&payload)),
        Err(Error::TooBig)
    );
    assert_eq!(
        parser.parse_response(header, &mut Decoder::new(&payload)),
        Err(Error::TooBig)
    );
}

#[test]
fn request_entry_point_rejects_response_codes() {
    let parser = Parser::default();
    let header = MessageHeader {
        size: 7,
        typ: MessageType::RFlush,
        tag: 0,
    };
    assert_eq!(
        parser.parse_request(header, &mut Decoder::new(&[])),
        Err(Error::UnsupportedMessageType(MessageType::RFlush as u8))
    );

    let header = MessageHeader {
        size: 7,
        typ: MessageType::TFlush,
        tag: 0,
    };
    assert_eq!(
        parser.parse_response(header, &mut Decoder::new(&[])),
        Err(Error::UnsupportedMessageType(MessageType::TFlush as u8))
    );
}

#[test]
fn walk_reply_qid_cap_is_enforced_on_decode() {
    // RWalk with 17 qids: size = 7 + 2 + 17 * 13 = 230
    let mut frame = vec![0xe6, 0x00, 0x00, 0x00, 0x6f, 0x01, 0x00, 17, 0x00];
    frame.resize(230, 0);

    let parser = Parser::default();
    let mut dec = Decoder::new(&frame);
    let header = parser.parse_header(&mut dec).unwrap();
    assert_eq!(
        parser.parse_response(header, &mut dec),
        Err(Error::TooManyWalkElements)
    );
}

#[test]
fn directory_window_selects_whole_records() {
    // three records of encoded lengths 50, 60 and 70 bytes
    let first = Stat {
        name: "a",
        ..Default::default()
    };
    let second = Stat {
        name: "abcdefghijk",
        ..Default::default()
    };
    let third = Stat {
        name: "abcdefghijklmnopqrstu",
        ..Default::default()
    };
    assert_eq!(2 + first.size(), 50);
    assert_eq!(2 + second.size(), 60);
    assert_eq!(2 + third.size(), 70);

    let mut buf = [0u8; 256];
    let mut enc = Encoder::new(&mut buf);
    let mut writer = DirListingWriter::new(&mut enc, 60, 50);

    assert!(writer.encode(&first).unwrap());
    assert!(writer.encode(&second).unwrap());
    assert!(!writer.encode(&third).unwrap());

    assert_eq!(writer.bytes_traversed(), 110);
    assert_eq!(writer.bytes_encoded(), 60);
    drop(writer);

    // exactly the second record was emitted
    let mut dec = Decoder::new(enc.written());
    let emitted: Stat<'_> = dec.decode().unwrap();
    assert_eq!(emitted, second);
    assert_eq!(dec.remaining(), 0);
}

#[test]
fn directory_window_never_splits_a_straddling_record() {
    let stat = Stat {
        name: "a",
        ..Default::default()
    };

    // offset falls inside the first record
    let mut buf = [0u8; 256];
    let mut enc = Encoder::new(&mut buf);
    let mut writer = DirListingWriter::new(&mut enc, 4096, 25);

    assert!(writer.encode(&stat).unwrap());
    assert_eq!(writer.bytes_encoded(), 0);
    assert_eq!(writer.bytes_traversed(), 50);

    // the next record starts past the offset and is emitted whole
    assert!(writer.encode(&stat).unwrap());
    assert_eq!(writer.bytes_encoded(), 50);
    assert_eq!(writer.bytes_traversed(), 100);
}

#[test]
fn negotiation_clamps_to_configured_maximum() {
    let mut parser = Parser::new(8192, "9P2000.e");
    assert_eq!(parser.max_possible_message_size(), 8192);
    assert_eq!(parser.max_negotiated_message_size(), 8192);

    assert_eq!(parser.set_max_negotiated_message_size(16384), 8192);
    assert_eq!(parser.set_max_negotiated_message_size(512), 512);
    assert_eq!(parser.max_negotiated_message_size(), 512);
    assert_eq!(parser.set_max_negotiated_message_size(16384), 8192);
    assert_eq!(parser.max_possible_message_size(), 8192);
}

#[test]
fn version_negotiation_state() {
    let mut parser = Parser::default();
    assert_eq!(parser.initial_version(), "9P2000.e");
    assert_eq!(parser.negotiated_version(), "9P2000.e");

    parser.set_negotiated_version(VERSION_UNKNOWN);
    assert_eq!(parser.negotiated_version(), "unknown");
    assert_eq!(parser.initial_version(), "9P2000.e");
}

#[test]
fn frames_are_carved_from_a_concatenated_stream() {
    let mut buf = [0u8; 128];
    let mut enc = Encoder::new(&mut buf);
    write_request(&mut enc, 1, &Request::Clunk { fid: 7 }).unwrap();
    write_request(&mut enc, 2, &Request::Flush { oldtag: 1 }).unwrap();

    let parser = Parser::default();
    let mut stream = Decoder::new(enc.written());

    let (header, mut payload) = parser.next_frame(&mut stream).unwrap();
    assert_eq!(header.tag, 1);
    assert_eq!(
        parser.parse_request(header, &mut payload).unwrap(),
        Request::Clunk { fid: 7 }
    );

    let (header, mut payload) = parser.next_frame(&mut stream).unwrap();
    assert_eq!(header.tag, 2);
    assert_eq!(
        parser.parse_request(header, &mut payload).unwrap(),
        Request::Flush { oldtag: 1 }
    );

    assert_eq!(stream.remaining(), 0);
}

#[test]
fn next_frame_requires_the_whole_payload() {
    let mut buf = [0u8; 64];
    let mut enc = Encoder::new(&mut buf);
    write_request(&mut enc, 1, &Request::Clunk { fid: 7 }).unwrap();

    let parser = Parser::default();
    let truncated = &enc.written()[..enc.written().len() - 1];
    assert_eq!(
        parser.next_frame(&mut Decoder::new(truncated)).map(|_| ()),
        Err(Error::NotEnoughData)
    );
}
