//! Property-based tests for codec invariants.

use proptest::prelude::*;

use p92000e::{
    write_request, Decoder, DirListingWriter, Encoder, Error, Parser, Qid, QidType, Request, Stat,
    P92000E, NOTAG,
};

proptest! {
    /// Property: a version request survives an encode/parse round trip
    /// bit-exactly, and the frame size field accounts for every byte.
    #[test]
    fn version_request_round_trips(msize in any::<u32>(), version in "[ -~]{0,64}") {
        let request = Request::Version { msize, version: &version };

        let mut buf = [0u8; 256];
        let mut enc = Encoder::new(&mut buf);
        let size = write_request(&mut enc, NOTAG, &request).unwrap();
        prop_assert_eq!(size as usize, enc.written().len());

        let parser = Parser::default();
        let mut dec = Decoder::new(enc.written());
        let header = parser.parse_header(&mut dec).unwrap();
        prop_assert_eq!(header.size, size);
        prop_assert_eq!(parser.parse_request(header, &mut dec).unwrap(), request);
    }

    /// Property: a stat record's self-size prefix always equals the encoded
    /// record length minus the two prefix bytes, and decoding restores the
    /// record exactly.
    #[test]
    fn stat_records_round_trip(
        typ in any::<u16>(),
        dev in any::<u32>(),
        qid_typ in any::<u8>(),
        qid_version in any::<u32>(),
        qid_path in any::<u64>(),
        mode in any::<u32>(),
        atime in any::<u32>(),
        mtime in any::<u32>(),
        length in any::<u64>(),
        name in "[ -~]{0,24}",
        uid in "[ -~]{0,24}",
        gid in "[ -~]{0,24}",
        muid in "[ -~]{0,24}",
    ) {
        let stat = Stat {
            typ,
            dev,
            qid: Qid {
                typ: QidType::from_bits_retain(qid_typ),
                version: qid_version,
                path: qid_path,
            },
            mode,
            atime,
            mtime,
            length,
            name: &name,
            uid: &uid,
            gid: &gid,
            muid: &muid,
        };

        let mut buf = [0u8; 512];
        let mut enc = Encoder::new(&mut buf);
        enc.encode(&stat).unwrap();

        let record = enc.written();
        prop_assert_eq!(
            u16::from_le_bytes([record[0], record[1]]) as usize,
            record.len() - 2
        );

        let mut dec = Decoder::new(record);
        let decoded: Stat<'_> = dec.decode().unwrap();
        prop_assert_eq!(decoded, stat);
        prop_assert_eq!(dec.remaining(), 0);
    }

    /// Property: any input shorter than a header is rejected as ill-formed.
    #[test]
    fn short_header_inputs_are_ill_formed(data in prop::collection::vec(any::<u8>(), 0..7)) {
        let parser = Parser::default();
        prop_assert_eq!(
            parser.parse_header(&mut Decoder::new(&data)),
            Err(Error::IllFormedHeader)
        );
    }

    /// Property: the negotiated message size is the requested size clamped
    /// to the configured maximum, no matter the call sequence.
    #[test]
    fn negotiated_size_never_exceeds_configured(
        configured in 7u32..=1_000_000,
        requests in prop::collection::vec(any::<u32>(), 1..8),
    ) {
        let mut parser = Parser::new(configured, P92000E);
        for requested in requests {
            let effective = parser.set_max_negotiated_message_size(requested);
            prop_assert_eq!(effective, requested.min(configured));
            prop_assert_eq!(parser.max_negotiated_message_size(), effective);
        }
    }

    /// Property: the directory listing writer never emits more than `count`
    /// bytes, never traverses more than the whole listing, and its encoded
    /// counter matches the bytes actually written.
    #[test]
    fn listing_window_accounts_every_byte(
        names in prop::collection::vec("[a-z]{1,20}", 1..8),
        offset in 0u64..400,
        count in 0u32..400,
    ) {
        let stats: Vec<Stat<'_>> = names
            .iter()
            .map(|name| Stat {
                name: name.as_str(),
                ..Default::default()
            })
            .collect();
        let total: u64 = stats.iter().map(|stat| 2 + u64::from(stat.size())).sum();

        let mut buf = [0u8; 4096];
        let mut enc = Encoder::new(&mut buf);
        let mut writer = DirListingWriter::new(&mut enc, count, offset);
        for stat in &stats {
            if !writer.encode(stat).unwrap() {
                break;
            }
        }
        let traversed = writer.bytes_traversed();
        let encoded = writer.bytes_encoded();
        drop(writer);

        prop_assert!(traversed <= total);
        prop_assert!(u64::from(encoded) <= u64::from(count));
        prop_assert_eq!(enc.position() as u32, encoded);
    }
}
