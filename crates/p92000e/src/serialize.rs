//! Serialize/deserialize 9P messages into/from binary.
//!
//! Decoding never copies variable-length data: strings and blobs come back
//! as slices of the input buffer. Encoding writes into a caller-provided
//! buffer through a bounded cursor.

use std::mem;
use std::str;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::fcall::{Qid, QidType, Stat};

macro_rules! decode {
    ($decoder:expr) => {
        $crate::serialize::Decodable::decode(&mut $decoder)?
    };

    ($typ:ident, $buf:expr) => {
        $typ::from_bits_retain(decode!($buf))
    };
}

/// A non-owning read cursor over a borrowed byte buffer
///
/// Every read fails with [`Error::NotEnoughData`] when fewer bytes remain
/// than requested; the cursor position is unspecified after a failure and
/// the enclosing message decode must be abandoned.
#[derive(Clone, Debug)]
pub struct Decoder<'b> {
    data: &'b [u8],
}

impl<'b> Decoder<'b> {
    pub fn new(data: &'b [u8]) -> Decoder<'b> {
        Decoder { data }
    }

    /// Number of bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    /// Take the next `count` bytes off the cursor
    pub fn take(&mut self, count: usize) -> Result<&'b [u8]> {
        if self.data.len() < count {
            return Err(Error::NotEnoughData);
        }
        let (head, tail) = self.data.split_at(count);
        self.data = tail;
        Ok(head)
    }

    /// Decode a value off the cursor
    pub fn decode<T: Decodable<'b>>(&mut self) -> Result<T> {
        Decodable::decode(self)
    }
}

/// A bounded write cursor over a caller-provided byte buffer
///
/// Writes never grow the buffer; running out of room fails with
/// [`Error::BufferTooSmall`].
#[derive(Debug)]
pub struct Encoder<'b> {
    buf: &'b mut [u8],
    pos: usize,
}

impl<'b> Encoder<'b> {
    pub fn new(buf: &'b mut [u8]) -> Encoder<'b> {
        Encoder { buf, pos: 0 }
    }

    /// Number of bytes written so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes still available
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// View of the bytes written so far
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    /// Consume the encoder, returning the written prefix of the buffer
    pub fn into_written(self) -> &'b [u8] {
        let Encoder { buf, pos } = self;
        &buf[..pos]
    }

    fn reserve(&mut self, count: usize) -> Result<&mut [u8]> {
        if self.remaining() < count {
            return Err(Error::BufferTooSmall);
        }
        let span = &mut self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(span)
    }

    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        self.reserve(1)?[0] = v;
        Ok(())
    }

    pub fn put_u16(&mut self, v: u16) -> Result<()> {
        LittleEndian::write_u16(self.reserve(2)?, v);
        Ok(())
    }

    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        LittleEndian::write_u32(self.reserve(4)?, v);
        Ok(())
    }

    pub fn put_u64(&mut self, v: u64) -> Result<()> {
        LittleEndian::write_u64(self.reserve(8)?, v);
        Ok(())
    }

    /// Append raw bytes with no length prefix
    pub fn put_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.reserve(v.len())?.copy_from_slice(v);
        Ok(())
    }

    /// Append a `u16` length-prefixed string
    pub fn put_str(&mut self, v: &str) -> Result<()> {
        let len = u16::try_from(v.len()).map_err(|_| Error::FieldTooLarge)?;
        self.put_u16(len)?;
        self.put_bytes(v.as_bytes())
    }

    /// Append a `u32` length-prefixed blob
    pub fn put_blob(&mut self, v: &[u8]) -> Result<()> {
        let len = u32::try_from(v.len()).map_err(|_| Error::FieldTooLarge)?;
        self.put_u32(len)?;
        self.put_bytes(v)
    }

    /// Overwrite four already-written bytes at `pos`
    pub fn patch_u32(&mut self, pos: usize, v: u32) -> Result<()> {
        if pos + 4 > self.pos {
            return Err(Error::BufferTooSmall);
        }
        LittleEndian::write_u32(&mut self.buf[pos..pos + 4], v);
        Ok(())
    }

    /// Encode a value onto the cursor, returning the number of bytes written
    pub fn encode<T: Encodable + ?Sized>(&mut self, v: &T) -> Result<usize> {
        v.encode(self)
    }
}

/// Trait representing a type which can be serialized into binary
pub trait Encodable {
    /// Encode self to e and return the number of bytes encoded
    fn encode(&self, e: &mut Encoder<'_>) -> Result<usize>;
}

impl Encodable for u8 {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<usize> {
        e.put_u8(*self).and(Ok(mem::size_of::<Self>()))
    }
}

impl Encodable for u16 {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<usize> {
        e.put_u16(*self).and(Ok(mem::size_of::<Self>()))
    }
}

impl Encodable for u32 {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<usize> {
        e.put_u32(*self).and(Ok(mem::size_of::<Self>()))
    }
}

impl Encodable for u64 {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<usize> {
        e.put_u64(*self).and(Ok(mem::size_of::<Self>()))
    }
}

impl Encodable for str {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<usize> {
        e.put_str(self).and(Ok(mem::size_of::<u16>() + self.len()))
    }
}

impl Encodable for Qid {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<usize> {
        e.put_u8(self.typ.bits())?;
        e.put_u32(self.version)?;
        e.put_u64(self.path)?;
        Ok(self.size() as usize)
    }
}

impl Encodable for Stat<'_> {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<usize> {
        let size = self.size();
        e.put_u16(size)?;
        e.put_u16(self.typ)?;
        e.put_u32(self.dev)?;
        self.qid.encode(e)?;
        e.put_u32(self.mode)?;
        e.put_u32(self.atime)?;
        e.put_u32(self.mtime)?;
        e.put_u64(self.length)?;
        e.put_str(self.name)?;
        e.put_str(self.uid)?;
        e.put_str(self.gid)?;
        e.put_str(self.muid)?;
        Ok(mem::size_of::<u16>() + size as usize)
    }
}

impl<T: Encodable> Encodable for [T] {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<usize> {
        let start = e.position();
        let len = u16::try_from(self.len()).map_err(|_| Error::FieldTooLarge)?;
        e.put_u16(len)?;
        for item in self {
            item.encode(e)?;
        }
        Ok(e.position() - start)
    }
}

impl<T: Encodable> Encodable for Vec<T> {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<usize> {
        self.as_slice().encode(e)
    }
}

impl<T: Encodable + ?Sized> Encodable for &T {
    fn encode(&self, e: &mut Encoder<'_>) -> Result<usize> {
        (**self).encode(e)
    }
}

/// Trait representing a type which can be deserialized from binary
///
/// Variable-length fields borrow from the decoder's buffer rather than
/// copying out of it.
pub trait Decodable<'b>: Sized {
    fn decode(d: &mut Decoder<'b>) -> Result<Self>;
}

impl<'b> Decodable<'b> for u8 {
    fn decode(d: &mut Decoder<'b>) -> Result<Self> {
        Ok(d.take(1)?[0])
    }
}

impl<'b> Decodable<'b> for u16 {
    fn decode(d: &mut Decoder<'b>) -> Result<Self> {
        Ok(LittleEndian::read_u16(d.take(2)?))
    }
}

impl<'b> Decodable<'b> for u32 {
    fn decode(d: &mut Decoder<'b>) -> Result<Self> {
        Ok(LittleEndian::read_u32(d.take(4)?))
    }
}

impl<'b> Decodable<'b> for u64 {
    fn decode(d: &mut Decoder<'b>) -> Result<Self> {
        Ok(LittleEndian::read_u64(d.take(8)?))
    }
}

impl<'b> Decodable<'b> for [u8; 8] {
    fn decode(d: &mut Decoder<'b>) -> Result<Self> {
        let mut bytes = [0; 8];
        bytes.copy_from_slice(d.take(8)?);
        Ok(bytes)
    }
}

impl<'b> Decodable<'b> for &'b str {
    fn decode(d: &mut Decoder<'b>) -> Result<Self> {
        let len: u16 = Decodable::decode(d)?;
        str::from_utf8(d.take(len as usize)?).map_err(|_| Error::InvalidUtf8)
    }
}

impl<'b> Decodable<'b> for &'b [u8] {
    fn decode(d: &mut Decoder<'b>) -> Result<Self> {
        let len: u32 = Decodable::decode(d)?;
        d.take(len as usize)
    }
}

impl<'b> Decodable<'b> for Qid {
    fn decode(d: &mut Decoder<'b>) -> Result<Self> {
        Ok(Qid {
            typ: decode!(QidType, *d),
            version: decode!(*d),
            path: decode!(*d),
        })
    }
}

impl<'b> Decodable<'b> for Stat<'b> {
    fn decode(d: &mut Decoder<'b>) -> Result<Self> {
        let size: u16 = Decodable::decode(d)?;
        let before = d.remaining();
        let stat = Stat {
            typ: decode!(*d),
            dev: decode!(*d),
            qid: decode!(*d),
            mode: decode!(*d),
            atime: decode!(*d),
            mtime: decode!(*d),
            length: decode!(*d),
            name: decode!(*d),
            uid: decode!(*d),
            gid: decode!(*d),
            muid: decode!(*d),
        };

        // The record carries its own byte count; a mismatch means the frame
        // and the record disagree about where the record ends.
        let consumed = before - d.remaining();
        if (size as usize) > consumed {
            return Err(Error::NotEnoughData);
        }
        if (size as usize) < consumed {
            return Err(Error::MoreThenExpectedData);
        }

        Ok(stat)
    }
}

impl<'b, T: Decodable<'b>> Decodable<'b> for Vec<T> {
    fn decode(d: &mut Decoder<'b>) -> Result<Self> {
        let len: u16 = Decodable::decode(d)?;
        let mut buf = Vec::new();
        for _ in 0..len {
            buf.push(Decodable::decode(d)?);
        }
        Ok(buf)
    }
}

#[test]
fn encoder_test1() {
    let expected: Vec<u8> = (0..10).collect();
    let mut buf = [0u8; 16];
    let mut encoder = Encoder::new(&mut buf);
    for i in 0..10u8 {
        i.encode(&mut encoder).unwrap();
    }
    assert_eq!(&expected[..], encoder.written());
}

#[test]
fn decoder_test1() {
    let expected: Vec<u8> = (0..10).collect();
    let mut decoder = Decoder::new(&expected);
    let mut actual: Vec<u8> = Vec::new();
    while decoder.remaining() > 0 {
        actual.push(decoder.decode().unwrap());
    }
    assert_eq!(expected, actual);
}

#[test]
fn exhausted_cursor_is_rejected() {
    let bytes = [0u8; 3];
    let mut decoder = Decoder::new(&bytes);
    let actual: Result<u32> = decoder.decode();
    assert_eq!(actual, Err(Error::NotEnoughData));
}

#[test]
fn string_borrows_from_input() {
    let bytes = [0x03, 0x00, b'e', b't', b'c'];
    let mut decoder = Decoder::new(&bytes);
    let actual: &str = decoder.decode().unwrap();
    assert_eq!(actual, "etc");
    assert_eq!(actual.as_ptr(), bytes[2..].as_ptr());
}

#[test]
fn invalid_utf8_string_is_rejected() {
    let bytes = [0x02, 0x00, 0xff, 0xfe];
    let mut decoder = Decoder::new(&bytes);
    let actual: Result<&str> = decoder.decode();
    assert_eq!(actual, Err(Error::InvalidUtf8));
}

#[test]
fn qid_unknown_bits_survive_round_trip() {
    let qid = Qid {
        typ: QidType::from_bits_retain(0x03),
        version: 7,
        path: 42,
    };

    let mut buf = [0u8; 16];
    let mut encoder = Encoder::new(&mut buf);
    qid.encode(&mut encoder).unwrap();

    let mut decoder = Decoder::new(encoder.written());
    let actual: Qid = decoder.decode().unwrap();
    assert_eq!(actual, qid);
    assert_eq!(actual.typ.bits(), 0x03);
}

#[test]
fn stat_round_trip1() {
    let stat = Stat {
        typ: 1,
        dev: 2,
        qid: Qid {
            typ: QidType::DIR,
            version: 1,
            path: 64,
        },
        mode: 0o644,
        atime: 1_500_000_000,
        mtime: 1_500_000_001,
        length: 4096,
        name: "root",
        uid: "alice",
        gid: "wheel",
        muid: "alice",
    };

    let mut buf = [0u8; 128];
    let mut encoder = Encoder::new(&mut buf);
    let written = stat.encode(&mut encoder).unwrap();
    assert_eq!(written, 2 + stat.size() as usize);

    let mut decoder = Decoder::new(encoder.written());
    let actual: Stat<'_> = decoder.decode().unwrap();
    assert_eq!(actual, stat);
    assert_eq!(decoder.remaining(), 0);
}

#[test]
fn stat_size_prefix_mismatch_is_rejected() {
    let stat = Stat {
        name: "f",
        ..Default::default()
    };

    let mut buf = [0u8; 128];
    let mut encoder = Encoder::new(&mut buf);
    stat.encode(&mut encoder).unwrap();

    let mut long = encoder.written().to_vec();
    LittleEndian::write_u16(&mut long[..2], stat.size() + 1);
    let actual: Result<Stat<'_>> = Decoder::new(&long).decode();
    assert_eq!(actual, Err(Error::NotEnoughData));

    let mut short = encoder.written().to_vec();
    LittleEndian::write_u16(&mut short[..2], stat.size() - 1);
    let actual: Result<Stat<'_>> = Decoder::new(&short).decode();
    assert_eq!(actual, Err(Error::MoreThenExpectedData));
}

#[test]
fn encoder_rejects_overflow() {
    let mut buf = [0u8; 3];
    let mut encoder = Encoder::new(&mut buf);
    encoder.put_u16(1).unwrap();
    assert_eq!(encoder.put_u16(2), Err(Error::BufferTooSmall));
}
