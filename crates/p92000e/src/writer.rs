//! Framed message building.
//!
//! Messages are built directly into a caller-provided buffer: a provisional
//! header is written first, payload fields are appended, and the header's
//! size field is back-patched once the message is finished. After a
//! successful [`MessageWriter::finish`] the written bytes form one
//! well-framed message that parses back through [`crate::Parser`].

use crate::error::{Error, Result};
use crate::fcall::*;
use crate::serialize::{Encodable, Encoder};

/// A message being built into an output buffer
///
/// A failed append leaves the buffer holding a partial message; the whole
/// frame should be abandoned by rewinding to the position the writer was
/// created at.
#[derive(Debug)]
pub struct MessageWriter<'e, 'b> {
    enc: &'e mut Encoder<'b>,
    start: usize,
    typ: MessageType,
    tag: Tag,
}

impl<'e, 'b> MessageWriter<'e, 'b> {
    /// Begin a message of the given type, writing a provisional header
    pub fn new(
        enc: &'e mut Encoder<'b>,
        typ: MessageType,
        tag: Tag,
    ) -> Result<MessageWriter<'e, 'b>> {
        let start = enc.position();
        enc.put_u32(0)?; // patched by finish
        enc.put_u8(typ as u8)?;
        enc.put_u16(tag)?;
        Ok(MessageWriter {
            enc,
            start,
            typ,
            tag,
        })
    }

    /// Get the message type
    pub fn typ(&self) -> MessageType {
        self.typ
    }

    /// Get the message tag
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Payload bytes appended so far
    pub fn payload_size(&self) -> u32 {
        (self.enc.position() - self.start) as u32 - HEADER_SIZE
    }

    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        self.enc.put_u8(v)
    }

    pub fn put_u16(&mut self, v: u16) -> Result<()> {
        self.enc.put_u16(v)
    }

    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        self.enc.put_u32(v)
    }

    pub fn put_u64(&mut self, v: u64) -> Result<()> {
        self.enc.put_u64(v)
    }

    pub fn put_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.enc.put_bytes(v)
    }

    pub fn put_str(&mut self, v: &str) -> Result<()> {
        self.enc.put_str(v)
    }

    pub fn put_blob(&mut self, v: &[u8]) -> Result<()> {
        self.enc.put_blob(v)
    }

    /// Append any encodable value
    pub fn encode<T: Encodable + ?Sized>(&mut self, v: &T) -> Result<usize> {
        self.enc.encode(v)
    }

    /// Finalize the message build
    ///
    /// Back-patches the size field of the reserved header and returns the
    /// total frame size in bytes.
    pub fn finish(self) -> Result<u32> {
        let size = (self.enc.position() - self.start) as u32;
        self.enc.patch_u32(self.start, size)?;
        Ok(size)
    }
}

/// Build one framed request message, returning the frame size in bytes
pub fn write_request(enc: &mut Encoder<'_>, tag: Tag, request: &Request<'_>) -> Result<u32> {
    let mut w = MessageWriter::new(enc, MessageType::from(request), tag)?;

    match request {
        Request::Version { msize, version } => {
            w.put_u32(*msize)?;
            w.put_str(version)?;
        }
        Request::Auth { afid, uname, aname } => {
            w.put_u32(*afid)?;
            w.put_str(uname)?;
            w.put_str(aname)?;
        }
        Request::Flush { oldtag } => w.put_u16(*oldtag)?,
        Request::Attach {
            fid,
            afid,
            uname,
            aname,
        } => {
            w.put_u32(*fid)?;
            w.put_u32(*afid)?;
            w.put_str(uname)?;
            w.put_str(aname)?;
        }
        Request::Walk {
            fid,
            newfid,
            wnames,
        } => {
            check_walk_elements(wnames.len())?;
            w.put_u32(*fid)?;
            w.put_u32(*newfid)?;
            w.encode(wnames)?;
        }
        Request::Open { fid, mode } => {
            w.put_u32(*fid)?;
            w.put_u8(mode.bits())?;
        }
        Request::Create {
            fid,
            name,
            perm,
            mode,
        } => {
            w.put_u32(*fid)?;
            w.put_str(name)?;
            w.put_u32(*perm)?;
            w.put_u8(mode.bits())?;
        }
        Request::Read { fid, offset, count } => {
            w.put_u32(*fid)?;
            w.put_u64(*offset)?;
            w.put_u32(*count)?;
        }
        Request::Write { fid, offset, data } => {
            w.put_u32(*fid)?;
            w.put_u64(*offset)?;
            w.put_blob(data)?;
        }
        Request::Clunk { fid } => w.put_u32(*fid)?,
        Request::Remove { fid } => w.put_u32(*fid)?,
        Request::Stat { fid } => w.put_u32(*fid)?,
        Request::WStat { fid, stat } => {
            w.put_u32(*fid)?;
            w.encode(stat)?;
        }
        Request::Session { key } => w.put_bytes(key)?,
        Request::SRead { fid, path } => {
            check_walk_elements(path.len())?;
            w.put_u32(*fid)?;
            w.encode(path)?;
        }
        Request::SWrite { fid, path, data } => {
            check_walk_elements(path.len())?;
            w.put_u32(*fid)?;
            w.encode(path)?;
            w.put_blob(data)?;
        }
    }

    w.finish()
}

/// Build one framed response message, returning the frame size in bytes
///
/// Read and write replies are framed with the base `RRead`/`RWrite` codes;
/// a server answering the extension's short read/write requests with the
/// `RSRead`/`RSWrite` codes builds those frames through [`MessageWriter`]
/// with an explicit type.
pub fn write_response(enc: &mut Encoder<'_>, tag: Tag, response: &Response<'_>) -> Result<u32> {
    let mut w = MessageWriter::new(enc, MessageType::from(response), tag)?;

    match response {
        Response::Version { msize, version } => {
            w.put_u32(*msize)?;
            w.put_str(version)?;
        }
        Response::Auth { aqid } => {
            w.encode(aqid)?;
        }
        Response::Attach { qid } => {
            w.encode(qid)?;
        }
        Response::Error { ename } => w.put_str(ename)?,
        Response::Walk { wqids } => {
            check_walk_elements(wqids.len())?;
            w.encode(wqids)?;
        }
        Response::Open { qid, iounit } => {
            w.encode(qid)?;
            w.put_u32(*iounit)?;
        }
        Response::Create { qid, iounit } => {
            w.encode(qid)?;
            w.put_u32(*iounit)?;
        }
        Response::Read { data } => w.put_blob(data)?,
        Response::Write { count } => w.put_u32(*count)?,
        Response::Stat { dummy_size, stat } => {
            w.put_u16(*dummy_size)?;
            w.encode(stat)?;
        }
        Response::Flush
        | Response::Clunk
        | Response::Remove
        | Response::WStat
        | Response::Session => {}
    }

    w.finish()
}

fn check_walk_elements(count: usize) -> Result<()> {
    if count > MAXWELEM {
        return Err(Error::TooManyWalkElements);
    }
    Ok(())
}

/// Builds the payload of a directory `read` response.
///
/// Directory reads return a sequence of stat records windowed by the
/// request's `(offset, count)`. The writer measures every record fed to it:
/// records that begin before `offset` are counted but not emitted (an entry
/// straddling the offset is never split, as directory seeks must land on
/// record boundaries), and encoding stops before the first record that
/// would not fit into `count` bytes.
///
/// The writer does not own the iteration; feed entries in listing order
/// until it reports a full window or the listing is exhausted:
///
/// ```
/// use p92000e::{DirListingWriter, Encoder, Stat};
///
/// # fn entries() -> Vec<Stat<'static>> { vec![Stat::default()] }
/// # fn example() -> p92000e::Result<()> {
/// let mut buf = [0u8; 4096];
/// let mut enc = Encoder::new(&mut buf);
/// let mut writer = DirListingWriter::new(&mut enc, 4096, 0);
/// for stat in entries() {
///     if !writer.encode(&stat)? {
///         break;
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DirListingWriter<'e, 'b> {
    dest: &'e mut Encoder<'b>,
    offset: u64,
    count: u32,
    bytes_traversed: u64,
    bytes_encoded: u32,
}

impl<'e, 'b> DirListingWriter<'e, 'b> {
    /// Window `count` bytes of the listing starting `offset` bytes into it
    pub fn new(dest: &'e mut Encoder<'b>, count: u32, offset: u64) -> DirListingWriter<'e, 'b> {
        DirListingWriter {
            dest,
            offset,
            count,
            bytes_traversed: 0,
            bytes_encoded: 0,
        }
    }

    /// Encode one directory entry if it falls inside the window
    ///
    /// Returns `Ok(false)` once no further entry can fit.
    pub fn encode(&mut self, stat: &Stat<'_>) -> Result<bool> {
        let record_size = 2 + u64::from(stat.size());

        // Records beginning before the requested offset are counted but not
        // emitted, whether or not they extend past it.
        if self.bytes_traversed < self.offset {
            self.bytes_traversed += record_size;
            return Ok(true);
        }

        if u64::from(self.bytes_encoded) + record_size > u64::from(self.count) {
            return Ok(false);
        }

        stat.encode(self.dest)?;
        self.bytes_traversed += record_size;
        self.bytes_encoded += record_size as u32;
        Ok(true)
    }

    /// Logical bytes seen so far, including skipped records
    pub fn bytes_traversed(&self) -> u64 {
        self.bytes_traversed
    }

    /// Bytes actually written to the output
    pub fn bytes_encoded(&self) -> u32 {
        self.bytes_encoded
    }
}

#[test]
fn finish_backpatches_frame_size() {
    let mut buf = [0u8; 32];
    let mut enc = Encoder::new(&mut buf);

    let mut w = MessageWriter::new(&mut enc, MessageType::RError, 3).unwrap();
    assert_eq!(w.payload_size(), 0);
    w.put_str("gone").unwrap();
    assert_eq!(w.payload_size(), 6);

    let size = w.finish().unwrap();
    assert_eq!(size, 13);
    assert_eq!(enc.written().len(), 13);
    assert_eq!(&enc.written()[..4], &13u32.to_le_bytes());
}

#[test]
fn walk_reply_cap_is_enforced() {
    let wqids = vec![Qid::default(); MAXWELEM + 1];
    let mut buf = [0u8; 512];
    let mut enc = Encoder::new(&mut buf);
    assert_eq!(
        write_response(&mut enc, 1, &Response::Walk { wqids }),
        Err(Error::TooManyWalkElements)
    );
}
