//! 9P protocol data types and constants.
//!
//! # Protocol
//! 9P2000/9P2000.e

use std::mem::{size_of, size_of_val};

use bitflags::bitflags;
use enum_primitive::*;

/// 9P2000 version string
pub const P92000: &str = "9P2000";

/// 9P2000.e version string, advertised by default
pub const P92000E: &str = "9P2000.e";

/// The version string that comes with `RVersion` when the server does not
/// understand the client's version string
pub const VERSION_UNKNOWN: &str = "unknown";

/// Message tag correlating a request with its response on a multiplexed
/// connection
pub type Tag = u16;

/// Client-chosen handle representing a "current file" on the server
pub type Fid = u32;

/*
 * 9P magic numbers
 */
/// Special tag which `TVersion`/`RVersion` must use as `tag`
pub const NOTAG: Tag = !0;

/// Special value which `TAttach` with no auth must use as `afid`
///
/// If the client does not wish to authenticate the connection, or knows that
/// authentication is not required, the afid field in the attach message
/// should be set to `NOFID`
pub const NOFID: Fid = !0;

/// Size in bytes of the mandatory message header
///
/// size[4] type[1] tag[2]; the size field counts the whole frame including
/// these seven bytes
pub const HEADER_SIZE: u32 = 7;

/// Maximum frame size in bytes until a session negotiates its own limit
pub const MAX_MESSAGE_SIZE: u32 = 8 * 1024;

/// Maximum number of elements in a single walk
pub const MAXWELEM: usize = 16;

/// Ample room for `TWrite`/`RRead` header
///
/// size[4] TRead/TWrite[2] tag[2] fid[4] offset[8] count[4]
pub const IOHDRSZ: u32 = 24;

bitflags! {
    /// Bits in `Qid.typ`
    ///
    /// # Protocol
    /// 9P2000/9P2000.e
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord)]
    pub struct QidType: u8 {
        #[doc = "Type bit for directories"]
        const DIR       = 0x80;
        #[doc = "Type bit for append only files"]
        const APPEND    = 0x40;
        #[doc = "Type bit for exclusive use files"]
        const EXCL      = 0x20;
        #[doc = "Type bit for mounted channel"]
        const MOUNT     = 0x10;
        #[doc = "Type bit for authentication file"]
        const AUTH      = 0x08;
        #[doc = "Type bit for not-backed-up file"]
        const TMP       = 0x04;
        #[doc = "Type bit for symbolic link (9P2000.u)"]
        const LINK      = 0x02;
        #[doc = "Plain file"]
        const FILE      = 0x00;
    }
}

bitflags! {
    /// Bits in `Stat.mode`
    ///
    /// The high byte mirrors the qid type bits; rwx permission bits are
    /// replicated in the owner/group/other nibbles by convention. `Stat`
    /// carries the mode as a raw word, the codec does not interpret it.
    #[derive(Copy, Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord)]
    pub struct DirMode: u32 {
        #[doc = "Mode bit for directories"]
        const DIR       = 0x80000000;
        #[doc = "Mode bit for append only files"]
        const APPEND    = 0x40000000;
        #[doc = "Mode bit for exclusive use files"]
        const EXCL      = 0x20000000;
        #[doc = "Mode bit for mounted channel"]
        const MOUNT     = 0x10000000;
        #[doc = "Mode bit for authentication file"]
        const AUTH      = 0x08000000;
        #[doc = "Mode bit for non-backed-up files"]
        const TMP       = 0x04000000;
        #[doc = "Mode bit for symbolic link (9P2000.u)"]
        const SYMLINK   = 0x02000000;
        #[doc = "Mode bit for device file (9P2000.u)"]
        const DEVICE    = 0x00800000;
        #[doc = "Mode bit for named pipe (9P2000.u)"]
        const NAMEDPIPE = 0x00200000;
        #[doc = "Mode bit for socket (9P2000.u)"]
        const SOCKET    = 0x00100000;
        #[doc = "Mode bit for setuid (9P2000.u)"]
        const SETUID    = 0x00080000;
        #[doc = "Mode bit for setgid (9P2000.u)"]
        const SETGID    = 0x00040000;
        #[doc = "Mode bit for read permission"]
        const READ      = 0x4;
        #[doc = "Mode bit for write permission"]
        const WRITE     = 0x2;
        #[doc = "Mode bit for execute permission"]
        const EXEC      = 0x1;
    }
}

/// The type of I/O requested by `TOpen` and `TCreate`
///
/// The low two bits select the access mode; the remaining bits are flags
/// or'ed in.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct OpenMode(pub u8);

impl OpenMode {
    /// Open for read
    pub const READ: u8 = 0;
    /// Write
    pub const WRITE: u8 = 1;
    /// Read and write
    pub const RDWR: u8 = 2;
    /// Execute, == read but check execute permission
    pub const EXEC: u8 = 3;
    /// Or'ed in (except for exec), truncate file first
    pub const TRUNC: u8 = 16;
    /// Or'ed in, close on exec
    pub const CEXEC: u8 = 32;
    /// Or'ed in, remove on close
    pub const RCLOSE: u8 = 64;

    /// Access mode selected by the low two bits
    pub fn access(self) -> u8 {
        self.0 & 0x03
    }

    /// Whether the file is truncated on open
    pub fn is_truncate(self) -> bool {
        self.0 & Self::TRUNC != 0
    }

    /// Whether the fid is closed on exec
    pub fn is_close_on_exec(self) -> bool {
        self.0 & Self::CEXEC != 0
    }

    /// Whether the file is removed when the fid is clunked
    pub fn is_remove_on_close(self) -> bool {
        self.0 & Self::RCLOSE != 0
    }

    /// Raw mode byte as carried on the wire
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl From<u8> for OpenMode {
    fn from(mode: u8) -> Self {
        OpenMode(mode)
    }
}

/// Server side data type for path tracking
///
/// The server's unique identification for the file being accessed: two files
/// on the same server hierarchy are the same if and only if their qids are
/// the same.
///
/// # Protocol
/// 9P2000/9P2000.e
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Qid {
    /// Specify whether the file is a directory, append-only file, etc.
    pub typ: QidType,
    /// Version number for a file; typically, it is incremented every time
    /// the file is modified
    pub version: u32,
    /// An integer which is unique among all files in the hierarchy
    pub path: u64,
}

impl Qid {
    /// Number of bytes a qid occupies on the wire
    pub fn size(&self) -> u16 {
        (size_of::<QidType>() + size_of::<u32>() + size_of::<u64>()) as u16
    }
}

/// Plan 9 file metadata (somewhat like a unix fstat)
///
/// The wire encoding opens with a `u16` count of the bytes that follow it.
/// The count is derived from the fields on encode and validated on decode,
/// so it is not stored here; see [`Stat::size`].
///
/// # Protocol
/// 9P2000/9P2000.e
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stat<'b> {
    /// Server type
    pub typ: u16,
    /// Server subtype
    pub dev: u32,
    /// Unique id from server
    pub qid: Qid,
    /// Permissions and flags
    pub mode: u32,
    /// Last read time
    pub atime: u32,
    /// Last write time
    pub mtime: u32,
    /// File length
    pub length: u64,
    /// Last element of path
    pub name: &'b str,
    /// Owner name
    pub uid: &'b str,
    /// Group name
    pub gid: &'b str,
    /// Last modifier name
    pub muid: &'b str,
}

impl<'b> Stat<'b> {
    /// Byte count of the encoded record, excluding the two count bytes
    /// themselves
    pub fn size(&self) -> u16 {
        (size_of_val(&self.typ)
            + size_of_val(&self.dev)
            + self.qid.size() as usize
            + size_of_val(&self.mode)
            + size_of_val(&self.atime)
            + size_of_val(&self.mtime)
            + size_of_val(&self.length)
            + (size_of::<u16>() * 4)
            + self.name.len()
            + self.uid.len()
            + self.gid.len()
            + self.muid.len()) as u16
    }
}

// TError = 106 would pair with RError but is illegal on the wire; it is
// deliberately absent so it can never parse as a supported type.
enum_from_primitive! {
    #[doc = "Message type, 9P operations"]
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub enum MessageType {
        // 9P2000
        TVersion    = 100,
        RVersion,
        TAuth       = 102,
        RAuth,
        TAttach     = 104,
        RAttach,
        RError      = 107,
        TFlush      = 108,
        RFlush,
        TWalk       = 110,
        RWalk,
        TOpen       = 112,
        ROpen,
        TCreate     = 114,
        RCreate,
        TRead       = 116,
        RRead,
        TWrite      = 118,
        RWrite,
        TClunk      = 120,
        RClunk,
        TRemove     = 122,
        RRemove,
        TStat       = 124,
        RStat,
        TWStat      = 126,
        RWStat,

        // 9P2000.e extension
        TSession    = 150,
        RSession,
        TSRead      = 152,
        RSRead,
        TSWrite     = 154,
        RSWrite,
    }
}

impl MessageType {
    /// If the message type is T-message
    pub fn is_t(&self) -> bool {
        !self.is_r()
    }

    /// If the message type is R-message
    pub fn is_r(&self) -> bool {
        use crate::MessageType::*;

        matches!(
            *self,
            RVersion
                | RAuth
                | RAttach
                | RError
                | RFlush
                | RWalk
                | ROpen
                | RCreate
                | RRead
                | RWrite
                | RClunk
                | RRemove
                | RStat
                | RWStat
                | RSession
                | RSRead
                | RSWrite
        )
    }
}

/// Fixed size header every message starts with
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    /// Size of the message in bytes, including the four size bytes
    /// themselves
    pub size: u32,
    /// Type of the message
    pub typ: MessageType,
    /// Message tag for concurrent messages
    pub tag: Tag,
}

impl MessageHeader {
    /// Number of payload bytes following the header
    ///
    /// Only meaningful for a header produced by header validation, which
    /// guarantees `size >= HEADER_SIZE`.
    pub fn payload_size(&self) -> u32 {
        self.size - HEADER_SIZE
    }
}

/// A request message as decoded from a client's frame
///
/// Variable-length fields borrow from the buffer the message was decoded
/// from; the buffer must outlive the message.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Request<'b> {
    /// Negotiate the protocol version and message size; must be the first
    /// message sent on a connection
    Version {
        /// The client suggested maximum message size in bytes
        msize: u32,
        /// The version string identifies the level of the protocol
        version: &'b str,
    },
    /// Establish an auth file used to execute an authentication protocol
    Auth {
        /// A new fid to be established for authentication
        afid: Fid,
        /// User identified by the message
        uname: &'b str,
        /// File tree to access
        aname: &'b str,
    },
    /// Abort an outstanding request
    Flush {
        /// Tag of the message to abort
        oldtag: Tag,
    },
    /// A fresh introduction from a user on the client machine to the server
    Attach {
        /// Client fid to be used as the root directory of the desired file
        /// tree
        fid: Fid,
        /// A fid previously established by an auth message, or `NOFID`
        afid: Fid,
        /// Identification of the user; all actions will be performed as
        /// this user
        uname: &'b str,
        /// Selected file tree to attach to
        aname: &'b str,
    },
    /// Change the file associated with `newfid` to be the file reached by
    /// walking the given path elements from the directory `fid` refers to
    Walk {
        fid: Fid,
        newfid: Fid,
        /// Path elements to walk, at most `MAXWELEM`
        wnames: Vec<&'b str>,
    },
    /// Check permissions and prepare a fid for I/O
    Open { fid: Fid, mode: OpenMode },
    /// Create a new file in the directory represented by `fid` and open it
    Create {
        fid: Fid,
        name: &'b str,
        perm: u32,
        mode: OpenMode,
    },
    /// Ask for `count` bytes of data from a file opened for reading
    Read { fid: Fid, offset: u64, count: u32 },
    /// Record data in a file opened for writing
    Write {
        fid: Fid,
        offset: u64,
        data: &'b [u8],
    },
    /// Inform the server that the current file is no longer needed
    Clunk { fid: Fid },
    /// Remove the file and clunk the fid, even if the remove fails
    Remove { fid: Fid },
    /// Inquire about the file identified by `fid`
    Stat { fid: Fid },
    /// Update file stat fields
    WStat { fid: Fid, stat: Stat<'b> },
    /// Re-establish a previously negotiated session (9P2000.e)
    Session {
        /// Key of the previously established session
        key: [u8; 8],
    },
    /// Read an entire file identified by a path in one request (9P2000.e)
    SRead {
        /// Fid of the root directory to walk the path from
        fid: Fid,
        path: Vec<&'b str>,
    },
    /// Overwrite file contents identified by a path in one request
    /// (9P2000.e)
    SWrite {
        /// Fid of the root directory to walk the path from
        fid: Fid,
        path: Vec<&'b str>,
        data: &'b [u8],
    },
}

/// A response message as decoded from a server's frame
///
/// Variable-length fields borrow from the buffer the message was decoded
/// from; the buffer must outlive the message.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Response<'b> {
    /// Version and message size accepted by the server
    Version {
        /// Maximum message size that the server accepts and can receive
        msize: u32,
        /// Maximum protocol version accepted by the server
        version: &'b str,
    },
    /// Qid of the auth file, if one was requested
    Auth { aqid: Qid },
    /// Qid of the attached file tree root
    Attach { qid: Qid },
    /// Error response from the server
    Error { ename: &'b str },
    Flush,
    /// Qids of the directories walked, one per walked element
    Walk { wqids: Vec<Qid> },
    Open {
        qid: Qid,
        /// Hint for the number of bytes to read in a single operation
        iounit: u32,
    },
    Create { qid: Qid, iounit: u32 },
    /// Data read from a file; `RSRead` decodes to this variant as well
    Read { data: &'b [u8] },
    /// Number of bytes written; `RSWrite` decodes to this variant as well
    Write { count: u32 },
    Clunk,
    Remove,
    Stat {
        /// Historical extra count preceding the stat record; conventionally
        /// `stat.size() + 2`, preserved on the wire as received
        dummy_size: u16,
        stat: Stat<'b>,
    },
    WStat,
    /// Session re-establishment accepted (9P2000.e)
    Session,
}

impl<'b> From<&Request<'b>> for MessageType {
    fn from(request: &Request<'b>) -> MessageType {
        match *request {
            Request::Version { .. } => MessageType::TVersion,
            Request::Auth { .. } => MessageType::TAuth,
            Request::Flush { .. } => MessageType::TFlush,
            Request::Attach { .. } => MessageType::TAttach,
            Request::Walk { .. } => MessageType::TWalk,
            Request::Open { .. } => MessageType::TOpen,
            Request::Create { .. } => MessageType::TCreate,
            Request::Read { .. } => MessageType::TRead,
            Request::Write { .. } => MessageType::TWrite,
            Request::Clunk { .. } => MessageType::TClunk,
            Request::Remove { .. } => MessageType::TRemove,
            Request::Stat { .. } => MessageType::TStat,
            Request::WStat { .. } => MessageType::TWStat,
            Request::Session { .. } => MessageType::TSession,
            Request::SRead { .. } => MessageType::TSRead,
            Request::SWrite { .. } => MessageType::TSWrite,
        }
    }
}

impl<'b> From<&Response<'b>> for MessageType {
    fn from(response: &Response<'b>) -> MessageType {
        match *response {
            Response::Version { .. } => MessageType::RVersion,
            Response::Auth { .. } => MessageType::RAuth,
            Response::Attach { .. } => MessageType::RAttach,
            Response::Error { .. } => MessageType::RError,
            Response::Flush => MessageType::RFlush,
            Response::Walk { .. } => MessageType::RWalk,
            Response::Open { .. } => MessageType::ROpen,
            Response::Create { .. } => MessageType::RCreate,
            Response::Read { .. } => MessageType::RRead,
            Response::Write { .. } => MessageType::RWrite,
            Response::Clunk => MessageType::RClunk,
            Response::Remove => MessageType::RRemove,
            Response::Stat { .. } => MessageType::RStat,
            Response::WStat => MessageType::RWStat,
            Response::Session => MessageType::RSession,
        }
    }
}

impl<'b> Request<'b> {
    /// Get the fids which self contains
    pub fn fids(&self) -> Vec<Fid> {
        match *self {
            Request::Attach { afid, .. } if afid != NOFID => vec![afid],
            Request::Walk { fid, .. } => vec![fid],
            Request::Open { fid, .. } => vec![fid],
            Request::Create { fid, .. } => vec![fid],
            Request::Read { fid, .. } => vec![fid],
            Request::Write { fid, .. } => vec![fid],
            Request::Clunk { fid } => vec![fid],
            Request::Remove { fid } => vec![fid],
            Request::Stat { fid } => vec![fid],
            Request::WStat { fid, .. } => vec![fid],
            Request::SRead { fid, .. } => vec![fid],
            Request::SWrite { fid, .. } => vec![fid],
            _ => Vec::new(),
        }
    }

    /// Get the newfid which self contains
    pub fn newfid(&self) -> Option<Fid> {
        match *self {
            Request::Auth { afid, .. } => Some(afid),
            Request::Attach { fid, .. } => Some(fid),
            Request::Walk { newfid, .. } => Some(newfid),
            _ => None,
        }
    }
}

impl<'b> Response<'b> {
    /// Get the qids which self contains
    pub fn qids(&self) -> Vec<Qid> {
        match *self {
            Response::Auth { aqid } => vec![aqid],
            Response::Attach { qid } => vec![qid],
            Response::Walk { ref wqids } => wqids.clone(),
            Response::Open { qid, .. } => vec![qid],
            Response::Create { qid, .. } => vec![qid],
            Response::Stat { ref stat, .. } => vec![stat.qid],
            _ => Vec::new(),
        }
    }
}
