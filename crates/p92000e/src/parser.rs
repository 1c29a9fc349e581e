//! Stateful 9P message parsing.
//!
//! A [`Parser`] holds the per-connection negotiation state and validates
//! every incoming frame against it before dispatching on the message type.

use log::{debug, trace};
use num_traits::FromPrimitive;

use crate::error::{Error, Result};
use crate::fcall::*;
use crate::serialize::{Decodable, Decoder};

/// An implementation of the 9P2000 protocol with the 9P2000.e extension.
///
/// The protocol is stateful as version and message size are negotiated per
/// connection and every later frame must respect the negotiated limits;
/// bind one instance to each connection and drive it from the connection's
/// owner.
///
/// Parsing allocates nothing for message payloads. Decoded messages borrow
/// string and data fields straight from the caller's buffer, so the buffer
/// must outlive them and must not be reused while they are in use.
#[derive(Clone, Debug)]
pub struct Parser {
    max_message_size: u32,
    max_negotiated_message_size: u32,
    initial_version: String,
    negotiated_version: String,
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new(MAX_MESSAGE_SIZE, P92000E)
    }
}

impl Parser {
    /// Create a parser advertising `max_message_size` and `version` until
    /// the connection negotiates its own limits
    pub fn new(max_message_size: u32, version: &str) -> Parser {
        Parser {
            max_message_size,
            max_negotiated_message_size: max_message_size,
            initial_version: version.to_owned(),
            negotiated_version: version.to_owned(),
        }
    }

    /// Hard upper bound on the message size this instance supports
    pub fn max_possible_message_size(&self) -> u32 {
        self.max_message_size
    }

    /// Message size limit effective for the established session
    pub fn max_negotiated_message_size(&self) -> u32 {
        self.max_negotiated_message_size
    }

    /// Set the negotiated message size and return the size actually in
    /// effect, which may be less than requested
    ///
    /// The negotiated size never exceeds the configured maximum.
    pub fn set_max_negotiated_message_size(&mut self, size: u32) -> u32 {
        self.max_negotiated_message_size = size.min(self.max_message_size);
        debug!(
            "negotiated message size set to {}",
            self.max_negotiated_message_size
        );
        self.max_negotiated_message_size
    }

    /// Version string advertised before negotiation
    pub fn initial_version(&self) -> &str {
        &self.initial_version
    }

    /// Protocol version effective for the established session
    pub fn negotiated_version(&self) -> &str {
        &self.negotiated_version
    }

    /// Set the negotiated protocol version
    ///
    /// Use [`VERSION_UNKNOWN`] when the server declines the proposed
    /// version.
    pub fn set_negotiated_version(&mut self, version: &str) {
        self.negotiated_version = version.to_owned();
        debug!(
            "negotiated protocol version set to {:?}",
            self.negotiated_version
        );
    }

    /// Parse a 9P message header off the cursor
    ///
    /// On success the cursor has advanced past the seven header bytes. The
    /// payload is not examined here, so a caller may stream it; the payload
    /// parse entry points enforce the exact length.
    pub fn parse_header(&self, data: &mut Decoder<'_>) -> Result<MessageHeader> {
        if data.remaining() < HEADER_SIZE as usize {
            return Err(Error::IllFormedHeader);
        }

        let size: u32 = decode!(*data);
        if size < HEADER_SIZE {
            return Err(Error::FrameTooShort);
        }
        if size > self.max_negotiated_message_size {
            return Err(Error::TooBig);
        }

        let code: u8 = decode!(*data);
        let typ = MessageType::from_u8(code).ok_or(Error::UnsupportedMessageType(code))?;

        // Tags are chosen by the client and are opaque here.
        let tag: Tag = decode!(*data);

        Ok(MessageHeader { size, typ, tag })
    }

    /// Parse a 9P request type message from the cursor
    ///
    /// This is the primary method used by a server to parse requests from a
    /// client. The cursor must hold exactly the frame's payload,
    /// `header.payload_size()` bytes; see [`Parser::next_frame`] for carving
    /// frames out of a longer stream.
    pub fn parse_request<'b>(
        &self,
        header: MessageHeader,
        data: &mut Decoder<'b>,
    ) -> Result<Request<'b>> {
        self.check_payload(header, data)?;

        let request = match header.typ {
            MessageType::TVersion => Request::Version {
                msize: decode!(*data),
                version: decode!(*data),
            },
            MessageType::TAuth => Request::Auth {
                afid: decode!(*data),
                uname: decode!(*data),
                aname: decode!(*data),
            },
            MessageType::TFlush => Request::Flush {
                oldtag: decode!(*data),
            },
            MessageType::TAttach => Request::Attach {
                fid: decode!(*data),
                afid: decode!(*data),
                uname: decode!(*data),
                aname: decode!(*data),
            },
            MessageType::TWalk => {
                let fid = decode!(*data);
                let newfid = decode!(*data);
                let wnames = decode_walk_path(data)?;
                Request::Walk { fid, newfid, wnames }
            }
            MessageType::TOpen => Request::Open {
                fid: decode!(*data),
                mode: OpenMode(decode!(*data)),
            },
            MessageType::TCreate => Request::Create {
                fid: decode!(*data),
                name: decode!(*data),
                perm: decode!(*data),
                mode: OpenMode(decode!(*data)),
            },
            MessageType::TRead => Request::Read {
                fid: decode!(*data),
                offset: decode!(*data),
                count: decode!(*data),
            },
            MessageType::TWrite => Request::Write {
                fid: decode!(*data),
                offset: decode!(*data),
                data: decode!(*data),
            },
            MessageType::TClunk => Request::Clunk {
                fid: decode!(*data),
            },
            MessageType::TRemove => Request::Remove {
                fid: decode!(*data),
            },
            MessageType::TStat => Request::Stat {
                fid: decode!(*data),
            },
            MessageType::TWStat => Request::WStat {
                fid: decode!(*data),
                stat: decode!(*data),
            },
            MessageType::TSession => Request::Session {
                key: decode!(*data),
            },
            MessageType::TSRead => {
                let fid = decode!(*data);
                let path = decode_walk_path(data)?;
                Request::SRead { fid, path }
            }
            MessageType::TSWrite => {
                let fid = decode!(*data);
                let path = decode_walk_path(data)?;
                let payload = decode!(*data);
                Request::SWrite {
                    fid,
                    path,
                    data: payload,
                }
            }
            _ => return Err(Error::UnsupportedMessageType(header.typ as u8)),
        };

        Ok(request)
    }

    /// Parse a 9P response type message from the cursor
    ///
    /// This is the primary method used by a client to parse responses from
    /// the server. The cursor must hold exactly the frame's payload, as for
    /// [`Parser::parse_request`].
    pub fn parse_response<'b>(
        &self,
        header: MessageHeader,
        data: &mut Decoder<'b>,
    ) -> Result<Response<'b>> {
        self.check_payload(header, data)?;

        let response = match header.typ {
            MessageType::RVersion => Response::Version {
                msize: decode!(*data),
                version: decode!(*data),
            },
            MessageType::RAuth => Response::Auth {
                aqid: decode!(*data),
            },
            MessageType::RAttach => Response::Attach {
                qid: decode!(*data),
            },
            MessageType::RError => Response::Error {
                ename: decode!(*data),
            },
            MessageType::RWalk => {
                let wqids: Vec<Qid> = decode!(*data);
                if wqids.len() > MAXWELEM {
                    return Err(Error::TooManyWalkElements);
                }
                Response::Walk { wqids }
            }
            MessageType::ROpen => Response::Open {
                qid: decode!(*data),
                iounit: decode!(*data),
            },
            MessageType::RCreate => Response::Create {
                qid: decode!(*data),
                iounit: decode!(*data),
            },
            // The extension's short read/write replies share the layout of
            // the base replies and decode to the same variants; the original
            // type code stays visible in the header.
            MessageType::RRead | MessageType::RSRead => Response::Read {
                data: decode!(*data),
            },
            MessageType::RWrite | MessageType::RSWrite => Response::Write {
                count: decode!(*data),
            },
            MessageType::RStat => Response::Stat {
                dummy_size: decode!(*data),
                stat: decode!(*data),
            },

            // Responses that carry no payload
            MessageType::RFlush => Response::Flush,
            MessageType::RClunk => Response::Clunk,
            MessageType::RRemove => Response::Remove,
            MessageType::RWStat => Response::WStat,
            MessageType::RSession => Response::Session,

            _ => return Err(Error::UnsupportedMessageType(header.typ as u8)),
        };

        Ok(response)
    }

    /// Carve the next complete frame out of a byte stream
    ///
    /// Reads and validates one header, then splits exactly the frame's
    /// payload off the cursor so that the payload parse entry points see
    /// the per-frame cursor they require. The rest of the stream stays on
    /// `data` for the next call.
    pub fn next_frame<'b>(
        &self,
        data: &mut Decoder<'b>,
    ) -> Result<(MessageHeader, Decoder<'b>)> {
        let header = self.parse_header(data)?;
        let payload = data.take(header.payload_size() as usize)?;
        trace!(
            "framed {:?} message, tag {}, {} payload bytes",
            header.typ,
            header.tag,
            payload.len()
        );
        Ok((header, Decoder::new(payload)))
    }

    fn check_payload(&self, header: MessageHeader, data: &Decoder<'_>) -> Result<()> {
        if header.size > self.max_negotiated_message_size {
            return Err(Error::TooBig);
        }

        let expected = header.payload_size() as usize;
        if expected > data.remaining() {
            return Err(Error::NotEnoughData);
        }
        if expected < data.remaining() {
            return Err(Error::MoreThenExpectedData);
        }

        Ok(())
    }
}

fn decode_walk_path<'b>(data: &mut Decoder<'b>) -> Result<Vec<&'b str>> {
    let path: Vec<&str> = Decodable::decode(data)?;
    if path.len() > MAXWELEM {
        return Err(Error::TooManyWalkElements);
    }
    Ok(path)
}
