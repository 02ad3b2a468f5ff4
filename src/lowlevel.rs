use super::endian::*;
use super::error::{FastcgiError, Result};
use super::rawstruct::*;
use super::s11n::*;

use bytes::{Buf, BytesMut};
use enum_primitive::FromPrimitive;
use futures::{Stream, StreamExt};
use tokio_util::codec::{Decoder, Encoder};

/// One framed unit of the wire protocol.
///
/// The type is kept as the raw byte so records of types this crate doesn't know about still make
/// it through the codec intact; use `kind()` to get the typed version.
#[derive(Debug, Clone, PartialEq)]
pub struct FastcgiRecord {
    pub record_type: u8,
    pub request_id: u16,
    pub content: BytesMut,
}

impl FastcgiRecord {
    pub fn new(record_type: RecordType, request_id: u16, content: BytesMut) -> FastcgiRecord {
        FastcgiRecord {
            record_type: record_type as u8,
            request_id,
            content,
        }
    }

    /// The empty record that closes a params, stdin, stdout or stderr stream.
    pub fn end_of_stream(record_type: RecordType, request_id: u16) -> FastcgiRecord {
        FastcgiRecord::new(record_type, request_id, BytesMut::new())
    }

    pub fn kind(&self) -> Option<RecordType> {
        RecordType::from_u8(self.record_type)
    }

    pub fn is(&self, record_type: RecordType) -> bool {
        self.record_type == record_type as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeginRequest {
    pub role: Role,
    pub keep_connection: bool,
}

impl BeginRequest {
    pub fn encode(&self) -> BytesMut {
        let raw = BeginRequestBody {
            role: NetworkU16::new(self.role as u16),
            flags: if self.keep_connection { FLAG_KEEP_CONNECTION } else { 0 },
            reserved: [0u8; 5],
        };
        BytesMut::from(as_bytes(&raw))
    }

    pub fn decode(content: &[u8]) -> Option<BeginRequest> {
        let raw: BeginRequestBody = from_bytes(content)?;
        let role = match Role::from_u16(raw.role.get()) {
            Some(role) => role,
            None => {
                warn!("unknown role {}", raw.role.get());
                return None;
            }
        };
        Some(BeginRequest {
            role,
            keep_connection: (raw.flags & FLAG_KEEP_CONNECTION) == FLAG_KEEP_CONNECTION,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndRequest {
    pub app_status: u32,
    pub protocol_status: ProtocolStatus,
}

impl EndRequest {
    pub fn encode(&self) -> BytesMut {
        let raw = EndRequestBody {
            app_status: NetworkU32::new(self.app_status),
            protocol_status: self.protocol_status as u8,
            reserved: [0u8; 3],
        };
        BytesMut::from(as_bytes(&raw))
    }

    pub fn decode(content: &[u8]) -> Option<EndRequest> {
        let raw: EndRequestBody = match from_bytes(content) {
            Some(raw) => raw,
            None => {
                warn!("EndRequest body is only {} bytes", content.len());
                return None;
            }
        };
        let protocol_status = match ProtocolStatus::from_u8(raw.protocol_status) {
            Some(status) => status,
            None => {
                warn!("unknown protocol status {}", raw.protocol_status);
                return None;
            }
        };
        Some(EndRequest {
            app_status: raw.app_status.get(),
            protocol_status,
        })
    }
}

/// Frames records on a byte stream. Records are always written without padding; incoming
/// padding is skipped.
#[derive(Debug, Default)]
pub struct FastcgiLowlevelCodec;

fn peek_header(buf: &BytesMut) -> Option<FastcgiRecordHeader> {
    if buf.len() < HEADER_LEN {
        trace!("insufficient buffer for header");
        None
    } else {
        from_bytes(&buf[..HEADER_LEN])
    }
}

impl Decoder for FastcgiLowlevelCodec {
    type Item = FastcgiRecord;
    type Error = FastcgiError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<FastcgiRecord>> {
        let header = match peek_header(buf) {
            Some(header) => header,
            None => return Ok(None),
        };

        if header.version != FASTCGI_VERSION {
            // Drop the header only; nothing past it can be trusted.
            buf.advance(HEADER_LEN);
            error!("unexpected FCGI version {}", header.version);
            return Err(FastcgiError::ProtocolVersion(header.version));
        }

        let content_len = header.content_length.get() as usize;
        let padding_len = header.padding_length as usize;
        let record_len = HEADER_LEN + content_len + padding_len;
        if buf.len() < record_len {
            debug!("insufficient buffer for record: have {}, need {}", buf.len(), record_len);
            buf.reserve(record_len - buf.len());
            return Ok(None);
        }

        buf.advance(HEADER_LEN);
        let content = buf.split_to(content_len);
        buf.advance(padding_len);

        let record = FastcgiRecord {
            record_type: header.record_type,
            request_id: header.request_id.get(),
            content,
        };

        match record.kind() {
            Some(kind) => debug!("request id: {}; record type: {:?}, {} bytes of content",
                                 record.request_id, kind, content_len),
            None => warn!("request id: {}; unknown record type {}, {} bytes of content",
                          record.request_id, record.record_type, content_len),
        }

        Ok(Some(record))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<FastcgiRecord>> {
        match self.decode(buf)? {
            Some(record) => Ok(Some(record)),
            None if buf.is_empty() => Ok(None),
            None => {
                error!("stream closed with {} bytes of a partial record buffered", buf.len());
                Err(FastcgiError::IncompleteRead)
            }
        }
    }
}

impl Encoder<FastcgiRecord> for FastcgiLowlevelCodec {
    type Error = FastcgiError;

    fn encode(&mut self, msg: FastcgiRecord, buf: &mut BytesMut) -> Result<()> {
        if msg.content.len() > MAX_CONTENT_LENGTH {
            error!("type {} record is too long: {}", msg.record_type, msg.content.len());
            return Err(FastcgiError::RecordTooLong(msg.content.len()));
        }

        let header = FastcgiRecordHeader {
            version: FASTCGI_VERSION,
            record_type: msg.record_type,
            request_id: NetworkU16::new(msg.request_id),
            content_length: NetworkU16::new(msg.content.len() as u16),
            padding_length: 0,
            reserved: 0,
        };
        buf.reserve(HEADER_LEN + msg.content.len());
        buf.extend_from_slice(as_bytes(&header));
        buf.extend_from_slice(&msg.content);

        Ok(())
    }
}

/// Read the next record, treating a cleanly closed stream as an error.
pub async fn read_record<S>(records: &mut S) -> Result<FastcgiRecord>
    where S: Stream<Item = Result<FastcgiRecord>> + Unpin
{
    match records.next().await {
        Some(record) => record,
        None => {
            error!("stream closed while waiting for a record");
            Err(FastcgiError::IncompleteRead)
        }
    }
}

/// Read the next record and fail unless it is of the given type.
pub async fn expect_record<S>(records: &mut S, expected: RecordType) -> Result<FastcgiRecord>
    where S: Stream<Item = Result<FastcgiRecord>> + Unpin
{
    let record = read_record(records).await?;
    if !record.is(expected) {
        error!("unexpected record type {} (was expecting {:?})", record.record_type, expected);
        return Err(FastcgiError::UnexpectedRecordType {
            got: record.record_type,
            expected: format!("{:?}", expected),
        });
    }
    Ok(record)
}
