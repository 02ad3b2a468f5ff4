//! s11n == serialization. Constants and structs that match the bytes that make up FastCGI records.

use super::endian::*;
use super::rawstruct::WireStruct;

pub const FASTCGI_VERSION: u8 = 1;

/// Every request goes out under this id; one request per connection at a time.
pub const FASTCGI_REQUEST_ID: u16 = 1;

/// Largest payload a single record can carry (16-bit content length).
pub const MAX_CONTENT_LENGTH: usize = 0xFFFF;

/// Payload size used when framing the params and stdin streams.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

pub const FLAG_KEEP_CONNECTION: u8 = 1;

enum_from_primitive! {
    #[repr(u8)]
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub enum RecordType {
        BeginRequest = 1,
        AbortRequest = 2,
        EndRequest = 3,
        Params = 4,
        Stdin = 5,
        Stdout = 6,
        Stderr = 7,
        Data = 8,
        GetValues = 9,
        GetValuesResult = 10,
        UnknownType = 11,
    }
}

enum_from_primitive! {
    #[repr(u16)]
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub enum Role {
        Responder = 1,
        Authorizer = 2,
        Filter = 3,
    }
}

enum_from_primitive! {
    #[repr(u8)]
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub enum ProtocolStatus {
        RequestComplete = 0,
        CantMultiplexConnections = 1,
        Overloaded = 2,
        UnknownRole = 3,
    }
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
pub struct FastcgiRecordHeader {
    pub version: u8,
    pub record_type: u8,
    pub request_id: NetworkU16,
    pub content_length: NetworkU16,
    pub padding_length: u8,
    pub reserved: u8,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
pub struct BeginRequestBody {
    pub role: NetworkU16,
    pub flags: u8,
    pub reserved: [u8; 5],
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug)]
pub struct EndRequestBody {
    pub app_status: NetworkU32,
    pub protocol_status: u8,
    pub reserved: [u8; 3],
}

// All fields are byte arrays, so any 8 bytes are a valid value of each.
unsafe impl WireStruct for FastcgiRecordHeader {}
unsafe impl WireStruct for BeginRequestBody {}
unsafe impl WireStruct for EndRequestBody {}

pub const HEADER_LEN: usize = std::mem::size_of::<FastcgiRecordHeader>();
