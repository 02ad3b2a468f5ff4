//! A FastCGI client: sends one responder request over an established byte stream and collects
//! the application's stdout and stderr.
//!
//! ```ignore
//! let stream = tokio::net::TcpStream::connect("127.0.0.1:9000").await?;
//! let mut client = FastcgiClient::new(stream);
//! let params = Param::cgi_defaults("GET", "/", "");
//! let response = client.request(params, tokio::io::empty()).await?;
//! println!("{}", String::from_utf8_lossy(&response.stdout));
//! ```

extern crate byteorder;
extern crate bytes;
#[macro_use] extern crate enum_primitive;
extern crate futures;
#[macro_use] extern crate log;
extern crate thiserror;
extern crate tokio;
extern crate tokio_util;

mod endian;
mod error;
mod hi;
mod length;
mod lowlevel;
mod params;
mod rawstruct;
mod s11n;

pub use error::{FastcgiError, Result};
pub use hi::client::FastcgiClient;
pub use hi::config::SessionConfig;
pub use hi::response::{RequestFailure, Response};
pub use hi::session::{Session, SessionOutcome, SessionState};
pub use hi::stream_writer::write_stream;
pub use hi::transport::Connection;
pub use length::{read_len, write_len, MAX_PARAM_LENGTH};
pub use lowlevel::{expect_record, read_record, BeginRequest, EndRequest, FastcgiLowlevelCodec,
                   FastcgiRecord};
pub use params::{read_params, write_params, Param, ParamStream};
pub use s11n::{DEFAULT_CHUNK_SIZE, FASTCGI_REQUEST_ID, FASTCGI_VERSION, HEADER_LEN,
               MAX_CONTENT_LENGTH, ProtocolStatus, RecordType, Role};
