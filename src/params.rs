//! Name-value pairs and the byte stream they are serialized into for `Params` records.

use super::error::{FastcgiError, Result};
use super::length::*;

use bytes::BytesMut;
use tokio::io::{AsyncRead, ReadBuf};

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::vec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: Vec<u8>,
}

impl Param {
    pub fn new<N: Into<String>, V: Into<Vec<u8>>>(name: N, value: V) -> Param {
        Param {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The minimal CGI environment for a request with the given method, path and query string.
    pub fn cgi_defaults(method: &str, uri: &str, query: &str) -> Vec<Param> {
        vec![
            Param::new("QUERY_STRING", query),
            Param::new("REQUEST_METHOD", method),
            Param::new("REQUEST_URI", uri),
            Param::new("REMOTE_ADDR", "127.0.0.1"),
            Param::new("SCRIPT_NAME", "fastcgi"),
        ]
    }
}

pub fn write_param(buf: &mut BytesMut, param: &Param) -> Result<()> {
    let name = param.name.as_bytes();
    buf.reserve(encoded_len(name.len()) + encoded_len(param.value.len())
                + name.len() + param.value.len());
    write_len(buf, name.len())?;
    write_len(buf, param.value.len())?;
    buf.extend_from_slice(name);
    buf.extend_from_slice(&param.value);
    Ok(())
}

pub fn write_params(params: &[Param]) -> Result<BytesMut> {
    let mut out = BytesMut::new();
    for param in params {
        write_param(&mut out, param)?;
    }
    Ok(out)
}

/// Parse the concatenated contents of a params stream.
pub fn read_params(buf: &mut BytesMut) -> Result<Vec<Param>> {
    let mut params = vec![];
    while !buf.is_empty() {
        let name_len = read_len(buf)?;
        let value_len = read_len(buf)?;
        if buf.len() < name_len || buf.len() - name_len < value_len {
            debug!("name-value pair wants {} + {} bytes, only {} left",
                   name_len, value_len, buf.len());
            return Err(FastcgiError::IncompleteRead);
        }
        let name = buf.split_to(name_len);
        let value = buf.split_to(value_len);
        let param = Param::new(String::from_utf8_lossy(&name), value.to_vec());
        debug!("param ({}, {})", param.name, String::from_utf8_lossy(&param.value));
        params.push(param);
    }
    Ok(params)
}

/// Serializes params lazily, one pair at a time, as they are read.
///
/// All lengths are checked up front so the stream itself can't fail halfway through.
#[derive(Debug)]
pub struct ParamStream {
    params: vec::IntoIter<Param>,
    pending: BytesMut,
}

impl ParamStream {
    pub fn new(params: Vec<Param>) -> Result<ParamStream> {
        for param in &params {
            check_len(param.name.len())?;
            check_len(param.value.len())?;
        }
        Ok(ParamStream {
            params: params.into_iter(),
            pending: BytesMut::new(),
        })
    }
}

impl AsyncRead for ParamStream {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>)
        -> Poll<io::Result<()>>
    {
        let this = self.get_mut();
        while this.pending.is_empty() {
            match this.params.next() {
                Some(param) => {
                    write_param(&mut this.pending, &param)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                }
                None => return Poll::Ready(Ok(())),
            }
        }
        let n = buf.remaining().min(this.pending.len());
        buf.put_slice(&this.pending.split_to(n));
        Poll::Ready(Ok(()))
    }
}
