use crate::lowlevel::FastcgiLowlevelCodec;

use tokio::io::{self, AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};

/// A byte stream that can carry a FastCGI conversation: any ordered, reliable duplex stream
/// that can be split and handed to a background task.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Connection for T {}

pub type RecordReader<S> = FramedRead<ReadHalf<S>, FastcgiLowlevelCodec>;
pub type RecordWriter<S> = FramedWrite<WriteHalf<S>, FastcgiLowlevelCodec>;

pub fn split<S: Connection>(stream: S) -> (RecordReader<S>, RecordWriter<S>) {
    let (read_half, write_half) = io::split(stream);
    (FramedRead::new(read_half, FastcgiLowlevelCodec),
     FramedWrite::new(write_half, FastcgiLowlevelCodec))
}

/// Put the stream back together once both directions are idle.
pub fn unsplit<S: Connection>(reader: RecordReader<S>, writer: RecordWriter<S>) -> S {
    if !reader.read_buffer().is_empty() {
        warn!("discarding {} unread bytes", reader.read_buffer().len());
    }
    reader.into_inner().unsplit(writer.into_inner())
}
