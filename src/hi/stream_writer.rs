//! Framing of outgoing streams (`Params`, `Stdin`) and the background task that sends the body.

use crate::error::{FastcgiError, Result};
use crate::lowlevel::FastcgiRecord;
use crate::s11n::{RecordType, FASTCGI_REQUEST_ID};
use super::transport::{Connection, RecordWriter};

use bytes::BytesMut;
use futures::channel::oneshot;
use futures::future::{self, Either};
use futures::{pin_mut, Sink, SinkExt};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read until `chunk` is full or the reader is exhausted. Only a short read means end of input.
async fn fill_chunk<R>(reader: &mut R, chunk: &mut [u8]) -> Result<usize>
    where R: AsyncRead + Unpin
{
    let mut filled = 0;
    while filled < chunk.len() {
        let n = reader.read(&mut chunk[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Copy `reader` into records of the given type, at most `chunk_size` bytes each, then close the
/// stream with an empty record. Each record is flushed as it is sent.
///
/// Returns the number of non-empty records written.
pub async fn write_stream<Si, R>(
    sink: &mut Si,
    record_type: RecordType,
    reader: &mut R,
    chunk_size: usize,
) -> Result<usize>
    where Si: Sink<FastcgiRecord, Error = FastcgiError> + Unpin,
          R: AsyncRead + Unpin
{
    let mut chunk = vec![0u8; chunk_size];
    let mut records = 0;
    loop {
        let n = fill_chunk(reader, &mut chunk).await?;
        if n > 0 {
            sink.send(FastcgiRecord::new(record_type, FASTCGI_REQUEST_ID,
                                         BytesMut::from(&chunk[..n]))).await?;
            records += 1;
        }
        if n < chunk.len() {
            break;
        }
    }
    debug!("{:?} stream done after {} records", record_type, records);
    sink.send(FastcgiRecord::end_of_stream(record_type, FASTCGI_REQUEST_ID)).await?;
    Ok(records)
}

/// `None` in place of a result means the writer was told to stop before the body was done.
type Outcome<S> = (Option<Result<usize>>, RecordWriter<S>);

/// The one background task of a request: it owns the write side of the connection while the
/// body goes out, and always hands it back together with its result.
pub struct BodyWriter<S: Connection> {
    outcome: oneshot::Receiver<Outcome<S>>,
    cancel: oneshot::Sender<()>,
}

impl<S: Connection> BodyWriter<S> {
    pub fn spawn<B>(mut writer: RecordWriter<S>, mut body: B, chunk_size: usize) -> BodyWriter<S>
        where B: AsyncRead + Unpin + Send + 'static
    {
        let (sender, outcome) = oneshot::channel();
        let (cancel, cancelled) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let result = {
                let write = write_stream(&mut writer, RecordType::Stdin, &mut body, chunk_size);
                pin_mut!(write);
                match future::select(write, cancelled).await {
                    Either::Left((result, _)) => Some(result),
                    Either::Right(_) => {
                        debug!("stdin writer stopped before the body was sent");
                        None
                    }
                }
            };
            if let Some(Err(ref e)) = result {
                debug!("stdin writer failed: {}", e);
            }
            if sender.send((result, writer)).is_err() {
                debug!("nobody is waiting for the stdin writer");
            }
        });
        BodyWriter { outcome, cancel }
    }

    /// Wait for the body to be fully sent. The write side comes back whenever the task got as
    /// far as reporting, even if sending the body failed.
    pub async fn finish(self) -> (Result<()>, Option<RecordWriter<S>>) {
        let BodyWriter { outcome, cancel } = self;
        let outcome = outcome.await;
        drop(cancel);
        match outcome {
            Ok((Some(Ok(records)), writer)) => {
                debug!("stdin writer finished after {} records", records);
                (Ok(()), Some(writer))
            }
            Ok((Some(Err(e)), writer)) => (Err(e), Some(writer)),
            Ok((None, writer)) => (Err(FastcgiError::BodyWriterLost), Some(writer)),
            Err(oneshot::Canceled) => {
                error!("stdin writer exited without a result");
                (Err(FastcgiError::BodyWriterLost), None)
            }
        }
    }

    /// Stop sending the body, even if the writer is blocked on a full connection, and take the
    /// write side back. A record may have been left half-written.
    pub async fn cancel(self) -> Option<RecordWriter<S>> {
        let BodyWriter { outcome, cancel } = self;
        if cancel.send(()).is_err() {
            debug!("stdin writer already finished");
        }
        match outcome.await {
            Ok((_, writer)) => Some(writer),
            Err(oneshot::Canceled) => {
                warn!("stdin writer exited without handing back the connection");
                None
            }
        }
    }
}
