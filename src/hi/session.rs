//! One request over one connection, from `BeginRequest` to `EndRequest`.

use crate::error::{FastcgiError, Result};
use crate::lowlevel::*;
use crate::params::{Param, ParamStream};
use crate::s11n::*;
use super::config::SessionConfig;
use super::response::{RequestFailure, Response};
use super::stream_writer::{write_stream, BodyWriter};
use super::transport::{self, Connection, RecordReader, RecordWriter};

use futures::SinkExt;
use tokio::io::AsyncRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    BeginSent,
    ParamsSent,
    Streaming,
    Completed,
    Failed,
}

/// How a session ended: the response (or the failure with its partial response), plus the
/// connection. The session never closes the connection; it is only missing if the stdin task
/// died without handing its half back. After a failure the protocol state on it is unknown.
pub struct SessionOutcome<S> {
    pub state: SessionState,
    pub result: std::result::Result<Response, RequestFailure>,
    pub connection: Option<S>,
}

/// Drives a single request. The caller's task reads the response; a spawned task writes the body.
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    response: Response,
}

impl Session {
    pub fn new(config: SessionConfig) -> Session {
        Session {
            config,
            state: SessionState::Idle,
            response: Response::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn set_state(&mut self, state: SessionState) {
        debug!("session: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    async fn send_begin_request<S: Connection>(&mut self, writer: &mut RecordWriter<S>)
        -> Result<()>
    {
        let body = BeginRequest {
            role: Role::Responder,
            keep_connection: self.config.get_keep_connection(),
        }.encode();
        let record = FastcgiRecord::new(RecordType::BeginRequest, FASTCGI_REQUEST_ID, body);
        writer.send(record).await?;
        self.set_state(SessionState::BeginSent);
        Ok(())
    }

    async fn send_params<S: Connection>(
        &mut self,
        writer: &mut RecordWriter<S>,
        mut params: ParamStream,
    ) -> Result<()> {
        let chunk_size = self.config.get_chunk_size();
        write_stream(writer, RecordType::Params, &mut params, chunk_size).await?;
        self.set_state(SessionState::ParamsSent);
        Ok(())
    }

    /// Collect stdout and stderr until `EndRequest`.
    async fn read_response<S: Connection>(&mut self, reader: &mut RecordReader<S>) -> Result<()> {
        loop {
            let record = read_record(reader).await?;
            if record.request_id != FASTCGI_REQUEST_ID {
                warn!("record for request id {} on a connection only carrying {}",
                      record.request_id, FASTCGI_REQUEST_ID);
            }
            match record.kind() {
                Some(RecordType::Stdout) => {
                    self.response.stdout.extend_from_slice(&record.content);
                }
                Some(RecordType::Stderr) => {
                    if !record.content.is_empty() {
                        warn!("application stderr: {}", String::from_utf8_lossy(&record.content));
                    }
                    self.response.stderr.extend_from_slice(&record.content);
                }
                Some(RecordType::EndRequest) => {
                    self.response.end_request = EndRequest::decode(&record.content);
                    debug!("end of request: {:?}", self.response.end_request);
                    return Ok(());
                }
                _ => {
                    error!("unexpected record type {} while reading the response",
                           record.record_type);
                    return Err(FastcgiError::UnexpectedRecordType {
                        got: record.record_type,
                        expected: "Stdout, Stderr or EndRequest".to_owned(),
                    });
                }
            }
        }
    }

    fn fail<S>(mut self, error: FastcgiError, connection: Option<S>) -> SessionOutcome<S> {
        error!("request failed in state {:?}: {}", self.state, error);
        self.set_state(SessionState::Failed);
        SessionOutcome {
            state: self.state,
            result: Err(RequestFailure::new(error, self.response)),
            connection,
        }
    }

    /// Run the whole request over `io`. Output received before a failure is kept in the failure.
    pub async fn run<S, B>(mut self, io: S, params: Vec<Param>, body: B) -> SessionOutcome<S>
        where S: Connection,
              B: AsyncRead + Unpin + Send + 'static
    {
        let params = match ParamStream::new(params) {
            Ok(params) => params,
            Err(e) => return self.fail(e, Some(io)),
        };

        let (mut reader, mut writer) = transport::split(io);
        if let Err(e) = self.send_begin_request(&mut writer).await {
            return self.fail(e, Some(transport::unsplit(reader, writer)));
        }
        if let Err(e) = self.send_params(&mut writer, params).await {
            return self.fail(e, Some(transport::unsplit(reader, writer)));
        }

        // The application may answer before it has read all of stdin, so the body goes out from
        // its own task while this one reads. The writer is not touched here again until the task
        // hands it back.
        let body_writer = BodyWriter::spawn(writer, body, self.config.get_chunk_size());
        self.set_state(SessionState::Streaming);

        if let Err(e) = self.read_response(&mut reader).await {
            // Whatever the writer is blocked on, it won't be unblocked by this side any more.
            let connection = body_writer.cancel().await
                .map(|writer| transport::unsplit(reader, writer));
            return self.fail(e, connection);
        }

        let (result, writer) = body_writer.finish().await;
        let connection = writer.map(|writer| transport::unsplit(reader, writer));
        match result {
            Ok(()) => {
                self.set_state(SessionState::Completed);
                SessionOutcome {
                    state: self.state,
                    result: Ok(self.response),
                    connection,
                }
            }
            Err(e) => self.fail(e, connection),
        }
    }
}
