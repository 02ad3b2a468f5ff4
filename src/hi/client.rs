use crate::error::FastcgiError;
use crate::params::Param;
use super::config::SessionConfig;
use super::response::{RequestFailure, Response};
use super::session::Session;
use super::transport::Connection;

use tokio::io::AsyncRead;

/// A connection to a FastCGI responder, one request at a time.
///
/// The client never closes the connection itself. Get it back with `into_inner` when done,
/// including after a failed request.
pub struct FastcgiClient<S> {
    io: Option<S>,
    failed: bool,
    config: SessionConfig,
}

impl<S: Connection> FastcgiClient<S> {
    pub fn new(io: S) -> FastcgiClient<S> {
        FastcgiClient::with_config(io, SessionConfig::default())
    }

    pub fn with_config(io: S, config: SessionConfig) -> FastcgiClient<S> {
        FastcgiClient {
            io: Some(io),
            failed: false,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// False once a request has failed. The stream is still held, but its protocol state is
    /// unknown, so no further requests go out on it.
    pub fn is_connected(&self) -> bool {
        self.io.is_some() && !self.failed
    }

    /// Send the params and body, and collect the application's output.
    ///
    /// On failure, whatever stdout and stderr had arrived is in `RequestFailure::partial`.
    pub async fn request<B>(&mut self, params: Vec<Param>, body: B)
        -> Result<Response, RequestFailure>
        where B: AsyncRead + Unpin + Send + 'static
    {
        let io = match self.io.take() {
            Some(io) if !self.failed => io,
            io => {
                self.io = io;
                return Err(RequestFailure::new(FastcgiError::ConnectionLost, Response::new()));
            }
        };
        let outcome = Session::new(self.config.clone()).run(io, params, body).await;
        debug!("request finished in state {:?}", outcome.state);
        self.io = outcome.connection;
        self.failed = outcome.result.is_err();
        outcome.result
    }

    /// Hand the stream back. Only `None` if the stdin task died without returning its half.
    pub fn into_inner(self) -> Option<S> {
        self.io
    }
}
