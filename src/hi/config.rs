use crate::s11n::{DEFAULT_CHUNK_SIZE, MAX_CONTENT_LENGTH};

/// Per-request knobs. The request id is not one of them; see `FASTCGI_REQUEST_ID`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    chunk_size: usize,
    keep_connection: bool,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            keep_connection: true,
        }
    }
}

impl SessionConfig {
    pub fn new() -> SessionConfig {
        SessionConfig::default()
    }

    /// Largest payload put in one `Params` or `Stdin` record. Clamped to what a record can hold.
    pub fn chunk_size(mut self, chunk_size: usize) -> SessionConfig {
        self.chunk_size = chunk_size.max(1).min(MAX_CONTENT_LENGTH);
        self
    }

    /// Whether to ask the application to leave the connection open after the request.
    pub fn keep_connection(mut self, keep_connection: bool) -> SessionConfig {
        self.keep_connection = keep_connection;
        self
    }

    pub fn get_chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn get_keep_connection(&self) -> bool {
        self.keep_connection
    }
}
