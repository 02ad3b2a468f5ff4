use crate::error::FastcgiError;
use crate::lowlevel::EndRequest;

use thiserror::Error;

/// Everything the application wrote back for one request.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Response {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,

    /// The decoded `EndRequest` body. `None` if the request didn't get that far, or if the body
    /// couldn't be understood.
    pub end_request: Option<EndRequest>,
}

impl Response {
    pub fn new() -> Response {
        Response::default()
    }

    pub fn app_status(&self) -> Option<u32> {
        self.end_request.map(|end| end.app_status)
    }
}

/// A request that didn't finish, along with whatever output arrived before it failed.
#[derive(Debug, Error)]
#[error("FastCGI request failed: {error}")]
pub struct RequestFailure {
    #[source]
    pub error: FastcgiError,
    pub partial: Response,
}

impl RequestFailure {
    pub fn new(error: FastcgiError, partial: Response) -> RequestFailure {
        RequestFailure { error, partial }
    }
}
