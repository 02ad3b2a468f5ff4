pub mod client;
pub mod config;
pub mod response;
pub mod session;
pub mod stream_writer;
pub mod transport;
