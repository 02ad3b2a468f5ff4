extern crate env_logger;
extern crate tokio;
extern crate tokio_fastcgi_client;

use tokio::net::TcpStream;
use tokio_fastcgi_client::*;

use std::env;
use std::io::{self, Write};
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:9000".to_owned());
    let uri = args.next().unwrap_or_else(|| "/".to_owned());

    let stream = TcpStream::connect(&addr).await.expect("failed to connect");

    let (path, query) = match uri.find('?') {
        Some(idx) => (&uri[..idx], &uri[idx + 1..]),
        None => (uri.as_str(), ""),
    };

    let mut client = FastcgiClient::new(stream);
    let params = Param::cgi_defaults("GET", path, query);
    let response = match client.request(params, tokio::io::empty()).await {
        Ok(response) => response,
        Err(failure) => {
            eprintln!("{}", failure);
            io::stdout().write_all(&failure.partial.stdout).unwrap();
            process::exit(1);
        }
    };

    io::stdout().write_all(&response.stdout).unwrap();
    if !response.stderr.is_empty() {
        eprintln!("--- stderr ---");
        io::stderr().write_all(&response.stderr).unwrap();
    }
    if let Some(end) = response.end_request {
        eprintln!("app status {}, {:?}", end.app_status, end.protocol_status);
    }
}
