extern crate bytes;
extern crate env_logger;
extern crate futures;
extern crate tokio;
extern crate tokio_fastcgi_client;
extern crate tokio_util;

use bytes::BytesMut;
use futures::SinkExt;
use tokio::io::{duplex, AsyncRead, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio_fastcgi_client::*;
use tokio_util::codec::Framed;

use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

type Peer = Framed<DuplexStream, FastcgiLowlevelCodec>;

fn setup(buffer: usize) -> (DuplexStream, Peer) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (client, server) = duplex(buffer);
    (client, Framed::new(server, FastcgiLowlevelCodec))
}

fn record(record_type: RecordType, content: &[u8]) -> FastcgiRecord {
    FastcgiRecord::new(record_type, FASTCGI_REQUEST_ID, BytesMut::from(content))
}

fn end_request(app_status: u32) -> FastcgiRecord {
    let end = EndRequest { app_status, protocol_status: ProtocolStatus::RequestComplete };
    record(RecordType::EndRequest, &end.encode())
}

/// Reads BeginRequest and the params stream the way an application would.
async fn read_preamble(peer: &mut Peer) -> (BeginRequest, Vec<Param>) {
    let begin = expect_record(peer, RecordType::BeginRequest).await.unwrap();
    let begin = BeginRequest::decode(&begin.content).unwrap();
    let mut params = BytesMut::new();
    loop {
        let rec = expect_record(peer, RecordType::Params).await.unwrap();
        assert!(rec.content.len() <= DEFAULT_CHUNK_SIZE);
        if rec.content.is_empty() {
            break;
        }
        params.extend_from_slice(&rec.content);
    }
    (begin, read_params(&mut params).unwrap())
}

/// Reads stdin to its empty record. Returns the body and the number of non-empty records.
async fn read_stdin(peer: &mut Peer) -> (Vec<u8>, usize) {
    let mut body = vec![];
    let mut records = 0;
    loop {
        let rec = expect_record(peer, RecordType::Stdin).await.unwrap();
        if rec.content.is_empty() {
            return (body, records);
        }
        records += 1;
        body.extend_from_slice(&rec.content);
    }
}

fn expect_failure(result: std::result::Result<Response, RequestFailure>) -> RequestFailure {
    match result {
        Ok(response) => panic!("request unexpectedly succeeded: {:?}", response),
        Err(failure) => failure,
    }
}

#[tokio::test]
async fn simple_get() {
    let (client, mut peer) = setup(64 * 1024);

    let app = tokio::spawn(async move {
        let (begin, params) = read_preamble(&mut peer).await;
        let (body, records) = read_stdin(&mut peer).await;
        peer.send(record(RecordType::Stdout, b"Status: 200 OK\r\n\r\nhi")).await.unwrap();
        peer.send(end_request(0)).await.unwrap();
        (begin, params, body, records)
    });

    let mut client = FastcgiClient::new(client);
    let response = client
        .request(vec![Param::new("REQUEST_METHOD", "GET")], tokio::io::empty())
        .await
        .unwrap();

    assert_eq!(&b"Status: 200 OK\r\n\r\nhi"[..], &response.stdout[..]);
    assert!(response.stderr.is_empty());
    assert_eq!(Some(0), response.app_status());
    assert_eq!(Some(ProtocolStatus::RequestComplete),
               response.end_request.map(|end| end.protocol_status));
    assert!(client.is_connected());

    let (begin, params, body, records) = app.await.unwrap();
    assert_eq!(BeginRequest { role: Role::Responder, keep_connection: true }, begin);
    assert_eq!(vec![Param::new("REQUEST_METHOD", "GET")], params);
    assert!(body.is_empty());
    assert_eq!(0, records);
}

#[tokio::test]
async fn body_is_chunked() {
    let (client, mut peer) = setup(64 * 1024);
    let body: Vec<u8> = (0..3 * 2048 + 10).map(|i| (i % 251) as u8).collect();
    let expected = body.clone();

    let app = tokio::spawn(async move {
        let (_begin, params) = read_preamble(&mut peer).await;
        let (body, records) = read_stdin(&mut peer).await;
        peer.send(end_request(0)).await.unwrap();
        (params, body, records)
    });

    let params = Param::cgi_defaults("POST", "/upload", "x=1");
    let mut client = FastcgiClient::new(client);
    client.request(params.clone(), Cursor::new(body)).await.unwrap();

    let (received_params, received, records) = app.await.unwrap();
    assert_eq!(params, received_params);
    assert_eq!(expected, received);
    assert_eq!(4, records);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn output_before_body_is_read() {
    // A tiny pipe and an application that answers at length before touching stdin: the
    // client has to drain stdout while the body is still being written.
    let (client, mut peer) = setup(1024);
    let body = vec![b'i'; 256 * 1024];

    let app = tokio::spawn(async move {
        read_preamble(&mut peer).await;
        for _ in 0..64 {
            peer.send(record(RecordType::Stdout, &[b'o'; 2048])).await.unwrap();
        }
        let (body, _records) = read_stdin(&mut peer).await;
        peer.send(record(RecordType::Stdout, b"!")).await.unwrap();
        peer.send(end_request(0)).await.unwrap();
        body.len()
    });

    let mut client = FastcgiClient::new(client);
    let response = client.request(vec![], Cursor::new(body)).await.unwrap();

    assert_eq!(64 * 2048 + 1, response.stdout.len());
    assert_eq!(Some(&b'!'), response.stdout.last());
    assert_eq!(256 * 1024, app.await.unwrap());
}

#[tokio::test]
async fn echo_while_body_streams() {
    let (client, mut peer) = setup(512);
    let body: Vec<u8> = (0..10_000).map(|i| (i % 7) as u8).collect();
    let expected = body.clone();

    tokio::spawn(async move {
        read_preamble(&mut peer).await;
        loop {
            let rec = expect_record(&mut peer, RecordType::Stdin).await.unwrap();
            if rec.content.is_empty() {
                break;
            }
            peer.send(record(RecordType::Stdout, &rec.content)).await.unwrap();
        }
        peer.send(record(RecordType::Stdout, b"")).await.unwrap();
        peer.send(end_request(0)).await.unwrap();
    });

    let mut client = FastcgiClient::new(client);
    let response = client.request(vec![], Cursor::new(body)).await.unwrap();
    assert_eq!(expected, response.stdout);
}

#[tokio::test]
async fn stderr_and_app_status() {
    let (client, mut peer) = setup(64 * 1024);

    tokio::spawn(async move {
        read_preamble(&mut peer).await;
        read_stdin(&mut peer).await;
        peer.send(record(RecordType::Stderr, b"warning: ")).await.unwrap();
        peer.send(record(RecordType::Stdout, b"body")).await.unwrap();
        peer.send(record(RecordType::Stderr, b"low disk")).await.unwrap();
        peer.send(record(RecordType::Stderr, b"")).await.unwrap();
        peer.send(end_request(3)).await.unwrap();
    });

    let mut client = FastcgiClient::new(client);
    let response = client.request(vec![], tokio::io::empty()).await.unwrap();
    assert_eq!(&b"body"[..], &response.stdout[..]);
    assert_eq!(&b"warning: low disk"[..], &response.stderr[..]);
    assert_eq!(Some(3), response.app_status());
}

#[tokio::test]
async fn unknown_record_type_keeps_partial_output() {
    let (client, mut peer) = setup(64 * 1024);

    tokio::spawn(async move {
        read_preamble(&mut peer).await;
        peer.send(record(RecordType::Stdout, b"partial")).await.unwrap();
        peer.send(record(RecordType::Stderr, b"oops")).await.unwrap();
        let mystery = FastcgiRecord {
            record_type: 42,
            request_id: FASTCGI_REQUEST_ID,
            content: BytesMut::from(&b"??"[..]),
        };
        peer.send(mystery).await.unwrap();
        // Hold the connection open until the client gives up on it.
        while let Some(Ok(_)) = futures::StreamExt::next(&mut peer).await {}
    });

    let mut client = FastcgiClient::new(client);
    let failure = expect_failure(client.request(vec![], tokio::io::empty()).await);
    match failure.error {
        FastcgiError::UnexpectedRecordType { got: 42, .. } => (),
        ref other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(&b"partial"[..], &failure.partial.stdout[..]);
    assert_eq!(&b"oops"[..], &failure.partial.stderr[..]);
    assert_eq!(None, failure.partial.end_request);
    assert!(!client.is_connected());

    let again = expect_failure(client.request(vec![], tokio::io::empty()).await);
    match again.error {
        FastcgiError::ConnectionLost => (),
        ref other => panic!("unexpected error {:?}", other),
    }
    assert!(client.into_inner().is_some());
}

#[tokio::test]
async fn writer_blocked_on_unread_stdin_is_stopped() {
    // The application never reads stdin, so the body writer is stuck on a full pipe when the
    // bad record arrives.
    let (client, mut peer) = setup(1024);

    let app = tokio::spawn(async move {
        read_preamble(&mut peer).await;
        peer.send(record(RecordType::Stdout, b"x")).await.unwrap();
        let mystery = FastcgiRecord {
            record_type: 99,
            request_id: FASTCGI_REQUEST_ID,
            content: BytesMut::new(),
        };
        peer.send(mystery).await.unwrap();
        peer
    });

    let mut client = FastcgiClient::new(client);
    let request = client.request(vec![], Cursor::new(vec![b'i'; 1024 * 1024]));
    let result = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .expect("request hung on the blocked body writer");
    let failure = expect_failure(result);
    match failure.error {
        FastcgiError::UnexpectedRecordType { got: 99, .. } => (),
        ref other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(&b"x"[..], &failure.partial.stdout[..]);
    assert!(!client.is_connected());
    assert!(client.into_inner().is_some());
    drop(app.await.unwrap());
}

#[tokio::test]
async fn management_record_is_unexpected() {
    let (client, mut peer) = setup(64 * 1024);

    tokio::spawn(async move {
        read_preamble(&mut peer).await;
        read_stdin(&mut peer).await;
        peer.send(record(RecordType::GetValuesResult, b"")).await.unwrap();
    });

    let mut client = FastcgiClient::new(client);
    let failure = expect_failure(client.request(vec![], tokio::io::empty()).await);
    match failure.error {
        FastcgiError::UnexpectedRecordType { got: 10, .. } => (),
        ref other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn peer_hangs_up_mid_response() {
    let (client, mut peer) = setup(64 * 1024);

    tokio::spawn(async move {
        read_preamble(&mut peer).await;
        read_stdin(&mut peer).await;
        peer.send(record(RecordType::Stdout, b"abc")).await.unwrap();
        // Half a header, then gone.
        peer.get_mut().write_all(&[1, 6, 0]).await.unwrap();
    });

    let mut client = FastcgiClient::new(client);
    let failure = expect_failure(client.request(vec![], tokio::io::empty()).await);
    match failure.error {
        FastcgiError::IncompleteRead => (),
        ref other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(&b"abc"[..], &failure.partial.stdout[..]);
}

#[tokio::test]
async fn peer_closes_cleanly_without_end_request() {
    let (client, mut peer) = setup(64 * 1024);

    tokio::spawn(async move {
        read_preamble(&mut peer).await;
        read_stdin(&mut peer).await;
        peer.send(record(RecordType::Stdout, b"abc")).await.unwrap();
    });

    let mut client = FastcgiClient::new(client);
    let failure = expect_failure(client.request(vec![], tokio::io::empty()).await);
    match failure.error {
        FastcgiError::IncompleteRead => (),
        ref other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(&b"abc"[..], &failure.partial.stdout[..]);
}

#[tokio::test]
async fn wrong_protocol_version() {
    let (client, mut peer) = setup(64 * 1024);

    tokio::spawn(async move {
        read_preamble(&mut peer).await;
        read_stdin(&mut peer).await;
        peer.get_mut().write_all(&[2, 6, 0, 1, 0, 0, 0, 0]).await.unwrap();
        peer.get_mut().flush().await.unwrap();
        futures::StreamExt::next(&mut peer).await;
    });

    let mut client = FastcgiClient::new(client);
    let failure = expect_failure(client.request(vec![], tokio::io::empty()).await);
    match failure.error {
        FastcgiError::ProtocolVersion(2) => (),
        ref other => panic!("unexpected error {:?}", other),
    }
}

struct FailingBody;

impl AsyncRead for FailingBody {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>)
        -> Poll<io::Result<()>>
    {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "body source failed")))
    }
}

#[tokio::test]
async fn body_error_is_reported_with_full_response() {
    let (client, mut peer) = setup(64 * 1024);

    tokio::spawn(async move {
        read_preamble(&mut peer).await;
        peer.send(record(RecordType::Stdout, b"done")).await.unwrap();
        peer.send(end_request(0)).await.unwrap();
        futures::StreamExt::next(&mut peer).await;
    });

    let mut client = FastcgiClient::new(client);
    let failure = expect_failure(client.request(vec![], FailingBody).await);
    match failure.error {
        FastcgiError::Transport(ref e) => assert_eq!(io::ErrorKind::Other, e.kind()),
        ref other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(&b"done"[..], &failure.partial.stdout[..]);
    assert_eq!(Some(0), failure.partial.app_status());
    assert!(!client.is_connected());
    assert!(client.into_inner().is_some());
}

#[tokio::test]
async fn connection_is_reused() {
    let (client, mut peer) = setup(64 * 1024);

    let app = tokio::spawn(async move {
        let mut uris = vec![];
        for n in 0..2u8 {
            let (_begin, params) = read_preamble(&mut peer).await;
            read_stdin(&mut peer).await;
            uris.push(params[2].value.clone());
            peer.send(record(RecordType::Stdout, &[b'0' + n])).await.unwrap();
            peer.send(end_request(0)).await.unwrap();
        }
        uris
    });

    let mut client = FastcgiClient::new(client);
    let first = client.request(Param::cgi_defaults("GET", "/a", ""), tokio::io::empty()).await;
    let second = client.request(Param::cgi_defaults("GET", "/b", ""), tokio::io::empty()).await;
    assert_eq!(&b"0"[..], &first.unwrap().stdout[..]);
    assert_eq!(&b"1"[..], &second.unwrap().stdout[..]);
    assert!(client.into_inner().is_some());
    assert_eq!(vec![b"/a".to_vec(), b"/b".to_vec()], app.await.unwrap());
}

#[tokio::test]
async fn config_is_applied() {
    let (client, mut peer) = setup(64 * 1024);

    let app = tokio::spawn(async move {
        let (begin, _params) = read_preamble(&mut peer).await;
        let (body, records) = read_stdin(&mut peer).await;
        peer.send(end_request(0)).await.unwrap();
        (begin, body.len(), records)
    });

    let config = SessionConfig::new().chunk_size(100).keep_connection(false);
    let outcome = Session::new(config)
        .run(client, vec![Param::new("A", "B")], Cursor::new(vec![0u8; 250]))
        .await;
    assert_eq!(SessionState::Completed, outcome.state);
    assert!(outcome.result.is_ok());
    assert!(outcome.connection.is_some());

    let (begin, len, records) = app.await.unwrap();
    assert!(!begin.keep_connection);
    assert_eq!(250, len);
    assert_eq!(3, records);
}

#[tokio::test]
async fn failed_session_reports_state() {
    let (client, mut peer) = setup(64 * 1024);

    let app = tokio::spawn(async move {
        read_preamble(&mut peer).await;
        peer.send(record(RecordType::Params, b"")).await.unwrap();
        // Whatever stdin made it out, then the caller's own record on the returned stream.
        while let Some(Ok(rec)) = futures::StreamExt::next(&mut peer).await {
            if rec.is(RecordType::AbortRequest) {
                return true;
            }
        }
        false
    });

    let outcome = Session::new(SessionConfig::default())
        .run(client, vec![], tokio::io::empty())
        .await;
    assert_eq!(SessionState::Failed, outcome.state);
    match outcome.result {
        Err(RequestFailure { error: FastcgiError::UnexpectedRecordType { got: 4, .. }, .. }) => (),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(response) => panic!("request unexpectedly succeeded: {:?}", response),
    }

    // The session left the stream open; the caller decides what to do with it.
    let mut stream = Framed::new(outcome.connection.unwrap(), FastcgiLowlevelCodec);
    stream.send(record(RecordType::AbortRequest, b"")).await.unwrap();
    assert!(app.await.unwrap());
}
