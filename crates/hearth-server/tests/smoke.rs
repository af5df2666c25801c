//! end to end coverage over real loopback sockets: bind a server backed by
//! a small test responder, drive it with a hand-rolled client (a production
//! client is explicitly out of scope), and check the bytes that come back.
//! covers the scenarios of spec.md §8 (E1-E6).

use std::{convert::Infallible, time::Duration};

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use hearth_io::net::Stream;
use hearth_server::{BindAddress, Builder, CoreError, HTTPRequest, HTTPResponse, ServerConfig};
use hearth_service::Service;
use hearth_tls::{AlpnProtocol, NoTls, TlsAccept, TlsError};
use http::StatusCode;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

struct Echo;

impl Service<HTTPRequest> for Echo {
    type Response = HTTPResponse;
    type Error = Infallible;

    async fn call(&self, request: HTTPRequest) -> Result<HTTPResponse, Infallible> {
        let path = request.head.uri.path();
        Ok(match path {
            "/" => HTTPResponse::new(StatusCode::OK)
                .with_body(hearth_http_response_body(Bytes::from_static(b"Hello"))),
            "/slow" => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                HTTPResponse::new(StatusCode::OK)
            }
            "/up" => match read_body(request.body).await {
                Ok(bytes) => HTTPResponse::new(StatusCode::OK).with_body(hearth_http_response_body(bytes)),
                Err(status) => HTTPResponse::new(status),
            },
            _ => HTTPResponse::new(StatusCode::NOT_FOUND),
        })
    }
}

fn hearth_http_response_body(bytes: Bytes) -> hearth_http::ResponseBody {
    hearth_http::ResponseBody::Sized(bytes)
}

/// read a request body to completion, reporting `413` the same way a real
/// responder would once it sees the core's own `PayloadTooLarge` terminator.
async fn read_body(body: hearth_http::RequestBody) -> Result<Bytes, StatusCode> {
    match body {
        hearth_http::RequestBody::Empty => Ok(Bytes::new()),
        hearth_http::RequestBody::Buffered(b) => Ok(b),
        hearth_http::RequestBody::Streaming(mut stream) => {
            let mut buf = BytesMut::new();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(c) => buf.extend_from_slice(&c),
                    Err(CoreError::PayloadTooLarge) => return Err(StatusCode::PAYLOAD_TOO_LARGE),
                    Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
                }
            }
            Ok(buf.freeze())
        }
    }
}

/// every request in this file that sends `Connection: close` expects
/// reading until EOF to be exactly reading one full response (or, for the
/// pipelining test, two back to back).
async fn read_response_to_eof(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8_lossy(&buf).into_owned()
}

#[test]
fn get_request_receives_hello_body() {
    // E1
    let config = ServerConfig::new(BindAddress::tcp("127.0.0.1", 0));
    let handle = Builder::new(config, NoTls, Echo).start().expect("server should bind");
    let port = handle.port().expect("tcp listener reports its port");

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async move {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await.unwrap();
        let response = read_response_to_eof(&mut stream).await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "unexpected response: {response}");
        assert!(response.contains("content-length: 5\r\n"));
        assert!(response.ends_with("Hello"));
    });

    handle.stop();
    handle.wait();
}

#[test]
fn unmatched_path_receives_404() {
    let config = ServerConfig::new(BindAddress::tcp("127.0.0.1", 0));
    let handle = Builder::new(config, NoTls, Echo).start().expect("server should bind");
    let port = handle.port().expect("tcp listener reports its port");

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async move {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream.write_all(b"GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await.unwrap();
        let response = read_response_to_eof(&mut stream).await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "unexpected response: {response}");
    });

    handle.stop();
    handle.wait();
}

#[test]
fn large_upload_promotes_to_streaming_and_echoes_back() {
    // E2: content-length (1 MiB) exceeds the default max_streaming_buffer_size
    // (64 KiB) but stays under the default max_upload_size (2 MiB).
    let config = ServerConfig::new(BindAddress::tcp("127.0.0.1", 0));
    let handle = Builder::new(config, NoTls, Echo).start().expect("server should bind");
    let port = handle.port().expect("tcp listener reports its port");

    let body = vec![0u8; 1024 * 1024];

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async move {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let head = format!("POST /up HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len());
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(&body).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let split = find_header_body_split(&raw);
        let head = String::from_utf8_lossy(&raw[..split]);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"), "unexpected response head: {head}");
        assert_eq!(&raw[split + 4..], &body[..]);
    });

    handle.stop();
    handle.wait();
}

#[test]
fn oversized_body_is_reported_as_413() {
    // E3: a declared content-length above the default max_streaming_buffer_size
    // (64 KiB) promotes straight to a streaming body, so the responder — not
    // the core — is the one that observes `PayloadTooLarge` while consuming it.
    let mut config = ServerConfig::new(BindAddress::tcp("127.0.0.1", 0));
    config.max_upload_size = 10;
    let handle = Builder::new(config, NoTls, Echo).start().expect("server should bind");
    let port = handle.port().expect("tcp listener reports its port");

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async move {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream
            .write_all(b"POST /up HTTP/1.1\r\nHost: localhost\r\nContent-Length: 200000\r\nConnection: close\r\n\r\n0123456789abcd")
            .await
            .unwrap();
        let response = read_response_to_eof(&mut stream).await;
        assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "unexpected response: {response}");
    });

    handle.stop();
    handle.wait();
}

#[test]
fn pipelined_requests_receive_responses_in_order() {
    // E4
    let config = ServerConfig::new(BindAddress::tcp("127.0.0.1", 0));
    let handle = Builder::new(config, NoTls, Echo).start().expect("server should bind");
    let port = handle.port().expect("tcp listener reports its port");

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async move {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let requests = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\nGET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        stream.write_all(requests).await.unwrap();
        let response = read_response_to_eof(&mut stream).await;

        let first = response.find("HTTP/1.1 200 OK").expect("first status line");
        let second = response[first + 1..].find("HTTP/1.1 200 OK").expect("second status line");
        assert!(second > 0, "responses were not received in order");
        assert_eq!(response.matches("HTTP/1.1 200 OK").count(), 2);
    });

    handle.stop();
    handle.wait();
}

#[test]
fn stop_lets_an_in_flight_request_finish_before_closing() {
    // E5
    let config = ServerConfig::new(BindAddress::tcp("127.0.0.1", 0));
    let handle = Builder::new(config, NoTls, Echo).start().expect("server should bind");
    let port = handle.port().expect("tcp listener reports its port");
    let handle_ref = &handle;

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async move {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream.write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();

        let stop_while_in_flight = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle_ref.stop();
        };
        let read_response = read_response_to_eof(&mut stream);
        let (_, response) = tokio::join!(stop_while_in_flight, read_response);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "unexpected response: {response}");
    });

    handle.wait();
}

/// a TLS front that never actually does a handshake but unconditionally
/// reports HTTP/2, the way a real TLS implementation would after ALPN
/// settled on `"h2"`. used only to exercise the HTTP/2 dispatcher without
/// pulling a TLS stack into the test suite.
#[derive(Clone, Copy, Default)]
struct ForceHttp2;

impl TlsAccept<Stream> for ForceHttp2 {
    type Stream = Stream;

    async fn accept(&self, io: Stream) -> Result<(Stream, AlpnProtocol), TlsError> {
        Ok((io, AlpnProtocol::Http2))
    }
}

#[test]
fn http2_streams_survive_quiescing() {
    // E6
    let config = ServerConfig::new(BindAddress::tcp("127.0.0.1", 0));
    let handle = Builder::new(config, ForceHttp2, Echo).start().expect("server should bind");
    let port = handle.port().expect("tcp listener reports its port");

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async move {
        let tcp = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let (mut send_request, connection) = h2::client::handshake(tcp).await.unwrap();
        tokio::spawn(async move {
            let _ = connection.await;
        });

        send_request.ready().await.unwrap();
        let request_a = http::Request::builder().method("GET").uri("/slow").body(()).unwrap();
        let (response_a, _) = send_request.send_request(request_a, true).unwrap();

        send_request.ready().await.unwrap();
        let request_b = http::Request::builder().method("GET").uri("/slow").body(()).unwrap();
        let (response_b, _) = send_request.send_request(request_b, true).unwrap();

        // begin quiescing while both streams are still in flight.
        handle.stop();

        let status_a = response_a.await.unwrap().status();
        let status_b = response_b.await.unwrap().status();
        assert_eq!(status_a, StatusCode::OK);
        assert_eq!(status_b, StatusCode::OK);
    });

    handle.wait();
}

fn find_header_body_split(raw: &[u8]) -> usize {
    raw.windows(4).position(|w| w == b"\r\n\r\n").expect("response head/body separator")
}
