//! the HTTP/2 connection loop: hand off to the `h2` crate for framing and
//! HPACK, and wrap each accepted stream in the same request-assembly /
//! response-writing pipeline the HTTP/1.1 path uses (spec.md §4.2–§4.5).
//!
//! grounded on the teacher's `h2::service`/`h2::proto::dispatcher`, which
//! drive the same `h2` crate; here the in-flight stream bookkeeping those
//! files hand-roll is delegated to [`HTTP2StreamTracker`].

use h2::{server, RecvStream};
use hearth_io::{bytes::Bytes, AsyncIo};
use hearth_service::Service;
use http::header::CONTENT_LENGTH;
use tokio::sync::watch;

use crate::{
    assembler::RequestAssembler,
    byte_streamer::{ByteStreamer, ByteStreamerProducer},
    config::ServerConfig,
    error::CoreError,
    h2_tracker::{HTTP2StreamTracker, LifecycleState},
    request::{HTTPRequest, RequestHead},
    response::{HTTPResponse, ResponseBody},
};

fn h2_err(e: h2::Error) -> CoreError {
    CoreError::Transport(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

/// drive one HTTP/2 connection: accept streams while active, stop
/// accepting once `shutdown` turns true, and return once every accepted
/// stream has been answered.
pub async fn run<IO, S>(io: IO, config: &ServerConfig, service: &S, mut shutdown: watch::Receiver<bool>) -> Result<(), CoreError>
where
    IO: AsyncIo,
    S: Service<HTTPRequest, Response = HTTPResponse>,
    S::Error: Into<crate::error::BodyError>,
{
    let mut conn = server::handshake(io).await.map_err(h2_err)?;
    let mut tracker = HTTP2StreamTracker::new();

    // approximates spec.md §4.5's idle-read/idle-write clocks at the
    // granularity the `h2` crate exposes from here: `conn.accept()`
    // resolving is the connection's only visible read event, and a stream
    // finishing (which always ends in a response being sent) is its only
    // visible write event.
    let mut last_read = tokio::time::Instant::now();
    let mut last_write = tokio::time::Instant::now();

    loop {
        if tracker.state() == LifecycleState::Active {
            let read_deadline = config.h2_idle_timeouts.read_timeout.map(|d| last_read + d);
            let write_deadline = config.h2_idle_timeouts.write_timeout.map(|d| last_write + d);

            tokio::select! {
                accepted = conn.accept() => {
                    last_read = tokio::time::Instant::now();
                    match accepted {
                        Some(Ok((request, respond))) => {
                            tracker.spawn(handle_stream(request, respond, config, service));
                        }
                        Some(Err(e)) => return Err(h2_err(e)),
                        None => break,
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::debug!(in_flight = tracker.in_flight(), "quiescing http/2 connection");
                        tracker.begin_quiescing();
                        conn.graceful_shutdown();
                    }
                }
                _ = tracker.next_completed(), if !tracker.is_idle() => {
                    last_write = tokio::time::Instant::now();
                }
                _ = sleep_until_or_pending(read_deadline) => {
                    if tracker.should_close_on_read_idle() {
                        tracing::debug!(in_flight = tracker.in_flight(), "closing http/2 connection: read-idle timeout with streams open");
                        return Ok(());
                    }
                    last_read = tokio::time::Instant::now();
                }
                _ = sleep_until_or_pending(write_deadline) => {
                    if tracker.should_close_on_write_idle() {
                        tracing::debug!("closing http/2 connection: write-idle timeout with no streams open");
                        return Ok(());
                    }
                    last_write = tokio::time::Instant::now();
                }
            }
        } else if tracker.is_idle() {
            break;
        } else {
            tracker.next_completed().await;
        }
    }

    tracker.drain().await;
    Ok(())
}

async fn sleep_until_or_pending(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(instant) => tokio::time::sleep_until(instant).await,
        None => std::future::pending().await,
    }
}

async fn handle_stream<S>(
    request: http::Request<RecvStream>,
    mut respond: server::SendResponse<Bytes>,
    config: &ServerConfig,
    service: &S,
) -> Result<(), CoreError>
where
    S: Service<HTTPRequest, Response = HTTPResponse>,
    S::Error: Into<crate::error::BodyError>,
{
    let (parts, recv_stream) = request.into_parts();
    let content_length = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let head = RequestHead { method: parts.method, uri: parts.uri, version: parts.version, headers: parts.headers };

    let assembler = RequestAssembler::new(config.max_streaming_buffer_size);
    let (producer, consumer) = ByteStreamer::channel(config.max_upload_size);

    // runs concurrently with both assembly and the responder consuming the
    // stream's body; only reconciled afterwards, so a responder that wants
    // to start answering before the body finishes arriving actually can.
    let pump = tokio::task::spawn_local(pump_recv_stream(recv_stream, producer, config.max_streaming_buffer_size));

    let request = assembler.assemble(head, content_length, consumer).await?;
    // `request` (and the `ByteStreamer` consumer inside it, if the body was
    // streaming) is dropped the instant this future resolves; an abandoned
    // streamer's own `Drop` spawns a background drain, so `pump` below is
    // never left stuck waiting on a consumer that no longer exists.
    let response = service.call(request).await.map_err(|e| CoreError::Responder(e.into()))?;

    // send the response before reconciling the pump: a slow-draining body
    // should never delay an already-computed response.
    let send_result = send_response(&mut respond, response, config.server_name.as_deref()).await;

    match pump.await {
        Ok(Err(e)) => tracing::debug!(error = %e, "http/2 request body pump ended with an error"),
        Err(_) => tracing::debug!("http/2 request body pump task panicked"),
        Ok(Ok(())) => {}
    }

    send_result
}

/// pulls `DATA` frames off `recv_stream` into `producer`, only replenishing
/// the stream's flow-control window once `buffered_size` drops back below
/// `max_buffered` — the HTTP/2-native form of spec.md §4.1's backpressure
/// contract: withholding `release_capacity` is what asks the peer to pause.
async fn pump_recv_stream(mut recv_stream: RecvStream, producer: ByteStreamerProducer, max_buffered: u64) -> Result<(), CoreError> {
    let resume = std::rc::Rc::new(tokio::sync::Notify::new());
    producer.set_on_consume({
        let resume = resume.clone();
        move || resume.notify_one()
    });

    loop {
        while producer.buffered_size() >= max_buffered {
            resume.notified().await;
        }

        match recv_stream.data().await {
            Some(Ok(chunk)) => {
                let len = chunk.len();
                producer.feed_bytes(chunk);
                if producer.is_terminated() {
                    return Err(CoreError::PayloadTooLarge);
                }
                let _ = recv_stream.flow_control().release_capacity(len);
            }
            Some(Err(e)) => {
                let err = std::io::Error::new(std::io::ErrorKind::Other, e.to_string());
                producer.feed_error(std::io::Error::new(err.kind(), err.to_string()));
                return Err(CoreError::Transport(err));
            }
            None => {
                producer.feed_end();
                return Ok(());
            }
        }
    }
}

async fn send_response(respond: &mut server::SendResponse<Bytes>, response: HTTPResponse, server_name: Option<&str>) -> Result<(), CoreError> {
    use futures_util::StreamExt;

    let HTTPResponse { head, body } = response;
    let mut builder = http::Response::builder().status(head.status).version(http::Version::HTTP_2);
    for (name, value) in head.headers.iter() {
        builder = builder.header(name, value);
    }
    if let Some(name) = server_name {
        builder = builder.header(http::header::SERVER, name);
    }
    let response = builder.body(()).map_err(|_| CoreError::MalformedRequest)?;

    match body {
        ResponseBody::Empty => {
            respond.send_response(response, true).map_err(h2_err)?;
        }
        ResponseBody::Sized(buf) => {
            let mut send_stream = respond.send_response(response, false).map_err(h2_err)?;
            send_stream.send_data(buf, true).map_err(h2_err)?;
        }
        ResponseBody::Streamed(mut stream) => {
            let mut send_stream = respond.send_response(response, false).map_err(h2_err)?;
            let mut pending: Option<Bytes> = None;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(CoreError::Responder)?;
                if let Some(prev) = pending.take() {
                    send_stream.send_data(prev, false).map_err(h2_err)?;
                }
                pending = Some(chunk);
            }
            send_stream.send_data(pending.unwrap_or_default(), true).map_err(h2_err)?;
        }
    }
    Ok(())
}
