//! [`ServerConfig`]: the immutable configuration surface described in
//! spec.md §3. no environment variables are read here; everything arrives
//! structurally through the fluent [`Builder`].

use std::time::Duration;

pub use hearth_io::net::BindAddress;

/// optional read/write idle timeouts for one protocol's keep-alive loop.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdleTimeouts {
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub address: BindAddress,
    pub server_name: Option<String>,
    /// upper bound, in bytes, on an accepted request body. exceeding it
    /// fails the request body stream with `PayloadTooLarge`.
    pub max_upload_size: u64,
    /// soft ceiling, in bytes, on buffered streaming-body bytes before
    /// backpressure suspends transport reads.
    pub max_streaming_buffer_size: u64,
    /// upper bound, in bytes, on a request head (start line + headers)
    /// before it is rejected as malformed rather than awaited further.
    pub max_header_bytes: usize,
    pub backlog: u32,
    pub reuse_address: bool,
    pub tcp_nodelay: bool,
    /// whether the wire codec serializes responses for pipelined requests
    /// so response N+1 cannot overtake response N.
    pub with_pipelining_assistance: bool,
    /// whether malformed-request errors are auto-replied with 400 rather
    /// than propagated to the caller.
    pub http_error_handling: bool,
    pub outbound_header_validation: bool,
    pub h1_idle_timeouts: IdleTimeouts,
    pub h2_idle_timeouts: IdleTimeouts,
    pub h1_keep_alive_timeout: Duration,
    /// how many serial-executor worker threads the lifecycle spins up.
    pub worker_threads: usize,
    /// bound on graceful quiesce before the lifecycle force-closes
    /// remaining connections.
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 2 * 1024 * 1024;
    pub const DEFAULT_MAX_STREAMING_BUFFER_SIZE: u64 = 64 * 1024;
    pub const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

    pub fn new(address: BindAddress) -> Self {
        Self {
            address,
            server_name: None,
            max_upload_size: Self::DEFAULT_MAX_UPLOAD_SIZE,
            max_streaming_buffer_size: Self::DEFAULT_MAX_STREAMING_BUFFER_SIZE,
            max_header_bytes: Self::DEFAULT_MAX_HEADER_BYTES,
            backlog: 1024,
            reuse_address: true,
            tcp_nodelay: true,
            with_pipelining_assistance: true,
            http_error_handling: true,
            outbound_header_validation: true,
            h1_idle_timeouts: IdleTimeouts::default(),
            h2_idle_timeouts: IdleTimeouts::default(),
            h1_keep_alive_timeout: Duration::from_secs(5),
            worker_threads: 1,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// fluent configuration builder, mirroring the teacher's
/// `HttpServiceBuilder`/`xitca_server::Builder` pattern.
#[derive(Clone, Debug)]
pub struct Builder {
    config: ServerConfig,
}

impl Builder {
    pub fn new(address: BindAddress) -> Self {
        Self { config: ServerConfig::new(address) }
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_name = Some(name.into());
        self
    }

    pub fn max_upload_size(mut self, bytes: u64) -> Self {
        self.config.max_upload_size = bytes;
        self
    }

    pub fn max_streaming_buffer_size(mut self, bytes: u64) -> Self {
        self.config.max_streaming_buffer_size = bytes;
        self
    }

    pub fn max_header_bytes(mut self, bytes: usize) -> Self {
        self.config.max_header_bytes = bytes;
        self
    }

    pub fn backlog(mut self, backlog: u32) -> Self {
        self.config.backlog = backlog;
        self
    }

    pub fn reuse_address(mut self, enabled: bool) -> Self {
        self.config.reuse_address = enabled;
        self
    }

    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.config.tcp_nodelay = enabled;
        self
    }

    pub fn with_pipelining_assistance(mut self, enabled: bool) -> Self {
        self.config.with_pipelining_assistance = enabled;
        self
    }

    pub fn http_error_handling(mut self, enabled: bool) -> Self {
        self.config.http_error_handling = enabled;
        self
    }

    pub fn outbound_header_validation(mut self, enabled: bool) -> Self {
        self.config.outbound_header_validation = enabled;
        self
    }

    pub fn h1_keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.config.h1_keep_alive_timeout = timeout;
        self
    }

    pub fn h1_idle_timeouts(mut self, timeouts: IdleTimeouts) -> Self {
        self.config.h1_idle_timeouts = timeouts;
        self
    }

    pub fn h2_idle_timeouts(mut self, timeouts: IdleTimeouts) -> Self {
        self.config.h2_idle_timeouts = timeouts;
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads.max(1);
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}
