//! Transport and input limits
//!
//! # Security-First Defaults
//!
//! Default limits are intentionally conservative to prevent:
//! - Unbounded buffering of a request body read from the environment
//! - Memory exhaustion from oversized response header blocks or bodies
//! - Hanging forever on a silent upstream
//!
//! # Examples
//!
//! ```no_run
//! use maker_http::{
//!     limits::TransportLimits, ClientRequest, TcpTransport,
//! };
//! use std::time::Duration;
//!
//! let transport = TcpTransport::new(TransportLimits {
//!     connect_timeout: Duration::from_secs(2),
//!     max_body_size: 16 * 1024 * 1024, // 16MB for larger downloads
//!     ..TransportLimits::default()
//! });
//!
//! let response = ClientRequest::get("http://example.org/")
//!     .unwrap()
//!     .send_with(&transport)
//!     .unwrap();
//! println!("{}", response.status());
//! ```

use std::time::Duration;

/// Limits applied by [`TcpTransport`](crate::TcpTransport) to every execution.
///
/// A transport keeps one instance as its *template*; every execution works on
/// a copy, so per-request settings (such as
/// [`ClientRequest::with_timeout`](crate::ClientRequest::with_timeout)) never
/// leak into the next request.
///
/// # Timeouts
///
/// ```text
///   connect  ──── connect_timeout ────▶  connected
///   write request / read response  ──── io_timeout (per socket operation)
///   whole execution  ──── request timeout (if set on the request)
/// ```
#[derive(Debug, Clone)]
pub struct TransportLimits {
    /// Maximum time to establish the TCP connection (default: `10s`).
    pub connect_timeout: Duration,

    /// Read/write timeout of each socket operation (default: `30s`).
    ///
    /// A request-level timeout, when set, caps this value as well.
    pub io_timeout: Duration,

    /// Maximum size of a response header block in bytes (default: `64KB`).
    ///
    /// A larger block aborts the execution with `RecvError`.
    pub max_header_size: usize,

    /// Maximum size of a response body in bytes (default: `8MB`).
    ///
    /// A larger body aborts the execution with `FilesizeExceeded`.
    pub max_body_size: usize,

    /// Size of a single socket read in bytes (default: `8KB`).
    pub read_chunk: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(30),
            max_header_size: 64 * 1024,
            max_body_size: 8 * 1024 * 1024,
            read_chunk: 8 * 1024,

            _priv: (),
        }
    }
}

/// Limits applied when a [`ServerRequest`](crate::ServerRequest) is rebuilt
/// from an [`Environment`](crate::Environment).
///
/// The raw input is read once and fully buffered; `body_size` bounds that
/// buffer. Input beyond the limit fails the reconstruction with a stream error
/// instead of being silently truncated.
#[derive(Debug, Clone)]
pub struct InputLimits {
    /// Maximum buffered request body in bytes (default: `8MB`).
    pub body_size: usize,

    /// Maximum nesting depth of bracketed form/query keys such as
    /// `a[b][c][]` (default: `32`). Deeper keys are kept flat at the limit.
    pub nesting_depth: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            body_size: 8 * 1024 * 1024,
            nesting_depth: 32,

            _priv: (),
        }
    }
}
