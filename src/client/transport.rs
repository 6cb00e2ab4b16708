//! Transport capability: executes one request and reports raw results

use crate::Method;
use indexmap::IndexMap;
use std::{fmt, path::PathBuf, time::Duration};

macro_rules! set_error_codes {
    ($( $name:ident = ($num:literal, $str:literal); )+) => {
        /// Transport result codes
        ///
        /// Numbered like libcurl's `CURLcode`, so logs and diagnostics stay
        /// familiar. Displayed as `<number> <NAME>`, e.g. `7 COULDNT_CONNECT`.
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub enum TransportErrorCode { $(
            #[doc = concat!("`", $str, "`")]
            $name = $num,
        )+ }

        impl TransportErrorCode {
            /// Looks up a code by number.
            pub const fn from_u32(code: u32) -> Option<Self> {
                match code { $(
                    $num => Some(Self::$name),
                )+
                    _ => None,
                }
            }

            /// Upper-case symbolic name, e.g. `COULDNT_CONNECT`.
            pub const fn name(&self) -> &'static str {
                match self { $(
                    Self::$name => $str,
                )+ }
            }
        }
    };
}

set_error_codes! {
    Ok = (0, "OK");
    UnsupportedProtocol = (1, "UNSUPPORTED_PROTOCOL");
    UrlMalformat = (3, "URL_MALFORMAT");
    CouldntResolveHost = (6, "COULDNT_RESOLVE_HOST");
    CouldntConnect = (7, "COULDNT_CONNECT");
    OperationTimedout = (28, "OPERATION_TIMEDOUT");
    TooManyRedirects = (47, "TOO_MANY_REDIRECTS");
    SendError = (55, "SEND_ERROR");
    RecvError = (56, "RECV_ERROR");
    FilesizeExceeded = (63, "FILESIZE_EXCEEDED");
}

impl TransportErrorCode {
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        *self as u32
    }

    #[inline]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl Default for TransportErrorCode {
    fn default() -> Self {
        Self::Ok
    }
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u32(), self.name())
    }
}

/// The error slot of one execution: [`TransportErrorCode::Ok`] with an empty
/// message when the execution succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportError {
    pub code: TransportErrorCode,
    pub message: String,
}

impl TransportError {
    #[inline]
    pub fn new<M: Into<String>>(code: TransportErrorCode, message: M) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Optional per-request settings. Unset fields leave the transport's
/// defaults in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// Do not retrieve a response body (`HEAD`).
    pub no_body: bool,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    /// Netscape-format cookie file, read before and written after execution.
    pub cookie_file: Option<PathBuf>,
    pub follow_redirects: bool,
    /// Redirects followed at most; `None` means the transport's limit.
    pub max_redirects: Option<u32>,
    /// Deadline for the whole execution.
    pub timeout: Option<Duration>,
}

/// Everything a transport needs to execute a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    /// Flattened `Name: value` lines, without CRLF.
    pub header_lines: Vec<String>,
    pub body: Vec<u8>,
    pub options: TransportOptions,
}

/// Raw outcome of one execution.
///
/// `response` holds the final response head followed by its body; the first
/// `header_size` bytes are the head. `info` carries diagnostics such as
/// `url`, `http_code`, `header_size`, `redirect_count` and `total_time`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResult {
    pub status_code: Option<u16>,
    pub header_size: usize,
    pub response: Vec<u8>,
    pub error: TransportError,
    pub info: IndexMap<String, String>,
}

impl TransportResult {
    /// A failed execution.
    pub fn failed<M: Into<String>>(code: TransportErrorCode, message: M) -> Self {
        Self {
            error: TransportError::new(code, message),
            ..Self::default()
        }
    }
}

/// Executes requests synchronously.
///
/// Implementations report failures through [`TransportResult::error`]
/// instead of panicking or returning early, so diagnostics in
/// [`TransportResult::info`] survive a failed execution.
pub trait Transport {
    fn execute(&self, request: TransportRequest) -> TransportResult;
}

impl<T: Transport + ?Sized> Transport for &T {
    #[inline]
    fn execute(&self, request: TransportRequest) -> TransportResult {
        (**self).execute(request)
    }
}
