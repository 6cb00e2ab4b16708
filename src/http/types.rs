//! Core HTTP protocol types: methods, protocol versions and status codes

use crate::errors::{Error, Result};
use std::{fmt, str::FromStr};

// METHOD

macro_rules! set_methods {
    ($( $name:ident => $str:literal; )+) => {
        /// HTTP request methods
        ///
        /// The fixed set of verbs a [`Request`](crate::Request) accepts. Parsing is
        /// case-insensitive and normalizes to the upper-case token; any other verb
        /// is rejected with [`Error::InvalidInput`].
        ///
        /// # References
        ///
        /// - [RFC 9110, Section 9](https://datatracker.ietf.org/doc/html/rfc9110#section-9)
        /// - [RFC 5789](https://datatracker.ietf.org/doc/html/rfc5789) (PATCH method)
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub enum Method { $(
            #[doc = concat!("`", $str, "`")]
            $name,
        )+ }

        impl Method {
            /// Every supported method, in alphabetical order.
            pub const ALL: &'static [Method] = &[$(Method::$name),+];

            /// Returns the upper-case method token.
            #[inline]
            pub const fn as_str(&self) -> &'static str {
                match self { $(
                    Method::$name => $str,
                )+ }
            }

            /// Parses a method token, ignoring ASCII case.
            ///
            /// # Examples
            /// ```
            /// use maker_http::Method;
            ///
            /// assert_eq!(Method::parse("patch").unwrap(), Method::Patch);
            /// assert!(Method::parse("BREW").is_err());
            /// ```
            pub fn parse(src: &str) -> Result<Self> {
                $(
                    if src.eq_ignore_ascii_case($str) {
                        return Ok(Method::$name);
                    }
                )+

                Err(Error::invalid(format!("unsupported HTTP method `{src}`")))
            }
        }
    };
}

set_methods! {
    Connect => "CONNECT";
    Delete => "DELETE";
    Get => "GET";
    Head => "HEAD";
    Options => "OPTIONS";
    Patch => "PATCH";
    Post => "POST";
    Put => "PUT";
    Trace => "TRACE";
}

impl FromStr for Method {
    type Err = Error;

    #[inline]
    fn from_str(src: &str) -> Result<Self> {
        Method::parse(src)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// VERSION

/// HTTP protocol version carried by a [`Message`](crate::Message).
///
/// Only the versions a message can meaningfully declare are accepted:
/// `1.0`, `1.1`, `2.0` and its short form `2`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Version {
    /// HTTP/1.0 - [RFC 1945](https://tools.ietf.org/html/rfc1945)
    Http10,

    /// HTTP/1.1 - [RFC 9112](https://datatracker.ietf.org/doc/html/rfc9112)
    #[default]
    Http11,

    /// HTTP/2 - [RFC 9113](https://datatracker.ietf.org/doc/html/rfc9113)
    Http2,
}

impl Version {
    /// Parses a protocol version such as `1.1`, also accepting the
    /// `HTTP/1.1` form found in `SERVER_PROTOCOL`.
    pub fn parse(src: &str) -> Result<Self> {
        let version = src.strip_prefix("HTTP/").unwrap_or(src);

        match version {
            "1.0" => Ok(Self::Http10),
            "1.1" => Ok(Self::Http11),
            "2" | "2.0" => Ok(Self::Http2),
            _ => Err(Error::invalid(format!(
                "unsupported HTTP protocol version `{src}`; must be 1.0, 1.1, 2.0 or 2"
            ))),
        }
    }

    /// Returns the version number without the `HTTP/` prefix.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Http10 => "1.0",
            Self::Http11 => "1.1",
            Self::Http2 => "2.0",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($( $name:ident = ($num:literal, $str:literal); )+) => {
        /// HTTP status codes
        ///
        /// The registered codes with their canonical reason phrases, see
        /// [RFC 9110, Section 15](https://datatracker.ietf.org/doc/html/rfc9110#section-15).
        /// Responses keep the numeric code, so codes outside this table are
        /// still representable; they simply have no default reason phrase.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $name = $num,
        )+ }

        impl StatusCode {
            /// Looks up a registered status code.
            #[inline]
            pub const fn from_u16(code: u16) -> Option<Self> {
                match code { $(
                    $num => Some(StatusCode::$name),
                )+
                    _ => None,
                }
            }

            /// Returns the canonical reason phrase (e.g. `"Not Found"`).
            #[inline]
            pub const fn reason_phrase(&self) -> &'static str {
                match self { $(
                    StatusCode::$name => $str,
                )+ }
            }
        }
    }
}

impl StatusCode {
    /// Returns the numeric code.
    #[inline]
    pub const fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Reason phrase for any numeric code; empty when the code is not registered.
    #[inline]
    pub fn reason_for(code: u16) -> &'static str {
        StatusCode::from_u16(code).map_or("", |status| status.reason_phrase())
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

set_status_codes! {
    Continue = (100, "Continue");
    SwitchingProtocols = (101, "Switching Protocols");
    Processing = (102, "Processing");

    Ok = (200, "OK");
    Created = (201, "Created");
    Accepted = (202, "Accepted");
    NonAuthoritativeInformation = (203, "Non-Authoritative Information");
    NoContent = (204, "No Content");
    ResetContent = (205, "Reset Content");
    PartialContent = (206, "Partial Content");
    MultiStatus = (207, "Multi-Status");
    AlreadyReported = (208, "Already Reported");
    ImUsed = (226, "IM Used");

    MultipleChoices = (300, "Multiple Choices");
    MovedPermanently = (301, "Moved Permanently");
    Found = (302, "Found");
    SeeOther = (303, "See Other");
    NotModified = (304, "Not Modified");
    UseProxy = (305, "Use Proxy");
    TemporaryRedirect = (307, "Temporary Redirect");
    PermanentRedirect = (308, "Permanent Redirect");

    BadRequest = (400, "Bad Request");
    Unauthorized = (401, "Unauthorized");
    PaymentRequired = (402, "Payment Required");
    Forbidden = (403, "Forbidden");
    NotFound = (404, "Not Found");
    MethodNotAllowed = (405, "Method Not Allowed");
    NotAcceptable = (406, "Not Acceptable");
    ProxyAuthenticationRequired = (407, "Proxy Authentication Required");
    RequestTimeout = (408, "Request Timeout");
    Conflict = (409, "Conflict");
    Gone = (410, "Gone");
    LengthRequired = (411, "Length Required");
    PreconditionFailed = (412, "Precondition Failed");
    PayloadTooLarge = (413, "Payload Too Large");
    UriTooLong = (414, "URI Too Long");
    UnsupportedMediaType = (415, "Unsupported Media Type");
    RangeNotSatisfiable = (416, "Range Not Satisfiable");
    ExpectationFailed = (417, "Expectation Failed");
    ImaTeapot = (418, "I'm a teapot");
    MisdirectedRequest = (421, "Misdirected Request");
    UnprocessableEntity = (422, "Unprocessable Entity");
    Locked = (423, "Locked");
    FailedDependency = (424, "Failed Dependency");
    TooEarly = (425, "Too Early");
    UpgradeRequired = (426, "Upgrade Required");
    PreconditionRequired = (428, "Precondition Required");
    TooManyRequests = (429, "Too Many Requests");
    RequestHeaderFieldsTooLarge = (431, "Request Header Fields Too Large");
    UnavailableForLegalReasons = (451, "Unavailable For Legal Reasons");

    InternalServerError = (500, "Internal Server Error");
    NotImplemented = (501, "Not Implemented");
    BadGateway = (502, "Bad Gateway");
    ServiceUnavailable = (503, "Service Unavailable");
    GatewayTimeout = (504, "Gateway Timeout");
    HttpVersionNotSupported = (505, "HTTP Version Not Supported");
    VariantAlsoNegotiates = (506, "Variant Also Negotiates");
    InsufficientStorage = (507, "Insufficient Storage");
    LoopDetected = (508, "Loop Detected");
    NotExtended = (510, "Not Extended");
    NetworkAuthenticationRequired = (511, "Network Authentication Required");
}
