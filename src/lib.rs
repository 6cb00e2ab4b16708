//! maker_http - Immutable HTTP messages for server and client code
//!
//! Value types for HTTP requests and responses with copy-on-write mutation,
//! a server-side request rebuilt from the CGI-style execution environment,
//! and a small blocking client.
//!
//! # Message Model
//!
//! - **[`Uri`]**: parsing, normalization and serialization of URI references
//! - **[`HeaderCollection`]**: case-insensitive, multi-value, order-preserving headers
//! - **[`Request`] / [`Response`]**: immutable messages; every `with_*` call
//!   returns a modified copy and never touches the receiver
//! - **[`Stream`]**: the body capability, with [`MemoryStream`] as the in-memory implementation
//!
//! # Server Side
//!
//! [`ServerRequest::from_environment`] reconstructs the incoming request from an
//! [`Environment`]: method, URI (including reverse-proxy headers such as
//! `X-Forwarded-Proto` and `X-Forwarded-Port`), headers, cookies, query
//! parameters, uploaded files and a lazily parsed body.
//!
//! # Client Side
//!
//! [`ClientRequest`] maps a request onto a [`Transport`] and rebuilds a
//! [`ClientResponse`] from its raw output. [`TcpTransport`] is the default
//! transport for plain `http` URLs.
//!
//! # Examples
//!
//! Server request:
//! ```
//! use maker_http::{Environment, HttpMessage, ServerRequest};
//!
//! let env = Environment::mock([
//!     ("REQUEST_METHOD", "POST"),
//!     ("REQUEST_URI", "/shop/cart?page=2"),
//!     ("QUERY_STRING", "page=2"),
//!     ("HTTP_X_FORWARDED_PROTO", "https"),
//!     ("CONTENT_TYPE", "application/json"),
//! ])
//! .with_input(r#"{"item":"apple"}"#);
//!
//! let request = ServerRequest::from_environment(&env).unwrap();
//!
//! assert_eq!(request.uri().scheme(), "https");
//! assert_eq!(request.query_params()["page"], "2");
//! assert_eq!(request.parsed_body().unwrap().unwrap()["item"], "apple");
//! assert_eq!(request.header_line("content-type"), "application/json");
//! ```
//!
//! Client request:
//! ```no_run
//! use maker_http::{ClientRequest, HttpMessage};
//! use std::time::Duration;
//!
//! let response = ClientRequest::get("http://127.0.0.1:8080/api/users")
//!     .unwrap()
//!     .with_header("Accept", "application/json")
//!     .unwrap()
//!     .with_timeout(Duration::from_secs(5))
//!     .send()
//!     .unwrap();
//!
//! println!("{} {}", response.status(), response.header_line("content-type"));
//! ```

pub(crate) mod http {
    pub(crate) mod headers;
    pub(crate) mod message;
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod stream;
    pub(crate) mod types;
    pub(crate) mod uri;
}
pub(crate) mod server {
    pub(crate) mod body_parsers;
    pub(crate) mod environment;
    pub(crate) mod server_request;
    pub(crate) mod uploaded_file;
}
pub(crate) mod client {
    pub(crate) mod cookie_jar;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod tcp;
    pub(crate) mod transport;
}
pub mod errors;
pub mod limits;

pub use crate::{
    client::{
        request::ClientRequest,
        response::ClientResponse,
        tcp::{TcpTransport, DEFAULT_MAX_REDIRECTS},
        transport::{
            Transport, TransportError, TransportErrorCode, TransportOptions, TransportRequest,
            TransportResult,
        },
    },
    errors::{Error, Result},
    http::{
        headers::{HeaderCollection, HeaderRecord, IntoHeaderValues},
        message::{HttpMessage, Message},
        query,
        request::Request,
        response::Response,
        stream::{MemoryStream, Stream},
        types::{Method, StatusCode, Version},
        uri::{Scheme, Uri, UriParts},
    },
    server::{
        body_parsers::{BodyParser, BodyParsers},
        environment::Environment,
        server_request::{parse_cookie_header, Attributes, ServerRequest},
        uploaded_file::{
            parse_uploaded_files, UploadError, UploadedFile, UploadedFileTree, UploadedFiles,
        },
    },
};
