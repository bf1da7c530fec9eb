//! Small clients for talking to a Burro robot: a serial command/response client for the device API and a
//! [rosbridge](https://github.com/RobotWebTools/rosbridge_suite) subscriber for its odometry.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(unused)]

mod codec;
pub mod odometry;
pub mod response;
pub mod rosbridge;
pub mod serial;

pub use crate::codec::CrLineCodec;
use std::fmt::{Display, Formatter};

/// All methods in this crate will return this kind of Result.
#[derive(Debug)]
pub enum Error {
    /// Errors from [`codec`]
    CodecError(codec::Error),
    /// General IO Errors
    IoError(std::io::Error),
    /// The serial port could not be opened or configured.
    SerialError(tokio_serial::Error),
    /// Error coming from the WebSocket transport to the bridge.
    WebSocketError(Box<tokio_tungstenite::tungstenite::Error>),
    /// A message could not be (de)serialized as JSON.
    JsonError(serde_json::Error),
    /// The bridge address does not form a valid URL.
    InvalidUrl(url::ParseError),
    /// The device answered with bytes which are not valid UTF-8.
    InvalidUtf8(std::string::FromUtf8Error),
    /// The peer closed the connection.
    ConnectionClosed,
    /// A device response did not follow the `%<command>=<payload>_` layout.
    MalformedResponse(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::CodecError(e) => write!(f, "the codec encountered an error: {}", e),
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::SerialError(e) => write!(f, "serial port error: {}", e),
            Error::WebSocketError(e) => write!(f, "WebSocket error: {}", e),
            Error::JsonError(e) => write!(f, "JSON error: {}", e),
            Error::InvalidUrl(e) => write!(f, "invalid bridge URL: {}", e),
            Error::InvalidUtf8(_) => write!(f, "response is not valid UTF-8"),
            Error::ConnectionClosed => write!(f, "connection closed by peer"),
            Error::MalformedResponse(r) => write!(f, "malformed response: {:?}", r),
        }
    }
}

impl From<codec::Error> for Error {
    fn from(e: codec::Error) -> Self {
        Error::CodecError(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}

impl From<tokio_serial::Error> for Error {
    fn from(e: tokio_serial::Error) -> Self {
        Error::SerialError(e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocketError(Box::new(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::JsonError(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidUrl(e)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Error::InvalidUtf8(e)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::CodecError(e) => Some(e),
            Error::IoError(e) => Some(e),
            Error::SerialError(e) => Some(e),
            Error::WebSocketError(e) => Some(e.as_ref()),
            Error::JsonError(e) => Some(e),
            Error::InvalidUrl(e) => Some(e),
            Error::InvalidUtf8(e) => Some(e),
            _ => None,
        }
    }
}

/// All methods in this crate will return this kind of Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Set up `env_logger` the way both binaries want it: `info` and above unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
