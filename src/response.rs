//! Parsing of the device API's response lines.
//!
//! A response looks like `%?STTN=1 2_`: a leading `%`, the command it answers, a single `=`, then the
//! payload (a timestamp followed by the returned values) closed by `_`. Anything after the `_` is ignored.

use crate::{Error, Result};
use std::fmt::{Display, Formatter};

const RESPONSE_MARKER: char = '%';
const SEPARATOR: char = '=';
const END_MARKER: char = '_';
const ERROR_MARKER: &str = "#ERR";

/// A response line sent back by the device API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    command: String,
    payload: String,
}

impl ApiResponse {
    /// Parse a single (already unframed) response line.
    pub fn parse(line: &str) -> Result<Self> {
        let malformed = || Error::MalformedResponse(line.to_string());

        let body = line.strip_prefix(RESPONSE_MARKER).ok_or_else(malformed)?;
        let (command, rest) = body.split_once(SEPARATOR).ok_or_else(malformed)?;
        if rest.contains(SEPARATOR) {
            return Err(malformed());
        }
        let payload = match rest.find(END_MARKER) {
            Some(end) => &rest[..end],
            None => rest,
        };

        Ok(ApiResponse {
            command: command.to_string(),
            payload: payload.to_string(),
        })
    }

    /// The command this is a response to, e.g. `?STTN`.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Everything between `=` and `_`.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// The whitespace separated payload fields; the first one is the timestamp.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.payload.split_whitespace()
    }

    /// Whether the API reported an error for the command.
    pub fn is_error(&self) -> bool {
        self.payload.contains(ERROR_MARKER)
    }
}

impl Display for ApiResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_error() {
            write!(
                f,
                "API returned an error for command {}: {}",
                self.command, self.payload
            )
        } else {
            write!(f, "{} = {}", self.command, self.payload)
        }
    }
}
