use Error::*;
use log::{debug, warn};
use std::fmt::{Display, Formatter};
use tokio_util::bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// All methods in this module will return this kind of Result.
#[derive(Debug)]
pub enum Error {
    /// An underlying IO error occurred.
    IoError(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        IoError(value)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError(e) => Some(e),
        }
    }
}

/// All methods in this module will return this kind of Result.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) const TERMINATOR: u8 = b'\r';
pub(crate) const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Frames a byte stream into lines terminated by a single carriage return.
///
/// Decoded lines do not contain the terminator; no character set is assumed. A line growing past
/// [`MAX_LINE_LENGTH`] bytes is dropped up to and including its terminator; decoding never fails on the
/// content, so the stream stays usable afterwards.
#[derive(Debug, Default, Clone)]
pub struct CrLineCodec {
    discarding: bool,
}

impl CrLineCodec {
    /// A codec which is not in the middle of any line.
    pub fn new() -> Self {
        CrLineCodec::default()
    }

    /// Forget about a line being dropped; the next byte starts a new line.
    pub(crate) fn reset(&mut self) {
        self.discarding = false;
    }
}

impl Decoder for CrLineCodec {
    type Item = BytesMut;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let terminator = src.as_ref().iter().position(|b| *b == TERMINATOR);
            match terminator {
                Some(n) if self.discarding => {
                    src.advance(n + 1);
                    self.discarding = false;
                    debug!("end of over-long line, {} bytes skipped", n);
                }
                Some(n) => {
                    let mut line = src.split_to(n + 1);
                    line.truncate(n);
                    return Ok(Some(line));
                }
                None if self.discarding => {
                    src.clear();
                    return Ok(None);
                }
                None if src.len() > MAX_LINE_LENGTH => {
                    warn!(
                        "dropping line: {} bytes without terminator (max: {})",
                        src.len(),
                        MAX_LINE_LENGTH
                    );
                    src.clear();
                    self.discarding = true;
                    return Ok(None);
                }
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => {
                self.discarding = false;
                Ok(None)
            }
            // hand out whatever is left, the peer is gone and won't terminate it
            None => Ok(Some(src.split())),
        }
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for CrLineCodec {
    type Error = Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<()> {
        let line = item.as_ref();
        dst.reserve(line.len() + 1);
        dst.put_slice(line);
        dst.put_u8(TERMINATOR);
        Ok(())
    }
}
