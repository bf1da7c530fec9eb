//! Line based command/response client for a serial device.
//!
//! Every exchange writes one `\r` terminated line and waits, up to a deadline, for the `\r` terminated
//! answer. Failures are reported per exchange so the caller can keep going.

use crate::codec::CrLineCodec;
use crate::response::ApiResponse;
use crate::{Error, Result};
use futures::SinkExt;
use log::{debug, error, info, trace, warn};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader, Lines, Stdin};
use tokio::time::Instant;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_stream::StreamExt;
use tokio_util::codec::{Decoder, Framed};

/// Default device path, the pseudo terminal a `socat` pair usually hands out.
pub const DEFAULT_PORT: &str = "/dev/pts/5";
/// Default symbol rate.
pub const DEFAULT_BAUD_RATE: u32 = 115200;
/// Default deadline for a response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);
/// Default pause between two exchanges.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

const PROMPT: &str = "Enter data to send: ";

/// Connection parameters of a [`SerialClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct SerialConfig {
    /// Path of the serial device.
    pub port: String,
    /// Symbol rate of the link.
    pub baud_rate: u32,
    /// How long to wait for a terminated response.
    pub timeout: Duration,
    /// Pause after every exchange in [`SerialClient::run`].
    pub interval: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// How a single exchange ended.
#[derive(Debug)]
pub enum Outcome {
    /// A terminated line came back in time (trimmed).
    Response(String),
    /// No terminator arrived before the deadline; holds whatever was received so far (trimmed, possibly empty).
    Timeout(String),
    /// Writing, reading or decoding failed.
    DeviceError(Error),
}

/// One request line together with how the device reacted to it.
#[derive(Debug)]
pub struct Exchange {
    /// The line which was sent, without terminator.
    pub request: String,
    /// Time between the write completing and the read finishing.
    pub elapsed: Duration,
    /// What came back.
    pub outcome: Outcome,
}

impl Exchange {
    /// The received text, if the exchange got as far as reading anything.
    pub fn response(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Response(line) | Outcome::Timeout(line) => Some(line),
            Outcome::DeviceError(_) => None,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    /// Write the result to the log.
    pub fn log(&self) {
        match &self.outcome {
            Outcome::Response(line) => {
                info!("Received: {} ({:.3}ms)", line, self.elapsed_ms());
                match ApiResponse::parse(line) {
                    Ok(response) if response.is_error() => warn!("{}", response),
                    Ok(response) => debug!("{}", response),
                    Err(e) => trace!("not an API response: {}", e),
                }
            }
            Outcome::Timeout(partial) => {
                info!("Received: {} ({:.3}ms, timed out)", partial, self.elapsed_ms())
            }
            Outcome::DeviceError(e) => error!("Error: {}", e),
        }
    }
}

/// Where the lines to send come from.
#[derive(Debug)]
pub enum CommandSource<R = BufReader<Stdin>> {
    /// Send the same line on every iteration.
    Fixed(String),
    /// Prompt for every line and read it from `R`.
    Interactive(Lines<R>),
}

impl CommandSource {
    /// Prompt on stdout and read the commands from stdin.
    pub fn stdin() -> Self {
        CommandSource::Interactive(BufReader::new(tokio::io::stdin()).lines())
    }
}

impl<R: AsyncBufRead + Unpin> CommandSource<R> {
    /// Read commands from the given reader, one per line.
    pub fn interactive(reader: R) -> Self {
        CommandSource::Interactive(reader.lines())
    }

    /// The next line to send, or [`None`] once the input is exhausted.
    pub async fn next_command(&mut self) -> Option<String> {
        match self {
            CommandSource::Fixed(cmd) => {
                info!("Sending: {}", cmd);
                Some(cmd.clone())
            }
            CommandSource::Interactive(lines) => loop {
                print!("{}", PROMPT);
                if let Err(e) = std::io::stdout().flush() {
                    warn!("failed to flush prompt: {}", e);
                }
                match lines.next_line().await {
                    Ok(line) => break line,
                    Err(e) => error!("Error: {}", e),
                }
            },
        }
    }
}

/// A command/response connection to a serial device.
#[allow(missing_debug_implementations)]
pub struct SerialClient<S = SerialStream> {
    serial: Framed<S, CrLineCodec>,
    timeout: Duration,
    interval: Duration,
}

impl SerialClient {
    /// Open the serial port described by `config`.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = tokio_serial::new(config.port.as_str(), config.baud_rate)
            .timeout(config.timeout)
            .open_native_async()?;
        Ok(SerialClient::new(port, config.timeout, config.interval))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> SerialClient<S> {
    /// Wrap an already opened byte stream.
    pub fn new(serial: S, timeout: Duration, interval: Duration) -> Self {
        SerialClient {
            serial: CrLineCodec::new().framed(serial),
            timeout,
            interval,
        }
    }

    /// Send `line` and wait for the answer.
    pub async fn exchange(&mut self, line: &str) -> Exchange {
        let started = Instant::now();
        if let Err(e) = self.serial.send(line).await {
            return Exchange {
                request: line.to_string(),
                elapsed: started.elapsed(),
                outcome: Outcome::DeviceError(e.into()),
            };
        }
        trace!("sent {:?}", line);

        let tic = Instant::now();
        let read = tokio::time::timeout(self.timeout, self.serial.next()).await;
        let outcome = match read {
            Ok(Some(Ok(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => Outcome::Response(text.trim().to_string()),
                Err(e) => Outcome::DeviceError(e.into()),
            },
            Ok(Some(Err(e))) => Outcome::DeviceError(e.into()),
            Ok(None) => Outcome::DeviceError(Error::ConnectionClosed),
            Err(_) => {
                let partial = self.serial.read_buffer_mut().split();
                self.serial.codec_mut().reset();
                debug!("no terminator within {:?} ({} bytes pending)", self.timeout, partial.len());
                Outcome::Timeout(String::from_utf8_lossy(&partial).trim().to_string())
            }
        };

        Exchange {
            request: line.to_string(),
            elapsed: tic.elapsed(),
            outcome,
        }
    }

    /// Keep exchanging commands until `commands` runs dry.
    ///
    /// Failed exchanges are logged and do not stop the loop; to stop it on a signal, race it against one
    /// (e.g. with `tokio::select!`).
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, commands: &mut CommandSource<R>) {
        while let Some(cmd) = commands.next_command().await {
            let exchange = self.exchange(&cmd).await;
            exchange.log();
            tokio::time::sleep(self.interval).await;
        }
        info!("no more commands");
    }

    /// The underlying stream.
    pub fn get_ref(&self) -> &S {
        self.serial.get_ref()
    }
}
