use burro_clients::serial::{
    CommandSource, DEFAULT_BAUD_RATE, DEFAULT_INTERVAL, DEFAULT_PORT, SerialClient, SerialConfig,
};
use clap::Parser;
use log::{error, info};
use std::time::Duration;
use tokio::select;

/// Interact with a serial device: send a line, print the line it answers with.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Serial port to connect to.
    #[arg(long, default_value = DEFAULT_PORT)]
    port: String,

    /// Baud rate for the serial connection.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Read timeout for the serial connection, in seconds.
    #[arg(long, default_value = "0.5", value_parser = parse_seconds)]
    timeout: Duration,

    /// Command to send to the device on every iteration instead of prompting for one.
    #[arg(long)]
    cmd: Option<String>,
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{}", e))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("not a valid duration: {}", s))
}

impl Cli {
    fn config(&self) -> SerialConfig {
        SerialConfig {
            port: self.port.clone(),
            baud_rate: self.baud,
            timeout: self.timeout,
            interval: DEFAULT_INTERVAL,
        }
    }
}

#[tokio::main]
async fn main() {
    burro_clients::init_logging();
    let cli = Cli::parse();
    let config = cli.config();

    let mut client = match SerialClient::open(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to open serial port: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Open serial device: port={}, baud={}, timeout={}",
        config.port,
        config.baud_rate,
        config.timeout.as_secs_f64()
    );

    let mut commands = match cli.cmd {
        Some(cmd) => CommandSource::Fixed(cmd),
        None => CommandSource::stdin(),
    };

    select! {
        _ = client.run(&mut commands) => {},
        _ = tokio::signal::ctrl_c() => {},
    }

    info!("Exiting...");
    // a pending stdin read would keep the runtime from shutting down
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["serial_api_client"]).unwrap();
        assert_eq!(cli.config(), SerialConfig::default());
        assert_eq!(cli.cmd, None);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "serial_api_client",
            "--port",
            "/dev/ttyUSB0",
            "--baud",
            "9600",
            "--timeout",
            "1.25",
            "--cmd",
            "STATUS",
        ])
        .unwrap();
        let config = cli.config();
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_millis(1250));
        assert_eq!(cli.cmd.as_deref(), Some("STATUS"));
    }

    #[test]
    fn test_invalid_timeout() {
        for timeout in ["-1", "NaN", "inf", "soon"] {
            assert!(
                Cli::try_parse_from(["serial_api_client", "--timeout", timeout]).is_err(),
                "{} should be rejected",
                timeout
            );
        }
    }
}
