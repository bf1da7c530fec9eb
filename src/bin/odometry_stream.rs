//! Streams the robot's odometry from its rosbridge and prints the x and y position of its local frame.

use burro_clients::odometry::{ODOMETRY_TOPIC, ODOMETRY_TYPE, Odometry};
use burro_clients::rosbridge::RosBridge;
use log::{error, info};
use tokio::select;

const BRIDGE_HOST: &str = "192.168.3.42";
const BRIDGE_PORT: u16 = 9090;

/// Print odometry until `shutdown` resolves or the bridge connection fails.
///
/// Only a failing connection is an error; a shutdown or the bridge closing the connection is not.
async fn view(mut bridge: RosBridge, shutdown: impl Future<Output = ()>) -> burro_clients::Result<()> {
    let subscribed = bridge
        .subscribe(ODOMETRY_TOPIC, ODOMETRY_TYPE, |msg: Odometry| {
            println!("{}", msg.describe())
        })
        .await;
    if let Err(e) = subscribed {
        error!("failed to subscribe to {}: {}", ODOMETRY_TOPIC, e);
        return Err(e);
    }

    let spun = select! {
        r = bridge.spin() => r,
        _ = shutdown => Ok(()),
    };
    if let Err(e) = &spun {
        error!("encountered error: {}", e);
    }

    info!("shutting down");

    if let Err(e) = bridge.terminate().await {
        error!("failed to close the bridge connection: {}", e);
    }
    spun
}

#[tokio::main]
async fn main() {
    burro_clients::init_logging();

    let bridge = match RosBridge::connect(BRIDGE_HOST, BRIDGE_PORT).await {
        Ok(bridge) => bridge,
        Err(e) => {
            error!("failed to connect to rosbridge at {}:{}: {}", BRIDGE_HOST, BRIDGE_PORT, e);
            std::process::exit(1);
        }
    };

    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    if view(bridge, interrupted).await.is_err() {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    async fn bridge_and_server() -> (RosBridge, tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio_tungstenite::accept_async(stream).await.unwrap()
        });
        let bridge = RosBridge::connect("127.0.0.1", port).await.unwrap();
        (bridge, accept.await.unwrap())
    }

    #[tokio::test]
    async fn test_dropped_connection_is_a_failure() {
        let (bridge, mut server) = bridge_and_server().await;
        let server = tokio::spawn(async move {
            // wait for the subscription, then vanish without a closing handshake
            match server.next().await {
                Some(Ok(Message::Text(_))) => {}
                other => panic!("expected a subscribe op, got {:?}", other),
            }
        });

        let result = view(bridge, std::future::pending()).await;
        server.await.unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_interrupt_is_a_clean_shutdown() {
        let (bridge, mut server) = bridge_and_server().await;
        let server = tokio::spawn(async move {
            let mut ops = 0;
            while let Some(Ok(msg)) = server.next().await {
                if let Message::Text(_) = msg {
                    ops += 1;
                }
            }
            ops
        });

        assert!(view(bridge, async {}).await.is_ok());
        // subscribe and unsubscribe
        assert_eq!(server.await.unwrap(), 2);
    }
}
