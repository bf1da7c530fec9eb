//! Minimal client for the [rosbridge v2 protocol](https://github.com/RobotWebTools/rosbridge_suite/blob/ros1/ROSBRIDGE_PROTOCOL.md).
//!
//! Only topic subscriptions are supported: every subscribed topic gets exactly one typed callback which is
//! invoked from [`RosBridge::spin`] for each message published on it.

use crate::Result;
use futures::SinkExt;
use log::{debug, error, info, trace, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::net::TcpStream;
use tokio_stream::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

/// Operations sent to the bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Subscribe {
        id: &'a str,
        topic: &'a str,
        #[serde(rename = "type")]
        msg_type: &'a str,
    },
    Unsubscribe {
        id: &'a str,
        topic: &'a str,
    },
}

/// Operations received from the bridge; everything but these is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Incoming {
    Publish {
        topic: String,
        msg: Value,
    },
    Status {
        #[serde(default)]
        level: Option<String>,
        msg: String,
    },
    #[serde(other)]
    Other,
}

type Callback = Box<dyn FnMut(Value) + Send>;

struct Subscription {
    id: String,
    callback: Callback,
}

/// A connection to a rosbridge server.
#[allow(missing_debug_implementations)]
pub struct RosBridge {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    subscriptions: HashMap<String, Subscription>,
    next_id: u64,
}

impl RosBridge {
    /// Connect to the bridge listening on `ws://<host>:<port>`.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let url = Url::parse(&format!("ws://{}:{}", host, port))?;
        info!("connecting to rosbridge at {}", url);
        let (ws, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        debug!("connected to {}", url);

        Ok(RosBridge {
            ws,
            subscriptions: HashMap::new(),
            next_id: 1,
        })
    }

    /// Subscribe to `topic` of type `msg_type` and have `callback` called with every message on it.
    ///
    /// Messages which do not deserialize into `T` are logged and dropped. Subscribing to a topic again
    /// replaces the previous callback.
    pub async fn subscribe<T, F>(&mut self, topic: &str, msg_type: &str, mut callback: F) -> Result<()>
    where
        T: DeserializeOwned + 'static,
        F: FnMut(T) + Send + 'static,
    {
        let id = format!("subscribe:{}:{}", topic, self.next_id);
        self.next_id += 1;
        info!("subscribing to {} [{}]", topic, msg_type);
        self.send(&Request::Subscribe {
            id: &id,
            topic,
            msg_type,
        })
        .await?;

        let topic_name = topic.to_string();
        let callback: Callback = Box::new(move |msg: Value| match serde_json::from_value::<T>(msg) {
            Ok(msg) => callback(msg),
            Err(e) => warn!("failed to decode message on topic {}: {}", topic_name, e),
        });
        if let Some(old) = self
            .subscriptions
            .insert(topic.to_string(), Subscription { id, callback })
        {
            debug!("replaced subscription {} on {}", old.id, topic);
        }
        Ok(())
    }

    /// Dispatch incoming messages until the bridge closes the connection.
    pub async fn spin(&mut self) -> Result<()> {
        while let Some(frame) = self.ws.next().await {
            match frame? {
                Message::Text(text) => self.dispatch(&text),
                Message::Close(frame) => {
                    info!("bridge closed the connection: {:?}", frame);
                    break;
                }
                other => trace!("ignoring frame: {:?}", other),
            }
        }
        Ok(())
    }

    /// Unsubscribe from everything and close the connection.
    pub async fn terminate(mut self) -> Result<()> {
        let subscriptions = std::mem::take(&mut self.subscriptions);
        for (topic, subscription) in &subscriptions {
            debug!("unsubscribing from {}", topic);
            self.send(&Request::Unsubscribe {
                id: &subscription.id,
                topic,
            })
            .await?;
        }
        SinkExt::close(&mut self.ws).await?;
        Ok(())
    }

    /// Topics with an active subscription.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.keys().map(String::as_str)
    }

    fn dispatch(&mut self, text: &str) {
        let incoming = match serde_json::from_str::<Incoming>(text) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!("ignoring undecodable bridge message ({}): {}", e, text);
                return;
            }
        };

        match incoming {
            Incoming::Publish { topic, msg } => match self.subscriptions.get_mut(&topic) {
                Some(subscription) => {
                    trace!("message on {}", topic);
                    (subscription.callback)(msg)
                }
                None => warn!("received message on unknown topic: {}", topic),
            },
            Incoming::Status { level, msg } => match level.as_deref() {
                Some("error") => error!("bridge: {}", msg),
                Some("warning") => warn!("bridge: {}", msg),
                Some("info") => info!("bridge: {}", msg),
                _ => debug!("bridge: {}", msg),
            },
            Incoming::Other => trace!("ignoring bridge message: {}", text),
        }
    }

    async fn send(&mut self, request: &Request<'_>) -> Result<()> {
        let text = serde_json::to_string(request)?;
        trace!("sending {}", text);
        self.ws.send(Message::Text(text.into())).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odometry::{ODOMETRY_TOPIC, ODOMETRY_TYPE, Odometry};
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    async fn next_op(ws: &mut WebSocketStream<TcpStream>) -> Value {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    }

    async fn publish(ws: &mut WebSocketStream<TcpStream>, msg: Value) {
        ws.send(Message::Text(msg.to_string().into())).await.unwrap();
    }

    #[test]
    fn test_request_layout() {
        let request = Request::Subscribe {
            id: "subscribe:/odometry/filtered:1",
            topic: ODOMETRY_TOPIC,
            msg_type: ODOMETRY_TYPE,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "op": "subscribe",
                "id": "subscribe:/odometry/filtered:1",
                "topic": "/odometry/filtered",
                "type": "nav_msgs/Odometry"
            })
        );
    }

    #[test]
    fn test_unknown_ops_are_tolerated() {
        let incoming: Incoming =
            serde_json::from_str(r#"{"op": "service_response", "values": {}}"#).unwrap();
        assert!(matches!(incoming, Incoming::Other));
    }

    #[tokio::test]
    async fn test_subscribe_dispatch_and_terminate() {
        let _ = env_logger::builder().is_test(true).try_init();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let subscribe = next_op(&mut ws).await;
            assert_eq!(subscribe["op"], "subscribe");
            assert_eq!(subscribe["topic"], ODOMETRY_TOPIC);
            assert_eq!(subscribe["type"], ODOMETRY_TYPE);

            publish(&mut ws, json!({"op": "status", "level": "warning", "msg": "slow"})).await;
            publish(&mut ws, json!({"op": "publish", "topic": "/other", "msg": {}})).await;
            publish(&mut ws, json!({"op": "publish", "topic": ODOMETRY_TOPIC, "msg": {"pose": {}}})).await;
            for (x, y) in [(json!(1.5), json!(-2.25)), (json!(0), json!(7))] {
                let msg = json!({"pose": {"pose": {"position": {"x": x, "y": y, "z": 0.0}}}});
                publish(&mut ws, json!({"op": "publish", "topic": ODOMETRY_TOPIC, "msg": msg})).await;
            }

            let unsubscribe = next_op(&mut ws).await;
            assert_eq!(unsubscribe["op"], "unsubscribe");
            assert_eq!(unsubscribe["id"], subscribe["id"]);
            assert_eq!(unsubscribe["topic"], ODOMETRY_TOPIC);
        });

        let mut bridge = RosBridge::connect("127.0.0.1", port).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bridge
            .subscribe(ODOMETRY_TOPIC, ODOMETRY_TYPE, move |msg: Odometry| {
                let _ = tx.send(msg.describe());
            })
            .await
            .unwrap();
        assert_eq!(bridge.topics().collect::<Vec<_>>(), vec![ODOMETRY_TOPIC]);

        let mut lines = Vec::new();
        tokio::select! {
            r = bridge.spin() => panic!("bridge stopped early: {:?}", r),
            _ = async {
                while lines.len() < 2 {
                    lines.push(rx.recv().await.unwrap());
                }
            } => {}
        }
        assert_eq!(
            lines,
            vec!["Received Pose: x=1.5, y=-2.25", "Received Pose: x=0, y=7"]
        );

        bridge.terminate().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_spin_ends_when_bridge_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            SinkExt::close(&mut ws).await.unwrap();
            // drain until the client acknowledged the close
            while let Some(Ok(_)) = ws.next().await {}
        });

        let mut bridge = RosBridge::connect("127.0.0.1", port).await.unwrap();
        bridge.spin().await.unwrap();
        drop(bridge);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(RosBridge::connect("127.0.0.1", port).await.is_err());
    }
}
