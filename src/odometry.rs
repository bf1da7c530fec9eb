//! The parts of `nav_msgs/Odometry` the viewer cares about.
//!
//! Only `pose.pose.position` is modelled; every other field of the message is ignored when deserializing.
//! Coordinates are kept as JSON numbers so they print exactly as the bridge sent them.

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Topic the robot publishes its filtered odometry on.
pub const ODOMETRY_TOPIC: &str = "/odometry/filtered";
/// Message type of [`ODOMETRY_TOPIC`].
pub const ODOMETRY_TYPE: &str = "nav_msgs/Odometry";

/// This represents an estimate of a position and velocity in free space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Odometry {
    /// The estimated pose.
    pub pose: PoseWithCovariance,
}

/// A pose in free space with uncertainty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseWithCovariance {
    /// The pose itself; the covariance is not read.
    pub pose: Pose,
}

/// A representation of pose in free space; only the position is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position of the local coordinate frame.
    pub position: Point,
}

/// This contains the position of a point in free space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate; `null` on the wire becomes [`None`].
    pub x: Option<Number>,
    /// Y coordinate; `null` on the wire becomes [`None`].
    pub y: Option<Number>,
    /// Z coordinate, absent on some planar robots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<Number>,
}

impl Odometry {
    /// The position of the local frame.
    pub fn position(&self) -> &Point {
        &self.pose.pose.position
    }

    /// The line the viewer prints for this message.
    pub fn describe(&self) -> String {
        describe_position(self.position())
    }
}

/// `Received Pose: x=<x>, y=<y>`
pub fn describe_position(position: &Point) -> String {
    format!(
        "Received Pose: x={}, y={}",
        coordinate(&position.x),
        coordinate(&position.y)
    )
}

fn coordinate(value: &Option<Number>) -> String {
    match value {
        Some(n) => n.to_string(),
        None => "null".to_string(),
    }
}
