/// Errors that can occur across the vision and spotlight services.
#[derive(Debug, thiserror::Error)]
pub enum HomesightError {
    #[error("MQTT client error: {0}")]
    Bus(#[from] rumqttc::ClientError),

    #[error("MQTT connection error: {0}")]
    BusConnection(#[from] rumqttc::ConnectionError),

    #[error("camera unavailable: {0}")]
    Camera(String),

    #[error("GPIO hardware unavailable: {0}")]
    Gpio(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("polygon is self-intersecting between edges {0} and {1}")]
    SelfIntersectingPolygon(usize, usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
