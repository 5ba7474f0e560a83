use thiserror::Error;

/// Why an inbound WebSocket frame was not turned into a client event.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("binary frames are not part of the protocol")]
    Binary,
    #[error("malformed event: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomIdError {
    #[error("room id is longer than {max} bytes")]
    TooLong { max: usize },
    #[error("room id contains unsupported character {0:?}")]
    InvalidChar(char),
}
