use thiserror::Error;

/// Failure to hand a frame to one connection's outbound half.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("websocket transport error: {0}")]
    Transport(#[from] axum::Error),
    #[error("peer outbound channel is closed")]
    PeerGone,
}
