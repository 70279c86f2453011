use std::{fmt::Display, sync::Arc};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, Stream, StreamExt, future};
use tracing::{debug, info};

use crate::{
    dispatcher::Dispatcher,
    error::RelayError,
    frame::Frame,
    registry::{ConnectionId, FrameSink},
};

/// Serves an upgraded socket until the peer goes away.
pub async fn serve_socket(socket: WebSocket, dispatcher: Arc<Dispatcher>) {
    let (sink, stream) = socket.split();
    let sink: FrameSink = Box::pin(
        sink.with(|frame: Frame| future::ready(Ok::<Message, RelayError>(frame.into()))),
    );

    let session = Session::open(dispatcher, sink).await;
    session.run(stream).await;
}

/// A registered connection whose read loop has not ended yet.
pub struct Session {
    id: ConnectionId,
    dispatcher: Arc<Dispatcher>,
}

impl Session {
    /// Allocates an id and registers `sink` as the connection's outbound half.
    pub async fn open(dispatcher: Arc<Dispatcher>, sink: FrameSink) -> Self {
        let id = dispatcher.registry().next_id();
        dispatcher.registry().register(id, sink).await;
        info!(connection = %id, "connection opened");
        Self { id, dispatcher }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Runs the read loop: every data frame triggers one broadcast round.
    ///
    /// A close frame, end of stream, or receive error ends the session and
    /// unregisters the connection.
    pub async fn run<St, E>(self, mut inbound: St)
    where
        St: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        loop {
            match inbound.next().await {
                Some(Ok(Message::Close(frame))) => {
                    debug!(connection = %self.id, ?frame, "peer sent close frame");
                    break;
                }
                Some(Ok(message)) => {
                    if let Some(frame) = Frame::from_message(message) {
                        debug!(connection = %self.id, bytes = frame.len(), "received frame");
                        self.dispatcher.dispatch(self.id, frame).await;
                    }
                }
                Some(Err(err)) => {
                    debug!(connection = %self.id, error = %err, "receive failed");
                    break;
                }
                None => break,
            }
        }

        self.close().await;
    }

    async fn close(self) {
        if self.dispatcher.registry().unregister(self.id).await {
            info!(connection = %self.id, "connection closed");
        }
    }
}
