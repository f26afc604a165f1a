//! Pull side of a socket's data channel.

use crate::socket::SocketShared;
use bytes::Bytes;
use futures::stream::{self, Stream};
use std::rc::Weak;

/// Lazy sequence of received payloads.
///
/// Asking for the next message tells the socket the consumer wants more,
/// which resumes receive polling after backpressure paused it. The sequence
/// ends once the socket closes and everything buffered has been read.
pub struct Reader {
    socket: Weak<SocketShared>,
    rx: flume::Receiver<Bytes>,
    high_water_mark: usize,
}

impl Reader {
    pub(crate) fn new(socket: Weak<SocketShared>, rx: flume::Receiver<Bytes>, high_water_mark: usize) -> Self {
        Self {
            socket,
            rx,
            high_water_mark,
        }
    }

    /// Next message, or `None` at end of stream.
    pub async fn recv(&self) -> Option<Bytes> {
        self.request_more();
        let msg = self.rx.recv_async().await.ok();
        if msg.is_some() && self.rx.len() < self.high_water_mark {
            self.request_more();
        }
        msg
    }

    /// Next message if one is already buffered.
    pub fn try_recv(&self) -> Option<Bytes> {
        let msg = self.rx.try_recv().ok();
        if msg.is_some() {
            self.request_more();
        }
        msg
    }

    /// Messages buffered and not yet read.
    pub fn buffered(&self) -> usize {
        self.rx.len()
    }

    /// Ask the socket for more data without waiting.
    pub fn request_more(&self) {
        if let Some(socket) = self.socket.upgrade() {
            socket.request_more();
        }
    }

    /// Turn the reader into a [`Stream`] of payloads.
    pub fn into_stream(self) -> impl Stream<Item = Bytes> {
        stream::unfold(self, |reader| async move {
            let msg = reader.recv().await?;
            Some((msg, reader))
        })
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("buffered", &self.rx.len())
            .field("high_water_mark", &self.high_water_mark)
            .finish()
    }
}
