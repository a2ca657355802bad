//! Outbound message seam
//!
//! The sync layer hands every message to a [`MessageSink`]. Production code
//! encodes into a crossbeam channel drained by the transport; tests record.

use crossbeam_channel::{Receiver, Sender};

use crate::net::protocol::{encode, EncodeError, ServerMessage};
use crate::net::ClientId;

/// Errors while handing a message to the transport
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Outbound channel closed")]
    ChannelClosed,
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Reliable point-to-point delivery to one client
pub trait MessageSink {
    fn send_to(&mut self, client: ClientId, message: ServerMessage) -> Result<(), SendError>;
}

/// Encoded message addressed to one client
#[derive(Debug, Clone)]
pub struct Outbound {
    pub client: ClientId,
    pub payload: Vec<u8>,
}

/// Encodes messages and queues them for the transport task
pub struct ChannelSink {
    tx: Sender<Outbound>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Outbound>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end for the transport
    pub fn unbounded() -> (Self, Receiver<Outbound>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }
}

impl MessageSink for ChannelSink {
    fn send_to(&mut self, client: ClientId, message: ServerMessage) -> Result<(), SendError> {
        let payload = encode(&message)?;
        self.tx
            .send(Outbound { client, payload })
            .map_err(|_| SendError::ChannelClosed)
    }
}

/// Keeps every message in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub sent: Vec<(ClientId, ServerMessage)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }

    /// Messages addressed to `client`, in send order
    pub fn messages_for(&self, client: ClientId) -> Vec<&ServerMessage> {
        self.sent
            .iter()
            .filter(|(to, _)| *to == client)
            .map(|(_, msg)| msg)
            .collect()
    }
}

impl MessageSink for RecordingSink {
    fn send_to(&mut self, client: ClientId, message: ServerMessage) -> Result<(), SendError> {
        self.sent.push((client, message));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{decode, SchematicsMessage};
    use uuid::Uuid;

    #[test]
    fn test_channel_sink_encodes() {
        let (mut sink, rx) = ChannelSink::unbounded();
        let client = Uuid::new_v4();
        sink.send_to(client, ServerMessage::Schematics(SchematicsMessage))
            .unwrap();

        let out = rx.try_recv().unwrap();
        assert_eq!(out.client, client);
        let decoded: ServerMessage = decode(&out.payload).unwrap();
        assert_eq!(decoded, ServerMessage::Schematics(SchematicsMessage));
    }

    #[test]
    fn test_channel_sink_closed() {
        let (mut sink, rx) = ChannelSink::unbounded();
        drop(rx);
        let result = sink.send_to(Uuid::new_v4(), ServerMessage::Schematics(SchematicsMessage));
        assert!(matches!(result, Err(SendError::ChannelClosed)));
    }

    #[test]
    fn test_recording_sink_filters_by_client() {
        let mut sink = RecordingSink::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        sink.send_to(a, ServerMessage::Schematics(SchematicsMessage)).unwrap();
        sink.send_to(b, ServerMessage::Schematics(SchematicsMessage)).unwrap();
        sink.send_to(a, ServerMessage::Schematics(SchematicsMessage)).unwrap();

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.messages_for(a).len(), 2);
        assert_eq!(sink.messages_for(b).len(), 1);
    }
}
