//! Outbound transport seam

use crate::error::ElmError;
use tokio::sync::mpsc;

/// Outbound side of an adapter link
///
/// Commands pass straight through uninterpreted. Inbound text reaches the
/// session through a [`FragmentSink`](crate::FragmentSink) instead.
pub trait Transport: Send {
    /// Send one command to the adapter
    fn send_message(&mut self, message: &str) -> Result<(), ElmError>;

    /// Release the link
    fn close(&mut self) {}
}

/// Transport that hands commands to a writer task over a channel
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    commands: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    /// Create a transport and the receiver its writer drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (Self { commands }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send_message(&mut self, message: &str) -> Result<(), ElmError> {
        self.commands
            .send(message.to_string())
            .map_err(|_| ElmError::LinkClosed)
    }
}
