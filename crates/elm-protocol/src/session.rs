//! Adapter Session
//!
//! Ties one transport to one reply assembler. The receive side feeds a
//! [`FragmentSink`]; the consumer side waits on the shared [`ReplySlot`]
//! through the [`ElmSession`].

use crate::assembler::{FrameAssembler, Reply};
use crate::config::LinkConfig;
use crate::error::ElmError;
use crate::handoff::ReplySlot;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Link state as seen by the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// No link
    Disconnected,
    /// Link is being opened
    Connecting,
    /// Transport attached, replies flowing
    Connected,
    /// Last attempt failed; reconnection may be tried
    Retry,
}

/// Receive side of a session
///
/// Owned by whichever task reads from the adapter. Fragments must be fed
/// one at a time in arrival order.
#[derive(Debug)]
pub struct FragmentSink {
    assembler: FrameAssembler,
    slot: Arc<ReplySlot>,
}

impl FragmentSink {
    fn new(slot: Arc<ReplySlot>) -> Self {
        Self {
            assembler: FrameAssembler::new(),
            slot,
        }
    }

    /// Feed one received fragment, publishing the reply it completes
    pub fn on_fragment(&mut self, fragment: &str) {
        if let Some(reply) = self.assembler.on_fragment(fragment) {
            debug!("Reply {:?} complete ({} chars)", reply.id, reply.body.len());
            self.slot.publish(reply);
        }
    }

    /// Number of replies completed on this link
    pub fn completed(&self) -> u64 {
        self.assembler.completed()
    }
}

/// Consumer side of an adapter link
pub struct ElmSession<T: Transport> {
    transport: Option<T>,
    slot: Arc<ReplySlot>,
    status: ConnectionStatus,
    retry: bool,
    reply_timeout: Duration,
    init_sequence: Vec<String>,
}

impl<T: Transport> ElmSession<T> {
    /// Create a disconnected session
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            transport: None,
            slot: Arc::new(ReplySlot::new()),
            status: ConnectionStatus::Disconnected,
            retry: config.retry,
            reply_timeout: config.reply_timeout(),
            init_sequence: config.init_sequence(),
        }
    }

    /// Mark the link as being opened
    pub fn begin_connect(&mut self) {
        self.status = ConnectionStatus::Connecting;
    }

    /// Attach an open transport and get the sink for its inbound fragments
    ///
    /// Every attach starts from a fresh assembler and an empty slot.
    pub fn attach(&mut self, transport: T) -> FragmentSink {
        if let Some(mut old) = self.transport.take() {
            old.close();
        }
        self.slot = Arc::new(ReplySlot::new());
        self.transport = Some(transport);
        self.status = ConnectionStatus::Connected;
        info!("Adapter link attached");
        FragmentSink::new(Arc::clone(&self.slot))
    }

    /// Record a failed connection attempt
    pub fn connection_failed(&mut self, err: &ElmError) {
        warn!("Connection failed: {}", err);
        self.transport = None;
        self.status = ConnectionStatus::Retry;
    }

    /// Send a command to the adapter
    ///
    /// Empty commands are ignored. A send failure forces a disconnect.
    pub fn send_message(&mut self, message: &str) -> Result<(), ElmError> {
        if message.is_empty() {
            return Ok(());
        }
        let transport = self.transport.as_mut().ok_or(ElmError::NotConnected)?;

        debug!("Sending {:?}", message);
        if let Err(e) = transport.send_message(message) {
            warn!("Send error: {}", e);
            self.disconnect();
            return Err(e);
        }
        Ok(())
    }

    /// Send a command and wait for the next complete reply
    pub fn query(&mut self, command: &str) -> Result<Reply, ElmError> {
        if let Some(stale) = self.slot.take() {
            debug!("Discarding stale reply {:?}", stale.id);
        }
        self.send_message(command)?;
        self.slot
            .wait_timeout(self.reply_timeout)
            .ok_or_else(|| ElmError::Timeout(timeout_ms(self.reply_timeout)))
    }

    /// Run the configured init sequence, returning each reply
    pub fn initialize(&mut self) -> Result<Vec<Reply>, ElmError> {
        info!("Initializing adapter ({} commands)", self.init_sequence.len());
        let sequence = self.init_sequence.clone();
        sequence.iter().map(|cmd| self.query(cmd)).collect()
    }

    /// Take a completed reply without waiting
    pub fn take_reply(&self) -> Option<Reply> {
        self.slot.take()
    }

    /// Wait up to `timeout` for a completed reply
    pub fn wait_reply(&self, timeout: Duration) -> Option<Reply> {
        self.slot.wait_timeout(timeout)
    }

    /// Whether a completed reply is waiting
    pub fn is_reply_ready(&self) -> bool {
        self.slot.is_ready()
    }

    /// Close the link and drop its reply state
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            info!("Disconnecting adapter link");
            transport.close();
        }
        // Late fragments from the old sink land in a slot nobody reads
        self.slot = Arc::new(ReplySlot::new());
        self.status = ConnectionStatus::Disconnected;
    }

    /// Current link state
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Check if a transport is attached
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Whether reconnection should be attempted
    pub fn retry(&self) -> bool {
        self.retry
    }

    /// Set whether reconnection should be attempted
    pub fn set_retry(&mut self, retry: bool) {
        self.retry = retry;
    }

    /// Set the reply timeout
    pub fn set_reply_timeout(&mut self, timeout: Duration) {
        self.reply_timeout = timeout;
    }
}

/// Milliseconds in `timeout`, saturating at `u64::MAX`
fn timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
