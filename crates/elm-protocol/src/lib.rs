//! ELM327 Link Protocol
//!
//! This crate reassembles the text replies of ELM327-compatible OBD-II
//! adapters from arbitrarily chunked receive fragments, hands completed
//! replies from the receive task to a waiting consumer, and drives the
//! adapter over a serial link.

mod assembler;
mod config;
mod error;
mod handoff;
mod protocol;
mod serial;
mod session;
mod transport;

pub use assembler::{is_completion, FrameAssembler, Reply};
pub use config::LinkConfig;
pub use error::ElmError;
pub use handoff::ReplySlot;
pub use protocol::{AtCommand, ObdProtocol};
pub use serial::{read_fragments, write_commands, LineSplitter, LinkTasks, SerialLink};
pub use session::{ConnectionStatus, ElmSession, FragmentSink};
pub use transport::{ChannelTransport, Transport};
