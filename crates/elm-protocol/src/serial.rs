//! Serial Link to the Adapter
//!
//! Opens the adapter's serial device (for a Bluetooth adapter, its RFCOMM
//! binding) and runs one reader and one writer task over it. The reader
//! turns the byte stream into line fragments for a [`FragmentSink`].

use crate::config::LinkConfig;
use crate::error::ElmError;
use crate::session::FragmentSink;
use crate::transport::ChannelTransport;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

/// Read buffer size per receive
const READ_CHUNK: usize = 256;

/// Longest line held back before it is passed on unterminated
const MAX_LINE: usize = 1024;

/// Command terminator expected by the adapter
const COMMAND_TERMINATOR: char = '\r';

/// Splits received bytes into non-empty lines
///
/// Either `\r` or `\n` ends a line. Text after the last terminator is held
/// back until more bytes arrive, so the adapter's `>` prompt ends up at the
/// start of the following line. A line that reaches `MAX_LINE` bytes
/// without a terminator is passed on as it stands.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Add received bytes and return the lines they complete
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\r' || byte == b'\n' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
                if self.pending.len() >= MAX_LINE {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            }
        }
        lines
    }

    /// Bytes received after the last line terminator
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

/// An opened serial device, not yet running
pub struct SerialLink {
    stream: SerialStream,
    commands: mpsc::UnboundedReceiver<String>,
}

impl SerialLink {
    /// Open the configured device
    pub fn open(config: &LinkConfig) -> Result<(Self, ChannelTransport), ElmError> {
        info!(
            "Opening serial device {} at {} baud",
            config.device,
            config.effective_baud_rate()
        );
        let stream = tokio_serial::new(config.device.as_str(), config.effective_baud_rate())
            .timeout(config.reply_timeout())
            .open_native_async()?;
        let (transport, commands) = ChannelTransport::channel();
        Ok((Self { stream, commands }, transport))
    }

    /// Start the reader and writer tasks
    pub fn spawn(self, sink: FragmentSink) -> LinkTasks {
        let (reader, writer) = tokio::io::split(self.stream);
        LinkTasks {
            reader: tokio::spawn(read_fragments(reader, sink)),
            writer: tokio::spawn(write_commands(writer, self.commands)),
        }
    }
}

/// Handles of a running link's tasks
pub struct LinkTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl LinkTasks {
    /// Whether the adapter side has gone away
    pub fn is_closed(&self) -> bool {
        self.reader.is_finished()
    }

    /// Stop both tasks
    pub fn shutdown(self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Feed every line read from `reader` to `sink` until EOF or a read error
pub async fn read_fragments<R>(mut reader: R, mut sink: FragmentSink)
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::default();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                info!("Adapter closed the link");
                break;
            }
            Ok(n) => {
                for line in splitter.push(&buf[..n]) {
                    sink.on_fragment(&line);
                }
            }
            Err(e) => {
                warn!("Serial read failed: {}", e);
                break;
            }
        }
    }

    debug!("Reader stopped after {} replies", sink.completed());
}

/// Write each queued command, terminated, until the queue closes
pub async fn write_commands<W>(mut writer: W, mut commands: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut command) = commands.recv().await {
        if !command.ends_with(COMMAND_TERMINATOR) {
            command.push(COMMAND_TERMINATOR);
        }
        let written = async {
            writer.write_all(command.as_bytes()).await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            warn!("Serial write failed: {}", e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ElmSession;
    use crate::transport::Transport;
    use std::time::Duration;

    #[test]
    fn test_splitter_holds_partial_line() {
        let mut splitter = LineSplitter::default();
        assert_eq!(splitter.push(b"OK\r\r>"), vec!["OK"]);
        assert_eq!(splitter.pending(), b">");

        assert_eq!(splitter.push(b"12.6V\r"), vec![">12.6V"]);
        assert!(splitter.pending().is_empty());
    }

    #[test]
    fn test_splitter_handles_crlf_and_chunks() {
        let mut splitter = LineSplitter::default();
        assert!(splitter.push(b"ELM3").is_empty());
        assert_eq!(splitter.push(b"27 v1.5\r\nnext"), vec!["ELM327 v1.5"]);
        assert_eq!(splitter.push(b"\n"), vec!["next"]);
    }

    #[test]
    fn test_splitter_caps_unterminated_line() {
        let mut splitter = LineSplitter::default();
        let flood = vec![b'A'; MAX_LINE * 2 + 10];

        let lines = splitter.push(&flood);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|line| line.len() == MAX_LINE));
        assert_eq!(splitter.pending().len(), 10);

        assert_eq!(splitter.push(b"\r"), vec!["A".repeat(10)]);
    }

    #[test]
    fn test_splitter_is_lossy() {
        let mut splitter = LineSplitter::default();
        assert_eq!(splitter.push(b"A\xffB\r"), vec!["A\u{fffd}B"]);
    }

    #[tokio::test]
    async fn test_reader_feeds_session() {
        let mut session = ElmSession::new(&LinkConfig::default());
        let (transport, _commands) = ChannelTransport::channel();
        let sink = session.attach(transport);

        let (mut adapter, host) = tokio::io::duplex(64);
        adapter.write_all(b"ATRV\r12.6V\r\r>").await.unwrap();
        adapter.write_all(b"ATRV\r").await.unwrap();
        drop(adapter);

        read_fragments(host, sink).await;
        // The prompt glued to the echoed command is not a voltage readout
        assert!(!session.is_reply_ready());
    }

    #[tokio::test]
    async fn test_reader_publishes_voltage() {
        let mut session = ElmSession::new(&LinkConfig::default());
        let (transport, _commands) = ChannelTransport::channel();
        let sink = session.attach(transport);

        let (mut adapter, host) = tokio::io::duplex(64);
        adapter.write_all(b"\r\r>").await.unwrap();
        adapter.write_all(b"12.6V\r").await.unwrap();
        drop(adapter);

        read_fragments(host, sink).await;
        let reply = session.wait_reply(Duration::ZERO).unwrap();
        assert_eq!(reply.body, "12.6V");
    }

    #[tokio::test]
    async fn test_writer_terminates_commands() {
        let (mut transport, commands) = ChannelTransport::channel();
        let (host, mut adapter) = tokio::io::duplex(64);
        transport.send_message("ATZ").unwrap();
        transport.send_message("ATE0\r").unwrap();
        drop(transport);

        write_commands(host, commands).await;

        let mut received = String::new();
        adapter.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "ATZ\rATE0\r");
    }
}
