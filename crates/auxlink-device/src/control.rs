//! Outbound control channel.
//!
//! Handlers never write to the UART directly. They queue [`ControlCommand`]s
//! on a [`ControlSender`]; the writer task drains the queue into the UART
//! through [`AuxCodec`], in the order the commands were queued.

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tracing::{debug, trace};

use auxlink_core::{Error, Result};
use auxlink_protocol::{AuxCodec, ControlCommand};

/// Create a connected sender/receiver pair.
pub fn control_channel() -> (ControlSender, ControlReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlSender { tx }, ControlReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::UnboundedSender<ControlCommand>,
}

impl ControlSender {
    /// Queue a command for the chip.
    ///
    /// # Errors
    /// Returns `Error::ChannelClosed` once the writer side is gone.
    pub fn send(&self, command: ControlCommand) -> Result<()> {
        trace!(%command, "queue control command");
        self.tx
            .send(command)
            .map_err(|_| Error::ChannelClosed("control"))
    }
}

#[derive(Debug)]
pub struct ControlReceiver {
    rx: mpsc::UnboundedReceiver<ControlCommand>,
}

impl ControlReceiver {
    pub async fn recv(&mut self) -> Option<ControlCommand> {
        self.rx.recv().await
    }

    /// Take every command queued so far without waiting.
    pub fn drain(&mut self) -> Vec<ControlCommand> {
        let mut commands = Vec::new();
        while let Ok(command) = self.rx.try_recv() {
            commands.push(command);
        }
        commands
    }

    /// Write queued commands to `uart` until every sender is dropped.
    ///
    /// # Errors
    /// Returns the first write error; the caller treats it as fatal.
    pub async fn run_writer<W>(mut self, uart: W, codec: AuxCodec) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut sink = FramedWrite::new(uart, codec);
        while let Some(command) = self.rx.recv().await {
            debug!(%command, "send control command");
            sink.send(command).await?;
        }
        Ok(())
    }
}
