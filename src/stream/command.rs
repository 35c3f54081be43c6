//! Cross-context control of a stream controller
//!
//! Consumers living on other threads or tasks never touch controller state.
//! They push [`Command`]s that the controller drains at the top of each tick,
//! so attach/detach order is preserved exactly as sent.

use flume::{Receiver, Sender};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Attach,
    Detach,
    RequestImage,
}

/// Cloneable sender side handed out to consumers
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: Sender<Command>,
}

impl ControlHandle {
    pub fn attach(&self) {
        self.send(Command::Attach);
    }

    pub fn detach(&self) {
        self.send(Command::Detach);
    }

    pub fn request_image(&self) {
        self.send(Command::RequestImage);
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            warn!("Stream controller is gone, dropping {:?}", command);
        }
    }
}

pub(crate) fn channel() -> (ControlHandle, Receiver<Command>) {
    let (tx, rx) = flume::unbounded();
    (ControlHandle { tx }, rx)
}
