use std::any::Any;
use std::sync::mpsc::SyncSender;

use tokio::sync::oneshot;

use crate::access::AccessMode;
use crate::connection::Connection;
use crate::error::Result;

pub(super) type Payload = Box<dyn Any + Send>;
pub(super) type Job = Box<dyn FnOnce(&mut Connection) -> Result<Payload> + Send>;

pub(super) enum Reply {
    Finished(Result<Payload>),
    /// The body panicked; the payload is resumed on the submitting thread.
    Panicked(Payload),
}

/// Where the worker sends a reply: a blocked thread or an awaiting task.
pub(super) enum Responder {
    Blocking(SyncSender<Reply>),
    Async(oneshot::Sender<Reply>),
}

impl Responder {
    pub(super) fn send(self, reply: Reply) {
        // A caller that stopped waiting is not an error for the worker.
        match self {
            Self::Blocking(sender) => {
                let _ = sender.send(reply);
            }
            Self::Async(sender) => {
                let _ = sender.send(reply);
            }
        }
    }
}

pub(super) enum Command {
    Access {
        mode: AccessMode,
        job: Job,
        respond_to: Responder,
    },
    Shutdown,
}
