use std::panic;
use std::sync::Mutex;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::oneshot;

use crate::access::AccessMode;
use crate::connection::Connection;
use crate::error::{Result, SqliteAccessError};

use super::channel::{Command, Job, Payload, Reply, Responder};
use super::dispatcher::run_queue_worker;

pub(crate) struct QueueWorker {
    sender: Sender<Command>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
    label: String,
}

impl QueueWorker {
    pub(crate) fn spawn(conn: Connection, label: String) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let handle = thread::Builder::new()
            .name(format!("sqlite-queue-{label}"))
            .spawn(move || run_queue_worker(conn, &receiver))
            .map_err(|err| {
                SqliteAccessError::ConnectionError(format!(
                    "failed to spawn SQLite queue thread: {err}"
                ))
            })?;
        let thread_id = handle.thread().id();
        tracing::debug!(label = %label, "queue worker started");
        Ok(Self {
            sender,
            thread_id,
            handle: Mutex::new(Some(handle)),
            label,
        })
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    /// Submit `body` and block until the worker has run it.
    pub(crate) fn access<T, F>(&self, mode: AccessMode, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_not_on_worker()?;
        let (respond_to, reply) = mpsc::sync_channel(1);
        self.send_command(Command::Access {
            mode,
            job: box_job(body),
            respond_to: Responder::Blocking(respond_to),
        })?;
        let reply = reply.recv().map_err(|_| SqliteAccessError::Closed)?;
        unpack(reply)
    }

    /// Submit `body` and await the worker's reply without blocking the runtime.
    pub(crate) async fn access_async<T, F>(&self, mode: AccessMode, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_not_on_worker()?;
        let (respond_to, reply) = oneshot::channel();
        self.send_command(Command::Access {
            mode,
            job: box_job(body),
            respond_to: Responder::Async(respond_to),
        })?;
        let reply = reply.await.map_err(|_| SqliteAccessError::Closed)?;
        unpack(reply)
    }

    /// Stop accepting work, let queued accesses finish, and wait for the connection to close.
    pub(crate) fn shutdown(&self) -> Result<()> {
        self.ensure_not_on_worker()?;
        let _ = self.sender.send(Command::Shutdown);
        // Held through the join so a concurrent caller returns only once the thread is gone.
        let mut slot = self
            .handle
            .lock()
            .map_err(|_| connection_error("SQLite queue handle lock poisoned"))?;
        if let Some(handle) = slot.take() {
            handle
                .join()
                .map_err(|_| connection_error("SQLite queue thread panicked"))?;
            tracing::debug!(label = %self.label, "queue worker stopped");
        }
        Ok(())
    }

    fn send_command(&self, command: Command) -> Result<()> {
        self.sender
            .send(command)
            .map_err(|_| SqliteAccessError::Closed)
    }

    fn ensure_not_on_worker(&self) -> Result<()> {
        if thread::current().id() == self.thread_id {
            Err(SqliteAccessError::misuse(format!(
                "re-entrant access to queue {}: use the connection passed to the running access",
                self.label
            )))
        } else {
            Ok(())
        }
    }
}

impl Drop for QueueWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

fn box_job<T, F>(body: F) -> Job
where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    Box::new(move |conn| body(conn).map(|value| Box::new(value) as Payload))
}

fn unpack<T: 'static>(reply: Reply) -> Result<T> {
    match reply {
        Reply::Finished(Ok(payload)) => payload
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| connection_error("SQLite queue response downcast failure")),
        Reply::Finished(Err(err)) => Err(err),
        Reply::Panicked(payload) => panic::resume_unwind(payload),
    }
}

fn connection_error(message: &str) -> SqliteAccessError {
    SqliteAccessError::ConnectionError(message.into())
}
