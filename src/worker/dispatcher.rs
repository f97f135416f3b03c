use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;

use crate::access::AccessMode;
use crate::connection::Connection;

use super::channel::{Command, Job, Reply};

pub(super) fn run_queue_worker(mut conn: Connection, receiver: &Receiver<Command>) {
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Shutdown => break,
            Command::Access {
                mode,
                job,
                respond_to,
            } => {
                let reply = run_job(&mut conn, mode, job);
                respond_to.send(reply);
            }
        }
    }
    if let Err(err) = conn.close() {
        tracing::warn!(error = %err, "failed to close queue connection");
    }
}

fn run_job(conn: &mut Connection, mode: AccessMode, job: Job) -> Reply {
    match panic::catch_unwind(AssertUnwindSafe(|| conn.run_access(mode, job))) {
        Ok(result) => Reply::Finished(result),
        Err(payload) => {
            tracing::debug!("queue access panicked; restoring connection");
            conn.restore_after_panic();
            Reply::Panicked(payload)
        }
    }
}
