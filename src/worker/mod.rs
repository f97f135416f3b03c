//! The dedicated thread that owns a queue's connection and runs accesses in submission order.

mod channel;
mod dispatcher;
mod manager;

pub(crate) use manager::QueueWorker;
