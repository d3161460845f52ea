//! Serialized access to one [`DeviceSession`] from any number of threads.
//!
//! The session is moved onto a worker thread that drains a FIFO job queue. Callers submit
//! closures and wait for their result, so jobs run one at a time in the order they were
//! admitted and no job ever sees the session halfway through another one. Handles are cheap
//! to clone; the worker exits once the last handle is dropped.

use std::thread;

use crate::error::{Error, Result};
use crate::link::Link;
use crate::session::{DeviceInfo, DeviceSession, OutputRequest, StatusSnapshot};

type Job<L> = Box<dyn FnOnce(&mut DeviceSession<L>) + Send>;

/// Name of the worker thread owning the session.
pub const WORKER_NAME: &str = "device-arbiter";

pub struct CommandArbiter<L: Link> {
    jobs: flume::Sender<Job<L>>,
}

impl<L: Link> Clone for CommandArbiter<L> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}

impl<L: Link + Send + 'static> CommandArbiter<L> {
    /// Move `session` onto a new worker thread and return the first handle to it.
    pub fn spawn(mut session: DeviceSession<L>) -> std::io::Result<Self> {
        let (jobs, queue) = flume::unbounded::<Job<L>>();
        thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || {
                for job in queue.iter() {
                    job(&mut session);
                }
                tracing::debug!("All arbiter handles dropped, releasing the device");
            })?;
        Ok(Self { jobs })
    }

    /// Queue `op` and return a receiver for its result without waiting.
    pub fn submit<T, F>(&self, op: F) -> Result<flume::Receiver<Result<T>>>
    where
        T: Send + 'static,
        F: FnOnce(&mut DeviceSession<L>) -> Result<T> + Send + 'static,
    {
        let (reply, result) = flume::bounded(1);
        let job: Job<L> = Box::new(move |session| {
            // The caller may have stopped waiting.
            let _ = reply.send(op(session));
        });
        self.jobs.send(job).map_err(|_| Error::NotConnected)?;
        Ok(result)
    }

    /// Run `op` against the session once every job admitted before it has finished.
    pub fn execute<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DeviceSession<L>) -> Result<T> + Send + 'static,
    {
        self.submit(op)?.recv().map_err(|_| Error::NotConnected)?
    }

    pub fn read_status(&self) -> Result<StatusSnapshot> {
        self.execute(|session| session.read_status())
    }

    pub fn set_output(&self, request: OutputRequest) -> Result<()> {
        self.execute(move |session| session.set_output(request))
    }

    pub fn device_info(&self) -> Result<DeviceInfo> {
        self.execute(|session| Ok(session.device_info()))
    }

    pub fn reconnect(&self) -> Result<()> {
        self.execute(|session| session.reconnect())
    }
}
