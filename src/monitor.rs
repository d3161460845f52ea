//! Periodic status polling through the arbiter.
//!
//! Each poll is an ordinary arbiter job, so monitoring interleaves with SCPI clients instead
//! of competing with them for the link.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::arbiter::CommandArbiter;
use crate::error::Error;
use crate::link::Link;
use crate::session::StatusSnapshot;

/// A background thread reading the status every `interval` until stopped or dropped.
pub struct StatusMonitor {
    shutdown: Option<flume::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl StatusMonitor {
    /// Start polling. Every successful read is logged and handed to `on_status`.
    ///
    /// Read failures are logged and polling continues, except for
    /// [`Error::NotConnected`], which ends the monitor.
    pub fn spawn<L, F>(
        arbiter: CommandArbiter<L>,
        interval: Duration,
        mut on_status: F,
    ) -> std::io::Result<Self>
    where
        L: Link + Send + 'static,
        F: FnMut(&StatusSnapshot) + Send + 'static,
    {
        let (shutdown, stop) = flume::bounded::<()>(1);
        let worker = thread::Builder::new()
            .name("status-monitor".to_string())
            .spawn(move || {
                tracing::info!("Monitoring status every {interval:?}");
                loop {
                    match arbiter.read_status() {
                        Ok(status) => {
                            tracing::info!(
                                "{:.2}V {:.3}A {:.2}W {}",
                                status.real_voltage,
                                status.real_current,
                                status.real_power,
                                if status.power_on { "ON" } else { "OFF" }
                            );
                            on_status(&status);
                        }
                        Err(Error::NotConnected) => {
                            tracing::warn!("Device gone, monitoring stopped");
                            return;
                        }
                        Err(err) => tracing::warn!("Status poll failed: {err}"),
                    }

                    match stop.recv_timeout(interval) {
                        Err(flume::RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(flume::RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::info!("Monitoring stopped");
            })?;

        Ok(Self {
            shutdown: Some(shutdown),
            worker: Some(worker),
        })
    }

    /// Stop polling and wait for the thread to finish its current read.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for StatusMonitor {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the worker out of its wait.
        self.shutdown.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
