//! Background worker that moves buffered records to the shipper
//!
//! The worker waits on a control channel with a timeout equal to the poll
//! interval. A `Wake` only cuts the wait short. The loop ends on `Stop` or
//! when every control sender is gone, and then runs a final drain-to-empty
//! pass before the thread exits.

use super::shipper::Shipper;
use crate::core::{diagnostics, AppenderError, RecordBuffer, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PumpState {
    /// Waiting for the next tick
    Idle = 0,
    /// Shipping buffered records
    Draining = 1,
    /// Stop received, final drain in progress
    Stopping = 2,
    /// Worker has exited
    Stopped = 3,
}

impl PumpState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PumpState::Idle,
            1 => PumpState::Draining,
            2 => PumpState::Stopping,
            _ => PumpState::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Wake,
    Stop,
}

struct Worker {
    shipper: Arc<Shipper>,
    buffer: Arc<RecordBuffer>,
    control: Receiver<Control>,
    state: Arc<AtomicU8>,
    max_batch: usize,
    poll_interval: Duration,
}

impl Worker {
    fn run(self) {
        loop {
            if !self.buffer.is_empty() {
                self.set_state(PumpState::Draining);
                self.guarded(|| self.ship_pending());
                // Keep Stopping/Stopped if they were set meanwhile
                let _ = self.state.compare_exchange(
                    PumpState::Draining as u8,
                    PumpState::Idle as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }

            match self.control.recv_timeout(self.poll_interval) {
                Ok(Control::Wake) | Err(RecvTimeoutError::Timeout) => continue,
                Ok(Control::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.set_state(PumpState::Stopping);
        self.guarded(|| {
            self.shipper.drain_to_empty(&self.buffer, self.max_batch);
        });
        self.set_state(PumpState::Stopped);
    }

    /// Ship what was buffered when the tick started
    ///
    /// Records offered while this runs wait for the next tick, so a steady
    /// stream of producers cannot keep the worker from seeing `Stop`.
    fn ship_pending(&self) {
        let pending = self.buffer.len();
        let mut shipped = 0;
        while shipped < pending {
            let taken = self.shipper.drain_and_send(&self.buffer, self.max_batch);
            if taken == 0 {
                break;
            }
            shipped += taken;
        }
    }

    fn guarded(&self, step: impl FnOnce()) {
        self.shipper.contained(step);
    }

    fn set_state(&self, state: PumpState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Handle to a running pump thread
pub struct BackgroundPump {
    name: String,
    control: Sender<Control>,
    state: Arc<AtomicU8>,
    handle: JoinHandle<()>,
}

impl BackgroundPump {
    /// Start the worker thread `cloudwatch-pump-<name>`
    pub fn spawn(
        name: &str,
        shipper: Arc<Shipper>,
        buffer: Arc<RecordBuffer>,
        max_batch: usize,
        poll_interval: Duration,
    ) -> Result<Self> {
        // One pending wake is as good as many
        let (control, receiver) = bounded(1);
        let state = Arc::new(AtomicU8::new(PumpState::Idle as u8));

        let worker = Worker {
            shipper,
            buffer,
            control: receiver,
            state: Arc::clone(&state),
            max_batch,
            poll_interval,
        };

        let handle = thread::Builder::new()
            .name(format!("cloudwatch-pump-{}", name))
            .spawn(move || worker.run())
            .map_err(AppenderError::WorkerSpawn)?;

        Ok(Self {
            name: name.to_string(),
            control,
            state,
            handle,
        })
    }

    pub fn state(&self) -> PumpState {
        PumpState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// End the current wait early
    pub fn wake(&self) {
        let _ = self.control.try_send(Control::Wake);
    }

    /// Ask the worker to drain and exit, waiting at most `timeout`
    ///
    /// Returns `true` if the worker finished within the timeout. The worker is
    /// never killed; on timeout it keeps draining in the background.
    pub fn stop(self, timeout: Duration) -> bool {
        let Self {
            name,
            control,
            state: _,
            handle,
        } = self;

        // Dropping the sender stops the worker even if a wake is still queued
        let _ = control.try_send(Control::Stop);
        drop(control);

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if handle.join().is_err() {
                    diagnostics::debug(format!("Pump thread for '{}' panicked", name));
                    return false;
                }
                return true;
            }

            if start.elapsed() >= timeout {
                diagnostics::debug(format!(
                    "Pump thread for '{}' did not finish within {:?}, records may be lost",
                    name, timeout
                ));
                return false;
            }

            thread::sleep(Duration::from_millis(1));
        }
    }
}
