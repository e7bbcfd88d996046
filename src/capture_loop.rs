// SPDX-License-Identifier: GPL-3.0-only

//! Capture thread for one pipeline session
//!
//! Every running device owns one background thread that pulls framesets
//! out of its [`SensorPipeline`]. The loop also owns the shutdown
//! handshake: the frameset wait blocks inside the pipeline, so
//! [`CaptureLoop::shutdown`] raises the stop flag, wakes the wait
//! through `SensorPipeline::stop`, and only then joins.

use std::io;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::backend::SensorPipeline;

/// Handle to one device's running capture thread
pub struct CaptureLoop {
    serial: String,
    stop_flag: Arc<AtomicBool>,
    pipeline: Arc<dyn SensorPipeline>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureLoop {
    /// Spawn the capture thread for one pipeline session
    ///
    /// `cycle` runs repeatedly until it breaks or `shutdown()` is
    /// called. One cycle must be bounded in time (the frameset wait has
    /// a timeout) or shutdown cannot be prompt.
    pub fn spawn<F>(
        serial: &str,
        pipeline: Arc<dyn SensorPipeline>,
        mut cycle: F,
    ) -> io::Result<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop_flag);
        let name = format!("capture-{serial}");

        let thread = thread::Builder::new().name(name.clone()).spawn(move || {
            debug!(thread = %name, "Capture thread up");
            while !flag.load(Ordering::Acquire) {
                if let ControlFlow::Break(()) = cycle() {
                    debug!(thread = %name, "Capture cycle ended the session");
                    break;
                }
            }
            info!(thread = %name, "Capture thread exited");
        })?;

        Ok(Self {
            serial: serial.to_string(),
            stop_flag,
            pipeline,
            thread: Some(thread),
        })
    }

    /// Whether the capture thread is still alive. False once the cycle
    /// ends the session on its own, e.g. after a device disconnect.
    pub fn is_alive(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the thread and wait for it: raise the flag, wake any
    /// in-flight frameset wait, join. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stop_flag.store(true, Ordering::Release);
        // The flag alone cannot interrupt a wait blocked inside the
        // pipeline; releasing the pipeline does.
        self.pipeline.stop();
        if thread.join().is_err() {
            warn!(serial = %self.serial, "Capture thread panicked");
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DepthBackend;
    use crate::backend::mock::MockBackend;
    use crate::config::{StreamConfig, StreamSet};
    use std::sync::atomic::AtomicU32;
    use std::time::{Duration, Instant};

    fn open_pipeline() -> (Arc<MockBackend>, Arc<dyn SensorPipeline>) {
        let backend = Arc::new(MockBackend::new());
        backend.plug("SN-LOOP", "Mock Depth Camera");
        let streams = StreamSet {
            depth: Some(StreamConfig::depth(4, 4, 30)),
            ..Default::default()
        };
        let pipeline = backend.open_pipeline("SN-LOOP", &streams).unwrap();
        (backend, pipeline)
    }

    #[test]
    fn shutdown_wakes_a_blocked_wait() {
        let (_backend, pipeline) = open_pipeline();
        let waiter = Arc::clone(&pipeline);
        let mut capture = CaptureLoop::spawn("SN-LOOP", pipeline, move || {
            match waiter.wait_for_frameset(Duration::from_secs(30)) {
                Ok(_) => ControlFlow::Continue(()),
                Err(_) => ControlFlow::Break(()),
            }
        })
        .unwrap();
        assert!(capture.is_alive());

        let begin = Instant::now();
        capture.shutdown();
        // Joined long before the 30 s wait would have timed out.
        assert!(begin.elapsed() < Duration::from_secs(5));
        assert!(!capture.is_alive());
    }

    #[test]
    fn cycle_can_end_the_session() {
        let (_backend, pipeline) = open_pipeline();
        let cycles = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&cycles);
        let capture = CaptureLoop::spawn("SN-LOOP", pipeline, move || {
            if counter.fetch_add(1, Ordering::SeqCst) >= 4 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while capture.is_alive() {
            assert!(Instant::now() < deadline, "capture thread did not exit");
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(cycles.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn drop_joins_the_thread() {
        let (_backend, pipeline) = open_pipeline();
        let keepalive = Arc::clone(&pipeline);
        let capture = CaptureLoop::spawn("SN-LOOP", pipeline, move || {
            let _ = keepalive.wait_for_frameset(Duration::from_millis(50));
            ControlFlow::Continue(())
        })
        .unwrap();
        assert!(capture.is_alive());
        drop(capture);
    }
}
