// SPDX-License-Identifier: GPL-3.0-only

//! In-process mock hardware subsystem
//!
//! A scriptable stand-in for the real sensor stack: tests and offline
//! development plug/unplug virtual units, inject framesets, and inspect
//! the option pushes a running pipeline received. Delivery semantics
//! match real hardware: hot-plug notifications fire on the caller's
//! thread, frameset waits block on a condvar, and unplugging a unit
//! fails any in-flight wait with a disconnect error.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use super::{
    ConnectionChange, ConnectionHandler, DepthBackend, DeviceDesc, Intrinsics, OptionRange,
    SensorOption, SensorPipeline,
};
use crate::config::{StreamConfig, StreamKind, StreamSet};
use crate::errors::{CoreError, CoreResult, FrameWaitError};
use crate::frame::{Frameset, VideoFrame};

const DEFAULT_EXPOSURE_RANGE: OptionRange = OptionRange {
    min: 1.0,
    max: 165_000.0,
    step: 1.0,
    default: 8_500.0,
};

const BOOL_RANGE: OptionRange = OptionRange {
    min: 0.0,
    max: 1.0,
    step: 1.0,
    default: 1.0,
};

/// Meters per raw depth unit reported by mock pipelines
pub const MOCK_DEPTH_SCALE: f32 = 0.001;

struct MockUnit {
    desc: DeviceDesc,
    exposure_range: OptionRange,
    supported: HashSet<SensorOption>,
    refuse_streams: bool,
    pipelines: Vec<Arc<PipeShared>>,
}

impl MockUnit {
    fn new(desc: DeviceDesc) -> Self {
        let supported = [
            SensorOption::AutoExposure,
            SensorOption::EmitterEnabled,
            SensorOption::Exposure,
        ]
        .into_iter()
        .collect();
        Self {
            desc,
            exposure_range: DEFAULT_EXPOSURE_RANGE,
            supported,
            refuse_streams: false,
            pipelines: Vec::new(),
        }
    }
}

struct Inner {
    fail_connect: bool,
    devices: Vec<MockUnit>,
    handler: Option<Arc<ConnectionHandler>>,
}

/// Scriptable mock hardware subsystem
pub struct MockBackend {
    inner: Mutex<Inner>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                fail_connect: false,
                devices: Vec::new(),
                handler: None,
            }),
        }
    }

    /// Make subsequent `connect()` calls fail with `HardwareUnavailable`
    pub fn fail_connections(&self, fail: bool) {
        self.inner.lock().unwrap().fail_connect = fail;
    }

    /// Connect a virtual unit; fires the hot-plug handler on this thread
    pub fn plug(&self, serial: &str, name: &str) {
        let desc = DeviceDesc {
            serial: serial.to_string(),
            name: name.to_string(),
        };
        let handler = {
            let mut inner = self.inner.lock().unwrap();
            inner.devices.push(MockUnit::new(desc.clone()));
            inner.handler.clone()
        };
        if let Some(handler) = handler {
            handler(ConnectionChange {
                added: vec![desc],
                removed: vec![],
            });
        }
    }

    /// Disconnect a virtual unit: fails in-flight waits on its pipelines
    /// and fires the hot-plug handler on this thread
    pub fn unplug(&self, serial: &str) {
        let (pipelines, handler) = {
            let mut inner = self.inner.lock().unwrap();
            let Some(pos) = inner.devices.iter().position(|u| u.desc.serial == serial) else {
                return;
            };
            let unit = inner.devices.remove(pos);
            (unit.pipelines, inner.handler.clone())
        };
        for pipe in &pipelines {
            pipe.disconnect();
        }
        if let Some(handler) = handler {
            handler(ConnectionChange {
                added: vec![],
                removed: vec![serial.to_string()],
            });
        }
    }

    /// Deliver one frameset to every open pipeline of a unit
    ///
    /// Streams the pipeline did not bind are dropped from the delivered
    /// frameset, matching real per-stream negotiation.
    pub fn inject_frameset(&self, serial: &str, frameset: Frameset) {
        let pipelines: Vec<Arc<PipeShared>> = {
            let inner = self.inner.lock().unwrap();
            match inner.devices.iter().find(|u| u.desc.serial == serial) {
                Some(unit) => unit.pipelines.clone(),
                None => return,
            }
        };
        for pipe in pipelines {
            pipe.deliver(frameset.clone());
        }
    }

    /// Override the exposure range a unit reports
    pub fn set_exposure_range(&self, serial: &str, range: OptionRange) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(unit) = inner.devices.iter_mut().find(|u| u.desc.serial == serial) {
            unit.exposure_range = range;
        }
    }

    /// Restrict which sensor options a unit supports
    pub fn set_supported_options(&self, serial: &str, options: &[SensorOption]) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(unit) = inner.devices.iter_mut().find(|u| u.desc.serial == serial) {
            unit.supported = options.iter().copied().collect();
        }
    }

    /// Make `open_pipeline` reject any stream combination for a unit
    pub fn refuse_streams(&self, serial: &str, refuse: bool) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(unit) = inner.devices.iter_mut().find(|u| u.desc.serial == serial) {
            unit.refuse_streams = refuse;
        }
    }

    /// Option pushes recorded across all of a unit's pipeline sessions
    pub fn pushed_options(&self, serial: &str) -> Vec<(SensorOption, f64)> {
        let inner = self.inner.lock().unwrap();
        let Some(unit) = inner.devices.iter().find(|u| u.desc.serial == serial) else {
            return Vec::new();
        };
        unit.pipelines
            .iter()
            .flat_map(|p| p.options_log.lock().unwrap().clone())
            .collect()
    }
}

impl DepthBackend for MockBackend {
    fn connect(&self) -> CoreResult<()> {
        if self.inner.lock().unwrap().fail_connect {
            return Err(CoreError::HardwareUnavailable(
                "mock subsystem offline".to_string(),
            ));
        }
        Ok(())
    }

    fn devices(&self) -> Vec<DeviceDesc> {
        self.inner
            .lock()
            .unwrap()
            .devices
            .iter()
            .map(|u| u.desc.clone())
            .collect()
    }

    fn set_connection_handler(&self, handler: Option<ConnectionHandler>) {
        self.inner.lock().unwrap().handler = handler.map(Arc::new);
    }

    fn option_range(&self, serial: &str, option: SensorOption) -> Option<OptionRange> {
        let inner = self.inner.lock().unwrap();
        let unit = inner.devices.iter().find(|u| u.desc.serial == serial)?;
        if !unit.supported.contains(&option) {
            return None;
        }
        Some(match option {
            SensorOption::Exposure => unit.exposure_range,
            SensorOption::AutoExposure | SensorOption::EmitterEnabled => BOOL_RANGE,
        })
    }

    fn open_pipeline(
        &self,
        serial: &str,
        streams: &StreamSet,
    ) -> CoreResult<Arc<dyn SensorPipeline>> {
        let mut inner = self.inner.lock().unwrap();
        let unit = inner
            .devices
            .iter_mut()
            .find(|u| u.desc.serial == serial)
            .ok_or_else(|| {
                CoreError::PipelineStartFailed(format!("no such device: {}", serial))
            })?;
        if unit.refuse_streams {
            return Err(CoreError::PipelineStartFailed(format!(
                "device {} rejected the stream combination",
                serial
            )));
        }

        let mut intrinsics = HashMap::new();
        for kind in [StreamKind::Depth, StreamKind::Color, StreamKind::Infrared] {
            if let Some(config) = streams.get(kind) {
                intrinsics.insert(
                    kind,
                    Intrinsics {
                        width: config.width,
                        height: config.height,
                        fx: config.width as f32,
                        fy: config.width as f32,
                        cx: config.width as f32 / 2.0,
                        cy: config.height as f32 / 2.0,
                    },
                );
            }
        }

        let shared = Arc::new(PipeShared {
            state: Mutex::new(PipeState {
                queue: VecDeque::new(),
                disconnected: false,
                stopped: false,
            }),
            cond: Condvar::new(),
            streams: *streams,
            supported: unit.supported.clone(),
            options_log: Mutex::new(Vec::new()),
            intrinsics,
        });
        unit.pipelines.push(Arc::clone(&shared));
        Ok(shared)
    }
}

struct PipeState {
    queue: VecDeque<Frameset>,
    disconnected: bool,
    stopped: bool,
}

struct PipeShared {
    state: Mutex<PipeState>,
    cond: Condvar,
    streams: StreamSet,
    supported: HashSet<SensorOption>,
    options_log: Mutex<Vec<(SensorOption, f64)>>,
    intrinsics: HashMap<StreamKind, Intrinsics>,
}

impl PipeShared {
    fn deliver(&self, mut frameset: Frameset) {
        if self.streams.depth.is_none() {
            frameset.depth = None;
        }
        frameset.color = frameset
            .color
            .take()
            .filter(|frame| matches_layout(frame, self.streams.color));
        frameset.infrared = frameset
            .infrared
            .take()
            .filter(|frame| matches_layout(frame, self.streams.infrared));
        if frameset.depth.is_none() && frameset.color.is_none() && frameset.infrared.is_none() {
            return;
        }
        let mut state = self.state.lock().unwrap();
        if state.stopped || state.disconnected {
            return;
        }
        state.queue.push_back(frameset);
        self.cond.notify_all();
    }

    fn disconnect(&self) {
        self.state.lock().unwrap().disconnected = true;
        self.cond.notify_all();
    }
}

/// A video frame passes only when its stream is bound and its sample
/// layout matches the negotiated pixel format.
fn matches_layout(frame: &VideoFrame, config: Option<StreamConfig>) -> bool {
    let Some(config) = config else { return false };
    let ok = frame.channels() as usize == config.format.bytes_per_pixel();
    if !ok {
        debug!(?config, "Dropping frame with mismatched sample layout");
    }
    ok
}

impl SensorPipeline for PipeShared {
    fn wait_for_frameset(&self, timeout: Duration) -> Result<Option<Frameset>, FrameWaitError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        loop {
            if state.disconnected {
                return Err(FrameWaitError::Disconnected);
            }
            if state.stopped {
                return Ok(None);
            }
            if let Some(frameset) = state.queue.pop_front() {
                return Ok(Some(frameset));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (guard, _) = self.cond.wait_timeout(state, deadline - now).unwrap();
            state = guard;
        }
    }

    fn supports_option(&self, option: SensorOption) -> bool {
        self.supported.contains(&option)
    }

    fn set_option(&self, option: SensorOption, value: f64) {
        if !self.supported.contains(&option) {
            debug!(?option, "Ignoring unsupported option push");
            return;
        }
        self.options_log.lock().unwrap().push((option, value));
    }

    fn depth_scale(&self) -> f32 {
        MOCK_DEPTH_SCALE
    }

    fn intrinsics(&self, stream: StreamKind) -> Option<Intrinsics> {
        self.intrinsics.get(&stream).copied()
    }

    fn stop(&self) {
        self.state.lock().unwrap().stopped = true;
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::frame::DepthFrame;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn depth_streams() -> StreamSet {
        StreamSet {
            depth: Some(StreamConfig::depth(320, 240, 30)),
            ..Default::default()
        }
    }

    #[test]
    fn plug_fires_handler() {
        let backend = MockBackend::new();
        let added = Arc::new(AtomicUsize::new(0));
        let added_clone = Arc::clone(&added);
        backend.set_connection_handler(Some(Box::new(move |change| {
            added_clone.fetch_add(change.added.len(), Ordering::SeqCst);
        })));
        backend.plug("SN1", "Mock Depth Camera");
        assert_eq!(added.load(Ordering::SeqCst), 1);
        assert_eq!(backend.devices().len(), 1);
    }

    #[test]
    fn inject_delivers_only_bound_streams() {
        let backend = MockBackend::new();
        backend.plug("SN1", "Mock Depth Camera");
        let pipe = backend.open_pipeline("SN1", &depth_streams()).unwrap();

        backend.inject_frameset(
            "SN1",
            Frameset {
                depth: Some(DepthFrame::new(2, 2, vec![1; 4])),
                color: Some(crate::frame::VideoFrame::new(2, 2, 3, vec![0; 12])),
                infrared: None,
            },
        );

        let fs = pipe
            .wait_for_frameset(Duration::from_millis(100))
            .unwrap()
            .unwrap();
        assert!(fs.depth.is_some());
        assert!(fs.color.is_none());
    }

    #[test]
    fn mismatched_sample_layout_is_dropped() {
        let backend = MockBackend::new();
        backend.plug("SN1", "Mock Depth Camera");
        let streams = StreamSet {
            color: Some(StreamConfig::color(2, 2, 30)),
            ..Default::default()
        };
        let pipe = backend.open_pipeline("SN1", &streams).unwrap();

        // Single-channel payload on an RGB-bound stream never arrives.
        backend.inject_frameset(
            "SN1",
            Frameset {
                color: Some(VideoFrame::new(2, 2, 1, vec![0; 4])),
                ..Default::default()
            },
        );
        let result = pipe.wait_for_frameset(Duration::from_millis(10)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn wait_times_out_without_frames() {
        let backend = MockBackend::new();
        backend.plug("SN1", "Mock Depth Camera");
        let pipe = backend.open_pipeline("SN1", &depth_streams()).unwrap();
        let result = pipe.wait_for_frameset(Duration::from_millis(10)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn unplug_fails_in_flight_wait() {
        let backend = Arc::new(MockBackend::new());
        backend.plug("SN1", "Mock Depth Camera");
        let pipe = backend.open_pipeline("SN1", &depth_streams()).unwrap();

        let backend_clone = Arc::clone(&backend);
        let unplugger = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            backend_clone.unplug("SN1");
        });

        let result = pipe.wait_for_frameset(Duration::from_secs(5));
        unplugger.join().unwrap();
        assert!(matches!(result, Err(FrameWaitError::Disconnected)));
    }

    #[test]
    fn unsupported_option_push_is_dropped() {
        let backend = MockBackend::new();
        backend.plug("SN1", "Mock Depth Camera");
        backend.set_supported_options("SN1", &[SensorOption::Exposure]);
        let pipe = backend.open_pipeline("SN1", &depth_streams()).unwrap();

        pipe.set_option(SensorOption::EmitterEnabled, 1.0);
        pipe.set_option(SensorOption::Exposure, 100.0);

        let pushes = backend.pushed_options("SN1");
        assert_eq!(pushes, vec![(SensorOption::Exposure, 100.0)]);
    }

    #[test]
    fn refused_streams_fail_pipeline_open() {
        let backend = MockBackend::new();
        backend.plug("SN1", "Mock Depth Camera");
        backend.refuse_streams("SN1", true);
        let err = backend.open_pipeline("SN1", &depth_streams()).err().unwrap();
        assert!(matches!(err, CoreError::PipelineStartFailed(_)));
    }
}
