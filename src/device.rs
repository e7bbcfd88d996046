// SPDX-License-Identifier: GPL-3.0-only

//! Per-device capture lifecycle
//!
//! A [`CaptureDevice`] owns everything tied to one physical unit: its
//! stream configuration, the background capture thread, the depth filter
//! chain, point cloud reconstruction, the parameter bus, and the
//! single-slot exchanges the consumer drains through [`CaptureDevice::update`].
//!
//! Frames flow capture-thread-side up to the exchanges (align, filter,
//! reconstruct) and consumer-side from the exchanges (colorize, store).
//! `update()` and the accessors are meant to be called from one consumer
//! thread, typically a render loop.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::align::align_frameset;
use crate::backend::{DepthBackend, DeviceDesc, Intrinsics, SensorOption, SensorPipeline};
use crate::capture_loop::CaptureLoop;
use crate::colorize::Colorizer;
use crate::config::{
    AlignMode, StreamConfig, StreamSet, DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_WIDTH,
};
use crate::errors::{CoreError, CoreResult};
use crate::exchange::FrameExchange;
use crate::filters::FilterChain;
use crate::frame::{DepthFrame, VideoFrame};
use crate::params::{Applier, Param, ParamValue, ParameterBus};
use crate::pointcloud::{PointCloud, PointCloudReconstructor};

/// Upper bound on one frameset wait, keeps stop latency bounded
const WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Fallback meters-per-unit before the first pipeline reports its scale
const DEFAULT_DEPTH_SCALE: f32 = 0.001;

/// Where the device is in its capture lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Single-slot handoff points between the capture thread and the consumer
#[derive(Default)]
struct Exchanges {
    depth: FrameExchange<DepthFrame>,
    color: FrameExchange<VideoFrame>,
    infrared: FrameExchange<VideoFrame>,
    points: FrameExchange<PointCloud>,
}

/// One tracked camera: configuration, capture thread, and latest frames
pub struct CaptureDevice {
    desc: DeviceDesc,
    backend: Arc<dyn DepthBackend>,

    /// Streams bound at the next `start()`
    streams: StreamSet,
    points_enabled: bool,
    /// Live copy of `points_enabled` read by the capture thread
    points_live: Arc<AtomicBool>,
    /// Live alignment mode as an `AlignMode` code
    align: Arc<AtomicU8>,

    params: Arc<ParameterBus>,
    filters: Arc<Mutex<FilterChain>>,
    colorizer: Arc<Mutex<Colorizer>>,
    exchanges: Arc<Exchanges>,

    capture: Option<CaptureLoop>,
    lifecycle: Lifecycle,
    depth_scale: f32,

    // Consumer-side snapshots, refreshed by `update()`
    raw_depth: Option<DepthFrame>,
    depth_rgb: Option<VideoFrame>,
    color: Option<VideoFrame>,
    infrared: Option<VideoFrame>,
    points: PointCloud,
}

impl CaptureDevice {
    /// Track a unit. Depth streaming is enabled by default; call the
    /// `enable_*`/`disable_*` methods before `start()` to change the set.
    pub fn new(backend: Arc<dyn DepthBackend>, desc: DeviceDesc) -> Self {
        let exposure_range = backend.option_range(&desc.serial, SensorOption::Exposure);
        let params = Arc::new(ParameterBus::new(exposure_range));

        Self {
            desc,
            backend,
            streams: StreamSet {
                depth: Some(StreamConfig::depth(DEFAULT_WIDTH, DEFAULT_HEIGHT, DEFAULT_FPS)),
                ..Default::default()
            },
            points_enabled: false,
            points_live: Arc::new(AtomicBool::new(false)),
            align: Arc::new(AtomicU8::new(AlignMode::None.code())),
            params,
            filters: Arc::new(Mutex::new(FilterChain::default())),
            colorizer: Arc::new(Mutex::new(Colorizer::default())),
            exchanges: Arc::new(Exchanges::default()),
            capture: None,
            lifecycle: Lifecycle::Stopped,
            depth_scale: DEFAULT_DEPTH_SCALE,
            raw_depth: None,
            depth_rgb: None,
            color: None,
            infrared: None,
            points: PointCloud::default(),
        }
    }

    pub fn serial(&self) -> &str {
        &self.desc.serial
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn enable_depth(&mut self, width: u32, height: u32, fps: u32) {
        self.streams.depth = Some(StreamConfig::depth(width, height, fps));
    }

    pub fn disable_depth(&mut self) {
        self.streams.depth = None;
    }

    pub fn enable_color(&mut self, width: u32, height: u32, fps: u32) {
        self.streams.color = Some(StreamConfig::color(width, height, fps));
    }

    pub fn disable_color(&mut self) {
        self.streams.color = None;
    }

    pub fn enable_infrared(&mut self, width: u32, height: u32, fps: u32) {
        self.streams.infrared = Some(StreamConfig::infrared(width, height, fps));
    }

    pub fn disable_infrared(&mut self) {
        self.streams.infrared = None;
    }

    /// Enable point cloud reconstruction; implies depth streaming
    pub fn enable_points(&mut self) {
        if self.streams.depth.is_none() {
            self.streams.depth = Some(StreamConfig::depth(
                DEFAULT_WIDTH,
                DEFAULT_HEIGHT,
                DEFAULT_FPS,
            ));
        }
        self.points_enabled = true;
        self.points_live.store(true, Ordering::SeqCst);
    }

    /// Stop reconstructing and drop the stored cloud
    pub fn disable_points(&mut self) {
        self.points_enabled = false;
        self.points_live.store(false, Ordering::SeqCst);
        self.points = PointCloud::default();
        self.exchanges.points.clear();
    }

    pub fn streams(&self) -> &StreamSet {
        &self.streams
    }

    pub fn params(&self) -> &Arc<ParameterBus> {
        &self.params
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match &self.capture {
            None => self.lifecycle,
            Some(capture) if capture.is_alive() => Lifecycle::Running,
            // The capture thread ended on its own (disconnect); the
            // session is over even though `stop()` has not run yet.
            Some(_) => Lifecycle::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle() == Lifecycle::Running
    }

    /// Bind the configured streams and start the capture thread
    ///
    /// A running device restarts: the old session is stopped first.
    /// On failure the device is left Stopped with its configuration
    /// intact, so the caller can adjust and retry.
    pub fn start(&mut self) -> CoreResult<()> {
        if self.capture.is_some() {
            debug!(serial = %self.desc.serial, "Restarting device");
            self.stop();
        }
        if self.streams.is_empty() {
            return Err(CoreError::PipelineStartFailed(
                "no streams enabled".to_string(),
            ));
        }

        self.lifecycle = Lifecycle::Starting;
        info!(serial = %self.desc.serial, name = %self.desc.name, "Starting capture");

        let pipeline = match self.backend.open_pipeline(&self.desc.serial, &self.streams) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                warn!(serial = %self.desc.serial, error = %err, "Pipeline start failed");
                self.lifecycle = Lifecycle::Stopped;
                return Err(err);
            }
        };

        self.depth_scale = pipeline.depth_scale();
        self.filters.lock().unwrap().reset();

        let reconstructor = pipeline
            .intrinsics(crate::config::StreamKind::Depth)
            .map(|intr| PointCloudReconstructor::new(intr, self.depth_scale));
        let color_intrinsics = pipeline.intrinsics(crate::config::StreamKind::Color);
        let infrared_intrinsics = pipeline.intrinsics(crate::config::StreamKind::Infrared);

        self.params.install_applier(build_applier(
            Arc::clone(&pipeline),
            Arc::clone(&self.filters),
            Arc::clone(&self.colorizer),
            Arc::clone(&self.align),
        ));
        // Edits made while stopped reach the fresh pipeline here.
        self.params.push_all();

        let cycle = {
            let pipeline = Arc::clone(&pipeline);
            let filters = Arc::clone(&self.filters);
            let align = Arc::clone(&self.align);
            let points_live = Arc::clone(&self.points_live);
            let exchanges = Arc::clone(&self.exchanges);
            let serial = self.desc.serial.clone();

            move || {
                let mut frameset = match pipeline.wait_for_frameset(WAIT_TIMEOUT) {
                    Ok(Some(frameset)) => frameset,
                    Ok(None) => return ControlFlow::Continue(()),
                    Err(err) => {
                        warn!(serial = %serial, error = %err, "Streaming ended");
                        return ControlFlow::Break(());
                    }
                };

                let mode = AlignMode::from_code(align.load(Ordering::SeqCst));
                if mode != AlignMode::None {
                    align_frameset(&mut frameset, mode);
                }

                if let Some(depth) = frameset.depth.take() {
                    let filtered = filters.lock().unwrap().process(depth);
                    if points_live.load(Ordering::SeqCst) {
                        if let Some(reconstructor) = &reconstructor {
                            let texture = texture_intrinsics(
                                mode,
                                color_intrinsics.as_ref(),
                                infrared_intrinsics.as_ref(),
                            );
                            exchanges
                                .points
                                .publish(reconstructor.reconstruct(&filtered, texture));
                        }
                    }
                    exchanges.depth.publish(filtered);
                }
                if let Some(color) = frameset.color.take() {
                    exchanges.color.publish(color);
                }
                if let Some(infrared) = frameset.infrared.take() {
                    exchanges.infrared.publish(infrared);
                }
                ControlFlow::Continue(())
            }
        };

        let capture = match CaptureLoop::spawn(&self.desc.serial, Arc::clone(&pipeline), cycle) {
            Ok(capture) => capture,
            Err(err) => {
                warn!(serial = %self.desc.serial, error = %err, "Capture thread spawn failed");
                self.params.clear_applier();
                pipeline.stop();
                self.lifecycle = Lifecycle::Stopped;
                return Err(CoreError::PipelineStartFailed(format!(
                    "capture thread: {err}"
                )));
            }
        };

        self.capture = Some(capture);
        self.lifecycle = Lifecycle::Running;
        Ok(())
    }

    /// Stop the capture thread and release the pipeline. Idempotent;
    /// returns only after the thread has exited.
    pub fn stop(&mut self) {
        let Some(mut capture) = self.capture.take() else {
            self.lifecycle = Lifecycle::Stopped;
            return;
        };

        self.lifecycle = Lifecycle::Stopping;
        info!(serial = %self.desc.serial, "Stopping capture");

        self.params.clear_applier();
        capture.shutdown();

        self.lifecycle = Lifecycle::Stopped;
    }

    /// Drain the exchanges into the consumer-side snapshots
    ///
    /// Cheap when no new frame arrived. Colorization happens here, on
    /// the consumer thread, so the capture thread never pays for it.
    pub fn update(&mut self) {
        if let Some(depth) = self.exchanges.depth.try_take() {
            self.depth_rgb = Some(
                self.colorizer
                    .lock()
                    .unwrap()
                    .colorize(&depth, self.depth_scale),
            );
            self.raw_depth = Some(depth);
        }
        if let Some(color) = self.exchanges.color.try_take() {
            self.color = Some(color);
        }
        if let Some(infrared) = self.exchanges.infrared.try_take() {
            self.infrared = Some(infrared);
        }
        if self.points_enabled {
            if let Some(points) = self.exchanges.points.try_take() {
                self.points = points;
            }
        }
    }

    /// Metric distance at a depth pixel, meters; 0.0 when unknown
    pub fn get_distance(&self, x: u32, y: u32) -> f32 {
        self.raw_depth
            .as_ref()
            .and_then(|frame| frame.get(x, y))
            .map(|d| d as f32 * self.depth_scale)
            .unwrap_or(0.0)
    }

    /// Latest filtered raw depth frame seen by `update()`
    pub fn raw_depth_frame(&self) -> Option<&DepthFrame> {
        self.raw_depth.as_ref()
    }

    /// Latest colorized depth frame
    pub fn depth_pixels(&self) -> Option<&VideoFrame> {
        self.depth_rgb.as_ref()
    }

    pub fn color_pixels(&self) -> Option<&VideoFrame> {
        self.color.as_ref()
    }

    pub fn infrared_pixels(&self) -> Option<&VideoFrame> {
        self.infrared.as_ref()
    }

    pub fn points(&self) -> &PointCloud {
        &self.points
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn align_mode(&self) -> AlignMode {
        AlignMode::from_code(self.align.load(Ordering::SeqCst))
    }

    /// Change the alignment viewport, effective from the next frameset
    pub fn set_align_mode(&self, mode: AlignMode) {
        self.align.store(mode.code(), Ordering::SeqCst);
        // Mode codes always sit inside the bus range.
        let _ = self.params.set_int(Param::AlignMode, i64::from(mode.code()));
    }
}

impl Drop for CaptureDevice {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CaptureDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureDevice")
            .field("serial", &self.desc.serial)
            .field("name", &self.desc.name)
            .field("lifecycle", &self.lifecycle())
            .field("streams", &self.streams)
            .finish()
    }
}

/// Which stream the point cloud samples its texture coordinates from
fn texture_intrinsics<'a>(
    mode: AlignMode,
    color: Option<&'a Intrinsics>,
    infrared: Option<&'a Intrinsics>,
) -> Option<&'a Intrinsics> {
    match mode {
        // Everything already sits in the depth viewport; the depth
        // frame's own coordinates are the texture coordinates.
        AlignMode::Depth => None,
        _ => color.or(infrared),
    }
}

/// Routes stored parameter values to their live targets
fn build_applier(
    pipeline: Arc<dyn SensorPipeline>,
    filters: Arc<Mutex<FilterChain>>,
    colorizer: Arc<Mutex<Colorizer>>,
    align: Arc<AtomicU8>,
) -> Applier {
    Arc::new(move |param: Param, value: ParamValue| {
        let push = |option: SensorOption, raw: f64| {
            // Support can change between sensor modes; check every time.
            if pipeline.supports_option(option) {
                pipeline.set_option(option, raw);
            } else {
                debug!(?option, "Sensor does not support option, skipping push");
            }
        };

        match param {
            Param::AutoExposure => {
                if let Some(v) = value.as_bool() {
                    push(SensorOption::AutoExposure, if v { 1.0 } else { 0.0 });
                }
            }
            Param::EmitterEnabled => {
                if let Some(v) = value.as_bool() {
                    push(SensorOption::EmitterEnabled, if v { 1.0 } else { 0.0 });
                }
            }
            Param::IrExposure => {
                if let Some(v) = value.as_i64() {
                    push(SensorOption::Exposure, v as f64);
                }
            }
            Param::DepthMin => {
                if let Some(v) = value.as_f64() {
                    colorizer.lock().unwrap().min_depth_m = v as f32;
                }
            }
            Param::DepthMax => {
                if let Some(v) = value.as_f64() {
                    colorizer.lock().unwrap().max_depth_m = v as f32;
                }
            }
            Param::DecimationEnabled => {
                if let Some(v) = value.as_bool() {
                    filters.lock().unwrap().decimation.enabled = v;
                }
            }
            Param::DecimationMagnitude => {
                if let Some(v) = value.as_i64() {
                    filters.lock().unwrap().decimation.magnitude = v as u32;
                }
            }
            Param::DisparityTransformEnabled => {
                if let Some(v) = value.as_bool() {
                    filters.lock().unwrap().disparity.enabled = v;
                }
            }
            Param::SpatialFilterEnabled => {
                if let Some(v) = value.as_bool() {
                    filters.lock().unwrap().spatial.enabled = v;
                }
            }
            Param::SpatialFilterMagnitude => {
                if let Some(v) = value.as_i64() {
                    filters.lock().unwrap().spatial.magnitude = v as u32;
                }
            }
            Param::SpatialFilterSmoothAlpha => {
                if let Some(v) = value.as_f64() {
                    filters.lock().unwrap().spatial.smooth_alpha = v as f32;
                }
            }
            Param::SpatialFilterSmoothDelta => {
                if let Some(v) = value.as_i64() {
                    filters.lock().unwrap().spatial.smooth_delta = v as u16;
                }
            }
            Param::SpatialFilterHoleFillMode => {
                if let Some(v) = value.as_i64() {
                    filters.lock().unwrap().spatial.hole_fill_mode = v as u32;
                }
            }
            Param::TemporalFilterEnabled => {
                if let Some(v) = value.as_bool() {
                    filters.lock().unwrap().temporal.enabled = v;
                }
            }
            Param::TemporalFilterSmoothAlpha => {
                if let Some(v) = value.as_f64() {
                    filters.lock().unwrap().temporal.smooth_alpha = v as f32;
                }
            }
            Param::TemporalFilterSmoothDelta => {
                if let Some(v) = value.as_i64() {
                    filters.lock().unwrap().temporal.smooth_delta = v as u16;
                }
            }
            Param::TemporalFilterPersistency => {
                if let Some(v) = value.as_i64() {
                    filters.lock().unwrap().temporal.persistency = v as u32;
                }
            }
            Param::HoleFillingEnabled => {
                if let Some(v) = value.as_bool() {
                    filters.lock().unwrap().hole_filling.enabled = v;
                }
            }
            Param::HoleFillingMode => {
                if let Some(v) = value.as_i64() {
                    filters.lock().unwrap().hole_filling.mode = v as u32;
                }
            }
            Param::AlignMode => {
                if let Some(v) = value.as_i64() {
                    align.store(v as u8, Ordering::SeqCst);
                }
            }
        }
    })
}
