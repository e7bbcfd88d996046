// SPDX-License-Identifier: GPL-3.0-only

//! Hardware subsystem abstraction
//!
//! The capture core never talks to sensor hardware directly; it goes
//! through the [`DepthBackend`] trait for discovery and hot-plug
//! notifications and the [`SensorPipeline`] trait for a bound stream
//! session. The [`mock`] backend implements both in-process for tests
//! and offline development.

pub mod mock;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{StreamKind, StreamSet};
use crate::errors::{CoreResult, FrameWaitError};
use crate::frame::Frameset;

/// Identity of one physical unit as reported by the subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDesc {
    /// Stable unique key for the physical unit
    pub serial: String,
    /// Human-readable product name, informational only
    pub name: String,
}

/// Valid range reported by a sensor for one option
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
}

/// Live-tunable sensor options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorOption {
    /// Auto-exposure toggle (0.0 = off, 1.0 = on)
    AutoExposure,
    /// IR emitter toggle (0.0 = off, 1.0 = on)
    EmitterEnabled,
    /// Manual IR exposure, sensor-defined units
    Exposure,
}

/// Pinhole camera model for one stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub width: u32,
    pub height: u32,
    /// Focal length in pixels
    pub fx: f32,
    pub fy: f32,
    /// Principal point in pixels
    pub cx: f32,
    pub cy: f32,
}

impl Intrinsics {
    /// Rescale the model to a different image size
    ///
    /// Needed when a filter (decimation) changes the depth frame shape
    /// after the pipeline reported intrinsics for the negotiated shape.
    pub fn scaled_to(&self, width: u32, height: u32) -> Intrinsics {
        let sx = width as f32 / self.width as f32;
        let sy = height as f32 / self.height as f32;
        Intrinsics {
            width,
            height,
            fx: self.fx * sx,
            fy: self.fy * sy,
            cx: self.cx * sx,
            cy: self.cy * sy,
        }
    }
}

/// One connectivity change delivered by the subsystem's own thread
#[derive(Debug, Clone, Default)]
pub struct ConnectionChange {
    /// Newly connected units
    pub added: Vec<DeviceDesc>,
    /// Serial numbers of units that went away
    pub removed: Vec<String>,
}

/// Callback invoked on the hardware subsystem's thread for hot-plug events
pub type ConnectionHandler = Box<dyn Fn(ConnectionChange) + Send + Sync>;

/// Connection to the hardware subsystem: discovery plus pipeline binding
pub trait DepthBackend: Send + Sync {
    /// Establish the subsystem connection.
    /// Fails with `CoreError::HardwareUnavailable` when the subsystem
    /// cannot be initialized; retrying later is valid.
    fn connect(&self) -> CoreResult<()>;

    /// Enumerate currently connected units
    fn devices(&self) -> Vec<DeviceDesc>;

    /// Install (or clear) the hot-plug notification handler
    fn set_connection_handler(&self, handler: Option<ConnectionHandler>);

    /// Sensor-reported range for an option, queried without a running
    /// pipeline. `None` when the unit does not expose the option.
    fn option_range(&self, serial: &str, option: SensorOption) -> Option<OptionRange>;

    /// Bind the requested streams on a unit and start frameset delivery.
    /// Fails with `CoreError::PipelineStartFailed` when the unit rejects
    /// the stream combination.
    fn open_pipeline(&self, serial: &str, streams: &StreamSet) -> CoreResult<Arc<dyn SensorPipeline>>;
}

/// One bound, streaming pipeline session
///
/// Shared between the device's capture thread (frameset waits) and the
/// consumer thread (option pushes), so implementations must synchronize
/// internally.
pub trait SensorPipeline: Send + Sync {
    /// Block until the next frameset arrives, bounded by `timeout`.
    /// `Ok(None)` means the timeout elapsed (not a failure). `Err` means
    /// streaming is over and the capture loop must exit.
    fn wait_for_frameset(&self, timeout: Duration) -> Result<Option<Frameset>, FrameWaitError>;

    /// Whether the active sensor supports an option in its current mode.
    /// Checked immediately before every push.
    fn supports_option(&self, option: SensorOption) -> bool;

    /// Push an option value to the sensor. Unsupported pushes are a
    /// silent no-op by contract; call `supports_option` first.
    fn set_option(&self, option: SensorOption, value: f64);

    /// Meters per raw depth unit
    fn depth_scale(&self) -> f32;

    /// Pinhole model for a bound stream, `None` if the stream is not bound
    fn intrinsics(&self, stream: StreamKind) -> Option<Intrinsics>;

    /// Release the binding and wake any in-flight `wait_for_frameset`
    fn stop(&self);
}
