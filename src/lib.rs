// SPDX-License-Identifier: GPL-3.0-only

//! Depth camera capture core
//!
//! Tracks depth cameras as they connect and disconnect, runs one
//! background capture thread per started device, and hands the consumer
//! colorized depth, color, infrared, and point cloud snapshots through a
//! non-blocking `update()` cycle.
//!
//! # Architecture
//!
//! - [`registry`]: device discovery, hot-plug tracking, membership events
//! - [`device`]: per-device lifecycle, capture thread, consumer snapshots
//! - [`backend`]: hardware subsystem traits plus the in-process mock
//! - [`filters`]: ordered depth filter chain (decimation through hole filling)
//! - [`pointcloud`]: deprojection of filtered depth into GPU-ready buffers
//! - [`params`]: live-tunable, range-checked parameter bus
//! - [`colorize`]: depth-to-RGB visualization
//! - [`align`]: frameset reprojection into a common viewport
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use depthcam::backend::mock::MockBackend;
//! use depthcam::registry::DeviceRegistry;
//!
//! let backend = Arc::new(MockBackend::new());
//! let mut registry = DeviceRegistry::new(backend);
//! registry.open(true)?;
//!
//! // Render loop: drain frames on every tracked device.
//! registry.update_all();
//! # Ok::<(), depthcam::errors::CoreError>(())
//! ```

pub mod align;
pub mod backend;
pub mod capture_loop;
pub mod colorize;
pub mod config;
pub mod device;
pub mod errors;
pub mod exchange;
pub mod filters;
pub mod frame;
pub mod params;
pub mod pointcloud;
pub mod registry;

// Re-export commonly used types
pub use config::{AlignMode, StreamConfig, StreamKind, StreamSet};
pub use device::{CaptureDevice, Lifecycle};
pub use errors::{CoreError, CoreResult};
pub use frame::{DepthFrame, Frameset, VideoFrame};
pub use params::{Param, ParamValue, ParameterBus};
pub use pointcloud::PointCloud;
pub use registry::{DeviceRegistry, RegistryEvent};
