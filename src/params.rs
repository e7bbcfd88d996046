// SPDX-License-Identifier: GPL-3.0-only

//! Live-tunable parameter bus
//!
//! One bus per device holds every tunable value with its valid range.
//! `set` validates against the range (out-of-range values are rejected,
//! never clamped, so misconfiguration is not masked) and stores the
//! value. While the device is running it also invokes the installed
//! applier, which pushes the value to the matching sensor option or
//! filter stage.
//! The applier checks hardware capability immediately before every push
//! and treats an unsupported option as a silent no-op.
//!
//! Edits are expected on the same thread as `update()`; the bus is
//! internally locked, but cross-thread ordering is the caller's concern.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::backend::OptionRange;
use crate::colorize;
use crate::errors::ParamError;
use crate::filters::{decimation, hole_filling, spatial, temporal};

/// Fallback IR exposure range when the sensor does not report one
const IR_EXPOSURE_FALLBACK: OptionRange = OptionRange {
    min: 1.0,
    max: 165_000.0,
    step: 1.0,
    default: 8_500.0,
};

/// Every tunable value a device exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Param {
    AutoExposure,
    EmitterEnabled,
    IrExposure,
    DepthMin,
    DepthMax,
    DecimationEnabled,
    DecimationMagnitude,
    DisparityTransformEnabled,
    SpatialFilterEnabled,
    SpatialFilterMagnitude,
    SpatialFilterSmoothAlpha,
    SpatialFilterSmoothDelta,
    SpatialFilterHoleFillMode,
    TemporalFilterEnabled,
    TemporalFilterSmoothAlpha,
    TemporalFilterSmoothDelta,
    TemporalFilterPersistency,
    HoleFillingEnabled,
    HoleFillingMode,
    AlignMode,
}

impl Param {
    /// Display name, suitable for a settings surface
    pub fn name(&self) -> &'static str {
        match self {
            Param::AutoExposure => "Auto-exposure",
            Param::EmitterEnabled => "Emitter",
            Param::IrExposure => "IR Exposure",
            Param::DepthMin => "Min Depth",
            Param::DepthMax => "Max Depth",
            Param::DecimationEnabled => "Decimate",
            Param::DecimationMagnitude => "Decimate Magnitude",
            Param::DisparityTransformEnabled => "Disparity Transform",
            Param::SpatialFilterEnabled => "Spatial Filter",
            Param::SpatialFilterMagnitude => "Spatial Magnitude",
            Param::SpatialFilterSmoothAlpha => "Spatial Smooth Alpha",
            Param::SpatialFilterSmoothDelta => "Spatial Smooth Delta",
            Param::SpatialFilterHoleFillMode => "Spatial Hole Filling Mode",
            Param::TemporalFilterEnabled => "Temporal Filter",
            Param::TemporalFilterSmoothAlpha => "Temporal Smooth Alpha",
            Param::TemporalFilterSmoothDelta => "Temporal Smooth Delta",
            Param::TemporalFilterPersistency => "Temporal Persistency Mode",
            Param::HoleFillingEnabled => "Hole Filling",
            Param::HoleFillingMode => "Hole Filling Mode",
            Param::AlignMode => "Align Mode",
        }
    }
}

/// A stored parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// Declared valid range for a numeric parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: ParamValue,
    range: ParamRange,
}

/// Strategy invoked on every stored value change while the device runs
pub type Applier = Arc<dyn Fn(Param, ParamValue) + Send + Sync>;

/// Named, range-checked set of live values for one device
pub struct ParameterBus {
    entries: Mutex<BTreeMap<Param, Entry>>,
    applier: Mutex<Option<Applier>>,
}

impl ParameterBus {
    /// Build the bus with default values. `ir_exposure` is the
    /// sensor-reported exposure range when available.
    pub fn new(ir_exposure: Option<OptionRange>) -> Self {
        let ir = ir_exposure.unwrap_or(IR_EXPOSURE_FALLBACK);

        let mut entries = BTreeMap::new();
        let mut add = |param: Param, value: ParamValue, min: f64, max: f64| {
            entries.insert(
                param,
                Entry {
                    value,
                    range: ParamRange { min, max },
                },
            );
        };

        add(Param::AutoExposure, ParamValue::Bool(true), 0.0, 1.0);
        add(Param::EmitterEnabled, ParamValue::Bool(true), 0.0, 1.0);
        add(
            Param::IrExposure,
            ParamValue::Int(ir.default as i64),
            ir.min,
            ir.max,
        );
        add(
            Param::DepthMin,
            ParamValue::Float(colorize::DEFAULT_MIN_DISTANCE as f64),
            colorize::MIN_DISTANCE_RANGE.0 as f64,
            colorize::MIN_DISTANCE_RANGE.1 as f64,
        );
        add(
            Param::DepthMax,
            ParamValue::Float(colorize::DEFAULT_MAX_DISTANCE as f64),
            colorize::MAX_DISTANCE_RANGE.0 as f64,
            colorize::MAX_DISTANCE_RANGE.1 as f64,
        );
        add(Param::DecimationEnabled, ParamValue::Bool(false), 0.0, 1.0);
        add(
            Param::DecimationMagnitude,
            ParamValue::Int(decimation::MAGNITUDE_DEFAULT),
            decimation::MAGNITUDE_MIN as f64,
            decimation::MAGNITUDE_MAX as f64,
        );
        add(
            Param::DisparityTransformEnabled,
            ParamValue::Bool(false),
            0.0,
            1.0,
        );
        add(Param::SpatialFilterEnabled, ParamValue::Bool(false), 0.0, 1.0);
        add(
            Param::SpatialFilterMagnitude,
            ParamValue::Int(spatial::MAGNITUDE_DEFAULT),
            spatial::MAGNITUDE_MIN as f64,
            spatial::MAGNITUDE_MAX as f64,
        );
        add(
            Param::SpatialFilterSmoothAlpha,
            ParamValue::Float(spatial::SMOOTH_ALPHA_DEFAULT),
            spatial::SMOOTH_ALPHA_MIN,
            spatial::SMOOTH_ALPHA_MAX,
        );
        add(
            Param::SpatialFilterSmoothDelta,
            ParamValue::Int(spatial::SMOOTH_DELTA_DEFAULT),
            spatial::SMOOTH_DELTA_MIN as f64,
            spatial::SMOOTH_DELTA_MAX as f64,
        );
        add(
            Param::SpatialFilterHoleFillMode,
            ParamValue::Int(spatial::HOLE_FILL_DEFAULT),
            spatial::HOLE_FILL_MIN as f64,
            spatial::HOLE_FILL_MAX as f64,
        );
        add(Param::TemporalFilterEnabled, ParamValue::Bool(false), 0.0, 1.0);
        add(
            Param::TemporalFilterSmoothAlpha,
            ParamValue::Float(temporal::SMOOTH_ALPHA_DEFAULT),
            temporal::SMOOTH_ALPHA_MIN,
            temporal::SMOOTH_ALPHA_MAX,
        );
        add(
            Param::TemporalFilterSmoothDelta,
            ParamValue::Int(temporal::SMOOTH_DELTA_DEFAULT),
            temporal::SMOOTH_DELTA_MIN as f64,
            temporal::SMOOTH_DELTA_MAX as f64,
        );
        add(
            Param::TemporalFilterPersistency,
            ParamValue::Int(temporal::PERSISTENCY_DEFAULT),
            temporal::PERSISTENCY_MIN as f64,
            temporal::PERSISTENCY_MAX as f64,
        );
        add(Param::HoleFillingEnabled, ParamValue::Bool(false), 0.0, 1.0);
        add(
            Param::HoleFillingMode,
            ParamValue::Int(hole_filling::MODE_DEFAULT),
            hole_filling::MODE_MIN as f64,
            hole_filling::MODE_MAX as f64,
        );
        add(Param::AlignMode, ParamValue::Int(0), 0.0, 2.0);

        Self {
            entries: Mutex::new(entries),
            applier: Mutex::new(None),
        }
    }

    /// Validate, store, and (while running) push a new value
    pub fn set(&self, param: Param, value: ParamValue) -> Result<(), ParamError> {
        {
            let mut entries = self.entries.lock().unwrap();
            let entry = entries
                .get_mut(&param)
                .expect("every Param variant is seeded at construction");

            let numeric = match (&entry.value, &value) {
                (ParamValue::Bool(_), ParamValue::Bool(_)) => None,
                (ParamValue::Int(_), ParamValue::Int(v)) => Some(*v as f64),
                (ParamValue::Float(_), ParamValue::Float(v)) => Some(*v),
                _ => return Err(ParamError::WrongType { param: param.name() }),
            };

            if let Some(v) = numeric {
                if v < entry.range.min || v > entry.range.max {
                    return Err(ParamError::InvalidParameterValue {
                        param: param.name(),
                        value: v,
                        min: entry.range.min,
                        max: entry.range.max,
                    });
                }
            }

            entry.value = value;
        }

        if let Some(applier) = self.applier.lock().unwrap().clone() {
            applier(param, value);
        }
        Ok(())
    }

    pub fn set_bool(&self, param: Param, value: bool) -> Result<(), ParamError> {
        self.set(param, ParamValue::Bool(value))
    }

    pub fn set_int(&self, param: Param, value: i64) -> Result<(), ParamError> {
        self.set(param, ParamValue::Int(value))
    }

    pub fn set_f64(&self, param: Param, value: f64) -> Result<(), ParamError> {
        self.set(param, ParamValue::Float(value))
    }

    /// Current stored value
    pub fn get(&self, param: Param) -> ParamValue {
        self.entries.lock().unwrap()[&param].value
    }

    /// Declared range
    pub fn range(&self, param: Param) -> ParamRange {
        self.entries.lock().unwrap()[&param].range
    }

    /// Snapshot of all entries, for settings surfaces
    pub fn entries(&self) -> Vec<(Param, ParamValue, ParamRange)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(p, e)| (*p, e.value, e.range))
            .collect()
    }

    /// Install the push strategy; used by the device at `start()`
    pub fn install_applier(&self, applier: Applier) {
        *self.applier.lock().unwrap() = Some(applier);
    }

    /// Remove the push strategy; used by the device at `stop()`
    pub fn clear_applier(&self) {
        *self.applier.lock().unwrap() = None;
    }

    /// Invoke the applier once for every stored value
    ///
    /// Called right after `install_applier` at `start()` so edits made
    /// while stopped reach the fresh pipeline.
    pub fn push_all(&self) {
        let Some(applier) = self.applier.lock().unwrap().clone() else {
            return;
        };
        for (param, value, _) in self.entries() {
            applier(param, value);
        }
    }
}

impl std::fmt::Debug for ParameterBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterBus")
            .field("entries", &self.entries.lock().unwrap().len())
            .field("applier", &self.applier.lock().unwrap().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn defaults_are_seeded() {
        let bus = ParameterBus::new(None);
        assert_eq!(bus.get(Param::AutoExposure), ParamValue::Bool(true));
        assert_eq!(
            bus.get(Param::DecimationMagnitude),
            ParamValue::Int(decimation::MAGNITUDE_DEFAULT)
        );
        assert_eq!(bus.entries().len(), 20);
    }

    #[test]
    fn sensor_range_overrides_fallback() {
        let range = OptionRange {
            min: 10.0,
            max: 500.0,
            step: 1.0,
            default: 100.0,
        };
        let bus = ParameterBus::new(Some(range));
        assert_eq!(bus.get(Param::IrExposure), ParamValue::Int(100));
        assert_eq!(bus.range(Param::IrExposure).max, 500.0);
    }

    #[test]
    fn out_of_range_is_rejected_and_not_stored() {
        let range = OptionRange {
            min: 10.0,
            max: 500.0,
            step: 1.0,
            default: 100.0,
        };
        let bus = ParameterBus::new(Some(range));
        let err = bus.set_int(Param::IrExposure, 501).unwrap_err();
        assert!(matches!(err, ParamError::InvalidParameterValue { .. }));
        assert_eq!(bus.get(Param::IrExposure), ParamValue::Int(100));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let bus = ParameterBus::new(None);
        let err = bus.set_f64(Param::AutoExposure, 1.0).unwrap_err();
        assert!(matches!(err, ParamError::WrongType { .. }));
    }

    #[test]
    fn applier_fires_only_when_installed() {
        let bus = ParameterBus::new(None);
        let count = Arc::new(AtomicUsize::new(0));

        bus.set_bool(Param::EmitterEnabled, false).unwrap();

        let count_clone = Arc::clone(&count);
        bus.install_applier(Arc::new(move |_, _| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        bus.set_bool(Param::EmitterEnabled, true).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        bus.clear_applier();
        bus.set_bool(Param::EmitterEnabled, false).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn push_all_covers_every_entry() {
        let bus = ParameterBus::new(None);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        bus.install_applier(Arc::new(move |_, _| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        bus.push_all();
        assert_eq!(count.load(Ordering::SeqCst), bus.entries().len());
    }

    #[test]
    fn rejected_edit_does_not_fire_applier() {
        let bus = ParameterBus::new(None);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        bus.install_applier(Arc::new(move |_, _| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(bus.set_int(Param::HoleFillingMode, 99).is_err());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
