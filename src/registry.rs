// SPDX-License-Identifier: GPL-3.0-only

//! Device discovery and hot-plug tracking
//!
//! The [`DeviceRegistry`] owns the set of tracked devices, keyed by
//! serial number. `open()` connects to the hardware subsystem, adopts
//! every unit already present, and installs a hot-plug handler so units
//! that appear or disappear later are adopted or retired the same way.
//! Subscribers get one event per membership change; events are
//! dispatched after the device map lock is released, so a listener may
//! call back into the registry.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info, warn};

use crate::backend::{ConnectionChange, DepthBackend, DeviceDesc};
use crate::config::{DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::device::CaptureDevice;
use crate::errors::{CoreError, CoreResult};

/// Product name of virtual units the subsystem reports alongside real
/// depth cameras; never tracked.
pub const PLATFORM_CAMERA_NAME: &str = "Platform Camera";

/// One registry membership change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A unit was adopted; the payload is its serial number
    DeviceAdded(String),
    /// A tracked unit went away
    DeviceRemoved(String),
}

/// Callback invoked for every membership change
///
/// Runs on whichever thread caused the change: the caller's thread
/// during `open()`, the subsystem's notification thread for hot-plug.
pub type EventListener = Box<dyn Fn(&RegistryEvent) + Send + Sync>;

struct Shared {
    backend: Arc<dyn DepthBackend>,
    devices: Mutex<BTreeMap<String, Arc<Mutex<CaptureDevice>>>>,
    listeners: Mutex<Vec<Arc<dyn Fn(&RegistryEvent) + Send + Sync>>>,
    auto_start: AtomicBool,
}

impl Shared {
    /// Adopt one unit: filter virtual entries, dedupe by serial,
    /// optionally start, then announce.
    fn add_device(&self, desc: DeviceDesc) {
        if desc.name == PLATFORM_CAMERA_NAME {
            debug!(serial = %desc.serial, "Skipping platform camera");
            return;
        }

        let serial = desc.serial.clone();
        let device = {
            let mut devices = self.devices.lock().unwrap();
            if devices.contains_key(&serial) {
                debug!(serial = %serial, "Device already tracked");
                return;
            }
            let device = Arc::new(Mutex::new(CaptureDevice::new(
                Arc::clone(&self.backend),
                desc,
            )));
            devices.insert(serial.clone(), Arc::clone(&device));
            device
        };

        info!(serial = %serial, "Device added");
        if self.auto_start.load(Ordering::SeqCst) {
            let mut device = device.lock().unwrap();
            // Minimal default session: depth (on by default) plus color.
            device.enable_color(DEFAULT_WIDTH, DEFAULT_HEIGHT, DEFAULT_FPS);
            if let Err(err) = device.start() {
                warn!(serial = %serial, error = %err, "Auto-start failed");
            }
        }
        self.dispatch(&RegistryEvent::DeviceAdded(serial));
    }

    /// Retire one unit: drop it from the map, stop its capture, announce.
    fn remove_device(&self, serial: &str) {
        let removed = self.devices.lock().unwrap().remove(serial);
        let Some(device) = removed else {
            return;
        };

        info!(serial = %serial, "Device removed");
        device.lock().unwrap().stop();
        self.dispatch(&RegistryEvent::DeviceRemoved(serial.to_string()));
    }

    fn handle_change(&self, change: ConnectionChange) {
        for desc in change.added {
            self.add_device(desc);
        }
        for serial in change.removed {
            self.remove_device(&serial);
        }
    }

    fn dispatch(&self, event: &RegistryEvent) {
        // Snapshot first: a listener may call back into the registry,
        // including `subscribe`, without holding the listeners lock.
        let listeners: Vec<_> = self.listeners.lock().unwrap().iter().cloned().collect();
        for listener in listeners {
            listener(event);
        }
    }
}

/// Tracked set of depth cameras, kept current with the hardware
pub struct DeviceRegistry {
    shared: Arc<Shared>,
    opened: bool,
}

impl DeviceRegistry {
    pub fn new(backend: Arc<dyn DepthBackend>) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                devices: Mutex::new(BTreeMap::new()),
                listeners: Mutex::new(Vec::new()),
                auto_start: AtomicBool::new(false),
            }),
            opened: false,
        }
    }

    /// Register a membership listener. Listeners installed before
    /// `open()` also see the initial enumeration.
    pub fn subscribe(&self, listener: EventListener) {
        self.shared.listeners.lock().unwrap().push(Arc::from(listener));
    }

    /// Connect to the subsystem, adopt present units, and begin
    /// hot-plug tracking
    ///
    /// With `auto_start`, every adopted unit (present or plugged later)
    /// is started with its current stream configuration; a unit whose
    /// start fails stays tracked but Stopped.
    pub fn open(&mut self, auto_start: bool) -> CoreResult<()> {
        self.shared.backend.connect()?;
        self.shared.auto_start.store(auto_start, Ordering::SeqCst);

        // Weak, or the backend-held handler would keep the registry alive.
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        self.shared
            .backend
            .set_connection_handler(Some(Box::new(move |change| {
                if let Some(shared) = weak.upgrade() {
                    shared.handle_change(change);
                }
            })));

        for desc in self.shared.backend.devices() {
            self.shared.add_device(desc);
        }

        self.opened = true;
        info!(devices = self.len(), "Registry opened");
        Ok(())
    }

    /// Stop tracking: uninstall the hot-plug handler and stop every
    /// device. No events are dispatched for this orderly teardown.
    pub fn close(&mut self) {
        if !self.opened {
            return;
        }
        self.shared.backend.set_connection_handler(None);

        let devices: Vec<_> = {
            let mut map = self.shared.devices.lock().unwrap();
            std::mem::take(&mut *map).into_values().collect()
        };
        for device in devices {
            device.lock().unwrap().stop();
        }
        self.opened = false;
        info!("Registry closed");
    }

    /// Serial numbers of all tracked devices, sorted
    pub fn serials(&self) -> Vec<String> {
        self.shared.devices.lock().unwrap().keys().cloned().collect()
    }

    /// Handle to one tracked device
    pub fn get(&self, serial: &str) -> Option<Arc<Mutex<CaptureDevice>>> {
        self.shared.devices.lock().unwrap().get(serial).cloned()
    }

    /// Like [`get`](Self::get), but an absent serial is an error
    pub fn require(&self, serial: &str) -> CoreResult<Arc<Mutex<CaptureDevice>>> {
        self.get(serial)
            .ok_or_else(|| CoreError::DeviceNotFound(serial.to_string()))
    }

    pub fn len(&self) -> usize {
        self.shared.devices.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain pending frames on every tracked device; call once per
    /// consumer cycle
    pub fn update_all(&self) {
        let devices: Vec<_> = self
            .shared
            .devices
            .lock()
            .unwrap()
            .values()
            .cloned()
            .collect();
        for device in devices {
            device.lock().unwrap().update();
        }
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.serials())
            .field("opened", &self.opened)
            .finish()
    }
}
