// SPDX-License-Identifier: GPL-3.0-only

//! Registry discovery, hot-plug, and membership event behavior

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use depthcam::backend::mock::MockBackend;
use depthcam::backend::DepthBackend;
use depthcam::registry::{DeviceRegistry, RegistryEvent, PLATFORM_CAMERA_NAME};
use depthcam::{DepthFrame, Frameset, Lifecycle};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records every membership event a registry dispatches
fn record_events(registry: &DeviceRegistry) -> Arc<Mutex<Vec<RegistryEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    registry.subscribe(Box::new(move |event| {
        sink.lock().unwrap().push(event.clone());
    }));
    events
}

#[test]
fn open_announces_present_devices_stopped() {
    init_tracing();
    let backend = Arc::new(MockBackend::new());
    backend.plug("SN123", "Mock Depth Camera");

    let mut registry = DeviceRegistry::new(Arc::clone(&backend) as Arc<dyn DepthBackend>);
    let events = record_events(&registry);
    registry.open(false).unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![RegistryEvent::DeviceAdded("SN123".to_string())]
    );
    let device = registry.require("SN123").unwrap();
    assert_eq!(device.lock().unwrap().lifecycle(), Lifecycle::Stopped);
}

#[test]
fn auto_start_runs_adopted_devices() {
    init_tracing();
    let backend = Arc::new(MockBackend::new());
    backend.plug("SN123", "Mock Depth Camera");

    let mut registry = DeviceRegistry::new(Arc::clone(&backend) as Arc<dyn DepthBackend>);
    registry.open(true).unwrap();

    let device = registry.require("SN123").unwrap();
    assert_eq!(device.lock().unwrap().lifecycle(), Lifecycle::Running);
}

#[test]
fn hot_plugged_device_is_adopted() {
    init_tracing();
    let backend = Arc::new(MockBackend::new());
    let mut registry = DeviceRegistry::new(Arc::clone(&backend) as Arc<dyn DepthBackend>);
    let events = record_events(&registry);
    registry.open(true).unwrap();
    assert!(registry.is_empty());

    backend.plug("SN456", "Mock Depth Camera");

    assert_eq!(registry.serials(), vec!["SN456"]);
    assert_eq!(
        *events.lock().unwrap(),
        vec![RegistryEvent::DeviceAdded("SN456".to_string())]
    );
    let device = registry.require("SN456").unwrap();
    assert_eq!(device.lock().unwrap().lifecycle(), Lifecycle::Running);
}

#[test]
fn unplug_while_running_retires_the_device_once() {
    init_tracing();
    let backend = Arc::new(MockBackend::new());
    backend.plug("SN123", "Mock Depth Camera");

    let mut registry = DeviceRegistry::new(Arc::clone(&backend) as Arc<dyn DepthBackend>);
    let events = record_events(&registry);
    registry.open(true).unwrap();
    let device = registry.require("SN123").unwrap();

    backend.unplug("SN123");

    assert!(registry.is_empty());
    let events = events.lock().unwrap();
    let removals = events
        .iter()
        .filter(|e| matches!(e, RegistryEvent::DeviceRemoved(_)))
        .count();
    assert_eq!(removals, 1);

    // The retained handle is stopped, its capture thread joined.
    let deadline = Instant::now() + Duration::from_secs(2);
    while device.lock().unwrap().is_running() {
        assert!(Instant::now() < deadline, "capture thread did not exit");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn duplicate_serial_is_adopted_once() {
    init_tracing();
    let backend = Arc::new(MockBackend::new());
    let mut registry = DeviceRegistry::new(Arc::clone(&backend) as Arc<dyn DepthBackend>);
    let events = record_events(&registry);
    registry.open(false).unwrap();

    backend.plug("SN123", "Mock Depth Camera");
    backend.plug("SN123", "Mock Depth Camera");

    assert_eq!(registry.len(), 1);
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn platform_cameras_are_never_tracked() {
    init_tracing();
    let backend = Arc::new(MockBackend::new());
    backend.plug("SN-REAL", "Mock Depth Camera");

    let mut registry = DeviceRegistry::new(Arc::clone(&backend) as Arc<dyn DepthBackend>);
    let events = record_events(&registry);
    registry.open(false).unwrap();

    backend.plug("SN-VIRT", PLATFORM_CAMERA_NAME);

    assert_eq!(registry.serials(), vec!["SN-REAL"]);
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn update_all_drains_every_device() {
    init_tracing();
    let backend = Arc::new(MockBackend::new());
    backend.plug("SN1", "Mock Depth Camera");
    backend.plug("SN2", "Mock Depth Camera");

    let mut registry = DeviceRegistry::new(Arc::clone(&backend) as Arc<dyn DepthBackend>);
    registry.open(true).unwrap();

    for serial in ["SN1", "SN2"] {
        backend.inject_frameset(
            serial,
            Frameset {
                depth: Some(DepthFrame::new(640, 360, vec![2000; 640 * 360])),
                ..Default::default()
            },
        );
    }

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        registry.update_all();
        let ready = ["SN1", "SN2"].iter().all(|s| {
            registry
                .require(s)
                .unwrap()
                .lock()
                .unwrap()
                .raw_depth_frame()
                .is_some()
        });
        if ready {
            break;
        }
        assert!(Instant::now() < deadline, "frames did not arrive in time");
        std::thread::sleep(Duration::from_millis(5));
    }

    let device = registry.require("SN2").unwrap();
    let guard = device.lock().unwrap();
    assert!((guard.get_distance(320, 180) - 2.0).abs() < 1e-6);
}

#[test]
fn listener_can_call_back_into_the_registry() {
    init_tracing();
    let backend = Arc::new(MockBackend::new());
    let mut registry = DeviceRegistry::new(Arc::clone(&backend) as Arc<dyn DepthBackend>);
    registry.open(false).unwrap();
    let registry = Arc::new(registry);

    let late_events = Arc::new(Mutex::new(Vec::new()));
    let handle = Arc::clone(&registry);
    let sink = Arc::clone(&late_events);
    let installed = Arc::new(AtomicBool::new(false));
    registry.subscribe(Box::new(move |_event| {
        // Reads the registry and grows the listener set mid-dispatch.
        let _ = handle.len();
        if !installed.swap(true, Ordering::SeqCst) {
            let sink = Arc::clone(&sink);
            handle.subscribe(Box::new(move |event| {
                sink.lock().unwrap().push(event.clone());
            }));
        }
    }));

    backend.plug("SN1", "Mock Depth Camera");
    backend.plug("SN2", "Mock Depth Camera");

    assert_eq!(registry.len(), 2);
    // The listener installed during SN1's dispatch saw SN2's event.
    assert_eq!(
        *late_events.lock().unwrap(),
        vec![RegistryEvent::DeviceAdded("SN2".to_string())]
    );
}

#[test]
fn close_stops_all_devices() {
    init_tracing();
    let backend = Arc::new(MockBackend::new());
    backend.plug("SN123", "Mock Depth Camera");

    let mut registry = DeviceRegistry::new(Arc::clone(&backend) as Arc<dyn DepthBackend>);
    registry.open(true).unwrap();
    let device = registry.require("SN123").unwrap();
    assert!(device.lock().unwrap().is_running());

    registry.close();
    assert!(registry.is_empty());
    assert!(!device.lock().unwrap().is_running());

    // Closed registries ignore later hardware changes.
    backend.plug("SN456", "Mock Depth Camera");
    assert!(registry.is_empty());
}
