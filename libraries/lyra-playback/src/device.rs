// lyra-playback/src/device.rs
//
// Output device switching
//
// Enumeration runs on a worker thread. The worker only resolves a handle;
// committing it to the engine happens back on the owner thread, which
// receives the result as an ordinary inbound message.

use crate::engine::DeviceEnumerator;
use crate::error::DeviceError;
use crate::reactor::Inbound;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// An output device as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHandle {
    /// Platform device id
    pub id: String,

    /// Human-readable name
    pub name: String,
}

impl DeviceHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// First device whose id contains `requested`
///
/// Platform ids are long interface paths, so callers pass a fragment.
pub fn find_device<'a>(devices: &'a [DeviceHandle], requested: &str) -> Option<&'a DeviceHandle> {
    devices.iter().find(|d| d.id.contains(requested))
}

/// Starts device resolutions for one player
///
/// Requests are numbered; only the most recent one may be committed, so a
/// slow enumeration can never overwrite a device chosen after it.
pub struct DeviceCoordinator {
    enumerator: Arc<dyn DeviceEnumerator>,
    closed: Arc<AtomicBool>,
    inbound: Sender<Inbound>,
    thread_name: String,
    latest: Arc<AtomicU64>,
}

impl DeviceCoordinator {
    pub fn new(
        enumerator: Arc<dyn DeviceEnumerator>,
        closed: Arc<AtomicBool>,
        inbound: Sender<Inbound>,
        thread_name: impl Into<String>,
    ) -> Self {
        Self {
            enumerator,
            closed,
            inbound,
            thread_name: thread_name.into(),
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of the most recent request; 0 before the first
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }

    pub fn is_current(&self, request: u64) -> bool {
        request == self.latest()
    }

    /// Resolve `device_id` in the background
    ///
    /// Returns the request number once the worker is running. A match is
    /// delivered to the owner thread as [`Inbound::DeviceResolved`]. No
    /// match, an enumeration failure, a newer request or a player closed in
    /// the meantime all end the request silently.
    pub fn request(&self, device_id: String) -> Result<u64, DeviceError> {
        let request = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        let worker = Worker {
            enumerator: Arc::clone(&self.enumerator),
            closed: Arc::clone(&self.closed),
            latest: Arc::clone(&self.latest),
            inbound: self.inbound.clone(),
            request,
        };

        thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || worker.resolve(&device_id))
            .map(|_| request)
            .map_err(|e| DeviceError::WorkerSpawn(e.to_string()))
    }
}

struct Worker {
    enumerator: Arc<dyn DeviceEnumerator>,
    closed: Arc<AtomicBool>,
    latest: Arc<AtomicU64>,
    inbound: Sender<Inbound>,
    request: u64,
}

impl Worker {
    fn resolve(&self, device_id: &str) {
        let devices = match self.enumerator.enumerate_output_devices() {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!("Device switch abandoned: {}", e);
                return;
            }
        };

        let Some(device) = find_device(&devices, device_id) else {
            tracing::debug!("{}", DeviceError::DeviceNotFound(device_id.to_string()));
            return;
        };

        if self.closed.load(Ordering::Acquire) {
            tracing::debug!("Player closed while resolving '{}', dropping result", device_id);
            return;
        }

        if self.latest.load(Ordering::Acquire) != self.request {
            tracing::debug!("Device request '{}' superseded, dropping result", device_id);
            return;
        }

        let message = Inbound::DeviceResolved {
            device: device.clone(),
            request: self.request,
        };
        if self.inbound.send(message).is_err() {
            tracing::debug!("Player gone before device '{}' could be committed", device.id);
        }
    }
}
