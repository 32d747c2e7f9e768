//! "Use my location": permission, device position, then a reverse lookup.

use async_trait::async_trait;
use std::{
    fmt::Debug,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    error::LookupError,
    geocoding::GeocodingClient,
    model::{Coordinates, Place},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Platform seam for the foreground location permission and position fix.
#[async_trait]
pub trait DeviceLocation: Send + Sync + Debug {
    async fn request_permission(&self) -> Permission;
    async fn current_position(&self) -> Result<Coordinates, LookupError>;
}

/// A device that always answers with the same permission and position.
#[derive(Debug, Clone)]
pub struct FixedDevice {
    permission: Permission,
    position: Option<Coordinates>,
}

impl FixedDevice {
    pub fn new(permission: Permission, position: Option<Coordinates>) -> Self {
        Self { permission, position }
    }

    pub fn granted(position: Coordinates) -> Self {
        Self::new(Permission::Granted, Some(position))
    }

    pub fn denied() -> Self {
        Self::new(Permission::Denied, None)
    }
}

#[async_trait]
impl DeviceLocation for FixedDevice {
    async fn request_permission(&self) -> Permission {
        self.permission
    }

    async fn current_position(&self) -> Result<Coordinates, LookupError> {
        self.position.ok_or_else(|| LookupError::Position("no position available".to_string()))
    }
}

#[derive(Debug)]
pub struct LocationProvider {
    device: Box<dyn DeviceLocation>,
    geocoder: GeocodingClient,
    locating: AtomicBool,
}

/// Clears the `locating` flag however the lookup ends, including cancellation.
struct LocatingGuard<'a>(&'a AtomicBool);

impl Drop for LocatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl LocationProvider {
    pub fn new(device: Box<dyn DeviceLocation>, geocoder: GeocodingClient) -> Self {
        Self { device, geocoder, locating: AtomicBool::new(false) }
    }

    pub fn is_locating(&self) -> bool {
        self.locating.load(Ordering::Acquire)
    }

    pub async fn current_place(&self) -> Result<Place, LookupError> {
        if self.locating.swap(true, Ordering::AcqRel) {
            return Err(LookupError::Busy);
        }
        let _guard = LocatingGuard(&self.locating);

        if self.device.request_permission().await == Permission::Denied {
            tracing::info!("location permission denied");
            return Err(LookupError::PermissionDenied);
        }

        let Coordinates { lat, lon } = self.device.current_position().await.inspect_err(|err| {
            tracing::warn!("failed to read device position: {err}");
        })?;

        let place = self.geocoder.resolve_by_coordinates(lat, lon).await;
        tracing::info!(place = %place, "located");
        Ok(place)
    }
}
