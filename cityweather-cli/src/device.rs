use async_trait::async_trait;
use cityweather_core::{Coordinates, DeviceLocation, LookupError, Permission};

/// Terminal stand-in for the OS location service: permission is asked
/// interactively, and the position comes from flags or the saved home.
#[derive(Debug, Clone)]
pub struct PromptingDevice {
    position: Option<Coordinates>,
    pre_granted: bool,
}

impl PromptingDevice {
    pub fn new(position: Option<Coordinates>, pre_granted: bool) -> Self {
        Self { position, pre_granted }
    }
}

#[async_trait]
impl DeviceLocation for PromptingDevice {
    async fn request_permission(&self) -> Permission {
        if self.pre_granted {
            return Permission::Granted;
        }

        let answer = tokio::task::spawn_blocking(|| {
            inquire::Confirm::new("Allow cityweather to use your location?")
                .with_default(false)
                .prompt()
        })
        .await;

        match answer {
            Ok(Ok(true)) => Permission::Granted,
            Ok(Ok(false)) => Permission::Denied,
            Ok(Err(err)) => {
                tracing::debug!("permission prompt aborted: {err}");
                Permission::Denied
            }
            Err(err) => {
                tracing::warn!("permission prompt task failed: {err}");
                Permission::Denied
            }
        }
    }

    async fn current_position(&self) -> Result<Coordinates, LookupError> {
        self.position.ok_or_else(|| {
            LookupError::Position(
                "no position known; pass --lat/--lon or save one with `cityweather configure`"
                    .to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pre_granted_skips_prompt() {
        let device = PromptingDevice::new(Some(Coordinates { lat: 1.0, lon: 2.0 }), true);

        assert_eq!(device.request_permission().await, Permission::Granted);
        assert_eq!(device.current_position().await, Ok(Coordinates { lat: 1.0, lon: 2.0 }));
    }

    #[tokio::test]
    async fn missing_position_is_a_position_error() {
        let device = PromptingDevice::new(None, true);
        assert!(matches!(device.current_position().await, Err(LookupError::Position(_))));
    }
}
