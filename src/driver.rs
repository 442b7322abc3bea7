//! Driver registration
//!
//! Drivers are registered explicitly into a [`DriverRegistry`] and then
//! initialised together, in registration order.

use std::fmt;

use thiserror::Error;

/// A host driver that can be initialised once
pub trait Driver: Send {
    /// Unique name of the driver
    fn name(&self) -> &str;

    /// Drivers that must load before this one
    fn prerequisites(&self) -> &[&str] {
        &[]
    }

    /// Drivers this one prefers to run after, if present
    fn after(&self) -> &[&str] {
        &[]
    }

    /// Bring the driver up
    ///
    /// `Ok(false)` means the driver does not apply to this host.
    fn init(&mut self) -> Result<bool, String>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("driver {0:?} is already registered")]
    Duplicate(String),
}

/// Outcome of initialising one driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Loaded,
    Skipped,
    Failed(String),
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverState::Loaded => write!(f, "loaded"),
            DriverState::Skipped => write!(f, "skipped"),
            DriverState::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

#[derive(Default)]
pub struct DriverRegistry {
    drivers: Vec<Box<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, driver: Box<dyn Driver>) -> Result<(), RegistryError> {
        if self.drivers.iter().any(|d| d.name() == driver.name()) {
            return Err(RegistryError::Duplicate(driver.name().to_string()));
        }
        log::debug!("registered driver {}", driver.name());
        self.drivers.push(driver);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.drivers.iter().map(|d| d.name()).collect()
    }

    /// Initialise every registered driver
    pub fn init_all(&mut self) -> Vec<(String, DriverState)> {
        self.drivers
            .iter_mut()
            .map(|driver| {
                let state = match driver.init() {
                    Ok(true) => DriverState::Loaded,
                    Ok(false) => DriverState::Skipped,
                    Err(err) => DriverState::Failed(err),
                };
                log::debug!("driver {}: {}", driver.name(), state);
                (driver.name().to_string(), state)
            })
            .collect()
    }
}

/// The serial port driver; needs no setup beyond announcing itself
#[derive(Debug, Default)]
pub struct SerialDriver;

impl Driver for SerialDriver {
    fn name(&self) -> &str {
        "serial"
    }

    fn init(&mut self) -> Result<bool, String> {
        Ok(true)
    }
}

/// Register the drivers provided by this crate
pub fn register_drivers(registry: &mut DriverRegistry) -> Result<(), RegistryError> {
    registry.register(Box::new(SerialDriver))
}
