//! Serialized access sessions
//!
//! A session opens a controller, runs caller code against it and closes it
//! again, releasing the SPI device and GPIO lines between sessions.
//!
//! Exclusion is per physical device: every controller for a device holds that
//! device's [`DeviceLock`] from open to close, so two sessions on one chip
//! never overlap, whichever bus or connector opened them. A multi-register
//! sequence such as a frequency change is never interleaved with another.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, StatefulOutputPin};
use embedded_hal::spi::SpiDevice;
use tracing::{trace, warn};

use crate::{Result, Sx1255};

#[derive(Default)]
struct LockState {
    held: Mutex<bool>,
    released: Condvar,
}

impl LockState {
    fn held(&self) -> MutexGuard<'_, bool> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive claim on one physical SX1255.
///
/// Clones refer to the same claim. [`DeviceLock::for_device`] hands out the
/// same claim for the same device path anywhere in the process.
#[derive(Clone, Default)]
pub struct DeviceLock {
    state: Arc<LockState>,
}

impl DeviceLock {
    /// A claim not shared with any other device.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide claim for a device path, e.g. `/dev/spidev0.0`.
    pub fn for_device(path: &str) -> Self {
        static REGISTRY: OnceLock<Mutex<HashMap<String, DeviceLock>>> = OnceLock::new();

        let mut registry = REGISTRY
            .get_or_init(Default::default)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        registry.entry(path.to_owned()).or_default().clone()
    }

    /// Blocks until the device is free, then claims it.
    pub fn acquire(&self) -> DeviceGuard {
        let mut held = self.state.held();
        while *held {
            held = self
                .state
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;

        DeviceGuard {
            state: Arc::clone(&self.state),
        }
    }

    /// Returns true while some controller holds the device.
    pub fn is_held(&self) -> bool {
        *self.state.held()
    }

    /// Returns true if both handles guard the same device.
    pub fn same_device(&self, other: &DeviceLock) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

/// Held claim on a device; dropping it frees the device.
pub struct DeviceGuard {
    state: Arc<LockState>,
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        *self.state.held() = false;
        self.state.released.notify_one();
    }
}

/// Opens a fresh controller for each session.
///
/// Implementations claim the device's [`DeviceLock`] before touching the
/// hardware and hand the guard to the controller.
pub trait Connector {
    /// SPI device type
    type Spi: SpiDevice;
    /// Output line type
    type Pin: OutputPin + StatefulOutputPin;
    /// Delay provider
    type Delay: DelayNs;

    /// Acquires the hardware and returns a ready controller.
    fn connect(&self) -> Result<Sx1255<Self::Spi, Self::Pin, Self::Delay>>;
}

impl<F, SPI, P, D> Connector for F
where
    F: Fn() -> Result<Sx1255<SPI, P, D>>,
    SPI: SpiDevice,
    P: OutputPin + StatefulOutputPin,
    D: DelayNs,
{
    type Spi = SPI;
    type Pin = P;
    type Delay = D;

    fn connect(&self) -> Result<Sx1255<SPI, P, D>> {
        self()
    }
}

/// Runs sessions against one SX1255, one at a time.
///
/// Share it between threads behind an [`Arc`](std::sync::Arc).
pub struct Sx1255Bus<C> {
    connector: C,
    lock: Mutex<()>,
}

impl<C: Connector> Sx1255Bus<C> {
    /// Wraps a connector.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            lock: Mutex::new(()),
        }
    }

    /// The connector sessions are opened with
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Opens a controller, runs `f` and closes the controller.
    ///
    /// Sessions through this bus are serialized even if the connector does
    /// not claim a [`DeviceLock`]. If `f` fails its error is returned and a
    /// close failure is only logged; if `f` succeeds a close failure is
    /// returned.
    pub fn with_controller<T>(
        &self,
        f: impl FnOnce(&mut Sx1255<C::Spi, C::Pin, C::Delay>) -> Result<T>,
    ) -> Result<T> {
        let _session = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut radio = self.connector.connect()?;
        trace!("session opened");

        let result = f(&mut radio);
        let closed = radio.close();
        trace!("session closed");

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close)) => Err(close),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close)) => {
                warn!("release after failed session also failed: {}", close);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChip;
    use crate::registers::map;
    use crate::Error;

    #[test]
    fn session_closes_controller() {
        let chip = MockChip::new();
        let bus = Sx1255Bus::new(|| chip.controller(32_000_000));

        let version = bus.with_controller(|radio| radio.version_string()).unwrap();
        assert_eq!(version, "V1A");

        bus.with_controller(|radio| {
            assert!(radio.is_ready());
            radio.set_tx_rx_switch(true)
        })
        .unwrap();
        assert!(!chip.tx_rx_line().level());
    }

    #[test]
    fn connect_failure_skips_session() {
        let bus = Sx1255Bus::new(|| -> Result<Sx1255<crate::mock::MockSpi, crate::mock::MockPin, crate::StdDelay>> {
            Err(Error::unavailable("/dev/spidev9.9", "no such device"))
        });

        let mut ran = false;
        let result = bus.with_controller(|_| {
            ran = true;
            Ok(())
        });
        assert!(matches!(result, Err(Error::ResourceUnavailable { .. })));
        assert!(!ran);
    }

    #[test]
    fn session_error_wins_over_close_error() {
        let chip = MockChip::new();
        let bus = Sx1255Bus::new(|| chip.controller(32_000_000));

        let result = bus.with_controller(|radio| {
            chip.tx_rx_line().fail_writes(true);
            radio.set_rx_frequency(600_000_000)
        });
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        chip.tx_rx_line().fail_writes(false);
    }

    #[test]
    fn close_error_is_reported_after_success() {
        let chip = MockChip::new();
        let bus = Sx1255Bus::new(|| chip.controller(32_000_000));

        let result = bus.with_controller(|radio| {
            chip.reset_line().fail_writes(true);
            radio.read_register(map::MODE)
        });
        assert!(matches!(result, Err(Error::CompositeClose(_))));
        chip.reset_line().fail_writes(false);
    }

    #[test]
    fn device_locks_are_keyed_by_path() {
        let first = DeviceLock::for_device("/dev/spidev7.0");
        let again = DeviceLock::for_device("/dev/spidev7.0");
        let other = DeviceLock::for_device("/dev/spidev7.1");

        assert!(first.same_device(&again));
        assert!(!first.same_device(&other));

        let guard = first.acquire();
        assert!(again.is_held());
        assert!(!other.is_held());
        drop(guard);
        assert!(!again.is_held());
    }

    #[test]
    fn acquire_waits_for_release() {
        let lock = DeviceLock::new();
        let guard = lock.acquire();
        let released = std::sync::atomic::AtomicBool::new(false);

        std::thread::scope(|s| {
            s.spawn(|| {
                let _second = lock.acquire();
                assert!(released.load(std::sync::atomic::Ordering::SeqCst));
            });
            std::thread::sleep(std::time::Duration::from_millis(20));
            released.store(true, std::sync::atomic::Ordering::SeqCst);
            drop(guard);
        });
        assert!(!lock.is_held());
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let chip = MockChip::new();
        let bus = Sx1255Bus::new(|| chip.controller(32_000_000));

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            bus.with_controller(|_| -> Result<()> { panic!("session aborted") })
        }));
        assert!(panicked.is_err());

        assert!(bus.with_controller(|radio| radio.version()).is_ok());
    }
}
