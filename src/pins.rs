//! UART signal pins
//!
//! Each port carries four signals named after the port number:
//! `UART<N>_RX`, `UART<N>_TX`, `UART<N>_RTS` and `UART<N>_CTS`. They are
//! looked up by name in a [`PinRegistry`] the first time anyone asks, and
//! cached for the life of the connection. A signal the board does not
//! provide is reported as [`Pin::Invalid`], never as an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A GPIO pin reference, or the invalid sentinel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pin {
    /// The signal is not wired on this hardware
    Invalid,
    /// A registered GPIO line
    Gpio { name: Arc<str>, number: u32 },
}

impl Pin {
    pub fn gpio(name: &str, number: u32) -> Self {
        Pin::Gpio {
            name: Arc::from(name),
            number,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Pin::Invalid)
    }

    pub fn name(&self) -> &str {
        match self {
            Pin::Invalid => "INVALID",
            Pin::Gpio { name, .. } => name,
        }
    }

    pub fn number(&self) -> Option<u32> {
        match self {
            Pin::Invalid => None,
            Pin::Gpio { number, .. } => Some(*number),
        }
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pin::Invalid => f.write_str("INVALID"),
            Pin::Gpio { name, number } => write!(f, "{}(GPIO{})", name, number),
        }
    }
}

/// Lookup of pins by name
///
/// Returns `None` when no pin with that name exists. Lookups never fail.
pub trait PinRegistry: Send + Sync {
    fn by_name(&self, name: &str) -> Option<Pin>;
}

/// A registry backed by a name to GPIO number map
#[derive(Debug, Clone, Default)]
pub struct PinMap {
    pins: HashMap<String, u32>,
}

impl PinMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pin name, replacing any earlier number for it
    pub fn insert(&mut self, name: impl Into<String>, number: u32) {
        self.pins.insert(name.into(), number);
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for PinMap {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        Self {
            pins: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl PinRegistry for PinMap {
    fn by_name(&self, name: &str) -> Option<Pin> {
        self.pins.get(name).map(|&number| Pin::gpio(name, number))
    }
}

/// The four signals of a UART
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Rx,
    Tx,
    Rts,
    Cts,
}

impl Signal {
    fn suffix(self) -> &'static str {
        match self {
            Signal::Rx => "RX",
            Signal::Tx => "TX",
            Signal::Rts => "RTS",
            Signal::Cts => "CTS",
        }
    }

    /// Conventional registry name of this signal on a port
    pub fn pin_name(self, port: u64) -> String {
        format!("UART{}_{}", port, self.suffix())
    }
}

/// Resolution state of a pair of signals
#[derive(Debug, Clone, Default)]
enum PinGroup {
    #[default]
    Unresolved,
    Resolved(Pin, Pin),
    /// Flow control was declared unused; never look these up
    Disabled,
}

#[derive(Debug, Default)]
struct Bindings {
    data: PinGroup,
    flow: PinGroup,
}

/// Lazily resolves and caches the pins of one port
///
/// Guarded by its own lock so pin queries never wait on configuration
/// changes or transfers.
pub(crate) struct PinBinder {
    port: u64,
    registry: Arc<dyn PinRegistry>,
    bindings: Mutex<Bindings>,
}

impl PinBinder {
    pub fn new(port: u64, registry: Arc<dyn PinRegistry>) -> Self {
        Self {
            port,
            registry,
            bindings: Mutex::new(Bindings::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Bindings> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark RTS and CTS as unused
    pub fn disable_flow_control(&self) {
        self.lock().flow = PinGroup::Disabled;
    }

    /// Return the pin for `signal`, resolving on first use
    pub fn get(&self, signal: Signal) -> Pin {
        let mut bindings = self.lock();
        self.resolve(&mut bindings);
        let group = match signal {
            Signal::Rx | Signal::Tx => &bindings.data,
            Signal::Rts | Signal::Cts => &bindings.flow,
        };
        match (group, signal) {
            (PinGroup::Resolved(first, _), Signal::Rx | Signal::Rts) => first.clone(),
            (PinGroup::Resolved(_, second), Signal::Tx | Signal::Cts) => second.clone(),
            _ => Pin::Invalid,
        }
    }

    fn resolve(&self, bindings: &mut Bindings) {
        if let PinGroup::Unresolved = bindings.data {
            bindings.data = PinGroup::Resolved(self.lookup(Signal::Rx), self.lookup(Signal::Tx));
        }
        if let PinGroup::Unresolved = bindings.flow {
            bindings.flow = PinGroup::Resolved(self.lookup(Signal::Rts), self.lookup(Signal::Cts));
        }
    }

    fn lookup(&self, signal: Signal) -> Pin {
        let name = signal.pin_name(self.port);
        match self.registry.by_name(&name) {
            Some(pin) => {
                log::trace!("bound {} to {}", name, pin);
                pin
            }
            None => {
                log::trace!("no pin registered as {}", name);
                Pin::Invalid
            }
        }
    }
}

impl fmt::Debug for PinBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinBinder")
            .field("port", &self.port)
            .field("bindings", &*self.lock())
            .finish()
    }
}
