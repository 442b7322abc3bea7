//! Supported baud rates
//!
//! An ascending table pairing each supported rate with the code the
//! terminal driver expects for it.

use once_cell::sync::Lazy;

use crate::frequency::Frequency;

/// Code passed to the terminal driver to select a speed
#[cfg(unix)]
pub type SpeedCode = libc::speed_t;
#[cfg(not(unix))]
pub type SpeedCode = u32;

/// One entry of the baud table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudRate {
    /// Symbol rate in baud
    pub rate: u32,
    /// Terminal speed code for this rate
    pub code: SpeedCode,
}

impl BaudRate {
    pub fn frequency(&self) -> Frequency {
        Frequency::from_hz(u64::from(self.rate))
    }
}

/// Supported rates, ascending
pub static BAUD_TABLE: Lazy<Vec<BaudRate>> = Lazy::new(build_table);

#[cfg(any(target_os = "linux", target_os = "android"))]
fn build_table() -> Vec<BaudRate> {
    use libc::*;

    [
        (50, B50),
        (75, B75),
        (110, B110),
        (134, B134),
        (150, B150),
        (200, B200),
        (300, B300),
        (600, B600),
        (1200, B1200),
        (1800, B1800),
        (2400, B2400),
        (4800, B4800),
        (9600, B9600),
        (19200, B19200),
        (38400, B38400),
        (57600, B57600),
        (115200, B115200),
        (230400, B230400),
        (460800, B460800),
        (500000, B500000),
        (576000, B576000),
        (921600, B921600),
        (1000000, B1000000),
        (1152000, B1152000),
        (1500000, B1500000),
        (2000000, B2000000),
        (2500000, B2500000),
        (3000000, B3000000),
        (3500000, B3500000),
        (4000000, B4000000),
    ]
    .into_iter()
    .map(|(rate, code)| BaudRate { rate, code })
    .collect()
}

// BSD-derived systems take the numeric rate as the speed code.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn build_table() -> Vec<BaudRate> {
    [
        50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600,
        115200, 230400,
    ]
    .into_iter()
    .map(|rate: u32| BaudRate {
        rate,
        code: rate as SpeedCode,
    })
    .collect()
}

/// Snap a requested frequency up to the nearest supported rate
///
/// Requests above the fastest entry get the fastest entry.
pub fn nearest(freq: Frequency) -> BaudRate {
    let table = &*BAUD_TABLE;
    table
        .iter()
        .find(|entry| entry.frequency() >= freq)
        .or_else(|| table.last())
        .copied()
        .unwrap_or(BaudRate {
            rate: 0,
            code: 0 as SpeedCode,
        })
}
