//! Clock frequency type
//!
//! Frequencies are whole hertz. Port speeds are validated against the
//! [`MIN_SPEED`, `MAX_SPEED`] window before anything else happens.

use std::fmt;
use std::ops::Mul;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SerialError};

/// A clock rate in hertz
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frequency(u64);

pub const HERTZ: Frequency = Frequency(1);
pub const KILOHERTZ: Frequency = Frequency(1_000);
pub const MEGAHERTZ: Frequency = Frequency(1_000_000);
pub const GIGAHERTZ: Frequency = Frequency(1_000_000_000);

/// Lowest clock a port accepts
pub const MIN_SPEED: Frequency = Frequency(50);
/// Highest clock a port accepts
pub const MAX_SPEED: Frequency = GIGAHERTZ;

impl Frequency {
    pub const fn from_hz(hz: u64) -> Self {
        Self(hz)
    }

    pub const fn as_hz(self) -> u64 {
        self.0
    }

    /// Check that this frequency is a usable port clock
    pub fn validate(self) -> Result<Self> {
        if self > MAX_SPEED {
            return Err(SerialError::SpeedTooHigh(self));
        }
        if self < MIN_SPEED {
            return Err(SerialError::SpeedTooLow(self));
        }
        Ok(self)
    }
}

impl Mul<u64> for Frequency {
    type Output = Frequency;

    fn mul(self, rhs: u64) -> Frequency {
        Frequency(self.0.saturating_mul(rhs))
    }
}

impl Mul<Frequency> for u64 {
    type Output = Frequency;

    fn mul(self, rhs: Frequency) -> Frequency {
        rhs * self
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (unit, suffix, digits) = match self.0 {
            hz if hz >= GIGAHERTZ.0 => (GIGAHERTZ.0, "GHz", 9),
            hz if hz >= MEGAHERTZ.0 => (MEGAHERTZ.0, "MHz", 6),
            hz if hz >= KILOHERTZ.0 => (KILOHERTZ.0, "kHz", 3),
            _ => return write!(f, "{}Hz", self.0),
        };
        let whole = self.0 / unit;
        let frac = self.0 % unit;
        if frac == 0 {
            return write!(f, "{}{}", whole, suffix);
        }
        let frac = format!("{:0width$}", frac, width = digits);
        write!(f, "{}.{}{}", whole, frac.trim_end_matches('0'), suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Frequency::from_hz(10).to_string(), "10Hz");
        assert_eq!(Frequency::from_hz(9600).to_string(), "9.6kHz");
        assert_eq!(Frequency::from_hz(115_200).to_string(), "115.2kHz");
        assert_eq!((2 * GIGAHERTZ).to_string(), "2GHz");
        assert_eq!(Frequency::from_hz(1_000_001).to_string(), "1.000001MHz");
    }

    #[test]
    fn test_validate_bounds() {
        assert!(MIN_SPEED.validate().is_ok());
        assert!(MAX_SPEED.validate().is_ok());
        assert!(matches!(
            Frequency::from_hz(49).validate(),
            Err(SerialError::SpeedTooLow(_))
        ));
        assert!(matches!(
            (MAX_SPEED * 2).validate(),
            Err(SerialError::SpeedTooHigh(_))
        ));
    }
}
