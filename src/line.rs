//! Line discipline settings

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    #[default]
    One,
    #[value(name = "onehalf")]
    OneHalf,
    Two,
}

/// Parity bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

/// Flow control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    #[default]
    None,
    /// Software flow control
    #[value(name = "xonxoff")]
    XOnXOff,
    /// Hardware flow control using the RTS and CTS lines
    #[value(name = "rtscts")]
    RtsCts,
    /// Hardware flow control using the DTR and DSR lines
    #[value(name = "dtrdsr")]
    DtrDsr,
}

/// Whether both directions can carry data at once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplex {
    Half,
    Full,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::None => write!(f, "none"),
            Flow::XOnXOff => write!(f, "xon/xoff"),
            Flow::RtsCts => write!(f, "rts/cts"),
            Flow::DtrDsr => write!(f, "dtr/dsr"),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Parity::None => "none",
            Parity::Odd => "odd",
            Parity::Even => "even",
            Parity::Mark => "mark",
            Parity::Space => "space",
        };
        f.write_str(s)
    }
}
