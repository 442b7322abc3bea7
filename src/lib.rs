//! UART access through operating system device files
//!
//! Opens serial devices exposed under `/dev/`, negotiates clock rate, word
//! size, parity and flow control, and binds the RX/TX/RTS/CTS pins of the
//! port on first use.
//!
//! # Usage
//!
//! ```no_run
//! use uart_devfs::{Flow, Frequency, Parity, StopBits, UartPins};
//!
//! # fn main() -> uart_devfs::Result<()> {
//! for name in uart_devfs::enumerate("ttyS")? {
//!     println!("{}", name);
//! }
//!
//! let port = uart_devfs::open("ttyS1")?;
//! let chan = port.connect(Frequency::from_hz(115_200), StopBits::One, Parity::None, Flow::None, 8)?;
//! let mut reply = [0u8; 2];
//! chan.connection().transfer(b"AT\r", &mut reply)?;
//! println!("rx pin: {}", port.rx());
//! port.close()?;
//! # Ok(())
//! # }
//! ```

pub mod baud;
pub mod config;
pub mod connection;
pub mod devfs;
pub mod driver;
pub mod error;
pub mod frequency;
pub mod line;
pub mod pins;
pub mod port;
mod termios;

pub use connection::{Channel, Conn, Connection, PortNumber, UartPins};
pub use devfs::{enumerate, open, DevFs};
pub use driver::{register_drivers, Driver, DriverRegistry, DriverState};
pub use error::{ErrorKind, Result, SerialError};
pub use frequency::{Frequency, GIGAHERTZ, HERTZ, KILOHERTZ, MEGAHERTZ};
pub use line::{Duplex, Flow, Parity, StopBits};
pub use pins::{Pin, PinMap, PinRegistry, Signal};
pub use port::Port;
