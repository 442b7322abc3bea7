//! Terminal line configuration
//!
//! Applies negotiated settings to a device file when it is a terminal.
//! Plain files (and pipes) are left alone so they can stand in for devices.

use std::fs::File;

use crate::baud::BaudRate;
use crate::error::Result;
use crate::line::{Flow, Parity, StopBits};

/// Settings applied to the device at connect time
#[derive(Debug, Clone, Copy)]
pub(crate) struct LineConfig {
    pub baud: BaudRate,
    pub bits: u8,
    pub stop: StopBits,
    pub parity: Parity,
    pub flow: Flow,
}

#[cfg(unix)]
mod tty {
    use std::fs::File;
    use std::io::{self, IsTerminal};
    use std::mem::ManuallyDrop;
    use std::os::unix::io::{AsRawFd, FromRawFd};

    use nix::sys::termios::{self, SetArg};
    use serialport::{DataBits, FlowControl, SerialPort, TTYPort};

    use super::LineConfig;
    use crate::error::{Result, SerialError};
    use crate::line::{Flow, Parity, StopBits};

    /// Run `f` against a `TTYPort` view of `file`
    ///
    /// The view borrows the descriptor; it is never dropped, so the
    /// descriptor stays open and owned by `file`.
    pub(crate) fn with_tty<T>(
        file: &File,
        f: impl FnOnce(&mut TTYPort) -> serialport::Result<T>,
    ) -> Result<T> {
        // SAFETY: `file` outlives the view and ManuallyDrop keeps the view
        // from closing the descriptor.
        let mut tty = ManuallyDrop::new(unsafe { TTYPort::from_raw_fd(file.as_raw_fd()) });
        f(&mut tty).map_err(|e| SerialError::Io(io::Error::from(e)))
    }

    /// Reject settings the terminal layer cannot express
    fn check_supported(line: &LineConfig) -> Result<()> {
        if line.stop == StopBits::OneHalf && line.bits != 5 {
            return Err(SerialError::Unsupported("1.5 stop bits with words other than 5 bits"));
        }
        if matches!(line.parity, Parity::Mark | Parity::Space) {
            return Err(SerialError::Unsupported("mark/space parity"));
        }
        if line.flow == Flow::DtrDsr {
            return Err(SerialError::Unsupported("DTR/DSR flow control"));
        }
        Ok(())
    }

    pub(crate) fn apply(file: &File, line: &LineConfig) -> Result<bool> {
        if !file.is_terminal() {
            return Ok(false);
        }
        check_supported(line)?;

        let mut raw = termios::tcgetattr(file).map_err(io::Error::from)?;
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(file, SetArg::TCSANOW, &raw).map_err(io::Error::from)?;

        let data_bits = match line.bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };
        // With 5-bit words the second stop bit is sent as half a bit.
        let stop_bits = match line.stop {
            StopBits::One => serialport::StopBits::One,
            StopBits::OneHalf | StopBits::Two => serialport::StopBits::Two,
        };
        let parity = match line.parity {
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
            _ => serialport::Parity::None,
        };
        let flow = match line.flow {
            Flow::RtsCts => FlowControl::Hardware,
            Flow::XOnXOff => FlowControl::Software,
            _ => FlowControl::None,
        };

        with_tty(file, |tty| {
            tty.set_baud_rate(line.baud.rate)?;
            tty.set_data_bits(data_bits)?;
            tty.set_stop_bits(stop_bits)?;
            tty.set_parity(parity)?;
            tty.set_flow_control(flow)
        })?;
        Ok(true)
    }

    pub(crate) fn claim_exclusive(file: &File) -> Result<()> {
        if file.is_terminal() {
            with_tty(file, |tty| tty.set_exclusive(true))?;
        }
        Ok(())
    }
}

/// Configure `file` for `line`
///
/// Returns `Ok(false)` without touching anything when `file` is not a
/// terminal.
#[cfg(unix)]
pub(crate) fn apply(file: &File, line: &LineConfig) -> Result<bool> {
    tty::apply(file, line)
}

/// Ask the terminal driver to refuse further opens of `file`
///
/// Does nothing for files that are not terminals.
#[cfg(unix)]
pub(crate) fn claim_exclusive(file: &File) -> Result<()> {
    tty::claim_exclusive(file)
}

#[cfg(not(unix))]
pub(crate) fn apply(_file: &File, _line: &LineConfig) -> Result<bool> {
    Ok(false)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::baud;
    use crate::connection::{Connection, PortNumber};
    use crate::error::{ErrorKind, SerialError};
    use crate::frequency::Frequency;
    use crate::pins::PinMap;
    use nix::pty::{openpty, Winsize};
    use nix::sys::termios::Termios;
    use serialport::{FlowControl, SerialPort};
    use std::sync::Arc;

    /// Slave side of a fresh pseudo-terminal, plus the master to keep it alive
    fn pty() -> (File, File) {
        let pty = openpty(None::<&Winsize>, None::<&Termios>).unwrap();
        (File::from(pty.slave), File::from(pty.master))
    }

    fn pty_connection() -> (Connection, File) {
        let (slave, master) = pty();
        let conn = Connection::new(
            "/dev/pts/test".to_string(),
            slave.try_clone().unwrap(),
            PortNumber::Parsed(0),
            Arc::new(PinMap::new()),
        );
        (conn, master)
    }

    #[test]
    fn test_regular_file_is_skipped() {
        let file = tempfile::tempfile().unwrap();
        let line = LineConfig {
            baud: baud::nearest(Frequency::from_hz(9600)),
            bits: 8,
            stop: StopBits::OneHalf,
            parity: Parity::Mark,
            flow: Flow::DtrDsr,
        };
        assert!(!apply(&file, &line).unwrap());
    }

    #[test]
    fn test_terminal_gets_settings() {
        let (slave, _master) = pty();
        let line = LineConfig {
            baud: baud::nearest(Frequency::from_hz(9601)),
            bits: 7,
            stop: StopBits::Two,
            parity: Parity::Even,
            flow: Flow::RtsCts,
        };
        assert!(apply(&slave, &line).unwrap());

        let (rate, stop, flow) = tty::with_tty(&slave, |tty| {
            Ok((tty.baud_rate()?, tty.stop_bits()?, tty.flow_control()?))
        })
        .unwrap();
        assert_eq!(rate, 19200);
        assert_eq!(stop, serialport::StopBits::Two);
        assert_eq!(flow, FlowControl::Hardware);
    }

    #[test]
    fn test_connect_configures_terminal() {
        let (conn, _master) = pty_connection();
        conn.connect(Frequency::from_hz(100_000), StopBits::One, Parity::None, Flow::XOnXOff, 8)
            .unwrap();
        assert!(conn.is_connected());
        assert_eq!(conn.baud().map(|b| b.rate), Some(115_200));
    }

    #[test]
    fn test_dtr_dsr_rejected_on_terminal() {
        let (conn, _master) = pty_connection();
        let err = conn
            .connect(Frequency::from_hz(9600), StopBits::One, Parity::None, Flow::DtrDsr, 8)
            .unwrap_err();
        assert!(matches!(err, SerialError::Unsupported(_)));
        assert_eq!(err.kind(), ErrorKind::CapabilityAbsent);
        assert!(!conn.is_connected());

        // A rejected attempt does not block a valid one.
        assert!(conn
            .connect(Frequency::from_hz(9600), StopBits::One, Parity::None, Flow::None, 8)
            .is_ok());
    }

    #[test]
    fn test_one_and_a_half_stop_bits_needs_five_bit_words() {
        let (conn, _master) = pty_connection();
        let err = conn
            .connect(Frequency::from_hz(9600), StopBits::OneHalf, Parity::None, Flow::None, 8)
            .unwrap_err();
        assert!(matches!(err, SerialError::Unsupported(_)));
        assert!(!conn.is_connected());

        conn.connect(Frequency::from_hz(9600), StopBits::OneHalf, Parity::None, Flow::None, 5)
            .unwrap();
        assert_eq!(conn.bits_per_word(), Some(5));
    }
}
