//! Public handle to an open serial port

use std::fmt;
use std::io::{self, Read, Write};

use crate::connection::{Channel, Connection, PortNumber, UartPins};
use crate::error::Result;
use crate::frequency::Frequency;
use crate::line::{Duplex, Flow, Parity, StopBits};
use crate::pins::Pin;

/// An open serial port
///
/// Owns its [`Connection`]; dropping or closing the port releases the
/// device file. All methods take `&self`, so a port can be shared between
/// threads that transfer data and threads that inspect pins.
#[derive(Debug)]
pub struct Port {
    conn: Connection,
}

impl Port {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Full path of the device file
    pub fn name(&self) -> &str {
        self.conn.name()
    }

    pub fn port_number(&self) -> PortNumber {
        self.conn.port_number()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Negotiate line settings; see [`Connection::connect`]
    pub fn connect(
        &self,
        freq: Frequency,
        stop: StopBits,
        parity: Parity,
        flow: Flow,
        bits: u8,
    ) -> Result<Channel<'_>> {
        self.conn.connect(freq, stop, parity, flow, bits)
    }

    pub fn limit_speed(&self, freq: Frequency) -> Result<()> {
        self.conn.limit_speed(freq)
    }

    pub fn close(&self) -> Result<()> {
        self.conn.close()
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.conn.read(buf)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.conn.write(buf)
    }

    pub fn duplex(&self) -> Duplex {
        Duplex::Full
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.conn, f)
    }
}

impl UartPins for Port {
    fn rx(&self) -> Pin {
        self.conn.rx()
    }

    fn tx(&self) -> Pin {
        self.conn.tx()
    }

    fn rts(&self) -> Pin {
        self.conn.rts()
    }

    fn cts(&self) -> Pin {
        self.conn.cts()
    }
}

impl Read for &Port {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.conn.read(buf)?)
    }
}

impl Write for &Port {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.conn.write(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for Port {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut &*self, buf)
    }
}

impl Write for Port {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::connection::Conn;
    use crate::devfs::DevFs;
    use crate::error::{ErrorKind, SerialError};
    use crate::pins::tests::CountingRegistry;
    use std::ffi::CString;
    use std::fs::{File, OpenOptions};
    use std::os::unix::ffi::OsStrExt;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_nine_six_hundred_no_flow() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("ttyS0")).unwrap();
        let registry = CountingRegistry::with(&[("UART0_RTS", 17), ("UART0_CTS", 16)]);
        let port = DevFs::new(dir.path())
            .with_pins(registry)
            .open("ttyS0")
            .unwrap();

        let chan = port
            .connect(Frequency::from_hz(9600), StopBits::One, Parity::None, Flow::None, 8)
            .unwrap();
        assert_eq!(chan.duplex(), Duplex::Full);
        assert_eq!(port.rts(), Pin::Invalid);
        assert_eq!(port.rts(), Pin::Invalid);
        assert_eq!(port.cts(), Pin::Invalid);
    }

    #[test]
    fn test_read_write_through_port() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("ttyUSB0")).unwrap();
        let mut port = DevFs::new(dir.path()).open("ttyUSB0").unwrap();

        port.write_all(b"ping").unwrap();
        assert_eq!(port.write(b"").unwrap(), 0);
        let written = std::fs::read(dir.path().join("ttyUSB0")).unwrap();
        assert_eq!(written, b"ping");

        port.close().unwrap();
        let err = port.write_all(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        let err = Port::read(&port, &mut [0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert!(matches!(port.close(), Err(SerialError::AlreadyClosed)));
    }

    #[test]
    fn test_pin_query_during_blocked_write() {
        let dir = tempdir().unwrap();
        let fifo = dir.path().join("ttyFIFO0");
        let c_path = CString::new(fifo.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        let registry = CountingRegistry::with(&[("UART0_RTS", 17)]);
        let port = DevFs::new(dir.path())
            .with_pins(registry)
            .open("ttyFIFO0")
            .unwrap();
        let chan = port
            .connect(Frequency::from_hz(115_200), StopBits::One, Parity::None, Flow::RtsCts, 8)
            .unwrap();

        // Larger than the pipe buffer, so the write blocks until drained.
        let payload = vec![0x55u8; 1 << 20];
        thread::scope(|s| {
            let writer = s.spawn(|| chan.transfer(&payload, &mut []));
            thread::sleep(Duration::from_millis(100));

            let (sender, receiver) = mpsc::channel();
            let port = &port;
            s.spawn(move || sender.send(port.rts()).unwrap());
            let rts = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(rts.number(), Some(17));
            assert!(!writer.is_finished());

            let mut reader = OpenOptions::new().read(true).open(&fifo).unwrap();
            let mut drained = vec![0u8; payload.len()];
            reader.read_exact(&mut drained).unwrap();
            writer.join().unwrap().unwrap();
        });
    }
}
