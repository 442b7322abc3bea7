//! Connection state for one open serial device
//!
//! A connection moves from open to connected (once) to closed (for good).
//! Two independent locks split its state: one for the lifecycle and
//! negotiated settings, one for the lazily bound pins. No operation holds
//! both, and neither is held while bytes move through the device.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::baud::{self, BaudRate};
use crate::error::{Result, SerialError};
use crate::frequency::Frequency;
use crate::line::{Duplex, Flow, Parity, StopBits};
use crate::pins::{Pin, PinBinder, PinRegistry, Signal};
use crate::termios::{self, LineConfig};

/// A byte channel that moves data in both directions
pub trait Conn: fmt::Display {
    /// Write all of `w`, then fill `r`. Either may be empty.
    fn transfer(&self, w: &[u8], r: &mut [u8]) -> Result<()>;

    fn duplex(&self) -> Duplex;
}

/// Access to the signal pins of a UART
///
/// Queries never fail: an absent signal is [`Pin::Invalid`].
pub trait UartPins {
    fn rx(&self) -> Pin;
    fn tx(&self) -> Pin;
    fn rts(&self) -> Pin;
    fn cts(&self) -> Pin;
}

/// Port number taken from the device name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortNumber {
    /// The name ended in digits
    Parsed(u64),
    /// No trailing number; pins are looked up as port 0
    Unknown,
}

impl PortNumber {
    /// Number used to build pin names
    pub fn value(self) -> u64 {
        match self {
            PortNumber::Parsed(n) => n,
            PortNumber::Unknown => 0,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, PortNumber::Parsed(_))
    }
}

#[derive(Debug)]
struct State {
    file: Option<Arc<File>>,
    /// Set by `limit_speed`
    port_speed: Option<Frequency>,
    /// Set by `connect`
    conn_speed: Option<Frequency>,
    baud: Option<BaudRate>,
    bits_per_word: u8,
    connected: bool,
    /// A connect is applying line settings outside the lock
    connecting: bool,
}

/// An open serial device
#[derive(Debug)]
pub struct Connection {
    name: String,
    port_number: PortNumber,
    state: Mutex<State>,
    pins: PinBinder,
}

impl Connection {
    pub(crate) fn new(
        name: String,
        file: File,
        port_number: PortNumber,
        registry: Arc<dyn PinRegistry>,
    ) -> Self {
        Self {
            name,
            port_number,
            state: Mutex::new(State {
                file: Some(Arc::new(file)),
                port_speed: None,
                conn_speed: None,
                baud: None,
                bits_per_word: 0,
                connected: false,
                connecting: false,
            }),
            pins: PinBinder::new(port_number.value(), registry),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Full path of the device file
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port_number(&self) -> PortNumber {
        self.port_number
    }

    /// Negotiate line settings and return the data channel
    ///
    /// `freq` is snapped up to the nearest supported baud rate. When the
    /// device is a terminal the settings are applied to it. A connection
    /// can only be connected once.
    pub fn connect(
        &self,
        freq: Frequency,
        stop: StopBits,
        parity: Parity,
        flow: Flow,
        bits: u8,
    ) -> Result<Channel<'_>> {
        freq.validate()?;
        if !(5..=8).contains(&bits) {
            return Err(SerialError::InvalidBits(bits));
        }
        let line = LineConfig {
            baud: baud::nearest(freq),
            bits,
            stop,
            parity,
            flow,
        };

        let file = {
            let mut state = self.lock();
            let file = state.file.clone().ok_or(SerialError::AlreadyClosed)?;
            if state.connected || state.connecting {
                return Err(SerialError::AlreadyConnected);
            }
            state.connecting = true;
            file
        };

        // Terminal ioctls run without the config lock; `connecting` keeps
        // other connects out meanwhile.
        let applied = termios::apply(&file, &line);
        drop(file);
        {
            let mut state = self.lock();
            state.connecting = false;
            let applied = applied?;
            if state.file.is_none() {
                return Err(SerialError::AlreadyClosed);
            }
            state.conn_speed = Some(freq);
            state.baud = Some(line.baud);
            state.bits_per_word = bits;
            state.connected = true;
            log::debug!(
                "{}: connected at {} (baud {}), {} bits, parity {}, flow {}{}",
                self.name,
                freq,
                line.baud.rate,
                bits,
                parity,
                flow,
                if applied { "" } else { "; not a terminal, settings recorded only" }
            );
        }

        if flow != Flow::RtsCts {
            self.pins.disable_flow_control();
        }
        Ok(Channel { conn: self })
    }

    /// Record the highest clock the port may run at
    ///
    /// Allowed before or after `connect`.
    pub fn limit_speed(&self, freq: Frequency) -> Result<()> {
        freq.validate()?;
        let mut state = self.lock();
        if state.file.is_none() {
            return Err(SerialError::AlreadyClosed);
        }
        state.port_speed = Some(freq);
        Ok(())
    }

    /// Release the device file
    ///
    /// Later operations fail with [`SerialError::AlreadyClosed`]. A transfer
    /// already in progress keeps the descriptor alive until it returns.
    pub fn close(&self) -> Result<()> {
        let file = self.lock().file.take().ok_or(SerialError::AlreadyClosed)?;
        log::debug!("{}: closing", self.name);
        match Arc::try_unwrap(file) {
            Ok(file) => close_file(file),
            Err(_in_flight) => Ok(()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn is_closed(&self) -> bool {
        self.lock().file.is_none()
    }

    /// Clock negotiated by `connect`
    pub fn speed(&self) -> Option<Frequency> {
        let state = self.lock();
        state.conn_speed.filter(|_| state.connected)
    }

    /// Clock recorded by `limit_speed`
    pub fn speed_limit(&self) -> Option<Frequency> {
        self.lock().port_speed
    }

    /// Supported rate the negotiated clock was snapped to
    pub fn baud(&self) -> Option<BaudRate> {
        let state = self.lock();
        state.baud.filter(|_| state.connected)
    }

    pub fn bits_per_word(&self) -> Option<u8> {
        let state = self.lock();
        state.connected.then_some(state.bits_per_word)
    }

    fn file(&self) -> Result<Arc<File>> {
        self.lock().file.clone().ok_or(SerialError::AlreadyClosed)
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let file = self.file()?;
        Ok((&*file).read(buf)?)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let file = self.file()?;
        Ok((&*file).write(buf)?)
    }

    /// Write all of `w`, then read exactly `r.len()` bytes
    ///
    /// Callers serialize their own transfers.
    pub fn transfer(&self, w: &[u8], r: &mut [u8]) -> Result<()> {
        if w.is_empty() && r.is_empty() {
            return Ok(());
        }
        let file = self.file()?;
        let mut f = &*file;
        if !w.is_empty() {
            f.write_all(w)?;
        }
        if !r.is_empty() {
            f.read_exact(r)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn close_file(file: File) -> Result<()> {
    use std::os::unix::io::IntoRawFd;

    let fd = file.into_raw_fd();
    // SAFETY: ownership of fd was just released by `file`; it is closed once.
    if unsafe { libc::close(fd) } != 0 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(not(unix))]
fn close_file(file: File) -> Result<()> {
    drop(file);
    Ok(())
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Conn for Connection {
    fn transfer(&self, w: &[u8], r: &mut [u8]) -> Result<()> {
        Connection::transfer(self, w, r)
    }

    fn duplex(&self) -> Duplex {
        Duplex::Full
    }
}

impl UartPins for Connection {
    fn rx(&self) -> Pin {
        self.pins.get(Signal::Rx)
    }

    fn tx(&self) -> Pin {
        self.pins.get(Signal::Tx)
    }

    fn rts(&self) -> Pin {
        self.pins.get(Signal::Rts)
    }

    fn cts(&self) -> Pin {
        self.pins.get(Signal::Cts)
    }
}

/// Data channel returned by a successful connect
#[derive(Debug, Clone, Copy)]
pub struct Channel<'a> {
    conn: &'a Connection,
}

impl Channel<'_> {
    pub fn connection(&self) -> &Connection {
        self.conn
    }
}

impl fmt::Display for Channel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.conn, f)
    }
}

impl Conn for Channel<'_> {
    fn transfer(&self, w: &[u8], r: &mut [u8]) -> Result<()> {
        self.conn.transfer(w, r)
    }

    fn duplex(&self) -> Duplex {
        Duplex::Full
    }
}

impl UartPins for Channel<'_> {
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

impl Read for Channel<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.conn.read(buf)?)
    }
}

impl Write for Channel<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.conn.write(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::{GIGAHERTZ, KILOHERTZ};
    use crate::pins::tests::CountingRegistry;
    use crate::pins::PinMap;
    use crate::ErrorKind;
    use std::io::{Seek, SeekFrom};

    fn open_temp() -> Connection {
        let file = tempfile::tempfile().unwrap();
        Connection::new(
            "/dev/ttyS1".to_string(),
            file,
            PortNumber::Parsed(1),
            Arc::new(PinMap::new()),
        )
    }

    fn connect_8n1(conn: &Connection, freq: Frequency) -> Result<Channel<'_>> {
        conn.connect(freq, StopBits::One, Parity::None, Flow::None, 8)
    }

    #[test]
    fn test_connect_once() {
        let conn = open_temp();
        assert!(!conn.is_connected());
        assert!(conn.speed().is_none());

        connect_8n1(&conn, Frequency::from_hz(9600)).unwrap();
        assert!(conn.is_connected());
        assert_eq!(conn.speed(), Some(Frequency::from_hz(9600)));
        assert_eq!(conn.bits_per_word(), Some(8));
        assert_eq!(conn.baud().map(|b| b.rate), Some(9600));

        let err = connect_8n1(&conn, Frequency::from_hz(9600)).unwrap_err();
        assert!(matches!(err, SerialError::AlreadyConnected));
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn test_connect_while_connecting() {
        let conn = open_temp();
        conn.lock().connecting = true;
        let err = connect_8n1(&conn, Frequency::from_hz(9600)).unwrap_err();
        assert!(matches!(err, SerialError::AlreadyConnected));

        // Pin queries and speed limits are not held up by a pending connect.
        assert_eq!(conn.rx(), Pin::Invalid);
        conn.limit_speed(KILOHERTZ * 9).unwrap();

        conn.lock().connecting = false;
        connect_8n1(&conn, Frequency::from_hz(9600)).unwrap();
        assert!(!conn.lock().connecting);
    }

    #[test]
    fn test_connect_speed_range() {
        for hz in [50, 9600, 115_200, 1_000_000_000] {
            let conn = open_temp();
            assert!(connect_8n1(&conn, Frequency::from_hz(hz)).is_ok(), "{} Hz", hz);
        }
    }

    #[test]
    fn test_connect_rejects_bad_config() {
        let conn = open_temp();
        let err = connect_8n1(&conn, GIGAHERTZ * 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().contains("maximum supported clock is 1GHz"));

        let err = connect_8n1(&conn, Frequency::from_hz(49)).unwrap_err();
        assert!(matches!(err, SerialError::SpeedTooLow(_)));

        for bits in [0, 4, 9] {
            let err = conn
                .connect(KILOHERTZ * 9, StopBits::One, Parity::None, Flow::None, bits)
                .unwrap_err();
            assert!(matches!(err, SerialError::InvalidBits(b) if b == bits));
        }
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_limit_speed_independent_of_connect() {
        let conn = open_temp();
        conn.limit_speed(KILOHERTZ * 100).unwrap();
        assert_eq!(conn.speed_limit(), Some(KILOHERTZ * 100));
        connect_8n1(&conn, Frequency::from_hz(9600)).unwrap();
        conn.limit_speed(KILOHERTZ * 50).unwrap();
        assert_eq!(conn.speed_limit(), Some(KILOHERTZ * 50));
        assert!(conn.limit_speed(Frequency::from_hz(1)).is_err());
    }

    #[test]
    fn test_operations_after_close() {
        let conn = open_temp();
        conn.close().unwrap();
        assert!(conn.is_closed());

        let mut buf = [0u8; 4];
        let errs = [
            connect_8n1(&conn, Frequency::from_hz(9600)).map(|_| ()).unwrap_err(),
            conn.limit_speed(Frequency::from_hz(9600)).unwrap_err(),
            conn.read(&mut buf).map(|_| ()).unwrap_err(),
            conn.write(b"hi").map(|_| ()).unwrap_err(),
            conn.transfer(b"hi", &mut []).unwrap_err(),
            conn.close().unwrap_err(),
        ];
        for err in errs {
            assert!(matches!(err, SerialError::AlreadyClosed), "{}", err);
        }
    }

    #[test]
    fn test_transfer_round_trip() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"world").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let conn = Connection::new(
            "/dev/ttyS0".to_string(),
            file,
            PortNumber::Parsed(0),
            Arc::new(PinMap::new()),
        );
        let chan = connect_8n1(&conn, Frequency::from_hz(9600)).unwrap();

        let mut r = [0u8; 5];
        chan.transfer(&[], &mut r).unwrap();
        assert_eq!(&r, b"world");
        chan.transfer(b"!", &mut []).unwrap();
        assert_eq!(chan.duplex(), Duplex::Full);
        assert_eq!(chan.to_string(), "/dev/ttyS0");

        // Nothing left to read.
        let err = chan.transfer(&[], &mut [0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_no_flow_invalidates_rts_cts() {
        let registry = CountingRegistry::with(&[
            ("UART2_RX", 1),
            ("UART2_TX", 2),
            ("UART2_RTS", 3),
            ("UART2_CTS", 4),
        ]);
        let conn = Connection::new(
            "/dev/ttyS2".to_string(),
            tempfile::tempfile().unwrap(),
            PortNumber::Parsed(2),
            registry.clone(),
        );
        connect_8n1(&conn, Frequency::from_hz(9600)).unwrap();

        assert_eq!(conn.rts(), Pin::Invalid);
        assert_eq!(conn.cts(), Pin::Invalid);
        assert_eq!(conn.rx().number(), Some(1));
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_rts_cts_flow_keeps_pins() {
        let registry = CountingRegistry::with(&[("UART2_RTS", 3), ("UART2_CTS", 4)]);
        let conn = Connection::new(
            "/dev/ttyS2".to_string(),
            tempfile::tempfile().unwrap(),
            PortNumber::Parsed(2),
            registry,
        );
        conn.connect(Frequency::from_hz(9600), StopBits::One, Parity::None, Flow::RtsCts, 8)
            .unwrap();
        assert_eq!(conn.rts().number(), Some(3));
        assert_eq!(conn.cts().number(), Some(4));
        assert_eq!(conn.rx(), Pin::Invalid);
    }
}
