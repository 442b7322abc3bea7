//! Serial device discovery through the device filesystem
//!
//! Device names are relative to a root directory (`/dev/` by default).
//! Listing keeps the order the directory returns entries in.

use std::path::Path;
use std::sync::Arc;

use walkdir::WalkDir;

use crate::connection::{Connection, PortNumber};
use crate::error::{Result, SerialError};
use crate::pins::{PinMap, PinRegistry};
use crate::port::Port;

/// Default device root
pub const DEV_ROOT: &str = "/dev/";

/// A device directory plus the pin registry ports opened from it will use
#[derive(Clone)]
pub struct DevFs {
    root: String,
    registry: Arc<dyn PinRegistry>,
}

impl Default for DevFs {
    fn default() -> Self {
        Self::new(DEV_ROOT)
    }
}

impl DevFs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let mut root = root.as_ref().to_string_lossy().into_owned();
        if !root.ends_with('/') {
            root.push('/');
        }
        Self {
            root,
            registry: Arc::new(PinMap::new()),
        }
    }

    /// Use `registry` to resolve the pins of ports opened from here
    pub fn with_pins(mut self, registry: Arc<dyn PinRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// List device names starting with `prefix`, relative to the root
    ///
    /// The prefix is matched literally: glob metacharacters such as `*` or
    /// `[01]` have no special meaning. A prefix may name a subdirectory,
    /// e.g. `serial/by-id/`. A directory that does not exist lists as empty.
    #[cfg(unix)]
    pub fn enumerate(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}{}", self.root, prefix);
        let split = pattern.rfind('/').map_or(0, |i| i + 1);
        let (dir, leaf) = pattern.split_at(split);

        let mut names = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 && is_not_found(&err) => break,
                Err(err) => return Err(SerialError::Io(err.into())),
            };
            let path = entry.path().to_string_lossy();
            let file_name = entry.file_name().to_string_lossy();
            if !file_name.starts_with(leaf) {
                continue;
            }
            if let Some(name) = path.strip_prefix(self.root.as_str()) {
                names.push(name.to_string());
            }
        }
        log::trace!("{}{}*: {} devices", self.root, prefix, names.len());
        Ok(names)
    }

    #[cfg(not(unix))]
    pub fn enumerate(&self, _prefix: &str) -> Result<Vec<String>> {
        Err(SerialError::NotImplemented)
    }

    /// Open the device `name` for reading and writing
    ///
    /// The device does not become the controlling terminal, and terminals
    /// are claimed exclusively.
    #[cfg(unix)]
    pub fn open(&self, name: &str) -> Result<Port> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let path = format!("{}{}", self.root, name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&path)?;
        crate::termios::claim_exclusive(&file)?;

        let port_number = parse_port_number(name);
        log::debug!("opened {} as port {:?}", path, port_number);
        let conn = Connection::new(path, file, port_number, Arc::clone(&self.registry));
        Ok(Port::new(conn))
    }

    #[cfg(not(unix))]
    pub fn open(&self, _name: &str) -> Result<Port> {
        Err(SerialError::NotImplemented)
    }
}

#[cfg(unix)]
fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}

/// List serial devices under `/dev/` starting with `prefix`
pub fn enumerate(prefix: &str) -> Result<Vec<String>> {
    DevFs::default().enumerate(prefix)
}

/// Open the serial device `/dev/<name>`
///
/// Ports opened this way have no pins registered; use
/// [`DevFs::with_pins`] to supply them.
pub fn open(name: &str) -> Result<Port> {
    DevFs::default().open(name)
}

/// Extract the trailing number of a device name
///
/// The name must start with a letter or `/` and end in digits, as in
/// `ttyS3` or `ttyUSB0`. A trailing number too large for `u64` is treated
/// as no number at all.
pub fn parse_port_number(name: &str) -> PortNumber {
    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '/');
    if !starts_ok {
        return PortNumber::Unknown;
    }
    let digits = name.bytes().rev().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return PortNumber::Unknown;
    }
    name[name.len() - digits..]
        .parse()
        .map_or(PortNumber::Unknown, PortNumber::Parsed)
}
