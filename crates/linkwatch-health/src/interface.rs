//! Outbound network interface selection for address probes.

use std::ffi::CString;
use std::io;

use tokio::net::TcpSocket;

use crate::error::{WatchdogError, WatchdogResult};

/// A network interface resolved by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    name: String,
    index: u32,
}

impl NetworkInterface {
    /// Look up an interface by name (e.g. `eth0`).
    pub fn by_name(name: &str) -> WatchdogResult<Self> {
        let c_name = CString::new(name)
            .map_err(|_| WatchdogError::InvalidInterfaceName(name.to_string()))?;

        // SAFETY: `c_name` is NUL-terminated and outlives the call.
        let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
        if index == 0 {
            return Err(WatchdogError::InterfaceNotFound(name.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kernel interface index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Pin a probe socket to this interface.
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
    pub(crate) fn bind(&self, socket: &TcpSocket) -> io::Result<()> {
        socket.bind_device(Some(self.name.as_bytes()))
    }

    /// Pin a probe socket to this interface.
    ///
    /// Device binding is unavailable here; the OS routing table decides.
    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "fuchsia")))]
    pub(crate) fn bind(&self, _socket: &TcpSocket) -> io::Result<()> {
        tracing::trace!(interface = %self.name, "device binding unsupported, using default route");
        Ok(())
    }
}
