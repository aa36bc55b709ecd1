//! Low-level byte transport consumed by the command dispatcher.
//!
//! The concrete serial/USB2 drivers live outside this crate; the dispatcher
//! only needs blocking byte I/O plus the USB2 address-cache hook.

use crate::error::DxpError;

/// Blocking byte transport to one physical microDXP unit.
///
/// For USB2-style units the device keeps an implicit "current target"
/// register selecting which downstream UART or memory region subsequent raw
/// transfers apply to. The dispatcher sets it through
/// [`Transport::set_address_cache`] immediately before every dependent
/// transfer and never interleaves unrelated addressed operations in between.
pub trait Transport {
    /// Writes the full buffer to the unit.
    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), DxpError>;

    /// Reads exactly `len` bytes from the unit, blocking until the transport
    /// timeout expires.
    fn read(&mut self, address: u32, len: usize) -> Result<Vec<u8>, DxpError>;

    /// Latches the transfer address for the next read or write. Serial
    /// transports have no address cache and keep the default no-op.
    fn set_address_cache(&mut self, address: u32) -> Result<(), DxpError> {
        let _ = address;
        Ok(())
    }

    /// Whether this unit uses USB2-style addressing and packetization.
    /// Fixed at configuration time.
    fn is_usb(&self) -> bool;
}
