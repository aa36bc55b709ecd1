//! Common test utilities: a scripted transport and response frame builders.

// Shared across multiple test files - not every item is used in each one.
#![allow(dead_code)]
#![allow(unused_imports)]

pub use microdxp::command::{CommandCode, ESCAPE, checksum};
pub use microdxp::error::DxpError;
pub use microdxp::{MemoryClass, SessionState, Transport, Udxp};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

#[derive(Default)]
struct Inner {
    responses: VecDeque<Vec<u8>>,
    writes: Vec<(u32, Vec<u8>)>,
    reads: usize,
    cached_addresses: Vec<u32>,
}

/// Transport that replays a scripted queue of response buffers and records
/// every write for later inspection.
pub struct ScriptedTransport {
    inner: Rc<RefCell<Inner>>,
    usb: bool,
}

/// Test-side handle onto the same script/recording state.
#[derive(Clone)]
pub struct TransportHandle {
    inner: Rc<RefCell<Inner>>,
}

pub fn scripted(usb: bool) -> (ScriptedTransport, TransportHandle) {
    let inner = Rc::new(RefCell::new(Inner::default()));
    (
        ScriptedTransport {
            inner: inner.clone(),
            usb,
        },
        TransportHandle { inner },
    )
}

impl Transport for ScriptedTransport {
    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), DxpError> {
        self.inner.borrow_mut().writes.push((address, bytes.to_vec()));
        Ok(())
    }

    fn read(&mut self, _address: u32, _len: usize) -> Result<Vec<u8>, DxpError> {
        let mut inner = self.inner.borrow_mut();
        inner.reads += 1;
        inner.responses.pop_front().ok_or_else(|| {
            DxpError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "response script exhausted",
            ))
        })
    }

    fn set_address_cache(&mut self, address: u32) -> Result<(), DxpError> {
        self.inner.borrow_mut().cached_addresses.push(address);
        Ok(())
    }

    fn is_usb(&self) -> bool {
        self.usb
    }
}

impl TransportHandle {
    pub fn queue(&self, frame: Vec<u8>) {
        self.inner.borrow_mut().responses.push_back(frame);
    }

    /// Queues a well-formed reply for `cmd` carrying status 0 and `data`.
    pub fn queue_reply(&self, cmd: CommandCode, data: &[u8]) {
        self.queue(reply_frame(cmd, 0, data));
    }

    /// Number of hardware read round-trips so far.
    pub fn read_count(&self) -> usize {
        self.inner.borrow().reads
    }

    pub fn writes(&self) -> Vec<(u32, Vec<u8>)> {
        self.inner.borrow().writes.clone()
    }

    pub fn last_write(&self) -> (u32, Vec<u8>) {
        self.inner
            .borrow()
            .writes
            .last()
            .cloned()
            .expect("no writes recorded")
    }

    pub fn cached_addresses(&self) -> Vec<u32> {
        self.inner.borrow().cached_addresses.clone()
    }
}

/// Builds a complete response frame: escape, command echo, declared length
/// (status + data), status byte, data and trailing XOR checksum.
pub fn reply_frame(cmd: CommandCode, status: u8, data: &[u8]) -> Vec<u8> {
    let declared = data.len() + 1;
    let mut frame = vec![
        ESCAPE,
        cmd.into(),
        (declared & 0xFF) as u8,
        (declared >> 8) as u8,
        status,
    ];
    frame.extend_from_slice(data);
    frame.push(checksum(&frame[1..]));
    frame
}

/// Queues the status and board-info exchanges the first command triggers.
pub fn queue_bootstrap(handle: &TransportHandle, pic: [u8; 3], dsp: [u8; 3]) {
    handle.queue_reply(CommandCode::Status, &[0, 0, 0, 0]);
    let mut info = [0u8; 26];
    info[0..3].copy_from_slice(&pic);
    info[3..6].copy_from_slice(&dsp);
    handle.queue_reply(CommandCode::GetBoardInfo, &info);
}

/// Installs a subscriber so `RUST_LOG=debug cargo test` shows the protocol
/// byte dumps.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A single-channel serial device with the bootstrap exchanges queued.
pub fn serial_device(pic: [u8; 3], dsp: [u8; 3]) -> (Udxp, TransportHandle) {
    init_logging();
    let (transport, handle) = scripted(false);
    queue_bootstrap(&handle, pic, dsp);
    (Udxp::new(0, 1, Box::new(transport)), handle)
}

/// PIC revision for a supermicro board with direct trace readout.
pub const PIC_SUPERMICRO: [u8; 3] = [0x20, 3, 6];
/// PIC revision for a standard microDXP.
pub const PIC_STANDARD: [u8; 3] = [0x00, 2, 5];
/// DSP code revision past every feature gate.
pub const DSP_CURRENT: [u8; 3] = [0, 5, 0x80];
/// DSP code revision predating SCA support.
pub const DSP_LEGACY: [u8; 3] = [0, 4, 0];
