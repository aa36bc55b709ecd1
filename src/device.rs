//! Command dispatcher: one full request/response cycle per call, plus the
//! once-per-unit variant-cache bootstrap and USB2 address handling.

use crate::acquisition::AcqCache;
use crate::command::{self, CommandCode, RECV_BASE, Response};
use crate::constants::{BOARD_INFO_LEN, RELEASE_IDMA_BUS_ADDR, STATUS_LEN};
use crate::error::DxpError;
use crate::transport::Transport;
use crate::version::VersionInfo;
use bytes::Bytes;
use tracing::{debug, error, info};

/// Protocol session lifecycle for one physical unit.
///
/// `Faulted` is terminal: the unit requires external intervention (power
/// cycle or reconnect) before any further commands are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unbootstrapped,
    Bootstrapping,
    Ready,
    Faulted,
}

/// A session with one physical microDXP unit.
///
/// Owns the transport, the per-unit firmware version cache and the
/// per-channel acquisition-value caches. All access is synchronous and
/// single-threaded; embedders driving multiple units concurrently must wrap
/// each `Udxp` in its own lock.
pub struct Udxp {
    transport: Box<dyn Transport>,
    unit_id: u32,
    state: SessionState,
    version: VersionInfo,
    caches: Vec<AcqCache>,
}

impl Udxp {
    /// Creates a session for a unit exposing `num_channels` detector
    /// channels (1 or 2 on current hardware). No I/O happens until the
    /// first command.
    pub fn new(unit_id: u32, num_channels: usize, transport: Box<dyn Transport>) -> Udxp {
        assert!(num_channels >= 1);
        Udxp {
            transport,
            unit_id,
            state: SessionState::Unbootstrapped,
            version: VersionInfo::unread(),
            caches: (0..num_channels).map(|_| AcqCache::default()).collect(),
        }
    }

    pub fn unit_id(&self) -> u32 {
        self.unit_id
    }

    pub fn num_channels(&self) -> usize {
        self.caches.len()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The firmware revision read during bootstrap.
    ///
    /// Panics if consulted before the first command has bootstrapped the
    /// unit; that is a caller contract violation.
    pub fn version(&self) -> &VersionInfo {
        assert!(
            !self.version.is_unread(),
            "version consulted before bootstrap"
        );
        &self.version
    }

    pub(crate) fn cache(&self, chan: usize) -> &AcqCache {
        &self.caches[chan]
    }

    pub(crate) fn cache_mut(&mut self, chan: usize) -> &mut AcqCache {
        &mut self.caches[chan]
    }

    /// Performs one command/response cycle on the given channel.
    ///
    /// `recv_data_len` is the number of data bytes expected after the status
    /// byte; the full wire read is `recv_data_len + 6` bytes. Returns the
    /// validated data with framing, status and checksum stripped.
    pub fn command(
        &mut self,
        chan: usize,
        cmd: CommandCode,
        send: &[u8],
        recv_data_len: usize,
    ) -> Result<Bytes, DxpError> {
        match self.state {
            SessionState::Faulted => return Err(DxpError::Faulted),
            SessionState::Unbootstrapped => self.bootstrap(chan)?,
            SessionState::Ready => {}
            SessionState::Bootstrapping => {
                unreachable!("re-entered dispatcher during bootstrap")
            }
        }

        let (routed, address) = self.route(chan, cmd);
        self.execute(address, routed, send, recv_data_len)
            .map_err(|e| {
                error!(
                    unit = self.unit_id,
                    chan,
                    cmd = format_args!("{:#04x}", u8::from(cmd)),
                    "command failed: {e}"
                );
                e
            })
    }

    /// Reads the PIC/DSP boot status and board info exactly once per unit.
    /// Any failure here faults the session for the process lifetime.
    fn bootstrap(&mut self, chan: usize) -> Result<(), DxpError> {
        assert!(
            self.version.is_unread(),
            "bootstrap attempted after version cache was populated"
        );
        info!(unit = self.unit_id, "initializing variant cache");
        self.state = SessionState::Bootstrapping;

        match self.bootstrap_inner(chan) {
            Ok(()) => {
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                error!(unit = self.unit_id, "bootstrap failed, unit faulted: {e}");
                self.state = SessionState::Faulted;
                Err(e)
            }
        }
    }

    fn bootstrap_inner(&mut self, chan: usize) -> Result<(), DxpError> {
        if self.transport.is_usb() {
            self.release_bus(chan)?;
        }

        let (cmd, address) = self.route(chan, CommandCode::Status);
        let status = self.execute(address, cmd, &[], STATUS_LEN)?;
        if status.len() < 2 {
            return Err(DxpError::TruncatedResponse {
                expected: 2,
                actual: status.len(),
            });
        }
        if status[0] != 0 {
            return Err(DxpError::PicBoot(status[0]));
        }
        if status[1] != 0 {
            return Err(DxpError::DspBoot(status[1]));
        }

        let (cmd, address) = self.route(chan, CommandCode::GetBoardInfo);
        let info = self.execute(address, cmd, &[], BOARD_INFO_LEN)?;
        self.version = VersionInfo::from_board_info(&info)?;
        debug!(
            unit = self.unit_id,
            pic = format_args!(
                "{}.{}.{}",
                self.version.pic_variant, self.version.pic_major, self.version.pic_minor
            ),
            dsp = format_args!(
                "{}.{}.{}",
                self.version.dsp_variant, self.version.dsp_major, self.version.dsp_minor
            ),
            "variant cache populated"
        );
        Ok(())
    }

    /// Computes the transfer address for a USB unit: device id in the high
    /// word, target UART in byte 3. A small set of Alpha commands is
    /// redirected to alternate UART targets; everything else goes to UART 1.
    fn route(&self, chan: usize, cmd: CommandCode) -> (CommandCode, u32) {
        if !self.transport.is_usb() {
            return (cmd, 0);
        }

        let high_word = (chan as u32) << 16;

        #[cfg(feature = "alpha")]
        match cmd {
            // I2C bus access goes out on UART 3.
            CommandCode::AccessI2c => return (cmd, high_word | 0x0300_0000),
            // Pulser commands are redirected to UART 2.
            CommandCode::AlphaPulserControl
            | CommandCode::AlphaPulserConfig1
            | CommandCode::AlphaPulserConfig2
            | CommandCode::AlphaPulserSetMode
            | CommandCode::AlphaPulserEnable
            | CommandCode::AlphaPulserEnableVeto
            | CommandCode::AlphaPulserConfigVeto => return (cmd, high_word | 0x0200_0000),
            _ => {}
        }

        (cmd, high_word | 0x0100_0000)
    }

    /// Encode, write, read and validate — no retries at this layer.
    fn execute(
        &mut self,
        address: u32,
        cmd: CommandCode,
        send: &[u8],
        recv_data_len: usize,
    ) -> Result<Bytes, DxpError> {
        let frame = command::encode(cmd, send);

        if self.transport.is_usb() {
            self.transport.set_address_cache(address)?;
        }
        self.transport.write(address, &frame)?;

        let total = recv_data_len + 1 + RECV_BASE;
        if self.transport.is_usb() {
            self.transport.set_address_cache(address)?;
        }
        let receive = self.transport.read(address, total)?;

        Response::validate(cmd, send, &receive).map(|r| r.data)
    }

    /// Gives control of the parallel bus back to the PIC. Required after
    /// direct memory access on USB2 units.
    fn release_bus(&mut self, chan: usize) -> Result<(), DxpError> {
        let address = RELEASE_IDMA_BUS_ADDR | ((chan as u32) << 16);
        self.transport.set_address_cache(address)?;
        self.transport.write(address, &[0, 0])
    }

    /// Reads a block of 16-bit words from unit memory over the parallel
    /// bus. USB2 only; the bus is released back to the PIC afterwards.
    pub fn usb_read_block(
        &mut self,
        chan: usize,
        addr: u32,
        n_words: usize,
    ) -> Result<Vec<u16>, DxpError> {
        assert!(self.transport.is_usb(), "block read on a serial unit");

        let address = addr | ((chan as u32) << 16);
        self.transport.set_address_cache(address)?;
        let raw = self.transport.read(address, n_words * 2)?;
        self.release_bus(chan)?;

        if raw.len() < n_words * 2 {
            return Err(DxpError::TruncatedResponse {
                expected: n_words * 2,
                actual: raw.len(),
            });
        }
        Ok(raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    /// Writes a block of 16-bit words to unit memory over the parallel bus.
    pub fn usb_write_block(
        &mut self,
        chan: usize,
        addr: u32,
        words: &[u16],
    ) -> Result<(), DxpError> {
        assert!(self.transport.is_usb(), "block write on a serial unit");
        assert!(!words.is_empty());

        let address = addr | ((chan as u32) << 16);
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.transport.set_address_cache(address)?;
        self.transport.write(address, &bytes)
    }

    /// Reads one 16-bit DSP parameter by address.
    pub fn read_dsp_parameter(&mut self, chan: usize, addr: u16) -> Result<u16, DxpError> {
        let send = [0x00, (addr & 0xFF) as u8];
        let data = self.command(chan, CommandCode::ReadWriteDspParam, &send, 2)?;
        if data.len() < 2 {
            return Err(DxpError::TruncatedResponse {
                expected: 2,
                actual: data.len(),
            });
        }
        Ok(u16::from_le_bytes([data[0], data[1]]))
    }

    /// Writes one 16-bit DSP parameter by address.
    pub fn write_dsp_parameter(
        &mut self,
        chan: usize,
        addr: u16,
        value: u16,
    ) -> Result<(), DxpError> {
        let send = [
            0x01,
            (addr & 0xFF) as u8,
            (value & 0xFF) as u8,
            (value >> 8) as u8,
        ];
        self.command(chan, CommandCode::ReadWriteDspParam, &send, 2)?;
        Ok(())
    }

    pub(crate) fn is_usb(&self) -> bool {
        self.transport.is_usb()
    }
}
