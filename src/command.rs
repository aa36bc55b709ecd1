//! Escape-framed command encoding and response validation.
//!
//! Every transfer to a microDXP is a single framed command:
//!
//! ```text
//! [0x1B] [cmd] [len lo] [len hi] [payload ...] [checksum]
//! ```
//!
//! The checksum is a running XOR over everything between the escape byte and
//! the checksum byte itself. Responses use the same frame, with the first
//! payload byte carrying the hardware status.

use crate::error::DxpError;
use bytes::Bytes;
use num_enum::{FromPrimitive, IntoPrimitive};
use tracing::{debug, error};

/// Frame start marker.
pub const ESCAPE: u8 = 0x1B;

/// Response overhead: 4 header bytes plus the trailing checksum.
pub const RECV_BASE: usize = 5;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_LEN: usize = 0xFFFF;

/// Hardware status value the DSP uses to flag its own errors.
const STATUS_DSP_ERROR: u8 = 77;

/// Command bytes understood by the microDXP PIC.
///
/// The numeric values are part of the wire protocol and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum CommandCode {
    // Run control and readout
    StartRun = 0x00,
    StopRun = 0x01,
    ReadMca = 0x02,
    ReadSca = 0x04,
    ReadStatistics = 0x06,
    Preset = 0x07,
    Snapshot = 0x08,
    ReadSnapshotMca = 0x09,
    ReadSnapshotStats = 0x0A,

    // Diagnostic tools
    ReadBaseline = 0x10,
    ReadAdcTrace = 0x11,
    ReadBaselineHistory = 0x12,

    // General communications and control
    GetTemperature = 0x41,
    GetDspParamNames = 0x42,
    ReadWriteDspParam = 0x43,
    DspDataMemory = 0x45,
    GetSerialNumber = 0x48,
    GetBoardInfo = 0x49,
    Echo = 0x4A,
    Status = 0x4B,
    Reboot = 0x4F,

    // Spectrometer control
    DigitalClock = 0x80,
    FippiConfig = 0x81,
    Parset = 0x82,
    Genset = 0x83,
    BinWidth = 0x84,
    NumBins = 0x85,
    Threshold = 0x86,
    Polarity = 0x87,
    GainBase = 0x88,
    RcFeed = 0x89,
    ResetInterval = 0x8A,
    FilterParams = 0x8B,
    ParsetVals = 0x8C,
    SaveParset = 0x8D,
    GensetVals = 0x8E,
    SaveGenset = 0x8F,
    ReadSlowlenVals = 0x90,
    GainTweak = 0x91,
    BaselineFilter = 0x92,
    RunTasks = 0x93,
    FipControl = 0x94,
    ScaLimit = 0x97,
    SwitchedGain = 0x9B,
    DigitalGain = 0x9C,
    OffsetDac = 0x9D,
    Apply = 0x9F,

    /// UART passthrough to downstream detector electronics.
    Passthrough = 0xC0,

    // Setup commands
    #[cfg(feature = "alpha")]
    AccessI2c = 0x40,
    #[cfg(feature = "alpha")]
    AlphaPulserControl = 0xD0,
    #[cfg(feature = "alpha")]
    AlphaPulserConfig1 = 0xD1,
    #[cfg(feature = "alpha")]
    AlphaPulserConfig2 = 0xD2,
    #[cfg(feature = "alpha")]
    AlphaPulserSetMode = 0xD3,
    #[cfg(feature = "alpha")]
    AlphaPulserEnable = 0xD5,
    #[cfg(feature = "alpha")]
    AlphaPulserEnableVeto = 0xD6,
    #[cfg(feature = "alpha")]
    AlphaPulserConfigVeto = 0xD7,

    WriteI2c = 0xF6,
    ReadI2c = 0xF7,
    WriteFlash = 0xF8,
    ReadFlash = 0xF9,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Running XOR checksum, seeded at zero and folded left-to-right.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |chk, b| chk ^ b)
}

/// Builds the full wire frame for `cmd` with the given payload.
///
/// The returned buffer is `payload.len() + 5` bytes. The checksum covers the
/// command byte, both length bytes and the payload, but not the escape byte.
pub fn encode(cmd: CommandCode, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);

    let mut frame = Vec::with_capacity(payload.len() + RECV_BASE);
    frame.push(ESCAPE);
    frame.push(cmd.into());
    frame.push((payload.len() & 0xFF) as u8);
    frame.push(((payload.len() >> 8) & 0xFF) as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame[1..]));
    frame
}

/// A validated response: the hardware status byte and the data that follows
/// it, with framing and checksum already stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u8,
    pub data: Bytes,
}

impl Response {
    /// Validates a raw receive buffer against the command that produced it.
    ///
    /// Checks are performed in a fixed order with the first failure winning:
    /// escape byte, command echo, declared length against the buffer
    /// capacity, XOR checksum, and finally the hardware status byte. Any
    /// failure dumps the full send and receive buffers to the log.
    pub fn validate(
        sent: CommandCode,
        sent_payload: &[u8],
        receive: &[u8],
    ) -> Result<Response, DxpError> {
        let capacity = receive.len();

        if capacity < RECV_BASE {
            dump_buffers(sent_payload, receive);
            return Err(DxpError::TruncatedResponse {
                expected: RECV_BASE,
                actual: capacity,
            });
        }

        if receive[0] != ESCAPE {
            dump_buffers(sent_payload, receive);
            error!(
                "escape character missing, receive[0] = {:#04x}",
                receive[0]
            );
            return Err(DxpError::MissingEscape);
        }

        let sent_byte: u8 = sent.into();
        if receive[1] != sent_byte {
            dump_buffers(sent_payload, receive);
            error!(
                sent = format_args!("{sent_byte:#04x}"),
                echoed = format_args!("{:#04x}", receive[1]),
                "command echo mismatch"
            );
            return Err(DxpError::CommandMismatch {
                sent: sent_byte,
                echoed: receive[1],
            });
        }

        let declared = receive[2] as usize | ((receive[3] as usize) << 8);
        let ret_len = declared + RECV_BASE;
        if ret_len > capacity {
            dump_buffers(sent_payload, receive);
            error!(declared, capacity, "declared response length overruns buffer");
            return Err(DxpError::LengthOverrun { declared, capacity });
        }

        let received_chk = receive[ret_len - 1];
        let computed_chk = checksum(&receive[1..ret_len - 1]);
        if received_chk != computed_chk {
            dump_buffers(sent_payload, receive);
            error!(
                received = format_args!("{received_chk:#04x}"),
                computed = format_args!("{computed_chk:#04x}"),
                "response checksum mismatch"
            );
            return Err(DxpError::ChecksumMismatch {
                received: received_chk,
                computed: computed_chk,
            });
        }

        // A zero declared length means the response carries no status byte at
        // all; the board always answers with at least the status.
        if declared == 0 {
            dump_buffers(sent_payload, receive);
            return Err(DxpError::TruncatedResponse {
                expected: RECV_BASE + 1,
                actual: ret_len,
            });
        }

        let status = receive[4];
        if status != 0 {
            dump_buffers(sent_payload, receive);
            error!(status, "hardware reported an error status");
            if status == STATUS_DSP_ERROR {
                return Err(DxpError::DspStatus);
            }
            return Err(DxpError::DeviceStatus(status));
        }

        Ok(Response {
            status,
            data: Bytes::copy_from_slice(&receive[RECV_BASE..ret_len - 1]),
        })
    }
}

/// Logs the complete send and receive buffers for post-mortem diagnosis.
fn dump_buffers(send: &[u8], receive: &[u8]) {
    debug!(send = %hex::encode(send), receive = %hex::encode(receive), "protocol failure byte dump");
}
