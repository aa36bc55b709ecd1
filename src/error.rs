use std::io;
use thiserror::Error;

/// The primary error type for the `microdxp-rs` library.
#[derive(Error, Debug)]
pub enum DxpError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Escape character (0x1B) is missing from response")]
    MissingEscape,

    #[error("Command echo mismatch: sent {sent:#04x}, response echoed {echoed:#04x}")]
    CommandMismatch { sent: u8, echoed: u8 },

    #[error("Declared response length {declared} overruns buffer capacity {capacity}")]
    LengthOverrun { declared: usize, capacity: usize },

    #[error("Checksum mismatch: response carries {received:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { received: u8, computed: u8 },

    #[error("Hardware reported status {0}")]
    DeviceStatus(u8),

    #[error("DSP reported an error (status 77)")]
    DspStatus,

    #[error("Truncated response: expected at least {expected} bytes, got {actual}")]
    TruncatedResponse { expected: usize, actual: usize },

    #[error("PIC failed to boot, status {0}")]
    PicBoot(u8),

    #[error("DSP failed to boot, status {0}")]
    DspBoot(u8),

    #[error("Unit is faulted and requires external intervention (power cycle/reconnect)")]
    Faulted,

    #[error("Unknown acquisition value '{0}'")]
    NotFound(String),

    #[error("Unknown board operation '{0}'")]
    UnknownBoardOperation(String),

    #[error("Unknown run data type '{0}'")]
    UnknownRunData(String),

    #[error("Gain {value} out of range [{min}, {max}]")]
    GainOutOfRange { value: f64, min: f64, max: f64 },

    #[error("Threshold {value} out of range [0, {max}]")]
    ThresholdOutOfRange { value: f64, max: f64 },

    #[error("Trace wait {value} us out of range [{min}, {max}]")]
    TraceWaitOutOfRange { value: f64, min: f64, max: f64 },

    #[error("Peaking time {0} us does not match any available PARSET slot")]
    PeakingTimeOutOfRange(f64),

    #[error("'{name}' = {value} out of range [{min}, {max}]")]
    ValueOutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("'{0}' is not supported by this hardware/firmware revision")]
    NotSupported(&'static str),

    #[error("'{0}' is derived from other filter settings and cannot be set directly")]
    ReadOnly(&'static str),

    #[error("SCA index {index} exceeds the configured count {count}")]
    ScaIndex { index: usize, count: usize },

    #[error("Malformed SCA limit name '{0}': expected sca<n>_lo or sca<n>_hi")]
    BadScaName(String),

    #[error("Passthrough payload of {0} bytes exceeds the 32 byte limit")]
    PassthroughTooLong(usize),
}
