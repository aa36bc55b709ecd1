//! Per-unit firmware version cache and board-variant policy.
//!
//! The six version bytes are read from the board-info response exactly once
//! per physical unit (see [`crate::device::Udxp`]); every variant predicate
//! asserts that the bootstrap has happened.

use crate::constants::{
    BOARD_INFO_LEN, MIN_PASSTHROUGH_SUPPORT_CODEREV, MIN_SCA_SUPPORT_CODEREV,
    MIN_SNAPSHOT_SUPPORT_CODEREV, MIN_UPDATED_PRESET_CODEREV, MIN_UPDATED_SCA_CODEREV,
};
use crate::error::DxpError;
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

/// Sentinel marking a version byte that has not been read from hardware.
pub const VERSION_NOT_READ: u8 = 0xFF;

/// Leading fields of the board-info response.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct BoardInfoRaw {
    pic_variant: u8,
    pic_major: u8,
    pic_minor: u8,
    dsp_variant: u8,
    dsp_major: u8,
    dsp_minor: u8,
}

/// PIC and DSP firmware revision of one physical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub pic_variant: u8,
    pub pic_major: u8,
    pub pic_minor: u8,
    pub dsp_variant: u8,
    pub dsp_major: u8,
    pub dsp_minor: u8,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self::unread()
    }
}

impl VersionInfo {
    /// All bytes at the "not yet read" sentinel.
    pub fn unread() -> Self {
        VersionInfo {
            pic_variant: VERSION_NOT_READ,
            pic_major: VERSION_NOT_READ,
            pic_minor: VERSION_NOT_READ,
            dsp_variant: VERSION_NOT_READ,
            dsp_major: VERSION_NOT_READ,
            dsp_minor: VERSION_NOT_READ,
        }
    }

    pub fn is_unread(&self) -> bool {
        self.pic_variant == VERSION_NOT_READ
    }

    /// Populates from the data portion of a board-info response.
    pub fn from_board_info(data: &[u8]) -> Result<Self, DxpError> {
        if data.len() < BOARD_INFO_LEN {
            return Err(DxpError::TruncatedResponse {
                expected: BOARD_INFO_LEN,
                actual: data.len(),
            });
        }
        let raw = BoardInfoRaw::read_from_bytes(&data[..size_of::<BoardInfoRaw>()]).map_err(
            |_| DxpError::TruncatedResponse {
                expected: size_of::<BoardInfoRaw>(),
                actual: data.len(),
            },
        )?;
        Ok(VersionInfo {
            pic_variant: raw.pic_variant,
            pic_major: raw.pic_major,
            pic_minor: raw.pic_minor,
            dsp_variant: raw.dsp_variant,
            dsp_major: raw.dsp_major,
            dsp_minor: raw.dsp_minor,
        })
    }

    /// Supermicro boards carry wider register fields and extra features.
    pub fn is_supermicro(&self) -> bool {
        if cfg!(feature = "alpha") {
            return false;
        }
        assert!(!self.is_unread(), "variant consulted before bootstrap");
        self.pic_major > 2
    }

    /// Whether MCA memory can be read over the parallel bus directly.
    pub fn has_direct_mca_readout(&self) -> bool {
        if cfg!(feature = "alpha") {
            return true;
        }
        assert!(!self.is_unread(), "variant consulted before bootstrap");
        (self.pic_variant & (1 << 5)) > 0
    }

    /// Whether ADC traces can be read without a special run.
    pub fn has_direct_trace_readout(&self) -> bool {
        if cfg!(feature = "alpha") {
            return false;
        }
        assert!(!self.is_unread(), "variant consulted before bootstrap");
        (self.pic_major == 3 && self.pic_minor >= 6) || self.pic_major > 3
    }

    /// DSP code revision as `(major << 8) | minor`, used for feature gates.
    pub fn dsp_code_revision(&self) -> u16 {
        if cfg!(feature = "alpha") {
            return 0;
        }
        assert!(
            self.dsp_major != VERSION_NOT_READ,
            "variant consulted before bootstrap"
        );
        ((self.dsp_major as u16) << 8) | self.dsp_minor as u16
    }

    pub fn supports_sca(&self) -> bool {
        self.dsp_code_revision() >= MIN_SCA_SUPPORT_CODEREV
    }

    pub fn supports_updated_sca(&self) -> bool {
        self.dsp_code_revision() >= MIN_UPDATED_SCA_CODEREV
    }

    pub fn supports_updated_preset(&self) -> bool {
        self.dsp_code_revision() >= MIN_UPDATED_PRESET_CODEREV
    }

    pub fn supports_snapshot(&self) -> bool {
        self.dsp_code_revision() >= MIN_SNAPSHOT_SUPPORT_CODEREV
    }

    pub fn supports_passthrough(&self) -> bool {
        self.dsp_code_revision() >= MIN_PASSTHROUGH_SUPPORT_CODEREV
    }
}
