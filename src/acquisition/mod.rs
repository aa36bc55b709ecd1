//! Acquisition-value registry and per-channel cache.
//!
//! Named, typed settings ("peaking_time", "gain", ...) resolve through a
//! static ordered descriptor table to setter/getter functions that perform
//! the actual register traffic. The per-channel cache serves synced reads
//! without hardware access and is bulk-invalidated by memory class when a
//! PARSET/GENSET/FiPPI switch makes derived values stale.

mod filter;
mod gain;
mod mca;
mod presets;

use crate::device::Udxp;
use crate::error::DxpError;
use bitflags::bitflags;
use std::collections::HashMap;
use strum_macros::Display;
use tracing::debug;

bitflags! {
    /// The on-board resource an acquisition value's state belongs to.
    ///
    /// Used on descriptors and as the invalidation mask. This space is kept
    /// separate from any SCA feature bits on purpose.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemoryClass: u8 {
        /// Purely host-side value, no hardware backing.
        const NONE = 0x01;
        /// Must be given a value at channel bring-up.
        const REQUIRED = 0x02;
        const PARSET = 0x04;
        const GENSET = 0x08;
        const FIPPI = 0x10;
        const ADC = 0x20;
        const GLOBAL = 0x40;
        const CUSTOM = 0x80;
    }
}

/// Cache coherence state of one acquisition value on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SyncState {
    /// Hardware may differ from the cached value; next read goes to the
    /// board.
    Unknown,
    /// Cached value equals what the hardware holds.
    Synced,
    /// User wrote a value that has not been pushed to hardware yet.
    Modified,
}

#[derive(Debug, Clone, Copy)]
struct AcqEntry {
    value: f64,
    state: SyncState,
}

/// Per-channel acquisition-value cache.
#[derive(Debug, Default)]
pub struct AcqCache {
    entries: HashMap<String, AcqEntry>,
}

impl AcqCache {
    /// Returns the cached value unless it is stale. Synced entries reflect
    /// the hardware; modified entries reflect a pending user write, which is
    /// what a read-back should report until the value is flushed.
    fn cached_value(&self, name: &str) -> Option<f64> {
        self.entries
            .get(name)
            .filter(|e| e.state != SyncState::Unknown)
            .map(|e| e.value)
    }

    /// Last stored value regardless of sync state.
    fn stored_value(&self, name: &str) -> Option<f64> {
        self.entries.get(name).map(|e| e.value)
    }

    fn store(&mut self, name: &str, value: f64, state: SyncState) {
        self.entries.insert(name.to_owned(), AcqEntry { value, state });
    }

    /// Clears the sync state of every synced name whose descriptor flags
    /// intersect `mask`. Modified entries are untouched: they were never
    /// applied, so there is no hardware state for them to go stale against.
    fn invalidate(&mut self, mask: MemoryClass) {
        for (name, entry) in self.entries.iter_mut() {
            let Some(desc) = lookup(name) else { continue };
            if entry.state == SyncState::Synced && desc.class.intersects(mask) {
                entry.state = SyncState::Unknown;
            }
        }
    }

    /// Every pending user write, in cache order.
    fn staged(&self) -> Vec<(String, f64)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.state == SyncState::Modified)
            .map(|(name, e)| (name.clone(), e.value))
            .collect()
    }
}

/// Setter: converts, validates, writes hardware, returns the actual applied
/// physical value (post rounding/clamping).
pub type SetFn = fn(&mut Udxp, usize, &str, f64) -> Result<f64, DxpError>;

/// Getter: reads hardware and converts back to physical units.
pub type GetFn = fn(&mut Udxp, usize, &str) -> Result<f64, DxpError>;

/// One entry of the static acquisition-value table.
pub struct AcqValueDescriptor {
    pub name: &'static str,
    pub class: MemoryClass,
    pub default: f64,
    set: SetFn,
    get: GetFn,
}

const R_PAR: MemoryClass = MemoryClass::REQUIRED.union(MemoryClass::PARSET);
const R_GEN: MemoryClass = MemoryClass::REQUIRED.union(MemoryClass::GENSET);
const R_FIP: MemoryClass = MemoryClass::REQUIRED.union(MemoryClass::FIPPI);
const R_CUST: MemoryClass = MemoryClass::REQUIRED.union(MemoryClass::CUSTOM);
const PAR_GEN: MemoryClass = MemoryClass::PARSET.union(MemoryClass::GENSET);
const R_PAR_GEN: MemoryClass = R_PAR.union(MemoryClass::GENSET);

/// The acquisition-value table.
///
/// Lookup is a prefix match and takes the FIRST entry whose name is a prefix
/// of the query, so order is load-bearing: `gain_trim` and `gain_mode` must
/// precede `gain`, and `sca` must stay after every name it would otherwise
/// shadow. Do not reorder without auditing the prefix relationships.
pub static ACQ_VALUES: &[AcqValueDescriptor] = &[
    AcqValueDescriptor {
        name: "peaking_time",
        class: R_PAR,
        default: 8.0,
        set: filter::set_peaking_time,
        get: filter::get_peaking_time,
    },
    AcqValueDescriptor {
        name: "energy_gap_time",
        class: MemoryClass::PARSET,
        default: 0.25,
        set: filter::set_energy_gap_time,
        get: filter::get_energy_gap_time,
    },
    AcqValueDescriptor {
        name: "trigger_peak_time",
        class: MemoryClass::PARSET,
        default: 0.1,
        set: filter::set_trigger_peak_time,
        get: filter::get_trigger_peak_time,
    },
    AcqValueDescriptor {
        name: "trigger_gap_time",
        class: MemoryClass::PARSET,
        default: 0.0,
        set: filter::set_trigger_gap_time,
        get: filter::get_trigger_gap_time,
    },
    AcqValueDescriptor {
        name: "baseline_length",
        class: MemoryClass::PARSET,
        default: 256.0,
        set: filter::set_baseline_length,
        get: filter::get_baseline_length,
    },
    AcqValueDescriptor {
        name: "baseline_factor",
        class: MemoryClass::PARSET,
        default: 0.0,
        set: filter::set_baseline_factor,
        get: filter::get_baseline_factor,
    },
    AcqValueDescriptor {
        name: "max_width",
        class: MemoryClass::PARSET,
        default: 1.0,
        set: filter::set_max_width,
        get: filter::get_max_width,
    },
    AcqValueDescriptor {
        name: "peak_mode",
        class: MemoryClass::PARSET,
        default: 0.0,
        set: filter::set_peak_mode,
        get: filter::get_peak_mode,
    },
    AcqValueDescriptor {
        name: "peakint_offset",
        class: MemoryClass::PARSET,
        default: 0.0,
        set: filter::set_peakint_offset,
        get: filter::get_peakint_offset,
    },
    AcqValueDescriptor {
        name: "peaksam_offset",
        class: MemoryClass::PARSET,
        default: 0.0,
        set: filter::set_peaksam_offset,
        get: filter::get_peaksam_offset,
    },
    AcqValueDescriptor {
        name: "peak_interval",
        class: MemoryClass::PARSET,
        default: 0.0,
        set: filter::set_peak_interval,
        get: filter::get_peak_interval,
    },
    AcqValueDescriptor {
        name: "peak_sample",
        class: MemoryClass::PARSET,
        default: 0.0,
        set: filter::set_peak_sample,
        get: filter::get_peak_sample,
    },
    AcqValueDescriptor {
        name: "trigger_threshold",
        class: R_PAR_GEN,
        default: 40.0,
        set: mca::set_trigger_threshold,
        get: mca::get_trigger_threshold,
    },
    AcqValueDescriptor {
        name: "baseline_threshold",
        class: PAR_GEN,
        default: 10.0,
        set: mca::set_baseline_threshold,
        get: mca::get_baseline_threshold,
    },
    AcqValueDescriptor {
        name: "energy_threshold",
        class: PAR_GEN,
        default: 0.0,
        set: mca::set_energy_threshold,
        get: mca::get_energy_threshold,
    },
    // gain_trim and gain_mode must precede gain: prefix matching.
    AcqValueDescriptor {
        name: "gain_trim",
        class: PAR_GEN,
        default: 1.0,
        set: gain::set_gain_trim,
        get: gain::get_gain_trim,
    },
    AcqValueDescriptor {
        name: "gain_mode",
        class: MemoryClass::GLOBAL,
        default: 0.0,
        set: gain::set_gain_mode,
        get: gain::get_gain_mode,
    },
    AcqValueDescriptor {
        name: "gain",
        class: R_GEN,
        default: 1.0,
        set: gain::set_gain,
        get: gain::get_gain,
    },
    AcqValueDescriptor {
        name: "parset",
        class: R_CUST,
        default: 0.0,
        set: presets::set_parset,
        get: presets::get_parset,
    },
    AcqValueDescriptor {
        name: "genset",
        class: R_CUST,
        default: 0.0,
        set: presets::set_genset,
        get: presets::get_genset,
    },
    AcqValueDescriptor {
        name: "fippi",
        class: R_FIP,
        default: 0.0,
        set: presets::set_fippi,
        get: presets::get_fippi,
    },
    AcqValueDescriptor {
        name: "clock_speed",
        class: MemoryClass::GLOBAL,
        default: 32.0,
        set: presets::set_clock_speed,
        get: presets::get_clock_speed,
    },
    AcqValueDescriptor {
        name: "number_mca_channels",
        class: R_GEN,
        default: 4096.0,
        set: mca::set_number_mca_channels,
        get: mca::get_number_mca_channels,
    },
    AcqValueDescriptor {
        name: "mca_bin_width",
        class: R_GEN,
        default: 1.0,
        set: mca::set_mca_bin_width,
        get: mca::get_mca_bin_width,
    },
    AcqValueDescriptor {
        name: "bytes_per_bin",
        class: MemoryClass::NONE,
        default: 3.0,
        set: mca::set_bytes_per_bin,
        get: mca::get_bytes_per_bin,
    },
    AcqValueDescriptor {
        name: "adc_trace_wait",
        class: MemoryClass::ADC,
        default: 5.0,
        set: presets::set_adc_trace_wait,
        get: presets::get_adc_trace_wait,
    },
    AcqValueDescriptor {
        name: "number_of_scas",
        class: MemoryClass::GENSET,
        default: 0.0,
        set: mca::set_number_of_scas,
        get: mca::get_number_of_scas,
    },
    // Prefix entry: resolves sca<n>_lo and sca<n>_hi.
    AcqValueDescriptor {
        name: "sca",
        class: MemoryClass::CUSTOM,
        default: 0.0,
        set: mca::set_sca_limit,
        get: mca::get_sca_limit,
    },
    AcqValueDescriptor {
        name: "preset_type",
        class: MemoryClass::GLOBAL,
        default: 0.0,
        set: presets::set_preset_type,
        get: presets::get_preset_type,
    },
    AcqValueDescriptor {
        name: "preset_value",
        class: MemoryClass::GLOBAL,
        default: 0.0,
        set: presets::set_preset_value,
        get: presets::get_preset_value,
    },
    AcqValueDescriptor {
        name: "detector_polarity",
        class: MemoryClass::GLOBAL,
        default: 1.0,
        set: presets::set_detector_polarity,
        get: presets::get_detector_polarity,
    },
    AcqValueDescriptor {
        name: "reset_interval",
        class: MemoryClass::GLOBAL,
        default: 10.0,
        set: presets::set_reset_interval,
        get: presets::get_reset_interval,
    },
    AcqValueDescriptor {
        name: "decay_time",
        class: MemoryClass::GLOBAL,
        default: 50.0,
        set: presets::set_decay_time,
        get: presets::get_decay_time,
    },
];

/// Resolves a name against the table; first prefix match wins.
pub fn lookup(name: &str) -> Option<&'static AcqValueDescriptor> {
    ACQ_VALUES.iter().find(|d| name.starts_with(d.name))
}

impl Udxp {
    /// Returns the acquisition value, reading hardware only when the cache
    /// is not known to be in sync.
    pub fn get_acquisition_value(&mut self, chan: usize, name: &str) -> Result<f64, DxpError> {
        if let Some(value) = self.cache(chan).cached_value(name) {
            return Ok(value);
        }

        let desc = lookup(name).ok_or_else(|| DxpError::NotFound(name.to_owned()))?;
        let value = (desc.get)(self, chan, name)?;
        self.cache_mut(chan).store(name, value, SyncState::Synced);
        Ok(value)
    }

    /// Applies an acquisition value to hardware and returns the value that
    /// actually took effect after rounding/clamping. The cache is updated
    /// only on success.
    pub fn set_acquisition_value(
        &mut self,
        chan: usize,
        name: &str,
        value: f64,
    ) -> Result<f64, DxpError> {
        let desc = lookup(name).ok_or_else(|| DxpError::NotFound(name.to_owned()))?;
        let applied = (desc.set)(self, chan, name, value)?;
        self.cache_mut(chan).store(name, applied, SyncState::Synced);
        debug!(chan, name, requested = value, applied, "acquisition value set");
        Ok(applied)
    }

    /// Records a pending value without touching hardware. The value is held
    /// in the channel cache as modified and served by reads until
    /// [`Udxp::flush_staged`] pushes it through the normal setter.
    pub fn stage_acquisition_value(
        &mut self,
        chan: usize,
        name: &str,
        value: f64,
    ) -> Result<(), DxpError> {
        lookup(name).ok_or_else(|| DxpError::NotFound(name.to_owned()))?;
        self.cache_mut(chan).store(name, value, SyncState::Modified);
        debug!(chan, name, value, "acquisition value staged");
        Ok(())
    }

    /// Applies every staged value on the channel, in table order. Each value
    /// goes through its regular setter, so range validation and invalidation
    /// side effects happen here, not at staging time.
    pub fn flush_staged(&mut self, chan: usize) -> Result<(), DxpError> {
        let mut staged = self.cache(chan).staged();
        let position = |name: &str| {
            ACQ_VALUES
                .iter()
                .position(|d| name.starts_with(d.name))
                .unwrap_or(usize::MAX)
        };
        staged.sort_by(|a, b| position(&a.0).cmp(&position(&b.0)).then_with(|| a.0.cmp(&b.0)));

        for (name, value) in staged {
            self.set_acquisition_value(chan, &name, value)?;
        }
        Ok(())
    }

    /// Marks every synced value whose memory class intersects `mask` as
    /// stale. `MemoryClass::all()` invalidates everything.
    pub fn invalidate(&mut self, chan: usize, mask: MemoryClass) {
        debug!(chan, ?mask, "invalidating acquisition values");
        self.cache_mut(chan).invalidate(mask);
    }

    /// Applies the default for every required acquisition value, in table
    /// order. Called once at channel bring-up.
    pub fn user_setup(&mut self, chan: usize) -> Result<(), DxpError> {
        for desc in ACQ_VALUES {
            if desc.class.contains(MemoryClass::REQUIRED) {
                self.set_acquisition_value(chan, desc.name, desc.default)?;
            }
        }
        Ok(())
    }
}

/// Serves purely host-side values: last stored value, else the default.
pub(crate) fn local_get(dev: &mut Udxp, chan: usize, name: &str) -> Result<f64, DxpError> {
    if let Some(value) = dev.cache(chan).stored_value(name) {
        return Ok(value);
    }
    let desc = lookup(name).ok_or_else(|| DxpError::NotFound(name.to_owned()))?;
    Ok(desc.default)
}

/// Reads two little-endian bytes out of a response payload.
pub(crate) fn u16_at(data: &[u8], offset: usize) -> Result<u16, DxpError> {
    if data.len() < offset + 2 {
        return Err(DxpError::TruncatedResponse {
            expected: offset + 2,
            actual: data.len(),
        });
    }
    Ok(u16::from_le_bytes([data[offset], data[offset + 1]]))
}

/// Reads one byte out of a response payload.
pub(crate) fn u8_at(data: &[u8], offset: usize) -> Result<u8, DxpError> {
    if data.len() <= offset {
        return Err(DxpError::TruncatedResponse {
            expected: offset + 1,
            actual: data.len(),
        });
    }
    Ok(data[offset])
}
