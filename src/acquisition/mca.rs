//! Threshold, MCA sizing and SCA acquisition values.

use super::{local_get, u8_at, u16_at};
use crate::command::CommandCode;
use crate::constants::{
    MAX_BIN_WIDTH, MAX_BYTES_PER_BIN, MAX_NUM_BINS, MAX_NUM_INTERNAL_SCA,
    MAX_NUM_INTERNAL_SCA_HI, MAX_THRESHOLD_STD, MAX_THRESHOLD_SUPER, MIN_BIN_WIDTH,
    MIN_BYTES_PER_BIN, MIN_NUM_BINS,
};
use crate::device::Udxp;
use crate::error::DxpError;
use crate::units;

/// Threshold selectors for the threshold command.
const THRESHOLD_TRIGGER: u8 = 0;
const THRESHOLD_BASELINE: u8 = 1;
const THRESHOLD_ENERGY: u8 = 2;

/// SCA limit selectors.
const SCA_LIMIT_LO: u8 = 0;
const SCA_LIMIT_HI: u8 = 1;
/// Pseudo-index addressing the SCA count instead of a limit pair.
const SCA_COUNT_INDEX: u8 = 0xFF;

fn max_threshold(dev: &Udxp) -> f64 {
    if dev.version().is_supermicro() {
        MAX_THRESHOLD_SUPER
    } else {
        MAX_THRESHOLD_STD
    }
}

fn set_threshold(
    dev: &mut Udxp,
    chan: usize,
    selector: u8,
    value: f64,
) -> Result<f64, DxpError> {
    let max = max_threshold(dev);
    let threshold = units::round(value);
    if threshold < 0.0 || threshold > max {
        return Err(DxpError::ThresholdOutOfRange { value, max });
    }
    let reg = threshold as u16;
    let send = [0x01, selector, (reg & 0xFF) as u8, (reg >> 8) as u8];
    dev.command(chan, CommandCode::Threshold, &send, 2)?;
    Ok(threshold)
}

fn get_threshold(dev: &mut Udxp, chan: usize, selector: u8) -> Result<f64, DxpError> {
    let data = dev.command(chan, CommandCode::Threshold, &[0x00, selector], 2)?;
    Ok(u16_at(&data, 0)? as f64)
}

pub(crate) fn set_trigger_threshold(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    set_threshold(dev, chan, THRESHOLD_TRIGGER, value)
}

pub(crate) fn get_trigger_threshold(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    get_threshold(dev, chan, THRESHOLD_TRIGGER)
}

pub(crate) fn set_baseline_threshold(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    set_threshold(dev, chan, THRESHOLD_BASELINE, value)
}

pub(crate) fn get_baseline_threshold(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    get_threshold(dev, chan, THRESHOLD_BASELINE)
}

pub(crate) fn set_energy_threshold(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    set_threshold(dev, chan, THRESHOLD_ENERGY, value)
}

pub(crate) fn get_energy_threshold(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    get_threshold(dev, chan, THRESHOLD_ENERGY)
}

pub(crate) fn set_number_mca_channels(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    if value < MIN_NUM_BINS || value > MAX_NUM_BINS {
        return Err(DxpError::ValueOutOfRange {
            name: "number_mca_channels",
            value,
            min: MIN_NUM_BINS,
            max: MAX_NUM_BINS,
        });
    }
    // The DSP only accepts whole multiples of 256 bins.
    let bins = (units::round(value / 256.0) * 256.0).clamp(MIN_NUM_BINS, MAX_NUM_BINS);
    let reg = bins as u16;
    let send = [0x01, (reg & 0xFF) as u8, (reg >> 8) as u8];
    dev.command(chan, CommandCode::NumBins, &send, 2)?;
    Ok(bins)
}

pub(crate) fn get_number_mca_channels(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    let data = dev.command(chan, CommandCode::NumBins, &[0x00], 2)?;
    Ok(u16_at(&data, 0)? as f64)
}

pub(crate) fn set_mca_bin_width(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let width = units::round(value);
    if width < MIN_BIN_WIDTH || width > MAX_BIN_WIDTH {
        return Err(DxpError::ValueOutOfRange {
            name: "mca_bin_width",
            value,
            min: MIN_BIN_WIDTH,
            max: MAX_BIN_WIDTH,
        });
    }
    dev.command(chan, CommandCode::BinWidth, &[0x01, width as u8], 1)?;
    Ok(width)
}

pub(crate) fn get_mca_bin_width(dev: &mut Udxp, chan: usize, _name: &str) -> Result<f64, DxpError> {
    let data = dev.command(chan, CommandCode::BinWidth, &[0x00], 1)?;
    Ok(u8_at(&data, 0)? as f64)
}

/// Host-side: how many bytes per bin subsequent MCA reads request.
pub(crate) fn set_bytes_per_bin(
    _dev: &mut Udxp,
    _chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let bytes = units::round(value);
    if bytes < MIN_BYTES_PER_BIN || bytes > MAX_BYTES_PER_BIN {
        return Err(DxpError::ValueOutOfRange {
            name: "bytes_per_bin",
            value,
            min: MIN_BYTES_PER_BIN,
            max: MAX_BYTES_PER_BIN,
        });
    }
    Ok(bytes)
}

pub(crate) fn get_bytes_per_bin(dev: &mut Udxp, chan: usize, name: &str) -> Result<f64, DxpError> {
    local_get(dev, chan, name)
}

pub(crate) fn max_sca_count(dev: &Udxp) -> usize {
    if dev.version().supports_updated_sca() {
        MAX_NUM_INTERNAL_SCA_HI
    } else {
        MAX_NUM_INTERNAL_SCA
    }
}

pub(crate) fn set_number_of_scas(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    if !dev.version().supports_sca() {
        return Err(DxpError::NotSupported("number_of_scas"));
    }
    let max = max_sca_count(dev) as f64;
    let count = units::round(value);
    if count < 0.0 || count > max {
        return Err(DxpError::ValueOutOfRange {
            name: "number_of_scas",
            value,
            min: 0.0,
            max,
        });
    }
    let send = [0x01, SCA_COUNT_INDEX, count as u8];
    dev.command(chan, CommandCode::ScaLimit, &send, 1)?;
    Ok(count)
}

pub(crate) fn get_number_of_scas(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    if !dev.version().supports_sca() {
        return Err(DxpError::NotSupported("number_of_scas"));
    }
    let data = dev.command(chan, CommandCode::ScaLimit, &[0x00, SCA_COUNT_INDEX], 1)?;
    Ok(u8_at(&data, 0)? as f64)
}

/// Parses `sca<n>_lo` / `sca<n>_hi` into the SCA index and limit selector.
fn parse_sca_name(name: &str) -> Result<(usize, u8), DxpError> {
    let rest = name
        .strip_prefix("sca")
        .ok_or_else(|| DxpError::BadScaName(name.to_owned()))?;
    let (digits, which) = if let Some(d) = rest.strip_suffix("_lo") {
        (d, SCA_LIMIT_LO)
    } else if let Some(d) = rest.strip_suffix("_hi") {
        (d, SCA_LIMIT_HI)
    } else {
        return Err(DxpError::BadScaName(name.to_owned()));
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DxpError::BadScaName(name.to_owned()));
    }
    let index: usize = digits
        .parse()
        .map_err(|_| DxpError::BadScaName(name.to_owned()))?;
    Ok((index, which))
}

fn check_sca_index(dev: &mut Udxp, chan: usize, index: usize) -> Result<(), DxpError> {
    let count = dev.get_acquisition_value(chan, "number_of_scas")? as usize;
    if index >= count {
        return Err(DxpError::ScaIndex { index, count });
    }
    Ok(())
}

pub(crate) fn set_sca_limit(
    dev: &mut Udxp,
    chan: usize,
    name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    if !dev.version().supports_sca() {
        return Err(DxpError::NotSupported("sca"));
    }
    let (index, which) = parse_sca_name(name)?;
    check_sca_index(dev, chan, index)?;

    let limit = units::round(value);
    let max = MAX_NUM_BINS - 1.0;
    if limit < 0.0 || limit > max {
        return Err(DxpError::ValueOutOfRange {
            name: "sca",
            value,
            min: 0.0,
            max,
        });
    }
    let reg = limit as u16;
    let send = [0x01, index as u8, which, (reg & 0xFF) as u8, (reg >> 8) as u8];
    dev.command(chan, CommandCode::ScaLimit, &send, 2)?;
    Ok(limit)
}

pub(crate) fn get_sca_limit(dev: &mut Udxp, chan: usize, name: &str) -> Result<f64, DxpError> {
    if !dev.version().supports_sca() {
        return Err(DxpError::NotSupported("sca"));
    }
    let (index, which) = parse_sca_name(name)?;
    check_sca_index(dev, chan, index)?;

    let data = dev.command(chan, CommandCode::ScaLimit, &[0x00, index as u8, which], 2)?;
    Ok(u16_at(&data, 0)? as f64)
}
