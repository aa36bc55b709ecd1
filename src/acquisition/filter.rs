//! Energy/trigger filter acquisition values.
//!
//! Energy filter registers count decimated clock ticks; the decimation is a
//! live DSP parameter, so conversions here read it back rather than assuming
//! a constant. The trigger (fast) filter runs off the undecimated clock.

use super::{presets, u16_at};
use crate::command::CommandCode;
use crate::constants::{
    DSP_PARAM_DECIMATION, MAX_BASELINE_LEN, MIN_BASELINE_LEN, NUM_PARSETS, max_filter_param,
    max_filter_timer,
};
use crate::device::Udxp;
use crate::error::DxpError;
use crate::units;

/// Filter parameter indices for the filter-params command.
pub(crate) const FILTER_SLOWLEN: u8 = 0;
pub(crate) const FILTER_SLOWGAP: u8 = 1;
pub(crate) const FILTER_PEAKINT: u8 = 2;
pub(crate) const FILTER_PEAKSAM: u8 = 3;
pub(crate) const FILTER_FASTLEN: u8 = 4;
pub(crate) const FILTER_FASTGAP: u8 = 5;
pub(crate) const FILTER_MAXWIDTH: u8 = 7;
pub(crate) const FILTER_BFACTOR: u8 = 8;
pub(crate) const FILTER_PEAKMODE: u8 = 9;

pub(crate) fn read_filter_param(dev: &mut Udxp, chan: usize, index: u8) -> Result<u16, DxpError> {
    let data = dev.command(chan, CommandCode::FilterParams, &[0x00, index], 2)?;
    u16_at(&data, 0)
}

pub(crate) fn write_filter_param(
    dev: &mut Udxp,
    chan: usize,
    index: u8,
    value: u16,
) -> Result<(), DxpError> {
    let send = [0x01, index, (value & 0xFF) as u8, (value >> 8) as u8];
    dev.command(chan, CommandCode::FilterParams, &send, 2)?;
    Ok(())
}

/// Current energy filter tick in microseconds.
fn energy_tick_us(dev: &mut Udxp, chan: usize) -> Result<f64, DxpError> {
    let decimation = dev.read_dsp_parameter(chan, DSP_PARAM_DECIMATION)?;
    let clock = dev.get_acquisition_value(chan, "clock_speed")?;
    Ok(units::filter_tick_us(decimation, clock))
}

/// Trigger filter tick in microseconds.
fn trigger_tick_us(dev: &mut Udxp, chan: usize) -> Result<f64, DxpError> {
    let clock = dev.get_acquisition_value(chan, "clock_speed")?;
    Ok(units::base_tick_us(clock))
}

/// Picks the PARSET slot whose stored peaking time is closest to the
/// request and switches to it. The candidate SLOWLEN for each slot comes
/// from the slowlen-values command.
pub(crate) fn set_peaking_time(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(DxpError::PeakingTimeOutOfRange(value));
    }

    let tick = energy_tick_us(dev, chan)?;
    let data = dev.command(chan, CommandCode::ReadSlowlenVals, &[], 2 * NUM_PARSETS)?;

    let mut best: Option<(usize, f64)> = None;
    for slot in 0..NUM_PARSETS {
        let slowlen = u16_at(&data, 2 * slot)?;
        if slowlen == 0 {
            // Unprogrammed slot.
            continue;
        }
        let candidate = units::ticks_to_us(slowlen as f64, tick);
        let better = match best {
            Some((_, current)) => (candidate - value).abs() < (current - value).abs(),
            None => true,
        };
        if better {
            best = Some((slot, candidate));
        }
    }

    let (slot, applied) = best.ok_or(DxpError::PeakingTimeOutOfRange(value))?;
    presets::switch_parset(dev, chan, slot as u8)?;
    Ok(applied)
}

pub(crate) fn get_peaking_time(dev: &mut Udxp, chan: usize, _name: &str) -> Result<f64, DxpError> {
    let tick = energy_tick_us(dev, chan)?;
    let slowlen = read_filter_param(dev, chan, FILTER_SLOWLEN)?;
    Ok(units::ticks_to_us(slowlen as f64, tick))
}

/// Shared shape of the microsecond-valued filter length setters.
fn set_filter_time(
    dev: &mut Udxp,
    chan: usize,
    name: &'static str,
    index: u8,
    tick: f64,
    min_ticks: f64,
    value: f64,
) -> Result<f64, DxpError> {
    let max = max_filter_param(dev.version().is_supermicro()) as f64;
    let ticks = units::us_to_ticks(value, tick);
    if ticks < min_ticks || ticks > max {
        return Err(DxpError::ValueOutOfRange {
            name,
            value,
            min: min_ticks * tick,
            max: max * tick,
        });
    }
    write_filter_param(dev, chan, index, ticks as u16)?;
    Ok(units::ticks_to_us(ticks, tick))
}

pub(crate) fn set_energy_gap_time(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let tick = energy_tick_us(dev, chan)?;
    set_filter_time(dev, chan, "energy_gap_time", FILTER_SLOWGAP, tick, 1.0, value)
}

pub(crate) fn get_energy_gap_time(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    let tick = energy_tick_us(dev, chan)?;
    let slowgap = read_filter_param(dev, chan, FILTER_SLOWGAP)?;
    Ok(units::ticks_to_us(slowgap as f64, tick))
}

pub(crate) fn set_trigger_peak_time(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let tick = trigger_tick_us(dev, chan)?;
    set_filter_time(dev, chan, "trigger_peak_time", FILTER_FASTLEN, tick, 1.0, value)
}

pub(crate) fn get_trigger_peak_time(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    let tick = trigger_tick_us(dev, chan)?;
    let fastlen = read_filter_param(dev, chan, FILTER_FASTLEN)?;
    Ok(units::ticks_to_us(fastlen as f64, tick))
}

pub(crate) fn set_trigger_gap_time(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let tick = trigger_tick_us(dev, chan)?;
    set_filter_time(dev, chan, "trigger_gap_time", FILTER_FASTGAP, tick, 0.0, value)
}

pub(crate) fn get_trigger_gap_time(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    let tick = trigger_tick_us(dev, chan)?;
    let fastgap = read_filter_param(dev, chan, FILTER_FASTGAP)?;
    Ok(units::ticks_to_us(fastgap as f64, tick))
}

pub(crate) fn set_max_width(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let tick = trigger_tick_us(dev, chan)?;
    set_filter_time(dev, chan, "max_width", FILTER_MAXWIDTH, tick, 1.0, value)
}

pub(crate) fn get_max_width(dev: &mut Udxp, chan: usize, _name: &str) -> Result<f64, DxpError> {
    let tick = trigger_tick_us(dev, chan)?;
    let width = read_filter_param(dev, chan, FILTER_MAXWIDTH)?;
    Ok(units::ticks_to_us(width as f64, tick))
}

pub(crate) fn set_peak_mode(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    if !dev.version().is_supermicro() {
        return Err(DxpError::NotSupported("peak_mode"));
    }
    let mode = units::round(value);
    if !(0.0..=1.0).contains(&mode) {
        return Err(DxpError::ValueOutOfRange {
            name: "peak_mode",
            value,
            min: 0.0,
            max: 1.0,
        });
    }
    write_filter_param(dev, chan, FILTER_PEAKMODE, mode as u16)?;
    Ok(mode)
}

pub(crate) fn get_peak_mode(dev: &mut Udxp, chan: usize, _name: &str) -> Result<f64, DxpError> {
    if !dev.version().is_supermicro() {
        return Err(DxpError::NotSupported("peak_mode"));
    }
    Ok(read_filter_param(dev, chan, FILTER_PEAKMODE)? as f64)
}

pub(crate) fn set_baseline_factor(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    if !dev.version().is_supermicro() {
        return Err(DxpError::NotSupported("baseline_factor"));
    }
    let max = max_filter_param(true) as f64;
    let factor = units::round(value);
    if factor < 0.0 || factor > max {
        return Err(DxpError::ValueOutOfRange {
            name: "baseline_factor",
            value,
            min: 0.0,
            max,
        });
    }
    write_filter_param(dev, chan, FILTER_BFACTOR, factor as u16)?;
    Ok(factor)
}

pub(crate) fn get_baseline_factor(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    if !dev.version().is_supermicro() {
        return Err(DxpError::NotSupported("baseline_factor"));
    }
    Ok(read_filter_param(dev, chan, FILTER_BFACTOR)? as f64)
}

/// Raw-count offset applied by the DSP when it derives the peak interval.
fn set_timer_offset(
    dev: &mut Udxp,
    chan: usize,
    name: &'static str,
    index: u8,
    value: f64,
) -> Result<f64, DxpError> {
    let max = max_filter_timer(dev.version().is_supermicro()) as f64;
    let offset = units::round(value);
    if offset < 0.0 || offset > max {
        return Err(DxpError::ValueOutOfRange {
            name,
            value,
            min: 0.0,
            max,
        });
    }
    write_filter_param(dev, chan, index, offset as u16)?;
    Ok(offset)
}

pub(crate) fn set_peakint_offset(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    set_timer_offset(dev, chan, "peakint_offset", FILTER_PEAKINT, value)
}

pub(crate) fn get_peakint_offset(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    Ok(read_filter_param(dev, chan, FILTER_PEAKINT)? as f64)
}

pub(crate) fn set_peaksam_offset(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    set_timer_offset(dev, chan, "peaksam_offset", FILTER_PEAKSAM, value)
}

pub(crate) fn get_peaksam_offset(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    Ok(read_filter_param(dev, chan, FILTER_PEAKSAM)? as f64)
}

/// Peak interval is derived on the DSP from SLOWLEN + SLOWGAP + the
/// interval offset; it can only be read back.
pub(crate) fn set_peak_interval(
    _dev: &mut Udxp,
    _chan: usize,
    _name: &str,
    _value: f64,
) -> Result<f64, DxpError> {
    Err(DxpError::ReadOnly("peak_interval"))
}

pub(crate) fn get_peak_interval(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    let tick = energy_tick_us(dev, chan)?;
    let slowlen = read_filter_param(dev, chan, FILTER_SLOWLEN)?;
    let slowgap = read_filter_param(dev, chan, FILTER_SLOWGAP)?;
    let offset = read_filter_param(dev, chan, FILTER_PEAKINT)?;
    Ok(units::ticks_to_us((slowlen + slowgap + offset) as f64, tick))
}

pub(crate) fn set_peak_sample(
    _dev: &mut Udxp,
    _chan: usize,
    _name: &str,
    _value: f64,
) -> Result<f64, DxpError> {
    Err(DxpError::ReadOnly("peak_sample"))
}

pub(crate) fn get_peak_sample(dev: &mut Udxp, chan: usize, _name: &str) -> Result<f64, DxpError> {
    let tick = energy_tick_us(dev, chan)?;
    let slowlen = read_filter_param(dev, chan, FILTER_SLOWLEN)?;
    let offset = read_filter_param(dev, chan, FILTER_PEAKSAM)?;
    Ok(units::ticks_to_us((slowlen + offset) as f64, tick))
}

/// Baseline filter length in 16-bit words, forced to a power of two.
pub(crate) fn set_baseline_length(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    if value < MIN_BASELINE_LEN || value > MAX_BASELINE_LEN {
        return Err(DxpError::ValueOutOfRange {
            name: "baseline_length",
            value,
            min: MIN_BASELINE_LEN,
            max: MAX_BASELINE_LEN,
        });
    }
    let length = 2f64.powi(units::round(value.log2()) as i32);
    let length = length.clamp(MIN_BASELINE_LEN, MAX_BASELINE_LEN);
    let reg = length as u16;
    let send = [0x01, (reg & 0xFF) as u8, (reg >> 8) as u8];
    dev.command(chan, CommandCode::BaselineFilter, &send, 2)?;
    Ok(length)
}

pub(crate) fn get_baseline_length(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    let data = dev.command(chan, CommandCode::BaselineFilter, &[0x00], 2)?;
    Ok(u16_at(&data, 0)? as f64)
}
