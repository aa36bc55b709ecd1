//! Configuration-set switching, clocking and run-preset acquisition values.
//!
//! PARSET/GENSET/FiPPI switches rewrite whole banks of DSP state at once, so
//! the setters here end with a bulk cache invalidation covering every value
//! derived from the switched bank.

use super::{MemoryClass, SyncState, local_get, u8_at, u16_at};
use crate::command::CommandCode;
use crate::constants::{
    BASE_CLOCK_MHZ, DECAY_TIME_CLOCK_MHZ, MAX_DECAY_TIME, MAX_RESET_INTERVAL, MAX_TRACEWAIT_US,
    NUM_FIPPIS, NUM_GENSETS, NUM_PARSETS, PRESET_CLOCK_TICK, PRESET_INPUT_COUNTS,
    PRESET_LIVETIME, PRESET_REALTIME, PRESET_STANDARD,
};
use crate::device::Udxp;
use crate::error::DxpError;
use crate::units;

/// Switches to the given PARSET slot and flushes every PARSET-derived value
/// from the channel cache.
pub(crate) fn switch_parset(dev: &mut Udxp, chan: usize, index: u8) -> Result<(), DxpError> {
    dev.command(chan, CommandCode::Parset, &[0x01, index], 1)?;
    dev.invalidate(chan, MemoryClass::PARSET);
    dev.cache_mut(chan)
        .store("parset", index as f64, SyncState::Synced);
    Ok(())
}

fn check_slot(name: &'static str, value: f64, slots: usize) -> Result<u8, DxpError> {
    let index = units::round(value);
    if index < 0.0 || index >= slots as f64 {
        return Err(DxpError::ValueOutOfRange {
            name,
            value,
            min: 0.0,
            max: (slots - 1) as f64,
        });
    }
    Ok(index as u8)
}

pub(crate) fn set_parset(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let index = check_slot("parset", value, NUM_PARSETS)?;
    switch_parset(dev, chan, index)?;
    Ok(index as f64)
}

pub(crate) fn get_parset(dev: &mut Udxp, chan: usize, _name: &str) -> Result<f64, DxpError> {
    let data = dev.command(chan, CommandCode::Parset, &[0x00], 1)?;
    Ok(u8_at(&data, 0)? as f64)
}

pub(crate) fn set_genset(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let index = check_slot("genset", value, NUM_GENSETS)?;
    dev.command(chan, CommandCode::Genset, &[0x01, index], 1)?;
    dev.invalidate(chan, MemoryClass::GENSET);
    Ok(index as f64)
}

pub(crate) fn get_genset(dev: &mut Udxp, chan: usize, _name: &str) -> Result<f64, DxpError> {
    let data = dev.command(chan, CommandCode::Genset, &[0x00], 1)?;
    Ok(u8_at(&data, 0)? as f64)
}

/// A FiPPI switch reloads the signal-processing FPGA, which also resets the
/// PARSET bank.
pub(crate) fn set_fippi(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let index = check_slot("fippi", value, NUM_FIPPIS)?;
    dev.command(chan, CommandCode::FippiConfig, &[0x01, index], 1)?;
    dev.invalidate(chan, MemoryClass::FIPPI.union(MemoryClass::PARSET));
    Ok(index as f64)
}

pub(crate) fn get_fippi(dev: &mut Udxp, chan: usize, _name: &str) -> Result<f64, DxpError> {
    let data = dev.command(chan, CommandCode::FippiConfig, &[0x00], 1)?;
    Ok(u8_at(&data, 0)? as f64)
}

/// The digital clock divider only supports power-of-two divisions of the
/// base clock.
pub(crate) fn set_clock_speed(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let mut divider = None;
    for exp in 0..6 {
        let div = 1u8 << exp;
        if (BASE_CLOCK_MHZ / div as f64 - value).abs() < 1e-9 {
            divider = Some(div);
            break;
        }
    }
    let divider = divider.ok_or(DxpError::ValueOutOfRange {
        name: "clock_speed",
        value,
        min: 1.0,
        max: BASE_CLOCK_MHZ,
    })?;

    dev.command(chan, CommandCode::DigitalClock, &[0x01, divider], 1)?;
    // All filter timing and the trace sampling interval just changed scale.
    dev.invalidate(chan, MemoryClass::PARSET.union(MemoryClass::ADC));
    Ok(BASE_CLOCK_MHZ / divider as f64)
}

pub(crate) fn get_clock_speed(dev: &mut Udxp, chan: usize, _name: &str) -> Result<f64, DxpError> {
    let data = dev.command(chan, CommandCode::DigitalClock, &[0x00], 1)?;
    let divider = u8_at(&data, 0)?;
    if divider == 0 || !divider.is_power_of_two() || divider > 32 {
        return Err(DxpError::ValueOutOfRange {
            name: "clock_speed",
            value: divider as f64,
            min: 1.0,
            max: 32.0,
        });
    }
    Ok(BASE_CLOCK_MHZ / divider as f64)
}

/// Host-side delay between trace trigger and ADC sampling, in microseconds.
pub(crate) fn set_adc_trace_wait(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let clock = dev.get_acquisition_value(chan, "clock_speed")?;
    let min = units::base_tick_us(clock);
    if value < min || value > MAX_TRACEWAIT_US {
        return Err(DxpError::TraceWaitOutOfRange {
            value,
            min,
            max: MAX_TRACEWAIT_US,
        });
    }
    Ok(value)
}

pub(crate) fn get_adc_trace_wait(
    dev: &mut Udxp,
    chan: usize,
    name: &str,
) -> Result<f64, DxpError> {
    local_get(dev, chan, name)
}

/// Pushes the current preset type/value pair to the board. Time presets are
/// written in 500 ns ticks; count presets as raw counts. Firmware with the
/// updated preset command takes a 48-bit value, older firmware 32 bits.
fn write_preset(dev: &mut Udxp, chan: usize, kind: u8, value: f64) -> Result<(), DxpError> {
    let ticks = match kind {
        PRESET_REALTIME | PRESET_LIVETIME => units::round(value / PRESET_CLOCK_TICK) as u64,
        _ => units::round(value) as u64,
    };

    let mut send = vec![kind];
    let n_bytes = if dev.version().supports_updated_preset() {
        6
    } else {
        4
    };
    for i in 0..n_bytes {
        send.push(((ticks >> (8 * i)) & 0xFF) as u8);
    }
    dev.command(chan, CommandCode::Preset, &send, 1)?;
    Ok(())
}

pub(crate) fn set_preset_type(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let kind = units::round(value);
    if kind < PRESET_STANDARD as f64 || kind > PRESET_INPUT_COUNTS as f64 {
        return Err(DxpError::ValueOutOfRange {
            name: "preset_type",
            value,
            min: PRESET_STANDARD as f64,
            max: PRESET_INPUT_COUNTS as f64,
        });
    }
    let preset_value = local_get(dev, chan, "preset_value")?;
    write_preset(dev, chan, kind as u8, preset_value)?;
    Ok(kind)
}

pub(crate) fn get_preset_type(dev: &mut Udxp, chan: usize, name: &str) -> Result<f64, DxpError> {
    local_get(dev, chan, name)
}

pub(crate) fn set_preset_value(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    if value < 0.0 || !value.is_finite() {
        return Err(DxpError::ValueOutOfRange {
            name: "preset_value",
            value,
            min: 0.0,
            max: f64::MAX,
        });
    }
    let kind = local_get(dev, chan, "preset_type")? as u8;
    write_preset(dev, chan, kind, value)?;
    Ok(value)
}

pub(crate) fn get_preset_value(dev: &mut Udxp, chan: usize, name: &str) -> Result<f64, DxpError> {
    local_get(dev, chan, name)
}

pub(crate) fn set_detector_polarity(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let polarity = units::round(value);
    if polarity != 0.0 && polarity != 1.0 {
        return Err(DxpError::ValueOutOfRange {
            name: "detector_polarity",
            value,
            min: 0.0,
            max: 1.0,
        });
    }
    dev.command(chan, CommandCode::Polarity, &[0x01, polarity as u8], 1)?;
    Ok(polarity)
}

pub(crate) fn get_detector_polarity(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    let data = dev.command(chan, CommandCode::Polarity, &[0x00], 1)?;
    Ok(u8_at(&data, 0)? as f64)
}

pub(crate) fn set_reset_interval(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let interval = units::round(value);
    if interval < 0.0 || interval > MAX_RESET_INTERVAL {
        return Err(DxpError::ValueOutOfRange {
            name: "reset_interval",
            value,
            min: 0.0,
            max: MAX_RESET_INTERVAL,
        });
    }
    dev.command(chan, CommandCode::ResetInterval, &[0x01, interval as u8], 1)?;
    Ok(interval)
}

pub(crate) fn get_reset_interval(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
) -> Result<f64, DxpError> {
    let data = dev.command(chan, CommandCode::ResetInterval, &[0x00], 1)?;
    Ok(u8_at(&data, 0)? as f64)
}

/// RC-feedback decay time. Supermicro boards take the value in whole
/// microseconds; older boards count 8 MHz ticks.
pub(crate) fn set_decay_time(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let supermicro = dev.version().is_supermicro();
    let register = if supermicro {
        units::round(value)
    } else {
        units::round(value * DECAY_TIME_CLOCK_MHZ)
    };
    if register < 0.0 || register > MAX_DECAY_TIME {
        return Err(DxpError::ValueOutOfRange {
            name: "decay_time",
            value,
            min: 0.0,
            max: if supermicro {
                MAX_DECAY_TIME
            } else {
                MAX_DECAY_TIME / DECAY_TIME_CLOCK_MHZ
            },
        });
    }
    let reg = register as u16;
    let send = [0x01, (reg & 0xFF) as u8, (reg >> 8) as u8];
    dev.command(chan, CommandCode::RcFeed, &send, 2)?;
    let applied = if supermicro {
        register
    } else {
        register / DECAY_TIME_CLOCK_MHZ
    };
    Ok(applied)
}

pub(crate) fn get_decay_time(dev: &mut Udxp, chan: usize, _name: &str) -> Result<f64, DxpError> {
    let data = dev.command(chan, CommandCode::RcFeed, &[0x00], 2)?;
    let register = u16_at(&data, 0)? as f64;
    if dev.version().is_supermicro() {
        Ok(register)
    } else {
        Ok(register / DECAY_TIME_CLOCK_MHZ)
    }
}
