//! Gain acquisition values.
//!
//! The board offers several analog front ends; `gain_mode` selects which
//! register path a requested linear gain is decomposed onto. Modes 0-2 drive
//! the 16-bit gain DAC directly. Mode 3 picks the closest entry of the
//! 16-step switched-gain ladder and absorbs the residue in the digital
//! sub-gain. Mode 4 does the same against the two-step high/low relay.

use super::{local_get, u16_at, u8_at};
use crate::command::CommandCode;
use crate::constants::{
    GAIN_LINEAR_MAX, GAIN_LINEAR_MIN, GAIN_TRIM_LINEAR_MAX, GAIN_TRIM_LINEAR_MIN,
    HIGHLOW_GAIN_LUT, VARIABLE_GAIN_LUT,
};
use crate::device::Udxp;
use crate::error::DxpError;
use crate::units::{self, DigitalGain};

pub(crate) const GAIN_MODE_FIXED: f64 = 0.0;
pub(crate) const GAIN_MODE_HIGHLOW: f64 = 4.0;

fn check_gain_range(value: f64) -> Result<(), DxpError> {
    if !(GAIN_LINEAR_MIN..=GAIN_LINEAR_MAX).contains(&value) {
        return Err(DxpError::GainOutOfRange {
            value,
            min: GAIN_LINEAR_MIN,
            max: GAIN_LINEAR_MAX,
        });
    }
    Ok(())
}

/// Index of the ladder entry closest to the requested gain.
fn closest_lut_index(lut: &[f64], value: f64) -> usize {
    let mut best = 0;
    for (i, g) in lut.iter().enumerate() {
        if (value - g).abs() < (value - lut[best]).abs() {
            best = i;
        }
    }
    best
}

fn write_gain_dac(dev: &mut Udxp, chan: usize, register: u16) -> Result<(), DxpError> {
    let send = [0x01, (register & 0xFF) as u8, (register >> 8) as u8];
    dev.command(chan, CommandCode::GainBase, &send, 2)?;
    Ok(())
}

fn read_gain_dac(dev: &mut Udxp, chan: usize) -> Result<u16, DxpError> {
    let data = dev.command(chan, CommandCode::GainBase, &[0x00], 2)?;
    u16_at(&data, 0)
}

fn write_switched_gain(dev: &mut Udxp, chan: usize, index: u8) -> Result<(), DxpError> {
    dev.command(chan, CommandCode::SwitchedGain, &[0x01, index], 1)?;
    Ok(())
}

fn read_switched_gain(dev: &mut Udxp, chan: usize) -> Result<u8, DxpError> {
    let data = dev.command(chan, CommandCode::SwitchedGain, &[0x00], 1)?;
    u8_at(&data, 0)
}

fn write_digital_gain(dev: &mut Udxp, chan: usize, dg: DigitalGain) -> Result<(), DxpError> {
    let send = [
        0x01,
        (dg.mantissa & 0xFF) as u8,
        (dg.mantissa >> 8) as u8,
        dg.exponent as u8,
    ];
    dev.command(chan, CommandCode::DigitalGain, &send, 3)?;
    Ok(())
}

fn read_digital_gain(dev: &mut Udxp, chan: usize) -> Result<DigitalGain, DxpError> {
    let data = dev.command(chan, CommandCode::DigitalGain, &[0x00], 3)?;
    let mantissa = u16_at(&data, 0)?;
    let exponent = u8_at(&data, 2)? as i8;
    Ok(DigitalGain { exponent, mantissa })
}

pub(crate) fn set_gain(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    check_gain_range(value)?;
    let mode = dev.get_acquisition_value(chan, "gain_mode")?;

    if mode == GAIN_MODE_HIGHLOW {
        let index = closest_lut_index(&HIGHLOW_GAIN_LUT, value);
        let coarse = HIGHLOW_GAIN_LUT[index];
        let dg = DigitalGain::from_linear(value / coarse);
        write_switched_gain(dev, chan, index as u8)?;
        write_digital_gain(dev, chan, dg)?;
        return Ok(coarse * dg.to_linear());
    }

    if mode == 3.0 {
        let index = closest_lut_index(&VARIABLE_GAIN_LUT, value);
        let coarse = VARIABLE_GAIN_LUT[index];
        let dg = DigitalGain::from_linear(value / coarse);
        write_switched_gain(dev, chan, index as u8)?;
        write_digital_gain(dev, chan, dg)?;
        return Ok(coarse * dg.to_linear());
    }

    let register = units::gain_to_register(value);
    write_gain_dac(dev, chan, register)?;
    Ok(units::register_to_gain(register))
}

pub(crate) fn get_gain(dev: &mut Udxp, chan: usize, _name: &str) -> Result<f64, DxpError> {
    let mode = dev.get_acquisition_value(chan, "gain_mode")?;

    if mode == GAIN_MODE_HIGHLOW || mode == 3.0 {
        let lut: &[f64] = if mode == GAIN_MODE_HIGHLOW {
            &HIGHLOW_GAIN_LUT
        } else {
            &VARIABLE_GAIN_LUT
        };
        let index = read_switched_gain(dev, chan)? as usize;
        let coarse = *lut.get(index).ok_or(DxpError::ValueOutOfRange {
            name: "gain",
            value: index as f64,
            min: 0.0,
            max: (lut.len() - 1) as f64,
        })?;
        let dg = read_digital_gain(dev, chan)?;
        return Ok(coarse * dg.to_linear());
    }

    Ok(units::register_to_gain(read_gain_dac(dev, chan)?))
}

pub(crate) fn set_gain_trim(
    dev: &mut Udxp,
    chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    if !(GAIN_TRIM_LINEAR_MIN..=GAIN_TRIM_LINEAR_MAX).contains(&value) {
        return Err(DxpError::GainOutOfRange {
            value,
            min: GAIN_TRIM_LINEAR_MIN,
            max: GAIN_TRIM_LINEAR_MAX,
        });
    }
    let register = units::gain_trim_to_register(value);
    let send = [0x01, (register & 0xFF) as u8, (register >> 8) as u8];
    dev.command(chan, CommandCode::GainTweak, &send, 2)?;
    Ok(units::register_to_gain_trim(register))
}

pub(crate) fn get_gain_trim(dev: &mut Udxp, chan: usize, _name: &str) -> Result<f64, DxpError> {
    let data = dev.command(chan, CommandCode::GainTweak, &[0x00], 2)?;
    Ok(units::register_to_gain_trim(u16_at(&data, 0)?))
}

/// Host-side selector; takes effect the next time `gain` is written.
pub(crate) fn set_gain_mode(
    _dev: &mut Udxp,
    _chan: usize,
    _name: &str,
    value: f64,
) -> Result<f64, DxpError> {
    let mode = units::round(value);
    if !(GAIN_MODE_FIXED..=GAIN_MODE_HIGHLOW).contains(&mode) {
        return Err(DxpError::ValueOutOfRange {
            name: "gain_mode",
            value,
            min: GAIN_MODE_FIXED,
            max: GAIN_MODE_HIGHLOW,
        });
    }
    Ok(mode)
}

pub(crate) fn get_gain_mode(dev: &mut Udxp, chan: usize, name: &str) -> Result<f64, DxpError> {
    local_get(dev, chan, name)
}
