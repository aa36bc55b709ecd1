//! Named board operations: one-shot maintenance and identity commands that
//! sit outside the acquisition-value table.

use crate::command::CommandCode;
use crate::constants::{
    BOARD_INFO_LEN, MAX_PASSTHROUGH_SIZE, NUM_GENSETS, NUM_PARSETS, SERIAL_NUM_LEN, STATUS_LEN,
};
use crate::device::Udxp;
use crate::error::DxpError;

/// Snapshot of the hardware status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareStatus {
    pub pic_status: u8,
    pub dsp_boot_status: u8,
    pub run_active: bool,
    pub flags: u8,
}

/// Output of a dispatched board operation.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardOperationOutput {
    None,
    Text(String),
    Temperature(f64),
    Status(HardwareStatus),
    Bytes(Vec<u8>),
}

impl Udxp {
    /// Commits staged DAC/register changes to the analog front end.
    pub fn apply(&mut self, chan: usize) -> Result<(), DxpError> {
        self.command(chan, CommandCode::Apply, &[0x00], 1)?;
        Ok(())
    }

    /// Saves the live PARSET registers into the given flash slot.
    pub fn save_parset(&mut self, chan: usize, slot: u8) -> Result<(), DxpError> {
        if slot as usize >= NUM_PARSETS {
            return Err(DxpError::ValueOutOfRange {
                name: "parset",
                value: slot as f64,
                min: 0.0,
                max: (NUM_PARSETS - 1) as f64,
            });
        }
        self.command(chan, CommandCode::SaveParset, &[slot], 1)?;
        Ok(())
    }

    /// Saves the live GENSET registers into the given flash slot.
    pub fn save_genset(&mut self, chan: usize, slot: u8) -> Result<(), DxpError> {
        if slot as usize >= NUM_GENSETS {
            return Err(DxpError::ValueOutOfRange {
                name: "genset",
                value: slot as f64,
                min: 0.0,
                max: (NUM_GENSETS - 1) as f64,
            });
        }
        self.command(chan, CommandCode::SaveGenset, &[slot], 1)?;
        Ok(())
    }

    /// Reads the factory serial number. Non-printable serials are reported
    /// hex-encoded rather than lossily.
    pub fn serial_number(&mut self, chan: usize) -> Result<String, DxpError> {
        let data = self.command(chan, CommandCode::GetSerialNumber, &[], SERIAL_NUM_LEN)?;
        let trimmed: Vec<u8> = data.iter().copied().take_while(|b| *b != 0).collect();
        match String::from_utf8(trimmed) {
            Ok(s) if s.chars().all(|c| !c.is_control()) => Ok(s),
            _ => Ok(hex::encode(&data[..])),
        }
    }

    /// Board temperature in degrees Celsius (signed 8.8 fixed point).
    pub fn temperature(&mut self, chan: usize) -> Result<f64, DxpError> {
        let data = self.command(chan, CommandCode::GetTemperature, &[], 2)?;
        if data.len() < 2 {
            return Err(DxpError::TruncatedResponse {
                expected: 2,
                actual: data.len(),
            });
        }
        Ok(parse_temperature(data[0], data[1]))
    }

    /// Raw board-info block (firmware versions, hardware revision, gain and
    /// clock configuration).
    pub fn board_info(&mut self, chan: usize) -> Result<Vec<u8>, DxpError> {
        let data = self.command(chan, CommandCode::GetBoardInfo, &[], BOARD_INFO_LEN)?;
        Ok(data.to_vec())
    }

    /// Current PIC/DSP status flags.
    pub fn hardware_status(&mut self, chan: usize) -> Result<HardwareStatus, DxpError> {
        let data = self.command(chan, CommandCode::Status, &[], STATUS_LEN)?;
        if data.len() < STATUS_LEN {
            return Err(DxpError::TruncatedResponse {
                expected: STATUS_LEN,
                actual: data.len(),
            });
        }
        Ok(HardwareStatus {
            pic_status: data[0],
            dsp_boot_status: data[1],
            run_active: data[2] != 0,
            flags: data[3],
        })
    }

    /// Forwards raw bytes to a device hanging off the auxiliary UART and
    /// returns its reply. Requires passthrough-capable DSP code.
    pub fn passthrough(
        &mut self,
        chan: usize,
        send: &[u8],
        reply_len: usize,
    ) -> Result<Vec<u8>, DxpError> {
        if !self.version().supports_passthrough() {
            return Err(DxpError::NotSupported("passthrough"));
        }
        if send.len() > MAX_PASSTHROUGH_SIZE || reply_len > MAX_PASSTHROUGH_SIZE {
            return Err(DxpError::PassthroughTooLong(send.len().max(reply_len)));
        }
        let mut frame = Vec::with_capacity(send.len() + 1);
        frame.push(reply_len as u8);
        frame.extend_from_slice(send);
        let data = self.command(chan, CommandCode::Passthrough, &frame, reply_len)?;
        Ok(data.to_vec())
    }

    /// Latches the current spectrum and statistics into the snapshot buffer,
    /// optionally clearing the live spectrum.
    pub fn snapshot(&mut self, chan: usize, clear: bool) -> Result<(), DxpError> {
        if !self.version().supports_snapshot() {
            return Err(DxpError::NotSupported("snapshot"));
        }
        self.command(chan, CommandCode::Snapshot, &[clear as u8], 1)?;
        Ok(())
    }

    /// Name-keyed board operation dispatch. Names match exactly; `args`
    /// carries the operation-specific payload (slot numbers, passthrough
    /// bytes).
    pub fn execute_board_operation(
        &mut self,
        chan: usize,
        name: &str,
        args: &[u8],
    ) -> Result<BoardOperationOutput, DxpError> {
        match name {
            "apply" => {
                self.apply(chan)?;
                Ok(BoardOperationOutput::None)
            }
            "save_parset" => {
                let slot = args.first().copied().unwrap_or(0);
                self.save_parset(chan, slot)?;
                Ok(BoardOperationOutput::None)
            }
            "save_genset" => {
                let slot = args.first().copied().unwrap_or(0);
                self.save_genset(chan, slot)?;
                Ok(BoardOperationOutput::None)
            }
            "get_serial_number" => Ok(BoardOperationOutput::Text(self.serial_number(chan)?)),
            "get_temperature" => Ok(BoardOperationOutput::Temperature(self.temperature(chan)?)),
            "get_board_info" => Ok(BoardOperationOutput::Bytes(self.board_info(chan)?)),
            "get_hardware_status" => {
                Ok(BoardOperationOutput::Status(self.hardware_status(chan)?))
            }
            "passthrough" => {
                let (reply_len, payload) = match args.split_first() {
                    Some((len, rest)) => (*len as usize, rest),
                    None => (0, &[][..]),
                };
                Ok(BoardOperationOutput::Bytes(self.passthrough(
                    chan,
                    payload,
                    reply_len,
                )?))
            }
            "snapshot" => {
                let clear = args.first().copied().unwrap_or(0) != 0;
                self.snapshot(chan, clear)?;
                Ok(BoardOperationOutput::None)
            }
            _ => Err(DxpError::UnknownBoardOperation(name.to_owned())),
        }
    }
}

/// Converts the two temperature bytes (signed integer part plus 1/256ths).
pub fn parse_temperature(integer: u8, fraction: u8) -> f64 {
    (integer as i8) as f64 + fraction as f64 / 256.0
}
