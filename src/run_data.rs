//! Run control and name-keyed run-data queries.
//!
//! Counter semantics: realtime and livetime are 48-bit tick counters with a
//! 500 ns tick; trigger and event totals are 32-bit. Rates are derived
//! host-side from the same statistics block so that one query sees one
//! consistent snapshot.

use crate::command::CommandCode;
use crate::constants::{BASELINE_HISTORY_LEN, PRESET_CLOCK_TICK};
use crate::device::Udxp;
use crate::error::DxpError;
use crate::units;

/// Data bytes in a statistics response.
const STATISTICS_LEN: usize = 20;

/// One consistent statistics snapshot for a channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleStatistics {
    /// Elapsed wall-clock time of the run, in seconds.
    pub realtime: f64,
    /// Energy-filter live time, in seconds.
    pub livetime: f64,
    /// Fast-filter triggers seen during the run.
    pub triggers: u32,
    /// Events binned into the MCA during the run.
    pub events: u32,
    /// Input count rate in counts/s (triggers over livetime).
    pub input_count_rate: f64,
    /// Output count rate in counts/s (events over realtime).
    pub output_count_rate: f64,
}

impl ModuleStatistics {
    /// Parses the 20-byte statistics block: two 48-bit tick counters
    /// followed by two 32-bit totals, all little-endian.
    pub fn parse(data: &[u8]) -> Result<ModuleStatistics, DxpError> {
        if data.len() < STATISTICS_LEN {
            return Err(DxpError::TruncatedResponse {
                expected: STATISTICS_LEN,
                actual: data.len(),
            });
        }
        let realtime = units::u48_le(&data[0..6]) as f64 * PRESET_CLOCK_TICK;
        let livetime = units::u48_le(&data[6..12]) as f64 * PRESET_CLOCK_TICK;
        let triggers = u32::from_le_bytes([data[12], data[13], data[14], data[15]]);
        let events = u32::from_le_bytes([data[16], data[17], data[18], data[19]]);

        let input_count_rate = if livetime > 0.0 {
            triggers as f64 / livetime
        } else {
            0.0
        };
        let output_count_rate = if realtime > 0.0 {
            events as f64 / realtime
        } else {
            0.0
        };

        Ok(ModuleStatistics {
            realtime,
            livetime,
            triggers,
            events,
            input_count_rate,
            output_count_rate,
        })
    }
}

/// Output of a dispatched run-data query.
#[derive(Debug, Clone, PartialEq)]
pub enum RunData {
    Double(f64),
    /// MCA spectrum, one count per bin.
    Counts(Vec<u32>),
    /// Raw 16-bit word buffers (baseline, baseline history).
    Words(Vec<u16>),
    Statistics(ModuleStatistics),
}

impl Udxp {
    /// Starts a run on the channel. `resume` keeps the existing spectrum;
    /// otherwise the MCA is cleared first.
    pub fn start_run(&mut self, chan: usize, resume: bool) -> Result<(), DxpError> {
        self.command(chan, CommandCode::StartRun, &[resume as u8], 1)?;
        Ok(())
    }

    pub fn stop_run(&mut self, chan: usize) -> Result<(), DxpError> {
        self.command(chan, CommandCode::StopRun, &[], 1)?;
        Ok(())
    }

    /// Reads one statistics snapshot.
    pub fn statistics(&mut self, chan: usize) -> Result<ModuleStatistics, DxpError> {
        let data = self.command(chan, CommandCode::ReadStatistics, &[], STATISTICS_LEN)?;
        ModuleStatistics::parse(&data)
    }

    /// Statistics latched by the last snapshot command.
    pub fn snapshot_statistics(&mut self, chan: usize) -> Result<ModuleStatistics, DxpError> {
        if !self.version().supports_snapshot() {
            return Err(DxpError::NotSupported("snapshot_statistics"));
        }
        let data = self.command(chan, CommandCode::ReadSnapshotStats, &[], STATISTICS_LEN)?;
        ModuleStatistics::parse(&data)
    }

    /// Reads the MCA spectrum at the current sizing (`number_mca_channels`
    /// bins of `bytes_per_bin` bytes each).
    pub fn mca(&mut self, chan: usize) -> Result<Vec<u32>, DxpError> {
        let nbins = self.get_acquisition_value(chan, "number_mca_channels")? as usize;
        let bpb = self.get_acquisition_value(chan, "bytes_per_bin")? as usize;
        let data = self.command(chan, CommandCode::ReadMca, &[], nbins * bpb)?;
        Ok(unpack_bins(&data, bpb))
    }

    /// Spectrum latched by the last snapshot command.
    pub fn snapshot_mca(&mut self, chan: usize) -> Result<Vec<u32>, DxpError> {
        if !self.version().supports_snapshot() {
            return Err(DxpError::NotSupported("snapshot_mca"));
        }
        let nbins = self.get_acquisition_value(chan, "number_mca_channels")? as usize;
        let bpb = self.get_acquisition_value(chan, "bytes_per_bin")? as usize;
        let data = self.command(chan, CommandCode::ReadSnapshotMca, &[], nbins * bpb)?;
        Ok(unpack_bins(&data, bpb))
    }

    /// Reads the current baseline filter output buffer.
    pub fn baseline(&mut self, chan: usize) -> Result<Vec<u16>, DxpError> {
        let words = self.get_acquisition_value(chan, "baseline_length")? as usize;
        let data = self.command(chan, CommandCode::ReadBaseline, &[], words * 2)?;
        Ok(unpack_words(&data))
    }

    /// Reads the rolling baseline history buffer.
    pub fn baseline_history(&mut self, chan: usize) -> Result<Vec<u16>, DxpError> {
        let data = self.command(
            chan,
            CommandCode::ReadBaselineHistory,
            &[],
            BASELINE_HISTORY_LEN * 2,
        )?;
        Ok(unpack_words(&data))
    }

    /// Name-keyed run-data dispatch. Names match exactly. The scalar
    /// statistics names all derive from one fresh statistics read.
    pub fn execute_run_data_query(&mut self, chan: usize, name: &str) -> Result<RunData, DxpError> {
        match name {
            "run_active" => {
                let status = self.hardware_status(chan)?;
                Ok(RunData::Double(if status.run_active { 1.0 } else { 0.0 }))
            }
            "realtime" => Ok(RunData::Double(self.statistics(chan)?.realtime)),
            "livetime" => Ok(RunData::Double(self.statistics(chan)?.livetime)),
            "input_count_rate" => Ok(RunData::Double(self.statistics(chan)?.input_count_rate)),
            "output_count_rate" => Ok(RunData::Double(self.statistics(chan)?.output_count_rate)),
            "triggers" => Ok(RunData::Double(self.statistics(chan)?.triggers as f64)),
            "events_in_run" => Ok(RunData::Double(self.statistics(chan)?.events as f64)),
            "module_statistics" => Ok(RunData::Statistics(self.statistics(chan)?)),
            "mca_length" => {
                let nbins = self.get_acquisition_value(chan, "number_mca_channels")?;
                Ok(RunData::Double(nbins))
            }
            "mca" => Ok(RunData::Counts(self.mca(chan)?)),
            "snapshot_mca" => Ok(RunData::Counts(self.snapshot_mca(chan)?)),
            "snapshot_statistics" => Ok(RunData::Statistics(self.snapshot_statistics(chan)?)),
            "baseline" => Ok(RunData::Words(self.baseline(chan)?)),
            "baseline_history" => Ok(RunData::Words(self.baseline_history(chan)?)),
            _ => Err(DxpError::UnknownRunData(name.to_owned())),
        }
    }
}

/// Reassembles little-endian `bpb`-byte bins into counts.
fn unpack_bins(data: &[u8], bpb: usize) -> Vec<u32> {
    data.chunks_exact(bpb)
        .map(|bin| {
            bin.iter()
                .enumerate()
                .fold(0u32, |acc, (i, b)| acc | ((*b as u32) << (8 * i)))
        })
        .collect()
}

fn unpack_words(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect()
}
