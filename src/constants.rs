// Board and protocol constants for the microDXP family.

/// Version bytes reported by the board-info command (26 data bytes).
pub const BOARD_INFO_LEN: usize = 26;

/// Data bytes in a hardware status response.
pub const STATUS_LEN: usize = 4;

/// Serial number length in bytes.
pub const SERIAL_NUM_LEN: usize = 16;

/// USB2 address that releases the IDMA bus back to the PIC.
pub const RELEASE_IDMA_BUS_ADDR: u32 = 0x8001;

/// Default/undecimated system clock in MHz.
pub const BASE_CLOCK_MHZ: f64 = 32.0;

/// Non-supermicro decay time clock in MHz.
pub const DECAY_TIME_CLOCK_MHZ: f64 = 8.0;

/// Tick size for livetime, realtime and time presets, in seconds.
pub const PRESET_CLOCK_TICK: f64 = 500.0e-9;

/// Gain register scaling: the 16-bit gain DAC spans 40 dB.
pub const DB_PER_LSB: f64 = 40.0 / 65535.0;

/// Linear gain limits for the `gain` acquisition value.
pub const GAIN_LINEAR_MIN: f64 = 1.0;
pub const GAIN_LINEAR_MAX: f64 = 100.0;

/// Linear limits for the `gain_trim` acquisition value.
pub const GAIN_TRIM_LINEAR_MIN: f64 = 0.5;
pub const GAIN_TRIM_LINEAR_MAX: f64 = 2.0;

/// Switched gain (SWGAIN) to variable gain (V/V) lookup table.
pub const VARIABLE_GAIN_LUT: [f64; 16] = [
    1.217, 1.476, 1.806, 2.186, 2.659, 3.226, 3.947, 4.777, 5.772, 7.003, 8.567, 10.37, 12.82,
    15.56, 19.03, 23.04,
];

/// High/low switched gain to variable gain lookup table.
pub const HIGHLOW_GAIN_LUT: [f64; 2] = [2.0, 4.02];

/// Threshold register limits; supermicro boards carry 12-bit fields.
pub const MAX_THRESHOLD_STD: f64 = 255.0;
pub const MAX_THRESHOLD_SUPER: f64 = 4095.0;

/// Filter register limit for length-type parameters.
pub fn max_filter_param(supermicro: bool) -> u16 {
    if supermicro { 0x3FF } else { 0xFF }
}

/// Filter register limit for the wider peak interval/sampling timers.
pub fn max_filter_timer(supermicro: bool) -> u16 {
    if supermicro { 0xFFF } else { 0xFF }
}

/// MCA sizing limits.
pub const MIN_NUM_BINS: f64 = 256.0;
pub const MAX_NUM_BINS: f64 = 8192.0;
pub const MIN_BIN_WIDTH: f64 = 1.0;
pub const MAX_BIN_WIDTH: f64 = 255.0;
pub const MIN_BYTES_PER_BIN: f64 = 1.0;
pub const MAX_BYTES_PER_BIN: f64 = 3.0;

/// Baseline filter length limits, in 16-bit words.
pub const MIN_BASELINE_LEN: f64 = 8.0;
pub const MAX_BASELINE_LEN: f64 = 1024.0;

/// ADC trace wait window, in microseconds.
pub const MAX_TRACEWAIT_US: f64 = 512.0;

/// Number of PARSET slots per FiPPI.
pub const NUM_PARSETS: usize = 5;
pub const NUM_GENSETS: usize = 5;
pub const NUM_FIPPIS: usize = 3;

/// Internal SCA counts; firmware past [`MIN_UPDATED_SCA_CODEREV`] widens the
/// table.
pub const MAX_NUM_INTERNAL_SCA: usize = 4;
pub const MAX_NUM_INTERNAL_SCA_HI: usize = 16;

/// Preset run types.
pub const PRESET_STANDARD: u8 = 0;
pub const PRESET_REALTIME: u8 = 1;
pub const PRESET_LIVETIME: u8 = 2;
pub const PRESET_OUTPUT_COUNTS: u8 = 3;
pub const PRESET_INPUT_COUNTS: u8 = 4;

/// Decay time register limit.
pub const MAX_DECAY_TIME: f64 = 65535.0;

/// Reset interval register limit, in microseconds.
pub const MAX_RESET_INTERVAL: f64 = 255.0;

/// Largest UART passthrough transfer.
pub const MAX_PASSTHROUGH_SIZE: usize = 32;

/// Baseline history length in 16-bit words.
pub const BASELINE_HISTORY_LEN: usize = 1024;

/// DSP code revision gates, compared against `(major << 8) | minor`.
pub const MIN_SCA_SUPPORT_CODEREV: u16 = 0x0406;
pub const MIN_UPDATED_SCA_CODEREV: u16 = 0x0520;
pub const MIN_UPDATED_PRESET_CODEREV: u16 = 0x0431;
pub const MIN_SNAPSHOT_SUPPORT_CODEREV: u16 = 0x0431;
pub const MIN_PASSTHROUGH_SUPPORT_CODEREV: u16 = 0x0576;

/// DSP parameter memory addresses used by the acquisition layer. These track
/// the production DSP code layout.
pub const DSP_PARAM_DECIMATION: u16 = 0x0004;
