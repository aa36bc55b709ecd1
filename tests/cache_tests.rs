//! Acquisition-value cache coherence: synced reads skip hardware, bank
//! switches invalidate exactly their memory class, and name lookup is an
//! ordered prefix match.

mod common;

use common::*;
use microdxp::acquisition;

#[test]
fn get_after_set_serves_from_cache() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    handle.queue_reply(CommandCode::BinWidth, &[2]);

    let applied = dev.set_acquisition_value(0, "mca_bin_width", 2.0).unwrap();
    assert_eq!(applied, 2.0);
    let reads_after_set = handle.read_count();

    let value = dev.get_acquisition_value(0, "mca_bin_width").unwrap();
    assert_eq!(value, 2.0);
    assert_eq!(handle.read_count(), reads_after_set);
}

#[test]
fn genset_switch_invalidates_genset_values_only() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);

    handle.queue_reply(CommandCode::BinWidth, &[2]); // GENSET class
    handle.queue_reply(CommandCode::ResetInterval, &[10]); // GLOBAL class
    dev.set_acquisition_value(0, "mca_bin_width", 2.0).unwrap();
    dev.set_acquisition_value(0, "reset_interval", 10.0).unwrap();

    handle.queue_reply(CommandCode::Genset, &[1]);
    dev.set_acquisition_value(0, "genset", 1.0).unwrap();

    // The GENSET-backed value must be re-read from hardware...
    handle.queue_reply(CommandCode::BinWidth, &[3]);
    assert_eq!(dev.get_acquisition_value(0, "mca_bin_width").unwrap(), 3.0);

    // ...while the GLOBAL value stays cached.
    let reads = handle.read_count();
    assert_eq!(dev.get_acquisition_value(0, "reset_interval").unwrap(), 10.0);
    assert_eq!(handle.read_count(), reads);
}

#[test]
fn parset_switch_invalidates_parset_values_only() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);

    handle.queue_reply(CommandCode::Threshold, &[40, 0]); // PARSET+GENSET class
    handle.queue_reply(CommandCode::ResetInterval, &[10]); // GLOBAL class
    dev.set_acquisition_value(0, "trigger_threshold", 40.0).unwrap();
    dev.set_acquisition_value(0, "reset_interval", 10.0).unwrap();

    handle.queue_reply(CommandCode::Parset, &[1]);
    dev.set_acquisition_value(0, "parset", 1.0).unwrap();

    // Exactly one hardware read to refresh the dependent value.
    let reads = handle.read_count();
    handle.queue_reply(CommandCode::Threshold, &[50, 0]);
    assert_eq!(
        dev.get_acquisition_value(0, "trigger_threshold").unwrap(),
        50.0
    );
    assert_eq!(handle.read_count(), reads + 1);

    // The GLOBAL value survives the switch untouched.
    assert_eq!(dev.get_acquisition_value(0, "reset_interval").unwrap(), 10.0);
    assert_eq!(handle.read_count(), reads + 1);
}

#[test]
fn explicit_invalidate_honours_the_mask() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    handle.queue_reply(CommandCode::BinWidth, &[2]);
    dev.set_acquisition_value(0, "mca_bin_width", 2.0).unwrap();

    dev.invalidate(0, MemoryClass::PARSET);
    let reads = handle.read_count();
    dev.get_acquisition_value(0, "mca_bin_width").unwrap();
    assert_eq!(handle.read_count(), reads);

    dev.invalidate(0, MemoryClass::all());
    handle.queue_reply(CommandCode::BinWidth, &[2]);
    dev.get_acquisition_value(0, "mca_bin_width").unwrap();
    assert_eq!(handle.read_count(), reads + 1);
}

#[test]
fn channels_have_independent_caches() {
    let (transport, handle) = scripted(false);
    queue_bootstrap(&handle, PIC_SUPERMICRO, DSP_CURRENT);
    let mut dev = Udxp::new(0, 2, Box::new(transport));

    handle.queue_reply(CommandCode::BinWidth, &[2]);
    dev.set_acquisition_value(0, "mca_bin_width", 2.0).unwrap();

    // Channel 1 has nothing cached and must hit hardware.
    handle.queue_reply(CommandCode::BinWidth, &[4]);
    assert_eq!(dev.get_acquisition_value(1, "mca_bin_width").unwrap(), 4.0);
}

#[test]
fn lookup_prefers_longer_names_over_their_prefixes() {
    assert_eq!(acquisition::lookup("gain").unwrap().name, "gain");
    assert_eq!(acquisition::lookup("gain_trim").unwrap().name, "gain_trim");
    assert_eq!(acquisition::lookup("gain_mode").unwrap().name, "gain_mode");
    assert_eq!(acquisition::lookup("sca0_lo").unwrap().name, "sca");
    assert_eq!(acquisition::lookup("sca15_hi").unwrap().name, "sca");
    assert_eq!(
        acquisition::lookup("peaking_time").unwrap().name,
        "peaking_time"
    );
    assert!(acquisition::lookup("no_such_value").is_none());
}

#[test]
fn unknown_name_reports_not_found() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    handle.queue_reply(CommandCode::BinWidth, &[2]);
    dev.set_acquisition_value(0, "mca_bin_width", 2.0).unwrap();

    let err = dev.get_acquisition_value(0, "no_such_value").unwrap_err();
    assert!(matches!(err, DxpError::NotFound(name) if name == "no_such_value"));
}

#[test]
fn staged_values_defer_hardware_until_flush() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);

    dev.stage_acquisition_value(0, "reset_interval", 12.0).unwrap();
    dev.stage_acquisition_value(0, "mca_bin_width", 2.0).unwrap();
    assert_eq!(handle.read_count(), 0);

    // Pending values are visible to reads before any hardware traffic.
    assert_eq!(dev.get_acquisition_value(0, "mca_bin_width").unwrap(), 2.0);
    assert_eq!(handle.read_count(), 0);

    handle.queue_reply(CommandCode::BinWidth, &[2]);
    handle.queue_reply(CommandCode::ResetInterval, &[12]);
    dev.flush_staged(0).unwrap();

    // The flush applies in table order: bin width (0x84) precedes the
    // reset interval (0x8A) regardless of staging order.
    let writes = handle.writes();
    assert_eq!(writes[writes.len() - 2].1[1], 0x84);
    assert_eq!(writes[writes.len() - 1].1[1], 0x8A);

    // Both entries are synced now; reads stay cache-only.
    let reads = handle.read_count();
    assert_eq!(dev.get_acquisition_value(0, "reset_interval").unwrap(), 12.0);
    assert_eq!(handle.read_count(), reads);
}

#[test]
fn bank_switches_keep_pending_values() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);

    dev.stage_acquisition_value(0, "trigger_threshold", 60.0)
        .unwrap();
    handle.queue_reply(CommandCode::Genset, &[1]);
    dev.set_acquisition_value(0, "genset", 1.0).unwrap();

    // The pending write was never applied, so the switch must not discard
    // it: the staged value still reads back and still flushes.
    assert_eq!(
        dev.get_acquisition_value(0, "trigger_threshold").unwrap(),
        60.0
    );
    handle.queue_reply(CommandCode::Threshold, &[60, 0]);
    dev.flush_staged(0).unwrap();
    let (_, frame) = handle.last_write();
    assert_eq!(&frame[4..8], &[0x01, 0x00, 60, 0]);
}

#[test]
fn staging_an_unknown_name_reports_not_found() {
    let (mut dev, _handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    let err = dev
        .stage_acquisition_value(0, "no_such_value", 1.0)
        .unwrap_err();
    assert!(matches!(err, DxpError::NotFound(name) if name == "no_such_value"));
}

#[test]
fn failed_set_leaves_cache_untouched() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    handle.queue_reply(CommandCode::BinWidth, &[2]);
    dev.set_acquisition_value(0, "mca_bin_width", 2.0).unwrap();

    // Out of range: rejected before any hardware traffic.
    let reads = handle.read_count();
    dev.set_acquisition_value(0, "mca_bin_width", 999.0).unwrap_err();
    assert_eq!(handle.read_count(), reads);
    assert_eq!(dev.get_acquisition_value(0, "mca_bin_width").unwrap(), 2.0);
}
