//! Board operations and run-data queries end to end against scripted frames.

mod common;

use common::*;
use microdxp::{BoardOperationOutput, RunData};

#[test]
fn serial_number_trims_trailing_nuls() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    let mut serial = [0u8; 16];
    serial[..5].copy_from_slice(b"X1234");
    handle.queue_reply(CommandCode::GetSerialNumber, &serial);

    let out = dev.execute_board_operation(0, "get_serial_number", &[]).unwrap();
    assert_eq!(out, BoardOperationOutput::Text("X1234".to_owned()));
}

#[test]
fn non_printable_serial_is_hex_encoded() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    let serial = [0x01u8; 16];
    handle.queue_reply(CommandCode::GetSerialNumber, &serial);

    let out = dev.serial_number(0).unwrap();
    assert_eq!(out, "01".repeat(16));
}

#[test]
fn temperature_is_signed_eight_eight_fixed_point() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    handle.queue_reply(CommandCode::GetTemperature, &[0x1C, 0x80]);
    assert_eq!(dev.temperature(0).unwrap(), 28.5);

    handle.queue_reply(CommandCode::GetTemperature, &[0xFF, 0x80]);
    assert_eq!(dev.temperature(0).unwrap(), -0.5);
}

#[test]
fn hardware_status_reflects_run_flag() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    handle.queue_reply(CommandCode::Status, &[0, 0, 1, 0]);

    let status = dev.hardware_status(0).unwrap();
    assert!(status.run_active);
    assert_eq!(status.pic_status, 0);
}

#[test]
fn save_slot_numbers_are_validated() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    handle.queue_reply(CommandCode::SaveParset, &[0]);
    dev.save_parset(0, 4).unwrap();

    assert!(dev.save_parset(0, 5).is_err());
    assert!(dev.save_genset(0, 5).is_err());
}

#[test]
fn passthrough_requires_capable_firmware() {
    let (mut dev, handle) = serial_device(PIC_STANDARD, DSP_LEGACY);
    handle.queue_reply(CommandCode::Echo, &[0x01]);
    dev.command(0, CommandCode::Echo, &[0x01], 1).unwrap();

    assert!(matches!(
        dev.passthrough(0, &[0xAB], 2).unwrap_err(),
        DxpError::NotSupported("passthrough")
    ));
}

#[test]
fn passthrough_forwards_payload_and_reply_length() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    handle.queue_reply(CommandCode::Passthrough, &[0x11, 0x22]);

    let reply = dev.passthrough(0, &[0xAB, 0xCD], 2).unwrap();
    assert_eq!(reply, vec![0x11, 0x22]);

    let (_, frame) = handle.last_write();
    // Expected reply length byte then the raw payload.
    assert_eq!(&frame[4..7], &[2, 0xAB, 0xCD]);

    assert!(matches!(
        dev.passthrough(0, &[0u8; 33], 2).unwrap_err(),
        DxpError::PassthroughTooLong(33)
    ));
}

#[test]
fn unknown_board_operation_is_rejected() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    handle.queue_reply(CommandCode::Echo, &[0x01]);
    dev.command(0, CommandCode::Echo, &[0x01], 1).unwrap();

    assert!(matches!(
        dev.execute_board_operation(0, "defragment", &[]).unwrap_err(),
        DxpError::UnknownBoardOperation(name) if name == "defragment"
    ));
}

#[test]
fn run_control_frames_carry_the_resume_flag() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);

    handle.queue_reply(CommandCode::StartRun, &[0]);
    dev.start_run(0, false).unwrap();
    let (_, frame) = handle.last_write();
    assert_eq!(frame[4], 0);

    handle.queue_reply(CommandCode::StartRun, &[1]);
    dev.start_run(0, true).unwrap();
    let (_, frame) = handle.last_write();
    assert_eq!(frame[4], 1);

    handle.queue_reply(CommandCode::StopRun, &[0]);
    dev.stop_run(0).unwrap();
}

fn statistics_block() -> Vec<u8> {
    let mut block = vec![0u8; 20];
    block[0..6].copy_from_slice(&[0x80, 0x84, 0x1E, 0x00, 0x00, 0x00]); // 1.0 s
    block[6..12].copy_from_slice(&[0x40, 0x42, 0x0F, 0x00, 0x00, 0x00]); // 0.5 s
    block[12..16].copy_from_slice(&1000u32.to_le_bytes());
    block[16..20].copy_from_slice(&800u32.to_le_bytes());
    block
}

#[test]
fn module_statistics_query_parses_one_snapshot() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    handle.queue_reply(CommandCode::ReadStatistics, &statistics_block());

    let RunData::Statistics(stats) = dev
        .execute_run_data_query(0, "module_statistics")
        .unwrap()
    else {
        panic!("expected statistics variant");
    };
    assert_eq!(stats.realtime, 1.0);
    assert_eq!(stats.livetime, 0.5);
    assert_eq!(stats.triggers, 1000);
    assert_eq!(stats.events, 800);
    assert_eq!(stats.input_count_rate, 2000.0);
    assert_eq!(stats.output_count_rate, 800.0);
}

#[test]
fn scalar_statistics_queries_derive_from_the_same_block() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);

    handle.queue_reply(CommandCode::ReadStatistics, &statistics_block());
    assert_eq!(
        dev.execute_run_data_query(0, "realtime").unwrap(),
        RunData::Double(1.0)
    );

    handle.queue_reply(CommandCode::ReadStatistics, &statistics_block());
    assert_eq!(
        dev.execute_run_data_query(0, "input_count_rate").unwrap(),
        RunData::Double(2000.0)
    );
}

#[test]
fn mca_read_uses_configured_sizing() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);

    handle.queue_reply(CommandCode::NumBins, &[0x00, 0x01]); // 256 bins
    dev.set_acquisition_value(0, "number_mca_channels", 256.0)
        .unwrap();
    dev.set_acquisition_value(0, "bytes_per_bin", 1.0).unwrap();

    let spectrum: Vec<u8> = (0..=255).collect();
    handle.queue_reply(CommandCode::ReadMca, &spectrum);

    let RunData::Counts(counts) = dev.execute_run_data_query(0, "mca").unwrap() else {
        panic!("expected counts variant");
    };
    assert_eq!(counts.len(), 256);
    assert_eq!(counts[0], 0);
    assert_eq!(counts[255], 255);
}

#[test]
fn baseline_read_uses_the_configured_length() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);

    handle.queue_reply(CommandCode::BaselineFilter, &[0x00, 0x01]);
    dev.set_acquisition_value(0, "baseline_length", 256.0).unwrap();

    let raw: Vec<u8> = (0..512).map(|i| (i % 256) as u8).collect();
    handle.queue_reply(CommandCode::ReadBaseline, &raw);

    let RunData::Words(words) = dev.execute_run_data_query(0, "baseline").unwrap() else {
        panic!("expected words variant");
    };
    assert_eq!(words.len(), 256);
    assert_eq!(words[0], 0x0100);
}

#[test]
fn snapshot_queries_need_the_firmware_gate() {
    let (mut dev, handle) = serial_device(PIC_STANDARD, DSP_LEGACY);
    handle.queue_reply(CommandCode::Echo, &[0x01]);
    dev.command(0, CommandCode::Echo, &[0x01], 1).unwrap();

    assert!(matches!(
        dev.snapshot(0, true).unwrap_err(),
        DxpError::NotSupported("snapshot")
    ));
    assert!(matches!(
        dev.execute_run_data_query(0, "snapshot_statistics").unwrap_err(),
        DxpError::NotSupported(_)
    ));
}

#[test]
fn snapshot_latch_carries_the_clear_flag() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    handle.queue_reply(CommandCode::Snapshot, &[0]);

    dev.snapshot(0, true).unwrap();
    let (_, frame) = handle.last_write();
    assert_eq!(frame[4], 1);

    handle.queue_reply(CommandCode::ReadSnapshotStats, &statistics_block());
    let stats = dev.snapshot_statistics(0).unwrap();
    assert_eq!(stats.events, 800);
}

#[test]
fn unknown_run_data_name_is_rejected() {
    let (mut dev, handle) = serial_device(PIC_SUPERMICRO, DSP_CURRENT);
    handle.queue_reply(CommandCode::Echo, &[0x01]);
    dev.command(0, CommandCode::Echo, &[0x01], 1).unwrap();

    assert!(matches!(
        dev.execute_run_data_query(0, "sparkline").unwrap_err(),
        DxpError::UnknownRunData(name) if name == "sparkline"
    ));
}
