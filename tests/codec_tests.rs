//! Frame encoding and response validation against hand-built byte vectors.

mod common;

use common::*;
use microdxp::command::{self, Response};

#[test]
fn encode_status_command_with_empty_payload() {
    let frame = command::encode(CommandCode::Status, &[]);
    assert_eq!(frame, vec![0x1B, 0x4B, 0x00, 0x00, 0x4B]);
}

#[test]
fn encode_covers_payload_in_checksum() {
    let frame = command::encode(CommandCode::ReadWriteDspParam, &[0x00, 0x04]);
    assert_eq!(&frame[..4], &[0x1B, 0x43, 0x02, 0x00]);
    assert_eq!(*frame.last().unwrap(), 0x43 ^ 0x02 ^ 0x00 ^ 0x00 ^ 0x04);
}

#[test]
fn validate_accepts_well_formed_reply() {
    let frame = reply_frame(CommandCode::GetTemperature, 0, &[0x1C, 0x80]);
    let response = Response::validate(CommandCode::GetTemperature, &[], &frame).unwrap();
    assert_eq!(response.status, 0);
    assert_eq!(&response.data[..], &[0x1C, 0x80]);
}

#[test]
fn validate_rejects_missing_escape_first() {
    let mut frame = reply_frame(CommandCode::Status, 0, &[0, 0, 0, 0]);
    frame[0] = 0x00;
    // The command echo is also wrong here; the escape check must win.
    frame[1] = 0xEE;
    let err = Response::validate(CommandCode::Status, &[], &frame).unwrap_err();
    assert!(matches!(err, DxpError::MissingEscape));
}

#[test]
fn validate_rejects_command_echo_mismatch() {
    let frame = reply_frame(CommandCode::Status, 0, &[0, 0, 0, 0]);
    let err = Response::validate(CommandCode::GetBoardInfo, &[], &frame).unwrap_err();
    assert!(matches!(
        err,
        DxpError::CommandMismatch {
            sent: 0x49,
            echoed: 0x4B
        }
    ));
}

#[test]
fn validate_rejects_length_overrunning_buffer() {
    let mut frame = reply_frame(CommandCode::Status, 0, &[0, 0, 0, 0]);
    frame[2] = 0xFF; // declare far more payload than the buffer holds
    let err = Response::validate(CommandCode::Status, &[], &frame).unwrap_err();
    assert!(matches!(
        err,
        DxpError::LengthOverrun {
            declared: 0xFF,
            capacity: 10
        }
    ));
}

#[test]
fn validate_rejects_corrupted_checksum() {
    let mut frame = reply_frame(CommandCode::Status, 0, &[0, 0, 0, 0]);
    let last = frame.len() - 1;
    frame[last] ^= 0xA5;
    let err = Response::validate(CommandCode::Status, &[], &frame).unwrap_err();
    assert!(matches!(err, DxpError::ChecksumMismatch { .. }));
}

#[test]
fn validate_flags_corrupt_payload_via_checksum() {
    let mut frame = reply_frame(CommandCode::GetSerialNumber, 0, &[0x41; 16]);
    frame[7] ^= 0x01;
    let err = Response::validate(CommandCode::GetSerialNumber, &[], &frame).unwrap_err();
    assert!(matches!(err, DxpError::ChecksumMismatch { .. }));
}

#[test]
fn every_single_byte_corruption_is_rejected() {
    let frame = reply_frame(CommandCode::Status, 0, &[0x10, 0x20, 0x30, 0x40]);

    for i in 0..frame.len() {
        let mut corrupted = frame.clone();
        corrupted[i] ^= 0x01;
        let err = Response::validate(CommandCode::Status, &[], &corrupted).unwrap_err();
        match i {
            0 => assert!(matches!(err, DxpError::MissingEscape), "byte {i}: {err}"),
            1 => assert!(
                matches!(err, DxpError::CommandMismatch { .. }),
                "byte {i}: {err}"
            ),
            // Shrinking the low length byte moves the checksum position;
            // growing the high byte overruns the buffer.
            3 => assert!(
                matches!(err, DxpError::LengthOverrun { .. }),
                "byte {i}: {err}"
            ),
            // Status, payload, checksum and the shrunk-length case all
            // surface as a checksum mismatch.
            _ => assert!(
                matches!(err, DxpError::ChecksumMismatch { .. }),
                "byte {i}: {err}"
            ),
        }
    }
}

#[test]
fn validate_maps_dsp_error_status() {
    let frame = reply_frame(CommandCode::StartRun, 77, &[]);
    let err = Response::validate(CommandCode::StartRun, &[0], &frame).unwrap_err();
    assert!(matches!(err, DxpError::DspStatus));
}

#[test]
fn validate_maps_generic_error_status() {
    let frame = reply_frame(CommandCode::StartRun, 5, &[]);
    let err = Response::validate(CommandCode::StartRun, &[0], &frame).unwrap_err();
    assert!(matches!(err, DxpError::DeviceStatus(5)));
}

#[test]
fn validate_checks_run_in_declared_order() {
    // Both the checksum and the status byte are bad; the checksum check
    // comes first.
    let mut frame = reply_frame(CommandCode::StopRun, 5, &[]);
    let last = frame.len() - 1;
    frame[last] ^= 0x01;
    let err = Response::validate(CommandCode::StopRun, &[], &frame).unwrap_err();
    assert!(matches!(err, DxpError::ChecksumMismatch { .. }));
}

#[test]
fn validate_rejects_short_buffer() {
    let err = Response::validate(CommandCode::Status, &[], &[0x1B, 0x4B]).unwrap_err();
    assert!(matches!(
        err,
        DxpError::TruncatedResponse {
            expected: 5,
            actual: 2
        }
    ));
}

#[test]
fn validate_rejects_zero_declared_length() {
    // A frame that declares no payload at all cannot carry a status byte.
    let mut frame = vec![0x1B, 0x4B, 0x00, 0x00];
    frame.push(checksum(&frame[1..]));
    frame.push(0x00); // padding so capacity exceeds the minimum
    let err = Response::validate(CommandCode::Status, &[], &frame).unwrap_err();
    assert!(matches!(err, DxpError::TruncatedResponse { .. }));
}
