//! Control Request Tests
//!
//! Tests for the CDC class request handler and the serial-state notification.

use cdc_vcom::cdc::control::{
    GET_LINE_CODING, NOTIFY_REQUEST_TYPE, NOTIFY_SERIAL_STATE, SET_CONTROL_LINE_STATE, SET_LINE_CODING,
};
use cdc_vcom::cdc::{handle_control_request, ControlResponse, SerialStateNotification};
use cdc_vcom::types::{ControlSignals, SetupPacket};

const LINE_CODING_115200_8N1: [u8; 7] = [0x00, 0xC2, 0x01, 0x00, 0x00, 0x00, 0x08];

// =============================================================================
// SET_CONTROL_LINE_STATE
// =============================================================================

#[test]
fn line_state_dtr_set() {
    let setup = SetupPacket::class_out(SET_CONTROL_LINE_STATE, 0x0001, 0, 0);
    match handle_control_request(&setup) {
        ControlResponse::LineState { signals, .. } => {
            assert!(signals.connected());
            assert!(!signals.rts);
        }
        other => panic!("unexpected response {other:?}"),
    }
}

#[test]
fn line_state_dtr_clear() {
    let setup = SetupPacket::class_out(SET_CONTROL_LINE_STATE, 0x0000, 0, 0);
    match handle_control_request(&setup) {
        ControlResponse::LineState { signals, .. } => assert!(!signals.connected()),
        other => panic!("unexpected response {other:?}"),
    }
}

#[test]
fn line_state_only_bit0_means_connected() {
    // RTS alone does not open the port
    let setup = SetupPacket::class_out(SET_CONTROL_LINE_STATE, 0x0002, 0, 0);
    match handle_control_request(&setup) {
        ControlResponse::LineState { signals, .. } => {
            assert!(!signals.connected());
            assert!(signals.rts);
        }
        other => panic!("unexpected response {other:?}"),
    }

    // Upper bits are ignored
    let setup = SetupPacket::class_out(SET_CONTROL_LINE_STATE, 0xFF01, 0, 0);
    match handle_control_request(&setup) {
        ControlResponse::LineState { signals, .. } => assert!(signals.connected()),
        other => panic!("unexpected response {other:?}"),
    }
}

#[test]
fn line_state_builds_notification() {
    let setup = SetupPacket::class_out(SET_CONTROL_LINE_STATE, 0x0003, 0, 0);
    match handle_control_request(&setup) {
        ControlResponse::LineState { notification, .. } => assert_eq!(notification.state(), 0x0003),
        other => panic!("unexpected response {other:?}"),
    }
}

// =============================================================================
// Line Coding
// =============================================================================

#[test]
fn get_line_coding_returns_115200_8n1() {
    let setup = SetupPacket::class_in(GET_LINE_CODING, 0, 0, 7);
    assert_eq!(
        handle_control_request(&setup),
        ControlResponse::Data(LINE_CODING_115200_8N1)
    );
}

#[test]
fn set_line_coding_accepted_and_ignored() {
    let set = SetupPacket::class_out(SET_LINE_CODING, 0, 0, 7);
    assert_eq!(handle_control_request(&set), ControlResponse::Accepted);

    // A later GET still reports the fixed coding
    let get = SetupPacket::class_in(GET_LINE_CODING, 0, 0, 7);
    assert_eq!(
        handle_control_request(&get),
        ControlResponse::Data(LINE_CODING_115200_8N1)
    );
}

#[test]
fn set_line_coding_short_length_not_supported() {
    let setup = SetupPacket::class_out(SET_LINE_CODING, 0, 0, 6);
    let response = handle_control_request(&setup);
    assert_eq!(response, ControlResponse::NotSupported);
    assert!(!response.is_handled());
}

#[test]
fn set_line_coding_longer_length_accepted() {
    let setup = SetupPacket::class_out(SET_LINE_CODING, 0, 0, 16);
    assert!(handle_control_request(&setup).is_handled());
}

// =============================================================================
// Unknown Requests
// =============================================================================

#[test]
fn unknown_request_not_supported() {
    // SEND_BREAK
    let setup = SetupPacket::class_out(0x23, 0, 0, 0);
    assert_eq!(handle_control_request(&setup), ControlResponse::NotSupported);

    // SEND_ENCAPSULATED_COMMAND
    let setup = SetupPacket::class_out(0x00, 0, 0, 0);
    assert_eq!(handle_control_request(&setup), ControlResponse::NotSupported);
}

// =============================================================================
// Serial State Notification
// =============================================================================

#[test]
fn notification_wire_format() {
    let notification = SerialStateNotification::new(0, ControlSignals::from_value(0x0001));
    assert_eq!(
        notification.to_bytes(),
        [NOTIFY_REQUEST_TYPE, NOTIFY_SERIAL_STATE, 0, 0, 0, 0, 2, 0, 0x01, 0x00]
    );
}

#[test]
fn notification_carries_interface() {
    let notification = SerialStateNotification::new(0x0102, ControlSignals::from_value(0x0003));
    let bytes = notification.to_bytes();
    assert_eq!(bytes.len(), SerialStateNotification::SIZE);
    assert_eq!(&bytes[4..6], &[0x02, 0x01]);
    assert_eq!(&bytes[8..10], &[0x03, 0x00]);
}
