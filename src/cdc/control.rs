//! CDC class control requests
//!
//! A host serial driver insists on three class requests existing even though a
//! USB-native port has no UART behind it. Only the DTR bit of
//! `SET_CONTROL_LINE_STATE` has any effect; line coding is reported but never
//! applied.

use crate::config::{COMM_INTERFACE, LINE_CODING};
use crate::types::{ControlSignals, LineCodingBytes, SetupPacket, LINE_CODING_SIZE};

/// `SET_LINE_CODING`
pub const SET_LINE_CODING: u8 = 0x20;

/// `GET_LINE_CODING`
pub const GET_LINE_CODING: u8 = 0x21;

/// `SET_CONTROL_LINE_STATE`
pub const SET_CONTROL_LINE_STATE: u8 = 0x22;

/// `bNotification` code of the serial-state notification
pub const NOTIFY_SERIAL_STATE: u8 = 0x20;

/// `bmRequestType` of notifications (device to host, class, interface)
pub const NOTIFY_REQUEST_TYPE: u8 = 0xA1;

/// Outcome of a class request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlResponse {
    /// Line state updated, no data stage
    LineState {
        /// Decoded DTR/RTS
        signals: ControlSignals,
        /// Notification echoing the signals back to the host
        notification: SerialStateNotification,
    },
    /// Accepted with no data stage
    Accepted,
    /// Accepted with a data stage carrying these bytes
    Data(LineCodingBytes),
    /// Not a request this class answers; the USB core stalls the pipe
    NotSupported,
}

impl ControlResponse {
    /// Whether the request was answered
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        !matches!(self, Self::NotSupported)
    }
}

/// Answer a class request addressed to the communication interface
///
/// Pure: the caller applies any line-state change and completes the transfer.
#[must_use]
pub fn handle_control_request(setup: &SetupPacket) -> ControlResponse {
    match setup.request {
        SET_CONTROL_LINE_STATE => {
            let signals = ControlSignals::from_value(setup.value);
            ControlResponse::LineState {
                signals,
                notification: SerialStateNotification::new(COMM_INTERFACE, signals),
            }
        }
        SET_LINE_CODING if usize::from(setup.length) < LINE_CODING_SIZE => {
            ControlResponse::NotSupported
        }
        SET_LINE_CODING => ControlResponse::Accepted,
        GET_LINE_CODING => ControlResponse::Data(LINE_CODING.to_bytes()),
        _ => ControlResponse::NotSupported,
    }
}

/// `SERIAL_STATE` notification sent on the interrupt endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerialStateNotification {
    interface: u16,
    state: u16,
}

impl SerialStateNotification {
    /// Header plus the two-byte state bitmap
    pub const SIZE: usize = 10;

    /// Build a notification echoing `signals` for `interface`
    #[must_use]
    pub const fn new(interface: u16, signals: ControlSignals) -> Self {
        Self {
            interface,
            state: signals.bits(),
        }
    }

    /// UART state bitmap
    #[must_use]
    pub const fn state(&self) -> u16 {
        self.state
    }

    /// Encode as the 8-byte notification header followed by the state bitmap
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; Self::SIZE] {
        let index = self.interface.to_le_bytes();
        let state = self.state.to_le_bytes();
        [
            NOTIFY_REQUEST_TYPE,
            NOTIFY_SERIAL_STATE,
            0,
            0,
            index[0],
            index[1],
            2,
            0,
            state[0],
            state[1],
        ]
    }
}
