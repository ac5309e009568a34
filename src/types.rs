//! Shared types used across the CDC transport
//!
//! This module defines the USB and serial domain types that cross module
//! boundaries: line coding, control signals, SETUP packets, endpoint
//! identities and fixed-size packets.

use core::fmt;

use crate::config::BULK_MAX_PACKET_SIZE;

/// One USB bulk packet, stored by value
pub type Packet = heapless::Vec<u8, BULK_MAX_PACKET_SIZE>;

/// Size of the CDC line coding structure on the wire
pub const LINE_CODING_SIZE: usize = 7;

/// Wire representation of a [`LineCoding`]
pub type LineCodingBytes = [u8; LINE_CODING_SIZE];

/// Line coding (baud rate, etc.)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub struct LineCoding {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8 or 16)
    pub data_bits: u8,
    /// Stop bits (1, 1.5, 2)
    pub stop_bits: StopBits,
    /// Parity
    pub parity: Parity,
}

impl LineCoding {
    /// Encode as `dwDTERate`, `bCharFormat`, `bParityType`, `bDataBits`
    #[must_use]
    pub const fn to_bytes(&self) -> LineCodingBytes {
        let rate = self.baud_rate.to_le_bytes();
        [
            rate[0],
            rate[1],
            rate[2],
            rate[3],
            self.stop_bits.code(),
            self.parity.code(),
            self.data_bits,
        ]
    }

    /// Decode the structure sent by the host with `SET_LINE_CODING`
    ///
    /// Returns `None` when the slice is too short or a field code is unknown.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: &LineCodingBytes = bytes.get(..LINE_CODING_SIZE)?.try_into().ok()?;
        Some(Self {
            baud_rate: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            stop_bits: StopBits::from_code(bytes[4])?,
            parity: Parity::from_code(bytes[5])?,
            data_bits: bytes[6],
        })
    }
}

impl Default for LineCoding {
    fn default() -> Self {
        crate::config::LINE_CODING
    }
}

/// Stop bits configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum StopBits {
    /// One stop bit
    #[default]
    One,
    /// One and a half stop bits
    OnePointFive,
    /// Two stop bits
    Two,
}

impl StopBits {
    /// `bCharFormat` value
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::One => 0,
            Self::OnePointFive => 1,
            Self::Two => 2,
        }
    }

    /// Parse a `bCharFormat` value
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::One),
            1 => Some(Self::OnePointFive),
            2 => Some(Self::Two),
            _ => None,
        }
    }
}

/// Parity configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum Parity {
    /// No parity
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
    /// Mark parity
    Mark,
    /// Space parity
    Space,
}

impl Parity {
    /// `bParityType` value
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Odd => 1,
            Self::Even => 2,
            Self::Mark => 3,
            Self::Space => 4,
        }
    }

    /// Parse a `bParityType` value
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Odd),
            2 => Some(Self::Even),
            3 => Some(Self::Mark),
            4 => Some(Self::Space),
            _ => None,
        }
    }
}

/// DTR/RTS control signals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub struct ControlSignals {
    /// Data Terminal Ready
    pub dtr: bool,
    /// Request To Send
    pub rts: bool,
}

impl ControlSignals {
    /// Decode the `wValue` of `SET_CONTROL_LINE_STATE` (DTR is bit 0, RTS is bit 1)
    #[must_use]
    pub const fn from_value(value: u16) -> Self {
        Self {
            dtr: value & 0b01 != 0,
            rts: value & 0b10 != 0,
        }
    }

    /// Encode back into the two-bit form
    #[must_use]
    pub const fn bits(&self) -> u16 {
        (self.dtr as u16) | ((self.rts as u16) << 1)
    }

    /// Check if host is connected (DTR set)
    #[must_use]
    pub const fn connected(&self) -> bool {
        self.dtr
    }
}

/// USB SETUP packet (8 bytes, little endian)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub struct SetupPacket {
    /// `bmRequestType`: direction, type and recipient
    pub request_type: u8,
    /// `bRequest`
    pub request: u8,
    /// `wValue`
    pub value: u16,
    /// `wIndex`
    pub index: u16,
    /// `wLength`: bytes in the data stage (OUT) or the most the host accepts (IN)
    pub length: u16,
}

impl SetupPacket {
    /// Direction bit of `bmRequestType` (set for device to host)
    pub const DIR_IN: u8 = 0x80;
    /// Mask selecting the request type bits
    pub const TYPE_MASK: u8 = 0x60;
    /// Class request type
    pub const TYPE_CLASS: u8 = 0x20;
    /// Mask selecting the recipient bits
    pub const RECIPIENT_MASK: u8 = 0x1F;
    /// Interface recipient
    pub const RECIPIENT_INTERFACE: u8 = 0x01;

    /// Decode the raw 8 bytes of a SETUP stage
    #[must_use]
    pub const fn from_bytes(raw: [u8; 8]) -> Self {
        Self {
            request_type: raw[0],
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            index: u16::from_le_bytes([raw[4], raw[5]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }

    /// Encode back into the raw 8 bytes
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; 8] {
        let value = self.value.to_le_bytes();
        let index = self.index.to_le_bytes();
        let length = self.length.to_le_bytes();
        [
            self.request_type,
            self.request,
            value[0],
            value[1],
            index[0],
            index[1],
            length[0],
            length[1],
        ]
    }

    /// Build a host-to-device class request addressed to an interface
    #[must_use]
    pub const fn class_out(request: u8, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_type: Self::TYPE_CLASS | Self::RECIPIENT_INTERFACE,
            request,
            value,
            index,
            length,
        }
    }

    /// Build a device-to-host class request addressed to an interface
    #[must_use]
    pub const fn class_in(request: u8, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_type: Self::DIR_IN | Self::TYPE_CLASS | Self::RECIPIENT_INTERFACE,
            request,
            value,
            index,
            length,
        }
    }

    /// Whether the request matches `CLASS | INTERFACE` under the type and recipient masks
    #[must_use]
    pub const fn is_class_interface(&self) -> bool {
        self.request_type & (Self::TYPE_MASK | Self::RECIPIENT_MASK)
            == Self::TYPE_CLASS | Self::RECIPIENT_INTERFACE
    }

    /// Whether the data stage flows device to host
    #[must_use]
    pub const fn is_in(&self) -> bool {
        self.request_type & Self::DIR_IN != 0
    }
}

/// USB endpoint address: number in bits 0..=3, direction in bit 7
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointAddress(u8);

impl EndpointAddress {
    /// Wrap a raw endpoint address
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw address byte
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Endpoint number without the direction bit
    #[must_use]
    pub const fn number(self) -> u8 {
        self.0 & 0x0F
    }

    /// IN (device to host) endpoint
    #[must_use]
    pub const fn is_in(self) -> bool {
        self.0 & 0x80 != 0
    }
}

impl fmt::Debug for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointAddress(0x{:02X})", self.0)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for EndpointAddress {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "EP(0x{:02X})", self.0);
    }
}

/// Endpoint transfer type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum EndpointKind {
    /// Bulk transfers (data interface)
    Bulk,
    /// Interrupt transfers (notifications)
    Interrupt,
}

/// Registration parameters for one endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub struct EndpointConfig {
    /// Endpoint address
    pub address: EndpointAddress,
    /// Transfer type
    pub kind: EndpointKind,
    /// Maximum packet size in bytes
    pub max_packet_size: u16,
}
