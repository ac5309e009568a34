//! System configuration and USB constants
//!
//! This module defines compile-time constants for the virtual COM port.
//! Endpoint addresses, packet sizes and buffer capacities are centralized here;
//! the few knobs that may differ between builds live in [`CdcConfig`].

use crate::types::{EndpointAddress, EndpointConfig, EndpointKind, LineCoding, Parity, StopBits};

/// USB VID (use test VID for development)
pub const USB_VID: u16 = 0x1209;

/// USB PID (get from pid.codes for production)
pub const USB_PID: u16 = 0x0001;

/// Manufacturer string descriptor
pub const USB_MANUFACTURER: &str = "Rocket Controller";

/// Product string descriptor
pub const USB_PRODUCT: &str = "HERMES01 Virtual COM Port";

/// Serial number string descriptor
pub const USB_SERIAL_NUMBER: &str = "HERMES01";

/// Bulk OUT endpoint (host to device data)
pub const BULK_OUT_ADDR: EndpointAddress = EndpointAddress::new(0x01);

/// Bulk IN endpoint (device to host data)
pub const BULK_IN_ADDR: EndpointAddress = EndpointAddress::new(0x82);

/// Interrupt IN endpoint (serial state notifications)
pub const NOTIFY_IN_ADDR: EndpointAddress = EndpointAddress::new(0x83);

/// Maximum packet size of the bulk data endpoints (full speed)
pub const BULK_MAX_PACKET_SIZE: usize = 64;

/// Maximum packet size of the notification endpoint
pub const NOTIFY_MAX_PACKET_SIZE: usize = 16;

/// Notification endpoint polling interval in milliseconds
pub const NOTIFY_INTERVAL_MS: u8 = 255;

/// Capacity of each of the RX and TX ring buffers (must be a power of two)
pub const BUFFER_SIZE: usize = 1024;

/// Buffer handed to the USB core for control transfers
pub const CONTROL_BUFFER_SIZE: usize = 128;

/// NVIC priority of the USB low-priority interrupt
pub const USB_IRQ_PRIORITY: u8 = 1;

/// Upper bound on events serviced by a single cooperative poll
pub const MAX_EVENTS_PER_POLL: usize = 8;

/// Interface number of the CDC communication (control) interface
pub const COMM_INTERFACE: u16 = 0;

/// Line coding reported to the host: 115200 baud, 8N1
pub const LINE_CODING: LineCoding = LineCoding {
    baud_rate: 115_200,
    data_bits: 8,
    stop_bits: StopBits::One,
    parity: Parity::None,
};

/// The three endpoints registered on reset and configuration, in setup order
pub const ENDPOINTS: [EndpointConfig; 3] = [
    EndpointConfig {
        address: BULK_OUT_ADDR,
        kind: EndpointKind::Bulk,
        max_packet_size: BULK_MAX_PACKET_SIZE as u16,
    },
    EndpointConfig {
        address: BULK_IN_ADDR,
        kind: EndpointKind::Bulk,
        max_packet_size: BULK_MAX_PACKET_SIZE as u16,
    },
    EndpointConfig {
        address: NOTIFY_IN_ADDR,
        kind: EndpointKind::Interrupt,
        max_packet_size: NOTIFY_MAX_PACKET_SIZE as u16,
    },
];

/// Runtime options for the CDC transport
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CdcConfig {
    /// Priority the USB interrupt line is enabled at
    pub irq_priority: u8,
    /// Echo line-state changes to the host on the interrupt endpoint
    pub notify_serial_state: bool,
}

impl CdcConfig {
    /// Configuration used by [`crate::cdc::Transport::init`]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            irq_priority: USB_IRQ_PRIORITY,
            notify_serial_state: false,
        }
    }

    /// Enable or disable serial-state notifications
    #[must_use]
    pub const fn with_serial_state_notifications(mut self, enabled: bool) -> Self {
        self.notify_serial_state = enabled;
        self
    }

    /// Override the interrupt priority
    #[must_use]
    pub const fn with_irq_priority(mut self, priority: u8) -> Self {
        self.irq_priority = priority;
        self
    }
}

impl Default for CdcConfig {
    fn default() -> Self {
        Self::new()
    }
}
