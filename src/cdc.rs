//! USB CDC-ACM Virtual Serial Port
//!
//! Layers, leaves first:
//! - `ring_buffer`: lock-free SPSC byte rings for RX and TX
//! - `control`: the three class requests a host serial driver requires
//! - `endpoint`: endpoint registration and the peripheral event pump
//! - `transport`: the non-blocking byte-stream API

pub mod control;
pub mod endpoint;
pub mod ring_buffer;
pub mod transport;

pub use control::{handle_control_request, ControlResponse, SerialStateNotification};
pub use endpoint::{EndpointManager, LinkState, RxCallback, TransportEvent, UsbBus};
pub use ring_buffer::{Consumer, Producer, RingBuffer};
pub use transport::{CdcState, SerialPort, Transport};
