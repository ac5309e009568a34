//! USB Virtual COM Port Library
//!
//! This library provides the USB CDC-ACM transport for an STM32F103-based
//! flight/rocket controller. It terminates the bulk and interrupt endpoints,
//! answers the class control requests a host serial driver needs, and exposes
//! a non-blocking byte stream to the rest of the firmware.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    APPLICATION LAYER                         │
//! │  Command shell  │  Telemetry  │  Echo / diagnostics          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   TRANSPORT FAÇADE                           │
//! │  init │ connected │ available │ recv_byte │ send │ poll      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   ENDPOINT MANAGER                           │
//! │  Reset │ Control requests │ Bulk OUT (RX) │ SOF flush (TX)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │           RX RING BUFFER     │     TX RING BUFFER            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 USB PERIPHERAL (UsbBus)                      │
//! │           embassy-usb on target, mock on host                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Concurrency
//!
//! - The RX ring is produced by the interrupt side and consumed by the
//!   application; the TX ring is the reverse. Each ring is split into a
//!   producer and a consumer half so the discipline is enforced by types.
//! - Connection and flush flags are atomics written only by the endpoint
//!   manager.
//! - Nothing blocks or allocates. Overflow drops bytes.

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_stm32;
#[cfg(feature = "embedded")]
pub use embassy_time;
#[cfg(feature = "embedded")]
pub use embassy_usb;

/// CDC-ACM Transport
///
/// Ring buffers, control requests, endpoint event pump and byte-stream API.
pub mod cdc;

/// USB Device Integration
///
/// Binds the transport to embassy-usb on the target.
#[cfg(feature = "embedded")]
pub mod usb;

/// Initialization errors
pub mod error;

/// Shared types used across modules
pub mod types;

/// System configuration and constants
pub mod config;

pub use cdc::{CdcState, SerialPort, Transport, TransportEvent, UsbBus};
pub use config::CdcConfig;
pub use error::Error;

/// Prelude module for common imports
#[cfg(feature = "embedded")]
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::cdc::*;
    pub use crate::config::*;
    pub use crate::types::*;

    // Embassy
    pub use embassy_time::{Duration, Instant, Timer};

    // Error handling
    pub use core::result::Result;

    // Logging
    pub use defmt::{debug, error, info, trace, warn};
}
