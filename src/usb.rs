//! USB Subsystem
//!
//! Binds the CDC transport to embassy-usb on the STM32F103:
//! - `device`: descriptors and endpoint allocation for the CDC-ACM function
//! - `bridge`: `UsbBus` implementation, class-request handler and data pump

pub mod bridge;
pub mod device;
