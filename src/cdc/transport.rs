//! Transport Façade
//!
//! The byte-stream API the application sees. Every call is non-blocking:
//! reads return `None` when nothing has arrived and writes drop what does not
//! fit. A caller that wants to wait loops on [`Transport::poll`] and
//! [`Transport::available`].

use core::fmt;

use crate::cdc::endpoint::{EndpointManager, LinkState, RxCallback, UsbBus};
use crate::cdc::ring_buffer::{Consumer, Producer, RingBuffer};
use crate::config::{CdcConfig, BUFFER_SIZE, MAX_EVENTS_PER_POLL};
use crate::error::Error;

/// Storage backing one virtual COM port
///
/// Lives for the whole program (typically in a `StaticCell`); [`Transport::init`]
/// borrows it for the lifetime of the handles it returns.
pub struct CdcState<const N: usize = BUFFER_SIZE> {
    rx: RingBuffer<N>,
    tx: RingBuffer<N>,
    link: LinkState,
}

impl<const N: usize> CdcState<N> {
    /// Empty buffers, disconnected
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rx: RingBuffer::new(),
            tx: RingBuffer::new(),
            link: LinkState::new(),
        }
    }
}

impl<const N: usize> Default for CdcState<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Application-side handle: consumes RX, produces TX
pub struct SerialPort<'a, const N: usize = BUFFER_SIZE> {
    rx: Consumer<'a, N>,
    tx: Producer<'a, N>,
    link: &'a LinkState,
}

impl<const N: usize> SerialPort<'_, N> {
    /// Host has the port open (DTR asserted)
    #[must_use]
    pub fn connected(&self) -> bool {
        self.link.connected()
    }

    /// Bytes waiting to be read
    #[must_use]
    pub fn available(&self) -> usize {
        self.rx.len()
    }

    /// Read one byte
    pub fn recv_byte(&mut self) -> Option<u8> {
        self.rx.pop()
    }

    /// Queue one byte for the host; dropped if the TX ring is full
    pub fn send_byte(&mut self, byte: u8) {
        let _ = self.tx.push(byte);
    }

    /// Queue as much of `bytes` as fits, returning how many were accepted
    ///
    /// The accepted bytes are always a prefix, so a caller can retry with
    /// `&bytes[accepted..]` after polling.
    pub fn send(&mut self, bytes: &[u8]) -> usize {
        let tx = &mut self.tx;
        bytes.iter().take_while(|&&byte| tx.push(byte)).count()
    }

    /// Room left in the TX ring
    #[must_use]
    pub fn send_capacity(&self) -> usize {
        self.tx.free()
    }

    /// The last packet sent was full-size and a zero-length packet is still owed
    #[must_use]
    pub fn flush_pending(&self) -> bool {
        self.link.pending_empty_flush()
    }
}

impl<const N: usize> fmt::Write for SerialPort<'_, N> {
    /// Terminal-style output: `\n` goes out as `\r\n`, overflow is dropped
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.send_byte(b'\r');
            }
            self.send_byte(byte);
        }
        Ok(())
    }
}

/// The virtual COM port: application handle plus endpoint manager
///
/// Cooperative builds keep both halves together and call [`Transport::poll`]
/// from the main loop. Interrupt-driven builds [`split`](Transport::split)
/// and move the [`EndpointManager`] into the USB interrupt.
pub struct Transport<'a, B, const N: usize = BUFFER_SIZE> {
    serial: SerialPort<'a, N>,
    endpoints: EndpointManager<'a, B, N>,
}

impl<'a, B: UsbBus, const N: usize> Transport<'a, B, N> {
    /// Bring up the port with the default [`CdcConfig`]
    pub fn init(state: &'a mut CdcState<N>, bus: B) -> Result<Self, Error<B::Error>> {
        Self::init_with_config(state, bus, CdcConfig::default())
    }

    /// Bring up the port: register endpoints, then enable the USB interrupt
    pub fn init_with_config(
        state: &'a mut CdcState<N>,
        bus: B,
        config: CdcConfig,
    ) -> Result<Self, Error<B::Error>> {
        let CdcState { rx, tx, link } = state;
        let link: &'a LinkState = link;
        let (rx_producer, rx_consumer) = rx.split();
        let (tx_producer, tx_consumer) = tx.split();

        let mut endpoints = EndpointManager::new(bus, rx_producer, tx_consumer, link, config);
        endpoints.start()?;

        Ok(Self {
            serial: SerialPort {
                rx: rx_consumer,
                tx: tx_producer,
                link,
            },
            endpoints,
        })
    }

    /// Host has the port open (DTR asserted)
    #[must_use]
    pub fn connected(&self) -> bool {
        self.serial.connected()
    }

    /// Bytes waiting to be read
    #[must_use]
    pub fn available(&self) -> usize {
        self.serial.available()
    }

    /// Read one byte
    pub fn recv_byte(&mut self) -> Option<u8> {
        self.serial.recv_byte()
    }

    /// Queue one byte; dropped if the TX ring is full
    pub fn send_byte(&mut self, byte: u8) {
        self.serial.send_byte(byte);
    }

    /// Queue as much of `bytes` as fits, returning how many were accepted
    pub fn send(&mut self, bytes: &[u8]) -> usize {
        self.serial.send(bytes)
    }

    /// Install or remove the hook called with every received packet
    pub fn set_rx_callback(&mut self, callback: Option<RxCallback>) {
        self.endpoints.set_rx_callback(callback);
    }

    /// Service pending peripheral events, at most [`MAX_EVENTS_PER_POLL`] per call
    pub fn poll(&mut self) {
        for _ in 0..MAX_EVENTS_PER_POLL {
            if !self.endpoints.service() {
                break;
            }
        }
    }

    /// Application handle
    #[must_use]
    pub const fn serial(&self) -> &SerialPort<'a, N> {
        &self.serial
    }

    /// Application handle
    pub fn serial_mut(&mut self) -> &mut SerialPort<'a, N> {
        &mut self.serial
    }

    /// Interrupt-side half
    #[must_use]
    pub const fn endpoints(&self) -> &EndpointManager<'a, B, N> {
        &self.endpoints
    }

    /// Interrupt-side half
    pub fn endpoints_mut(&mut self) -> &mut EndpointManager<'a, B, N> {
        &mut self.endpoints
    }

    /// Separate the application handle from the endpoint manager
    pub fn split(self) -> (SerialPort<'a, N>, EndpointManager<'a, B, N>) {
        (self.serial, self.endpoints)
    }
}

impl<B: UsbBus, const N: usize> fmt::Write for Transport<'_, B, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        fmt::Write::write_str(&mut self.serial, s)
    }
}
