//! Endpoint Manager
//!
//! Owns the interrupt side of the transport: it registers the three CDC
//! endpoints, and turns USB peripheral events into ring buffer traffic and
//! control-request answers. Hardware is reached only through [`UsbBus`], so
//! the whole state machine runs on the host against a mock peripheral.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::cdc::control::{handle_control_request, ControlResponse};
use crate::cdc::ring_buffer::{Consumer, Producer};
use crate::config::{
    CdcConfig, BUFFER_SIZE, BULK_IN_ADDR, BULK_MAX_PACKET_SIZE, BULK_OUT_ADDR, ENDPOINTS, NOTIFY_IN_ADDR,
};
use crate::error::Error;
use crate::types::{EndpointAddress, EndpointConfig, SetupPacket};

/// Receive hook, called with each packet exactly as read from the bulk OUT endpoint
pub type RxCallback = fn(&[u8]);

/// USB peripheral as seen by the transport
///
/// Implementations wrap a concrete device stack. Every method must return
/// promptly; none of them may block waiting for the host.
pub trait UsbBus {
    /// Peripheral error
    type Error;

    /// Power up the peripheral and unmask its interrupt at `irq_priority`
    fn enable(&mut self, irq_priority: u8) -> Result<(), Self::Error>;

    /// Register one endpoint
    fn configure_endpoint(&mut self, endpoint: &EndpointConfig) -> Result<(), Self::Error>;

    /// Next pending event, if any
    fn poll(&mut self) -> Option<TransportEvent>;

    /// Copy the pending OUT packet into `buf`, returning its length
    fn read_packet(&mut self, address: EndpointAddress, buf: &mut [u8]) -> usize;

    /// Queue one IN packet, returning the bytes accepted
    ///
    /// `None` while the endpoint still holds an earlier packet. `Some(0)` is an
    /// accepted zero-length packet.
    fn write_packet(&mut self, address: EndpointAddress, data: &[u8]) -> Option<usize>;

    /// Complete the current control transfer, with `data` as the IN data stage
    /// (empty for a bare status stage)
    fn control_accept(&mut self, data: &[u8]);

    /// Stall the current control transfer
    fn control_reject(&mut self);
}

/// Peripheral event driving the transport
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum TransportEvent {
    /// Bus reset
    Reset,
    /// Host selected a configuration (`SET_CONFIGURATION` value)
    Configured(u16),
    /// Class request for the communication interface
    ControlRequest(SetupPacket),
    /// A packet is waiting on the bulk OUT endpoint
    DataReceived,
    /// Start of frame, roughly every millisecond
    FrameTick,
}

/// Flags shared between interrupt and application context
///
/// Only the [`EndpointManager`] writes them.
#[derive(Debug, Default)]
pub struct LinkState {
    connected: AtomicBool,
    pending_empty_flush: AtomicBool,
}

impl LinkState {
    /// Disconnected, nothing pending
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            pending_empty_flush: AtomicBool::new(false),
        }
    }

    /// Host asserted DTR
    #[must_use]
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// The last IN packet was full-size and must be followed by a short one
    #[must_use]
    pub fn pending_empty_flush(&self) -> bool {
        self.pending_empty_flush.load(Ordering::Acquire)
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    fn set_pending_empty_flush(&self, pending: bool) {
        self.pending_empty_flush.store(pending, Ordering::Release);
    }
}

/// Interrupt-side half of the transport
pub struct EndpointManager<'a, B, const N: usize = BUFFER_SIZE> {
    bus: B,
    rx: Producer<'a, N>,
    tx: Consumer<'a, N>,
    link: &'a LinkState,
    config: CdcConfig,
    rx_callback: Option<RxCallback>,
}

impl<'a, B: UsbBus, const N: usize> EndpointManager<'a, B, N> {
    pub(crate) fn new(
        bus: B,
        rx: Producer<'a, N>,
        tx: Consumer<'a, N>,
        link: &'a LinkState,
        config: CdcConfig,
    ) -> Self {
        Self {
            bus,
            rx,
            tx,
            link,
            config,
            rx_callback: None,
        }
    }

    /// Register the endpoints and enable the peripheral interrupt
    pub(crate) fn start(&mut self) -> Result<(), Error<B::Error>> {
        self.register_endpoints()?;
        self.bus
            .enable(self.config.irq_priority)
            .map_err(Error::Enable)?;

        #[cfg(feature = "embedded")]
        defmt::info!("USB CDC enabled at IRQ priority {}", self.config.irq_priority);

        Ok(())
    }

    /// Register bulk OUT, bulk IN and interrupt IN, in that order
    pub fn register_endpoints(&mut self) -> Result<(), Error<B::Error>> {
        for endpoint in &ENDPOINTS {
            self.bus
                .configure_endpoint(endpoint)
                .map_err(|source| Error::EndpointSetup {
                    address: endpoint.address,
                    source,
                })?;

            #[cfg(feature = "embedded")]
            defmt::debug!("Registered {}", endpoint);
        }
        Ok(())
    }

    /// Service one pending bus event; returns `false` when there was none
    pub fn service(&mut self) -> bool {
        match self.bus.poll() {
            Some(event) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    /// Handle one event
    pub fn dispatch(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Reset => self.on_reset(),
            TransportEvent::Configured(value) => self.on_configured(value),
            TransportEvent::ControlRequest(setup) => self.on_control_request(&setup),
            TransportEvent::DataReceived => self.on_data_received(),
            TransportEvent::FrameTick => self.on_frame_tick(),
        }
    }

    /// Install or remove the receive hook
    pub fn set_rx_callback(&mut self, callback: Option<RxCallback>) {
        self.rx_callback = callback;
    }

    /// Host asserted DTR
    #[must_use]
    pub fn connected(&self) -> bool {
        self.link.connected()
    }

    /// A zero-length packet is owed to the host
    #[must_use]
    pub fn pending_empty_flush(&self) -> bool {
        self.link.pending_empty_flush()
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &CdcConfig {
        &self.config
    }

    /// Underlying peripheral
    #[must_use]
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    /// Underlying peripheral
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    fn on_reset(&mut self) {
        #[cfg(feature = "embedded")]
        defmt::info!("USB reset");

        self.link.set_connected(false);
        self.link.set_pending_empty_flush(false);
        self.reconfigure();
    }

    fn on_configured(&mut self, _value: u16) {
        #[cfg(feature = "embedded")]
        defmt::info!("USB configured ({})", _value);

        self.reconfigure();
    }

    fn reconfigure(&mut self) {
        // Interrupt context: nothing to hand the error to.
        if self.register_endpoints().is_err() {
            #[cfg(feature = "embedded")]
            defmt::warn!("Endpoint setup failed, port stays unusable until next reset");
        }
    }

    fn on_control_request(&mut self, setup: &SetupPacket) {
        if !setup.is_class_interface() {
            #[cfg(feature = "embedded")]
            defmt::warn!("Rejecting non-class request {}", setup);

            self.bus.control_reject();
            return;
        }

        match handle_control_request(setup) {
            ControlResponse::LineState {
                signals,
                notification,
            } => {
                self.link.set_connected(signals.connected());

                #[cfg(feature = "embedded")]
                defmt::info!("Line state {}", signals);

                if self.config.notify_serial_state
                    && self.bus.write_packet(NOTIFY_IN_ADDR, &notification.to_bytes()).is_none()
                {
                    #[cfg(feature = "embedded")]
                    defmt::debug!("Notification endpoint busy, serial state not sent");
                }
                self.bus.control_accept(&[]);
            }
            ControlResponse::Accepted => self.bus.control_accept(&[]),
            ControlResponse::Data(bytes) => {
                let len = usize::from(setup.length).min(bytes.len());
                self.bus.control_accept(&bytes[..len]);
            }
            ControlResponse::NotSupported => {
                #[cfg(feature = "embedded")]
                defmt::warn!("Unsupported class request 0x{:02X}", setup.request);

                self.bus.control_reject();
            }
        }
    }

    fn on_data_received(&mut self) {
        let bus = &mut self.bus;
        let callback = self.rx_callback;

        if self.rx.contiguous_space() >= BULK_MAX_PACKET_SIZE {
            // Room for a whole packet: read it straight into the ring.
            self.rx.write_contiguous(|block| {
                let block = &mut block[..BULK_MAX_PACKET_SIZE];
                let len = bus.read_packet(BULK_OUT_ADDR, block).min(BULK_MAX_PACKET_SIZE);
                if let Some(callback) = callback {
                    callback(&block[..len]);
                }
                len
            });
            return;
        }

        let mut packet = [0u8; BULK_MAX_PACKET_SIZE];
        let len = bus.read_packet(BULK_OUT_ADDR, &mut packet).min(BULK_MAX_PACKET_SIZE);
        let packet = &packet[..len];

        // Once the ring fills, the rest of the packet is dropped.
        let rx = &mut self.rx;
        if packet.iter().any(|&byte| !rx.push(byte)) {
            #[cfg(feature = "embedded")]
            defmt::trace!("RX overflow, {}-byte packet truncated", len);
        }

        if let Some(callback) = callback {
            callback(packet);
        }
    }

    fn on_frame_tick(&mut self) {
        if !self.link.connected() {
            return;
        }

        if self.tx.contiguous_len() == 0 && !self.link.pending_empty_flush() {
            return;
        }

        let bus = &mut self.bus;
        let mut sent = None;
        self.tx.read_contiguous(BULK_MAX_PACKET_SIZE, |chunk| {
            sent = bus.write_packet(BULK_IN_ADDR, chunk);
            sent.unwrap_or(0)
        });

        // Busy endpoint: bytes stay queued and any owed ZLP stays owed.
        // A full packet leaves the transfer open; the next tick closes it with
        // a short or zero-length one.
        if let Some(sent) = sent {
            self.link.set_pending_empty_flush(sent == BULK_MAX_PACKET_SIZE);
        }
    }
}
