//! embassy-usb bridge
//!
//! embassy-usb owns enumeration and endpoint I/O; the transport's endpoint
//! manager expects synchronous events. The bridge closes the gap:
//! - [`EmbassyBus`] stages one OUT packet, one IN packet, one notification and
//!   one control reply so the manager can run unchanged
//! - [`ControlHandler`] forwards resets, configuration and class requests
//! - [`run_data_pump`] drives the two loops below concurrently
//! - [`run_rx_pump`] turns bulk OUT completions into `DataReceived` events
//! - [`run_tx_pump`] turns a 1 ms ticker (standing in for start-of-frame) into
//!   `FrameTick` events and writes out what they queue

use core::cell::RefCell;
use core::convert::Infallible;

use embassy_futures::select::{select, Either};
use embassy_stm32::interrupt::{self, InterruptExt, Priority};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Ticker};
use embassy_usb::control::{InResponse, OutResponse, Recipient, Request, RequestType};
use embassy_usb::driver::{Direction, Endpoint, EndpointIn, EndpointOut};
use embassy_usb::Handler;
use heapless::Vec;

use crate::cdc::{EndpointManager, TransportEvent, UsbBus};
use crate::config::{
    BULK_IN_ADDR, BULK_MAX_PACKET_SIZE, COMM_INTERFACE, CONTROL_BUFFER_SIZE, NOTIFY_IN_ADDR, NOTIFY_MAX_PACKET_SIZE,
};
use crate::types::{EndpointAddress, EndpointConfig, Packet, SetupPacket};

/// Endpoint manager running on the embassy bridge
pub type Endpoints = EndpointManager<'static, EmbassyBus>;

/// Endpoint manager shared between the device task and the data pump
pub type SharedEndpoints = Mutex<CriticalSectionRawMutex, RefCell<Option<Endpoints>>>;

/// Answer recorded for the control transfer in progress
#[derive(Clone, Debug, Default)]
pub enum ControlReply {
    /// Nothing answered the request
    #[default]
    Pending,
    /// Accepted, with this IN data stage
    Accepted(Vec<u8, CONTROL_BUFFER_SIZE>),
    /// Stall
    Rejected,
}

/// [`UsbBus`] backed by staging slots filled and drained by embassy tasks
#[derive(Default)]
pub struct EmbassyBus {
    rx: Option<Packet>,
    tx: Option<Packet>,
    notification: Option<Vec<u8, NOTIFY_MAX_PACKET_SIZE>>,
    control: ControlReply,
}

impl EmbassyBus {
    /// Empty slots
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rx: None,
            tx: None,
            notification: None,
            control: ControlReply::Pending,
        }
    }

    /// Hold a packet read from bulk OUT until the manager asks for it
    pub fn stage_rx(&mut self, data: &[u8]) {
        let len = data.len().min(BULK_MAX_PACKET_SIZE);
        self.rx = Vec::from_slice(&data[..len]).ok();
    }

    /// Packet queued for bulk IN, if any (an empty one is a zero-length packet)
    pub fn take_tx(&mut self) -> Option<Packet> {
        self.tx.take()
    }

    /// Notification queued for interrupt IN, if any
    pub fn take_notification(&mut self) -> Option<Vec<u8, NOTIFY_MAX_PACKET_SIZE>> {
        self.notification.take()
    }

    /// Reply to the control transfer just dispatched
    pub fn take_control_reply(&mut self) -> ControlReply {
        core::mem::take(&mut self.control)
    }
}

impl UsbBus for EmbassyBus {
    type Error = Infallible;

    fn enable(&mut self, irq_priority: u8) -> Result<(), Self::Error> {
        // NVIC takes the priority in the upper four bits.
        interrupt::USB_LP_CAN1_RX0.set_priority(Priority::from(irq_priority << 4));
        Ok(())
    }

    fn configure_endpoint(&mut self, endpoint: &EndpointConfig) -> Result<(), Self::Error> {
        // embassy-usb allocated the endpoints when the device was built.
        defmt::trace!("Endpoint {} owned by embassy-usb", endpoint.address);
        Ok(())
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        None
    }

    fn read_packet(&mut self, _address: EndpointAddress, buf: &mut [u8]) -> usize {
        let Some(packet) = self.rx.take() else {
            return 0;
        };
        let len = packet.len().min(buf.len());
        buf[..len].copy_from_slice(&packet[..len]);
        len
    }

    fn write_packet(&mut self, address: EndpointAddress, data: &[u8]) -> Option<usize> {
        if address == BULK_IN_ADDR {
            stage(&mut self.tx, data)
        } else if address == NOTIFY_IN_ADDR {
            stage(&mut self.notification, data)
        } else {
            None
        }
    }

    fn control_accept(&mut self, data: &[u8]) {
        let len = data.len().min(CONTROL_BUFFER_SIZE);
        self.control = Vec::from_slice(&data[..len]).map_or(ControlReply::Rejected, ControlReply::Accepted);
    }

    fn control_reject(&mut self) {
        self.control = ControlReply::Rejected;
    }
}

/// Fill an empty IN slot, truncating to its capacity; `None` while it is occupied
fn stage<const CAP: usize>(slot: &mut Option<Vec<u8, CAP>>, data: &[u8]) -> Option<usize> {
    if slot.is_some() {
        return None;
    }
    let len = data.len().min(CAP);
    *slot = Vec::from_slice(&data[..len]).ok();
    Some(len)
}

fn with_endpoints<R>(shared: &SharedEndpoints, f: impl FnOnce(&mut Endpoints) -> R) -> Option<R> {
    shared.lock(|cell| cell.borrow_mut().as_mut().map(f))
}

/// Routes embassy-usb device callbacks into the endpoint manager
pub struct ControlHandler {
    endpoints: &'static SharedEndpoints,
}

impl ControlHandler {
    /// Handler dispatching into `endpoints`
    #[must_use]
    pub const fn new(endpoints: &'static SharedEndpoints) -> Self {
        Self { endpoints }
    }

    fn setup_packet(req: &Request) -> Option<SetupPacket> {
        if req.request_type != RequestType::Class
            || req.recipient != Recipient::Interface
            || req.index != COMM_INTERFACE
        {
            return None;
        }

        let setup = if req.direction == Direction::In {
            SetupPacket::class_in(req.request, req.value, req.index, req.length)
        } else {
            SetupPacket::class_out(req.request, req.value, req.index, req.length)
        };
        Some(setup)
    }

    fn request(&mut self, setup: SetupPacket) -> ControlReply {
        with_endpoints(self.endpoints, |endpoints| {
            endpoints.dispatch(TransportEvent::ControlRequest(setup));
            endpoints.bus_mut().take_control_reply()
        })
        .unwrap_or_default()
    }

    fn event(&mut self, event: TransportEvent) {
        with_endpoints(self.endpoints, |endpoints| endpoints.dispatch(event));
    }
}

impl Handler for ControlHandler {
    fn reset(&mut self) {
        self.event(TransportEvent::Reset);
    }

    fn configured(&mut self, configured: bool) {
        if configured {
            self.event(TransportEvent::Configured(1));
        }
    }

    fn control_out(&mut self, req: Request, _data: &[u8]) -> Option<OutResponse> {
        let setup = Self::setup_packet(&req)?;
        match self.request(setup) {
            ControlReply::Accepted(_) => Some(OutResponse::Accepted),
            ControlReply::Rejected => Some(OutResponse::Rejected),
            ControlReply::Pending => None,
        }
    }

    fn control_in<'a>(&'a mut self, req: Request, buf: &'a mut [u8]) -> Option<InResponse<'a>> {
        let setup = Self::setup_packet(&req)?;
        match self.request(setup) {
            ControlReply::Accepted(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Some(InResponse::Accepted(&buf[..len]))
            }
            ControlReply::Rejected => Some(InResponse::Rejected),
            ControlReply::Pending => None,
        }
    }
}

/// Move packets between the CDC endpoints and the endpoint manager forever
///
/// Reception and transmission run as two concurrent loops; neither waits on
/// the other.
pub async fn run_data_pump<O: EndpointOut, I: EndpointIn>(
    shared: &'static SharedEndpoints,
    read: O,
    write: I,
    notify: I,
) -> ! {
    match select(run_rx_pump(shared, read), run_tx_pump(shared, write, notify)).await {
        Either::First(never) | Either::Second(never) => never,
    }
}

/// Feed bulk OUT packets to the endpoint manager forever
///
/// Each completed read is staged and dispatched as `DataReceived`. Runs
/// independently of [`run_tx_pump`], so a host that stops draining IN does not
/// stall reception.
pub async fn run_rx_pump<O: EndpointOut>(shared: &'static SharedEndpoints, mut read: O) -> ! {
    let mut packet = [0u8; BULK_MAX_PACKET_SIZE];

    loop {
        read.wait_enabled().await;
        defmt::info!("CDC bulk OUT enabled");

        while let Ok(len) = read.read(&mut packet).await {
            with_endpoints(shared, |endpoints| {
                endpoints.bus_mut().stage_rx(&packet[..len]);
                endpoints.dispatch(TransportEvent::DataReceived);
            });
        }

        defmt::warn!("CDC bulk OUT disabled, waiting for host");
    }
}

/// Flush TX and notifications forever
///
/// Every millisecond a `FrameTick` is dispatched and whatever the manager
/// queued is written out. A write the host has not collected yet holds back
/// the next tick, which leaves the bytes in the TX ring.
pub async fn run_tx_pump<I: EndpointIn>(shared: &'static SharedEndpoints, mut write: I, mut notify: I) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(1));

    loop {
        write.wait_enabled().await;
        defmt::info!("CDC bulk IN enabled");

        loop {
            ticker.next().await;

            let (tx, notification) = with_endpoints(shared, |endpoints| {
                endpoints.dispatch(TransportEvent::FrameTick);
                let bus = endpoints.bus_mut();
                (bus.take_tx(), bus.take_notification())
            })
            .unwrap_or((None, None));

            if let Some(notification) = notification {
                if notify.write(&notification).await.is_err() {
                    break;
                }
            }
            if let Some(tx) = tx {
                if write.write(&tx).await.is_err() {
                    break;
                }
            }
        }

        defmt::warn!("CDC bulk IN disabled, waiting for host");
    }
}
