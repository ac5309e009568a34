//! Mock USB peripheral shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;

use cdc_vcom::cdc::control::{GET_LINE_CODING, SET_CONTROL_LINE_STATE, SET_LINE_CODING};
use cdc_vcom::cdc::{TransportEvent, UsbBus};
use cdc_vcom::types::{EndpointAddress, EndpointConfig, SetupPacket};

/// Error returned by the mock when told to fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockError {
    Refused,
}

/// How a control transfer was completed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlOutcome {
    Accepted(Vec<u8>),
    Rejected,
}

/// Records everything the transport asks of the peripheral
#[derive(Debug, Default)]
pub struct MockBus {
    pub events: VecDeque<TransportEvent>,
    pub rx_packets: VecDeque<Vec<u8>>,
    pub configured: Vec<EndpointConfig>,
    pub written: Vec<(EndpointAddress, Vec<u8>)>,
    pub control: Vec<ControlOutcome>,
    pub enabled_priority: Option<u8>,
    /// While set, every write is refused as if the endpoint were still busy
    pub busy: bool,
    pub fail_endpoint: Option<EndpointAddress>,
    pub fail_enable: bool,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an OUT packet and the event announcing it
    pub fn receive(&mut self, data: &[u8]) {
        self.rx_packets.push_back(data.to_vec());
        self.events.push_back(TransportEvent::DataReceived);
    }

    pub fn tick(&mut self) {
        self.events.push_back(TransportEvent::FrameTick);
    }

    pub fn reset(&mut self) {
        self.events.push_back(TransportEvent::Reset);
    }

    pub fn request(&mut self, setup: SetupPacket) {
        self.events.push_back(TransportEvent::ControlRequest(setup));
    }

    /// Host opens (`true`) or closes (`false`) the port
    pub fn set_dtr(&mut self, dtr: bool) {
        self.request(SetupPacket::class_out(SET_CONTROL_LINE_STATE, u16::from(dtr), 0, 0));
    }

    pub fn get_line_coding(&mut self, length: u16) {
        self.request(SetupPacket::class_in(GET_LINE_CODING, 0, 0, length));
    }

    pub fn set_line_coding(&mut self, length: u16) {
        self.request(SetupPacket::class_out(SET_LINE_CODING, 0, 0, length));
    }

    /// Packets written to `address`, oldest first
    pub fn writes_to(&self, address: EndpointAddress) -> Vec<Vec<u8>> {
        self.written
            .iter()
            .filter(|(addr, _)| *addr == address)
            .map(|(_, data)| data.clone())
            .collect()
    }

    pub fn last_control(&self) -> Option<&ControlOutcome> {
        self.control.last()
    }
}

impl UsbBus for MockBus {
    type Error = MockError;

    fn enable(&mut self, irq_priority: u8) -> Result<(), Self::Error> {
        if self.fail_enable {
            return Err(MockError::Refused);
        }
        self.enabled_priority = Some(irq_priority);
        Ok(())
    }

    fn configure_endpoint(&mut self, endpoint: &EndpointConfig) -> Result<(), Self::Error> {
        if self.fail_endpoint == Some(endpoint.address) {
            return Err(MockError::Refused);
        }
        self.configured.push(*endpoint);
        Ok(())
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }

    fn read_packet(&mut self, _address: EndpointAddress, buf: &mut [u8]) -> usize {
        let Some(packet) = self.rx_packets.pop_front() else {
            return 0;
        };
        let len = packet.len().min(buf.len());
        buf[..len].copy_from_slice(&packet[..len]);
        len
    }

    fn write_packet(&mut self, address: EndpointAddress, data: &[u8]) -> Option<usize> {
        if self.busy {
            return None;
        }
        self.written.push((address, data.to_vec()));
        Some(data.len())
    }

    fn control_accept(&mut self, data: &[u8]) {
        self.control.push(ControlOutcome::Accepted(data.to_vec()));
    }

    fn control_reject(&mut self) {
        self.control.push(ControlOutcome::Rejected);
    }
}
