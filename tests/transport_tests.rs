//! Transport Façade Tests
//!
//! End-to-end behaviour of the byte-stream API over a mock peripheral.

mod common;

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use cdc_vcom::cdc::{CdcState, Transport};
use cdc_vcom::config::{BULK_IN_ADDR, BULK_OUT_ADDR, BULK_MAX_PACKET_SIZE, MAX_EVENTS_PER_POLL};
use cdc_vcom::Error;

use common::{MockBus, MockError};

// =============================================================================
// Initialization
// =============================================================================

#[test]
fn init_succeeds() {
    let mut state: CdcState = CdcState::new();
    let transport = Transport::init(&mut state, MockBus::new()).expect("init");
    assert!(!transport.connected());
    assert_eq!(transport.available(), 0);
}

#[test]
fn init_reports_endpoint_failure() {
    let mut state: CdcState = CdcState::new();
    let bus = MockBus {
        fail_endpoint: Some(BULK_IN_ADDR),
        ..MockBus::new()
    };

    let err = Transport::init(&mut state, bus).err();
    assert_eq!(
        err,
        Some(Error::EndpointSetup {
            address: BULK_IN_ADDR,
            source: MockError::Refused,
        })
    );
}

#[test]
fn init_reports_enable_failure() {
    let mut state: CdcState = CdcState::new();
    let bus = MockBus {
        fail_enable: true,
        ..MockBus::new()
    };

    let err = Transport::init(&mut state, bus).err();
    assert_eq!(err, Some(Error::Enable(MockError::Refused)));
    assert_eq!(err.map(|e| *e.source()), Some(MockError::Refused));
}

// =============================================================================
// Echo Scenario
// =============================================================================

#[test]
fn echo_round_trip() {
    let mut state: CdcState = CdcState::new();
    let mut transport = Transport::init(&mut state, MockBus::new()).expect("init");

    transport.endpoints_mut().bus_mut().set_dtr(true);
    transport.poll();
    assert!(transport.connected());

    transport.endpoints_mut().bus_mut().receive(b"hi");
    transport.poll();
    assert_eq!(transport.available(), 2);

    while let Some(byte) = transport.recv_byte() {
        transport.send_byte(byte);
    }
    assert_eq!(transport.available(), 0);

    transport.endpoints_mut().bus_mut().tick();
    transport.poll();

    assert_eq!(transport.endpoints().bus().writes_to(BULK_IN_ADDR), vec![b"hi".to_vec()]);
}

#[test]
fn recv_byte_empty() {
    let mut state: CdcState = CdcState::new();
    let mut transport = Transport::init(&mut state, MockBus::new()).expect("init");
    assert_eq!(transport.recv_byte(), None);
}

// =============================================================================
// Send
// =============================================================================

#[test]
fn send_returns_accepted_prefix() {
    let mut state: CdcState<16> = CdcState::new();
    let mut transport = Transport::init(&mut state, MockBus::new()).expect("init");

    assert_eq!(transport.send(&[0; 10]), 10);
    assert_eq!(transport.send(&[1; 10]), 6);
    assert_eq!(transport.send(&[2; 10]), 0);
    assert_eq!(transport.serial().send_capacity(), 0);
}

#[test]
fn send_byte_drops_when_full() {
    let mut state: CdcState<16> = CdcState::new();
    let mut transport = Transport::init(&mut state, MockBus::new()).expect("init");

    for byte in 0..20u8 {
        transport.send_byte(byte);
    }
    transport.endpoints_mut().bus_mut().set_dtr(true);
    transport.endpoints_mut().bus_mut().tick();
    transport.poll();

    // Only the first 16 bytes made it into the ring
    assert_eq!(
        transport.endpoints().bus().writes_to(BULK_IN_ADDR),
        vec![(0..16).collect::<Vec<u8>>()]
    );
}

#[test]
fn send_empty_slice() {
    let mut state: CdcState = CdcState::new();
    let mut transport = Transport::init(&mut state, MockBus::new()).expect("init");
    assert_eq!(transport.send(&[]), 0);
}

#[test]
fn write_fmt_translates_newlines() {
    let mut state: CdcState = CdcState::new();
    let mut transport = Transport::init(&mut state, MockBus::new()).expect("init");

    writeln!(transport, "alt={}", 1200).expect("write");
    transport.endpoints_mut().bus_mut().set_dtr(true);
    transport.endpoints_mut().bus_mut().tick();
    transport.poll();

    assert_eq!(
        transport.endpoints().bus().writes_to(BULK_IN_ADDR),
        vec![b"alt=1200\r\n".to_vec()]
    );
}

// =============================================================================
// Poll
// =============================================================================

#[test]
fn poll_services_bounded_batch() {
    let mut state: CdcState = CdcState::new();
    let mut transport = Transport::init(&mut state, MockBus::new()).expect("init");

    for _ in 0..20 {
        transport.endpoints_mut().bus_mut().tick();
    }
    transport.poll();
    assert_eq!(transport.endpoints().bus().events.len(), 20 - MAX_EVENTS_PER_POLL);

    transport.poll();
    transport.poll();
    assert!(transport.endpoints().bus().events.is_empty());
}

#[test]
fn poll_without_events() {
    let mut state: CdcState = CdcState::new();
    let mut transport = Transport::init(&mut state, MockBus::new()).expect("init");
    transport.poll();
    assert!(transport.endpoints().bus().written.is_empty());
}

// =============================================================================
// Receive Callback
// =============================================================================

static CALLBACK_BYTES: AtomicUsize = AtomicUsize::new(0);

fn count_bytes(packet: &[u8]) {
    CALLBACK_BYTES.fetch_add(packet.len(), Ordering::SeqCst);
}

#[test]
fn rx_callback_sees_every_packet() {
    let mut state: CdcState = CdcState::new();
    let mut transport = Transport::init(&mut state, MockBus::new()).expect("init");
    transport.set_rx_callback(Some(count_bytes));

    transport.endpoints_mut().bus_mut().receive(b"abc");
    transport.endpoints_mut().bus_mut().receive(&[0; BULK_MAX_PACKET_SIZE]);
    transport.poll();

    assert_eq!(CALLBACK_BYTES.load(Ordering::SeqCst), 3 + BULK_MAX_PACKET_SIZE);
    assert_eq!(transport.available(), 3 + BULK_MAX_PACKET_SIZE);
}

static LAST_PACKET: Mutex<Vec<u8>> = Mutex::new(Vec::new());

fn record_packet(packet: &[u8]) {
    if let Ok(mut last) = LAST_PACKET.lock() {
        *last = packet.to_vec();
    }
}

#[test]
fn rx_callback_gets_full_packet_on_overflow() {
    let mut state: CdcState<64> = CdcState::new();
    let mut transport = Transport::init(&mut state, MockBus::new()).expect("init");
    transport.set_rx_callback(Some(record_packet));

    transport.endpoints_mut().bus_mut().receive(&[7; 60]);
    transport.endpoints_mut().bus_mut().receive(b"overflow");
    transport.poll();

    // Ring kept 4 bytes of the second packet, the hook saw all of it
    assert_eq!(transport.available(), 64);
    assert_eq!(LAST_PACKET.lock().expect("lock").as_slice(), b"overflow");
}

#[test]
fn rx_callback_can_be_removed() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    fn count_calls(_: &[u8]) {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let mut state: CdcState = CdcState::new();
    let mut transport = Transport::init(&mut state, MockBus::new()).expect("init");
    transport.set_rx_callback(Some(count_calls));
    transport.endpoints_mut().bus_mut().receive(b"a");
    transport.poll();

    transport.set_rx_callback(None);
    transport.endpoints_mut().bus_mut().receive(b"b");
    transport.poll();

    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(transport.available(), 2);
}

// =============================================================================
// Split Halves
// =============================================================================

#[test]
fn split_halves_cooperate() {
    let mut state: CdcState = CdcState::new();
    let transport = Transport::init(&mut state, MockBus::new()).expect("init");
    let (mut serial, mut endpoints) = transport.split();

    endpoints.bus_mut().set_dtr(true);
    endpoints.bus_mut().receive(b"ping");
    while endpoints.service() {}

    assert!(serial.connected());
    assert_eq!(serial.available(), 4);
    let mut reply = Vec::new();
    while let Some(byte) = serial.recv_byte() {
        reply.push(byte.to_ascii_uppercase());
    }
    assert_eq!(serial.send(&reply), 4);

    endpoints.bus_mut().tick();
    endpoints.service();
    assert_eq!(endpoints.bus().writes_to(BULK_IN_ADDR), vec![b"PING".to_vec()]);
    assert!(!serial.flush_pending());
    assert!(endpoints.bus().writes_to(BULK_OUT_ADDR).is_empty());
}
