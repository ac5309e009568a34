//! Virtual COM Port Firmware
//!
//! Entry point for the STM32F103 flight/rocket controller. Brings up the
//! clocks and the USB peripheral, then serves an echo console over the
//! CDC-ACM transport.

#![no_std]
#![no_main]

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::peripherals::USB;
use embassy_stm32::time::Hertz;
use embassy_stm32::{bind_interrupts, usb};
use embassy_sync::blocking_mutex::Mutex;
use embassy_usb::UsbDevice;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use cdc_vcom::prelude::*;
use cdc_vcom::usb::bridge::{run_data_pump, ControlHandler, EmbassyBus, SharedEndpoints};
use cdc_vcom::usb::device::{self, UsbBuffers};

// Bind interrupt handlers
bind_interrupts!(struct Irqs {
    USB_LP_CAN1_RX0 => usb::InterruptHandler<USB>;
});

type UsbDriver = usb::Driver<'static, USB>;
type BulkOut = <UsbDriver as embassy_usb::driver::Driver<'static>>::EndpointOut;
type BulkIn = <UsbDriver as embassy_usb::driver::Driver<'static>>::EndpointIn;

static ENDPOINT_MANAGER: SharedEndpoints = Mutex::new(RefCell::new(None));
static CDC_STATE: StaticCell<CdcState> = StaticCell::new();
static USB_BUFFERS: StaticCell<UsbBuffers> = StaticCell::new();
static CONTROL_HANDLER: StaticCell<ControlHandler> = StaticCell::new();

/// Set by the receive hook when the host sends an `h`
static BLINK_REQUEST: AtomicBool = AtomicBool::new(false);

fn on_packet(packet: &[u8]) {
    if packet.first() == Some(&b'h') {
        BLINK_REQUEST.store(true, Ordering::Relaxed);
    }
}

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Virtual COM port firmware v{}", env!("CARGO_PKG_VERSION"));

    // 8 MHz HSE, 72 MHz system clock, 48 MHz USB clock
    let mut config = embassy_stm32::Config::default();
    {
        use embassy_stm32::rcc::*;
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll = Some(Pll {
            src: PllSource::HSE,
            prediv: PllPreDiv::DIV1,
            mul: PllMul::MUL9,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV2;
        config.rcc.apb2_pre = APBPrescaler::DIV1;
    }
    let p = embassy_stm32::init(config);

    info!("Peripherals initialized");

    // Status LED on PC13 (active low on the blue pill)
    let led = Output::new(p.PC13, Level::High, Speed::Low);

    let driver = usb::Driver::new(p.USB, Irqs, p.PA12, p.PA11);

    // EmbassyBus cannot fail to start
    let mut transport = match Transport::init(CDC_STATE.init(CdcState::new()), EmbassyBus::new()) {
        Ok(transport) => transport,
        Err(err) => match *err.source() {},
    };
    transport.set_rx_callback(Some(on_packet));
    let (mut serial, endpoints) = transport.split();
    ENDPOINT_MANAGER.lock(|cell| *cell.borrow_mut() = Some(endpoints));

    let handler = CONTROL_HANDLER.init(ControlHandler::new(&ENDPOINT_MANAGER));
    let (usb_device, cdc) = device::build(driver, USB_BUFFERS.init(UsbBuffers::new()), handler);

    unwrap!(spawner.spawn(usb_device_task(usb_device)));
    unwrap!(spawner.spawn(cdc_pump_task(cdc.read, cdc.write, cdc.notify)));
    unwrap!(spawner.spawn(heartbeat_task(led)));

    info!("Tasks spawned, entering echo loop");

    // Echo everything the host sends
    loop {
        while let Some(byte) = serial.recv_byte() {
            serial.send_byte(byte);
        }
        Timer::after(Duration::from_millis(1)).await;
    }
}

/// Runs enumeration and control transfers
#[embassy_executor::task]
async fn usb_device_task(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    device.run().await
}

/// Moves bulk packets and frame ticks into the endpoint manager
#[embassy_executor::task]
async fn cdc_pump_task(read: BulkOut, write: BulkIn, notify: BulkIn) -> ! {
    run_data_pump(&ENDPOINT_MANAGER, read, write, notify).await
}

/// Heartbeat task - blinks LED to show system is running, long pulse after the host sends `h`
#[embassy_executor::task]
async fn heartbeat_task(mut led: Output<'static>) {
    loop {
        let on_ms = if BLINK_REQUEST.swap(false, Ordering::Relaxed) { 500 } else { 100 };
        led.set_low();
        Timer::after(Duration::from_millis(on_ms)).await;
        led.set_high();
        Timer::after(Duration::from_millis(900)).await;
    }
}
