//! USB device construction
//!
//! Declares one CDC-ACM function (communication interface plus data
//! interface) with embassy-usb and hands back the three endpoints.

use embassy_usb::driver::Driver;
use embassy_usb::{Builder, Config, Handler, UsbDevice};

use crate::config::{
    BULK_MAX_PACKET_SIZE, CONTROL_BUFFER_SIZE, NOTIFY_INTERVAL_MS, NOTIFY_MAX_PACKET_SIZE, USB_MANUFACTURER,
    USB_PID, USB_PRODUCT, USB_SERIAL_NUMBER, USB_VID,
};

const USB_CLASS_CDC: u8 = 0x02;
const USB_CLASS_CDC_DATA: u8 = 0x0A;
const CDC_SUBCLASS_ACM: u8 = 0x02;
const CDC_PROTOCOL_NONE: u8 = 0x00;

const CS_INTERFACE: u8 = 0x24;
const CDC_TYPE_HEADER: u8 = 0x00;
const CDC_TYPE_CALL_MANAGEMENT: u8 = 0x01;
const CDC_TYPE_ACM: u8 = 0x02;
const CDC_TYPE_UNION: u8 = 0x06;

/// Descriptor and control-transfer scratch space handed to embassy-usb
pub struct UsbBuffers {
    config_descriptor: [u8; 256],
    bos_descriptor: [u8; 256],
    msos_descriptor: [u8; 256],
    control: [u8; CONTROL_BUFFER_SIZE],
}

impl UsbBuffers {
    /// Zeroed buffers
    #[must_use]
    pub const fn new() -> Self {
        Self {
            config_descriptor: [0; 256],
            bos_descriptor: [0; 256],
            msos_descriptor: [0; 256],
            control: [0; CONTROL_BUFFER_SIZE],
        }
    }
}

impl Default for UsbBuffers {
    fn default() -> Self {
        Self::new()
    }
}

/// Endpoints of the CDC function
pub struct CdcEndpoints<'d, D: Driver<'d>> {
    /// Bulk OUT, host to device data
    pub read: D::EndpointOut,
    /// Bulk IN, device to host data
    pub write: D::EndpointIn,
    /// Interrupt IN, serial state notifications
    pub notify: D::EndpointIn,
}

/// Device descriptor fields
#[must_use]
pub fn usb_config() -> Config<'static> {
    let mut config = Config::new(USB_VID, USB_PID);
    config.manufacturer = Some(USB_MANUFACTURER);
    config.product = Some(USB_PRODUCT);
    config.serial_number = Some(USB_SERIAL_NUMBER);
    config.max_power = 100;
    config.max_packet_size_0 = 64;
    config.device_release = 0x0100;

    // Interface association so hosts bind the ACM driver to both interfaces
    config.device_class = 0xEF;
    config.device_sub_class = 0x02;
    config.device_protocol = 0x01;
    config.composite_with_iads = true;
    config
}

/// Build the device with one CDC-ACM function
///
/// `handler` receives bus resets, configuration changes and class requests.
pub fn build<'d, D: Driver<'d>>(
    driver: D,
    buffers: &'d mut UsbBuffers,
    handler: &'d mut dyn Handler,
) -> (UsbDevice<'d, D>, CdcEndpoints<'d, D>) {
    let mut builder = Builder::new(
        driver,
        usb_config(),
        &mut buffers.config_descriptor,
        &mut buffers.bos_descriptor,
        &mut buffers.msos_descriptor,
        &mut buffers.control,
    );
    builder.handler(handler);

    let mut func = builder.function(USB_CLASS_CDC, CDC_SUBCLASS_ACM, CDC_PROTOCOL_NONE);

    // Communication interface
    let mut iface = func.interface();
    let comm_if = iface.interface_number();
    let data_if = u8::from(comm_if) + 1;
    let mut alt = iface.alt_setting(USB_CLASS_CDC, CDC_SUBCLASS_ACM, CDC_PROTOCOL_NONE, None);

    alt.descriptor(CS_INTERFACE, &[CDC_TYPE_HEADER, 0x10, 0x01]);
    alt.descriptor(CS_INTERFACE, &[CDC_TYPE_ACM, 0x02]);
    alt.descriptor(CS_INTERFACE, &[CDC_TYPE_UNION, comm_if.into(), data_if]);
    alt.descriptor(CS_INTERFACE, &[CDC_TYPE_CALL_MANAGEMENT, 0x00, data_if]);

    let notify = alt.endpoint_interrupt_in(NOTIFY_MAX_PACKET_SIZE as u16, NOTIFY_INTERVAL_MS);

    // Data interface
    let mut iface = func.interface();
    let mut alt = iface.alt_setting(USB_CLASS_CDC_DATA, 0x00, 0x00, None);
    let read = alt.endpoint_bulk_out(BULK_MAX_PACKET_SIZE as u16);
    let write = alt.endpoint_bulk_in(BULK_MAX_PACKET_SIZE as u16);

    drop(func);
    let device = builder.build();

    defmt::info!("USB({:04X}:{:04X}) CDC-ACM on interface {}", USB_VID, USB_PID, u8::from(comm_if));

    (device, CdcEndpoints { read, write, notify })
}
