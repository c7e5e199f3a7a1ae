//! Domain types and the ports through which the pipeline reaches the device.

pub mod payment;
pub mod ports;
pub mod sms;
