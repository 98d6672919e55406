// esp/tach.rs

use std::{ffi::c_void, sync::Arc};

use esp_idf_hal::{
    gpio::{Input, InputPin, InterruptType, PinDriver, Pull},
    peripheral::Peripheral,
};
use esp_idf_sys::{self as sys, esp};
use log::*;

use crate::PulseCounter;

/// Falling-edge interrupt on the fan tachometer line.
///
/// The handler gets a raw pointer to the counter; the `Arc` held here keeps
/// it alive until the handler is removed on drop.
pub struct Tachometer<'d, T: InputPin> {
    pin: PinDriver<'d, T, Input>,
    _counter: Arc<PulseCounter>,
}

unsafe extern "C" fn on_tach_edge(arg: *mut c_void) {
    let counter = &*(arg as *const PulseCounter);
    counter.on_edge();
}

impl<'d, T: InputPin> Tachometer<'d, T> {
    pub fn new(pin: impl Peripheral<P = T> + 'd, counter: Arc<PulseCounter>) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input(pin)?;
        pin.set_pull(Pull::Up)?;
        pin.set_interrupt_type(InterruptType::NegEdge)?;

        let gpio = pin.pin();
        unsafe {
            let r = sys::gpio_install_isr_service(0);
            if r != sys::ESP_OK as sys::esp_err_t && r != sys::ESP_ERR_INVALID_STATE as sys::esp_err_t {
                esp!(r)?;
            }
            esp!(sys::gpio_isr_handler_add(
                gpio,
                Some(on_tach_edge),
                Arc::as_ptr(&counter) as *mut c_void,
            ))?;
            esp!(sys::gpio_intr_enable(gpio))?;
        }
        info!("Tachometer interrupt on gpio{gpio}");

        Ok(Self {
            pin,
            _counter: counter,
        })
    }
}

impl<T: InputPin> Drop for Tachometer<'_, T> {
    fn drop(&mut self) {
        unsafe {
            sys::gpio_isr_handler_remove(self.pin.pin());
        }
    }
}

// EOF
