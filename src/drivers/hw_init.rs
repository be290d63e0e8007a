//! One-shot hardware peripheral initialization.
//!
//! Configures the TMP36 ADC channel, GPIO directions, and the two edge
//! interrupts using raw ESP-IDF sys calls.  Called once from `main()`
//! before the control loop starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc)    => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_adc()?;
        init_gpio_inputs()?;
        init_gpio_outputs()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

/// ADC1 channel wired to the TMP36.
pub const ADC1_CH_TMP36: u32 = 0;
/// Full-scale input at 12 dB attenuation, millivolts.
pub const ADC_FULL_SCALE_MV: u32 = 3300;
/// 12-bit conversions.
pub const ADC_MAX_RAW: u32 = 4095;

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path.  `init_adc()` completes before the loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 { return Err(HwInitError::AdcInitFailed(ret)); }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), ADC1_CH_TMP36, &chan_cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::AdcInitFailed(ret)); }

    info!("hw_init: ADC1 configured (CH0=TMP36)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> u16 {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract, single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return 0;
    }
    raw.max(0) as u16
}

/// Raw 12-bit reading to millivolts at the pin.
pub fn raw_to_millivolts(raw: u16) -> u32 {
    u32::from(raw) * ADC_FULL_SCALE_MV / ADC_MAX_RAW
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    // Sensor and watchdog wake idle low; the user switch idles high.
    let inputs = [
        (pins::SENSOR_INT_GPIO, false),
        (pins::WDT_WAKE_GPIO, false),
        (pins::USER_SWITCH_GPIO, true),
    ];

    for &(pin, pull_up) in &inputs {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: if pull_up {
                gpio_pullup_t_GPIO_PULLUP_ENABLE
            } else {
                gpio_pullup_t_GPIO_PULLUP_DISABLE
            },
            pull_down_en: if pull_up {
                gpio_pulldown_t_GPIO_PULLDOWN_DISABLE
            } else {
                gpio_pulldown_t_GPIO_PULLDOWN_ENABLE
            },
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    }

    info!("hw_init: GPIO inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe to call from main context.
    (unsafe { gpio_get_level(pin) }) != 0
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    // (pin, level at boot)
    let outputs = [
        (pins::SENSOR_DISABLE_GPIO, false),
        (pins::SENSOR_LED_POWER_GPIO, true),
        (pins::WDT_DONE_GPIO, false),
        (pins::TMP36_SHUTDOWN_GPIO, true),
        (pins::MODEM_POWER_GPIO, false),
        (pins::MODEM_RESET_GPIO, false),
        (pins::ACTIVITY_LED_GPIO, false),
        (pins::HARD_RESET_GPIO, false),
    ];

    for &(pin, level) in &outputs {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
        unsafe { gpio_set_level(pin, u32::from(level)) };
    }

    info!("hw_init: GPIO outputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // main-loop only.
    unsafe { gpio_set_level(pin, u32::from(high)); }
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn sensor_gpio_isr(_arg: *mut core::ffi::c_void) {
    crate::events::SENSOR_EDGE.raise();
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn watchdog_gpio_isr(_arg: *mut core::ffi::c_void) {
    crate::events::WATCHDOG_KICK.raise();
}

/// Install the per-pin ISR service and register both edge handlers.
/// Call after `init_peripherals()` and before the control loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  The handlers only raise atomics.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        gpio_set_intr_type(pins::SENSOR_INT_GPIO, gpio_int_type_t_GPIO_INTR_POSEDGE);
        gpio_isr_handler_add(pins::SENSOR_INT_GPIO, Some(sensor_gpio_isr), core::ptr::null_mut());
        gpio_intr_enable(pins::SENSOR_INT_GPIO);

        gpio_set_intr_type(pins::WDT_WAKE_GPIO, gpio_int_type_t_GPIO_INTR_POSEDGE);
        gpio_isr_handler_add(pins::WDT_WAKE_GPIO, Some(watchdog_gpio_isr), core::ptr::null_mut());
        gpio_intr_enable(pins::WDT_WAKE_GPIO);

        info!("hw_init: ISR service installed (sensor, watchdog wake)");
    }
    Ok(())
}

/// Arm or disarm the sensor interrupt without touching the handler.
#[cfg(target_os = "espidf")]
pub fn set_sensor_interrupt(enabled: bool) {
    // SAFETY: the pin's handler was registered in init_isr_service().
    unsafe {
        if enabled {
            gpio_intr_enable(pins::SENSOR_INT_GPIO);
        } else {
            gpio_intr_disable(pins::SENSOR_INT_GPIO);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adc_scale_endpoints() {
        assert_eq!(raw_to_millivolts(0), 0);
        assert_eq!(raw_to_millivolts(4095), 3300);
        assert_eq!(raw_to_millivolts(1241), 1000);
    }
}
