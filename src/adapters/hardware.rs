//! Hardware adapter — builds the [`RangingPort`] the detection loop uses.
//!
//! On the device this is a [`SensorHub`] of two HC-SR04 [`Ranger`]s on
//! the GPIOs from [`pins`](crate::pins).  On every other target it is the
//! injectable [`SimRanging`].  This is the only module in the system that
//! touches the sensor GPIOs.
//!
//! [`RangingPort`]: crate::app::ports::RangingPort
//! [`SensorHub`]: crate::sensors::SensorHub
//! [`Ranger`]: crate::sensors::Ranger
//! [`SimRanging`]: crate::sensors::SimRanging

use crate::config::SystemConfig;

#[cfg(target_os = "espidf")]
mod device {
    use esp_idf_hal::delay::Ets;
    use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, Input, Output, PinDriver, Pull};
    use log::info;

    use crate::adapters::time::Esp32TimeAdapter;
    use crate::config::SystemConfig;
    use crate::pins;
    use crate::sensors::ranger::RangerSettings;
    use crate::sensors::{Ranger, SensorHub, SensorId};

    pub type TriggerPin = PinDriver<'static, AnyOutputPin, Output>;
    pub type EchoPin = PinDriver<'static, AnyIOPin, Input>;
    pub type GateSensors = SensorHub<TriggerPin, EchoPin, Ets, Esp32TimeAdapter>;

    fn ranger(
        id: SensorId,
        trig_gpio: i32,
        echo_gpio: i32,
        settings: RangerSettings,
    ) -> anyhow::Result<Ranger<TriggerPin, EchoPin, Ets, Esp32TimeAdapter>> {
        // SAFETY: each GPIO number in `pins` is claimed exactly once, here,
        // and no other driver in the firmware touches these pins.
        let trigger = PinDriver::output(unsafe { AnyOutputPin::new(trig_gpio) })?;
        let mut echo = PinDriver::input(unsafe { AnyIOPin::new(echo_gpio) })?;
        echo.set_pull(Pull::Down)?;
        info!("hw: ranger {} on TRIG={} ECHO={}", id, trig_gpio, echo_gpio);
        Ok(Ranger::new(id, trigger, echo, Ets, Esp32TimeAdapter::new(), settings))
    }

    pub fn build_sensors(config: &SystemConfig) -> anyhow::Result<GateSensors> {
        let settings = RangerSettings::from(config);
        Ok(SensorHub::new(
            ranger(SensorId::A, pins::TRIG_A_GPIO, pins::ECHO_A_GPIO, settings)?,
            ranger(SensorId::B, pins::TRIG_B_GPIO, pins::ECHO_B_GPIO, settings)?,
        ))
    }
}

#[cfg(target_os = "espidf")]
pub use device::GateSensors;

/// Simulated sensors on host targets.
#[cfg(not(target_os = "espidf"))]
pub type GateSensors = crate::sensors::SimRanging;

/// Claim the sensor GPIOs and build both rangers.
#[cfg(target_os = "espidf")]
pub fn build_sensors(config: &SystemConfig) -> anyhow::Result<GateSensors> {
    device::build_sensors(config)
}

#[cfg(not(target_os = "espidf"))]
pub fn build_sensors(config: &SystemConfig) -> anyhow::Result<GateSensors> {
    log::info!(
        "hw(sim): simulated rangers ({} samples/reading)",
        config.samples_per_reading
    );
    Ok(crate::sensors::SimRanging)
}
