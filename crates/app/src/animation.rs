//! Light animations.
//!
//! Each device owns one [`Animator`]. Starting an animation spawns a task that
//! owns a [`CancellationToken`]; starting another one, or stopping, cancels
//! that token. The loop waits on the token at every pause, so a preempted
//! animation ends at its next step boundary at the latest.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use commoniot_domain::color::{COLOR_WHEEL, Color};
use commoniot_domain::device::Capability;
use commoniot_domain::error::{DriverError, InvalidArgument};
use commoniot_domain::id::DeviceId;

use crate::ports::DeviceDriver;

/// Shortest pause between two animation steps.
pub const MIN_STEP: Duration = Duration::from_millis(50);

pub const DEFAULT_BLINK_SPEED: f64 = 0.0;
pub const DEFAULT_BEACON_SPEED: f64 = 0.7;
pub const DEFAULT_BEACON_SLOW_SPEED: f64 = 0.9;
pub const DEFAULT_COLOR_TIME: Duration = Duration::from_secs(2);

const CROSS_FADE_STEPS: u16 = 100;
const BEACON_LEVELS: [u8; 4] = [100, 50, 1, 50];

/// A looping light behaviour.
///
/// `speed` lies in `[0, 1]`; each step lasts `1 - speed` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Animation {
    /// Alternate off and on.
    Blink { speed: f64 },
    /// Pulse through 100, 50, 1, 50 percent brightness.
    Beacon { speed: f64 },
    /// Ramp brightness up and down in steps of 5.
    BeaconSlow { speed: f64 },
    /// Walk the color wheel, optionally fading between neighbours.
    ColorCycle { color_time: Duration, cross_fade: bool },
    /// Jump to a random color every `color_time`.
    RandomColorCycle { color_time: Duration },
}

impl Animation {
    /// Name reported as the device's current mode.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Blink { .. } => "blink",
            Self::Beacon { .. } => "beacon",
            Self::BeaconSlow { .. } => "beacon_slow",
            Self::ColorCycle { .. } => "color_cycle",
            Self::RandomColorCycle { .. } => "random_color_cycle",
        }
    }

    #[must_use]
    pub fn required_capability(&self) -> Capability {
        match self {
            Self::Blink { .. } => Capability::BlinkLight,
            Self::Beacon { .. } | Self::BeaconSlow { .. } => Capability::BeaconLight,
            Self::ColorCycle { .. } | Self::RandomColorCycle { .. } => Capability::ChangeColor,
        }
    }

    /// Reject speeds outside `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] naming the animation.
    pub fn validate(&self) -> Result<(), InvalidArgument> {
        match self {
            Self::Blink { speed } | Self::Beacon { speed } | Self::BeaconSlow { speed }
                if !(0.0..=1.0).contains(speed) =>
            {
                Err(InvalidArgument::new(
                    self.mode(),
                    format!("speed must be within [0, 1], got {speed}"),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Pause between steps for a given speed.
#[must_use]
pub fn step_period(speed: f64) -> Duration {
    Duration::from_secs_f64(1.0 - speed.clamp(0.0, 1.0)).max(MIN_STEP)
}

#[must_use]
pub fn random_color() -> Color {
    Color::from_rgb(rand::random(), rand::random(), rand::random())
}

#[derive(Debug)]
struct Running {
    mode: &'static str,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Holder of the single animation a device may run.
#[derive(Debug, Default)]
pub struct Animator {
    active: Mutex<Option<Running>>,
}

impl Animator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `animation`, cancelling whatever ran before.
    ///
    /// Returns the handle of the preempted task, if any, so callers can wait
    /// for it to wind down.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Rejected`] when called outside a tokio runtime.
    pub fn start(
        &self,
        device_id: &DeviceId,
        animation: Animation,
        driver: Arc<dyn DeviceDriver>,
    ) -> Result<Option<JoinHandle<()>>, DriverError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| DriverError::Rejected("no async runtime to run animations".into()))?;

        let mut active = self.lock();
        let previous = active.take().map(|running| {
            running.token.cancel();
            running.handle
        });

        let token = CancellationToken::new();
        let task_token = token.clone();
        let device_id = device_id.clone();
        let mode = animation.mode();
        let handle = runtime.spawn(async move {
            tracing::debug!(device_id = %device_id, mode, "animation started");
            match run(animation, driver, &task_token).await {
                Ok(()) => tracing::debug!(device_id = %device_id, mode, "animation cancelled"),
                Err(err) => {
                    tracing::warn!(device_id = %device_id, mode, err = %err, "animation aborted");
                }
            }
        });

        *active = Some(Running {
            mode,
            token,
            handle,
        });
        Ok(previous)
    }

    /// Cancel the running animation. Returns its handle if one was active.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        self.lock().take().map(|running| {
            running.token.cancel();
            running.handle
        })
    }

    /// Mode of the animation still running, if any.
    #[must_use]
    pub fn mode(&self) -> Option<&'static str> {
        self.lock()
            .as_ref()
            .filter(|running| !running.handle.is_finished())
            .map(|running| running.mode)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Animator {
    fn drop(&mut self) {
        let active = self
            .active
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = active.take() {
            running.token.cancel();
        }
    }
}

/// Sleep for `period` unless cancelled first. Returns `false` on cancellation.
async fn hold(token: &CancellationToken, period: Duration) -> bool {
    tokio::select! {
        () = token.cancelled() => false,
        () = tokio::time::sleep(period) => true,
    }
}

async fn run(
    animation: Animation,
    driver: Arc<dyn DeviceDriver>,
    token: &CancellationToken,
) -> Result<(), DriverError> {
    let driver = driver.as_ref();
    match animation {
        Animation::Blink { speed } => {
            let period = step_period(speed);
            loop {
                driver.turn_off()?;
                if !hold(token, period).await {
                    return Ok(());
                }
                driver.turn_on()?;
                if !hold(token, period).await {
                    return Ok(());
                }
            }
        }
        Animation::Beacon { speed } => {
            let period = step_period(speed);
            loop {
                for level in BEACON_LEVELS {
                    driver.set_brightness(level)?;
                    if !hold(token, period).await {
                        return Ok(());
                    }
                }
            }
        }
        Animation::BeaconSlow { speed } => {
            let period = step_period(speed);
            let ramp = (10..=100u8).step_by(5).chain((5..=95u8).rev().step_by(5));
            let ramp: Vec<u8> = ramp.collect();
            loop {
                for &level in &ramp {
                    driver.set_brightness(level)?;
                    if !hold(token, period).await {
                        return Ok(());
                    }
                }
            }
        }
        Animation::ColorCycle {
            color_time,
            cross_fade,
        } => {
            let color_time = color_time.max(MIN_STEP);
            let mut index = 0;
            loop {
                let color = COLOR_WHEEL[index];
                index = (index + 1) % COLOR_WHEEL.len();
                driver.set_color(color)?;
                if !hold(token, color_time).await {
                    return Ok(());
                }
                if cross_fade {
                    for step in color.fade_to(COLOR_WHEEL[index], CROSS_FADE_STEPS) {
                        if token.is_cancelled() {
                            return Ok(());
                        }
                        driver.set_color(step)?;
                    }
                }
            }
        }
        Animation::RandomColorCycle { color_time } => {
            let color_time = color_time.max(MIN_STEP);
            loop {
                driver.set_color(random_color())?;
                if !hold(token, color_time).await {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> Result<(), DriverError> {
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    impl DeviceDriver for Recorder {
        fn turn_on(&self) -> Result<(), DriverError> {
            self.record("on".into())
        }

        fn turn_off(&self) -> Result<(), DriverError> {
            self.record("off".into())
        }

        fn set_brightness(&self, percent: u8) -> Result<(), DriverError> {
            self.record(format!("brightness:{percent}"))
        }

        fn set_color(&self, color: Color) -> Result<(), DriverError> {
            self.record(format!("color:{}", color.hex()))
        }
    }

    fn id() -> DeviceId {
        DeviceId::new("lamp")
    }

    #[test]
    fn should_reject_speed_outside_unit_interval() {
        assert!(Animation::Blink { speed: 1.5 }.validate().is_err());
        assert!(Animation::Beacon { speed: -0.1 }.validate().is_err());
        assert!(Animation::BeaconSlow { speed: f64::NAN }.validate().is_err());
        assert!(Animation::Blink { speed: 1.0 }.validate().is_ok());
    }

    #[test]
    fn should_floor_step_period() {
        assert_eq!(step_period(0.0), Duration::from_secs(1));
        assert_eq!(step_period(0.5), Duration::from_millis(500));
        assert_eq!(step_period(1.0), MIN_STEP);
    }

    #[test]
    fn should_refuse_to_start_outside_runtime() {
        let animator = Animator::new();
        let driver: Arc<dyn DeviceDriver> = Arc::new(Recorder::default());
        let result = animator.start(&id(), Animation::Blink { speed: 0.5 }, driver);
        assert!(matches!(result, Err(DriverError::Rejected(_))));
        assert_eq!(animator.mode(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn should_pulse_beacon_levels_in_order() {
        let animator = Animator::new();
        let recorder = Arc::new(Recorder::default());
        animator
            .start(&id(), Animation::Beacon { speed: 0.5 }, recorder.clone())
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1750)).await;

        assert_eq!(
            recorder.calls(),
            vec!["brightness:100", "brightness:50", "brightness:1", "brightness:50"]
        );
        assert_eq!(animator.mode(), Some("beacon"));
    }

    #[tokio::test(start_paused = true)]
    async fn should_preempt_blink_when_beacon_starts() {
        let animator = Animator::new();
        let recorder = Arc::new(Recorder::default());

        let none = animator
            .start(&id(), Animation::Blink { speed: 0.0 }, recorder.clone())
            .unwrap();
        assert!(none.is_none());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let blink = animator
            .start(&id(), Animation::Beacon { speed: 0.0 }, recorder.clone())
            .unwrap()
            .expect("blink handle");
        blink.await.unwrap();

        assert_eq!(animator.mode(), Some("beacon"));
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let calls = recorder.calls();
        assert_eq!(calls.iter().filter(|c| *c == "off" || *c == "on").count(), 1);
        assert!(calls.iter().skip(1).all(|c| c.starts_with("brightness:")));
    }

    #[tokio::test(start_paused = true)]
    async fn should_clear_mode_after_stop() {
        let animator = Animator::new();
        let recorder = Arc::new(Recorder::default());
        animator
            .start(&id(), Animation::Blink { speed: 0.9 }, recorder)
            .unwrap();

        let handle = animator.stop().expect("running");
        handle.await.unwrap();

        assert_eq!(animator.mode(), None);
        assert!(animator.stop().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_walk_color_wheel() {
        let animator = Animator::new();
        let recorder = Arc::new(Recorder::default());
        animator
            .start(
                &id(),
                Animation::ColorCycle {
                    color_time: Duration::from_secs(1),
                    cross_fade: false,
                },
                recorder.clone(),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(
            recorder.calls(),
            vec!["color:#ff0000", "color:#ff7d00", "color:#ffff00"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_no_mode_once_task_ends_on_driver_error() {
        struct Broken;
        impl DeviceDriver for Broken {}

        let animator = Animator::new();
        animator
            .start(&id(), Animation::Blink { speed: 0.5 }, Arc::new(Broken))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(animator.mode(), None);
    }
}
