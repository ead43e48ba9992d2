//! Virtual camera: returns a generated still frame.

use std::sync::atomic::{AtomicU8, Ordering};

use commoniot_app::ports::DeviceDriver;
use commoniot_domain::error::DriverError;

const WIDTH: usize = 4;
const HEIGHT: usize = 4;

/// Produces a tiny binary PPM whose gray level changes on every capture.
#[derive(Debug, Default)]
pub struct VirtualCamera {
    frame: AtomicU8,
}

impl DeviceDriver for VirtualCamera {
    fn picture(&self) -> Result<Vec<u8>, DriverError> {
        let level = self.frame.fetch_add(16, Ordering::Relaxed);
        let mut image = format!("P6\n{WIDTH} {HEIGHT}\n255\n").into_bytes();
        image.extend(std::iter::repeat_n(level, WIDTH * HEIGHT * 3));
        Ok(image)
    }
}
