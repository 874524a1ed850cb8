//! Shared synthetic images for unit tests.

use crate::pixels::Image;

#[path = "../tests/common/synthetic_plate.rs"]
#[allow(dead_code)]
mod synthetic_plate;

pub(crate) use synthetic_plate::PlateScene;

/// Render a filled disk.
///
/// Pixels at distance `d <= radius` from `center` get `inside`, all others
/// get `outside`.
pub(crate) fn draw_disk_image(
    w: u32,
    h: u32,
    center: [f32; 2],
    radius: f32,
    inside: f32,
    outside: f32,
) -> Image {
    let mut data = Vec::with_capacity(w as usize * h as usize);
    for y in 0..h {
        for x in 0..w {
            let dx = x as f32 - center[0];
            let dy = y as f32 - center[1];
            let d = (dx * dx + dy * dy).sqrt();
            data.push(if d <= radius { inside } else { outside });
        }
    }
    Image::from_raw(w, h, data).expect("valid synthetic image")
}

/// Gaussian-blur a test image.
pub(crate) fn blur(img: &Image, sigma: f32) -> Image {
    img.gaussian_blur(sigma)
}
