//! Synthetic plate photographs shared by unit tests, integration tests and
//! benches. Each includer provides `Image` in the parent module.

use super::Image;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy)]
pub struct DiskSpec {
    pub center: [f32; 2],
    pub radius: f32,
    /// Outer radius of the clear zone; `<= radius` means growth up to the disk.
    pub zone_radius: f32,
}

/// Dark background, lawn-covered plate, bright disks in darker clear zones.
#[derive(Debug, Clone)]
pub struct PlateScene {
    pub width: u32,
    pub height: u32,
    pub plate_center: [f32; 2],
    pub plate_radius: f32,
    pub background: f32,
    pub lawn: f32,
    pub clear: f32,
    pub disk: f32,
    /// Uniform noise amplitude added to every pixel (seeded).
    pub noise: f32,
    pub seed: u64,
    pub disks: Vec<DiskSpec>,
}

impl PlateScene {
    pub fn new(width: u32, height: u32, plate_center: [f32; 2], plate_radius: f32) -> Self {
        Self {
            width,
            height,
            plate_center,
            plate_radius,
            background: 0.05,
            lawn: 0.7,
            clear: 0.25,
            disk: 0.95,
            noise: 0.0,
            seed: 1,
            disks: Vec::new(),
        }
    }

    pub fn disk(mut self, center: [f32; 2], radius: f32, zone_radius: f32) -> Self {
        self.disks.push(DiskSpec {
            center,
            radius,
            zone_radius,
        });
        self
    }

    pub fn noise(mut self, amplitude: f32, seed: u64) -> Self {
        self.noise = amplitude;
        self.seed = seed;
        self
    }

    pub fn render(&self) -> Image {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut v = self.value_at(x as f32, y as f32);
                if self.noise > 0.0 {
                    v += rng.gen_range(-self.noise..=self.noise);
                }
                data.push(v.clamp(0.0, 1.0));
            }
        }
        Image::from_raw(self.width, self.height, data).expect("valid synthetic plate")
    }

    fn value_at(&self, x: f32, y: f32) -> f32 {
        let dist = |c: [f32; 2]| ((x - c[0]).powi(2) + (y - c[1]).powi(2)).sqrt();
        if dist(self.plate_center) > self.plate_radius {
            return self.background;
        }
        let mut in_zone = false;
        for d in &self.disks {
            let r = dist(d.center);
            if r <= d.radius {
                return self.disk;
            }
            in_zone |= r <= d.zone_radius;
        }
        if in_zone {
            self.clear
        } else {
            self.lawn
        }
    }
}

/// Uniform random noise in `[0, 1]`.
pub fn noise_image(width: u32, height: u32, seed: u64) -> Image {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..width as usize * height as usize)
        .map(|_| rng.gen::<f32>())
        .collect();
    Image::from_raw(width, height, data).expect("valid noise image")
}
