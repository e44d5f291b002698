//! Seeded coherent noise: 2D/3D value noise, fBm, and a curl-derived
//! divergence-free vector field.

use bevy::prelude::*;

use crate::grid::GridDims;

/// Finite-difference step used by [`NoiseField::curl`], in noise space.
const CURL_EPSILON: f32 = 0.01;

#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseField {
    seed: u32,
}

impl NoiseField {
    pub fn new(seed: u64) -> Self {
        Self {
            seed: mix_seed(0x9E37_79B9, seed, 0),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// A field-local seed for an independent noise channel.
    pub fn channel(&self, salt: u32) -> u32 {
        self.seed.rotate_left(5) ^ salt.wrapping_mul(0x85EB_CA6B)
    }

    /// Smooth value noise in `[0, 1]`.
    pub fn value2(&self, x: f32, y: f32, salt: u32) -> f32 {
        value_noise2(x, y, self.channel(salt))
    }

    pub fn value3(&self, x: f32, y: f32, z: f32, salt: u32) -> f32 {
        value_noise3(x, y, z, self.channel(salt))
    }

    pub fn fbm2(&self, x: f32, y: f32, octaves: u32, salt: u32) -> f32 {
        let seed = self.channel(salt);
        fbm(octaves, 2.0, 0.5, |frequency, i| {
            value_noise2(x * frequency, y * frequency, seed.wrapping_add(i))
        })
    }

    pub fn fbm3(&self, x: f32, y: f32, z: f32, octaves: u32, salt: u32) -> f32 {
        let seed = self.channel(salt);
        fbm(octaves, 2.0, 0.5, |frequency, i| {
            value_noise3(x * frequency, y * frequency, z * frequency, seed.wrapping_add(i))
        })
    }

    /// Curl of the scalar potential `fbm3(x, y, z)`: `(dψ/dy, -dψ/dx)`.
    ///
    /// The result has zero divergence, so particles advected by it neither
    /// bunch up nor thin out.
    pub fn curl(&self, x: f32, y: f32, z: f32, salt: u32) -> Vec2 {
        let e = CURL_EPSILON;
        let dpsi_dx =
            (self.fbm3(x + e, y, z, 3, salt) - self.fbm3(x - e, y, z, 3, salt)) / (2.0 * e);
        let dpsi_dy =
            (self.fbm3(x, y + e, z, 3, salt) - self.fbm3(x, y - e, z, 3, salt)) / (2.0 * e);
        Vec2::new(dpsi_dy, -dpsi_dx)
    }

    /// Per-cell hash in `[0, 1]`, uncorrelated between neighbours.
    pub fn hash_unit(&self, x: i32, y: i32, salt: u32) -> f32 {
        hash2(x, y, self.channel(salt))
    }

    /// fBm sampled over the whole grid and rescaled to span `[0, 1]`.
    pub fn normalised_field(&self, dims: GridDims, scale: f32, salt: u32) -> Vec<f32> {
        let mut values = Vec::with_capacity(dims.len());
        for y in 0..dims.height {
            for x in 0..dims.width {
                values.push(self.fbm2(x as f32 * scale, y as f32 * scale, 4, salt));
            }
        }
        normalise(values)
    }
}

fn normalise(mut values: Vec<f32>) -> Vec<f32> {
    let mut min_v = f32::MAX;
    let mut max_v = f32::MIN;
    for &v in &values {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }
    let scale = if (max_v - min_v).abs() < f32::EPSILON {
        0.0
    } else {
        1.0 / (max_v - min_v)
    };
    for v in &mut values {
        *v = ((*v - min_v) * scale).clamp(0.0, 1.0);
    }
    values
}

fn fbm(octaves: u32, lacunarity: f32, gain: f32, mut sample: impl FnMut(f32, u32) -> f32) -> f32 {
    let mut frequency = 1.0;
    let mut amplitude = 1.0;
    let mut sum = 0.0;
    let mut normaliser = 0.0;
    for i in 0..octaves.max(1) {
        sum += sample(frequency, i) * amplitude;
        normaliser += amplitude;
        frequency *= lacunarity;
        amplitude *= gain;
    }
    (sum / normaliser).clamp(0.0, 1.0)
}

fn value_noise2(x: f32, y: f32, seed: u32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let tx = smooth_step(x - x0 as f32);
    let ty = smooth_step(y - y0 as f32);

    let v00 = hash2(x0, y0, seed);
    let v10 = hash2(x0 + 1, y0, seed);
    let v01 = hash2(x0, y0 + 1, seed);
    let v11 = hash2(x0 + 1, y0 + 1, seed);

    lerp(lerp(v00, v10, tx), lerp(v01, v11, tx), ty)
}

fn value_noise3(x: f32, y: f32, z: f32, seed: u32) -> f32 {
    let z0 = z.floor() as i32;
    let tz = smooth_step(z - z0 as f32);
    let lower = value_noise2(x, y, seed ^ hash_lane(z0));
    let upper = value_noise2(x, y, seed ^ hash_lane(z0 + 1));
    lerp(lower, upper, tz)
}

fn hash_lane(z: i32) -> u32 {
    let mut n = (z as u32).wrapping_mul(0x27D4_EB2F);
    n ^= n >> 15;
    n.wrapping_mul(0x1656_67B1)
}

fn smooth_step(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn hash2(x: i32, y: i32, seed: u32) -> f32 {
    let mut n = x as u32;
    n = n.wrapping_mul(0x6C8E_9CF5) ^ (y as u32).wrapping_mul(0xB529_7A4D) ^ seed;
    n ^= n >> 13;
    n = n.wrapping_mul(0x1B56_C4E9);
    n ^= n >> 11;
    ((n >> 8) & 0xFFFF) as f32 / 65535.0
}

fn mix_seed(base: u32, seed: u64, salt: u32) -> u32 {
    let seed_low = seed as u32;
    let seed_high = (seed >> 32) as u32;
    base ^ seed_low.rotate_left(7) ^ seed_high.rotate_left(11) ^ salt
}

/// Hermite step between `edge0` and `edge1`, clamped to `[0, 1]`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if (edge1 - edge0).abs() < f32::EPSILON {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    smooth_step(((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0))
}
