//! Sampling helpers over an injected random source.
//!
//! Nothing here touches ambient randomness: every function takes the caller's
//! [`Rng`] so a seeded generator reproduces a scene draw for draw.

use glam::{Vec2, Vec3};
use rand::Rng;

/// Uniform f32 in [min, max).
pub fn random_f32_range<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    min + (max - min) * rng.random::<f32>()
}

/// Uniform point inside a disk of the given radius, centred on the origin.
///
/// Taking the square root of the radial draw keeps the density uniform over
/// the disk area instead of clustering points near the centre.
pub fn random_in_disk<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Vec2 {
    let r = radius * rng.random::<f32>().sqrt();
    let theta = std::f32::consts::TAU * rng.random::<f32>();
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Random colour drawn uniformly in HSV space, returned as linear RGB.
///
/// Hue, saturation and value are each drawn in [0, 1), in that order.
pub fn random_color_hsv<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let h = rng.random::<f32>();
    let s = rng.random::<f32>();
    let v = rng.random::<f32>();
    hsv_to_rgb(h, s, v)
}

/// Sub-pixel jitter for one frame, in [0, 1)².
pub fn random_pixel_offset<R: Rng + ?Sized>(rng: &mut R) -> Vec2 {
    Vec2::new(rng.random::<f32>(), rng.random::<f32>())
}

/// Convert HSV (all components in [0, 1]) to RGB.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    if s <= 0.0 {
        return Vec3::splat(v);
    }

    let h = h.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match sector as u32 {
        0 => Vec3::new(v, t, p),
        1 => Vec3::new(q, v, p),
        2 => Vec3::new(p, v, t),
        3 => Vec3::new(p, q, v),
        4 => Vec3::new(t, p, v),
        _ => Vec3::new(v, p, q),
    }
}
