use glam::{Vec2, Vec3};
use rand::Rng;

use crate::{
    error::{Error, Result},
    random,
};

/// Reflectance of every dielectric sphere, per channel.
pub const DIELECTRIC_SPECULAR: f32 = 0.04;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub spheres: Vec<Sphere>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub position: Vec3,
    pub radius: f32,

    pub albedo: Vec3,
    pub specular: Vec3,
}

impl Default for Sphere {
    fn default() -> Self {
        Self::anchor()
    }
}

impl Sphere {
    /// The fixed grey sphere every scene starts with.
    pub fn anchor() -> Self {
        Self {
            position: Vec3::ZERO,
            radius: 1.0,
            albedo: Vec3::splat(0.5),
            specular: Vec3::splat(0.5),
        }
    }

    pub fn is_metallic(&self) -> bool {
        self.albedo == Vec3::ZERO
    }

    /// True when the two spheres interpenetrate. Touching is allowed.
    pub fn overlaps(&self, other: &Sphere) -> bool {
        let min_dist = self.radius + other.radius;
        self.position.distance_squared(other.position) < min_dist * min_dist
    }
}

/// Placement parameters, fixed for the lifetime of an activation.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Inclusive `[min, max]` radius of placed spheres.
    pub sphere_radius: Vec2,
    /// Number of placement attempts, not a guaranteed sphere count.
    pub spheres_max: u32,
    /// Radius of the ground disk candidate positions are drawn from.
    pub placement_radius: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            sphere_radius: Vec2::new(3.0, 8.0),
            spheres_max: 100,
            placement_radius: 100.0,
        }
    }
}

impl SceneConfig {
    pub fn validate(&self) -> Result<()> {
        let Vec2 { x: min, y: max } = self.sphere_radius;
        if !(min > 0.0 && min <= max && max.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "sphere radius range [{min}, {max}] must be positive and non-empty"
            )));
        }
        if !(self.placement_radius > 0.0 && self.placement_radius.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "placement radius {} must be positive",
                self.placement_radius
            )));
        }
        Ok(())
    }
}

impl Scene {
    /// Populate a scene by rejection sampling.
    ///
    /// Each of `spheres_max` attempts draws one candidate; a candidate that
    /// overlaps an accepted sphere is dropped and the attempt is spent. The
    /// resulting scene holds between 1 and `spheres_max + 1` spheres. An
    /// invalid config fails before anything is drawn from `rng`.
    pub fn generate<R: Rng + ?Sized>(config: &SceneConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        // Accepted spheres are bounded by what fits in the disk, not by the
        // attempt budget.
        let mut spheres = vec![Sphere::anchor()];

        let mut rejected = 0u32;
        for _ in 0..config.spheres_max {
            let radius =
                random::random_f32_range(rng, config.sphere_radius.x, config.sphere_radius.y);
            let ground = random::random_in_disk(rng, config.placement_radius);
            let mut sphere = Sphere {
                position: Vec3::new(ground.x, radius, ground.y),
                radius,
                albedo: Vec3::ZERO,
                specular: Vec3::ZERO,
            };

            if spheres.iter().any(|other| sphere.overlaps(other)) {
                rejected += 1;
                continue;
            }

            let color = random::random_color_hsv(rng);
            let metal = rng.random::<f32>() < 0.5;
            if metal {
                sphere.specular = color;
            } else {
                sphere.albedo = color;
                sphere.specular = Vec3::splat(DIELECTRIC_SPECULAR);
            }
            tracing::trace!(position = ?sphere.position, radius, metal, "placed sphere");
            spheres.push(sphere);
        }

        tracing::info!(
            placed = spheres.len() - 1,
            rejected,
            attempts = config.spheres_max,
            "scene generated"
        );
        Ok(Self { spheres })
    }

    pub fn len(&self) -> usize {
        self.spheres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
    }
}
