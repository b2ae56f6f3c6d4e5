//! Render-thread mirror of a material resource (`SPEC_FULL.md` §4.D).
//!
//! Texture decoding is an external collaborator (`SPEC_FULL.md` §1); this
//! proxy receives already-sampled texel values (base color, metallic,
//! roughness, tangent-space normal) from the caller and only owns the BxDF
//! math: building the shading frame, importance-sampling a scatter
//! direction, and returning its throughput.

use ember_core::sampler::Sampler;
use ember_scene::MaterialVariant;
use glam::{Vec2, Vec3, Vec4};

/// A scattered direction plus the throughput (BRDF * cos / pdf, already
/// divided through) to multiply into the path's running weight.
pub struct ScatterSample {
    pub w_i: Vec3,
    pub throughput: Vec3,
}

pub struct MaterialRenderProxy {
    pub variant: MaterialVariant,
    pub base_color: Vec3,
    pub emissive: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    /// Index of refraction; only meaningful for `Dielectric`. Air is 1.0.
    pub eta: f32,
}

impl MaterialRenderProxy {
    #[must_use]
    pub fn new(variant: MaterialVariant, base_color: Vec3, emissive: Vec3, metallic: f32, roughness: f32, eta: f32) -> Self {
        Self {
            variant,
            base_color,
            emissive,
            metallic,
            roughness,
            eta,
        }
    }

    /// Decodes a normal-map texel from `[0, 1]^3` into a tangent-space unit
    /// vector in `[-1, 1]^3` and rotates it into world space using the
    /// geometric normal/tangent and the handedness sign stored in
    /// `tangent.w` (`SPEC_FULL.md` §4.D).
    #[must_use]
    pub fn apply_normal_map(geometric_normal: Vec3, tangent: Vec4, texel: Vec3) -> Vec3 {
        let t = tangent.truncate().normalize_or_zero();
        let n = geometric_normal;
        let b = n.cross(t) * tangent.w;
        let tangent_space_normal = texel * 2.0 - Vec3::ONE;
        (t * tangent_space_normal.x + b * tangent_space_normal.y + n * tangent_space_normal.z).normalize_or_zero()
    }

    /// Imports a scatter direction and its throughput against the incoming
    /// world-space direction `w_o` (pointing away from the surface, i.e.
    /// `-ray.direction`) and the shading normal/tangent.
    ///
    /// - `Pbr`: tries GGX visible-normal microfacet sampling first; if the
    ///   resulting direction ends up below the hemisphere (grazing or
    ///   backfacing), falls back to cosine-weighted Lambertian.
    /// - `Dielectric`: a Schlick-Fresnel coin flip between specular
    ///   reflection and refraction through `eta`.
    pub fn sample_surface(&self, sampler: &mut Sampler, w_o: Vec3, normal: Vec3, tangent: Vec4, uv: Vec2) -> ScatterSample {
        let _ = uv;
        let frame = ShadingFrame::new(normal, tangent);
        let local_w_o = frame.to_local(w_o);

        match self.variant {
            MaterialVariant::Pbr => self.sample_pbr(sampler, &frame, local_w_o),
            MaterialVariant::Dielectric => self.sample_dielectric(sampler, &frame, local_w_o),
        }
    }

    fn sample_pbr(&self, sampler: &mut Sampler, frame: &ShadingFrame, local_w_o: Vec3) -> ScatterSample {
        if local_w_o.z > 0.0 && self.roughness > 1e-3 {
            let local_m = sampler.ggx_visible_normal(local_w_o, self.roughness);
            let local_w_i = reflect(-local_w_o, local_m);
            if local_w_i.z > 0.0 {
                let f0 = Vec3::splat(0.04).lerp(self.base_color, self.metallic);
                let cos_theta_m = local_m.dot(local_w_o).max(0.0);
                let fresnel = schlick_fresnel(f0, cos_theta_m);

                // VNDF sampling already imports the D and the 1/G1(w_o) terms implicit
                // in the sampled `m`; the remaining weight is G2(w_o, w_i)/G1(w_o).
                let occlusion = smith_ggx_correlated(local_w_o.z, local_w_i.z, self.roughness);
                let normalizer = geometry_schlick_ggx(local_w_o.z, self.roughness);
                let throughput = fresnel * (occlusion / normalizer.max(1e-6));

                return ScatterSample {
                    w_i: frame.to_world(local_w_i),
                    throughput,
                };
            }
        }

        let local_w_i = sampler.cosine_weighted_hemisphere();
        let diffuse = self.base_color * (1.0 - self.metallic);
        ScatterSample {
            w_i: frame.to_world(local_w_i),
            throughput: diffuse,
        }
    }

    fn sample_dielectric(&self, sampler: &mut Sampler, frame: &ShadingFrame, local_w_o: Vec3) -> ScatterSample {
        let entering = local_w_o.z > 0.0;
        let (eta_i, eta_t, normal_sign) = if entering { (1.0, self.eta, 1.0) } else { (self.eta, 1.0, -1.0) };
        let n = Vec3::new(0.0, 0.0, normal_sign);
        let cos_theta_i = local_w_o.dot(n).abs();

        let reflectance = schlick_fresnel(Vec3::splat(fresnel_r0(eta_i, eta_t)), cos_theta_i).x;
        let refracted = refract(-local_w_o, n, eta_i / eta_t);

        let (local_w_i, throughput) = match refracted {
            Some(dir) if sampler.random_unit() >= reflectance => (dir, Vec3::ONE),
            _ => (reflect(-local_w_o, n), Vec3::ONE),
        };

        ScatterSample {
            w_i: frame.to_world(local_w_i),
            throughput,
        }
    }
}

/// Orthonormal tangent/bitangent/normal basis built from the geometric
/// normal and the vertex tangent (handedness from `tangent.w`), used to
/// move directions between world space and local shading space (`z` is
/// the shading normal).
struct ShadingFrame {
    tangent: Vec3,
    bitangent: Vec3,
    normal: Vec3,
}

impl ShadingFrame {
    fn new(normal: Vec3, tangent: Vec4) -> Self {
        let n = normal.normalize_or_zero();
        let t = (tangent.truncate() - n * n.dot(tangent.truncate())).normalize_or_zero();
        let b = n.cross(t) * tangent.w;
        Self { tangent: t, bitangent: b, normal: n }
    }

    fn to_local(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.tangent), v.dot(self.bitangent), v.dot(self.normal))
    }

    fn to_world(&self, v: Vec3) -> Vec3 {
        self.tangent * v.x + self.bitangent * v.y + self.normal * v.z
    }
}

fn reflect(incoming: Vec3, normal: Vec3) -> Vec3 {
    incoming - 2.0 * incoming.dot(normal) * normal
}

/// Refracts `incoming` (pointing into the surface) through `normal` with
/// relative IOR `eta = eta_incident / eta_transmitted`; `None` under total
/// internal reflection.
fn refract(incoming: Vec3, normal: Vec3, eta: f32) -> Option<Vec3> {
    let cos_theta_i = -incoming.dot(normal);
    let sin2_theta_t = eta * eta * (1.0 - cos_theta_i * cos_theta_i).max(0.0);
    if sin2_theta_t >= 1.0 {
        return None;
    }
    let cos_theta_t = (1.0 - sin2_theta_t).sqrt();
    Some(eta * incoming + (eta * cos_theta_i - cos_theta_t) * normal)
}

fn fresnel_r0(eta_i: f32, eta_t: f32) -> f32 {
    let r0 = (eta_i - eta_t) / (eta_i + eta_t);
    r0 * r0
}

fn schlick_fresnel(f0: Vec3, cos_theta: f32) -> Vec3 {
    let m = (1.0 - cos_theta).clamp(0.0, 1.0);
    let m5 = m * m * m * m * m;
    f0 + (Vec3::ONE - f0) * m5
}

/// Single-direction Schlick-GGX masking term (`BxDF.h`'s `GeometrySchlickGGX`),
/// using the direct-lighting remapping `k = alpha / 2` with `alpha =
/// roughness^2`, matching `Sampler::ggx_visible_normal`'s convention.
fn geometry_schlick_ggx(cos_theta: f32, roughness: f32) -> f32 {
    let alpha = roughness * roughness;
    let k = alpha / 2.0;
    cos_theta / (cos_theta * (1.0 - k) + k)
}

/// Height-correlated Smith G2 masking-shadowing term for GGX
/// (`BxDF.h`'s `SmithGGXCorrelated`), evaluated at the outgoing and
/// incoming cosines.
fn smith_ggx_correlated(cos_o: f32, cos_i: f32, roughness: f32) -> f32 {
    let g1_o = geometry_schlick_ggx(cos_o, roughness);
    let g1_i = geometry_schlick_ggx(cos_i, roughness);
    g1_o * g1_i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_map_identity_texel_returns_geometric_normal() {
        let n = Vec3::Z;
        let t = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let flat_texel = Vec3::new(0.5, 0.5, 1.0);
        let result = MaterialRenderProxy::apply_normal_map(n, t, flat_texel);
        assert!((result - n).length() < 1e-4);
    }

    #[test]
    fn pbr_diffuse_fallback_stays_in_hemisphere() {
        let mat = MaterialRenderProxy::new(MaterialVariant::Pbr, Vec3::splat(0.8), Vec3::ZERO, 0.0, 0.9, 1.5);
        let mut sampler = Sampler::new(7);
        let sample = mat.sample_surface(&mut sampler, Vec3::Z, Vec3::Z, Vec4::new(1.0, 0.0, 0.0, 1.0), Vec2::ZERO);
        assert!(sample.w_i.z > 0.0);
    }

    #[test]
    fn dielectric_perpendicular_entry_mostly_transmits() {
        let mat = MaterialRenderProxy::new(MaterialVariant::Dielectric, Vec3::ONE, Vec3::ZERO, 0.0, 0.0, 1.5);
        let mut sampler = Sampler::new(3);
        let mut transmitted = 0;
        for _ in 0..64 {
            let sample = mat.sample_surface(&mut sampler, Vec3::Z, Vec3::Z, Vec4::new(1.0, 0.0, 0.0, 1.0), Vec2::ZERO);
            if sample.w_i.z < 0.0 {
                transmitted += 1;
            }
        }
        assert!(transmitted > 32);
    }
}
