// Copyright @yucwang 2023

use super::constants::{ Float, Vector2f, Vector3f,
                        INV_PI, INV_TWO_PI, INV_FOUR_PI, PI, TWO_PI };

pub fn square_to_uniform_sphere(u: &Vector2f) -> Vector3f {
    let z = 1.0 - 2.0 * u.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = TWO_PI * u.y;

    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn square_to_uniform_sphere_pdf() -> Float {
    INV_FOUR_PI
}

pub fn invert_uniform_sphere(v: &Vector3f) -> Vector2f {
    let mut phi = v.y.atan2(v.x);
    if phi < 0.0 {
        phi += TWO_PI;
    }

    Vector2f::new(0.5 * (1.0 - v.z), phi * INV_TWO_PI)
}

pub fn square_to_uniform_hemisphere(u: &Vector2f) -> Vector3f {
    let z = u.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = TWO_PI * u.y;

    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn square_to_uniform_hemisphere_pdf() -> Float {
    INV_TWO_PI
}

/// Uniform direction inside the cone of half-angle `acos(cos_theta_max)`
/// around +z.
pub fn square_to_uniform_cone(u: &Vector2f, cos_theta_max: Float) -> Vector3f {
    let cos_theta = 1.0 - u.x * (1.0 - cos_theta_max);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = TWO_PI * u.y;

    Vector3f::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

pub fn square_to_uniform_cone_pdf(cos_theta_max: Float) -> Float {
    let solid_angle = TWO_PI * (1.0 - cos_theta_max);
    if solid_angle > 0.0 {
        1.0 / solid_angle
    } else {
        0.0
    }
}

pub fn square_to_uniform_disk_concentric(u: &Vector2f) -> Vector2f {
    let r1 = 2.0 * u.x - 1.0;
    let r2 = 2.0 * u.y - 1.0;

    let phi: Float;
    let r: Float;

    if r1 == 0.0 && r2 == 0.0 {
        r = 0.0;
        phi = 0.0;
    } else if r1 * r1 > r2 * r2 {
        r = r1;
        phi = (PI / 4.0) * (r2 / r1);
    } else {
        r = r2;
        phi = (PI / 2.0) - (r1 / r2) * (PI / 4.0);
    }

    let (sin_phi, cos_phi) = phi.sin_cos();

    Vector2f::new(r * cos_phi, r * sin_phi)
}

pub fn square_to_cosine_hemisphere(u: &Vector2f) -> Vector3f {
    let p = square_to_uniform_disk_concentric(u);
    let z = (1.0 - p.x * p.x - p.y * p.y).max(0.0).sqrt();

    Vector3f::new(p.x, p.y, z)
}

pub fn square_to_cosine_hemisphere_pdf(cos_theta: Float) -> Float {
    cos_theta * INV_PI
}

/// Barycentric coordinates uniform over the unit triangle.
pub fn square_to_triangle(u: &Vector2f) -> Vector3f {
    let sqrt_u = u.x.sqrt();
    let b0 = 1.0 - sqrt_u;
    let b1 = u.y * sqrt_u;

    Vector3f::new(b0, b1, 1.0 - b0 - b1)
}
