//! Closed-form triangle measures and analytic reference solutions.
//!
//! The cantilever and clamped-plate formulas double as independent oracles for
//! the assembled solves.

use crate::{
    datatypes::Vertex,
    error::{FemError, Result},
};

/// Empirical coefficient for the centre deflection of a clamped square plate
/// under uniform load.
pub const CLAMPED_PLATE_COEFFICIENT: f64 = 0.00126;

/// Signed area, positive when the vertices run counter-clockwise
pub fn triangle_signed_area(p1: Vertex, p2: Vertex, p3: Vertex) -> f64 {
    0.5 * (p1.x * (p2.y - p3.y) + p2.x * (p3.y - p1.y) + p3.x * (p1.y - p2.y))
}

/// Calculates the area of a triangle from its vertices
pub fn triangle_area(p1: Vertex, p2: Vertex, p3: Vertex) -> f64 {
    triangle_signed_area(p1, p2, p3).abs()
}

/// Shape quality `4√3·A / (a² + b² + c²)`
///
/// # Returns
/// 1 for an equilateral triangle, approaching 0 as it degenerates. Returns 0
/// when all three vertices coincide.
pub fn triangle_quality(p1: Vertex, p2: Vertex, p3: Vertex) -> f64 {
    let a2 = f64::powi(p2.x - p1.x, 2) + f64::powi(p2.y - p1.y, 2);
    let b2 = f64::powi(p3.x - p2.x, 2) + f64::powi(p3.y - p2.y, 2);
    let c2 = f64::powi(p1.x - p3.x, 2) + f64::powi(p1.y - p3.y, 2);

    let edge_sum = a2 + b2 + c2;
    if edge_sum <= 0.0 {
        return 0.0;
    }

    4.0 * f64::sqrt(3.0) * triangle_area(p1, p2, p3) / edge_sum
}

pub fn triangle_centroid(p1: Vertex, p2: Vertex, p3: Vertex) -> Vertex {
    Vertex {
        x: (p1.x + p2.x + p3.x) / 3.0,
        y: (p1.y + p2.y + p3.y) / 3.0,
    }
}

fn check_beam_parameters(length: f64, youngs_modulus: f64, inertia: f64) -> Result<()> {
    if !(youngs_modulus > 0.0 && inertia > 0.0 && length > 0.0) {
        return Err(FemError::InvalidParameter(format!(
            "E, I and L must be positive (E={youngs_modulus}, I={inertia}, L={length})"
        )));
    }
    Ok(())
}

/// Tip deflection of a cantilever under an end point load, `PL³/(3EI)`
pub fn cantilever_deflection(load: f64, length: f64, youngs_modulus: f64, inertia: f64) -> Result<f64> {
    check_beam_parameters(length, youngs_modulus, inertia)?;
    Ok(load * length.powi(3) / (3.0 * youngs_modulus * inertia))
}

/// Tip rotation of a cantilever under an end point load, `PL²/(2EI)`
pub fn cantilever_rotation(load: f64, length: f64, youngs_modulus: f64, inertia: f64) -> Result<f64> {
    check_beam_parameters(length, youngs_modulus, inertia)?;
    Ok(load * length.powi(2) / (2.0 * youngs_modulus * inertia))
}

/// Flexural rigidity `Et³ / (12(1 − ν²))`
pub fn flexural_rigidity(youngs_modulus: f64, poisson_ratio: f64, thickness: f64) -> f64 {
    youngs_modulus * thickness.powi(3) / (12.0 * (1.0 - poisson_ratio * poisson_ratio))
}

/// Approximate centre deflection of a clamped square plate of side `side`
/// under a uniform pressure `pressure`. The sign of the load is ignored.
pub fn clamped_plate_deflection(
    pressure: f64,
    side: f64,
    youngs_modulus: f64,
    poisson_ratio: f64,
    thickness: f64,
) -> Result<f64> {
    if !(side > 0.0) {
        return Err(FemError::MustBePositive("a".to_owned()));
    }
    if !(youngs_modulus > 0.0) {
        return Err(FemError::MustBePositive("E".to_owned()));
    }
    if !(thickness > 0.0) {
        return Err(FemError::MustBePositive("t".to_owned()));
    }

    let rigidity = flexural_rigidity(youngs_modulus, poisson_ratio, thickness);
    Ok(CLAMPED_PLATE_COEFFICIENT * pressure.abs() * side.powi(4) / rigidity)
}

/// Percentage error of `computed` against `reference`, comparing magnitudes
pub fn relative_error_percent(computed: f64, reference: f64) -> f64 {
    100.0 * (computed.abs() - reference.abs()).abs() / reference.abs()
}
