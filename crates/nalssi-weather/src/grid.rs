//! WGS84 to forecast grid conversion.
//!
//! Lambert Conformal Conic with standard parallels 30N/60N, origin 126E/38N
//! placed at grid (43, 136), 5 km spacing.

use std::f64::consts::PI;

use crate::types::{Coordinate, GridCell};

const EARTH_RADIUS_KM: f64 = 6371.00877;
const GRID_SPACING_KM: f64 = 5.0;
const STANDARD_PARALLEL_1: f64 = 30.0;
const STANDARD_PARALLEL_2: f64 = 60.0;
const ORIGIN_LONGITUDE: f64 = 126.0;
const ORIGIN_LATITUDE: f64 = 38.0;
const ORIGIN_X: f64 = 43.0;
const ORIGIN_Y: f64 = 136.0;

const DEG_TO_RAD: f64 = PI / 180.0;

fn half_angle_tan(lat_rad: f64) -> f64 {
    (PI * 0.25 + lat_rad * 0.5).tan()
}

/// Project a coordinate onto the provider grid.
///
/// Cells are snapped to the nearest integer (0.5 bias then floor); plain
/// truncation lands on the wrong cell for most of the country.
pub fn project(coordinate: &Coordinate) -> GridCell {
    let re = EARTH_RADIUS_KM / GRID_SPACING_KM;
    let slat1 = STANDARD_PARALLEL_1 * DEG_TO_RAD;
    let slat2 = STANDARD_PARALLEL_2 * DEG_TO_RAD;
    let olon = ORIGIN_LONGITUDE * DEG_TO_RAD;
    let olat = ORIGIN_LATITUDE * DEG_TO_RAD;

    let sn = (slat1.cos() / slat2.cos()).ln() / (half_angle_tan(slat2) / half_angle_tan(slat1)).ln();
    let sf = half_angle_tan(slat1).powf(sn) * slat1.cos() / sn;
    let ro = re * sf / half_angle_tan(olat).powf(sn);

    let ra = re * sf / half_angle_tan(coordinate.latitude * DEG_TO_RAD).powf(sn);
    let mut theta = coordinate.longitude * DEG_TO_RAD - olon;
    if theta > PI {
        theta -= 2.0 * PI;
    }
    if theta < -PI {
        theta += 2.0 * PI;
    }
    theta *= sn;

    GridCell {
        x: (ra * theta.sin() + ORIGIN_X + 0.5).floor() as i32,
        y: (ro - ra * theta.cos() + ORIGIN_Y + 0.5).floor() as i32,
    }
}
