//! Node geometry
//!
//! Positions arrive as WGS-84 latitude/longitude/altitude and are converted
//! to Earth-centered coordinates for slant range and look-angle math. The
//! look angle feeds the antenna horizon check; the slant range feeds the
//! propagation delay and the distance-based pathloss variants.

use crate::units::SPEED_OF_LIGHT_MPS;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const WGS84_E2: f64 = 2.0 * WGS84_F - WGS84_F * WGS84_F;

/// Geodetic node position (WGS-84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees (-90 to +90)
    pub latitude_deg: f64,
    /// Longitude in degrees (-180 to +180)
    pub longitude_deg: f64,
    /// Altitude above the ellipsoid in meters
    pub altitude_m: f64,
}

impl Position {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        }
    }

    /// Earth-centered, earth-fixed coordinates in meters.
    pub fn to_ecef(&self) -> Ecef {
        let lat = self.latitude_deg.to_radians();
        let lon = self.longitude_deg.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();

        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

        Ecef {
            x: (n + self.altitude_m) * cos_lat * cos_lon,
            y: (n + self.altitude_m) * cos_lat * sin_lon,
            z: (n * (1.0 - WGS84_E2) + self.altitude_m) * sin_lat,
        }
    }
}

/// Earth-centered, earth-fixed position in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ecef {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Ecef {
    /// Straight-line distance in meters.
    pub fn distance_to(&self, other: &Ecef) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Direction from an observer to a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAngle {
    /// Elevation in degrees (0 = horizon, 90 = zenith)
    pub elevation_deg: f64,
    /// Azimuth in degrees clockwise from north
    pub azimuth_deg: f64,
}

/// Look angle from `observer` toward `target`, computed in the observer's
/// local east-north-up frame.
pub fn look_angle(observer: &Position, target: &Position) -> LookAngle {
    let o = observer.to_ecef();
    let t = target.to_ecef();
    let (dx, dy, dz) = (t.x - o.x, t.y - o.y, t.z - o.z);

    let (sin_lat, cos_lat) = observer.latitude_deg.to_radians().sin_cos();
    let (sin_lon, cos_lon) = observer.longitude_deg.to_radians().sin_cos();

    let east = -sin_lon * dx + cos_lon * dy;
    let north = -sin_lat * cos_lon * dx - sin_lat * sin_lon * dy + cos_lat * dz;
    let up = cos_lat * cos_lon * dx + cos_lat * sin_lon * dy + sin_lat * dz;

    let elevation_deg = up.atan2((east * east + north * north).sqrt()).to_degrees();
    let mut azimuth_deg = east.atan2(north).to_degrees();
    if azimuth_deg < 0.0 {
        azimuth_deg += 360.0;
    }

    LookAngle {
        elevation_deg,
        azimuth_deg,
    }
}

/// Free-space path loss in dB. Distances or frequencies that are not
/// positive yield 0 dB.
pub fn free_space_pathloss_db(distance_m: f64, frequency_hz: f64) -> f64 {
    if distance_m <= 0.0 || frequency_hz <= 0.0 {
        return 0.0;
    }
    (20.0 * (4.0 * PI * distance_m * frequency_hz / SPEED_OF_LIGHT_MPS).log10()).max(0.0)
}

/// Plane-earth two-ray path loss in dB, or `None` when either antenna
/// height is not above the ellipsoid.
pub fn two_ray_pathloss_db(distance_m: f64, tx_height_m: f64, rx_height_m: f64) -> Option<f64> {
    if tx_height_m <= 0.0 || rx_height_m <= 0.0 {
        return None;
    }
    if distance_m <= 0.0 {
        return Some(0.0);
    }
    let pathloss =
        40.0 * distance_m.log10() - 20.0 * tx_height_m.log10() - 20.0 * rx_height_m.log10();
    Some(pathloss.max(0.0))
}
