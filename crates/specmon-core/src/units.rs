//! Power unit conversions and physical constants.
//!
//! Powers are combined in linear milliwatts (additive across collaborating
//! transmitters) and reported in dBm.

/// Speed of light in meters per second.
pub const SPEED_OF_LIGHT_MPS: f64 = 299_792_458.0;

/// Thermal noise density at 290 K in dBm/Hz.
pub const THERMAL_NOISE_DBM_PER_HZ: f64 = -174.0;

/// dBm to linear milliwatts.
#[inline]
pub fn dbm_to_mw(dbm: f64) -> f64 {
    10.0_f64.powf(dbm / 10.0)
}

/// Linear milliwatts to dBm. Zero maps to negative infinity.
#[inline]
pub fn mw_to_dbm(mw: f64) -> f64 {
    10.0 * mw.log10()
}

/// dB ratio to a linear ratio.
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 10.0)
}

/// Receiver sensitivity in dBm for a bandwidth and system noise figure.
pub fn receiver_sensitivity_dbm(noise_figure_db: f64, bandwidth_hz: u64) -> f64 {
    THERMAL_NOISE_DBM_PER_HZ + noise_figure_db + 10.0 * (bandwidth_hz.max(1) as f64).log10()
}

/// Propagation delay in whole microseconds over a distance, rounded to
/// the nearest microsecond.
#[inline]
pub fn propagation_delay_us(distance_m: f64) -> u64 {
    (distance_m / SPEED_OF_LIGHT_MPS * 1_000_000.0).round() as u64
}
