//! # Kalman Filter — Rssi Trend
//!
//! Two-state Kalman filter over rssi. State vector: `[rssi, rssi/s]`.
//!
//! Samples arrive at irregular intervals, so every step is taken with the
//! measured `dt` and the process noise comes from a constant-acceleration
//! model: `Q = G·Gᵀ·σa²` with `G = [dt²/2, dt]`.

/// Filter tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanConfig {
    /// Standard deviation of one rssi reading (dB).
    pub measurement_std: f64,
    /// Standard deviation of the modelled rssi acceleration (dB/s²).
    pub accel_std: f64,
}

impl KalmanConfig {
    /// Tuning for wifi rssi in dBm.
    pub fn for_rssi() -> Self {
        KalmanConfig {
            measurement_std: 2.0,
            accel_std: 0.02,
        }
    }
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self::for_rssi()
    }
}

/// A two-state Kalman filter: [value, velocity per second].
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    // ─── State ───
    x: f64,
    v: f64,

    // ─── Covariance P (2×2 symmetric) ───
    p00: f64,
    p01: f64,
    p11: f64,

    // ─── Tuning ───
    r: f64,
    accel_var: f64,

    initialized: bool,
}

impl KalmanFilter {
    pub fn new(config: &KalmanConfig) -> Self {
        KalmanFilter {
            x: 0.0,
            v: 0.0,
            p00: 0.0,
            p01: 0.0,
            p11: 0.0,
            r: config.measurement_std * config.measurement_std,
            accel_var: config.accel_std * config.accel_std,
            initialized: false,
        }
    }

    /// Current filtered value.
    pub fn value(&self) -> f64 {
        self.x
    }

    /// Current velocity, per second.
    pub fn velocity(&self) -> f64 {
        self.v
    }

    pub fn uncertainty(&self) -> f64 {
        self.p00.sqrt()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Restart from `measurement` with zero velocity.
    ///
    /// Value variance starts at 9× the measurement variance (3σ); the
    /// velocity is taken as exactly zero until process noise accumulates.
    pub fn init(&mut self, measurement: f64) {
        self.x = measurement;
        self.v = 0.0;
        self.p00 = 9.0 * self.r;
        self.p01 = 0.0;
        self.p11 = 0.0;
        self.initialized = true;
    }

    /// Advance the state by `dt` seconds.
    pub fn predict(&mut self, dt: f64) {
        self.x += self.v * dt;

        // Q = G*G'*σa², G = [dt²/2, dt]
        let g0 = 0.5 * dt * dt;
        let g1 = dt;
        let q00 = g0 * g0 * self.accel_var;
        let q01 = g0 * g1 * self.accel_var;
        let q11 = g1 * g1 * self.accel_var;

        // P' = F*P*F' + Q, F = [[1, dt], [0, 1]]
        let new_p00 = self.p00 + 2.0 * dt * self.p01 + dt * dt * self.p11 + q00;
        let new_p01 = self.p01 + dt * self.p11 + q01;
        let new_p11 = self.p11 + q11;

        self.p00 = new_p00;
        self.p01 = new_p01;
        self.p11 = new_p11;
    }

    /// Incorporate a measurement taken `dt` seconds after the previous one.
    pub fn update(&mut self, measurement: f64, dt: f64) {
        if !self.initialized {
            self.init(measurement);
            return;
        }

        self.predict(dt);

        // Innovation
        let y = measurement - self.x;

        // S = H*P*H' + R = P[0,0] + R
        let s = self.p00 + self.r;

        // K = P*H'/S
        let k0 = self.p00 / s;
        let k1 = self.p01 / s;

        self.x += k0 * y;
        self.v += k1 * y;

        // P = (I - K*H)*P
        let new_p00 = self.p00 - k0 * self.p00;
        let new_p01 = self.p01 - k0 * self.p01;
        let new_p11 = self.p11 - k1 * self.p01;

        self.p00 = new_p00;
        self.p01 = new_p01;
        self.p11 = new_p11;
    }

    /// Extrapolate `seconds` ahead without modifying state.
    pub fn predict_ahead(&self, seconds: f64) -> f64 {
        self.x + self.v * seconds
    }

    pub fn reset(&mut self) {
        self.x = 0.0;
        self.v = 0.0;
        self.p00 = 0.0;
        self.p01 = 0.0;
        self.p11 = 0.0;
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── Basic Filtering ────────────────────────────────────────────────

    #[test]
    fn first_measurement_sets_value() {
        let mut kf = KalmanFilter::new(&KalmanConfig::for_rssi());
        assert!(!kf.is_initialized());

        kf.update(-70.0, 3.0);
        assert!(kf.is_initialized());
        assert_eq!(kf.value(), -70.0);
        assert_eq!(kf.velocity(), 0.0);
        assert!((kf.uncertainty() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn constant_input_stays_put() {
        let mut kf = KalmanFilter::new(&KalmanConfig::for_rssi());
        for _ in 0..20 {
            kf.update(-85.0, 3.0);
        }
        assert_eq!(kf.value(), -85.0);
        assert_eq!(kf.velocity(), 0.0);
    }

    #[test]
    fn smooths_noisy_measurements() {
        let mut kf = KalmanFilter::new(&KalmanConfig::for_rssi());
        let measurements = [-78.0, -82.0, -79.0, -81.0, -80.0, -83.0, -77.0, -80.0];
        for &m in &measurements {
            kf.update(m, 3.0);
        }
        assert!(
            (kf.value() - (-80.0)).abs() < 2.0,
            "should be near -80 dBm, got {}",
            kf.value()
        );
    }

    #[test]
    fn detects_fading_signal() {
        let mut kf = KalmanFilter::new(&KalmanConfig::for_rssi());
        // Walking away: -1 dB per 3 s sample.
        for i in 0..30 {
            kf.update(-60.0 - i as f64, 3.0);
        }
        assert!(
            kf.velocity() < -0.1,
            "velocity should be negative: {}",
            kf.velocity()
        );
        assert!(kf.predict_ahead(15.0) < kf.value());
    }

    // ─── Reset ──────────────────────────────────────────────────────────

    #[test]
    fn reset_clears_state() {
        let mut kf = KalmanFilter::new(&KalmanConfig::for_rssi());
        kf.update(-50.0, 1.0);
        kf.update(-55.0, 1.0);

        kf.reset();
        assert!(!kf.is_initialized());
        assert_eq!(kf.value(), 0.0);
    }
}
