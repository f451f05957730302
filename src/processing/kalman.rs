use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use serde::{Deserialize, Serialize};

use crate::core::{Position, DEFAULT_FILTER_DT_S, DEFAULT_FILTER_GAIN};
use crate::validation::ConfigError;

/// Predict/update pair driven by the localization pipeline.
///
/// The pipeline only talks to this trait, so the fixed-gain blend can be
/// replaced by a covariance-aware filter without touching its control flow.
pub trait MotionFilter {
    /// Advance the state by one time step
    fn predict(&mut self);

    /// Correct the state with a solved position and, when available, its
    /// approximate covariance
    fn update(&mut self, observed: Position, covariance: Option<&Matrix2<f64>>);

    /// Current position estimate
    fn get_state(&self) -> Position;

    /// Current velocity estimate (m/s)
    fn velocity(&self) -> Vector2<f64>;

    /// Back to the initial state
    fn reset(&mut self);
}

/// Tunables of the fixed-gain filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Prediction time step (s)
    pub dt: f64,
    /// Blend gain of the update, in (0, 1]
    pub gain: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            dt: DEFAULT_FILTER_DT_S,
            gain: DEFAULT_FILTER_GAIN,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dt.is_finite() && self.dt >= 0.0) {
            return Err(ConfigError::invalid("dt", self.dt, "must be finite and not negative"));
        }
        if !(self.gain > 0.0 && self.gain <= 1.0) {
            return Err(ConfigError::invalid("gain", self.gain, "must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Fixed-gain alpha filter over `[x, y, vx, vy]`.
///
/// `predict` extrapolates with constant velocity, `update` pulls the position
/// toward the observation by `gain`. Velocity is never estimated here; it only
/// changes through `set_velocity`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    config: FilterConfig,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl FilterState {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            config,
        }
    }

    pub fn with_velocity(mut self, vx: f64, vy: f64) -> Self {
        self.set_velocity(vx, vy);
        self
    }

    pub fn set_velocity(&mut self, vx: f64, vy: f64) {
        self.vx = vx;
        self.vy = vy;
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
}

impl MotionFilter for FilterState {
    fn predict(&mut self) {
        self.x += self.vx * self.config.dt;
        self.y += self.vy * self.config.dt;
    }

    fn update(&mut self, observed: Position, _covariance: Option<&Matrix2<f64>>) {
        let k = self.config.gain;
        self.x += k * (observed.x - self.x);
        self.y += k * (observed.y - self.y);
    }

    fn get_state(&self) -> Position {
        Position::new(self.x, self.y)
    }

    fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.vx, self.vy)
    }

    fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}

/// Constant-velocity Kalman filter for temporal position smoothing.
///
/// State vector: `[x, y, vx, vy]`. The measurement noise of each update is the
/// approximate covariance reported by the solver when it has one.
#[derive(Debug, Clone)]
pub struct PositionKalmanFilter {
    /// Current state estimate [position, velocity]
    pub state: Vector4<f64>,
    /// State covariance matrix
    pub covariance: Matrix4<f64>,
    /// Process noise density, scaled by dt in `predict`
    pub process_noise: Matrix4<f64>,
    /// Used when an update carries no covariance
    pub measurement_noise: Matrix2<f64>,
    /// Prediction time step (s)
    pub dt: f64,
    initialized: bool,
}

impl Default for PositionKalmanFilter {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER_DT_S)
    }
}

impl PositionKalmanFilter {
    pub fn new(dt: f64) -> Self {
        Self {
            state: Vector4::zeros(),
            covariance: Matrix4::identity() * 100.0,
            process_noise: Self::create_process_noise(0.01, 0.1),
            measurement_noise: Matrix2::identity(),
            dt,
            initialized: false,
        }
    }

    /// Create Kalman filter with custom noise parameters
    pub fn with_noise_parameters(
        dt: f64,
        position_process_noise: f64,
        velocity_process_noise: f64,
        measurement_noise: f64,
    ) -> Self {
        let mut filter = Self::new(dt);
        filter.process_noise = Self::create_process_noise(position_process_noise, velocity_process_noise);
        filter.measurement_noise = Matrix2::identity() * measurement_noise;
        filter
    }

    /// Start from a first fix with 1 m position and 0.1 m/s velocity uncertainty
    pub fn initialize(&mut self, position: Position) {
        self.state = Vector4::new(position.x, position.y, 0.0, 0.0);
        self.covariance = Matrix4::from_diagonal(&Vector4::new(1.0, 1.0, 0.1, 0.1));
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Position standard deviations
    pub fn position_uncertainty(&self) -> Vector2<f64> {
        Vector2::new(self.covariance[(0, 0)].sqrt(), self.covariance[(1, 1)].sqrt())
    }

    fn create_process_noise(position_noise: f64, velocity_noise: f64) -> Matrix4<f64> {
        Matrix4::from_diagonal(&Vector4::new(
            position_noise,
            position_noise,
            velocity_noise,
            velocity_noise,
        ))
    }

    fn state_transition(&self) -> Matrix4<f64> {
        let mut f = Matrix4::identity();
        f[(0, 2)] = self.dt;
        f[(1, 3)] = self.dt;
        f
    }
}

impl MotionFilter for PositionKalmanFilter {
    fn predict(&mut self) {
        if !self.initialized || self.dt <= 0.0 {
            return;
        }
        let f = self.state_transition();
        self.state = f * self.state;
        self.covariance = f * self.covariance * f.transpose() + self.process_noise * self.dt;
    }

    fn update(&mut self, observed: Position, covariance: Option<&Matrix2<f64>>) {
        if !self.initialized {
            self.initialize(observed);
            return;
        }

        // We observe position directly
        let h = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );
        let r = covariance.copied().unwrap_or(self.measurement_noise);

        let innovation = Vector2::new(observed.x, observed.y) - h * self.state;
        let s = h * self.covariance * h.transpose() + r;

        if let Some(s_inv) = s.try_inverse() {
            let k = self.covariance * h.transpose() * s_inv;
            self.state += k * innovation;

            // Joseph form keeps the covariance symmetric positive definite
            let i_kh = Matrix4::identity() - k * h;
            self.covariance = i_kh * self.covariance * i_kh.transpose() + k * r * k.transpose();
        }
    }

    fn get_state(&self) -> Position {
        Position::new(self.state[0], self.state[1])
    }

    fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.state[2], self.state[3])
    }

    fn reset(&mut self) {
        self.state = Vector4::zeros();
        self.covariance = Matrix4::identity() * 100.0;
        self.initialized = false;
    }
}
