use api::EyePair;
use glam::Vec2;

pub const SMOOTHING_ALPHA: f32 = 0.3;

/// First order exponential filter: `current += alpha * (target - current)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpFilter {
    alpha: f32,
    current: f32,
}

impl ExpFilter {
    pub fn new(alpha: f32, initial: f32) -> Self {
        Self {
            alpha: alpha.clamp(f32::EPSILON, 1.0),
            current: initial,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn reset(&mut self, value: f32) {
        self.current = value;
    }

    pub fn filter(&mut self, target: f32) -> f32 {
        if target.is_finite() {
            self.current += self.alpha * (target - self.current);
        }
        self.current
    }
}

/// Advances the live anchors toward their targets once per rendered frame.
///
/// Strength is operator-set and is not smoothed.
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    left_x: ExpFilter,
    left_y: ExpFilter,
    right_x: ExpFilter,
    right_y: ExpFilter,
    left_radius: ExpFilter,
    right_radius: ExpFilter,
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self::new(SMOOTHING_ALPHA, EyePair::default())
    }
}

impl TemporalSmoother {
    pub fn new(alpha: f32, initial: EyePair) -> Self {
        Self {
            left_x: ExpFilter::new(alpha, initial.left.center.x),
            left_y: ExpFilter::new(alpha, initial.left.center.y),
            right_x: ExpFilter::new(alpha, initial.right.center.x),
            right_y: ExpFilter::new(alpha, initial.right.center.y),
            left_radius: ExpFilter::new(alpha, initial.left.radius),
            right_radius: ExpFilter::new(alpha, initial.right.radius),
        }
    }

    pub fn current(&self) -> EyePair {
        let mut eyes = EyePair::new(
            Vec2::new(self.left_x.current(), self.left_y.current()),
            Vec2::new(self.right_x.current(), self.right_y.current()),
            self.left_radius.current(),
        );
        eyes.right.radius = self.right_radius.current();
        eyes
    }

    pub fn reset(&mut self, eyes: EyePair) {
        self.left_x.reset(eyes.left.center.x);
        self.left_y.reset(eyes.left.center.y);
        self.right_x.reset(eyes.right.center.x);
        self.right_y.reset(eyes.right.center.y);
        self.left_radius.reset(eyes.left.radius);
        self.right_radius.reset(eyes.right.radius);
    }

    pub fn advance(&mut self, target: &EyePair) -> EyePair {
        self.left_x.filter(target.left.center.x);
        self.left_y.filter(target.left.center.y);
        self.right_x.filter(target.right.center.x);
        self.right_y.filter(target.right.center.y);
        self.left_radius.filter(target.left.radius);
        self.right_radius.filter(target.right.radius);
        self.current()
    }
}
