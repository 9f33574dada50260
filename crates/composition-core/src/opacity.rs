//! Opacity curves for overlay layers.
//!
//! A curve is an initial value plus an ordered list of linear ramps.
//! Evaluation walks the ramps in registration order; every ramp whose
//! begin time has been reached replaces the running value, so the
//! latest-registered active ramp wins. Ramps never blend with each other,
//! and a finished ramp keeps holding its final value.

use serde::{Deserialize, Serialize};

use quickedit_project_model::layer::LayerBase;

/// A linear ramp of opacity from `from` to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpacityRamp {
    /// Output time at which the ramp starts applying.
    pub begin: f64,
    /// Length of the ramp; zero means an instantaneous jump to `to`.
    pub duration: f64,
    pub from: f64,
    pub to: f64,
}

impl OpacityRamp {
    pub fn end(&self) -> f64 {
        self.begin + self.duration
    }

    /// Whether the ramp applies at `t` (it does from `begin` onward, forever).
    pub fn is_active(&self, t: f64) -> bool {
        t >= self.begin
    }

    /// Ramp value at `t`, clamped to the ramp's end points.
    pub fn value_at(&self, t: f64) -> f64 {
        if self.duration <= 0.0 {
            return self.to;
        }
        let progress = ((t - self.begin) / self.duration).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * progress
    }
}

/// Piecewise-linear opacity over output time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpacityCurve {
    /// Value before any ramp applies.
    pub initial: f64,
    /// Ramps in registration order.
    pub ramps: Vec<OpacityRamp>,
}

impl OpacityCurve {
    /// A constant curve.
    pub fn constant(value: f64) -> Self {
        Self {
            initial: value,
            ramps: Vec::new(),
        }
    }

    /// Build the fade curve for an overlay layer.
    ///
    /// The fade-in ramp exists only for a positive fade-in duration and is
    /// registered first. The fade-out ramp always exists and starts at the
    /// layer end time.
    pub fn for_layer(base: &LayerBase) -> Self {
        let has_fade_in = base.fade_in_duration > 0.0;
        let mut curve = Self::constant(if has_fade_in { 0.0 } else { 1.0 });

        if has_fade_in {
            curve.push(OpacityRamp {
                begin: base.start_time,
                duration: base.fade_in_duration,
                from: 0.0,
                to: 1.0,
            });
        }

        curve.push(OpacityRamp {
            begin: base.layer_end_time(),
            duration: base.fade_out_duration,
            from: 1.0,
            to: 0.0,
        });

        curve
    }

    /// Register a ramp after all existing ones.
    pub fn push(&mut self, ramp: OpacityRamp) {
        self.ramps.push(ramp);
    }

    /// Opacity at output time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        self.ramps
            .iter()
            .rev()
            .find(|ramp| ramp.is_active(t))
            .map_or(self.initial, |ramp| ramp.value_at(t))
    }

    /// Breakpoints `(time, value)` describing the curve, sorted by time.
    ///
    /// Between consecutive breakpoints the curve is linear; before the
    /// first it equals [`OpacityCurve::initial`] and after the last it holds.
    /// A discontinuity appears as two breakpoints with the same time.
    pub fn keyframes(&self) -> Vec<(f64, f64)> {
        let mut times: Vec<f64> = self
            .ramps
            .iter()
            .flat_map(|ramp| [ramp.begin, ramp.end()])
            .collect();
        times.sort_by(f64::total_cmp);
        times.dedup();

        let mut points = Vec::with_capacity(times.len() * 2);
        for t in times {
            let before = self.value_just_before(t);
            let at = self.value_at(t);
            if before != at {
                points.push((t, before));
            }
            points.push((t, at));
        }
        points
    }

    /// Limit of the curve approaching `t` from the left.
    fn value_just_before(&self, t: f64) -> f64 {
        self.ramps
            .iter()
            .rev()
            .find(|ramp| ramp.begin < t)
            .map_or(self.initial, |ramp| ramp.value_at(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickedit_project_model::geometry::Rect;

    fn layer(start: f64, duration: f64, fade_in: f64, fade_out: f64) -> LayerBase {
        LayerBase {
            start_time: start,
            duration,
            fade_in_duration: fade_in,
            fade_out_duration: fade_out,
            frame: Rect::new(0.0, 0.0, 10.0, 10.0),
            z_index: 0,
        }
    }

    #[test]
    fn test_no_fade_in_is_opaque_until_layer_end() {
        let curve = OpacityCurve::for_layer(&layer(2.0, 3.0, 0.0, 1.0));
        assert_eq!(curve.ramps.len(), 1);
        for t in [-1.0, 0.0, 1.99, 2.0, 4.0, 4.999] {
            assert_eq!(curve.value_at(t), 1.0, "t={t}");
        }
    }

    #[test]
    fn test_fade_in_is_linear() {
        let curve = OpacityCurve::for_layer(&layer(1.0, 4.0, 2.0, 0.0));
        assert_eq!(curve.value_at(0.5), 0.0);
        assert_eq!(curve.value_at(1.0), 0.0);
        assert_eq!(curve.value_at(2.0), 0.5);
        assert_eq!(curve.value_at(3.0), 1.0);
        assert_eq!(curve.value_at(4.0), 1.0);
    }

    #[test]
    fn test_fade_out_ends_at_zero_and_holds() {
        let curve = OpacityCurve::for_layer(&layer(0.0, 2.0, 0.5, 1.0));
        assert_eq!(curve.value_at(2.0), 1.0);
        assert_eq!(curve.value_at(2.5), 0.5);
        assert_eq!(curve.value_at(3.0), 0.0);
        assert_eq!(curve.value_at(100.0), 0.0);
    }

    #[test]
    fn test_zero_length_fade_out_drops_instantly() {
        let curve = OpacityCurve::for_layer(&layer(0.0, 2.0, 0.0, 0.0));
        assert_eq!(curve.value_at(1.999), 1.0);
        assert_eq!(curve.value_at(2.0), 0.0);
    }

    #[test]
    fn test_overlapping_fades_use_latest_ramp() {
        // Fade-in runs to t=3 but the window ends at t=1; the fade-out
        // ramp (registered later) takes over from t=1 with no blending.
        let curve = OpacityCurve::for_layer(&layer(0.0, 1.0, 3.0, 2.0));
        assert!((curve.value_at(0.9) - 0.3).abs() < 1e-12);
        assert_eq!(curve.value_at(1.0), 1.0);
        assert_eq!(curve.value_at(2.0), 0.5);
        assert_eq!(curve.value_at(3.0), 0.0);
    }

    #[test]
    fn test_keyframes_describe_fades() {
        let curve = OpacityCurve::for_layer(&layer(1.0, 2.0, 0.5, 0.5));
        assert_eq!(
            curve.keyframes(),
            vec![(1.0, 0.0), (1.5, 1.0), (3.0, 1.0), (3.5, 0.0)]
        );
    }

    #[test]
    fn test_keyframes_record_discontinuities() {
        let curve = OpacityCurve::for_layer(&layer(0.0, 1.0, 3.0, 0.0));
        let keys = curve.keyframes();
        // Jump from 1/3 down to 0 at t=1, then hold.
        assert_eq!(keys[0], (0.0, 0.0));
        assert_eq!(keys[1].0, 1.0);
        assert!((keys[1].1 - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(keys[2], (1.0, 0.0));
        assert_eq!(keys.last(), Some(&(3.0, 0.0)));
    }
}
