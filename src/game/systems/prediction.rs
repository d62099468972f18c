use smallvec::SmallVec;

use crate::util::vec2::Vec2;

/// Short-horizon forecaster for the player head.
///
/// Fits `x(t)` and `y(t)` independently by weighted least squares over the
/// most recent samples, with weight `exp(t - n)` so the newest sample counts
/// most, and extrapolates `horizon` ticks past the newest sample.
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryPredictor {
    pub history_size: usize,
    pub horizon: f32,
    /// Forecasts are rounded to multiples of this step
    pub grid_step: f32,
}

impl TrajectoryPredictor {
    pub fn new(history_size: usize, horizon: f32, grid_step: f32) -> Self {
        Self {
            history_size,
            horizon,
            grid_step,
        }
    }

    /// Forecast from `history`, ordered most recent first.
    ///
    /// Returns `None` only for an empty history. With a single sample, or a
    /// degenerate fit, the most recent sample is returned unchanged.
    pub fn predict<I>(&self, history: I) -> Option<Vec2>
    where
        I: IntoIterator<Item = Vec2>,
    {
        let mut samples: SmallVec<[Vec2; 16]> =
            history.into_iter().take(self.history_size.max(1)).collect();
        let latest = *samples.first()?;
        if samples.len() == 1 {
            return Some(latest);
        }
        samples.reverse();

        let n = samples.len() as f64;
        let (mut sw, mut swt, mut swtt, mut swx, mut swy, mut swtx, mut swty) =
            (0.0f64, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        for (i, sample) in samples.iter().enumerate() {
            let t = (i + 1) as f64;
            let w = (t - n).exp();
            let (x, y) = (sample.x as f64, sample.y as f64);
            sw += w;
            swt += w * t;
            swtt += w * t * t;
            swx += w * x;
            swy += w * y;
            swtx += w * t * x;
            swty += w * t * y;
        }

        let denom = sw * swtt - swt * swt;
        if sw <= 0.0 || denom.abs() < f64::EPSILON {
            return Some(latest);
        }

        let at = n + self.horizon as f64;
        let fit = |sv: f64, stv: f64| {
            let slope = (sw * stv - swt * sv) / denom;
            let intercept = (sv - slope * swt) / sw;
            intercept + slope * at
        };
        let forecast = Vec2::new(fit(swx, swtx) as f32, fit(swy, swty) as f32);
        if !forecast.is_finite() {
            return Some(latest);
        }
        Some(forecast.round_to_step(self.grid_step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictor() -> TrajectoryPredictor {
        TrajectoryPredictor::new(10, 5.0, 10.0)
    }

    /// Points on x = 100 + 4t, y = 200 + 2t for t = 1..=n, newest first
    fn linear_history(n: usize) -> Vec<Vec2> {
        (1..=n)
            .rev()
            .map(|t| Vec2::new(100.0 + 4.0 * t as f32, 200.0 + 2.0 * t as f32))
            .collect()
    }

    #[test]
    fn test_linear_motion_extrapolates() {
        let forecast = predictor().predict(linear_history(10)).unwrap();
        // t = 15: (160, 230)
        assert_eq!(forecast, Vec2::new(160.0, 230.0));
    }

    #[test]
    fn test_only_recent_samples_used() {
        let mut history = linear_history(10);
        // Older samples beyond the window must not bend the fit
        history.extend([Vec2::new(0.0, 0.0), Vec2::new(600.0, 600.0)]);
        let forecast = predictor().predict(history).unwrap();
        assert_eq!(forecast, Vec2::new(160.0, 230.0));
    }

    #[test]
    fn test_short_history() {
        let forecast = predictor().predict(linear_history(3)).unwrap();
        // t = 8: (132, 216) rounded to grid
        assert_eq!(forecast, Vec2::new(130.0, 220.0));
    }

    #[test]
    fn test_stationary_head() {
        let history = vec![Vec2::new(301.0, 298.0); 10];
        let forecast = predictor().predict(history).unwrap();
        assert_eq!(forecast, Vec2::new(300.0, 300.0));
    }

    #[test]
    fn test_single_sample_unchanged() {
        let forecast = predictor().predict([Vec2::new(123.0, 457.0)]).unwrap();
        assert_eq!(forecast, Vec2::new(123.0, 457.0));
    }

    #[test]
    fn test_empty_history() {
        assert!(predictor().predict(std::iter::empty()).is_none());
    }

    #[test]
    fn test_forecast_is_finite_for_extreme_input() {
        let history = vec![Vec2::new(1e30, -1e30), Vec2::new(-1e30, 1e30), Vec2::new(0.0, 0.0)];
        let forecast = predictor().predict(history).unwrap();
        assert!(forecast.is_finite());
    }
}
