use crate::error::ResampleError;

/// Default ceiling on the length of a resampled axis.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Slack, in steps, so `(upper - lower) / step` landing just under an integer
/// still reaches `upper`.
const GRID_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Requested resampling window. Any field left `None` is resolved from the
/// input axes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResampleBounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub step: Option<f64>,
}

impl ResampleBounds {
    /// Interpret the three user-supplied strings. Empty or unparsable strings
    /// leave that bound unset; all three empty means "no resampling".
    pub fn from_strings(lower: &str, upper: &str, step: &str) -> Option<Self> {
        if lower.trim().is_empty() && upper.trim().is_empty() && step.trim().is_empty() {
            return None;
        }
        Some(ResampleBounds {
            lower: maybe_float(lower),
            upper: maybe_float(upper),
            step: maybe_float(step),
        })
    }
}

fn maybe_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

/// Bounds after defaults have been filled in.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Resolved {
    lower: f64,
    upper: f64,
    step: Option<f64>,
}

/// Fill unset bounds with the tightest window every axis covers.
///
/// Nothing is allocated here; a grid longer than `max_points` is rejected
/// before the caller builds it.
fn resolve<'a, I>(
    axes: I,
    bounds: &ResampleBounds,
    default_step: bool,
    max_points: usize,
) -> Result<Resolved, ResampleError>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut first_max = f64::NEG_INFINITY;
    let mut last_min = f64::INFINITY;
    let mut min_gap = f64::INFINITY;
    for axis in axes {
        let (Some(&first), Some(&last)) = (axis.first(), axis.last()) else {
            continue;
        };
        first_max = first_max.max(first);
        last_min = last_min.min(last);
        if default_step {
            for w in axis.windows(2) {
                min_gap = min_gap.min(w[1] - w[0]);
            }
        }
    }

    let lower = bounds.lower.unwrap_or(first_max);
    let upper = bounds.upper.unwrap_or(last_min);
    let step = match bounds.step {
        Some(step) => Some(step),
        None if default_step => Some(min_gap),
        None => None,
    };

    // also catches NaN bounds
    if !(lower < upper) {
        return Err(ResampleError::Overlap { lower, upper });
    }
    if let Some(step) = step {
        if !(step.is_finite() && step > 0.0) {
            return Err(ResampleError::InvalidStep { step });
        }
        let points = grid_len(lower, upper, step);
        // NaN and infinity fail this too
        if !(points <= max_points as f64) {
            return Err(ResampleError::TooManyPoints {
                points,
                limit: max_points,
            });
        }
    }
    log::debug!("resample window: lower={lower} upper={upper} step={step:?}");
    Ok(Resolved { lower, upper, step })
}

// ---------------------------------------------------------------------------
// Grid construction
// ---------------------------------------------------------------------------

/// Resampled (or cropped) data: one axis shared by every row.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub axis: Vec<f64>,
    pub rows: Vec<Vec<f64>>,
}

/// Number of points in `lower, lower + step, ..` that do not pass `upper`.
fn grid_len(lower: f64, upper: f64, step: f64) -> f64 {
    ((upper - lower) / step + GRID_TOLERANCE).floor() + 1.0
}

/// `lower, lower + step, ...` up to and never past `upper`.
///
/// Only called with a window that [`resolve`] has accepted.
fn uniform_axis(lower: f64, upper: f64, step: f64) -> Vec<f64> {
    let n = grid_len(lower, upper, step).max(0.0) as usize;
    (0..n).map(|i| (lower + i as f64 * step).min(upper)).collect()
}

/// One-dimensional linear interpolation of `(xp, fp)` at `x`.
///
/// `xp` must be ascending and non-empty. Outside `xp` the edge value is held.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len();
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    // xp[lo] <= x < xp[hi]
    let hi = xp.partition_point(|&v| v <= x);
    let lo = hi - 1;
    let (x0, x1) = (xp[lo], xp[hi]);
    fp[lo] + (x - x0) * (fp[hi] - fp[lo]) / (x1 - x0)
}

fn interp_onto(target: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    target.iter().map(|&x| interp(x, xp, fp)).collect()
}

/// Resample rows that share one ascending `axis`.
///
/// Without a step nothing is interpolated: the axis and every row are sliced
/// to `[lower, upper]` and values are left untouched.
pub fn resample_shared(
    axis: &[f64],
    rows: &[Vec<f64>],
    bounds: &ResampleBounds,
    max_points: usize,
) -> Result<Grid, ResampleError> {
    let resolved = resolve([axis], bounds, false, max_points)?;

    match resolved.step {
        Some(step) => {
            let target = uniform_axis(resolved.lower, resolved.upper, step);
            let rows = rows.iter().map(|row| interp_onto(&target, axis, row)).collect();
            Ok(Grid { axis: target, rows })
        }
        None => {
            let lo = axis.partition_point(|&v| v < resolved.lower);
            let hi = axis.partition_point(|&v| v <= resolved.upper);
            let hi = hi.max(lo);
            Ok(Grid {
                axis: axis[lo..hi].to_vec(),
                rows: rows.iter().map(|row| row[lo..hi].to_vec()).collect(),
            })
        }
    }
}

/// Resample spectra with independent axes onto one uniform axis.
///
/// Each input is an `(axis, intensity)` pair with an ascending, non-empty
/// axis. The step always resolves, defaulting to the smallest gap seen.
pub fn resample_many(
    spectra: &[(&[f64], &[f64])],
    bounds: &ResampleBounds,
    max_points: usize,
) -> Result<Grid, ResampleError> {
    let resolved = resolve(spectra.iter().map(|(axis, _)| *axis), bounds, true, max_points)?;
    let step = resolved.step.unwrap_or(f64::NAN);

    let target = uniform_axis(resolved.lower, resolved.upper, step);
    let rows = spectra
        .iter()
        .map(|(axis, intensity)| interp_onto(&target, axis, intensity))
        .collect();
    Ok(Grid { axis: target, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bounds_from_strings() {
        assert_eq!(ResampleBounds::from_strings("", " ", ""), None);
        let b = ResampleBounds::from_strings("1.5", "abc", "").unwrap();
        assert_eq!(b.lower, Some(1.5));
        assert_eq!(b.upper, None);
        assert_eq!(b.step, None);
    }

    #[test]
    fn test_interp() {
        let xp = [1.0, 2.0, 4.0];
        let fp = [10.0, 20.0, 40.0];
        assert_eq!(interp(1.5, &xp, &fp), 15.0);
        assert_eq!(interp(3.0, &xp, &fp), 30.0);
        assert_eq!(interp(2.0, &xp, &fp), 20.0);
        assert_eq!(interp(0.0, &xp, &fp), 10.0);
        assert_eq!(interp(9.0, &xp, &fp), 40.0);
    }

    #[test]
    fn test_default_window_across_trajectories() {
        let a = ([1.0, 2.0, 3.0, 4.0], [1.0, 2.0, 3.0, 4.0]);
        let b = ([2.0, 3.0, 4.0, 5.0], [20.0, 30.0, 40.0, 50.0]);
        let grid = resample_many(&[(&a.0, &a.1), (&b.0, &b.1)], &ResampleBounds::default(), MAX_GRID_POINTS).unwrap();
        assert_eq!(grid.axis, vec![2.0, 3.0, 4.0]);
        assert_eq!(grid.rows[0], vec![2.0, 3.0, 4.0]);
        assert_eq!(grid.rows[1], vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_default_step_is_smallest_gap() {
        let a = ([0.0, 0.5, 2.0], [0.0, 1.0, 4.0]);
        let b = ([0.0, 1.0, 2.0], [0.0, 1.0, 2.0]);
        let grid = resample_many(&[(&a.0, &a.1), (&b.0, &b.1)], &ResampleBounds::default(), MAX_GRID_POINTS).unwrap();
        assert_eq!(grid.axis, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(grid.rows[1], vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_inverted_bounds_overlap_error() {
        let axis = [1.0, 2.0, 3.0];
        let bounds = ResampleBounds {
            lower: Some(10.0),
            upper: Some(5.0),
            step: Some(1.0),
        };
        let err = resample_shared(&axis, &[vec![0.0; 3]], &bounds, MAX_GRID_POINTS).unwrap_err();
        assert_eq!(err, ResampleError::Overlap { lower: 10.0, upper: 5.0 });
    }

    #[test]
    fn test_disjoint_trajectories_overlap_error() {
        let a = ([1.0, 2.0], [0.0, 0.0]);
        let b = ([5.0, 6.0], [0.0, 0.0]);
        let err = resample_many(&[(&a.0, &a.1), (&b.0, &b.1)], &ResampleBounds::default(), MAX_GRID_POINTS).unwrap_err();
        assert!(matches!(err, ResampleError::Overlap { .. }));
    }

    #[test]
    fn test_zero_step_rejected() {
        let axis = [1.0, 2.0, 3.0];
        let bounds = ResampleBounds {
            step: Some(0.0),
            ..Default::default()
        };
        let err = resample_shared(&axis, &[vec![0.0; 3]], &bounds, MAX_GRID_POINTS).unwrap_err();
        assert_eq!(err, ResampleError::InvalidStep { step: 0.0 });
    }

    #[test]
    fn test_crop_keeps_values() {
        let axis = [1.0, 2.0, 3.0, 4.0, 5.0];
        let rows = vec![vec![0.1, 0.2, 0.3, 0.4, 0.5]];
        let bounds = ResampleBounds {
            lower: Some(1.5),
            upper: Some(4.0),
            step: None,
        };
        let grid = resample_shared(&axis, &rows, &bounds, MAX_GRID_POINTS).unwrap();
        assert_eq!(grid.axis, vec![2.0, 3.0, 4.0]);
        assert_eq!(grid.rows[0], vec![0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_uniform_axis_rounding_tolerance() {
        // 0.3 / 0.1 is just under 3; the last point must survive
        let axis = uniform_axis(0.0, 0.3, 0.1);
        assert_eq!(axis.len(), 4);
        assert!(axis[3] <= 0.3);
    }

    #[test]
    fn test_uniform_axis_stops_before_upper() {
        assert_eq!(uniform_axis(0.0, 2.7, 1.0), vec![0.0, 1.0, 2.0]);
        assert_eq!(uniform_axis(0.0, 2.2, 1.0), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_default_window_never_extrapolates() {
        let a = ([0.0, 0.37, 1.0], [0.0, 1.0, 2.0]);
        let b = ([0.0, 1.0, 2.0], [5.0, 6.0, 7.0]);
        let grid = resample_many(&[(&a.0, &a.1), (&b.0, &b.1)], &ResampleBounds::default(), MAX_GRID_POINTS).unwrap();
        assert_eq!(grid.axis, vec![0.0, 0.37, 0.74]);
        assert!(grid.axis.iter().all(|&x| x <= 1.0));
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let axis = [0.0, 1.0, 2.0];
        let rows = [vec![0.0; 3]];

        let infinite = ResampleBounds::from_strings("0", "1e300", "1e-300").unwrap();
        let err = resample_shared(&axis, &rows, &infinite, MAX_GRID_POINTS).unwrap_err();
        assert!(matches!(err, ResampleError::TooManyPoints { points, .. } if points.is_infinite()));

        let huge = ResampleBounds::from_strings("0", "1e6", "1e-6").unwrap();
        let err = resample_shared(&axis, &rows, &huge, MAX_GRID_POINTS).unwrap_err();
        assert!(matches!(err, ResampleError::TooManyPoints { limit: MAX_GRID_POINTS, .. }));

        // the limit is inclusive
        let ten = ResampleBounds::from_strings("0", "9", "1").unwrap();
        assert_eq!(resample_shared(&axis, &rows, &ten, 10).unwrap().axis.len(), 10);
        assert!(resample_shared(&axis, &rows, &ten, 9).is_err());
    }

    #[test]
    fn test_tiny_default_step_rejected() {
        let a = ([0.0, 1e-12, 1.0], [0.0, 0.0, 0.0]);
        let b = ([0.0, 1.0], [0.0, 0.0]);
        let err = resample_many(&[(&a.0, &a.1), (&b.0, &b.1)], &ResampleBounds::default(), MAX_GRID_POINTS)
            .unwrap_err();
        assert!(matches!(err, ResampleError::TooManyPoints { .. }));
    }

    proptest! {
        #[test]
        fn prop_uniform_axis_length(
            lower in -1000.0f64..1000.0,
            steps in 1usize..500,
            frac in 0.0f64..0.99,
            step in 0.01f64..10.0,
        ) {
            let upper = lower + (steps as f64 + frac) * step;
            let axis = uniform_axis(lower, upper, step);
            prop_assert_eq!(axis.len(), steps + 1);
            prop_assert_eq!(axis[0], lower);
            prop_assert!(axis[axis.len() - 1] <= upper);
            prop_assert!(upper - axis[axis.len() - 1] < step);
        }

        #[test]
        fn prop_crop_never_changes_values(
            values in prop::collection::vec(-1e6f64..1e6, 2..60),
            lo_frac in 0.0f64..0.5,
            hi_frac in 0.5f64..1.0,
        ) {
            let axis: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
            let last = (values.len() - 1) as f64;
            let bounds = ResampleBounds {
                lower: Some(lo_frac * last),
                upper: Some(hi_frac * last),
                step: None,
            };
            if let Ok(grid) = resample_shared(&axis, &[values.clone()], &bounds, MAX_GRID_POINTS) {
                for (x, y) in grid.axis.iter().zip(&grid.rows[0]) {
                    prop_assert_eq!(*y, values[*x as usize]);
                }
            }
        }
    }
}
