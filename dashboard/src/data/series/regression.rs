//! Least-squares trend lines drawn over each panel's points.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::data::view::Regression;

/// A fitted trend. `coefficients` are `[intercept, slope]` for linear and
/// logarithmic fits, `[scale, rate]` for exponential ones, and ascending
/// powers for the quadratic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fit {
    pub kind: Regression,
    pub coefficients: Vec<f64>,
    /// Predictions at each distinct x used in the fit, sorted by x.
    pub points: Vec<[f64; 2]>,
}

impl Fit {
    pub fn predict(&self, x: f64) -> f64 {
        let c = &self.coefficients;
        match self.kind {
            Regression::None => f64::NAN,
            Regression::Linear => c[0] + c[1] * x,
            Regression::Exponential => c[0] * (c[1] * x).exp(),
            Regression::Logarithmic => c[0] + c[1] * x.ln(),
            Regression::Polynomial => c[0] + c[1] * x + c[2] * x * x,
        }
    }
}

/// Fit `kind` to `data`. Points outside the model's domain (non-positive y
/// for exponential, non-positive x for logarithmic) and non-finite points are
/// skipped; `None` when what remains cannot determine the model.
pub fn fit(kind: Regression, data: &[[f64; 2]]) -> Option<Fit> {
    let usable: Vec<[f64; 2]> = data
        .iter()
        .copied()
        .filter(|[x, y]| x.is_finite() && y.is_finite())
        .filter(|[x, y]| match kind {
            Regression::Exponential => *y > 0.0,
            Regression::Logarithmic => *x > 0.0,
            _ => true,
        })
        .collect();

    let coefficients = match kind {
        Regression::None => return None,
        Regression::Linear => line(usable.iter().map(|&[x, y]| (x, y)))?.to_vec(),
        Regression::Exponential => {
            let [a, b] = line(usable.iter().map(|&[x, y]| (x, y.ln())))?;
            vec![a.exp(), b]
        }
        Regression::Logarithmic => line(usable.iter().map(|&[x, y]| (x.ln(), y)))?.to_vec(),
        Regression::Polynomial => {
            let (m, c) = polyfit(&usable, 2)?;
            vec![c[0] - c[1] * m + c[2] * m * m, c[1] - 2.0 * c[2] * m, c[2]]
        }
    };
    Some(finish(kind, coefficients, &usable))
}

fn finish(kind: Regression, coefficients: Vec<f64>, usable: &[[f64; 2]]) -> Fit {
    let mut xs: Vec<f64> = usable.iter().map(|[x, _]| *x).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    let mut fit = Fit {
        kind,
        coefficients,
        points: Vec::with_capacity(xs.len()),
    };
    fit.points = xs.into_iter().map(|x| [x, fit.predict(x)]).collect();
    fit
}

/// `[intercept, slope]` of the straight line through `pairs`.
fn line(pairs: impl Iterator<Item = (f64, f64)>) -> Option<[f64; 2]> {
    let points: Vec<[f64; 2]> = pairs.map(|(x, y)| [x, y]).collect();
    let (m, c) = polyfit(&points, 1)?;
    Some([c[0] - c[1] * m, c[1]])
}

/// Least-squares polynomial of `degree` in `x - m`, where `m` is the mean x.
/// Returns `m` and the ascending coefficients. Needs more distinct x values
/// than the degree.
fn polyfit(points: &[[f64; 2]], degree: usize) -> Option<(f64, Vec<f64>)> {
    let terms = degree + 1;
    let mut xs: Vec<f64> = points.iter().map(|[x, _]| *x).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    if xs.len() < terms {
        return None;
    }

    let n = points.len();
    let m = points.iter().map(|[x, _]| x).sum::<f64>() / n as f64;
    let design = DMatrix::from_fn(n, terms, |i, j| (points[i][0] - m).powi(j as i32));
    let y = DVector::from_iterator(n, points.iter().map(|[_, y]| *y));
    let normal = design.transpose() * &design;
    let rhs = design.transpose() * y;
    let solution = normal.lu().solve(&rhs)?;
    if solution.iter().all(|c| c.is_finite()) {
        Some((m, solution.iter().copied().collect()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn linear_recovers_exact_line() {
        let data: Vec<[f64; 2]> = (0..5).map(|i| [i as f64, 2.0 + 3.0 * i as f64]).collect();
        let fit = fit(Regression::Linear, &data).unwrap();
        assert!(close(fit.coefficients[0], 2.0));
        assert!(close(fit.coefficients[1], 3.0));
        assert_eq!(fit.points.len(), 5);
    }

    #[test]
    fn curved_models_recover_exact_data() {
        let exp: Vec<[f64; 2]> = (0..6).map(|i| [i as f64, 1.5 * (0.4 * i as f64).exp()]).collect();
        let fitted = fit(Regression::Exponential, &exp).unwrap();
        assert!(close(fitted.coefficients[0], 1.5));
        assert!(close(fitted.coefficients[1], 0.4));

        let log: Vec<[f64; 2]> = (1..6).map(|i| [i as f64, 1.0 + 2.0 * (i as f64).ln()]).collect();
        let fitted = fit(Regression::Logarithmic, &log).unwrap();
        assert!(close(fitted.coefficients[0], 1.0));
        assert!(close(fitted.coefficients[1], 2.0));

        let quad: Vec<[f64; 2]> = (-3..4)
            .map(|i| {
                let x = i as f64;
                [x, 1.0 - 2.0 * x + 0.5 * x * x]
            })
            .collect();
        let fitted = fit(Regression::Polynomial, &quad).unwrap();
        assert!(close(fitted.coefficients[0], 1.0));
        assert!(close(fitted.coefficients[1], -2.0));
        assert!(close(fitted.coefficients[2], 0.5));
        assert!(close(fitted.predict(2.0), 1.0 - 4.0 + 2.0));
    }

    #[test]
    fn quadratic_over_calendar_years() {
        let data: Vec<[f64; 2]> = (2005..=2018)
            .map(|year| {
                let t = (year - 2010) as f64;
                [year as f64, 40.0 + 1.5 * t - 0.25 * t * t]
            })
            .collect();
        let fitted = fit(Regression::Polynomial, &data).unwrap();
        for [x, y] in &data {
            assert!((fitted.predict(*x) - y).abs() < 1e-4, "{x}");
        }
    }

    #[test]
    fn degenerate_inputs_give_no_fit() {
        assert!(fit(Regression::Linear, &[[1.0, 2.0]]).is_none());
        assert!(fit(Regression::Linear, &[[1.0, 2.0], [1.0, 3.0]]).is_none());
        assert!(fit(Regression::Polynomial, &[[0.0, 1.0], [1.0, 2.0]]).is_none());
        assert!(fit(Regression::Exponential, &[[0.0, -1.0], [1.0, 0.0]]).is_none());
        assert!(fit(Regression::None, &[[0.0, 1.0], [1.0, 2.0]]).is_none());
    }

    #[test]
    fn points_are_sorted_by_x() {
        let data = [[3.0, 1.0], [1.0, 2.0], [2.0, f64::NAN], [2.0, 4.0]];
        let fitted = fit(Regression::Linear, &data).unwrap();
        let xs: Vec<f64> = fitted.points.iter().map(|p| p[0]).collect();
        assert_eq!(xs, [1.0, 2.0, 3.0]);
    }
}
