use itertools::{Itertools, izip};
use num_traits::Num;
use strum::{AsRefStr, Display, EnumString};

/// How a tabulated function is evaluated between two samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Linear,

    /// Natural cubic spline through every sample
    Spline,

    /// Akima's local cubic, does not overshoot around isolated outliers
    Akima,
}

/// How a tabulated function is evaluated outside of its sample domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Extrapolation {
    #[default]
    Zero,

    /// Hold the first / last sample value
    Constant,

    Error,
}

#[inline]
pub fn deltas<T>(p: &[T]) -> Vec<T>
where
    T: Num + Copy,
{
    p.iter().tuple_windows().map(|(&p1, &p2)| p2 - p1).collect()
}

#[inline]
pub fn slopes<T>(dx: &[T], dy: &[T]) -> Vec<T>
where
    T: Num + Copy,
{
    izip!(dx, dy).map(|(&dx, &dy)| dy / dx).collect()
}

/// Index of the segment `[x[i], x[i + 1]]` to be used to evaluate `xp`.
/// Points outside of the domain map to the first or last segment.
#[inline]
pub fn prev_index<T>(x: &[T], xp: T) -> usize
where
    T: PartialOrd + Copy,
{
    if x.len() < 2 {
        return 0;
    }

    x.partition_point(|&v| v <= xp)
        .saturating_sub(1)
        .min(x.len() - 2)
}

/// Knot derivatives of the cubic Hermite representation of the interpolant.
/// Returns `None` for piecewise linear interpolation, or when there are too few
/// samples to build a cubic (in which case the interpolant is linear as well).
pub fn hermite_slopes(x: &[f64], y: &[f64], mode: Interpolation) -> Option<Vec<f64>> {
    if x.len() < 3 {
        return None;
    }

    match mode {
        Interpolation::Linear => None,
        Interpolation::Spline => Some(natural_spline_slopes(x, y)),
        Interpolation::Akima => Some(akima_slopes(x, y)),
    }
}

fn natural_spline_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let h = deltas(x);
    let m = slopes(&h, &deltas(y));

    // Second derivatives, zero at both ends. Interior values solve a
    // tridiagonal system (Thomas algorithm).
    let mut m2 = vec![0.0; n];
    let k = n - 2;
    let mut c_prime = vec![0.0; k];
    let mut r_prime = vec![0.0; k];

    for j in 0..k {
        let i = j + 1;
        let a = h[i - 1];
        let b = 2.0 * (h[i - 1] + h[i]);
        let c = h[i];
        let r = 6.0 * (m[i] - m[i - 1]);

        if j == 0 {
            c_prime[j] = c / b;
            r_prime[j] = r / b;
        } else {
            let den = b - a * c_prime[j - 1];
            c_prime[j] = c / den;
            r_prime[j] = (r - a * r_prime[j - 1]) / den;
        }
    }

    for j in (0..k).rev() {
        let next = if j + 1 < k { m2[j + 2] } else { 0.0 };
        m2[j + 1] = r_prime[j] - c_prime[j] * next;
    }

    let mut d: Vec<f64> = (0..n - 1)
        .map(|i| m[i] - h[i] * (2.0 * m2[i] + m2[i + 1]) / 6.0)
        .collect();
    d.push(m[n - 2] + h[n - 2] * (m2[n - 2] + 2.0 * m2[n - 1]) / 6.0);

    d
}

fn akima_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let m = slopes(&deltas(x), &deltas(y));

    // Segment slopes padded with two extrapolated values on each side
    let mut ext = Vec::with_capacity(n + 3);
    let m_before = 2.0 * m[0] - m[1];
    ext.push(2.0 * m_before - m[0]);
    ext.push(m_before);
    ext.extend_from_slice(&m);
    let m_after = 2.0 * m[n - 2] - m[n - 3];
    ext.push(m_after);
    ext.push(2.0 * m_after - m[n - 2]);

    (0..n)
        .map(|i| {
            let w1 = (ext[i + 3] - ext[i + 2]).abs();
            let w2 = (ext[i + 1] - ext[i]).abs();

            if w1 + w2 > f64::EPSILON {
                (w1 * ext[i + 1] + w2 * ext[i + 2]) / (w1 + w2)
            } else {
                0.5 * (ext[i + 1] + ext[i + 2])
            }
        })
        .collect()
}

/// Value of segment `i` of the interpolant at `xp`. `xp` may lie outside the
/// segment, in which case the segment polynomial is extended.
pub fn segment_value(x: &[f64], y: &[f64], d: Option<&[f64]>, i: usize, xp: f64) -> f64 {
    let h = x[i + 1] - x[i];
    let s = (xp - x[i]) / h;

    match d {
        None => y[i] + (y[i + 1] - y[i]) * s,
        Some(d) => {
            let s2 = s * s;
            let s3 = s2 * s;

            let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
            let h10 = s3 - 2.0 * s2 + s;
            let h01 = -2.0 * s3 + 3.0 * s2;
            let h11 = s3 - s2;

            h00 * y[i] + h10 * h * d[i] + h01 * y[i + 1] + h11 * h * d[i + 1]
        }
    }
}

/// First derivative of segment `i` of the interpolant at `xp`.
pub fn segment_slope(x: &[f64], y: &[f64], d: Option<&[f64]>, i: usize, xp: f64) -> f64 {
    let h = x[i + 1] - x[i];

    match d {
        None => (y[i + 1] - y[i]) / h,
        Some(d) => {
            let s = (xp - x[i]) / h;
            let s2 = s * s;

            let dh00 = 6.0 * s2 - 6.0 * s;
            let dh10 = 3.0 * s2 - 4.0 * s + 1.0;
            let dh01 = -6.0 * s2 + 6.0 * s;
            let dh11 = 3.0 * s2 - 2.0 * s;

            (dh00 * y[i] + dh01 * y[i + 1]) / h + dh10 * d[i] + dh11 * d[i + 1]
        }
    }
}

/// Exact integral of segment `i` between `a` and `b` (both inside the segment).
/// Simpson's rule is exact for polynomials up to the third degree.
pub fn segment_integral(x: &[f64], y: &[f64], d: Option<&[f64]>, i: usize, a: f64, b: f64) -> f64 {
    let mid = 0.5 * (a + b);

    (b - a) / 6.0
        * (segment_value(x, y, d, i, a)
            + 4.0 * segment_value(x, y, d, i, mid)
            + segment_value(x, y, d, i, b))
}
