//! Scalar functions of time, defined either by a closed-form rule or by a table
//! of samples.
//!
//! Tabulated functions are evaluated with the interpolation kernels in
//! [`crate::math::interp`] and integrate exactly with respect to their
//! interpolant, so the integral of a linearly interpolated curve is the
//! trapezoidal sum of its samples.

use std::{
    fmt,
    ops::{Add, Div, Mul, Neg},
    sync::Arc,
};

use itertools::izip;
use thiserror::Error;

use super::interp::{
    Extrapolation, Interpolation, hermite_slopes, prev_index, segment_integral, segment_slope,
    segment_value,
};

pub type Callable = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Number of Simpson intervals used to integrate closed-form functions
const CALLABLE_QUADRATURE_INTERVALS: usize = 1000;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("t = {t} is outside of the function domain [{lower}, {upper}]")]
    Domain { t: f64, lower: f64, upper: f64 },

    #[error("At least two samples are required, got {0}")]
    NotEnoughSamples(usize),

    #[error("Got {times} sample times but {values} sample values")]
    LengthMismatch { times: usize, values: usize },

    #[error("Sample times must be strictly increasing (sample {index})")]
    NonIncreasingTime { index: usize },

    #[error("Sample {index} is not a finite number")]
    NonFiniteSample { index: usize },
}

/// A function defined by samples `(t, f(t))` with strictly increasing `t`.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedFunction {
    times: Vec<f64>,
    values: Vec<f64>,
    knot_slopes: Option<Vec<f64>>,
    interpolation: Interpolation,
    extrapolation: Extrapolation,
}

impl TabulatedFunction {
    pub fn new(
        samples: &[(f64, f64)],
        interpolation: Interpolation,
        extrapolation: Extrapolation,
    ) -> Result<Self, Error> {
        let (times, values) = samples.iter().copied().unzip();

        Self::from_arrays(times, values, interpolation, extrapolation)
    }

    pub fn from_arrays(
        times: Vec<f64>,
        values: Vec<f64>,
        interpolation: Interpolation,
        extrapolation: Extrapolation,
    ) -> Result<Self, Error> {
        if times.len() != values.len() {
            return Err(Error::LengthMismatch {
                times: times.len(),
                values: values.len(),
            });
        }

        if times.len() < 2 {
            return Err(Error::NotEnoughSamples(times.len()));
        }

        if let Some(index) =
            izip!(&times, &values).position(|(t, v)| !t.is_finite() || !v.is_finite())
        {
            return Err(Error::NonFiniteSample { index });
        }

        if let Some(index) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(Error::NonIncreasingTime { index: index + 1 });
        }

        Ok(Self {
            knot_slopes: hermite_slopes(&times, &values, interpolation),
            times,
            values,
            interpolation,
            extrapolation,
        })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        izip!(&self.times, &self.values).map(|(&t, &v)| (t, v))
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// First and last sample times
    pub fn domain(&self) -> (f64, f64) {
        (self.times[0], self.times[self.times.len() - 1])
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn extrapolation(&self) -> Extrapolation {
        self.extrapolation
    }

    pub fn with_extrapolation(mut self, extrapolation: Extrapolation) -> Self {
        self.extrapolation = extrapolation;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.knot_slopes = hermite_slopes(&self.times, &self.values, interpolation);
        self.interpolation = interpolation;
        self
    }

    /// Same sample times and modes, new values
    fn with_values(&self, values: Vec<f64>) -> Self {
        Self {
            knot_slopes: hermite_slopes(&self.times, &values, self.interpolation),
            times: self.times.clone(),
            values,
            interpolation: self.interpolation,
            extrapolation: self.extrapolation,
        }
    }

    /// Applies `f` to every sample time, keeping the values.
    pub fn map_times(&self, f: impl Fn(f64) -> f64) -> Result<Self, Error> {
        Self::from_arrays(
            self.times.iter().map(|&t| f(t)).collect(),
            self.values.clone(),
            self.interpolation,
            self.extrapolation,
        )
    }

    /// Multiplies every sample value by `k`.
    pub fn scaled(&self, k: f64) -> Self {
        self.with_values(self.values.iter().map(|v| v * k).collect())
    }

    /// Sample with the largest value. Ties resolve to the earliest sample.
    pub fn argmax(&self) -> (f64, f64) {
        let mut best = 0;
        for (i, v) in self.values.iter().enumerate().skip(1) {
            if *v > self.values[best] {
                best = i;
            }
        }

        (self.times[best], self.values[best])
    }

    fn interpolate(&self, t: f64) -> f64 {
        let i = prev_index(&self.times, t);
        segment_value(&self.times, &self.values, self.knot_slopes.as_deref(), i, t)
    }

    fn domain_error(&self, t: f64) -> Error {
        let (lower, upper) = self.domain();
        Error::Domain { t, lower, upper }
    }

    pub fn evaluate(&self, t: f64) -> Result<f64, Error> {
        let (lower, upper) = self.domain();

        if t < lower || t > upper {
            match self.extrapolation {
                Extrapolation::Zero => Ok(0.0),
                Extrapolation::Constant if t < lower => Ok(self.values[0]),
                Extrapolation::Constant => Ok(self.values[self.values.len() - 1]),
                Extrapolation::Error => Err(self.domain_error(t)),
            }
        } else {
            Ok(self.interpolate(t))
        }
    }

    /// Derivative of the interpolant. Zero outside of the domain, unless the
    /// extrapolation mode forbids leaving it.
    pub fn slope(&self, t: f64) -> Result<f64, Error> {
        let (lower, upper) = self.domain();

        if t < lower || t > upper {
            match self.extrapolation {
                Extrapolation::Error => Err(self.domain_error(t)),
                _ => Ok(0.0),
            }
        } else {
            let i = prev_index(&self.times, t);
            Ok(segment_slope(
                &self.times,
                &self.values,
                self.knot_slopes.as_deref(),
                i,
                t,
            ))
        }
    }

    /// Integral of the interpolant over the part of `[a, b]` that lies inside
    /// the sample domain. Extrapolation is ignored.
    pub fn area(&self, a: f64, b: f64) -> f64 {
        let (lower, upper) = self.domain();
        let (a, b) = (a.max(lower), b.min(upper));

        if a >= b {
            return 0.0;
        }

        let d = self.knot_slopes.as_deref();
        (prev_index(&self.times, a)..=prev_index(&self.times, b))
            .map(|i| {
                let lo = a.max(self.times[i]);
                let hi = b.min(self.times[i + 1]);

                if lo < hi {
                    segment_integral(&self.times, &self.values, d, i, lo, hi)
                } else {
                    0.0
                }
            })
            .sum()
    }

    /// Definite integral from `a` to `b`, including the extrapolated regions.
    pub fn integral(&self, a: f64, b: f64) -> Result<f64, Error> {
        if a > b {
            return self.integral(b, a).map(|v| -v);
        }

        let (lower, upper) = self.domain();
        let mut total = self.area(a, b);

        if a < lower {
            total += self.extrapolated_area(a, b.min(lower), a, self.values[0])?;
        }

        if b > upper {
            let last = self.values[self.values.len() - 1];
            total += self.extrapolated_area(a.max(upper), b, b, last)?;
        }

        Ok(total)
    }

    fn extrapolated_area(
        &self,
        from: f64,
        to: f64,
        outside: f64,
        boundary: f64,
    ) -> Result<f64, Error> {
        match self.extrapolation {
            Extrapolation::Zero => Ok(0.0),
            Extrapolation::Constant => Ok(boundary * (to - from)),
            Extrapolation::Error => Err(self.domain_error(outside)),
        }
    }
}

#[derive(Clone)]
pub enum Source {
    Constant(f64),
    Callable(Callable),
    Tabulated(TabulatedFunction),
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Source::Callable(_) => f.write_str("Callable(..)"),
            Source::Tabulated(t) => f.debug_tuple("Tabulated").field(t).finish(),
        }
    }
}

/// A scalar function of time with named input and output axes.
#[derive(Debug, Clone)]
pub struct Function {
    source: Source,
    inputs: String,
    outputs: String,
}

impl Function {
    fn from_source(source: Source) -> Self {
        Self {
            source,
            inputs: "Time (s)".to_string(),
            outputs: "Scalar".to_string(),
        }
    }

    pub fn constant(value: f64) -> Self {
        Self::from_source(Source::Constant(value))
    }

    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self::from_source(Source::Callable(Arc::new(f)))
    }

    pub fn tabulated(table: TabulatedFunction) -> Self {
        Self::from_source(Source::Tabulated(table))
    }

    pub fn from_samples(
        samples: &[(f64, f64)],
        interpolation: Interpolation,
        extrapolation: Extrapolation,
    ) -> Result<Self, Error> {
        Ok(Self::tabulated(TabulatedFunction::new(
            samples,
            interpolation,
            extrapolation,
        )?))
    }

    pub fn with_labels(mut self, inputs: impl Into<String>, outputs: impl Into<String>) -> Self {
        self.inputs = inputs.into();
        self.outputs = outputs.into();
        self
    }

    pub fn inputs(&self) -> &str {
        &self.inputs
    }

    pub fn outputs(&self) -> &str {
        &self.outputs
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn as_tabulated(&self) -> Option<&TabulatedFunction> {
        match &self.source {
            Source::Tabulated(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_tabulated(&self) -> bool {
        matches!(self.source, Source::Tabulated(_))
    }

    pub fn evaluate(&self, t: f64) -> Result<f64, Error> {
        match &self.source {
            Source::Constant(v) => Ok(*v),
            Source::Callable(f) => Ok(f(t)),
            Source::Tabulated(table) => table.evaluate(t),
        }
    }

    pub fn evaluate_many(&self, t: &[f64]) -> Result<Vec<f64>, Error> {
        t.iter().map(|&t| self.evaluate(t)).collect()
    }

    /// Out-of-domain evaluations of combined functions become NaN
    fn value_or_nan(&self, t: f64) -> f64 {
        self.evaluate(t).unwrap_or(f64::NAN)
    }

    /// Samples the function on `num_points` evenly spaced times in
    /// `[lower, upper]`, both ends included.
    pub fn discretize(
        &self,
        lower: f64,
        upper: f64,
        num_points: usize,
        interpolation: Interpolation,
        extrapolation: Extrapolation,
    ) -> Result<TabulatedFunction, Error> {
        if num_points < 2 {
            return Err(Error::NotEnoughSamples(num_points));
        }

        let step = (upper - lower) / (num_points - 1) as f64;
        let times: Vec<f64> = (0..num_points)
            .map(|i| {
                if i == num_points - 1 {
                    upper
                } else {
                    lower + step * i as f64
                }
            })
            .collect();
        let values = self.evaluate_many(&times)?;

        TabulatedFunction::from_arrays(times, values, interpolation, extrapolation)
    }

    pub fn integral(&self, a: f64, b: f64) -> Result<f64, Error> {
        match &self.source {
            Source::Constant(v) => Ok(v * (b - a)),
            Source::Callable(f) => Ok(simpson(&**f, a, b, CALLABLE_QUADRATURE_INTERVALS)),
            Source::Tabulated(table) => table.integral(a, b),
        }
    }

    pub fn differentiate(&self, t: f64) -> Result<f64, Error> {
        match &self.source {
            Source::Constant(_) => Ok(0.0),
            Source::Callable(f) => {
                let h = 1e-6 * t.abs().max(1.0);
                Ok((f(t + h) - f(t - h)) / (2.0 * h))
            }
            Source::Tabulated(table) => table.slope(t),
        }
    }

    pub fn scale(&self, k: f64) -> Function {
        let source = match &self.source {
            Source::Constant(v) => Source::Constant(v * k),
            Source::Tabulated(table) => Source::Tabulated(table.scaled(k)),
            Source::Callable(f) => {
                let f = f.clone();
                Source::Callable(Arc::new(move |t| k * f(t)))
            }
        };

        Function {
            source,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }

    /// Pointwise combination. Tabulated functions sharing the same sample
    /// times and modes stay tabulated, anything else becomes a callable.
    pub fn combine(&self, other: &Function, op: fn(f64, f64) -> f64) -> Function {
        let source = match (&self.source, &other.source) {
            (Source::Constant(a), Source::Constant(b)) => Source::Constant(op(*a, *b)),
            (Source::Tabulated(a), Source::Tabulated(b))
                if a.times() == b.times()
                    && a.interpolation() == b.interpolation()
                    && a.extrapolation() == b.extrapolation() =>
            {
                let values = izip!(a.values(), b.values())
                    .map(|(x, y)| op(*x, *y))
                    .collect();
                Source::Tabulated(a.with_values(values))
            }
            _ => {
                let (f, g) = (self.clone(), other.clone());
                Source::Callable(Arc::new(move |t| op(f.value_or_nan(t), g.value_or_nan(t))))
            }
        };

        Function {
            source,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }
}

fn simpson(f: &dyn Fn(f64) -> f64, a: f64, b: f64, intervals: usize) -> f64 {
    let n = intervals + intervals % 2;
    let h = (b - a) / n as f64;

    let inner: f64 = (1..n)
        .map(|i| {
            let w = if i % 2 == 1 { 4.0 } else { 2.0 };
            w * f(a + h * i as f64)
        })
        .sum();

    h / 3.0 * (f(a) + inner + f(b))
}

impl From<f64> for Function {
    fn from(value: f64) -> Self {
        Function::constant(value)
    }
}

impl From<TabulatedFunction> for Function {
    fn from(table: TabulatedFunction) -> Self {
        Function::tabulated(table)
    }
}

impl Mul<f64> for &Function {
    type Output = Function;

    fn mul(self, rhs: f64) -> Function {
        self.scale(rhs)
    }
}

impl Mul<f64> for Function {
    type Output = Function;

    fn mul(self, rhs: f64) -> Function {
        self.scale(rhs)
    }
}

impl Div<f64> for Function {
    type Output = Function;

    fn div(self, rhs: f64) -> Function {
        self.scale(1.0 / rhs)
    }
}

impl Neg for Function {
    type Output = Function;

    fn neg(self) -> Function {
        self.scale(-1.0)
    }
}

impl Add for &Function {
    type Output = Function;

    fn add(self, rhs: &Function) -> Function {
        self.combine(rhs, |a, b| a + b)
    }
}

impl Add for Function {
    type Output = Function;

    fn add(self, rhs: Function) -> Function {
        self.combine(&rhs, |a, b| a + b)
    }
}

impl Mul for &Function {
    type Output = Function;

    fn mul(self, rhs: &Function) -> Function {
        self.combine(rhs, |a, b| a * b)
    }
}

impl Mul for Function {
    type Output = Function;

    fn mul(self, rhs: Function) -> Function {
        self.combine(&rhs, |a, b| a * b)
    }
}
