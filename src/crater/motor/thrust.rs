use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, warn};

use super::{Error, eng::EngFile};
use crate::math::{
    function::{self, Callable, Function, TabulatedFunction},
    interp::{Extrapolation, Interpolation},
};

/// Thrust curves are always discrete once ingested
pub type ThrustCurve = TabulatedFunction;

/// Number of samples used to discretize closed-form thrust sources
pub const CALLABLE_THRUST_SAMPLES: usize = 50;

/// Raw thrust data, in Newtons as a function of seconds.
#[derive(Clone)]
pub enum ThrustSource {
    Constant(f64),
    Callable(Callable),

    /// `(time, thrust)` pairs with strictly increasing time
    Samples(Vec<(f64, f64)>),
    Function(Function),

    /// RASP `.eng` file
    EngFile(PathBuf),

    /// Two column `.csv` file without header: time, thrust
    CsvFile(PathBuf),
}

impl ThrustSource {
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        ThrustSource::Callable(Arc::new(f))
    }

    /// Selects the file reader from the file extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("eng") => Ok(ThrustSource::EngFile(path.into())),
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(ThrustSource::CsvFile(path.into())),
            _ => Err(Error::UnknownFileFormat(path.into())),
        }
    }
}

impl fmt::Debug for ThrustSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrustSource::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            ThrustSource::Callable(_) => f.write_str("Callable(..)"),
            ThrustSource::Samples(s) => f.debug_tuple("Samples").field(&s.len()).finish(),
            ThrustSource::Function(func) => f.debug_tuple("Function").field(func).finish(),
            ThrustSource::EngFile(p) => f.debug_tuple("EngFile").field(p).finish(),
            ThrustSource::CsvFile(p) => f.debug_tuple("CsvFile").field(p).finish(),
        }
    }
}

impl From<f64> for ThrustSource {
    fn from(value: f64) -> Self {
        ThrustSource::Constant(value)
    }
}

impl From<Vec<(f64, f64)>> for ThrustSource {
    fn from(samples: Vec<(f64, f64)>) -> Self {
        ThrustSource::Samples(samples)
    }
}

impl From<&[(f64, f64)]> for ThrustSource {
    fn from(samples: &[(f64, f64)]) -> Self {
        ThrustSource::Samples(samples.to_vec())
    }
}

impl From<Function> for ThrustSource {
    fn from(function: Function) -> Self {
        ThrustSource::Function(function)
    }
}

/// Time interval in which the motor is burning, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurnWindow {
    pub start: f64,
    pub end: f64,
}

impl BurnWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    pub(crate) fn validated(self) -> Result<Self, Error> {
        if self.start > self.end {
            Err(Error::ReversedBurnWindow {
                start: self.start,
                end: self.end,
            })
        } else {
            Ok(self)
        }
    }
}

impl fmt::Display for BurnWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) s", self.start, self.end)
    }
}

/// A single value is the burn out time of a burn starting at t = 0
impl From<f64> for BurnWindow {
    fn from(end: f64) -> Self {
        BurnWindow::new(0.0, end)
    }
}

impl From<(f64, f64)> for BurnWindow {
    fn from((start, end): (f64, f64)) -> Self {
        BurnWindow::new(start, end)
    }
}

/// Target of a thrust curve reshape: new burn window and new total impulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reshape {
    pub burn_window: BurnWindow,
    pub total_impulse: f64,
}

impl Reshape {
    pub fn new(burn_window: impl Into<BurnWindow>, total_impulse: f64) -> Self {
        Self {
            burn_window: burn_window.into(),
            total_impulse,
        }
    }
}

/// Non-fatal events raised while building a motor.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    BurnWindowClamped {
        requested: BurnWindow,
        clamped: BurnWindow,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::BurnWindowClamped { requested, clamped } => write!(
                f,
                "Burn window {requested} is out of the thrust source time range, using {clamped} instead. \
                 Use a reshape to change the burn out time of the curve."
            ),
        }
    }
}

/// Converts the thrust source into a discrete thrust curve and returns it
/// with the burn window to be used.
pub fn resolve_thrust_source(
    source: &ThrustSource,
    burn_window: Option<BurnWindow>,
    interpolation: Interpolation,
) -> Result<(ThrustCurve, BurnWindow), Error> {
    let function = match source {
        ThrustSource::Constant(v) => Function::constant(*v),
        ThrustSource::Callable(f) => {
            let f = f.clone();
            Function::callable(move |t| f(t))
        }
        ThrustSource::Function(f) => f.clone(),
        ThrustSource::Samples(samples) => tabulate(samples, interpolation)?,
        ThrustSource::EngFile(path) => {
            debug!("Reading thrust curve from {}", path.display());
            tabulate(&EngFile::read(path)?.points, interpolation)?
        }
        ThrustSource::CsvFile(path) => {
            debug!("Reading thrust curve from {}", path.display());
            tabulate(&read_csv_samples(path)?, interpolation)?
        }
    };

    let curve = match function.as_tabulated() {
        Some(table) => table
            .clone()
            .with_interpolation(interpolation)
            .with_extrapolation(Extrapolation::Zero),
        None => {
            let window = burn_window.ok_or(Error::BurnWindowRequired)?.validated()?;

            function.discretize(
                window.start,
                window.end,
                CALLABLE_THRUST_SAMPLES,
                interpolation,
                Extrapolation::Zero,
            )?
        }
    };

    let burn_window = match burn_window {
        Some(window) => window.validated()?,
        None => {
            let (start, end) = curve.domain();
            BurnWindow::new(start, end)
        }
    };

    Ok((curve, burn_window))
}

fn tabulate(
    samples: &[(f64, f64)],
    interpolation: Interpolation,
) -> Result<Function, function::Error> {
    Function::from_samples(samples, interpolation, Extrapolation::Zero)
}

fn read_csv_samples(path: &Path) -> Result<Vec<(f64, f64)>, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut samples = vec![];
    for record in reader.deserialize() {
        let sample: (f64, f64) = record?;
        samples.push(sample);
    }

    Ok(samples)
}

/// Stretches the curve in time to cover `burn_window`, then scales its
/// magnitude so that it delivers `total_impulse`. The shape of the curve is
/// preserved.
pub fn reshape_thrust_curve(
    curve: &ThrustCurve,
    burn_window: BurnWindow,
    total_impulse: f64,
) -> Result<ThrustCurve, Error> {
    let (t0, t1) = curve.domain();
    let scale = burn_window.duration() / (t1 - t0);

    let stretched = curve.map_times(|t| (t - t0) * scale + burn_window.start)?;
    let old_impulse = stretched.integral(burn_window.start, burn_window.end)?;

    Ok(stretched.scaled(total_impulse / old_impulse))
}

/// Restricts the curve to `burn_window`, inserting interpolated samples at the
/// window bounds. A window exceeding the curve domain is clamped to it, which
/// is reported with a diagnostic.
pub fn clip_thrust_curve(
    curve: &ThrustCurve,
    burn_window: BurnWindow,
) -> Result<(ThrustCurve, BurnWindow, Option<Diagnostic>), Error> {
    let (lower, upper) = curve.domain();

    let mut window = burn_window;
    if window.end > upper {
        window.end = upper;
    }
    if window.start < lower {
        window.start = lower;
    }

    if window.start >= window.end {
        return Err(Error::EmptyBurnWindow {
            start: burn_window.start,
            end: burn_window.end,
            lower,
            upper,
        });
    }

    let diagnostic = (window != burn_window).then(|| {
        let diagnostic = Diagnostic::BurnWindowClamped {
            requested: burn_window,
            clamped: window,
        };
        warn!("{diagnostic}");
        diagnostic
    });

    // Samples on the bounds are dropped here and re-added below
    let mut samples = Vec::with_capacity(curve.len() + 2);
    samples.push((window.start, curve.evaluate(window.start)?));
    samples.extend(
        curve
            .samples()
            .filter(|(t, _)| *t > window.start && *t < window.end),
    );
    samples.push((window.end, curve.evaluate(window.end)?));

    let clipped = TabulatedFunction::new(&samples, curve.interpolation(), curve.extrapolation())?;

    Ok((clipped, window, diagnostic))
}
