use std::{fmt, path::Path, str::FromStr};

use anyhow::anyhow;
use itertools::izip;
use log::{debug, info};
use nalgebra::{Matrix3, Vector3};
use once_cell::sync::OnceCell;

use super::{
    Error,
    eng::{EngDescription, EngFile},
    thrust::{
        BurnWindow, Diagnostic, Reshape, ThrustCurve, ThrustSource, clip_thrust_curve,
        reshape_thrust_curve, resolve_thrust_source,
    },
};
use crate::{
    math::{
        function::{self, Function},
        interp::Interpolation,
    },
    parameters::ParameterMap,
};

/// Direction of the motor axis used for positions along it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateOrientation {
    /// Positions grow from the nozzle towards the combustion chamber
    #[default]
    NozzleToChamber,
    ChamberToNozzle,
}

impl CoordinateOrientation {
    pub fn sign(self) -> f64 {
        match self {
            CoordinateOrientation::NozzleToChamber => 1.0,
            CoordinateOrientation::ChamberToNozzle => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CoordinateOrientation::NozzleToChamber => "nozzleToChamber",
            CoordinateOrientation::ChamberToNozzle => "chamberToNozzle",
        }
    }
}

impl FromStr for CoordinateOrientation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nozzleToChamber" => Ok(CoordinateOrientation::NozzleToChamber),
            "chamberToNozzle" => Ok(CoordinateOrientation::ChamberToNozzle),
            unknown => Err(Error::UnknownOrientation(unknown.to_string())),
        }
    }
}

impl fmt::Display for CoordinateOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs shared by every motor variant.
#[derive(Debug, Clone)]
pub struct MotorConfig {
    pub thrust_source: ThrustSource,

    /// Nozzle outlet radius, m
    pub nozzle_radius: f64,

    /// Required when the thrust source is a constant or a callable
    pub burn_window: Option<BurnWindow>,

    /// Nozzle outlet position in the motor frame, m
    pub nozzle_position: f64,
    pub reshape: Option<Reshape>,
    pub interpolation: Interpolation,
    pub coordinate_orientation: CoordinateOrientation,
}

impl MotorConfig {
    pub fn new(thrust_source: impl Into<ThrustSource>, nozzle_radius: f64) -> Self {
        Self {
            thrust_source: thrust_source.into(),
            nozzle_radius,
            burn_window: None,
            nozzle_position: 0.0,
            reshape: None,
            interpolation: Interpolation::Linear,
            coordinate_orientation: CoordinateOrientation::default(),
        }
    }

    pub fn with_burn_window(mut self, burn_window: impl Into<BurnWindow>) -> Self {
        self.burn_window = Some(burn_window.into());
        self
    }

    pub fn with_nozzle_position(mut self, nozzle_position: f64) -> Self {
        self.nozzle_position = nozzle_position;
        self
    }

    pub fn with_reshape(mut self, burn_window: impl Into<BurnWindow>, total_impulse: f64) -> Self {
        self.reshape = Some(Reshape::new(burn_window, total_impulse));
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_coordinate_orientation(mut self, orientation: CoordinateOrientation) -> Self {
        self.coordinate_orientation = orientation;
        self
    }

    /// Reads the settings shared by every motor variant from its parameter
    /// table. Only `nozzle_radius` and the `thrust` table are mandatory.
    pub fn from_params(params: &ParameterMap) -> anyhow::Result<Self> {
        let thrust_params = params.get_map("thrust")?;
        let thrust_source = match thrust_params.get_param("source")?.value_string()?.as_str() {
            "constant" => ThrustSource::Constant(thrust_params.get_param("value")?.value_float()?),
            "samples" => {
                let time = thrust_params.get_param("time")?.value_float_arr()?;
                let thrust = thrust_params.get_param("thrust")?.value_float_arr()?;
                if time.len() != thrust.len() {
                    return Err(anyhow!(
                        "Thrust samples have {} times and {} values",
                        time.len(),
                        thrust.len()
                    ));
                }

                ThrustSource::Samples(izip!(time, thrust).map(|(t, f)| (*t, *f)).collect())
            }
            "eng" => ThrustSource::EngFile(thrust_params.get_param("path")?.value_string()?.into()),
            "csv" => ThrustSource::CsvFile(thrust_params.get_param("path")?.value_string()?.into()),
            unknown => return Err(anyhow!("Unknown thrust source type: {unknown}")),
        };

        let nozzle_radius = params.get_param("nozzle_radius")?.value_float()?;
        let mut config = MotorConfig::new(thrust_source, nozzle_radius);

        if let Some(param) = params.get_param_opt("burn_time")? {
            config.burn_window = Some(burn_window_param(param.value_float_arr()?)?);
        }

        if let Some(param) = params.get_param_opt("nozzle_position")? {
            config.nozzle_position = param.value_float()?;
        }

        if let Some(param) = params.get_param_opt("interpolation")? {
            let mode = param.value_string()?;
            config.interpolation = mode
                .parse()
                .map_err(|_| anyhow!("Unknown interpolation mode: {mode}"))?;
        }

        if let Some(param) = params.get_param_opt("coordinate_orientation")? {
            config.coordinate_orientation = param.value_string()?.parse()?;
        }

        if params.contains_key("reshape") {
            let reshape = params.get_map("reshape")?;
            config.reshape = Some(Reshape::new(
                burn_window_param(reshape.get_param("burn_time")?.value_float_arr()?)?,
                reshape.get_param("total_impulse")?.value_float()?,
            ));
        }

        Ok(config)
    }
}

fn burn_window_param(values: &[f64]) -> anyhow::Result<BurnWindow> {
    match *values {
        [end] => Ok(BurnWindow::from(end)),
        [start, end] => Ok(BurnWindow::new(start, end)),
        _ => Err(anyhow!(
            "A burn time has one or two values, found {}",
            values.len()
        )),
    }
}

/// Thrust curve processing common to all the motor variants. Immutable once
/// built: derived quantities are computed at most once.
#[derive(Debug)]
pub struct MotorCore {
    thrust: ThrustCurve,
    burn_window: BurnWindow,

    nozzle_radius: f64,
    nozzle_position: f64,
    orientation: CoordinateOrientation,

    max_thrust: f64,
    max_thrust_time: f64,
    average_thrust: f64,

    diagnostics: Vec<Diagnostic>,

    total_impulse: OnceCell<f64>,
    exhaust_velocity: OnceCell<f64>,
}

impl MotorCore {
    pub fn new(config: MotorConfig) -> Result<Self, Error> {
        let (mut thrust, mut burn_window) = resolve_thrust_source(
            &config.thrust_source,
            config.burn_window,
            config.interpolation,
        )?;

        if let Some(reshape) = config.reshape {
            debug!(
                "Reshaping thrust curve to {} and {} Ns",
                reshape.burn_window, reshape.total_impulse
            );

            thrust = reshape_thrust_curve(
                &thrust,
                reshape.burn_window.validated()?,
                reshape.total_impulse,
            )?;
            let (start, end) = thrust.domain();
            burn_window = BurnWindow::new(start, end);
        }

        let (thrust, burn_window, diagnostic) = clip_thrust_curve(&thrust, burn_window)?;
        let (max_thrust_time, max_thrust) = thrust.argmax();

        let mut core = MotorCore {
            thrust,
            burn_window,
            nozzle_radius: config.nozzle_radius,
            nozzle_position: config.nozzle_position,
            orientation: config.coordinate_orientation,
            max_thrust,
            max_thrust_time,
            average_thrust: f64::NAN,
            diagnostics: diagnostic.into_iter().collect(),
            total_impulse: OnceCell::new(),
            exhaust_velocity: OnceCell::new(),
        };
        core.average_thrust = core.total_impulse() / core.burn_duration();

        debug!(
            "Thrust curve ready: {} samples, burn window {}, total impulse {:.3} Ns",
            core.thrust.len(),
            core.burn_window,
            core.total_impulse()
        );

        Ok(core)
    }

    /// Clipped thrust curve, N
    pub fn thrust(&self) -> &ThrustCurve {
        &self.thrust
    }

    pub fn thrust_function(&self) -> Function {
        Function::tabulated(self.thrust.clone()).with_labels("Time (s)", "Thrust (N)")
    }

    /// Thrust at time `t`, zero outside of the burn window
    pub fn thrust_at(&self, t: f64) -> f64 {
        if !self.burn_window.contains(t) {
            return 0.0;
        }

        // Zero extrapolation, never fails
        self.thrust.evaluate(t).unwrap_or(0.0)
    }

    pub fn burn_window(&self) -> BurnWindow {
        self.burn_window
    }

    pub fn burn_start_time(&self) -> f64 {
        self.burn_window.start
    }

    pub fn burn_out_time(&self) -> f64 {
        self.burn_window.end
    }

    pub fn burn_duration(&self) -> f64 {
        self.burn_window.duration()
    }

    /// Integral of the thrust over the burn window, Ns
    pub fn total_impulse(&self) -> f64 {
        *self
            .total_impulse
            .get_or_init(|| self.thrust.area(self.burn_window.start, self.burn_window.end))
    }

    fn exhaust_velocity(&self, propellant_initial_mass: f64) -> f64 {
        *self
            .exhaust_velocity
            .get_or_init(|| self.total_impulse() / propellant_initial_mass)
    }

    pub fn max_thrust(&self) -> f64 {
        self.max_thrust
    }

    pub fn max_thrust_time(&self) -> f64 {
        self.max_thrust_time
    }

    pub fn average_thrust(&self) -> f64 {
        self.average_thrust
    }

    pub fn nozzle_radius(&self) -> f64 {
        self.nozzle_radius
    }

    pub fn nozzle_position(&self) -> f64 {
        self.nozzle_position
    }

    pub fn coordinate_orientation(&self) -> CoordinateOrientation {
        self.orientation
    }

    pub fn coordinate_sign(&self) -> f64 {
        self.orientation.sign()
    }

    /// Non-fatal events raised during construction
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Propellant moments of inertia about the instantaneous center of mass, kg m^2
#[derive(Debug, Clone)]
pub struct InertiaTensor {
    /// About any axis perpendicular to the motor axis
    pub transverse: Function,

    /// About the motor axis
    pub axial: Function,
}

/// Propellant mass properties at a given time, in the motor frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MotorMassProperties {
    /// Center of mass distance from the nozzle outlet
    pub xcg_eng_frame_m: f64,
    pub xcg_dot_eng_frame_m: f64,
    pub mass_kg: f64,
    pub mass_dot_kg_s: f64,
    pub inertia_eng_frame_kgm2: Matrix3<f64>,
    pub inertia_dot_eng_frame_kgm2: Matrix3<f64>,
}

/// Interface implemented by every motor technology.
///
/// Mass and inertia depend on how the propellant is stored and consumed, so
/// each variant provides them. Thrust related quantities come from the
/// [`MotorCore`].
pub trait Motor {
    fn core(&self) -> &MotorCore;

    /// kg
    fn propellant_initial_mass(&self) -> f64;

    /// Propellant mass as a function of time, kg
    fn mass(&self) -> Function;

    /// Propellant center of mass position in the motor frame, m
    fn center_of_mass(&self) -> Function;

    fn inertia_tensor(&self) -> InertiaTensor;

    /// Inertia about e_1, perpendicular to the motor axis
    fn i_11(&self) -> Function;

    /// Inertia about e_2, perpendicular to the motor axis and to e_1
    fn i_22(&self) -> Function;

    /// Inertia about e_3, the motor axis
    fn i_33(&self) -> Function;

    /// Products of inertia include the minus sign of the tensor definition
    fn i_12(&self) -> Function;
    fn i_13(&self) -> Function;
    fn i_23(&self) -> Function;

    /// Description line used when exporting the motor to a `.eng` file
    fn eng_description(&self, name: &str) -> EngDescription;

    fn thrust(&self) -> Function {
        self.core().thrust_function()
    }

    /// Thrust in the body frame, along the motor axis
    fn thrust_b(&self, t: f64) -> Vector3<f64> {
        Vector3::new(self.core().thrust_at(t), 0.0, 0.0)
    }

    fn total_impulse(&self) -> f64 {
        self.core().total_impulse()
    }

    /// Assumed constant during the burn, m/s
    fn exhaust_velocity(&self) -> f64 {
        self.core().exhaust_velocity(self.propellant_initial_mass())
    }

    /// Propellant mass flow, kg/s (negative while burning)
    fn mass_dot(&self) -> Function {
        let rate = self.core().thrust().scaled(-1.0 / self.exhaust_velocity());
        Function::tabulated(rate).with_labels("Time (s)", "Mass Dot (kg/s)")
    }

    fn inertia_matrix(&self, t: f64) -> Result<Matrix3<f64>, function::Error> {
        tensor_at(self, t, Function::evaluate)
    }

    /// Time derivative of [`Motor::inertia_matrix`]
    fn inertia_dot(&self, t: f64) -> Result<Matrix3<f64>, function::Error> {
        tensor_at(self, t, Function::differentiate)
    }

    fn mass_properties(&self, t: f64) -> Result<MotorMassProperties, function::Error> {
        let sign = self.core().coordinate_sign();
        let center_of_mass = self.center_of_mass();

        Ok(MotorMassProperties {
            xcg_eng_frame_m: sign * (center_of_mass.evaluate(t)? - self.core().nozzle_position()),
            xcg_dot_eng_frame_m: sign * center_of_mass.differentiate(t)?,
            mass_kg: self.mass().evaluate(t)?,
            mass_dot_kg_s: self.mass_dot().evaluate(t)?,
            inertia_eng_frame_kgm2: self.inertia_matrix(t)?,
            inertia_dot_eng_frame_kgm2: self.inertia_dot(t)?,
        })
    }

    fn to_eng_file(&self, name: &str) -> EngFile {
        let mut eng = EngFile::from_curve(&self.eng_description(name), self.core().thrust());
        eng.comments
            .push(format!("{name} exported by {}", env!("CARGO_PKG_NAME")));
        eng
    }

    fn export_eng(&self, path: &Path, name: &str) -> Result<(), Error> {
        self.to_eng_file(name).write_file(path)?;
        info!("Motor '{name}' exported to '{}'", path.display());

        Ok(())
    }

    fn summary(&self) -> MotorSummary {
        let core = self.core();

        MotorSummary {
            burn_duration: core.burn_duration(),
            propellant_initial_mass: self.propellant_initial_mass(),
            exhaust_velocity: self.exhaust_velocity(),
            average_thrust: core.average_thrust(),
            max_thrust: core.max_thrust(),
            max_thrust_time: core.max_thrust_time(),
            total_impulse: core.total_impulse(),
        }
    }
}

fn tensor_at<M: Motor + ?Sized>(
    motor: &M,
    t: f64,
    eval: fn(&Function, f64) -> Result<f64, function::Error>,
) -> Result<Matrix3<f64>, function::Error> {
    let i11 = eval(&motor.i_11(), t)?;
    let i22 = eval(&motor.i_22(), t)?;
    let i33 = eval(&motor.i_33(), t)?;
    let i12 = eval(&motor.i_12(), t)?;
    let i13 = eval(&motor.i_13(), t)?;
    let i23 = eval(&motor.i_23(), t)?;

    Ok(Matrix3::new(
        i11, i12, i13, //
        i12, i22, i23, //
        i13, i23, i33,
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotorSummary {
    pub burn_duration: f64,
    pub propellant_initial_mass: f64,
    pub exhaust_velocity: f64,
    pub average_thrust: f64,
    pub max_thrust: f64,
    pub max_thrust_time: f64,
    pub total_impulse: f64,
}

impl fmt::Display for MotorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Motor Details")?;
        writeln!(f, "Total Burning Time: {} s", self.burn_duration)?;
        writeln!(f, "Total Propellant Mass: {:.3} kg", self.propellant_initial_mass)?;
        writeln!(f, "Propellant Exhaust Velocity: {:.3} m/s", self.exhaust_velocity)?;
        writeln!(f, "Average Thrust: {:.3} N", self.average_thrust)?;
        writeln!(
            f,
            "Maximum Thrust: {} N at {} s after ignition.",
            self.max_thrust, self.max_thrust_time
        )?;
        write!(f, "Total Impulse: {:.3} Ns", self.total_impulse)
    }
}
