pub mod eng;
mod generic;
pub mod motor;
pub mod thrust;

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use thiserror::Error;

use crate::{math::function, parameters::ParameterMap};

pub use generic::{GenericMotor, GenericMotorGeometry};
pub use motor::{
    CoordinateOrientation, InertiaTensor, Motor, MotorConfig, MotorCore, MotorMassProperties,
    MotorSummary,
};
pub use thrust::{BurnWindow, Diagnostic, Reshape, ThrustCurve, ThrustSource};

#[derive(Debug, Error)]
pub enum Error {
    #[error("A burn window is required when the thrust source is a constant or a callable")]
    BurnWindowRequired,

    #[error("Unknown coordinate system orientation '{0}', expected 'nozzleToChamber' or 'chamberToNozzle'")]
    UnknownOrientation(String),

    #[error("Burn window start ({start} s) is after its end ({end} s)")]
    ReversedBurnWindow { start: f64, end: f64 },

    #[error("Burn window ({start}, {end}) s leaves nothing of the thrust curve domain ({lower}, {upper}) s")]
    EmptyBurnWindow {
        start: f64,
        end: f64,
        lower: f64,
        upper: f64,
    },

    #[error("Unrecognized thrust source file '{}', expected a .eng or .csv file", .0.display())]
    UnknownFileFormat(PathBuf),

    #[error("Cannot read thrust table")]
    Csv(#[from] csv::Error),

    #[error("Cannot read motor file")]
    Eng(#[from] eng::Error),

    #[error(transparent)]
    Function(#[from] function::Error),
}

/// Builds the motor described in the parameter map (usually the `motor`
/// table of the configuration file).
pub fn from_params(params: &ParameterMap) -> Result<Box<dyn Motor + Send + Sync>> {
    match params.get_param("engine_type")?.value_string()?.as_str() {
        "generic" => Ok(Box::new(GenericMotor::from_params(params)?)),
        unknown => Err(anyhow!("Unknown motor type selected: {unknown}")),
    }
}
