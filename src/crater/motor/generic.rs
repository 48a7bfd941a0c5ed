use log::debug;
use nalgebra::{Matrix3, Vector3};
use once_cell::sync::OnceCell;

use super::{
    Error,
    eng::EngDescription,
    motor::{InertiaTensor, Motor, MotorConfig, MotorCore},
};
use crate::{
    math::function::{self, Function},
    parameters::ParameterMap,
};

pub const ENG_MANUFACTURER: &str = "Crater";

/// Propellant grain of a [`GenericMotor`]: a uniform solid cylinder that
/// loses mass without changing shape or position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenericMotorGeometry {
    /// m
    pub chamber_radius: f64,
    /// m
    pub chamber_height: f64,
    /// Chamber centroid in the motor frame, m
    pub chamber_position: f64,
    /// kg
    pub propellant_initial_mass: f64,
}

/// Motor with a simplified propellant model, usable when only the thrust
/// curve and the overall chamber dimensions are known.
#[derive(Debug)]
pub struct GenericMotor {
    core: MotorCore,
    geometry: GenericMotorGeometry,

    mass: OnceCell<Function>,
}

impl GenericMotor {
    pub fn new(config: MotorConfig, geometry: GenericMotorGeometry) -> Result<Self, Error> {
        let core = MotorCore::new(config)?;

        debug!(
            "Generic motor: chamber r={} m h={} m at {} m, propellant {} kg",
            geometry.chamber_radius,
            geometry.chamber_height,
            geometry.chamber_position,
            geometry.propellant_initial_mass
        );

        Ok(GenericMotor {
            core,
            geometry,
            mass: OnceCell::new(),
        })
    }

    pub fn from_params(params: &ParameterMap) -> anyhow::Result<Self> {
        let config = MotorConfig::from_params(params)?;

        let geometry = GenericMotorGeometry {
            chamber_radius: params.get_param("chamber_radius")?.value_float()?,
            chamber_height: params.get_param("chamber_height")?.value_float()?,
            chamber_position: params.get_param("chamber_position")?.value_float()?,
            propellant_initial_mass: params.get_param("propellant_initial_mass")?.value_float()?,
        };

        Ok(Self::new(config, geometry)?)
    }

    pub fn geometry(&self) -> &GenericMotorGeometry {
        &self.geometry
    }

    fn transverse_inertia_factor(&self) -> f64 {
        let r = self.geometry.chamber_radius;
        let h = self.geometry.chamber_height;

        (3.0 * r * r + h * h) / 12.0
    }

    fn axial_inertia_factor(&self) -> f64 {
        let r = self.geometry.chamber_radius;

        r * r / 2.0
    }
}

impl Motor for GenericMotor {
    fn core(&self) -> &MotorCore {
        &self.core
    }

    fn propellant_initial_mass(&self) -> f64 {
        self.geometry.propellant_initial_mass
    }

    fn mass(&self) -> Function {
        self.mass
            .get_or_init(|| {
                let m0 = self.geometry.propellant_initial_mass;
                let window = self.core.burn_window();
                let rate = self.core.thrust().scaled(-1.0 / self.exhaust_velocity());

                Function::callable(move |t| {
                    let burned = rate.area(window.start, t.clamp(window.start, window.end));
                    (m0 + burned).max(0.0)
                })
                .with_labels("Time (s)", "Propellant Mass (kg)")
            })
            .clone()
    }

    /// Motor file description derived from the chamber geometry
    fn eng_description(&self, name: &str) -> EngDescription {
        let m0 = self.geometry.propellant_initial_mass;

        EngDescription {
            name: name.to_string(),
            diameter_mm: 2000.0 * self.geometry.chamber_radius,
            length_mm: 1000.0 * self.geometry.chamber_height,
            delays: "0".to_string(),
            propellant_mass_kg: m0,
            total_mass_kg: m0,
            manufacturer: ENG_MANUFACTURER.to_string(),
        }
    }

    fn center_of_mass(&self) -> Function {
        Function::constant(self.geometry.chamber_position)
            .with_labels("Time (s)", "Center of Mass (m)")
    }

    fn inertia_tensor(&self) -> InertiaTensor {
        InertiaTensor {
            transverse: self.i_11(),
            axial: self.i_33(),
        }
    }

    fn i_11(&self) -> Function {
        self.mass()
            .scale(self.transverse_inertia_factor())
            .with_labels("Time (s)", "Inertia I_11 (kg m²)")
    }

    fn i_22(&self) -> Function {
        self.mass()
            .scale(self.transverse_inertia_factor())
            .with_labels("Time (s)", "Inertia I_22 (kg m²)")
    }

    fn i_33(&self) -> Function {
        self.mass()
            .scale(self.axial_inertia_factor())
            .with_labels("Time (s)", "Inertia I_33 (kg m²)")
    }

    fn i_12(&self) -> Function {
        Function::constant(0.0).with_labels("Time (s)", "Inertia I_12 (kg m²)")
    }

    fn i_13(&self) -> Function {
        Function::constant(0.0).with_labels("Time (s)", "Inertia I_13 (kg m²)")
    }

    fn i_23(&self) -> Function {
        Function::constant(0.0).with_labels("Time (s)", "Inertia I_23 (kg m²)")
    }

    /// Follows the mass flow, the grain keeps its shape
    fn inertia_dot(&self, t: f64) -> Result<Matrix3<f64>, function::Error> {
        let mass_dot = self.mass_dot().evaluate(t)?;
        let transverse = mass_dot * self.transverse_inertia_factor();

        Ok(Matrix3::from_diagonal(&Vector3::new(
            transverse,
            transverse,
            mass_dot * self.axial_inertia_factor(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        crater::motor::{BurnWindow, CoordinateOrientation, ThrustSource, eng::EngFile},
        parameters::parse_string,
    };

    const SAMPLES: [(f64, f64); 5] = [
        (0.0, 0.0),
        (1.0, 10.0),
        (2.0, 20.0),
        (3.0, 10.0),
        (4.0, 0.0),
    ];

    const GEOMETRY: GenericMotorGeometry = GenericMotorGeometry {
        chamber_radius: 0.0425,
        chamber_height: 0.5,
        chamber_position: 0.3,
        propellant_initial_mass: 2.0,
    };

    fn motor(config: MotorConfig) -> GenericMotor {
        GenericMotor::new(config, GEOMETRY).unwrap()
    }

    #[test]
    fn test_exhaust_velocity() {
        let motor = motor(MotorConfig::new(SAMPLES.to_vec(), 0.033));

        assert_relative_eq!(motor.total_impulse(), 40.0);
        assert_relative_eq!(motor.exhaust_velocity(), 20.0);
        assert_relative_eq!(motor.mass_dot().evaluate(2.0).unwrap(), -1.0, epsilon = 1e-12);
        assert_eq!(motor.mass_dot().evaluate(5.0).unwrap(), 0.0);
    }

    #[test]
    fn test_mass_conservation() {
        let motor = motor(MotorConfig::new(SAMPLES.to_vec(), 0.033));
        let mass = motor.mass();

        assert_relative_eq!(motor.mass_dot().integral(0.0, 4.0).unwrap(), -2.0, epsilon = 1e-12);

        assert_relative_eq!(mass.evaluate(0.0).unwrap(), 2.0);
        assert_relative_eq!(mass.evaluate(2.0).unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mass.evaluate(4.0).unwrap(), 0.0, epsilon = 1e-12);

        // Constant outside of the burn window
        assert_eq!(mass.evaluate(-1.0).unwrap(), mass.evaluate(0.0).unwrap());
        assert_eq!(mass.evaluate(10.0).unwrap(), mass.evaluate(4.0).unwrap());
    }

    #[test]
    fn test_mass_non_increasing() {
        let motor = motor(MotorConfig::new(SAMPLES.to_vec(), 0.033).with_reshape((0.5, 3.0), 55.0));
        let mass = motor.mass();

        let values = (0..=50)
            .map(|i| mass.evaluate(i as f64 * 0.1).unwrap())
            .collect::<Vec<_>>();

        for w in values.windows(2) {
            assert!(w[1] <= w[0] + 1e-12);
            assert!(w[1] >= 0.0);
        }
    }

    #[test]
    fn test_inertia() {
        let motor = motor(MotorConfig::new(SAMPLES.to_vec(), 0.033));

        let r = GEOMETRY.chamber_radius;
        let h = GEOMETRY.chamber_height;
        let i_11 = 2.0 * (3.0 * r * r + h * h) / 12.0;
        let i_33 = 2.0 * r * r / 2.0;

        assert_relative_eq!(
            motor.inertia_matrix(0.0).unwrap(),
            Matrix3::from_diagonal(&Vector3::new(i_11, i_11, i_33)),
            max_relative = 1e-12
        );

        let tensor = motor.inertia_tensor();
        assert_relative_eq!(
            tensor.transverse.evaluate(2.0).unwrap(),
            i_11 / 2.0,
            max_relative = 1e-12
        );
        assert_relative_eq!(tensor.axial.evaluate(2.0).unwrap(), i_33 / 2.0, max_relative = 1e-12);
        assert_eq!(motor.i_23().evaluate(1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_mass_properties() {
        let motor = motor(MotorConfig::new(SAMPLES.to_vec(), 0.033));
        let props = motor.mass_properties(2.0).unwrap();

        assert_relative_eq!(props.xcg_eng_frame_m, 0.3);
        assert_eq!(props.xcg_dot_eng_frame_m, 0.0);
        assert_relative_eq!(props.mass_kg, 1.0, epsilon = 1e-12);
        assert_relative_eq!(props.mass_dot_kg_s, -1.0, epsilon = 1e-12);

        let r = GEOMETRY.chamber_radius;
        let h = GEOMETRY.chamber_height;
        assert_relative_eq!(
            props.inertia_dot_eng_frame_kgm2[(0, 0)],
            -(3.0 * r * r + h * h) / 12.0,
            max_relative = 1e-12
        );
        assert_eq!(props.inertia_dot_eng_frame_kgm2[(0, 1)], 0.0);
    }

    #[test]
    fn test_inertia_rate_at_ignition() {
        let motor = motor(MotorConfig::new(100.0, 0.033).with_burn_window((1.0, 3.0)));
        let props = motor.mass_properties(1.0).unwrap();

        assert_relative_eq!(props.mass_dot_kg_s, -1.0, epsilon = 1e-12);

        let r = GEOMETRY.chamber_radius;
        let h = GEOMETRY.chamber_height;
        let expected = Matrix3::from_diagonal(&Vector3::new(
            -(3.0 * r * r + h * h) / 12.0,
            -(3.0 * r * r + h * h) / 12.0,
            -r * r / 2.0,
        ));
        assert_relative_eq!(props.inertia_dot_eng_frame_kgm2, expected, max_relative = 1e-12);

        // No flow after burn out
        let props = motor.mass_properties(3.5).unwrap();
        assert_eq!(props.inertia_dot_eng_frame_kgm2, Matrix3::zeros());
    }

    #[test]
    fn test_mass_properties_orientation() {
        let motor = motor(
            MotorConfig::new(SAMPLES.to_vec(), 0.033)
                .with_nozzle_position(0.1)
                .with_coordinate_orientation(CoordinateOrientation::ChamberToNozzle),
        );
        let props = motor.mass_properties(1.0).unwrap();

        assert_relative_eq!(props.xcg_eng_frame_m, -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_thrust() {
        let motor = motor(MotorConfig::new(SAMPLES.to_vec(), 0.033));

        assert_eq!(motor.thrust_b(1.5), Vector3::new(15.0, 0.0, 0.0));
        assert_eq!(motor.thrust_b(-0.5), Vector3::zeros());
        assert_eq!(motor.thrust().outputs(), "Thrust (N)");
    }

    #[test]
    fn test_summary() {
        let motor = motor(MotorConfig::new(SAMPLES.to_vec(), 0.033));
        let summary = motor.summary().to_string();

        assert!(summary.contains("Total Burning Time: 4 s"));
        assert!(summary.contains("Total Propellant Mass: 2.000 kg"));
        assert!(summary.contains("Propellant Exhaust Velocity: 20.000 m/s"));
        assert!(summary.contains("Average Thrust: 10.000 N"));
        assert!(summary.contains("Maximum Thrust: 20 N at 2 s after ignition."));
        assert!(summary.contains("Total Impulse: 40.000 Ns"));
    }

    #[test]
    fn test_eng_export() {
        let motor = motor(MotorConfig::new(SAMPLES.to_vec(), 0.033));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generic.eng");
        motor.export_eng(&path, "G40").unwrap();

        let eng = EngFile::read(&path).unwrap();
        assert_eq!(eng.comments, vec!["G40 exported by crater-motor"]);
        assert_eq!(
            eng.description().unwrap(),
            EngDescription {
                name: "G40".to_string(),
                diameter_mm: 85.0,
                length_mm: 500.0,
                delays: "0".to_string(),
                propellant_mass_kg: 2.0,
                total_mass_kg: 2.0,
                manufacturer: ENG_MANUFACTURER.to_string(),
            }
        );
        assert_eq!(eng.points, SAMPLES.to_vec());

        let imported = GenericMotor::new(
            MotorConfig::new(ThrustSource::EngFile(path), 0.033),
            GEOMETRY,
        )
        .unwrap();
        assert_eq!(imported.core().burn_window(), BurnWindow::new(0.0, 4.0));
        assert_relative_eq!(imported.total_impulse(), motor.total_impulse());
    }

    const PARAMS: &str = r#"
        engine_type = { val = "generic", type = "str" }
        nozzle_radius = { val = 0.033, type = "float" }
        nozzle_position = { val = 0.0, type = "float" }
        interpolation = { val = "spline", type = "str" }
        coordinate_orientation = { val = "chamberToNozzle", type = "str" }
        chamber_radius = { val = 0.0425, type = "float" }
        chamber_height = { val = 0.5, type = "float" }
        chamber_position = { val = 0.3, type = "float" }
        propellant_initial_mass = { val = 2.0, type = "float" }

        [thrust]
        source = { val = "samples", type = "str" }
        time = { val = [0.0, 1.0, 2.0, 3.0, 4.0], type = "float[]" }
        thrust = { val = [0.0, 10.0, 20.0, 10.0, 0.0], type = "float[]" }

        [reshape]
        burn_time = { val = [8.0], type = "float[]" }
        total_impulse = { val = 80.0, type = "float" }
    "#;

    #[test]
    fn test_from_params() {
        let params = parse_string(PARAMS.to_string()).unwrap();
        let motor = GenericMotor::from_params(&params).unwrap();

        assert_eq!(motor.geometry(), &GEOMETRY);
        assert_eq!(motor.core().burn_window(), BurnWindow::new(0.0, 8.0));
        assert_eq!(
            motor.core().coordinate_orientation(),
            CoordinateOrientation::ChamberToNozzle
        );
        assert_relative_eq!(motor.total_impulse(), 80.0, max_relative = 1e-9);

        let boxed = crate::crater::motor::from_params(&params).unwrap();
        assert_relative_eq!(boxed.total_impulse(), 80.0, max_relative = 1e-9);
    }

    const CONSTANT_PARAMS: &str = r#"
        engine_type = { val = "generic", type = "str" }
        nozzle_radius = { val = 0.033, type = "float" }
        chamber_radius = { val = 0.0425, type = "float" }
        chamber_height = { val = 0.5, type = "float" }
        chamber_position = { val = 0.3, type = "float" }
        propellant_initial_mass = { val = 2.0, type = "float" }

        [thrust]
        source = { val = "constant", type = "str" }
        value = { val = 100.0, type = "float" }
    "#;

    #[test]
    fn test_from_params_constant() {
        let params = parse_string(format!(
            "burn_time = {{ val = [1.0, 3.0], type = \"float[]\" }}\n{CONSTANT_PARAMS}"
        ))
        .unwrap();
        let motor = GenericMotor::from_params(&params).unwrap();

        assert_eq!(motor.core().burn_window(), BurnWindow::new(1.0, 3.0));
        assert_relative_eq!(motor.total_impulse(), 200.0, max_relative = 1e-9);

        let params = parse_string(CONSTANT_PARAMS.to_string()).unwrap();
        let err = GenericMotor::from_params(&params).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::BurnWindowRequired)
        ));
    }

    #[test]
    fn test_from_params_errors() {
        let params = parse_string(PARAMS.replace("\"generic\"", "\"hybrid\"")).unwrap();
        assert!(crate::crater::motor::from_params(&params).is_err());

        let params = parse_string(PARAMS.replace("\"spline\"", "\"quadratic\"")).unwrap();
        assert!(GenericMotor::from_params(&params).is_err());

        let params = parse_string(PARAMS.replace("chamberToNozzle", "sideways")).unwrap();
        let err = GenericMotor::from_params(&params).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnknownOrientation(tag)) if tag == "sideways"
        ));

        let params = parse_string(PARAMS.replace("[8.0]", "[1.0, 2.0, 8.0]")).unwrap();
        assert!(GenericMotor::from_params(&params).is_err());

        let params =
            parse_string(PARAMS.replace("0.0, 10.0, 20.0, 10.0, 0.0", "0.0, 10.0")).unwrap();
        assert!(GenericMotor::from_params(&params).is_err());

        let params = parse_string(PARAMS.replace("chamber_height", "chamber_length")).unwrap();
        let err = GenericMotor::from_params(&params).unwrap_err();
        assert!(err.to_string().contains("chamber_height"));
    }

    #[test]
    fn test_default_config() {
        let params = parse_string(include_str!("../../../config/motor.toml").to_string()).unwrap();
        let motor = crate::crater::motor::from_params(params.get_map("motor").unwrap()).unwrap();

        assert_eq!(motor.core().burn_window(), BurnWindow::new(0.0, 3.9));
        assert_eq!(motor.core().max_thrust(), 2200.0);
        assert_eq!(motor.core().max_thrust_time(), 0.15);
        assert_relative_eq!(motor.total_impulse(), 6026.35, max_relative = 1e-9);
        assert_relative_eq!(motor.exhaust_velocity(), 6026.35 / 3.101, max_relative = 1e-9);
    }
}
