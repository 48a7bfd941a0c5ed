use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml::{Table, Value};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Error deserializing parameters")]
    Deserialize(#[from] toml::de::Error),

    #[error("Parameter toml does not have the right structure (error in '{0}')")]
    BadToml(String),

    #[error("Element '{path}' not found")]
    NotFound { path: String },

    #[error("Cannot cast parameter '{path}' to {dtype}")]
    BadCast { path: String, dtype: String },

    #[error("Element '{path}' is not a parameter")]
    NotAParameter { path: String },

    #[error("Element '{path}' is not a map")]
    NotAMap { path: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ParameterValue {
    #[serde(rename = "bool")]
    Bool { val: bool },
    #[serde(rename = "int")]
    Int { val: i64 },
    #[serde(rename = "float")]
    Float { val: f64 },
    #[serde(rename = "str")]
    String { val: String },

    #[serde(rename = "float[]")]
    FloatArray { val: Vec<f64> },
    #[serde(rename = "str[]")]
    StringArray { val: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    path: String,
    value: ParameterValue,
}

impl Parameter {
    pub fn path(&self) -> &str {
        &self.path
    }

    fn bad_cast(&self, dtype: &str) -> Error {
        Error::BadCast {
            path: self.path.clone(),
            dtype: dtype.to_string(),
        }
    }

    pub fn value_bool(&self) -> Result<bool, Error> {
        if let ParameterValue::Bool { val } = self.value {
            Ok(val)
        } else {
            Err(self.bad_cast("bool"))
        }
    }

    pub fn value_int(&self) -> Result<i64, Error> {
        if let ParameterValue::Int { val } = self.value {
            Ok(val)
        } else {
            Err(self.bad_cast("int"))
        }
    }

    pub fn value_float(&self) -> Result<f64, Error> {
        if let ParameterValue::Float { val } = self.value {
            Ok(val)
        } else {
            Err(self.bad_cast("float"))
        }
    }

    pub fn value_string(&self) -> Result<String, Error> {
        if let ParameterValue::String { val } = &self.value {
            Ok(val.clone())
        } else {
            Err(self.bad_cast("str"))
        }
    }

    pub fn value_float_arr(&self) -> Result<&[f64], Error> {
        if let ParameterValue::FloatArray { val } = &self.value {
            Ok(val)
        } else {
            Err(self.bad_cast("float[]"))
        }
    }

    pub fn value_string_arr(&self) -> Result<&[String], Error> {
        if let ParameterValue::StringArray { val } = &self.value {
            Ok(val)
        } else {
            Err(self.bad_cast("str[]"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterMap {
    path: String,
    map: BTreeMap<String, ParameterTree>,
}

impl ParameterMap {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, rel_path: &str) -> Result<&ParameterTree, Error> {
        let not_found = || Error::NotFound {
            path: append_path(&self.path, rel_path),
        };

        let mut parts = rel_path.split('.');

        let mut elem = self
            .map
            .get(parts.next().expect("Split cannot return an empty iterator"))
            .ok_or_else(not_found)?;

        for part in parts {
            match elem {
                ParameterTree::Node(n) => {
                    elem = n.map.get(part).ok_or_else(not_found)?;
                }
                ParameterTree::Leaf(_) => {
                    return Err(not_found());
                }
            }
        }

        Ok(elem)
    }

    pub fn get_param(&self, rel_path: &str) -> Result<&Parameter, Error> {
        self.get(rel_path)?.as_param()
    }

    /// Same as [`ParameterMap::get_param`], but a missing element is `None`
    pub fn get_param_opt(&self, rel_path: &str) -> Result<Option<&Parameter>, Error> {
        match self.get(rel_path) {
            Ok(elem) => Ok(Some(elem.as_param()?)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_map(&self, rel_path: &str) -> Result<&ParameterMap, Error> {
        self.get(rel_path)?.as_map()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterTree {
    Node(ParameterMap),
    Leaf(Parameter),
}

impl Default for ParameterTree {
    fn default() -> Self {
        ParameterTree::Node(ParameterMap::default())
    }
}

impl ParameterTree {
    fn as_param(&self) -> Result<&Parameter, Error> {
        match self {
            Self::Leaf(p) => Ok(p),
            Self::Node(m) => Err(Error::NotAParameter {
                path: m.path.clone(),
            }),
        }
    }

    fn as_map(&self) -> Result<&ParameterMap, Error> {
        match self {
            Self::Node(m) => Ok(m),
            Self::Leaf(p) => Err(Error::NotAMap {
                path: p.path.clone(),
            }),
        }
    }
}

pub fn parse_string(toml_str: String) -> Result<ParameterMap, Error> {
    let table = toml::from_str::<Table>(toml_str.as_str())?;

    parse_table(table)
}

pub fn parse_table(table: Table) -> Result<ParameterMap, Error> {
    parse_table_recursive(table, "".to_string())
}

fn parse_table_recursive(table: Table, root: String) -> Result<ParameterMap, Error> {
    let mut nodes = BTreeMap::new();

    for (key, val) in table.into_iter() {
        let path = append_path(root.as_str(), key.as_str());
        match val {
            Value::Table(val) => {
                if let Ok(value) = val.clone().try_into::<ParameterValue>() {
                    let param = Parameter { path, value };
                    nodes.insert(key, ParameterTree::Leaf(param));
                } else {
                    nodes.insert(key, ParameterTree::Node(parse_table_recursive(val, path)?));
                }
            }
            _ => {
                return Err(Error::BadToml(root));
            }
        }
    }

    Ok(ParameterMap {
        path: root,
        map: nodes,
    })
}

fn append_path(root: &str, key: &str) -> String {
    format!("{root}.{key}")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use toml::Value;

    use super::*;

    const MOTOR: &str = r#"
        [motor]
        engine_type = { val = "generic", type = "str" }
        nozzle_radius = { val = 0.0335, type = "float" }
        burn_time = { val = [3.9], type = "float[]" }

        [motor.thrust]
        source = { val = "eng", type = "str" }
        path = { val = "data/Cesaroni_M1670.eng", type = "str" }
    "#;

    #[test]
    fn test_empty() {
        let str = "".to_string();
        assert_eq!(parse_string(str), Ok(ParameterMap::default()))
    }

    fn test_type(
        expected: Vec<(toml::Value, ParameterValue)>,
        good_value: toml::Value,
        good_type: &str,
        bad_values: Vec<toml::Value>,
        bad_type: &str,
    ) {
        for (val, expected) in expected {
            let str = format!("val = {{ val = {val}, type = \"{good_type}\" }}");
            assert_eq!(
                parse_string(str),
                Ok(ParameterMap {
                    path: "".to_string(),
                    map: BTreeMap::from_iter(vec![(
                        "val".to_string(),
                        ParameterTree::Leaf(Parameter {
                            path: ".val".to_string(),
                            value: expected
                        })
                    )])
                })
            );
        }
        let str = format!("val = {{ val = {good_value}, type = \"badtype\" }}");
        assert_eq!(parse_string(str), Err(Error::BadToml(".val".to_string())));

        let str = format!("val = {{ val = {good_value}, type = \"{bad_type}\" }}",);
        assert_eq!(parse_string(str), Err(Error::BadToml(".val".to_string())));

        for bad_value in bad_values {
            let str = format!("val = {{ val = {bad_value}, type = \"{good_type}\" }}");
            assert_eq!(parse_string(str), Err(Error::BadToml(".val".to_string())));
        }
    }

    #[test]
    fn test_bool() {
        test_type(
            vec![
                (Value::Boolean(true), ParameterValue::Bool { val: true }),
                (Value::Boolean(false), ParameterValue::Bool { val: false }),
            ],
            Value::Boolean(false),
            "bool",
            vec![Value::Float(1.0), Value::Integer(1)],
            "float",
        );
    }

    #[test]
    fn test_float() {
        test_type(
            vec![
                (Value::Float(-1.0), ParameterValue::Float { val: -1.0 }),
                (Value::Integer(1), ParameterValue::Float { val: 1.0 }),
                (Value::Float(0.0335), ParameterValue::Float { val: 0.0335 }),
            ],
            Value::Float(1.0),
            "float",
            vec![Value::Boolean(true), Value::String("hello".to_string())],
            "bool",
        );
    }

    #[test]
    fn test_string() {
        test_type(
            vec![(
                Value::String("nozzleToChamber".to_string()),
                ParameterValue::String {
                    val: "nozzleToChamber".to_string(),
                },
            )],
            Value::String("spline".to_string()),
            "str",
            vec![Value::Float(1.123), Value::Integer(1), Value::Boolean(true)],
            "bool",
        );
    }

    #[test]
    fn test_array_float() {
        let str = "burn_time = { val = [ 0.5, 3 ], type = \"float[]\" }";
        let expected = ParameterMap {
            path: "".to_string(),
            map: BTreeMap::from_iter(vec![(
                "burn_time".to_string(),
                ParameterTree::Leaf(Parameter {
                    path: ".burn_time".to_string(),
                    value: ParameterValue::FloatArray {
                        val: vec![0.5, 3.0],
                    },
                }),
            )]),
        };

        assert_eq!(parse_string(str.to_string()), Ok(expected));

        let str = "burn_time = { val = [ 1.0, 2.0 ], type = \"float\" }";
        assert_eq!(
            parse_string(str.to_string()),
            Err(Error::BadToml(".burn_time".to_string()))
        );

        let str = "burn_time = { val = [ 1.0, 2.0, \"3.0\" ], type = \"float[]\" }";
        assert_eq!(
            parse_string(str.to_string()),
            Err(Error::BadToml(".burn_time".to_string()))
        );
    }

    #[test]
    fn test_array_string() {
        let str = "comments = { val = [ \"a\", \"b\" ], type = \"str[]\" }";
        let params = parse_string(str.to_string()).unwrap();

        assert_eq!(
            params.get_param("comments").unwrap().value_string_arr().unwrap(),
            &["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_bad_structure() {
        let str = "nozzle_radius = 0.0335";
        assert_eq!(
            parse_string(str.to_string()),
            Err(Error::BadToml("".to_string()))
        );
    }

    #[test]
    fn test_get() {
        let params = parse_string(MOTOR.to_string()).unwrap();
        let motor = params.get_map("motor").unwrap();

        assert_eq!(motor.path(), ".motor");
        assert!(motor.contains_key("thrust"));
        assert!(!motor.contains_key("reshape"));

        assert_eq!(
            motor.get_param("engine_type").unwrap().value_string(),
            Ok("generic".to_string())
        );
        assert_eq!(
            params.get_param("motor.nozzle_radius").unwrap().value_float(),
            Ok(0.0335)
        );
        assert_eq!(
            motor.get_param("burn_time").unwrap().value_float_arr(),
            Ok([3.9].as_slice())
        );

        let path = motor.get_param("thrust.path").unwrap();
        assert_eq!(path.path(), ".motor.thrust.path");
        assert_eq!(path.value_string(), Ok("data/Cesaroni_M1670.eng".to_string()));
    }

    #[test]
    fn test_get_errors() {
        let params = parse_string(MOTOR.to_string()).unwrap();
        let motor = params.get_map("motor").unwrap();

        assert_eq!(
            motor.get_param("chamber_radius"),
            Err(Error::NotFound {
                path: ".motor.chamber_radius".to_string()
            })
        );
        assert_eq!(
            motor.get_param("nozzle_radius.x"),
            Err(Error::NotFound {
                path: ".motor.nozzle_radius.x".to_string()
            })
        );
        assert_eq!(
            motor.get_param("thrust"),
            Err(Error::NotAParameter {
                path: ".motor.thrust".to_string()
            })
        );
        assert_eq!(
            motor.get_map("nozzle_radius"),
            Err(Error::NotAMap {
                path: ".motor.nozzle_radius".to_string()
            })
        );
        assert_eq!(
            motor.get_param("nozzle_radius").unwrap().value_int(),
            Err(Error::BadCast {
                path: ".motor.nozzle_radius".to_string(),
                dtype: "int".to_string()
            })
        );
    }

    #[test]
    fn test_value_casts() {
        let params = parse_string(
            r#"
            flag = { val = true, type = "bool" }
            count = { val = 3, type = "int" }
        "#
            .to_string(),
        )
        .unwrap();

        assert_eq!(params.get_param("flag").unwrap().value_bool(), Ok(true));
        assert_eq!(params.get_param("count").unwrap().value_int(), Ok(3));
        assert_eq!(
            params.get_param("count").unwrap().value_bool(),
            Err(Error::BadCast {
                path: ".count".to_string(),
                dtype: "bool".to_string()
            })
        );
    }

    #[test]
    fn test_get_optional() {
        let params = parse_string(MOTOR.to_string()).unwrap();
        let motor = params.get_map("motor").unwrap();

        assert_eq!(motor.get_param_opt("reshape.total_impulse"), Ok(None));
        assert!(motor.get_param_opt("nozzle_radius").unwrap().is_some());
        assert!(matches!(
            motor.get_param_opt("thrust"),
            Err(Error::NotAParameter { .. })
        ));
    }
}
