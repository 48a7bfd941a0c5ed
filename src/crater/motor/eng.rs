//! Reader and writer for the RASP `.eng` thrust curve format.
//!
//! ```text
//! ; comment
//! M1670 75 757 0 3.101 5.231 CTI
//! 0.055 100.0
//! 0.092 1500.0
//! ...
//! 3.9 0.0
//! ```
//!
//! The `(0, 0)` point is implicit and never written to the file.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::math::function::TabulatedFunction;

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d*\.\d+|[-+]?\d+").expect("Number regex is valid"));

pub const COMMENT_MARKER: char = ';';

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot access motor file")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: expected a time and a thrust value, found '{content}'")]
    Parse { line: usize, content: String },

    #[error("Bad motor description: {0}")]
    BadDescription(String),
}

/// Typed content of the description line.
#[derive(Debug, Clone, PartialEq)]
pub struct EngDescription {
    pub name: String,
    pub diameter_mm: f64,
    pub length_mm: f64,
    pub delays: String,
    pub propellant_mass_kg: f64,
    pub total_mass_kg: f64,
    pub manufacturer: String,
}

impl EngDescription {
    pub fn from_tokens(tokens: &[String]) -> Result<Self, Error> {
        if tokens.len() < 7 {
            return Err(Error::BadDescription(format!(
                "expected 7 fields, found {}",
                tokens.len()
            )));
        }

        let number = |i: usize| {
            tokens[i]
                .parse::<f64>()
                .map_err(|_| Error::BadDescription(format!("'{}' is not a number", tokens[i])))
        };

        Ok(Self {
            name: tokens[0].clone(),
            diameter_mm: number(1)?,
            length_mm: number(2)?,
            delays: tokens[3].clone(),
            propellant_mass_kg: number(4)?,
            total_mass_kg: number(5)?,
            manufacturer: tokens[6..].join(" "),
        })
    }

    pub fn to_tokens(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            format!("{:.1}", self.diameter_mm),
            format!("{:.1}", self.length_mm),
            self.delays.clone(),
            format!("{:.3}", self.propellant_mass_kg),
            format!("{:.3}", self.total_mass_kg),
            self.manufacturer.clone(),
        ]
    }
}

/// Content of a `.eng` file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngFile {
    pub comments: Vec<String>,
    pub description: Vec<String>,

    /// Thrust curve points, starting with the implicit `(0, 0)`
    pub points: Vec<(f64, f64)>,
}

impl EngFile {
    pub fn read(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        Self::parse(BufReader::new(file))
    }

    pub fn parse(reader: impl BufRead) -> Result<Self, Error> {
        let mut eng = EngFile {
            points: vec![(0.0, 0.0)],
            ..Default::default()
        };

        for (i, line) in reader.lines().enumerate() {
            let line = line?;

            let content = match line.split_once(COMMENT_MARKER) {
                Some((content, comment)) => {
                    eng.comments.push(comment.trim().to_string());
                    content
                }
                None => line.as_str(),
            };

            if content.trim().is_empty() {
                continue;
            }

            if eng.description.is_empty() {
                eng.description = content.split_whitespace().map(str::to_string).collect();
            } else {
                eng.points.push(parse_point(content, i + 1)?);
            }
        }

        Ok(eng)
    }

    /// Builds the file content for a thrust curve. The first sample of the
    /// curve stands for the implicit origin and is not written.
    pub fn from_curve(description: &EngDescription, curve: &TabulatedFunction) -> Self {
        EngFile {
            comments: vec![],
            description: description.to_tokens(),
            points: curve.samples().collect(),
        }
    }

    pub fn description(&self) -> Result<EngDescription, Error> {
        EngDescription::from_tokens(&self.description)
    }

    pub fn write(&self, mut writer: impl Write) -> Result<(), Error> {
        for comment in &self.comments {
            writeln!(writer, "{COMMENT_MARKER} {comment}")?;
        }

        writeln!(writer, "{}", self.description.join(" "))?;

        if let Some((&(burn_out_time, _), points)) = self.points.split_last() {
            if !points.is_empty() {
                for (time, thrust) in points.iter().skip(1) {
                    writeln!(writer, "{time:.4} {thrust:.3}")?;
                }

                // The curve always ends at zero thrust
                writeln!(writer, "{burn_out_time:.4} {:.3}", 0.0)?;
            }
        }

        Ok(())
    }

    pub fn write_file(&self, path: &Path) -> Result<(), Error> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;

        Ok(())
    }
}

fn parse_point(content: &str, line: usize) -> Result<(f64, f64), Error> {
    let parse_error = || Error::Parse {
        line,
        content: content.trim().to_string(),
    };

    let mut numbers = NUMBER
        .find_iter(content)
        .map(|m| m.as_str().parse::<f64>().map_err(|_| parse_error()));

    match (numbers.next(), numbers.next()) {
        (Some(time), Some(thrust)) => Ok((time?, thrust?)),
        _ => Err(parse_error()),
    }
}
