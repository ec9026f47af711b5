//! Built-in reference models for `sbdb generate`.

use clap::ValueEnum;
use serde_json::{Value, json};
use thiserror::Error;

use sbdb_core::Params;
use sbdb_generate::AttributeAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    /// Rectangular solid beam in steel or aluminium.
    SimpleBeam,
}

impl ModelKind {
    /// Collection name used when `--name` is not given.
    pub fn default_name(&self) -> &'static str {
        match self {
            ModelKind::SimpleBeam => "simple_beam",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("missing parameter '{0}'")]
    MissingParameter(String),
    #[error("parameter '{name}' must be {expected}, got {value}")]
    InvalidParameter {
        name: String,
        expected: &'static str,
        value: Value,
    },
}

const STEEL_DENSITY: f64 = 7850.0;
const ALUMINIUM_DENSITY: f64 = 2700.0;

/// Rectangular beam; dimensions in mm, density in kg/m³, mass in kg.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleBeam {
    pub name: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub material: String,
    pub area: f64,
    pub volume: f64,
    pub second_moment: f64,
    pub density: f64,
    pub mass: f64,
}

impl SimpleBeam {
    pub fn new(length: f64, width: f64, height: f64, material: &str) -> Self {
        let area = width * height;
        let volume = area * length;
        let density = if material == "steel" {
            STEEL_DENSITY
        } else {
            ALUMINIUM_DENSITY
        };
        Self {
            name: format!(
                "{material}_{}x{}x{}",
                length as i64, width as i64, height as i64
            ),
            length,
            width,
            height,
            material: material.to_string(),
            area,
            volume,
            second_moment: width * height.powi(3) / 12.0,
            density,
            mass: volume * density / 1e9,
        }
    }

    /// Reference constructor: `length`, `width` and `height` are required
    /// positive numbers, `material` defaults to `steel`.
    pub fn from_params(params: &Params) -> Result<Self, ModelError> {
        let length = positive(params, "length")?;
        let width = positive(params, "width")?;
        let height = positive(params, "height")?;
        let material = match params.get("material") {
            None | Some(Value::Null) => "steel",
            Some(Value::String(material)) => material.as_str(),
            Some(other) => {
                return Err(ModelError::InvalidParameter {
                    name: "material".to_string(),
                    expected: "a string",
                    value: other.clone(),
                });
            }
        };
        Ok(Self::new(length, width, height, material))
    }
}

impl AttributeAccess for SimpleBeam {
    fn attribute(&self, name: &str) -> Option<Value> {
        let value = match name {
            "name" => json!(self.name),
            "length" => json!(self.length),
            "width" => json!(self.width),
            "height" => json!(self.height),
            "material" => json!(self.material),
            "area" => json!(self.area),
            "volume" => json!(self.volume),
            "second_moment" => json!(self.second_moment),
            "density" => json!(self.density),
            "mass" => json!(self.mass),
            _ => return None,
        };
        Some(value)
    }

    fn declared_attributes() -> Vec<String> {
        [
            "name",
            "length",
            "width",
            "height",
            "material",
            "area",
            "volume",
            "second_moment",
            "mass",
        ]
        .iter()
        .map(|attr| attr.to_string())
        .collect()
    }
}

fn positive(params: &Params, name: &str) -> Result<f64, ModelError> {
    let value = params
        .get(name)
        .ok_or_else(|| ModelError::MissingParameter(name.to_string()))?;
    match value.as_f64() {
        Some(number) if number > 0.0 && number.is_finite() => Ok(number),
        _ => Err(ModelError::InvalidParameter {
            name: name.to_string(),
            expected: "a positive number",
            value: value.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn steel_beam_properties() {
        let beam = SimpleBeam::from_params(&params(json!({
            "length": 1000, "width": 100, "height": 200, "material": "steel"
        })))
        .unwrap();
        assert_eq!(beam.name, "steel_1000x100x200");
        assert_eq!(beam.area, 20_000.0);
        assert_eq!(beam.volume, 20_000_000.0);
        assert!((beam.second_moment - 66_666_666.666_666_67).abs() < 1e-6);
        assert!((beam.mass - 157.0).abs() < 1e-9);
    }

    #[test]
    fn material_defaults_to_steel_and_other_materials_are_aluminium() {
        let beam = SimpleBeam::from_params(&params(json!({
            "length": 2000, "width": 150, "height": 300
        })))
        .unwrap();
        assert_eq!(beam.density, STEEL_DENSITY);

        let beam = SimpleBeam::from_params(&params(json!({
            "length": 2000, "width": 150, "height": 300, "material": "aluminium"
        })))
        .unwrap();
        assert_eq!(beam.density, ALUMINIUM_DENSITY);
    }

    #[test]
    fn invalid_dimensions_fail_construction() {
        let err = SimpleBeam::from_params(&params(json!({"length": 1000, "width": 0, "height": 2})))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidParameter { name, .. } if name == "width"));

        let err = SimpleBeam::from_params(&params(json!({"width": 1, "height": 2}))).unwrap_err();
        assert_eq!(err, ModelError::MissingParameter("length".to_string()));
    }

    #[test]
    fn declared_attributes_are_all_readable() {
        let beam = SimpleBeam::new(1000.0, 100.0, 200.0, "steel");
        for attr in SimpleBeam::declared_attributes() {
            assert!(beam.attribute(&attr).is_some(), "{attr}");
        }
        assert_eq!(beam.attribute("colour"), None);
    }
}
