use super::axis::AxisDirection;
use super::xml::{XmlElement, parse_document};
use crate::domain::{RsmError, RsmResult};
use nalgebra::Vector3;

/// One goniometer circle: the SPEC motor driving it and its rotation axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircleAxis {
    pub name: String,
    pub direction: AxisDirection,
}

impl CircleAxis {
    pub fn new(name: impl Into<String>, direction: AxisDirection) -> Self {
        Self {
            name: name.into(),
            direction,
        }
    }
}

/// Diffractometer description read from an instrument configuration file.
/// Circle lists are ordered outermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentGeometry {
    pub sample_circles: Vec<CircleAxis>,
    pub detector_circles: Vec<CircleAxis>,
    pub primary_beam_direction: Vector3<f64>,
    pub inplane_reference_direction: Vector3<f64>,
    pub sample_surface_normal_direction: Vector3<f64>,
}

pub(crate) fn parse_instrument_source(source: &str) -> RsmResult<InstrumentGeometry> {
    let root = parse_document(source)
        .map_err(|message| RsmError::invalid_config("CONFIG.INSTRUMENT_XML", message))?;

    let sample_circles = match root.child("sampleCircles") {
        Some(element) => parse_circles(element)?,
        None => Vec::new(),
    };
    if sample_circles.is_empty() {
        return Err(RsmError::invalid_config(
            "CONFIG.INSTRUMENT_SAMPLE_CIRCLES",
            "instrument configuration does not define any sample circles",
        ));
    }

    let detector_circles = match root.child("detectorCircles") {
        Some(element) => parse_circles(element)?,
        None => Vec::new(),
    };
    if detector_circles.is_empty() {
        return Err(RsmError::invalid_config(
            "CONFIG.INSTRUMENT_DETECTOR_CIRCLES",
            "instrument configuration does not define any detector circles",
        ));
    }

    Ok(InstrumentGeometry {
        sample_circles,
        detector_circles,
        primary_beam_direction: parse_direction(&root, "primaryBeamDirection")?,
        inplane_reference_direction: parse_direction(&root, "inplaneReferenceDirection")?,
        sample_surface_normal_direction: parse_direction(&root, "sampleSurfaceNormalDirection")?,
    })
}

fn parse_circles(element: &XmlElement) -> RsmResult<Vec<CircleAxis>> {
    let mut numbered = Vec::new();
    for (position, circle) in element.children_named("circleAxis").enumerate() {
        let number = match circle.attribute("number") {
            Some(token) => token.trim().parse::<usize>().map_err(|_| {
                RsmError::invalid_config(
                    "CONFIG.INSTRUMENT_CIRCLE",
                    format!("circle number '{}' is not a positive integer", token),
                )
            })?,
            None => position + 1,
        };
        let name = circle
            .attribute("specMotorName")
            .or_else(|| circle.attribute("spec_motor_name"))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                RsmError::invalid_config(
                    "CONFIG.INSTRUMENT_CIRCLE",
                    format!("circle {} in <{}> has no motor name", number, element.name),
                )
            })?;
        let direction = circle
            .attribute("directionAxis")
            .ok_or_else(|| {
                RsmError::invalid_config(
                    "CONFIG.INSTRUMENT_CIRCLE",
                    format!("circle '{}' has no directionAxis", name),
                )
            })?
            .parse::<AxisDirection>()?;
        numbered.push((number, CircleAxis::new(name, direction)));
    }

    numbered.sort_by_key(|(number, _)| *number);
    Ok(numbered.into_iter().map(|(_, circle)| circle).collect())
}

fn parse_direction(root: &XmlElement, name: &str) -> RsmResult<Vector3<f64>> {
    let element = root.child(name).ok_or_else(|| {
        RsmError::invalid_config(
            "CONFIG.INSTRUMENT_DIRECTION",
            format!("instrument configuration is missing <{}>", name),
        )
    })?;

    let mut components = [None; 3];
    for (position, axis) in element.children_named("axis").enumerate() {
        let index = match axis.attribute("number") {
            Some(token) => token.trim().parse::<usize>().ok().filter(|n| (1..=3).contains(n)),
            None => Some(position + 1),
        }
        .ok_or_else(|| {
            RsmError::invalid_config(
                "CONFIG.INSTRUMENT_DIRECTION",
                format!("<{}> axis numbers must be 1, 2 or 3", name),
            )
        })?;
        let value = axis.text.trim().parse::<f64>().map_err(|_| {
            RsmError::invalid_config(
                "CONFIG.INSTRUMENT_DIRECTION",
                format!("<{}> component '{}' is not a number", name, axis.text.trim()),
            )
        })?;
        components[index - 1] = Some(value);
    }

    match components {
        [Some(x), Some(y), Some(z)] => Ok(Vector3::new(x, y, z)),
        _ => Err(RsmError::invalid_config(
            "CONFIG.INSTRUMENT_DIRECTION",
            format!("<{}> must define three axis components", name),
        )),
    }
}
