use super::axis::AxisDirection;
use super::xml::{XmlElement, parse_document};
use crate::domain::{RsmError, RsmResult};

/// Area-detector description. Index 0 of each pair refers to pixel
/// direction 1 (frame rows), index 1 to pixel direction 2 (frame columns).
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorGeometry {
    pub id: String,
    pub pixel_direction_1: AxisDirection,
    pub pixel_direction_2: AxisDirection,
    pub center_pixel: [f64; 2],
    pub pixel_count: [usize; 2],
    pub size: [f64; 2],
    pub distance: f64,
}

impl DetectorGeometry {
    /// Physical width of one pixel along each direction.
    pub fn pixel_width(&self) -> [f64; 2] {
        [
            self.size[0] / self.pixel_count[0] as f64,
            self.size[1] / self.pixel_count[1] as f64,
        ]
    }

    pub fn rows(&self) -> usize {
        self.pixel_count[0]
    }

    pub fn cols(&self) -> usize {
        self.pixel_count[1]
    }

    pub(crate) fn validate(&self) -> RsmResult<()> {
        if self.pixel_count.iter().any(|count| *count == 0) {
            return Err(RsmError::invalid_config(
                "CONFIG.DETECTOR_PIXELS",
                format!(
                    "detector '{}' pixel counts must be positive, got {:?}",
                    self.id, self.pixel_count
                ),
            ));
        }
        if self
            .size
            .iter()
            .any(|size| !(size.is_finite() && *size > 0.0))
        {
            return Err(RsmError::invalid_config(
                "CONFIG.DETECTOR_SIZE",
                format!(
                    "detector '{}' physical size must be positive, got {:?}",
                    self.id, self.size
                ),
            ));
        }
        if !(self.distance.is_finite() && self.distance > 0.0) {
            return Err(RsmError::invalid_config(
                "CONFIG.DETECTOR_DISTANCE",
                format!(
                    "detector '{}' distance must be positive, got {}",
                    self.id, self.distance
                ),
            ));
        }
        if self.center_pixel.iter().any(|value| !value.is_finite()) {
            return Err(RsmError::invalid_config(
                "CONFIG.DETECTOR_CENTER",
                format!("detector '{}' center pixel is not finite", self.id),
            ));
        }
        if self.pixel_direction_1.unit_vector().dot(&self.pixel_direction_2.unit_vector()) != 0.0
        {
            return Err(RsmError::invalid_config(
                "CONFIG.DETECTOR_DIRECTIONS",
                format!(
                    "detector '{}' pixel directions {} and {} are not perpendicular",
                    self.id, self.pixel_direction_1, self.pixel_direction_2
                ),
            ));
        }
        Ok(())
    }
}

pub(crate) fn parse_detector_source(source: &str) -> RsmResult<Vec<DetectorGeometry>> {
    let root = parse_document(source)
        .map_err(|message| RsmError::invalid_config("CONFIG.DETECTOR_XML", message))?;

    // rsMap3D writes the list inside <Detectors>; older files put it at the root
    let detectors = root
        .children_named("Detectors")
        .flat_map(|list| list.children_named("Detector"))
        .chain(root.children_named("Detector"))
        .map(parse_detector)
        .collect::<RsmResult<Vec<_>>>()?;
    if detectors.is_empty() {
        return Err(RsmError::invalid_config(
            "CONFIG.DETECTOR_LIST",
            "detector configuration does not define any detectors",
        ));
    }
    Ok(detectors)
}

fn parse_detector(element: &XmlElement) -> RsmResult<DetectorGeometry> {
    let id = element.child_text("detectorID").unwrap_or_default().to_string();

    let detector = DetectorGeometry {
        pixel_direction_1: required_text(element, &id, "pixelDirection1")?.parse()?,
        pixel_direction_2: required_text(element, &id, "pixelDirection2")?.parse()?,
        center_pixel: parse_pair(element, &id, "centerChannelPixel")?,
        pixel_count: {
            let [first, second] = parse_pair(element, &id, "Npixels")?;
            [to_count(first, &id)?, to_count(second, &id)?]
        },
        size: parse_pair(element, &id, "size")?,
        distance: {
            let token = required_text(element, &id, "distance")?;
            token.parse::<f64>().map_err(|_| {
                RsmError::invalid_config(
                    "CONFIG.DETECTOR_FIELD",
                    format!("detector '{}' distance '{}' is not a number", id, token),
                )
            })?
        },
        id,
    };
    Ok(detector)
}

fn required_text<'a>(element: &'a XmlElement, id: &str, name: &str) -> RsmResult<&'a str> {
    element.child_text(name).ok_or_else(|| {
        RsmError::invalid_config(
            "CONFIG.DETECTOR_FIELD",
            format!("detector '{}' is missing <{}>", id, name),
        )
    })
}

fn parse_pair(element: &XmlElement, id: &str, name: &str) -> RsmResult<[f64; 2]> {
    let text = required_text(element, id, name)?;
    let values = text
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .ok()
        .filter(|values| values.len() == 2)
        .ok_or_else(|| {
            RsmError::invalid_config(
                "CONFIG.DETECTOR_FIELD",
                format!(
                    "detector '{}' <{}> must hold two numbers, got '{}'",
                    id, name, text
                ),
            )
        })?;
    Ok([values[0], values[1]])
}

fn to_count(value: f64, id: &str) -> RsmResult<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(RsmError::invalid_config(
            "CONFIG.DETECTOR_PIXELS",
            format!("detector '{}' pixel count {} is not a whole number", id, value),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::parse_detector_source;
    use crate::domain::RsmErrorKind;
    use crate::geometry::AxisDirection;

    pub(crate) const SINGLE_DETECTOR_CONFIG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<dg:detectorGeometries xmlns:dg="https://subversion.xray.aps.anl.gov/RSM/detectorGeometries">
  <dg:Detector>
    <dg:detectorID>Pilatus</dg:detectorID>
    <dg:pixelDirection1>z-</dg:pixelDirection1>
    <dg:pixelDirection2>x+</dg:pixelDirection2>
    <dg:centerChannelPixel>97 243</dg:centerChannelPixel>
    <dg:Npixels>195 487</dg:Npixels>
    <dg:size>33.54 83.764</dg:size>
    <dg:distance>900.644</dg:distance>
  </dg:Detector>
</dg:detectorGeometries>
"#;

    #[test]
    fn detector_fields_are_read() {
        let detectors = parse_detector_source(SINGLE_DETECTOR_CONFIG).expect("detector parses");
        assert_eq!(detectors.len(), 1);

        let detector = &detectors[0];
        assert_eq!(detector.id, "Pilatus");
        assert_eq!(detector.pixel_direction_1, AxisDirection::ZMinus);
        assert_eq!(detector.pixel_direction_2, AxisDirection::XPlus);
        assert_eq!(detector.center_pixel, [97.0, 243.0]);
        assert_eq!(detector.pixel_count, [195, 487]);
        assert_eq!(detector.distance, 900.644);

        let [width_1, width_2] = detector.pixel_width();
        assert!((width_1 - 0.172).abs() < 1.0e-12);
        assert!((width_2 - 0.172).abs() < 1.0e-12);
        assert!(detector.validate().is_ok());
    }

    #[test]
    fn detectors_wrapped_in_a_list_element_are_read() {
        let source = SINGLE_DETECTOR_CONFIG
            .replace("  <dg:Detector>", "  <dg:Detectors>\n  <dg:Detector>")
            .replace("  </dg:Detector>", "  </dg:Detector>\n  </dg:Detectors>");
        assert!(source.contains("<dg:Detectors>"));

        let detectors = parse_detector_source(&source).expect("wrapped detector parses");
        assert_eq!(detectors.len(), 1);
        assert_eq!(detectors[0].id, "Pilatus");
        assert_eq!(detectors[0].pixel_count, [195, 487]);
    }

    #[test]
    fn empty_detector_list_is_invalid() {
        let error = parse_detector_source("<detectorGeometries></detectorGeometries>")
            .expect_err("no detectors");
        assert_eq!(error.kind(), RsmErrorKind::InvalidConfig);
        assert_eq!(error.placeholder(), "CONFIG.DETECTOR_LIST");
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        let source = SINGLE_DETECTOR_CONFIG.replace("195 487", "195");
        let error = parse_detector_source(&source).expect_err("single pixel count");
        assert_eq!(error.placeholder(), "CONFIG.DETECTOR_FIELD");
    }
}
