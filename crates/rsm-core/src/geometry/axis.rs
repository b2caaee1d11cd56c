use crate::domain::{RsmError, RsmResult};
use nalgebra::Vector3;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A signed laboratory axis such as `x+` or `z-`.
///
/// Used both for goniometer rotation axes (right-handed rotation about the
/// signed axis) and for detector pixel directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisDirection {
    XPlus,
    XMinus,
    YPlus,
    YMinus,
    ZPlus,
    ZMinus,
}

impl AxisDirection {
    pub fn unit_vector(self) -> Vector3<f64> {
        match self {
            Self::XPlus => Vector3::x(),
            Self::XMinus => -Vector3::x(),
            Self::YPlus => Vector3::y(),
            Self::YMinus => -Vector3::y(),
            Self::ZPlus => Vector3::z(),
            Self::ZMinus => -Vector3::z(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::XPlus => "x+",
            Self::XMinus => "x-",
            Self::YPlus => "y+",
            Self::YMinus => "y-",
            Self::ZPlus => "z+",
            Self::ZMinus => "z-",
        }
    }
}

impl Display for AxisDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for AxisDirection {
    type Err = RsmError;

    fn from_str(token: &str) -> RsmResult<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "x+" => Ok(Self::XPlus),
            "x-" => Ok(Self::XMinus),
            "y+" => Ok(Self::YPlus),
            "y-" => Ok(Self::YMinus),
            "z+" => Ok(Self::ZPlus),
            "z-" => Ok(Self::ZMinus),
            other => Err(RsmError::invalid_config(
                "CONFIG.AXIS_DIRECTION",
                format!("unsupported axis direction '{}'; expected one of x+ x- y+ y- z+ z-", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AxisDirection;
    use crate::domain::RsmErrorKind;
    use nalgebra::Vector3;

    #[test]
    fn tokens_parse_case_insensitively() {
        assert_eq!("x+".parse::<AxisDirection>().unwrap(), AxisDirection::XPlus);
        assert_eq!(" Z- ".parse::<AxisDirection>().unwrap(), AxisDirection::ZMinus);
        assert_eq!(
            AxisDirection::YMinus.unit_vector(),
            Vector3::new(0.0, -1.0, 0.0)
        );
    }

    #[test]
    fn unknown_tokens_are_config_errors() {
        let error = "w+".parse::<AxisDirection>().expect_err("w+ is not an axis");
        assert_eq!(error.kind(), RsmErrorKind::InvalidConfig);
        assert_eq!(error.placeholder(), "CONFIG.AXIS_DIRECTION");
    }
}
