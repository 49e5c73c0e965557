//! Lamp conversion.

use osgx_math::{Vec3, Vec4};

use crate::graph::Light;
use crate::source::{FalloffType, LightType, SourceLight};
use crate::weld::sanitize;

/// Largest fixed-function spot exponent.
pub const MAX_SPOT_EXPONENT: f32 = 128.0;

/// Cutoff written for lights that are not cones.
pub const NO_CUTOFF: f32 = 180.0;

/// Constant, linear and quadratic attenuation for a falloff type.
pub fn attenuation(src: &SourceLight) -> (f32, f32, f32) {
    let distance = sanitize(src.distance);
    let d = if distance > 0.0 { distance } else { 1.0 };
    match src.falloff_type {
        FalloffType::Constant => (1.0, 0.0, 0.0),
        FalloffType::InverseLinear => (1.0, 1.0 / d, 0.0),
        FalloffType::InverseSquare => (1.0, 0.0, 1.0 / (d * d)),
        FalloffType::LinearQuadraticWeighted => (
            1.0,
            sanitize(src.linear_attenuation) / d,
            sanitize(src.quadratic_attenuation) / (d * d),
        ),
    }
}

/// Cone half angle in degrees. Anything wider than a hemisphere is
/// written as no cutoff.
pub fn spot_cutoff(spot_size: f32) -> f32 {
    let cutoff = sanitize(spot_size).to_degrees() / 2.0;
    if cutoff > 90.0 {
        NO_CUTOFF
    } else {
        cutoff
    }
}

/// Fixed-function light for `src`, shining down its local -Z axis.
pub fn convert_light(src: &SourceLight, light_num: u32) -> Light {
    let energy = sanitize(src.energy);
    let colour = Vec3::from_array(src.color.map(sanitize)) * energy;
    let enabled = |on: bool| if on { colour.extend(1.0) } else { Vec4::W };

    let mut light = Light {
        light_num,
        diffuse: enabled(src.use_diffuse),
        specular: enabled(src.use_specular),
        direction: Vec3::NEG_Z,
        ..Default::default()
    };

    match src.kind {
        LightType::Sun => {
            light.position = Vec4::new(0.0, 0.0, 1.0, 0.0);
        }
        LightType::Spot => {
            let (c, l, q) = attenuation(src);
            light.constant_attenuation = c;
            light.linear_attenuation = l;
            light.quadratic_attenuation = q;
            light.spot_cutoff = spot_cutoff(src.spot_size);
            light.spot_exponent = (MAX_SPOT_EXPONENT * sanitize(src.spot_blend)).clamp(0.0, MAX_SPOT_EXPONENT);
        }
        LightType::Point | LightType::Area | LightType::Hemi => {
            let (c, l, q) = attenuation(src);
            light.constant_attenuation = c;
            light.linear_attenuation = l;
            light.quadratic_attenuation = q;
        }
    }
    light
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_falloff_mapping() {
        let mut src = SourceLight {
            distance: 10.0,
            linear_attenuation: 0.5,
            quadratic_attenuation: 2.0,
            ..Default::default()
        };
        src.falloff_type = FalloffType::Constant;
        assert_eq!(attenuation(&src), (1.0, 0.0, 0.0));
        src.falloff_type = FalloffType::InverseLinear;
        assert_eq!(attenuation(&src), (1.0, 0.1, 0.0));
        src.falloff_type = FalloffType::InverseSquare;
        assert_eq!(attenuation(&src), (1.0, 0.0, 0.01));
        src.falloff_type = FalloffType::LinearQuadraticWeighted;
        assert_eq!(attenuation(&src), (1.0, 0.05, 0.02));
    }

    #[test]
    fn test_zero_distance_does_not_divide_by_zero() {
        let src = SourceLight {
            distance: 0.0,
            falloff_type: FalloffType::InverseLinear,
            ..Default::default()
        };
        assert_eq!(attenuation(&src), (1.0, 1.0, 0.0));
    }

    #[test]
    fn test_spot_cutoff_and_exponent() {
        let src = SourceLight {
            kind: LightType::Spot,
            spot_size: 60f32.to_radians(),
            spot_blend: 0.25,
            ..Default::default()
        };
        let light = convert_light(&src, 2);
        assert_eq!(light.light_num, 2);
        assert!((light.spot_cutoff - 30.0).abs() < 1e-4);
        assert!((light.spot_exponent - 32.0).abs() < 1e-4);
    }

    #[test]
    fn test_wide_spot_has_no_cutoff() {
        assert_eq!(spot_cutoff(200f32.to_radians()), NO_CUTOFF);
        assert!((spot_cutoff(170f32.to_radians()) - 85.0).abs() < 1e-3);
    }

    #[test]
    fn test_sun_is_directional() {
        let src = SourceLight {
            kind: LightType::Sun,
            ..Default::default()
        };
        let light = convert_light(&src, 0);
        assert_eq!(light.position.w, 0.0);
        assert_eq!(light.spot_cutoff, NO_CUTOFF);
        assert_eq!(light.quadratic_attenuation, 0.0);
    }

    #[test]
    fn test_colour_scaled_by_energy() {
        let src = SourceLight {
            color: [1.0, 0.5, 0.25],
            energy: 2.0,
            use_specular: false,
            ..Default::default()
        };
        let light = convert_light(&src, 0);
        assert_eq!(light.diffuse, Vec4::new(2.0, 1.0, 0.5, 1.0));
        assert_eq!(light.specular, Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(light.position, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }
}
