//! Geometry of the sun relative to a fixed-tilt array.

use crate::compare_floats::clip;
use std::f64::consts::PI;

/// The sun's elevation angle projected into the plane that contains the "up" vector and the
/// array's surface normal, in radians, measured from the horizon in front of the array. The
/// finite element model uses this to place the array's own shadow on the ground.
///
/// All arguments are in radians, azimuths east of north. A sun at or below the horizon
/// projects to 0, which the thermal model reads as the ground being fully shaded.
pub fn projected_sun_elevation(elevation: f64, azimuth: f64, array_azimuth: f64) -> f64 {
    if elevation <= 0. {
        return 0.;
    }

    // the projection is taken in the array-normal frame, which faces away from the compass
    // bearing of the array
    let array_normal_azimuth = array_azimuth - PI;

    clip(
        elevation
            .tan()
            .atan2(-(azimuth - array_normal_azimuth).cos()),
        0.,
        PI,
    )
}

/// Angle between the sun's rays and the array surface normal, in degrees.
///
/// Arguments (all in degrees, azimuths east of north):
/// * `tilt` - array tilt from horizontal
/// * `array_azimuth`
/// * `zenith` - apparent solar zenith
/// * `azimuth` - solar azimuth
pub fn angle_of_incidence(tilt: f64, array_azimuth: f64, zenith: f64, azimuth: f64) -> f64 {
    let (tilt, zenith) = (tilt.to_radians(), zenith.to_radians());
    let projection = tilt.cos() * zenith.cos()
        + tilt.sin() * zenith.sin() * (azimuth - array_azimuth).to_radians().cos();

    // rounding can push the projection marginally outside the domain of acos
    clip(projection, -1., 1.).acos().to_degrees()
}

/// Diffuse irradiance reaching a tilted surface under an isotropic sky, in W/m2.
pub fn isotropic_sky_diffuse(tilt: f64, dhi: f64) -> f64 {
    dhi * (1. + tilt.to_radians().cos()) / 2.
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::*;
    use std::f64::consts::FRAC_PI_2;

    #[rstest]
    fn test_projected_elevation_is_zero_below_horizon(
        #[values(0., -0.01, -0.5, -FRAC_PI_2)] elevation: f64,
        #[values(0., 1., FRAC_PI_2, PI, 4.5, 2. * PI)] azimuth: f64,
    ) {
        assert_eq!(projected_sun_elevation(elevation, azimuth, PI), 0.);
    }

    #[rstest]
    #[case(0.3, 0.)]
    #[case(0.3, PI)]
    #[case(1.2, 2.)]
    fn test_projected_elevation_stays_in_range(#[case] elevation: f64, #[case] azimuth: f64) {
        let projected = projected_sun_elevation(elevation, azimuth, PI);
        assert!((0. ..=PI).contains(&projected));
    }

    #[rstest]
    #[case(0.5, PI, PI, 0.5)]
    #[case(30f64.to_radians(), PI, PI, 30f64.to_radians())]
    #[case(0.5, 0., PI, PI - 0.5)]
    #[case(0.5, 0., 0., 0.5)]
    #[case(0.5, FRAC_PI_2, FRAC_PI_2, 0.5)]
    fn test_projected_elevation_in_front_of_and_behind_array(
        #[case] elevation: f64,
        #[case] azimuth: f64,
        #[case] array_azimuth: f64,
        #[case] expected: f64,
    ) {
        // sun in front of the array projects to its own elevation, sun behind to the
        // supplement
        assert_relative_eq!(
            projected_sun_elevation(elevation, azimuth, array_azimuth),
            expected,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_projected_elevation_perpendicular_azimuth() {
        let projected = projected_sun_elevation(0.4, PI / 2., PI);
        assert!(projected.is_finite());
        assert_relative_eq!(projected, FRAC_PI_2, max_relative = 1e-9);
    }

    #[rstest]
    #[case(40., 180., 40., 180., 0.)]
    #[case(0., 180., 30., 90., 30.)]
    #[case(90., 180., 90., 0., 180.)]
    #[case(90., 180., 90., 90., 90.)]
    fn test_angle_of_incidence(
        #[case] tilt: f64,
        #[case] array_azimuth: f64,
        #[case] zenith: f64,
        #[case] azimuth: f64,
        #[case] expected: f64,
    ) {
        assert_relative_eq!(
            angle_of_incidence(tilt, array_azimuth, zenith, azimuth),
            expected,
            epsilon = 1e-4
        );
    }

    #[rstest]
    #[case(0., 100., 100.)]
    #[case(90., 100., 50.)]
    #[case(180., 100., 0.)]
    fn test_isotropic_sky_diffuse(#[case] tilt: f64, #[case] dhi: f64, #[case] expected: f64) {
        assert_relative_eq!(isotropic_sky_diffuse(tilt, dhi), expected, epsilon = 1e-9);
    }
}
