pub mod angular_response;
pub mod geometry;
pub mod optics;
pub mod sky_temperature;
pub(crate) mod solvers;
pub mod sunsolve;
pub mod units;
