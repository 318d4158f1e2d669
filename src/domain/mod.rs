// Domain layer: service-agnostic models and ports (interfaces).

pub mod geo;
pub mod model;
pub mod ports;
