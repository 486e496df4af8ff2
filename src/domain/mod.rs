// Domain layer: harvested value types and the ports the pipeline depends on.

pub mod model;
pub mod ports;
