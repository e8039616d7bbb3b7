// Domain layer: the project model and the ports (interfaces) to external collaborators.

pub mod model;
pub mod ports;
