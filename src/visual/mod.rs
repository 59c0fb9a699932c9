pub mod deform;
pub mod mesh;
pub mod noise;

pub use deform::{Deformed, DeformationField, FieldFrame, ROTATION_SPEED};
pub use mesh::Icosphere;
pub use noise::CoherentNoise;
