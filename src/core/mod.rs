// Copyright @yucwang 2021

pub mod accel;
pub mod bsdf;
pub mod camera;
pub mod integrator;
pub mod intersection;
pub mod medium;
pub mod primitive;
pub mod records;
pub mod rng;
pub mod scene;
pub mod tangent_frame;
pub mod texture;
