// Copyright @yucwang 2021

#![allow(dead_code)]

pub extern crate nalgebra as na;

pub mod cameras;
pub mod core;
pub mod integrators;
pub mod io;
pub mod materials;
pub mod math;
pub mod media;
pub mod primitives;
pub mod renderers;
pub mod textures;
