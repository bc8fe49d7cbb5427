/* Copyright 2020 @Yuchen Wong */

use nalgebra::{ Matrix3, Matrix4, Vector2, Vector3, Vector4 };

pub type Float = f32;
pub type Int = i32;
pub type UInt = u32;

pub type Vector2f = Vector2<Float>;
pub type Vector3f = Vector3<Float>;
pub type Vector4f = Vector4<Float>;
pub type Vector2i = Vector2<Int>;
pub type Matrix3f = Matrix3<Float>;
pub type Matrix4f = Matrix4<Float>;
pub type Quaternionf = nalgebra::UnitQuaternion<Float>;

pub const EPSILON: Float = 1e-4;
pub const PI: Float = 3.14159265359;
pub const TWO_PI: Float = 6.28318530718;
pub const FOUR_PI: Float = 12.56637061436;
pub const INV_PI: Float = 0.31830988618;
pub const INV_TWO_PI: Float = 0.15915494309;
pub const INV_FOUR_PI: Float = 0.07957747154;
pub const SQUARE_2: Float = 1.41421356;
pub const INV_SQUARE_2: Float = 0.70710678;

pub const FLOAT_MAX: Float = std::f32::MAX;
pub const FLOAT_MIN: Float = std::f32::MIN;
