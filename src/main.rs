// Copyright 2020 TwoCookingMice

#![allow(dead_code)]

use praline::cameras::pinhole::PinholeCamera;
use praline::core::accel::TraceContext;
use praline::core::bsdf::Bsdf;
use praline::core::primitive::Primitive;
use praline::core::scene::TraceableScene;
use praline::integrators::path::PathIntegrator;
use praline::io::exr_utils;
use praline::materials::lambert::LambertBsdf;
use praline::math::constants::{ Float, Vector3f };
use praline::math::spectrum::RGBSpectrum;
use praline::math::transform::Transform;
use praline::primitives::quad::Quad;
use praline::primitives::sphere::Sphere;
use praline::renderers::tile::TileRenderer;

use std::env;
use std::sync::Arc;

// Built-in demo scene: a diffuse sphere on a floor quad, lit by an area
// light overhead. Scene-description loading lives outside this crate.
fn build_primitives() -> (Vec<Box<dyn Primitive>>, Vec<Arc<dyn Bsdf>>) {
    let floor_bsdf: Arc<dyn Bsdf> =
        Arc::new(LambertBsdf::new(RGBSpectrum::new(0.7, 0.7, 0.7)).with_name("floor"));
    let sphere_bsdf: Arc<dyn Bsdf> =
        Arc::new(LambertBsdf::new(RGBSpectrum::new(0.8, 0.3, 0.25)));

    let light_rotation = praline::math::constants::Quaternionf::from_axis_angle(
        &praline::na::Unit::new_normalize(Vector3f::new(1.0, 0.0, 0.0)),
        std::f32::consts::PI);

    let primitives: Vec<Box<dyn Primitive>> = vec![
        Box::new(Quad::new(Transform::scale(Vector3f::new(8.0, 8.0, 1.0)))
                 .with_bsdf(floor_bsdf.clone())),
        Box::new(Sphere::new(Transform::translate(Vector3f::new(0.0, 0.0, 1.0)))
                 .with_bsdf(sphere_bsdf.clone())),
        Box::new(Quad::new(Transform::translate(Vector3f::new(0.0, 0.0, 5.0))
                           .compose(&Transform::rotate(light_rotation)))
                 .with_emission(RGBSpectrum::new(10.0, 10.0, 10.0))),
    ];
    (primitives, vec![floor_bsdf, sphere_bsdf])
}

fn main() {
    env::set_var("RUST_LOG", "info");
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <output.exr> [--spp N] [--max-depth N] [--seed N] [--size N]",
                  args[0]);
        std::process::exit(1);
    }

    let output_path = &args[1];
    let mut spp: u32 = 16;
    let mut max_depth: u32 = 6;
    let mut seed: u64 = 0;
    let mut size: usize = 256;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--spp" => {
                i += 1;
                spp = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(spp);
            }
            "--max-depth" => {
                i += 1;
                max_depth = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(max_depth);
            }
            "--seed" => {
                i += 1;
                seed = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(seed);
            }
            "--size" => {
                i += 1;
                size = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(size);
            }
            _ => {}
        }
        i += 1;
    }

    let (primitives, bsdfs) = build_primitives();
    let camera = Box::new(PinholeCamera::new(Vector3f::new(0.0, -6.0, 3.0),
                                             Vector3f::new(0.0, 0.0, 1.0),
                                             Vector3f::new(0.0, 0.0, 1.0),
                                             50.0f32.to_radians() as Float,
                                             size, size));

    let ctx = TraceContext::new();
    let mut scene = TraceableScene::new(&ctx, primitives, bsdfs, Vec::new(), camera);

    let integrator = Box::new(PathIntegrator::new(max_depth, spp));
    let renderer = TileRenderer::new(integrator, seed);
    match renderer.render(&mut scene) {
        Ok(image) => {
            exr_utils::write_exr_to_file(&image.raw_copy(), image.width(),
                                         image.height(), output_path);
        }
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
    scene.teardown_after_render();
}
