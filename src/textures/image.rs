// Copyright @yucwang 2026

use crate::core::texture::Texture;
use crate::math::constants::{ Float, Vector2f };
use crate::math::spectrum::RGBSpectrum;
use exr::prelude::*;
use image::io::Reader as ImageReader;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Bilinear,
    Nearest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    Mirror,
    Clamp,
}

pub struct ImageTexture {
    width: usize,
    height: usize,
    data: Vec<Float>,
    filter_mode: FilterMode,
    wrap_mode: WrapMode,
}

struct RawImage {
    width: usize,
    height: usize,
    data: Vec<Float>,
}

fn srgb_to_linear(v: Float) -> Float {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

impl ImageTexture {
    pub fn from_rgb(r: Float, g: Float, b: Float) -> Self {
        Self::from_data(1, 1, vec![r, g, b])
    }

    pub fn from_exr(path: &str) -> std::result::Result<Self, String> {
        let image = read()
            .no_deep_data()
            .largest_resolution_level()
            .rgba_channels(
                |resolution, _| {
                    let width = resolution.width();
                    let height = resolution.height();
                    RawImage {
                        width,
                        height,
                        data: vec![0.0; width * height * 3],
                    }
                },
                |raw: &mut RawImage, position, (r, g, b, _a): (f32, f32, f32, f32)| {
                    let base = (position.y() * raw.width + position.x()) * 3;
                    raw.data[base] = r;
                    raw.data[base + 1] = g;
                    raw.data[base + 2] = b;
                },
            )
            .first_valid_layer()
            .all_attributes()
            .from_file(path)
            .map_err(|e| format!("failed to read exr {}: {}", path, e))?;

        let raw = image.layer_data.channel_data.pixels;
        Ok(Self::from_data(raw.width, raw.height, raw.data))
    }

    pub fn from_image(path: &str, srgb: bool) -> std::result::Result<Self, String> {
        let img = ImageReader::open(path)
            .map_err(|e| format!("failed to open image {}: {}", path, e))?
            .decode()
            .map_err(|e| format!("failed to decode image {}: {}", path, e))?;

        let rgb = img.to_rgb32f();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let mut data = vec![0.0; width * height * 3];
        for y in 0..height {
            for x in 0..width {
                let p = rgb.get_pixel(x as u32, y as u32);
                let base = (y * width + x) * 3;
                for c in 0..3 {
                    data[base + c] = if srgb { srgb_to_linear(p[c]) } else { p[c] };
                }
            }
        }
        Ok(Self::from_data(width, height, data))
    }

    pub fn from_file(path: &str) -> std::result::Result<Self, String> {
        let ext = Path::new(path)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "exr" => Self::from_exr(path),
            "jpg" | "jpeg" | "png" => Self::from_image(path, true),
            _ => Err(format!("unsupported texture format: {}", ext)),
        }
    }

    fn from_data(width: usize, height: usize, data: Vec<Float>) -> Self {
        debug_assert_eq!(data.len(), width * height * 3);
        Self {
            width,
            height,
            data,
            filter_mode: FilterMode::Bilinear,
            wrap_mode: WrapMode::Repeat,
        }
    }

    pub fn with_filter_mode(mut self, filter_mode: FilterMode) -> Self {
        self.filter_mode = filter_mode;
        self
    }

    pub fn with_wrap_mode(mut self, wrap_mode: WrapMode) -> Self {
        self.wrap_mode = wrap_mode;
        self
    }

    fn pixel_at(&self, x: usize, y: usize) -> RGBSpectrum {
        let base = (y * self.width + x) * 3;
        RGBSpectrum::new(self.data[base], self.data[base + 1], self.data[base + 2])
    }

    fn wrap_index(&self, idx: isize, size: usize) -> usize {
        let n = size as isize;
        if n <= 0 {
            return 0;
        }
        match self.wrap_mode {
            WrapMode::Repeat => idx.rem_euclid(n) as usize,
            WrapMode::Clamp => idx.clamp(0, n - 1) as usize,
            WrapMode::Mirror => {
                if n == 1 {
                    return 0;
                }
                let period = 2 * (n - 1);
                let m = idx.rem_euclid(period);
                if m < n { m as usize } else { (period - m) as usize }
            }
        }
    }

    fn sample_bilinear(&self, uv: Vector2f) -> RGBSpectrum {
        let x = uv.x * self.width as Float - 0.5;
        let y = (1.0 - uv.y) * self.height as Float - 0.5;
        let x0 = x.floor() as isize;
        let y0 = y.floor() as isize;
        let tx = x - x0 as Float;
        let ty = y - y0 as Float;

        let x0u = self.wrap_index(x0, self.width);
        let x1u = self.wrap_index(x0 + 1, self.width);
        let y0u = self.wrap_index(y0, self.height);
        let y1u = self.wrap_index(y0 + 1, self.height);

        let row0 = self.pixel_at(x0u, y0u) * (1.0 - tx) + self.pixel_at(x1u, y0u) * tx;
        let row1 = self.pixel_at(x0u, y1u) * (1.0 - tx) + self.pixel_at(x1u, y1u) * tx;
        row0 * (1.0 - ty) + row1 * ty
    }

    fn sample_nearest(&self, uv: Vector2f) -> RGBSpectrum {
        let x = (uv.x * self.width as Float - 0.5).round() as isize;
        let y = ((1.0 - uv.y) * self.height as Float - 0.5).round() as isize;
        self.pixel_at(self.wrap_index(x, self.width), self.wrap_index(y, self.height))
    }
}

impl Texture for ImageTexture {
    fn eval(&self, uv: Vector2f) -> RGBSpectrum {
        if self.width == 0 || self.height == 0 {
            return RGBSpectrum::default();
        }
        match self.filter_mode {
            FilterMode::Bilinear => self.sample_bilinear(uv),
            FilterMode::Nearest => self.sample_nearest(uv),
        }
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}
