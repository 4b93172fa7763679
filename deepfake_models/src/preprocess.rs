//! Image preprocessing driven by a Hugging Face `preprocessor_config.json`.
//!
//! Only the fields needed by ViT-style image processors and VideoMAE-style
//! video processors are honoured: resize, center crop, rescale and
//! normalize. Unknown fields are ignored.

use crate::error::ModelError;
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::{stack, Array3, Array4, Array5, Axis};
use serde::Deserialize;
use std::{fs::File, io::BufReader, path::Path};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(untagged)]
pub enum SizeSpec {
    Dims { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
    Square(u32),
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImageProcessorConfig {
    #[serde(default = "default_true")]
    pub do_resize: bool,
    #[serde(default = "default_size")]
    pub size: SizeSpec,
    #[serde(default)]
    pub do_center_crop: bool,
    #[serde(default)]
    pub crop_size: Option<SizeSpec>,
    #[serde(default = "default_true")]
    pub do_rescale: bool,
    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f32,
    #[serde(default = "default_true")]
    pub do_normalize: bool,
    #[serde(default = "default_image_mean")]
    pub image_mean: [f32; 3],
    #[serde(default = "default_image_std")]
    pub image_std: [f32; 3],
    /// PIL resampling filter id.
    #[serde(default = "default_resample")]
    pub resample: u8,
}

fn default_true() -> bool {
    true
}

fn default_size() -> SizeSpec {
    SizeSpec::Dims {
        height: 224,
        width: 224,
    }
}

fn default_rescale_factor() -> f32 {
    1.0 / 255.0
}

fn default_image_mean() -> [f32; 3] {
    [0.5, 0.5, 0.5]
}

fn default_image_std() -> [f32; 3] {
    [0.5, 0.5, 0.5]
}

fn default_resample() -> u8 {
    2
}

impl Default for ImageProcessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: default_size(),
            do_center_crop: false,
            crop_size: None,
            do_rescale: true,
            rescale_factor: default_rescale_factor(),
            do_normalize: true,
            image_mean: default_image_mean(),
            image_std: default_image_std(),
            resample: default_resample(),
        }
    }
}

impl ImageProcessorConfig {
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let file = File::open(path).map_err(|source| ModelError::ReadArtifact {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ModelError::ParseArtifact {
            path: path.to_path_buf(),
            source,
        })
    }

    fn filter(&self) -> FilterType {
        match self.resample {
            0 => FilterType::Nearest,
            1 => FilterType::Lanczos3,
            3 => FilterType::CatmullRom,
            _ => FilterType::Triangle,
        }
    }

    /// Output `(width, height)` of the resize step for an input of the given size.
    pub fn resized_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        match self.size {
            SizeSpec::Dims { height: h, width: w } => (w, h),
            SizeSpec::Square(s) => (s, s),
            SizeSpec::ShortestEdge { shortest_edge } => {
                if width <= height {
                    let long = (shortest_edge as u64 * height as u64 / width.max(1) as u64) as u32;
                    (shortest_edge, long)
                } else {
                    let long = (shortest_edge as u64 * width as u64 / height.max(1) as u64) as u32;
                    (long, shortest_edge)
                }
            }
        }
    }

    fn crop_dimensions(&self) -> Option<(u32, u32)> {
        if !self.do_center_crop {
            return None;
        }
        match self.crop_size? {
            SizeSpec::Dims { height, width } => Some((width, height)),
            SizeSpec::Square(s) | SizeSpec::ShortestEdge { shortest_edge: s } => Some((s, s)),
        }
    }

    fn prepare(&self, image: &RgbImage) -> RgbImage {
        let mut img = if self.do_resize {
            let (w, h) = self.resized_dimensions(image.width(), image.height());
            imageops::resize(image, w, h, self.filter())
        } else {
            image.clone()
        };

        if let Some((crop_w, crop_h)) = self.crop_dimensions() {
            let crop_w = crop_w.min(img.width());
            let crop_h = crop_h.min(img.height());
            let x = (img.width() - crop_w) / 2;
            let y = (img.height() - crop_h) / 2;
            img = imageops::crop_imm(&img, x, y, crop_w, crop_h).to_image();
        }
        img
    }

    /// Channel-first `[3, H, W]` pixel values.
    pub fn pixel_values(&self, image: &RgbImage) -> Array3<f32> {
        let img = self.prepare(image);
        let scale = if self.do_rescale {
            self.rescale_factor
        } else {
            1.0
        };
        let (mean, std) = if self.do_normalize {
            (self.image_mean, self.image_std)
        } else {
            ([0.0; 3], [1.0; 3])
        };

        let mut input = Array3::zeros((3, img.height() as usize, img.width() as usize));
        for (x, y, pixel) in img.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                input[[c, y, x]] = (pixel.0[c] as f32 * scale - mean[c]) / std[c];
            }
        }
        input
    }

    /// `[1, 3, H, W]` batch holding a single image.
    pub fn image_batch(&self, image: &RgbImage) -> Array4<f32> {
        self.pixel_values(image).insert_axis(Axis(0))
    }

    /// `[1, T, 3, H, W]` batch holding one clip of `T` frames.
    pub fn video_batch(&self, frames: &[RgbImage]) -> Result<Array5<f32>, ModelError> {
        if frames.is_empty() {
            return Err(ModelError::EmptyInput);
        }
        let per_frame: Vec<Array3<f32>> = frames.iter().map(|f| self.pixel_values(f)).collect();
        let views: Vec<_> = per_frame.iter().map(|a| a.view()).collect();
        let clip = stack(Axis(0), &views)
            .map_err(|e| ModelError::InvalidOutput(format!("failed to stack frames: {}", e)))?;
        Ok(clip.insert_axis(Axis(0)))
    }
}
