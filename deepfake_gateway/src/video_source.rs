use crate::{
    progress::ProgressHub,
    sampler::{FrameExtractor, FrameSampler, SampleRequest, SampledFrame, VideoSource},
};
use image::RgbImage;
use opencv::{core::Mat, imgproc, prelude::*, videoio};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoSourceError {
    #[error("Failed to open video: {0}")]
    OpenVideoFailed(opencv::Error),
    #[error("Video could not be opened: {0:?}")]
    NotOpened(PathBuf),
    #[error("Failed to read frame: {0}")]
    ReadFrameFailed(opencv::Error),
    #[error("Failed to convert frame to RGB: {0}")]
    ConvertFrameFailed(opencv::Error),
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

/// A video file read through OpenCV. The capture is released on drop.
pub struct OpenCvVideoSource {
    capture: videoio::VideoCapture,
}

impl OpenCvVideoSource {
    pub fn open(path: &Path) -> Result<Self, VideoSourceError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| VideoSourceError::NotOpened(path.to_path_buf()))?;
        let capture = videoio::VideoCapture::from_file(path_str, videoio::CAP_ANY)
            .map_err(VideoSourceError::OpenVideoFailed)?;
        if !capture
            .is_opened()
            .map_err(VideoSourceError::OpenVideoFailed)?
        {
            return Err(VideoSourceError::NotOpened(path.to_path_buf()));
        }
        Ok(Self { capture })
    }
}

fn bgr_to_rgb_image(frame: &Mat) -> Result<RgbImage, VideoSourceError> {
    if frame.empty() {
        return Err(VideoSourceError::InvalidFrame("empty frame".to_string()));
    }
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(frame, &mut rgb, imgproc::COLOR_BGR2RGB)
        .map_err(VideoSourceError::ConvertFrameFailed)?;

    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let bytes = rgb
        .data_bytes()
        .map_err(VideoSourceError::ConvertFrameFailed)?
        .to_vec();
    RgbImage::from_raw(width, height, bytes).ok_or_else(|| {
        VideoSourceError::InvalidFrame(format!(
            "buffer does not match {}x{} RGB frame",
            width, height
        ))
    })
}

impl VideoSource for OpenCvVideoSource {
    type Error = VideoSourceError;

    fn frame_count(&self) -> Option<usize> {
        match self.capture.get(videoio::CAP_PROP_FRAME_COUNT) {
            Ok(count) if count.is_finite() && count >= 1.0 => Some(count as usize),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Failed to read frame count: {}", e);
                None
            }
        }
    }

    fn grab(&mut self) -> Result<bool, VideoSourceError> {
        self.capture
            .grab()
            .map_err(VideoSourceError::ReadFrameFailed)
    }

    fn retrieve(&mut self) -> Result<RgbImage, VideoSourceError> {
        let mut frame = Mat::default();
        if !self
            .capture
            .retrieve(&mut frame, 0)
            .map_err(VideoSourceError::ReadFrameFailed)?
        {
            return Err(VideoSourceError::InvalidFrame(
                "frame could not be decoded".to_string(),
            ));
        }
        bgr_to_rgb_image(&frame)
    }
}

/// Samples uploads with [`OpenCvVideoSource`]. A file OpenCV cannot open
/// yields no frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvFrameExtractor;

impl FrameExtractor for OpenCvFrameExtractor {
    fn extract(
        &self,
        path: &Path,
        request: &SampleRequest,
        progress: ProgressHub,
    ) -> Vec<SampledFrame> {
        let source = match OpenCvVideoSource::open(path) {
            Ok(source) => Some(source),
            Err(e) => {
                tracing::warn!("Could not open uploaded video: {}", e);
                None
            }
        };
        FrameSampler::new(source, request, progress).collect()
    }
}

impl Drop for OpenCvVideoSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("Failed to release video capture: {}", e);
        }
    }
}
