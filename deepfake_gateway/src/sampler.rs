//! Deterministic, evenly spaced frame sampling over a sequential video source.
//!
//! [`FrameSampler`] walks the source once from the first frame, decoding only
//! the selected positions, and publishes a [`ProgressEvent`] after every frame
//! it yields. The source is dropped, and therefore released, as soon as
//! sampling finishes or fails.

use crate::progress::{ProgressEvent, ProgressHub};
use image::RgbImage;
use std::{fmt::Display, iter::FusedIterator, num::NonZeroUsize, path::Path};
use thiserror::Error;

pub const DEFAULT_TARGET_FRAMES: usize = 16;

#[derive(Error, Debug, PartialEq)]
pub enum SamplerError {
    #[error("Target frame count must be at least 1")]
    ZeroTargetCount,
}

/// A video that can be read one frame at a time, front to back.
pub trait VideoSource {
    type Error: Display;

    /// Total number of frames, if the container reports it.
    fn frame_count(&self) -> Option<usize>;

    /// Advances to the next frame without decoding it. Returns `false` once
    /// the stream is exhausted.
    fn grab(&mut self) -> Result<bool, Self::Error>;

    /// Decodes the frame most recently advanced to, in RGB order.
    fn retrieve(&mut self) -> Result<RgbImage, Self::Error>;
}

/// Opens a persisted upload and samples it to completion. Called from a
/// blocking worker thread.
pub trait FrameExtractor: Send + Sync + 'static {
    fn extract(
        &self,
        path: &Path,
        request: &SampleRequest,
        progress: ProgressHub,
    ) -> Vec<SampledFrame>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRequest {
    target_count: NonZeroUsize,
}

impl SampleRequest {
    pub fn new(target_count: usize) -> Result<Self, SamplerError> {
        NonZeroUsize::new(target_count)
            .map(|target_count| Self { target_count })
            .ok_or(SamplerError::ZeroTargetCount)
    }

    pub fn target_count(&self) -> usize {
        self.target_count.get()
    }
}

impl Default for SampleRequest {
    fn default() -> Self {
        Self {
            target_count: NonZeroUsize::new(DEFAULT_TARGET_FRAMES).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub index: usize,
    pub image: RgbImage,
}

/// `target_count` positions spread evenly over `[0, total_frames - 1]`,
/// each rounded to the nearest frame (halves round up). Empty when
/// `total_frames` is zero. Positions may repeat when
/// `target_count > total_frames`.
pub fn select_indices(total_frames: usize, target_count: usize) -> Vec<usize> {
    if total_frames == 0 || target_count == 0 {
        return Vec::new();
    }
    if target_count == 1 {
        return vec![0];
    }
    let last = total_frames - 1;
    let steps = target_count - 1;
    (0..target_count)
        .map(|k| (2 * k * last + steps) / (2 * steps))
        .collect()
}

pub struct FrameSampler<S: VideoSource> {
    source: Option<S>,
    indices: Vec<usize>,
    cursor: usize,
    position: usize,
    yielded: usize,
    target_count: usize,
    progress: ProgressHub,
}

impl<S: VideoSource> FrameSampler<S> {
    /// A `None` source (one that failed to open) yields no frames.
    pub fn new(source: Option<S>, request: &SampleRequest, progress: ProgressHub) -> Self {
        let target_count = request.target_count();
        let indices = source
            .as_ref()
            .and_then(|s| s.frame_count())
            .map(|total| select_indices(total, target_count))
            .unwrap_or_default();

        tracing::debug!(
            "Sampling {} of {:?} frames",
            indices.len(),
            source.as_ref().and_then(|s| s.frame_count())
        );

        let mut sampler = Self {
            source,
            indices,
            cursor: 0,
            position: 0,
            yielded: 0,
            target_count,
            progress,
        };
        if sampler.indices.is_empty() {
            sampler.finish();
        }
        sampler
    }

    fn finish(&mut self) {
        self.source = None;
        self.cursor = self.indices.len();
    }
}

impl<S: VideoSource> Iterator for FrameSampler<S> {
    type Item = SampledFrame;

    fn next(&mut self) -> Option<SampledFrame> {
        loop {
            let Some(&wanted) = self.indices.get(self.cursor) else {
                self.finish();
                return None;
            };
            let source = self.source.as_mut()?;

            match source.grab() {
                Ok(true) => {}
                Ok(false) => {
                    self.finish();
                    return None;
                }
                Err(e) => {
                    tracing::warn!("Failed to read frame {}: {}", self.position, e);
                    self.finish();
                    return None;
                }
            }

            let position = self.position;
            self.position += 1;
            if position != wanted {
                continue;
            }
            while self.indices.get(self.cursor) == Some(&position) {
                self.cursor += 1;
            }

            match source.retrieve() {
                Ok(image) => {
                    self.yielded += 1;
                    self.progress
                        .publish(ProgressEvent::from_counts(self.yielded, self.target_count));
                    if self.cursor == self.indices.len() {
                        self.finish();
                    }
                    return Some(SampledFrame {
                        index: position,
                        image,
                    });
                }
                Err(e) => {
                    tracing::warn!("Failed to decode frame {}: {}", position, e);
                    self.finish();
                    return None;
                }
            }
        }
    }
}

impl<S: VideoSource> FusedIterator for FrameSampler<S> {}
