//! Frame sampling with the ffmpeg command line tools.
//!
//! A video of duration `d` is sampled at `d/n, 2d/n, ..., d`. Sampling
//! starts one interval in rather than at zero, and the last timestamp sits
//! on the very end of the stream, which ffmpeg often cannot decode. Frames
//! that fail to extract are skipped, so a healthy video usually yields
//! `n - 1` frames.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use uuid::Uuid;

use super::{FingerprintError, VideoSampler};

/// Width sampled frames are scaled to; height follows the aspect ratio.
pub const DEFAULT_SCALE_WIDTH: u32 = 720;

/// Still frames written to disk by a sampler. The files are removed when
/// this value is dropped.
#[derive(Debug, Default)]
pub struct SampledFrames {
    frames: Vec<PathBuf>,
}

impl SampledFrames {
    pub fn new(frames: Vec<PathBuf>) -> Self {
        Self { frames }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Drop for SampledFrames {
    fn drop(&mut self) {
        for frame in &self.frames {
            if let Err(e) = fs::remove_file(frame) {
                log::warn!("Failed to remove frame {}: {}", frame.display(), e);
            }
        }
    }
}

/// Timestamps, in seconds, at which `count` frames are taken.
pub fn sample_timestamps(duration: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    let interval = duration / count as f64;
    (1..=count).map(|k| interval * k as f64).collect()
}

#[derive(Debug, Clone)]
pub struct FfmpegSampler {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    work_dir: PathBuf,
    scale_width: u32,
}

impl FfmpegSampler {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>, work_dir: PathBuf) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            work_dir,
            scale_width: DEFAULT_SCALE_WIDTH,
        }
    }

    pub fn with_scale_width(mut self, width: u32) -> Self {
        self.scale_width = width;
        self
    }

    /// Duration of the video in seconds.
    pub fn probe_duration(&self, video: &Path) -> Result<f64, FingerprintError> {
        let probe_error = |message: String| FingerprintError::Probe {
            path: video.display().to_string(),
            message,
        };

        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(video)
            .output()
            .map_err(|e| probe_error(e.to_string()))?;

        if !output.status.success() {
            return Err(probe_error(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout)).map_err(probe_error)
    }

    fn extract_frame(&self, video: &Path, seek: f64, target: &Path) -> Result<(), String> {
        let output = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-ss")
            .arg(format!("{:.3}", seek))
            .arg("-i")
            .arg(video)
            .arg("-vf")
            .arg(format!("scale={}:-1", self.scale_width))
            .args(["-vframes", "1"])
            .arg(target)
            .output()
            .map_err(|e| e.to_string())?;

        if output.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }
}

fn parse_duration(raw: &str) -> Result<f64, String> {
    let trimmed = raw.trim();
    let duration: f64 = trimmed
        .parse()
        .map_err(|_| format!("unreadable duration {:?}", trimmed))?;

    if duration.is_finite() && duration > 0.0 {
        Ok(duration)
    } else {
        Err(format!("invalid duration {}", duration))
    }
}

impl VideoSampler for FfmpegSampler {
    fn sample(&self, video: &Path, sample_count: usize) -> Result<SampledFrames, FingerprintError> {
        let duration = self.probe_duration(video)?;
        fs::create_dir_all(&self.work_dir)?;

        let batch = Uuid::new_v4().simple().to_string();
        let mut frames = SampledFrames::default();

        for (i, seek) in sample_timestamps(duration, sample_count).into_iter().enumerate() {
            let target = self.work_dir.join(format!("{}-{}.png", batch, i + 1));

            if let Err(message) = self.extract_frame(video, seek, &target) {
                log::debug!(
                    "Frame {} at {:.3}s of {} failed: {}",
                    i + 1,
                    seek,
                    video.display(),
                    message
                );
            }

            if target.exists() {
                frames.frames.push(target);
            }
        }

        if frames.len() < sample_count {
            log::warn!(
                "Sampled {} of {} frames from {}",
                frames.len(),
                sample_count,
                video.display()
            );
        }

        Ok(frames)
    }
}
