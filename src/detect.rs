//! Moving-blob extraction over grayscale working frames.
//!
//! A per-pixel adaptive background model marks foreground and shadow,
//! thresholding drops the shadows, morphological open/close scrubs the
//! mask, and the largest connected blob yields the centroid. The model
//! follows the classic MOG-style parameterization: learning rate `1/history`
//! and a squared-deviation gate of `var_threshold` times the pixel variance.

use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use imageproc::region_labelling::{connected_components, Connectivity};

const HISTORY: f32 = 500.0;
const VAR_THRESHOLD: f32 = 16.0;
const INITIAL_VARIANCE: f32 = 225.0;
const MIN_VARIANCE: f32 = 4.0;
const MAX_VARIANCE: f32 = 5000.0;

const FOREGROUND: u8 = 255;
const SHADOW: u8 = 127;
/// Mask threshold applied after the model; shadow pixels (127) fall below it.
const MASK_THRESHOLD: u8 = 200;

/// Structuring radius for open/close: two passes of a 5-wide kernel.
const MORPH_RADIUS: u8 = 4;

/// The largest moving region of a frame, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub area: f64,
    pub centroid: (f64, f64),
}

/// Stateful detector; owns the background model and the label mask.
pub struct MotionDetector {
    width: u32,
    height: u32,
    mean: Vec<f32>,
    variance: Vec<f32>,
    mask: GrayImage,
    seeded: bool,
}

impl MotionDetector {
    pub fn new() -> MotionDetector {
        MotionDetector {
            width: 0,
            height: 0,
            mean: Vec::new(),
            variance: Vec::new(),
            mask: GrayImage::new(0, 0),
            seeded: false,
        }
    }

    /// Run the full pipeline on one frame. Returns the largest blob with
    /// area at least `min_area`, or `None` for an empty or rejected frame.
    ///
    /// The first frame after construction or a resolution change seeds the
    /// background model and never detects.
    pub fn detect(&mut self, frame: &GrayImage, min_area: f64) -> Option<Blob> {
        if frame.width() != self.width || frame.height() != self.height {
            self.reset(frame.width(), frame.height());
        }

        if !self.seeded {
            self.seed(frame);
            return None;
        }

        self.apply_model(frame);
        self.clean_mask();
        let blob = self.largest_blob()?;

        if blob.area < min_area {
            return None;
        }
        Some(blob)
    }

    fn reset(&mut self, width: u32, height: u32) {
        let len = (width * height) as usize;
        self.width = width;
        self.height = height;
        self.mean = vec![0.0; len];
        self.variance = vec![INITIAL_VARIANCE; len];
        self.mask = GrayImage::new(width, height);
        self.seeded = false;
        log::debug!("background model reset to {}x{}", width, height);
    }

    fn seed(&mut self, frame: &GrayImage) {
        for (i, p) in frame.as_raw().iter().enumerate() {
            self.mean[i] = *p as f32;
        }
        self.seeded = true;
    }

    /// Classify each pixel against the running Gaussian, label shadows,
    /// then fold the frame into the model.
    fn apply_model(&mut self, frame: &GrayImage) {
        let alpha = 1.0 / HISTORY;
        for (i, p) in frame.as_raw().iter().enumerate() {
            let value = *p as f32;
            let mean = self.mean[i];
            let variance = self.variance[i];
            let diff = value - mean;
            let foreground = diff * diff > VAR_THRESHOLD * variance;

            self.mask.as_mut()[i] = if foreground {
                // A darker pixel still tracking the background hue is a
                // cast shadow, not an occupant.
                let ratio = value / mean.max(1.0);
                if (0.5..=0.95).contains(&ratio) {
                    SHADOW
                } else {
                    FOREGROUND
                }
            } else {
                0
            };

            self.mean[i] = mean + alpha * diff;
            self.variance[i] =
                (variance + alpha * (diff * diff - variance)).clamp(MIN_VARIANCE, MAX_VARIANCE);
        }

        // Binary threshold: shadows and background drop out.
        for m in self.mask.iter_mut() {
            *m = if *m >= MASK_THRESHOLD { 255 } else { 0 };
        }
    }

    /// Morphological open then close over the binary mask.
    fn clean_mask(&mut self) {
        let opened = open(&self.mask, Norm::LInf, MORPH_RADIUS);
        self.mask = close(&opened, Norm::LInf, MORPH_RADIUS);
    }

    /// Label the cleaned mask and keep the component with the largest
    /// pixel area. Zero-area moments mean no detection.
    fn largest_blob(&self) -> Option<Blob> {
        let labels = connected_components(&self.mask, Connectivity::Four, image::Luma([0u8]));

        // Raw moments (m00, m10, m01) per label; label 0 is background.
        let mut moments: Vec<(u64, u64, u64)> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0] as usize;
            if label == 0 {
                continue;
            }
            if moments.len() < label {
                moments.resize(label, (0, 0, 0));
            }
            let m = &mut moments[label - 1];
            m.0 += 1;
            m.1 += x as u64;
            m.2 += y as u64;
        }

        let (m00, m10, m01) = moments.into_iter().max_by_key(|m| m.0)?;
        if m00 == 0 {
            return None;
        }
        Some(Blob {
            area: m00 as f64,
            centroid: (m10 as f64 / m00 as f64, m01 as f64 / m00 as f64),
        })
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new()
    }
}
