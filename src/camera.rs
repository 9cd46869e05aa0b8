//! Frame acquisition.
//!
//! The fusion service works on whatever RGB frames a source yields and
//! resizes them to the configured working width itself. On-target camera
//! stacks bind through the same trait; the folder source below covers
//! development hosts and tests.

use image::RgbImage;
use std::path::{Path, PathBuf};

/// A camera producing RGB frames at arbitrary resolution.
pub trait FrameSource: Send {
    /// Acquire one frame. `Ok(None)` means no frame is currently
    /// available; the caller sleeps briefly and retries.
    fn next_frame(&mut self) -> crate::Result<Option<RgbImage>>;

    /// Release any capture resources.
    fn stop(&mut self) {}
}

/// Resize a frame to the working width, preserving aspect ratio.
pub fn resize_to_width(frame: &RgbImage, width: u32) -> RgbImage {
    if frame.width() == width {
        return frame.clone();
    }
    let height =
        ((frame.height() as u64 * width as u64) / frame.width().max(1) as u64).max(1) as u32;
    image::imageops::resize(frame, width, height, image::imageops::FilterType::Triangle)
}

/// Frame source backed by a directory of still images, cycled in
/// lexicographic order. Stands in for a live camera on non-target hosts.
pub struct ImageFolderCamera {
    files: Vec<PathBuf>,
    index: usize,
}

impl ImageFolderCamera {
    /// Open a frame directory. An unreadable or empty directory is an
    /// error so a misconfigured vision node fails at startup.
    pub fn open(dir: impl AsRef<Path>) -> crate::Result<ImageFolderCamera> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            crate::HomesightError::Camera(format!("cannot read {}: {}", dir.display(), e))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("png") | Some("jpg") | Some("jpeg")
                )
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(crate::HomesightError::Camera(format!(
                "no frames in {}",
                dir.display()
            )));
        }

        log::info!("frame folder {} with {} images", dir.display(), files.len());
        Ok(ImageFolderCamera { files, index: 0 })
    }
}

impl FrameSource for ImageFolderCamera {
    fn next_frame(&mut self) -> crate::Result<Option<RgbImage>> {
        let path = &self.files[self.index];
        self.index = (self.index + 1) % self.files.len();

        match image::open(path) {
            Ok(img) => Ok(Some(img.to_rgb8())),
            Err(e) => {
                log::warn!("skipping unreadable frame {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_resize_preserves_aspect() {
        let frame = RgbImage::from_pixel(1280, 720, Rgb([10, 20, 30]));
        let resized = resize_to_width(&frame, 640);
        assert_eq!(resized.width(), 640);
        assert_eq!(resized.height(), 360);
    }

    #[test]
    fn test_resize_noop_at_width() {
        let frame = RgbImage::from_pixel(640, 480, Rgb([0, 0, 0]));
        let resized = resize_to_width(&frame, 640);
        assert_eq!((resized.width(), resized.height()), (640, 480));
    }

    #[test]
    fn test_folder_camera_cycles() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png"] {
            let frame = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
            frame.save(dir.path().join(name)).unwrap();
        }

        let mut camera = ImageFolderCamera::open(dir.path()).unwrap();
        for _ in 0..5 {
            assert!(camera.next_frame().unwrap().is_some());
        }
    }

    #[test]
    fn test_empty_folder_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageFolderCamera::open(dir.path()).is_err());
        assert!(ImageFolderCamera::open("/nonexistent/frames").is_err());
    }
}
