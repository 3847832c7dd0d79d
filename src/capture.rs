//! Frame sources feeding the scan loop

use anyhow::{bail, Context, Result};
use log::{debug, warn};
use monscan_cv::utils::ImageUtils;
use monscan_cv::{Frame, TemplateLoader};
use std::fs;
use std::path::{Path, PathBuf};

/// Something that can hand out the current screen image.
///
/// `None` means no usable image this time; the caller retries later.
pub trait FrameSource {
    fn capture(&mut self) -> Option<Frame>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn capture(&mut self) -> Option<Frame> {
        (**self).capture()
    }
}

/// Replays image files from a folder in name order, starting over at the end.
pub struct DirectoryFrameSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl DirectoryFrameSource {
    /// Index the folder; a missing folder or one without images is an error.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            bail!("Frame folder not found: {}", dir.display());
        }

        let loader = TemplateLoader::new();
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {:?}", dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && loader.is_supported(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            bail!("No images found in {}", dir.display());
        }
        debug!("Replaying {} frames from {}", paths.len(), dir.display());

        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for DirectoryFrameSource {
    fn capture(&mut self) -> Option<Frame> {
        let path = &self.paths[self.next % self.paths.len()];
        self.next = (self.next + 1) % self.paths.len();

        match ImageUtils::load_rgb(path) {
            Ok(image) => Some(Frame::new(image)),
            Err(e) => {
                warn!("{:#}", e);
                None
            }
        }
    }
}

/// Captures the first monitor.
#[cfg(feature = "screen-capture")]
pub struct ScreenFrameSource {
    monitor: xcap::Monitor,
}

#[cfg(feature = "screen-capture")]
impl ScreenFrameSource {
    pub fn primary() -> Result<Self> {
        let monitor = xcap::Monitor::all()
            .context("Failed to enumerate monitors")?
            .into_iter()
            .next()
            .context("No monitor found")?;
        Ok(Self { monitor })
    }
}

#[cfg(feature = "screen-capture")]
impl FrameSource for ScreenFrameSource {
    fn capture(&mut self) -> Option<Frame> {
        match self.monitor.capture_image() {
            Ok(rgba) => Some(Frame::new(ImageUtils::rgba_to_rgb(rgba))),
            Err(e) => {
                warn!("Screen capture failed: {}", e);
                None
            }
        }
    }
}
