//! Command line interface

use clap::{Parser, ValueEnum};
use monscan_core::MonsterSystemConfig;
use monscan_cv::MatchingMethod;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "monscan",
    about = "Periodic screen scanning for monster templates",
    after_help = "Screen capture (--screen) is only available when built with `--features screen-capture`; \
                  other builds scan image files replayed from --frames."
)]
pub struct Cli {
    /// JSON configuration file; built-in defaults when omitted
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Replay images from this folder instead of capturing the screen;
    /// required unless built with the screen-capture feature
    #[arg(long, value_name = "DIR")]
    pub frames: Option<PathBuf>,
    /// Capture the primary monitor
    #[cfg(feature = "screen-capture")]
    #[arg(long, conflicts_with = "frames")]
    pub screen: bool,
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
    /// Seconds between scans
    #[arg(long)]
    pub interval: Option<f64>,
    /// Default match threshold for categories without their own
    #[arg(long)]
    pub threshold: Option<f64>,
    #[arg(long, value_enum, default_value_t = Method::Ccoeff)]
    pub method: Method,
    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    pub dump_config: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Zero-mean normalized cross-correlation
    Ccoeff,
    /// Normalized cross-correlation
    Ccorr,
    /// OpenCV's TM_CCOEFF_NORMED
    #[cfg(feature = "opencv")]
    Opencv,
}

impl Method {
    /// Matching method for the built-in matcher; `None` for the OpenCV backend.
    pub fn matching_method(self) -> Option<MatchingMethod> {
        match self {
            Method::Ccoeff => Some(MatchingMethod::CCoeffNormed),
            Method::Ccorr => Some(MatchingMethod::CCorrNormed),
            #[cfg(feature = "opencv")]
            Method::Opencv => None,
        }
    }
}

impl Cli {
    /// Apply command line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut MonsterSystemConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(interval) = self.interval {
            config.scan_interval_secs = interval;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
    }
}
