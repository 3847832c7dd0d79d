use anyhow::{Context, Result, anyhow, bail, ensure};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// RGB color tag used when annotating detections of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    pub fn to_array(self) -> [u8; 3] {
        [self.0, self.1, self.2]
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Rgb(r, g, b)
    }
}

/// One monster category as declared in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub key: String,
    pub folder: PathBuf,
    pub color: Rgb,
    pub display_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Overrides the global threshold for this category only.
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl CategoryConfig {
    pub fn new(
        key: impl Into<String>,
        folder: impl Into<PathBuf>,
        color: impl Into<Rgb>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            folder: folder.into(),
            color: color.into(),
            display_name: display_name.into(),
            enabled: true,
            threshold: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Whole-system configuration: categories in declaration order plus the
/// detection and scheduling knobs shared by all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonsterSystemConfig {
    pub threshold: f64,
    pub scan_interval_secs: f64,
    pub fallback_delay_secs: f64,
    pub output_dir: PathBuf,
    pub overlap_threshold: f64,
    pub group_eps: f64,
    /// Clusters need more than this many raw hits to survive; 0 disables grouping.
    pub group_threshold: usize,
    pub cross_category_dedup: bool,
    pub monsters: Vec<CategoryConfig>,
}

fn default_enabled() -> bool {
    true
}

impl Default for MonsterSystemConfig {
    fn default() -> Self {
        Self {
            threshold: 0.70,
            scan_interval_secs: 10.0,
            fallback_delay_secs: 10.0,
            output_dir: "screenshots".into(),
            overlap_threshold: 0.5,
            group_eps: 0.5,
            group_threshold: 1,
            cross_category_dedup: false,
            monsters: vec![CategoryConfig::new(
                "rats 1",
                "templates/rat_1",
                (255, 0, 0),
                "Rat 1",
            )],
        }
    }
}

impl MonsterSystemConfig {
    /// Load and validate a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config to: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        check_unit("threshold", self.threshold)?;
        check_unit("overlap_threshold", self.overlap_threshold)?;
        ensure!(
            self.group_eps.is_finite() && self.group_eps >= 0.0,
            "group_eps must be a non-negative number, got {}",
            self.group_eps
        );
        ensure!(
            !self.scan_interval()?.is_zero(),
            "scan_interval_secs must be positive, got {}",
            self.scan_interval_secs
        );
        self.fallback_delay()?;

        let mut seen = HashSet::new();
        for monster in &self.monsters {
            if monster.key.trim().is_empty() {
                bail!("monster category with empty key (folder {})", monster.folder.display());
            }
            if !seen.insert(monster.key.as_str()) {
                bail!("duplicate monster category key '{}'", monster.key);
            }
            if let Some(threshold) = monster.threshold {
                check_unit(&format!("threshold of '{}'", monster.key), threshold)?;
            }
        }
        Ok(())
    }

    /// Threshold applied to a category: its override, else the global one.
    pub fn threshold_for(&self, category: &CategoryConfig) -> f64 {
        category.threshold.unwrap_or(self.threshold)
    }

    pub fn scan_interval(&self) -> Result<Duration> {
        to_duration("scan_interval_secs", self.scan_interval_secs)
    }

    pub fn fallback_delay(&self) -> Result<Duration> {
        to_duration("fallback_delay_secs", self.fallback_delay_secs)
    }
}

/// Negative, NaN and values beyond `Duration::MAX` are rejected.
fn to_duration(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow!("{} must be a representable number of seconds, got {}", name, secs))
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&value),
        "{} must be within [0, 1], got {}",
        name,
        value
    );
    Ok(())
}
