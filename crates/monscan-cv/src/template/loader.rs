//! Template loading from per-category asset folders

use super::Template;
use crate::Result;
use crate::utils::image::ImageUtils;
use anyhow::{Context, bail};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Loads every supported image in a folder as a template
pub struct TemplateLoader {
    supported_extensions: Vec<String>,
}

impl TemplateLoader {
    /// Create new template loader
    pub fn new() -> Self {
        Self {
            supported_extensions: vec![
                "png".to_string(),
                "jpg".to_string(),
                "jpeg".to_string(),
                "bmp".to_string(),
                "tiff".to_string(),
            ],
        }
    }

    /// Whether the file extension is one we decode (case-insensitive)
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.supported_extensions.contains(&ext))
    }

    /// Load all templates of one category, in file name order.
    ///
    /// A missing or unreadable folder is an error. Individual files that fail
    /// to decode are skipped with a warning.
    pub fn load_category<P: AsRef<Path>>(&self, folder: P, display_name: &str) -> Result<Vec<Template>> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            bail!("Template folder not found: {}", folder.display());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(folder)
            .with_context(|| format!("Failed to read directory: {:?}", folder))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && self.is_supported(path))
            .collect();
        paths.sort();

        let mut templates = Vec::with_capacity(paths.len());
        for path in paths {
            match self.load_file(&path, display_name) {
                Ok(template) => {
                    debug!("{} loaded ({})", template.name, template.filename);
                    templates.push(template);
                }
                Err(e) => warn!("Error loading {}: {:#}", path.display(), e),
            }
        }

        info!(
            "Total: {} templates loaded for {}",
            templates.len(),
            display_name
        );
        Ok(templates)
    }

    /// Load a single template file
    pub fn load_file(&self, path: &Path, display_name: &str) -> Result<Template> {
        let image = ImageUtils::load_rgb(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(
            Template::new(format!("{}_{}", display_name, title_case(&stem)), image)
                .with_source(filename, stem.to_lowercase()),
        )
    }
}

impl Default for TemplateLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}
