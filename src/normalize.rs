use crate::config::NormalizeSettings;
use crate::constants::IMAGE_EXTENSIONS;
use crate::error::ImageError;
use crate::tools::ImageTranscoder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Result of normalizing one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeOutcome {
    Converted { output: PathBuf, resized: bool },
    /// Zero-length file; deleted and not counted.
    SkippedEmpty,
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Every raster image under `root`, sorted, skipping anything under `exclude`.
pub fn collect_images(root: &Path, exclude: Option<&Path>) -> io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !exclude.is_some_and(|ex| e.path().starts_with(ex)));
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() && is_image_file(entry.path()) {
            images.push(entry.into_path());
        }
    }
    images.sort();
    Ok(images)
}

/// Largest size inside `max_width`×`max_height` with the aspect ratio kept.
///
/// Returns `None` when the image already fits; images are never upscaled.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    if width <= max_width && height <= max_height {
        return None;
    }
    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, max_width);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, max_height);
    Some((new_width, new_height))
}

/// Picks `<stem>.<ext>` next to `source`, adding `_1`, `_2`… if another file holds it.
pub fn output_path_for(source: &Path, extension: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    let candidate = source.with_file_name(format!("{}.{}", stem, extension));
    if candidate == source || !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| source.with_file_name(format!("{}_{}.{}", stem, n, extension)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Converts page images to the target format, downscaling oversized ones.
pub struct ImageNormalizer<'a> {
    transcoder: &'a dyn ImageTranscoder,
    settings: NormalizeSettings,
}

impl<'a> ImageNormalizer<'a> {
    pub fn new(transcoder: &'a dyn ImageTranscoder, settings: NormalizeSettings) -> Self {
        Self {
            transcoder,
            settings,
        }
    }

    /// Replaces `image` with its normalized version.
    ///
    /// The source is deleted only once the output exists; on failure the
    /// source stays in place and any partial output is removed.
    pub fn normalize(&self, image: &Path) -> Result<NormalizeOutcome, ImageError> {
        if fs::metadata(image)?.len() == 0 {
            fs::remove_file(image)?;
            return Ok(NormalizeOutcome::SkippedEmpty);
        }

        let (width, height) = self.transcoder.dimensions(image)?;
        let resize = fit_within(
            width,
            height,
            self.settings.max_width,
            self.settings.max_height,
        )
        .map(|_| (self.settings.max_width, self.settings.max_height));

        let extension = self.settings.format.extension();
        let output = output_path_for(image, extension);
        // a page already in the target format is written beside itself first
        let staged = if output == image {
            image.with_file_name(format!(
                ".{}.partial.{}",
                image.file_stem().unwrap_or_default().to_string_lossy(),
                extension
            ))
        } else {
            output.clone()
        };

        let result = self.transcoder.transcode(
            image,
            &staged,
            resize,
            self.settings.format,
            self.settings.quality,
        );
        if let Err(e) = result {
            let _ = fs::remove_file(&staged);
            return Err(e);
        }
        if !staged.is_file() {
            return Err(ImageError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("transcoder produced no output at {}", staged.display()),
            )));
        }

        if staged == output {
            fs::remove_file(image)?;
        } else {
            fs::rename(&staged, &output)?;
        }

        Ok(NormalizeOutcome::Converted {
            output,
            resized: resize.is_some(),
        })
    }
}
