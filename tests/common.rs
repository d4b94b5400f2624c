use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

/// A PNG with a gradient so encoders have something to chew on.
pub fn create_png(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    DynamicImage::ImageRgb8(img)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

/// Writes a cbz holding `pages` entries, each a small PNG.
pub fn create_cbz(path: &Path, pages: &[&str]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let scratch = TempDir::new().unwrap();
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for page in pages {
        let png = scratch.path().join("page.png");
        create_png(&png, 64, 96);
        writer.start_file(*page, FileOptions::default()).unwrap();
        writer.write_all(&fs::read(&png).unwrap()).unwrap();
    }
    writer.finish().unwrap();
}

/// Input library with a nested cbz, a top-level cbz and a stray text file.
pub fn create_library(root: &Path) -> Vec<PathBuf> {
    let nested = root.join("Series A").join("Issue 01.cbz");
    let top = root.join("oneshot.CBZ");
    create_cbz(&nested, &["01.png", "02.png"]);
    create_cbz(&top, &["cover.png"]);
    fs::write(root.join("readme.txt"), b"not a comic").unwrap();
    vec![nested, top]
}

pub fn create_temp_directory() -> TempDir {
    TempDir::new().unwrap()
}
