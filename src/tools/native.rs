//! In-process capabilities: zip via the `zip` crate, page decoding and JPEG via
//! `image`, lossy WebP via `webp`, PNG re-encoding via `oxipng`.

use super::{ArchiveExtractor, ArchivePacker, ArchiveVerifier, CancelToken, ImageTranscoder};
use crate::constants::{PDF_PAGE_OPTIMIZE_PRESET, ZIP_COMPRESSION_LEVEL};
use crate::error::{ImageError, ToolError};
use crate::formats::TargetFormat;
use crate::normalize::fit_within;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use oxipng::{InFile, Options, OutFile};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

const ZIP_TOOL: &str = "zip";
const IMAGE_TOOL: &str = "image";
const OXIPNG_TOOL: &str = "oxipng";
const WEBP_TOOL: &str = "webp";

/// Zip verification, extraction and deterministic packing.
pub struct ZipCodec {
    cancel: CancelToken,
}

impl ZipCodec {
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }

    fn check_cancelled(&self) -> Result<(), ToolError> {
        if self.cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                tool: ZIP_TOOL.to_string(),
            });
        }
        Ok(())
    }

    fn open(&self, archive: &Path) -> Result<ZipArchive<BufReader<File>>, ToolError> {
        let file = File::open(archive).map_err(|source| ToolError::Io {
            tool: ZIP_TOOL.to_string(),
            source,
        })?;
        ZipArchive::new(BufReader::new(file)).map_err(|e| ToolError::native(ZIP_TOOL, e))
    }
}

impl ArchiveVerifier for ZipCodec {
    fn verify(&self, archive: &Path) -> Result<(), ToolError> {
        let mut zip = self.open(archive)?;
        for index in 0..zip.len() {
            self.check_cancelled()?;
            let mut entry = zip
                .by_index(index)
                .map_err(|e| ToolError::native(ZIP_TOOL, e))?;
            // reading to the end checks the CRC
            io::copy(&mut entry, &mut io::sink())
                .map_err(|e| ToolError::native(ZIP_TOOL, format!("entry {}: {}", index, e)))?;
        }
        Ok(())
    }
}

impl ArchiveExtractor for ZipCodec {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ToolError> {
        self.check_cancelled()?;
        let mut zip = self.open(archive)?;
        zip.extract(dest).map_err(|e| ToolError::native(ZIP_TOOL, e))
    }
}

/// `a/b/c.webp`, whatever the host separator.
fn entry_name(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

impl ArchivePacker for ZipCodec {
    fn pack(&self, root: &Path, entries: &[PathBuf], output: &Path) -> Result<(), ToolError> {
        let io_err = |source: io::Error| ToolError::Io {
            tool: ZIP_TOOL.to_string(),
            source,
        };

        let mut sorted: Vec<&PathBuf> = entries.iter().collect();
        sorted.sort();

        let file = File::create(output).map_err(io_err)?;
        let mut writer = ZipWriter::new(BufWriter::new(file));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(ZIP_COMPRESSION_LEVEL))
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);

        for relative in sorted {
            self.check_cancelled()?;
            let name = entry_name(relative).ok_or_else(|| {
                ToolError::native(ZIP_TOOL, format!("invalid entry path {}", relative.display()))
            })?;
            writer
                .start_file(name, options)
                .map_err(|e| ToolError::native(ZIP_TOOL, e))?;
            let mut source = File::open(root.join(relative)).map_err(io_err)?;
            io::copy(&mut source, &mut writer).map_err(io_err)?;
        }

        let mut inner = writer.finish().map_err(|e| ToolError::native(ZIP_TOOL, e))?;
        inner.flush().map_err(io_err)?;
        Ok(())
    }
}

/// Page transcoding with the `image` crate, handing WebP output to libwebp.
pub struct ImageCrateTranscoder;

fn image_err(e: image::ImageError) -> ImageError {
    ImageError::Tool(ToolError::native(IMAGE_TOOL, e))
}

impl ImageTranscoder for ImageCrateTranscoder {
    fn dimensions(&self, image: &Path) -> Result<(u32, u32), ImageError> {
        image::image_dimensions(image).map_err(image_err)
    }

    fn transcode(
        &self,
        input: &Path,
        output: &Path,
        resize: Option<(u32, u32)>,
        format: TargetFormat,
        quality: u8,
    ) -> Result<(), ImageError> {
        let img = ImageReader::open(input)?
            .with_guessed_format()?
            .decode()
            .map_err(image_err)?;

        let img = match resize.and_then(|(max_w, max_h)| {
            fit_within(img.width(), img.height(), max_w, max_h)
        }) {
            Some((w, h)) => img.resize_exact(w, h, image::imageops::FilterType::Lanczos3),
            None => img,
        };

        let mut writer = BufWriter::new(File::create(output)?);
        match format {
            TargetFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
                rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
                    .map_err(image_err)?;
            }
            TargetFormat::WebP => {
                let rgba = img.to_rgba8();
                let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
                    .encode_simple(false, f32::from(quality))
                    .map_err(|e| {
                        ImageError::Tool(ToolError::native(WEBP_TOOL, format!("{:?}", e)))
                    })?;
                writer.write_all(&encoded)?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

/// Re-encodes rasterized pages in place at a fixed oxipng preset.
pub fn optimize_png_pages(pages: &[PathBuf], cancel: &CancelToken) -> Result<(), ToolError> {
    let mut options = Options::from_preset(PDF_PAGE_OPTIMIZE_PRESET);
    options.force = true;

    for page in pages {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                tool: OXIPNG_TOOL.to_string(),
            });
        }
        if fs::metadata(page).map(|m| m.len()).unwrap_or(0) == 0 {
            continue;
        }
        let input = InFile::Path(page.clone());
        let out = OutFile::Path {
            path: None,
            preserve_attrs: false,
        };
        oxipng::optimize(&input, &out, &options)
            .map_err(|e| ToolError::native(OXIPNG_TOOL, format!("{}: {}", page.display(), e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat};
    use std::io::Read;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        DynamicImage::new_rgb8(width, height)
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    #[test]
    fn test_entry_name_uses_forward_slashes() {
        assert_eq!(
            entry_name(Path::new("chapter 1/page1.webp")),
            Some("chapter 1/page1.webp".to_string())
        );
        assert_eq!(entry_name(Path::new("../escape.webp")), None);
        assert_eq!(entry_name(Path::new("")), None);
    }

    #[test]
    fn test_zip_pack_verify_extract() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("root");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("b.webp"), b"bbb").unwrap();
        fs::write(root.join("sub").join("a.webp"), b"aaa").unwrap();

        let codec = ZipCodec::new(CancelToken::new());
        let archive = temp_dir.path().join("out.cbz");
        codec
            .pack(
                &root,
                &[PathBuf::from("sub/a.webp"), PathBuf::from("b.webp")],
                &archive,
            )
            .unwrap();

        codec.verify(&archive).unwrap();

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["b.webp", "sub/a.webp"]);

        let dest = temp_dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        codec.extract(&archive, &dest).unwrap();
        let mut content = String::new();
        File::open(dest.join("sub").join("a.webp"))
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "aaa");
    }

    #[test]
    fn test_zip_pack_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("p1.webp"), b"one").unwrap();
        fs::write(temp_dir.path().join("p2.webp"), b"two").unwrap();
        let codec = ZipCodec::new(CancelToken::new());
        let entries = [PathBuf::from("p2.webp"), PathBuf::from("p1.webp")];

        let first = temp_dir.path().join("first.zip");
        let second = temp_dir.path().join("second.zip");
        codec.pack(temp_dir.path(), &entries, &first).unwrap();
        codec.pack(temp_dir.path(), &entries, &second).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn test_zip_verify_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let bogus = temp_dir.path().join("bogus.cbz");
        fs::write(&bogus, b"PK\x03\x04 this is not really a zip").unwrap();

        let err = ZipCodec::new(CancelToken::new()).verify(&bogus).unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn test_image_transcoder_downscales() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("page.png");
        write_png(&input, 3000, 2000);

        let output = temp_dir.path().join("page.jpg");
        ImageCrateTranscoder
            .transcode(&input, &output, Some((1366, 1366)), TargetFormat::Jpeg, 75)
            .unwrap();

        let img = image::open(&output).unwrap();
        assert_eq!(img.dimensions(), (1366, 911));
    }

    #[test]
    fn test_image_transcoder_webp_keeps_small_images() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("page.png");
        write_png(&input, 400, 600);

        let output = temp_dir.path().join("page.webp");
        ImageCrateTranscoder
            .transcode(&input, &output, Some((1366, 1366)), TargetFormat::WebP, 75)
            .unwrap();

        assert_eq!(ImageCrateTranscoder.dimensions(&output).unwrap(), (400, 600));
    }

    #[test]
    fn test_webp_quality_changes_output() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("page.png");
        let img = image::RgbImage::from_fn(600, 900, |x, y| {
            image::Rgb([(x % 251) as u8, (y % 241) as u8, ((x * y) % 239) as u8])
        });
        DynamicImage::ImageRgb8(img)
            .save_with_format(&input, ImageFormat::Png)
            .unwrap();

        let low = temp_dir.path().join("low.webp");
        let high = temp_dir.path().join("high.webp");
        ImageCrateTranscoder
            .transcode(&input, &low, None, TargetFormat::WebP, 5)
            .unwrap();
        ImageCrateTranscoder
            .transcode(&input, &high, None, TargetFormat::WebP, 100)
            .unwrap();

        let low_size = fs::metadata(&low).unwrap().len();
        let high_size = fs::metadata(&high).unwrap().len();
        assert!(low_size < high_size, "q5={} q100={}", low_size, high_size);
        assert_eq!(ImageCrateTranscoder.dimensions(&low).unwrap(), (600, 900));
    }

    #[test]
    fn test_image_transcoder_rejects_non_image() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("page.png");
        fs::write(&input, b"definitely not a png").unwrap();

        let result = ImageCrateTranscoder.dimensions(&input);
        assert!(result.is_err());
    }

    #[test]
    fn test_optimize_png_pages_keeps_pages_valid() {
        let temp_dir = TempDir::new().unwrap();
        let page = temp_dir.path().join("page_001.png");
        write_png(&page, 64, 32);

        optimize_png_pages(&[page.clone()], &CancelToken::new()).unwrap();
        assert_eq!(image::image_dimensions(&page).unwrap(), (64, 32));
    }

    #[test]
    fn test_optimize_png_pages_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let result = optimize_png_pages(&[PathBuf::from("x.png")], &token);
        assert!(matches!(result, Err(ToolError::Cancelled { .. })));
    }
}
