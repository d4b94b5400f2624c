use image::ImageFormat;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const SNIFF_LEN: usize = 64;

const ZIP_SIGNATURES: &[&[u8]] = &[b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];
const RAR_SIGNATURE: &[u8] = b"Rar!\x1a\x07";
const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Container format of an input file, judged by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Zip,
    Rar,
    Pdf,
    Image,
    Unknown,
}

impl FileKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            FileKind::Zip => "application/zip",
            FileKind::Rar => "application/vnd.rar",
            FileKind::Pdf => "application/pdf",
            FileKind::Image => "image/*",
            FileKind::Unknown => "application/octet-stream",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Sniffs the leading bytes of `path`. The extension is never consulted, so a
/// RAR archive named `.cbz` is still reported as [`FileKind::Rar`].
pub fn detect_file_kind(path: &Path) -> io::Result<FileKind> {
    let mut header = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(classify(&header))
}

pub fn classify(header: &[u8]) -> FileKind {
    if ZIP_SIGNATURES.iter().any(|sig| header.starts_with(sig)) {
        return FileKind::Zip;
    }
    if header.starts_with(RAR_SIGNATURE) {
        return FileKind::Rar;
    }
    if header.starts_with(PDF_SIGNATURE) {
        return FileKind::Pdf;
    }
    match image::guess_format(header) {
        Ok(
            ImageFormat::Jpeg
            | ImageFormat::Png
            | ImageFormat::Gif
            | ImageFormat::Bmp
            | ImageFormat::Tiff
            | ImageFormat::WebP,
        ) => FileKind::Image,
        _ => FileKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_classify_signatures() {
        assert_eq!(classify(b"PK\x03\x04rest"), FileKind::Zip);
        assert_eq!(classify(b"PK\x05\x06"), FileKind::Zip);
        assert_eq!(classify(b"Rar!\x1a\x07\x00"), FileKind::Rar);
        assert_eq!(classify(b"Rar!\x1a\x07\x01\x00"), FileKind::Rar);
        assert_eq!(classify(b"%PDF-1.7\n"), FileKind::Pdf);
        assert_eq!(classify(b"\xff\xd8\xff\xe0\x00\x10JFIF"), FileKind::Image);
        assert_eq!(classify(b"GIF89a"), FileKind::Image);
        assert_eq!(classify(b"plain text"), FileKind::Unknown);
        assert_eq!(classify(b""), FileKind::Unknown);
    }

    #[test]
    fn test_detect_ignores_extension() {
        let temp_dir = TempDir::new().unwrap();

        let rar_named_cbz = temp_dir.path().join("actually_rar.cbz");
        fs::write(&rar_named_cbz, b"Rar!\x1a\x07\x00payload").unwrap();
        assert_eq!(detect_file_kind(&rar_named_cbz).unwrap(), FileKind::Rar);

        let zip_named_cbr = temp_dir.path().join("actually_zip.cbr");
        fs::write(&zip_named_cbr, b"PK\x03\x04payload").unwrap();
        assert_eq!(detect_file_kind(&zip_named_cbr).unwrap(), FileKind::Zip);
    }

    #[test]
    fn test_detect_real_png() {
        let temp_dir = TempDir::new().unwrap();
        let png = temp_dir.path().join("cover.cbz");
        DynamicImage::new_rgb8(8, 8)
            .save_with_format(&png, ImageFormat::Png)
            .unwrap();
        assert_eq!(detect_file_kind(&png).unwrap(), FileKind::Image);
    }

    #[test]
    fn test_detect_empty_file_is_unknown() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty.pdf");
        fs::write(&empty, b"").unwrap();
        assert_eq!(detect_file_kind(&empty).unwrap(), FileKind::Unknown);
    }

    #[test]
    fn test_detect_missing_file() {
        assert!(detect_file_kind(Path::new("/nonexistent/file.cbz")).is_err());
    }
}
