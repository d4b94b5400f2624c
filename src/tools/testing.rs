//! Test doubles for the capability traits.

use super::{
    ArchiveExtractor, ArchivePacker, ArchiveVerifier, CancelToken, ImageCrateTranscoder,
    ImageTranscoder, PdfRasterizer, Toolkit, ZipCodec,
};
use crate::error::{ImageError, ToolError};
use crate::formats::TargetFormat;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Shared, ordered record of capability calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    pub fn push(&self, call: &'static str) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| **c == call).count()
    }
}

/// Logs each call, then delegates.
pub struct Recorder<T> {
    pub inner: T,
    pub log: CallLog,
}

impl<T> Recorder<T> {
    pub fn new(inner: T, log: &CallLog) -> Self {
        Self {
            inner,
            log: log.clone(),
        }
    }
}

impl<T: ArchiveVerifier> ArchiveVerifier for Recorder<T> {
    fn verify(&self, archive: &Path) -> Result<(), ToolError> {
        self.log.push("verify");
        self.inner.verify(archive)
    }
}

impl<T: ArchiveExtractor> ArchiveExtractor for Recorder<T> {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ToolError> {
        self.log.push("extract");
        self.inner.extract(archive, dest)
    }
}

impl<T: ArchivePacker> ArchivePacker for Recorder<T> {
    fn pack(&self, root: &Path, entries: &[PathBuf], output: &Path) -> Result<(), ToolError> {
        self.log.push("pack");
        self.inner.pack(root, entries, output)
    }
}

impl<T: ImageTranscoder> ImageTranscoder for Recorder<T> {
    fn dimensions(&self, image: &Path) -> Result<(u32, u32), ImageError> {
        self.log.push("dimensions");
        self.inner.dimensions(image)
    }

    fn transcode(
        &self,
        input: &Path,
        output: &Path,
        resize: Option<(u32, u32)>,
        format: TargetFormat,
        quality: u8,
    ) -> Result<(), ImageError> {
        self.log.push("transcode");
        self.inner.transcode(input, output, resize, format, quality)
    }
}

impl<T: PdfRasterizer> PdfRasterizer for Recorder<T> {
    fn page_count(&self, pdf: &Path) -> Result<u32, ToolError> {
        self.log.push("page_count");
        self.inner.page_count(pdf)
    }

    fn rasterize_page(&self, pdf: &Path, page: u32, output: &Path) -> Result<(), ToolError> {
        self.log.push("rasterize");
        self.inner.rasterize_page(pdf, page, output)
    }

    fn finish_pages(&self, pages: &[PathBuf]) -> Result<(), ToolError> {
        self.log.push("finish");
        self.inner.finish_pages(pages)
    }
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    DynamicImage::new_rgb8(width, height)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

/// Verifier that rejects every archive.
pub struct RejectingVerifier;

impl ArchiveVerifier for RejectingVerifier {
    fn verify(&self, _archive: &Path) -> Result<(), ToolError> {
        Err(ToolError::native("7z", "Headers Error"))
    }
}

/// Stands in for unrar: writes `pages` small PNGs into the destination.
pub struct PageWriter {
    pub pages: u32,
}

impl ArchiveExtractor for PageWriter {
    fn extract(&self, _archive: &Path, dest: &Path) -> Result<(), ToolError> {
        for n in 1..=self.pages {
            write_png(&dest.join(format!("{:02}.png", n)), 40, 60);
        }
        Ok(())
    }
}

/// Stands in for poppler. `pages: None` makes page counting fail.
pub struct FakeRasterizer {
    pub pages: Option<u32>,
}

impl PdfRasterizer for FakeRasterizer {
    fn page_count(&self, _pdf: &Path) -> Result<u32, ToolError> {
        self.pages
            .ok_or_else(|| ToolError::native("pdfinfo", "Syntax Error: Couldn't find trailer"))
    }

    fn rasterize_page(&self, _pdf: &Path, _page: u32, output: &Path) -> Result<(), ToolError> {
        write_png(output, 50, 70);
        Ok(())
    }

    fn finish_pages(&self, _pages: &[PathBuf]) -> Result<(), ToolError> {
        Ok(())
    }
}

/// In-process toolkit whose every call lands in `log`.
pub fn recording_toolkit(log: &CallLog, cancel: &CancelToken) -> Toolkit {
    let zip = Arc::new(Recorder::new(ZipCodec::new(cancel.clone()), log));
    Toolkit {
        zip_verifier: zip.clone(),
        zip_extractor: zip.clone(),
        rar_extractor: Arc::new(Recorder::new(PageWriter { pages: 3 }, log)),
        rasterizer: Arc::new(Recorder::new(FakeRasterizer { pages: Some(5) }, log)),
        transcoder: Arc::new(Recorder::new(ImageCrateTranscoder, log)),
        packer: zip,
    }
}
