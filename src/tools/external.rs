//! Capabilities backed by command-line tools: 7-Zip, unrar, poppler and ImageMagick.

use super::native::optimize_png_pages;
use super::{
    ArchiveExtractor, ArchivePacker, ArchiveVerifier, ImageTranscoder, PdfRasterizer, ToolRunner,
};
use crate::constants::ZIP_COMPRESSION_LEVEL;
use crate::error::{ImageError, ToolError};
use crate::formats::TargetFormat;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

pub struct SevenZip {
    bin: String,
    runner: ToolRunner,
}

impl SevenZip {
    pub fn new(bin: &str, runner: ToolRunner) -> Self {
        Self {
            bin: bin.to_string(),
            runner,
        }
    }
}

impl ArchiveVerifier for SevenZip {
    fn verify(&self, archive: &Path) -> Result<(), ToolError> {
        self.runner
            .run(&self.bin, &[OsStr::new("t"), archive.as_os_str()], None)
            .map(|_| ())
    }
}

impl ArchiveExtractor for SevenZip {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ToolError> {
        let mut out_flag = OsString::from("-o");
        out_flag.push(dest);
        self.runner
            .run(
                &self.bin,
                &[
                    OsStr::new("x"),
                    OsStr::new("-y"),
                    out_flag.as_os_str(),
                    archive.as_os_str(),
                ],
                None,
            )
            .map(|_| ())
    }
}

impl ArchivePacker for SevenZip {
    fn pack(&self, root: &Path, entries: &[PathBuf], output: &Path) -> Result<(), ToolError> {
        let level = format!("-mx={}", ZIP_COMPRESSION_LEVEL);
        let mut args: Vec<&OsStr> = vec![
            OsStr::new("a"),
            OsStr::new("-tzip"),
            OsStr::new(&level),
            OsStr::new("--"),
            output.as_os_str(),
        ];
        args.extend(entries.iter().map(|e| e.as_os_str()));
        self.runner.run(&self.bin, &args, Some(root)).map(|_| ())
    }
}

pub struct Unrar {
    bin: String,
    runner: ToolRunner,
}

impl Unrar {
    pub fn new(bin: &str, runner: ToolRunner) -> Self {
        Self {
            bin: bin.to_string(),
            runner,
        }
    }
}

impl ArchiveExtractor for Unrar {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ToolError> {
        // unrar treats the destination as a directory only with a trailing separator
        let mut dest_dir = dest.as_os_str().to_owned();
        dest_dir.push(std::path::MAIN_SEPARATOR_STR);
        self.runner
            .run(
                &self.bin,
                &[
                    OsStr::new("x"),
                    OsStr::new("-y"),
                    OsStr::new("-idq"),
                    archive.as_os_str(),
                    dest_dir.as_os_str(),
                ],
                None,
            )
            .map(|_| ())
    }
}

pub struct Poppler {
    pdfinfo: String,
    pdftoppm: String,
    runner: ToolRunner,
}

impl Poppler {
    pub fn new(pdfinfo: &str, pdftoppm: &str, runner: ToolRunner) -> Self {
        Self {
            pdfinfo: pdfinfo.to_string(),
            pdftoppm: pdftoppm.to_string(),
            runner,
        }
    }
}

/// Reads the `Pages:` line of `pdfinfo` output.
pub fn parse_page_count(info: &str) -> Option<u32> {
    info.lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}

impl PdfRasterizer for Poppler {
    fn page_count(&self, pdf: &Path) -> Result<u32, ToolError> {
        let output = self.runner.run(&self.pdfinfo, &[pdf.as_os_str()], None)?;
        parse_page_count(&output.stdout)
            .ok_or_else(|| ToolError::native(&self.pdfinfo, "no page count in output"))
    }

    fn rasterize_page(&self, pdf: &Path, page: u32, output: &Path) -> Result<(), ToolError> {
        // pdftoppm appends the extension itself
        let prefix = output.with_extension("");
        let page = page.to_string();
        self.runner
            .run(
                &self.pdftoppm,
                &[
                    OsStr::new("-png"),
                    OsStr::new("-singlefile"),
                    OsStr::new("-f"),
                    OsStr::new(&page),
                    OsStr::new("-l"),
                    OsStr::new(&page),
                    pdf.as_os_str(),
                    prefix.as_os_str(),
                ],
                None,
            )
            .map(|_| ())
    }

    fn finish_pages(&self, pages: &[PathBuf]) -> Result<(), ToolError> {
        optimize_png_pages(pages, self.runner.cancel_token())
    }
}

pub struct ImageMagick {
    identify: String,
    convert: String,
    runner: ToolRunner,
}

impl ImageMagick {
    pub fn new(identify: &str, convert: &str, runner: ToolRunner) -> Self {
        Self {
            identify: identify.to_string(),
            convert: convert.to_string(),
            runner,
        }
    }
}

/// Parses `identify -format "%w %h"` output.
pub fn parse_dimensions(output: &str) -> Option<(u32, u32)> {
    let mut parts = output.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    if parts.next().is_some() || width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

impl ImageTranscoder for ImageMagick {
    fn dimensions(&self, image: &Path) -> Result<(u32, u32), ImageError> {
        // first frame only, so animated GIFs report one size
        let mut first_frame = image.as_os_str().to_owned();
        first_frame.push("[0]");
        let output = self.runner.run(
            &self.identify,
            &[OsStr::new("-format"), OsStr::new("%w %h"), first_frame.as_os_str()],
            None,
        )?;
        parse_dimensions(&output.stdout)
            .ok_or_else(|| ImageError::UnparsableDimensions(output.stdout.trim().to_string()))
    }

    fn transcode(
        &self,
        input: &Path,
        output: &Path,
        resize: Option<(u32, u32)>,
        _format: TargetFormat,
        quality: u8,
    ) -> Result<(), ImageError> {
        // the output extension selects the encoder
        let quality = quality.to_string();
        let geometry = resize.map(|(w, h)| format!("{}x{}>", w, h));
        let mut args: Vec<&OsStr> = vec![
            input.as_os_str(),
            OsStr::new("-quality"),
            OsStr::new(&quality),
        ];
        if let Some(geometry) = &geometry {
            args.push(OsStr::new("-resize"));
            args.push(OsStr::new(geometry));
        }
        args.push(output.as_os_str());
        self.runner.run(&self.convert, &args, None)?;
        Ok(())
    }
}
