pub const DEFAULT_QUALITY: u8 = 75;
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

pub const DEFAULT_MAX_WIDTH: u32 = 1366;
pub const DEFAULT_MAX_HEIGHT: u32 = 1366;

/// Upper bound on the worker pool, whatever the core count.
pub const MAX_WORKERS: usize = 8;

/// Name of the output directory created inside the input root when no
/// output directory is given.
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "salida";

pub const ARCHIVE_EXTENSION: &str = "cbz";
pub const COMIC_EXTENSIONS: &[&str] = &["cbz", "cbr", "pdf"];
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp", "gif",
];

/// Directory inside a workspace that holds safe copies of input archives.
pub const STAGING_DIR_NAME: &str = "_cbz_staging";
pub const WORKSPACE_PREFIX: &str = "comic-squeeze-";
pub const PARTIAL_SUFFIX: &str = "partial";

pub const JUNK_DIR_NAMES: &[&str] = &["__MACOSX"];
pub const JUNK_FILE_PATTERNS: &[&str] = &[
    ".DS_Store",
    "._*",
    "Thumbs.db",
    "desktop.ini",
    "*.db",
    "*.txt",
    "*.url",
    "*.lnk",
    "*.sfv",
    "*.md5",
    "*.nfo",
];

pub const PDF_PAGE_PREFIX: &str = "page_";
/// oxipng preset used when re-encoding rasterized PDF pages.
pub const PDF_PAGE_OPTIMIZE_PRESET: u8 = 2;

pub const ZIP_COMPRESSION_LEVEL: i32 = 9;

pub const DEFAULT_SEVEN_ZIP_BIN: &str = "7z";
pub const DEFAULT_IDENTIFY_BIN: &str = "identify";
pub const DEFAULT_CONVERT_BIN: &str = "convert";
pub const DEFAULT_UNRAR_BIN: &str = "unrar";
pub const DEFAULT_PDFTOPPM_BIN: &str = "pdftoppm";
pub const DEFAULT_PDFINFO_BIN: &str = "pdfinfo";

/// How often a running external tool is polled for exit, timeout or cancellation.
pub const TOOL_POLL_INTERVAL_MS: u64 = 20;
/// Trailing bytes of a failed tool's stderr kept for the error message.
pub const STDERR_TAIL_BYTES: usize = 512;

/// Width reserved for file names in progress lines.
pub const NAME_COLUMN_WIDTH: usize = 55;
pub const STAGE_COLUMN_WIDTH: usize = 10;

pub const PROGRESS_BAR_TEMPLATE: &str =
    "{prefix} [{bar:40.magenta/blue}] {pos}/{len} [{elapsed_precise}<{eta_precise}, {per_sec}]";
pub const IMAGE_BAR_TEMPLATE: &str =
    "{prefix} |{bar:30.cyan/blue}| {pos}/{len} {msg}";
pub const PROGRESS_CHARS: &str = "=>-";
