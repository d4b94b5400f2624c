use crate::config::Engine;
use crate::formats::TargetFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "comic-squeeze",
    about = "Batch-convert CBZ, CBR and PDF comics into compact CBZ archives",
    long_about = "comic-squeeze walks a comic library, extracts every CBZ, CBR and PDF it finds, \
                  re-encodes the pages to WebP or JPEG (downscaling oversized ones) and repacks \
                  them as CBZ files in a mirrored output tree. Files whose output already exists \
                  are skipped, so interrupted runs can simply be restarted.",
    version,
    after_help = "EXAMPLES:\n  \
    comic-squeeze convert ~/Comics\n  \
    comic-squeeze convert ~/Comics /mnt/tablet/comics -q 80 -w 1600 -H 2560\n  \
    comic-squeeze convert ./library ./out -f jpeg -j 4 --timeout 300\n  \
    comic-squeeze convert ./library --engine native"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Convert every comic under a directory",
        long_about = "Recursively convert every .cbz, .cbr and .pdf file under INPUT_DIR. \
                      Output goes to OUTPUT_DIR (default: INPUT_DIR/salida), mirroring the \
                      input directory structure. Per-file failures are reported and counted \
                      but never stop the run."
    )]
    Convert {
        #[arg(help = "Directory holding the comics to convert")]
        input: PathBuf,

        #[arg(
            help = "Output directory (default: <INPUT_DIR>/salida)",
            long_help = "Directory that receives the converted archives. Existing archives \
                         in it are treated as already converted."
        )]
        output: Option<PathBuf>,

        #[arg(
            short = 'q',
            long,
            help = "Page quality (1-100, default: 75)",
            long_help = "Encoder quality for re-encoded pages, from 1 (smallest) to 100 (best). \
                         Applies to both WebP and JPEG output on either engine."
        )]
        quality: Option<u8>,

        #[arg(
            short = 'w',
            long = "max-width",
            help = "Maximum page width in pixels (default: 1366)",
            long_help = "Pages wider than this are downscaled, keeping their aspect ratio. \
                         Smaller pages are never upscaled."
        )]
        max_width: Option<u32>,

        #[arg(
            short = 'H',
            long = "max-height",
            help = "Maximum page height in pixels (default: 1366)",
            long_help = "Pages taller than this are downscaled, keeping their aspect ratio."
        )]
        max_height: Option<u32>,

        #[arg(
            short = 'f',
            long,
            help = "Page format (webp, jpeg; default: webp)"
        )]
        format: Option<TargetFormat>,

        #[arg(
            short = 'j',
            long,
            help = "Number of files converted in parallel (default: cores - 1, at most 8)"
        )]
        jobs: Option<usize>,

        #[arg(
            long,
            value_name = "SECS",
            help = "Kill any external tool that runs longer than this",
            long_help = "Upper bound in seconds for a single external tool invocation. \
                         A tool that exceeds it is killed and its file fails as timed out. \
                         0 or unset means no limit."
        )]
        timeout: Option<u64>,

        #[arg(
            long = "scratch-dir",
            value_name = "DIR",
            help = "Where per-file workspaces are created (default: system temp dir)"
        )]
        scratch_dir: Option<PathBuf>,

        #[arg(
            long,
            value_enum,
            default_value_t = Engine::External,
            help = "Codec implementation to use"
        )]
        engine: Engine,

        #[arg(
            long = "unrar-bin",
            value_name = "NAME",
            help = "Name or path of the RAR extractor (default: unrar)"
        )]
        unrar_bin: Option<String>,

        #[arg(long, conflicts_with = "verbose", help = "Only print errors and the final report")]
        quiet: bool,

        #[arg(long, help = "Log every external command and per-file details")]
        verbose: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_minimal_convert() {
        let args = Args::try_parse_from(["comic-squeeze", "convert", "/comics"]).unwrap();
        let Commands::Convert {
            input,
            output,
            quality,
            format,
            engine,
            ..
        } = args.command;
        assert_eq!(input, PathBuf::from("/comics"));
        assert_eq!(output, None);
        assert_eq!(quality, None);
        assert_eq!(format, None);
        assert_eq!(engine, Engine::External);
    }

    #[test]
    fn test_parse_full_convert() {
        let args = Args::try_parse_from([
            "comic-squeeze",
            "convert",
            "/comics",
            "/out",
            "-q",
            "60",
            "-w",
            "1200",
            "-H",
            "1800",
            "-f",
            "jpeg",
            "-j",
            "3",
            "--timeout",
            "30",
            "--engine",
            "native",
            "--unrar-bin",
            "unrar-free",
        ])
        .unwrap();
        let Commands::Convert {
            output,
            quality,
            max_width,
            max_height,
            format,
            jobs,
            timeout,
            engine,
            unrar_bin,
            ..
        } = args.command;
        assert_eq!(output, Some(PathBuf::from("/out")));
        assert_eq!(quality, Some(60));
        assert_eq!(max_width, Some(1200));
        assert_eq!(max_height, Some(1800));
        assert_eq!(format, Some(TargetFormat::Jpeg));
        assert_eq!(jobs, Some(3));
        assert_eq!(timeout, Some(30));
        assert_eq!(engine, Engine::Native);
        assert_eq!(unrar_bin.as_deref(), Some("unrar-free"));
    }

    #[test]
    fn test_rejects_unknown_format() {
        let result = Args::try_parse_from(["comic-squeeze", "convert", "/comics", "-f", "png"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        let result =
            Args::try_parse_from(["comic-squeeze", "convert", "/comics", "--quiet", "--verbose"]);
        assert!(result.is_err());
    }
}
