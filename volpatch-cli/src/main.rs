use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use volpatch_core::listing;
use volpatch_core::{
    parse_batch, run, Archive, BatchInput, BatchReport, OpenMode, PatchError, PatchSettings,
    Result, WriteOrder,
};

mod encoding;

#[derive(Debug, Parser)]
#[command(
    name = "volpatch",
    version,
    about = "Read and patch view texts stored in VIEWDIR / VOL.0"
)]
struct Args {
    /// Write command output to this file instead of stdout.
    #[arg(short, long, global = true, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Also log pointer resolution details.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every directory entry as `index:offset`.
    Entries { srcdir: PathBuf },

    /// Print `offset size` for one resource.
    Span { srcdir: PathBuf, index: usize },

    /// Hex dump of a resource's text payload.
    Dump {
        srcdir: PathBuf,
        index: usize,

        /// Dump the whole resource after its 3-byte header instead.
        #[arg(long)]
        full: bool,
    },

    /// Print the text of one resource, stopping at NUL.
    Text { srcdir: PathBuf, index: usize },

    /// List `index|text` for a range of indices.
    List {
        srcdir: PathBuf,

        #[arg(long)]
        start: Option<usize>,

        #[arg(long)]
        end: Option<usize>,
    },

    /// Apply `index|text` lines from a file to VOL.0 in place.
    Apply {
        srcdir: PathBuf,

        #[arg(long, value_name = "FILE")]
        file: PathBuf,

        /// Report what would be written without touching VOL.0.
        #[arg(long)]
        dry_run: bool,

        /// Only process entries with index >= this value.
        #[arg(long)]
        start_index: Option<usize>,

        /// Only process entries with index <= this value.
        #[arg(long)]
        end_index: Option<usize>,

        /// Lay the encoded text down back to front.
        #[arg(long)]
        reverse: bool,

        /// Write a JSON report of every outcome to this file.
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct RunReport<'a> {
    settings: &'a PatchSettings,
    #[serde(flatten)]
    report: &'a BatchReport,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            Ok(Box::new(BufWriter::new(File::create(path)?)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn open_read_only(srcdir: &Path) -> Result<Archive<File>> {
    Archive::open(srcdir, OpenMode::ReadOnly)
}

fn apply(settings: &PatchSettings, report_path: Option<&Path>) -> Result<BatchReport> {
    if !settings.input_path.exists() {
        return Err(PatchError::NotFound {
            what: "input file",
            path: settings.input_path.clone(),
        });
    }

    let src = encoding::read_input(&settings.input_path)?;
    let input = BatchInput::from_parsed(parse_batch(&src), encoding::encode_cp1255);
    let report = run(settings, &input)?;

    if let Some(path) = report_path {
        let mut file = BufWriter::new(File::create(path)?);
        let run_report = RunReport {
            settings,
            report: &report,
        };
        serde_json::to_writer_pretty(&mut file, &run_report).map_err(io::Error::from)?;
        file.flush()?;
        tracing::info!(path = %path.display(), "wrote run report");
    }

    Ok(report)
}

/// Runs `args.command`. The output file is only created once the archive
/// has loaded, so a failed command leaves no empty file behind.
fn execute(args: Args) -> Result<()> {
    let output = args.output.as_deref();

    let mut out = match args.command {
        Command::Entries { srcdir } => {
            let archive = open_read_only(&srcdir)?;
            let mut out = open_output(output)?;
            listing::write_entries(archive.directory(), &mut out)?;
            out
        }
        Command::Span { srcdir, index } => {
            let span = open_read_only(&srcdir)?.resolve(index)?;
            let mut out = open_output(output)?;
            writeln!(out, "{} {}", span.offset, span.size)?;
            out
        }
        Command::Dump {
            srcdir,
            index,
            full,
        } => {
            let mut archive = open_read_only(&srcdir)?;
            let bytes = if full {
                archive.resource_body(index)?
            } else {
                archive.payload(index)?
            };
            let mut out = open_output(output)?;
            writeln!(out, "{}", hex::encode(&bytes))?;
            out
        }
        Command::Text { srcdir, index } => {
            let mut archive = open_read_only(&srcdir)?;
            let text = listing::read_text(&mut archive, index)?;
            let mut out = open_output(output)?;
            writeln!(out, "{text}")?;
            out
        }
        Command::List { srcdir, start, end } => {
            let mut archive = open_read_only(&srcdir)?;
            let mut listed = Vec::new();
            listing::list_texts(&mut archive, start, end, &mut listed)?;
            let mut out = open_output(output)?;
            out.write_all(&listed)?;
            out
        }
        Command::Apply {
            srcdir,
            file,
            dry_run,
            start_index,
            end_index,
            reverse,
            report,
        } => {
            let settings = PatchSettings {
                source_dir: srcdir,
                input_path: file,
                dry_run,
                start_index,
                end_index,
                order: if reverse {
                    WriteOrder::Reversed
                } else {
                    WriteOrder::AsGiven
                },
            };
            let summary = apply(&settings, report.as_deref())?;
            let mut out = open_output(output)?;
            writeln!(
                out,
                "Done. processed={}, ok={}, skipped={}",
                summary.processed, summary.ok, summary.skipped
            )?;
            out
        }
    };

    out.flush()?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(err) = execute(args) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_apply_flags() {
        let args = Args::try_parse_from([
            "volpatch",
            "apply",
            "game",
            "--file",
            "he.txt",
            "--dry-run",
            "--start-index",
            "4",
            "--reverse",
        ])
        .unwrap();

        match args.command {
            Command::Apply {
                srcdir,
                file,
                dry_run,
                start_index,
                end_index,
                reverse,
                report,
            } => {
                assert_eq!(srcdir, PathBuf::from("game"));
                assert_eq!(file, PathBuf::from("he.txt"));
                assert!(dry_run);
                assert_eq!(start_index, Some(4));
                assert_eq!(end_index, None);
                assert!(reverse);
                assert!(report.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn output_flag_is_global() {
        let args = Args::try_parse_from(["volpatch", "list", "game", "--end", "9", "-o", "out.txt"])
            .unwrap();
        assert_eq!(args.output, Some(PathBuf::from("out.txt")));
        assert!(matches!(
            args.command,
            Command::List {
                start: None,
                end: Some(9),
                ..
            }
        ));
    }

    #[test]
    fn apply_writes_summary_and_report() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(dir.path());
        fs::write(dir.path().join("he.txt"), "0|אב\nbad\n").unwrap();

        let settings = PatchSettings {
            source_dir: dir.path().to_path_buf(),
            input_path: dir.path().join("he.txt"),
            dry_run: false,
            start_index: None,
            end_index: None,
            order: WriteOrder::Reversed,
        };
        let report_path = dir.path().join("report.json");
        let report = apply(&settings, Some(report_path.as_path())).unwrap();

        assert_eq!((report.processed, report.ok, report.skipped), (1, 1, 1));
        let patched = fs::read(dir.path().join("VOL.0")).unwrap();
        assert_eq!(&patched[13..], &[0xE1, 0xE0, b' ', 0x00]);

        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(&report_path).unwrap()).unwrap();
        assert_eq!(json["ok"], 1);
        assert_eq!(json["outcomes"][0]["status"], "patched");
        assert_eq!(json["settings"]["order"], "reversed");
    }

    fn write_archive(dir: &Path) {
        let mut record = vec![0u8; 11];
        record[9] = 0x08;
        record.extend_from_slice(&[4, 0]);
        record.extend_from_slice(b"OLD\0");
        fs::write(dir.join("VIEWDIR"), [0u8, 0, 0]).unwrap();
        fs::write(dir.join("VOL.0"), &record).unwrap();
    }

    #[test]
    fn unmappable_text_counts_as_a_failed_index() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(dir.path());
        fs::write(dir.path().join("he.txt"), "0|\u{4E2D}\n5|\u{4E2D}\n").unwrap();

        let settings = PatchSettings {
            source_dir: dir.path().to_path_buf(),
            input_path: dir.path().join("he.txt"),
            dry_run: false,
            start_index: None,
            end_index: Some(0),
            order: WriteOrder::AsGiven,
        };
        let report = apply(&settings, None).unwrap();

        assert_eq!((report.processed, report.ok, report.skipped), (1, 0, 0));
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].index, 0);
    }

    fn execute_with(argv: &[&str]) -> Result<()> {
        execute(Args::try_parse_from(argv).unwrap())
    }

    #[test]
    fn dump_writes_lowercase_hex_to_output_file() {
        let dir = tempfile::tempdir().unwrap();
        write_archive(dir.path());
        let src = dir.path().to_str().unwrap();
        let out = dir.path().join("dumps").join("payload.txt");

        execute_with(&["volpatch", "dump", src, "0", "-o", out.to_str().unwrap()]).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "4f4c4400\n");

        let out_arg = out.to_str().unwrap();
        execute_with(&["volpatch", "apply", src, "--file", "missing.txt", "-o", out_arg])
            .unwrap_err();
        assert_eq!(fs::read_to_string(&out).unwrap(), "4f4c4400\n");
    }

    #[test]
    fn failed_command_leaves_no_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("entries.txt");

        let err = execute_with(&[
            "volpatch",
            "entries",
            dir.path().to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ])
        .unwrap_err();

        assert!(matches!(
            err,
            PatchError::NotFound {
                what: "directory table",
                ..
            }
        ));
        assert!(!out.exists());
    }
}
