//! abcplay - compile an ABC notation file to a Standard MIDI File
//!
//! Prints the tune header and any well-formedness diagnostics, then writes
//! the `.mid` file. Diagnostics never stop the MIDI from being written.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

mod config;

use abcseq::{compile, to_midi, Compilation};
use config::AbcplayConfig;

/// Exit code when `--check` finds diagnostics.
const EXIT_DIAGNOSTICS: u8 = 2;

#[derive(Parser)]
#[command(name = "abcplay")]
#[command(about = "Compile ABC notation to MIDI")]
#[command(version)]
struct Cli {
    /// ABC file to compile
    file: PathBuf,

    /// Where to write the MIDI file (default: FILE with a .mid extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file, replacing ./abcplay.toml
    #[arg(long, env = "ABCPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Note velocity (1-127)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=127))]
    velocity: Option<u8>,

    /// MIDI channel (0-15, 9 for GM drums)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=15))]
    channel: Option<u8>,

    /// General MIDI program for every track
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=127))]
    program: Option<u8>,

    /// Replace the tune's Q: tempo (quarter notes per minute)
    #[arg(long)]
    tempo: Option<u32>,

    /// Only check well-formedness; exit 2 if there are diagnostics
    #[arg(long)]
    check: bool,

    /// Print the note events as `pitch start duration` lines
    #[arg(long)]
    events: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let (config, sources) =
        AbcplayConfig::load_from(cli.config.as_deref()).context("Could not load configuration")?;
    init_tracing(&config.output.log_level, cli.verbose)?;
    debug!(files = ?sources.files, env = ?sources.env_overrides, "loaded config");

    let text = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("Could not read file \"{}\"", cli.file.display()))?;
    let compiled = compile(&text)
        .with_context(|| format!("Could not parse file \"{}\"", cli.file.display()))?;

    print_header(&compiled);
    println!("Checking musical piece for well-formedness....");
    print!("{}", compiled.feedback.text());

    if cli.check {
        return Ok(if compiled.feedback.is_empty() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(EXIT_DIAGNOSTICS)
        });
    }

    println!("Ticks per quarter note: {}", compiled.ticks_per_quarter);

    if cli.events {
        for event in &compiled.events {
            println!("{} {} {}", event.device_note(), event.start, event.duration);
        }
    }

    let mut params = config.midi_params();
    if let Some(velocity) = cli.velocity {
        params.velocity = velocity;
    }
    if let Some(channel) = cli.channel {
        params.channel = channel;
    }
    if cli.program.is_some() {
        params.program = cli.program;
    }
    params.tempo_override = cli.tempo;

    let output = match cli.output {
        Some(path) => path,
        None => default_output(&cli.file, config.output.directory.as_deref()),
    };
    let midi = to_midi(&compiled, &params);
    std::fs::write(&output, &midi)
        .with_context(|| format!("Could not write \"{}\"", output.display()))?;

    info!(bytes = midi.len(), path = %output.display(), "wrote midi");
    println!("Wrote {}", output.display());
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(log_level: &str, verbose: u8) -> Result<()> {
    let directive = match verbose {
        0 => log_level.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                directive
                    .parse::<Directive>()
                    .with_context(|| format!("Invalid log level \"{}\"", directive))?,
            ),
        )
        .init();
    Ok(())
}

fn print_header(compiled: &Compilation) {
    let music = &compiled.music;
    println!("Index Number: {}", music.index);
    println!("Title: {}", music.title);
    println!("Composer: {}", music.composer.as_deref().unwrap_or(""));
    println!(
        "Default Length: {}/{}",
        music.default_length.numerator, music.default_length.denominator
    );
    println!("Meter: {}/{}", music.meter.numerator, music.meter.denominator);
    println!("Tempo: {}", music.tempo);
    println!("Key: {}", music.key.code);
}

/// `input` with a .mid extension, moved into `directory` when one is set.
fn default_output(input: &Path, directory: Option<&Path>) -> PathBuf {
    let output = input.with_extension("mid");
    match (directory, output.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_next_to_input() {
        assert_eq!(
            default_output(Path::new("tunes/reel.abc"), None),
            PathBuf::from("tunes/reel.mid")
        );
    }

    #[test]
    fn test_default_output_in_directory() {
        assert_eq!(
            default_output(Path::new("tunes/reel.abc"), Some(Path::new("/tmp/out"))),
            PathBuf::from("/tmp/out/reel.mid")
        );
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from(["abcplay", "tune.abc", "--check", "-vv", "--channel", "9"]);
        assert!(cli.check);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.channel, Some(9));
        assert!(Cli::try_parse_from(["abcplay", "tune.abc", "--channel", "16"]).is_err());
    }
}
