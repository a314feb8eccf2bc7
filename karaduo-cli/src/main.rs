//! Command line tools for packing, inspecting, and testing song containers.

use karaduo_core::{
    load_from_path, save_to_path, Alignment, CoreError, DurationExt, LyricsSource, PlayerConfig,
    Result, SongContainer, TrackQuery,
};
use karaduo_core::paths;
use karaduo_lyrics_lrclib::LrclibSource;
use karaduo_remote::BackendClient;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_usage();
        std::process::exit(2);
    };

    let result = match command.as_str() {
        "pack" => cmd_pack(&args[1..]),
        "inspect" => cmd_inspect(&args[1..]),
        "lyrics" => block_on(cmd_lyrics(&args[1..])),
        "check" => block_on(cmd_check()),
        "help" | "--help" | "-h" => {
            print_usage();
            return;
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn print_usage() {
    eprintln!(
        "Usage: karaduo <command>

Commands:
  pack      Assemble a song container from stems and alignment data
              --vocals <file> --instrumentals <file> [--background <file>]
              [--alignment <file.json>] [--font <file>]...
              [--title <t>] [--artist <a>] [--album <al>]
              [--output <file.ksz>]  (default: the container library)
  inspect   Print a container's contents and validate its timing data
              <file.ksz>
  lyrics    Fetch synced lyrics from LRCLIB
              <title> <artist> [duration-secs]
  check     Probe the configured separation/alignment backend
  help      Show this message"
    );
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}

/// Value of a `--name value` flag.
fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// All values of a repeatable `--name value` flag.
fn flag_all<'a>(args: &'a [String], name: &str) -> Vec<&'a str> {
    args.iter()
        .enumerate()
        .filter(|(_, a)| *a == name)
        .filter_map(|(i, _)| args.get(i + 1))
        .map(String::as_str)
        .collect()
}

fn required<'a>(args: &'a [String], name: &str) -> Result<&'a str> {
    flag(args, name).ok_or_else(|| CoreError::config(format!("missing required flag {name}")))
}

fn extension_of(path: &str, fallback: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or(fallback)
        .to_ascii_lowercase()
}

fn cmd_pack(args: &[String]) -> Result<()> {
    let vocals_path = required(args, "--vocals")?;
    let instrumentals_path = required(args, "--instrumentals")?;
    let output = match flag(args, "--output") {
        Some(path) => PathBuf::from(path),
        None => {
            // Default into the container library, named after the title
            // or the vocals file
            std::fs::create_dir_all(paths::library_dir())?;
            paths::container_path(&container_stem(flag(args, "--title"), vocals_path))
        }
    };

    let mut container = SongContainer::new();
    container.set_vocal_track(std::fs::read(vocals_path)?, extension_of(vocals_path, "wav"));
    container.set_instrumental_track(
        std::fs::read(instrumentals_path)?,
        extension_of(instrumentals_path, "wav"),
    );
    if let Some(background_path) = flag(args, "--background") {
        container.set_background_video(
            std::fs::read(background_path)?,
            extension_of(background_path, "mp4"),
        );
    }

    if let Some(alignment_path) = flag(args, "--alignment") {
        let alignment: Alignment = serde_json::from_slice(&std::fs::read(alignment_path)?)
            .map_err(|e| {
                CoreError::config(format!("unparseable alignment file {alignment_path}: {e}"))
            })?;
        container.set_alignment(alignment);
    } else {
        warn!("No alignment file given, packing without lyric timings");
    }

    for font_path in flag_all(args, "--font") {
        let family = Path::new(font_path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(font_path)
            .to_string();
        container.add_font(family, std::fs::read(font_path)?);
    }

    if let Some(title) = flag(args, "--title") {
        container.manifest.set_title(title);
    }
    if let Some(artist) = flag(args, "--artist") {
        let artists: Vec<String> = artist.split(';').map(|a| a.trim().to_string()).collect();
        container.manifest.set_artists(artists);
    }
    if let Some(album) = flag(args, "--album") {
        container.manifest.set_album(album);
    }

    save_to_path(&container, &output)?;
    println!(
        "Packed {} segment(s) into {}",
        container.alignment().segments.len(),
        output.display()
    );
    Ok(())
}

/// Library file stem for a packed container: the title when given,
/// otherwise the vocals file name. Path separators are not valid in a
/// file stem.
fn container_stem(title: Option<&str>, vocals_path: &str) -> String {
    title
        .map_or_else(
            || {
                Path::new(vocals_path)
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("song")
                    .to_string()
            },
            str::to_string,
        )
        .replace(['/', '\\'], "-")
}

fn cmd_inspect(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        return Err(CoreError::config("inspect requires a container path"));
    };
    let container = load_from_path(Path::new(path))?;
    let manifest = &container.manifest;

    println!("Container: {path}");
    println!("  Version:  {}", manifest.version);
    println!(
        "  Title:    {}",
        manifest.title.as_deref().unwrap_or("(unset)")
    );
    if let Some(artists) = &manifest.artists {
        println!("  Artists:  {}", artists.join(", "));
    }
    if let Some(album) = &manifest.album {
        println!("  Album:    {album}");
    }

    println!(
        "  Stems:    vocals={} instrumentals={}",
        asset_summary(container.vocal_track.as_deref(), &container.vocal_format),
        asset_summary(
            container.instrumental_track.as_deref(),
            &container.instrumental_format
        ),
    );
    println!(
        "  Video:    {}",
        asset_summary(container.background_video.as_deref(), &container.video_format)
    );
    if !container.fonts.is_empty() {
        let families: Vec<&str> = container.fonts.keys().map(String::as_str).collect();
        println!("  Fonts:    {}", families.join(", "));
    }

    let hints = &manifest.timing_hints;
    println!(
        "  Volumes:  vocal {}/{} instrumental {}/{} (focus control {})",
        hints.vocal_volume_focused,
        hints.vocal_volume_unfocused,
        hints.instrumental_volume_focused,
        hints.instrumental_volume_unfocused,
        if hints.use_focus_volume_control {
            "on"
        } else {
            "off"
        },
    );

    let alignment = container.alignment();
    println!(
        "  Timing:   {} segment(s), {} cached display segment(s)",
        alignment.segments.len(),
        container.display_cache().len()
    );

    let violations = alignment.invariant_violations();
    if violations.is_empty() {
        println!("  Timing data OK");
    } else {
        println!("  {} timing issue(s):", violations.len());
        for violation in violations {
            println!("    - {violation}");
        }
    }
    Ok(())
}

async fn cmd_lyrics(args: &[String]) -> Result<()> {
    let (Some(title), Some(artist)) = (args.first(), args.get(1)) else {
        return Err(CoreError::config("lyrics requires <title> <artist>"));
    };

    let config = load_config()?;
    let source = LrclibSource::new(&config.lyrics.user_agent)?;

    let mut query = TrackQuery::new(title, artist);
    if let Some(seconds) = args.get(2) {
        let seconds: u64 = seconds
            .parse()
            .map_err(|_| CoreError::config("duration must be a whole number of seconds"))?;
        query = query.with_duration(Duration::from_secs(seconds));
    }

    let lines = source.fetch(&query).await?;
    for line in lines {
        println!("[{}] {}", format_timestamp(line.start), line.text);
    }
    Ok(())
}

async fn cmd_check() -> Result<()> {
    let config = load_config()?;
    let client = BackendClient::from_store(&config.remote)?;
    if client.check().await? {
        println!("Backend at {} is ready", config.remote.backend_url);
        Ok(())
    } else {
        Err(CoreError::RemoteService {
            reason: format!("backend at {} is not ready", config.remote.backend_url),
        })
    }
}

fn load_config() -> Result<PlayerConfig> {
    match PlayerConfig::load_or_create() {
        Ok(config) => Ok(config),
        Err(CoreError::ConfigNotFound { path }) => {
            eprintln!(
                "Created a config template at {}. Edit it and rerun.",
                path.display()
            );
            std::process::exit(1);
        }
        Err(e) => Err(e),
    }
}

fn asset_summary(bytes: Option<&[u8]>, format: &str) -> String {
    match bytes {
        Some(bytes) => format!("{} bytes ({format})", bytes.len()),
        None => "absent".to_string(),
    }
}

fn format_timestamp(time: Duration) -> String {
    let total_ms = time.as_millis_u64();
    let minutes = total_ms / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let hundredths = (total_ms % 1000) / 10;
    format!("{minutes:02}:{seconds:02}.{hundredths:02}")
}
