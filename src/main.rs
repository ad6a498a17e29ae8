mod cli;

use adbridge::{config, AdBreak, Timeline};
use adbridge_common::{AdBreakPosition, PlaybackMode};
use adbridge_media::emsg::parse_emsg;
use adbridge_media::id3::parse_tag;
use adbridge_media::{extract_record, DateRangeSignal, MetadataSynthesizer, TagPayload};

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "adbridge=trace,adbridge_media=trace,adbridge_common=debug".to_string()
        } else {
            "adbridge=info,adbridge_media=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::ParseTag { file, json } => parse_tag_file(&file, json),
        Commands::MapTime {
            breaks,
            mode,
            reverse,
            times,
        } => map_time(&breaks, mode, reverse, &times),
        Commands::Synthesize {
            id,
            start,
            end,
            duration,
        } => synthesize(id, start, end, duration, cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("adbridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn parse_tag_file(file: &std::path::Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }
    let data = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;

    let (kind, payload, detail, presentation) = if data.starts_with(b"ID3") {
        let tag = parse_tag(&data).context("Invalid ID3 tag")?;
        let detail = serde_json::to_value(&tag)?;
        ("id3", TagPayload::Id3(Bytes::from(data)), detail, None)
    } else {
        let message = parse_emsg(&data).context("Neither an ID3 tag nor an emsg box")?;
        let detail = serde_json::to_value(&message)?;
        let presentation = Some(message.presentation_secs());
        ("emsg", TagPayload::Emsg(Bytes::from(data)), detail, presentation)
    };

    let record = extract_record(&payload)?;

    if json {
        let out = serde_json::json!({
            "kind": kind,
            "parsed": detail,
            "record": record,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Kind: {}", kind);
    if let Some(secs) = presentation {
        println!("Presentation: {:.3}s", secs);
    }
    match record {
        Some(record) => {
            println!("Media ID: {}", record.media_id);
            println!("Sequence: {}", record.sequence);
            println!("Type: {}", record.kind);
            println!("Duration: {}s", record.duration);
        }
        None => println!("No ad record (generic metadata)"),
    }
    Ok(())
}

fn map_time(breaks: &[(f64, f64)], mode: PlaybackMode, reverse: bool, times: &[f64]) -> Result<()> {
    let breaks = breaks
        .iter()
        .map(|&(start, duration)| AdBreak::new(start, duration, AdBreakPosition::Midroll))
        .collect();
    let timeline = Timeline::new(mode, breaks);

    println!("Mode: {}", mode);
    for part in timeline.parts() {
        println!(
            "  break {:>9.3} .. {:<9.3} scheduled at content {:.3}",
            part.start, part.end, part.ad_break.schedule_time
        );
    }

    for &time in times {
        if reverse {
            println!("content {:>9.3} -> absolute {:.3}", time, timeline.to_absolute_time(time));
        } else {
            let in_break = timeline.part_at(time).is_some();
            println!(
                "absolute {:>9.3} -> content {:.3}{}",
                time,
                timeline.to_content_time(time),
                if in_break { " (in ad break)" } else { "" }
            );
        }
    }
    Ok(())
}

fn synthesize(
    id: String,
    start: f64,
    end: Option<f64>,
    duration: Option<f64>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let signal = DateRangeSignal {
        id,
        start,
        end,
        duration,
        ..Default::default()
    };
    if signal.end_time().is_none() {
        anyhow::bail!("A date range needs --end or --duration past its start");
    }

    let mut synthesizer = MetadataSynthesizer::new(config.synthesizer);
    synthesizer.ingest(&signal);

    for marker in synthesizer.pending() {
        let pairs: Vec<String> = marker
            .record
            .to_pairs()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        println!("{:>10.3}  {}  {}", marker.time, marker.record.kind, pairs.join(" "));
    }
    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::BridgeConfig::default()
        }
    };

    println!("  Ad immunity: {}s", config.immunity.duration);
    println!(
        "    Check offset: {}s",
        config.immunity.ad_break_check_offset
    );
    println!(
        "    Disable passed breaks: {}",
        config.immunity.disable_passed_ad_breaks
    );
    println!("  Rewind tolerance: {}s", config.rewind_tolerance);
    println!("  Date range emulation: {}", config.date_range_emulation);
    for warning in config.warnings() {
        println!("  ! {}", warning);
    }

    Ok(())
}
