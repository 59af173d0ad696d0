use clap::{Parser, Subcommand};
use env_logger::Env;
use ringbuf::traits::Consumer;
use scoresync::engine::{ClockEngine, HeadlessRenderer, SystemClock};
use scoresync::messaging::NotificationLevel;
use scoresync::playback::{CursorUpdate, FrameOutcome};
use scoresync::score::{MeteredLayout, TimeSignature};
use scoresync::sync::{BarTickMap, MarkerStore, PositionResolver, Resolution};
use scoresync::workspace::{ChannelSet, Mode, Workspace};
use scoresync::{Embed, InterchangeDocument, ProjectStore, SyncConfig, SyncError, SyncResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// ~60 frames per second
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Align scores with recordings and play them back in sync
#[derive(Parser)]
#[command(name = "scoresync")]
#[command(version, about = "Score/audio synchronization toolkit")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a sync document in real time and print cursor moves
    Preview {
        /// Interchange document (.json)
        document: PathBuf,
        /// Score file, when the document does not embed it
        #[arg(long)]
        score: Option<PathBuf>,
        /// Audio file, when the document does not embed it
        #[arg(long)]
        audio: Option<PathBuf>,
        /// Meter used to lay out every bar
        #[arg(long, default_value = "4/4")]
        meter: TimeSignature,
        /// Lead offset in seconds (negative trails the audio)
        #[arg(long, allow_hyphen_values = true)]
        lead: Option<f64>,
        /// Playback rate multiplier
        #[arg(long)]
        rate: Option<f64>,
        /// Restart from the beginning at the end of the audio
        #[arg(long = "loop")]
        looping: bool,
    },

    /// Print the markers of a sync document and resolve times against them
    Inspect {
        /// Interchange document (.json)
        document: PathBuf,
        /// Times (seconds) to resolve
        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        at: Vec<f64>,
        /// Meter used to lay out every bar
        #[arg(long, default_value = "4/4")]
        meter: TimeSignature,
        /// Lead offset in seconds
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        lead: f64,
    },

    /// List saved projects, most recent first
    List,

    /// Export a saved project as an interchange document
    Export {
        id: String,
        output: PathBuf,
        /// Embed score and audio in the document
        #[arg(long)]
        inline: bool,
    },

    /// Delete a saved project
    Delete { id: String },
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> SyncResult<()> {
    let config = match &cli.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::load_or_default(),
    };

    match cli.command {
        Commands::Preview {
            document,
            score,
            audio,
            meter,
            lead,
            rate,
            looping,
        } => {
            let mut config = config;
            if let Some(lead) = lead {
                config.preview_lead_offset = lead;
            }
            if let Some(rate) = rate {
                config.default_rate = rate;
            }
            config.looping |= looping;
            preview(
                config,
                &document,
                score.as_deref(),
                audio.as_deref(),
                meter,
            )
        }
        Commands::Inspect {
            document,
            at,
            meter,
            lead,
        } => inspect(&document, &at, meter, lead),
        Commands::List => list(&open_store(&config)?),
        Commands::Export { id, output, inline } => {
            let store = open_store(&config)?;
            let project = store.load(&id)?;
            let embed = if inline {
                Embed::Inline
            } else {
                Embed::References
            };
            InterchangeDocument::from_project(&project, embed).write_to(&output)?;
            println!("Exported '{}' to {}", project.title, output.display());
            Ok(())
        }
        Commands::Delete { id } => {
            open_store(&config)?.delete(&id)?;
            println!("Deleted {}", id);
            Ok(())
        }
    }
}

fn open_store(config: &SyncConfig) -> SyncResult<ProjectStore> {
    let dir = config
        .resolved_store_dir()
        .ok_or_else(|| SyncError::Storage("No data directory available".to_string()))?;
    ProjectStore::open(dir)
}

fn read_media(path: Option<&Path>) -> SyncResult<Option<Vec<u8>>> {
    path.map(|p| {
        fs::read(p)
            .map_err(|e| SyncError::Storage(format!("Failed to read {}: {}", p.display(), e)))
    })
    .transpose()
}

fn preview(
    config: SyncConfig,
    document: &Path,
    score: Option<&Path>,
    audio: Option<&Path>,
    meter: TimeSignature,
) -> SyncResult<()> {
    let doc = InterchangeDocument::read_from(document)?;
    let layout = MeteredLayout::uniform(doc.total_bars, meter);
    let score_bytes = read_media(score)?;
    let audio_bytes = read_media(audio)?;

    let mut channels = ChannelSet::new(&config);
    let engine = ClockEngine::new(SystemClock::new(), channels.audio_events);
    let renderer = HeadlessRenderer::new(layout, channels.renderer_events);
    let mut workspace = Workspace::new(Mode::Preview, config, engine, renderer, channels.workspace)?;

    println!("{} - {}", doc.title, doc.artist);
    workspace.import(doc, score_bytes, audio_bytes)?;
    workspace.pump_events();
    print_notifications(&mut channels.notifications);

    workspace.stop();
    workspace.play()?;

    loop {
        thread::sleep(FRAME_INTERVAL);
        workspace.controller_mut().audio_mut().poll();

        match workspace.frame() {
            FrameOutcome::Tracked(Some(update)) => {
                print_update(workspace.current_time(), &update)
            }
            FrameOutcome::Looped => println!("-- loop --"),
            FrameOutcome::Finished => break,
            FrameOutcome::Tracked(None) => {}
            FrameOutcome::Idle => break,
        }
        print_notifications(&mut channels.notifications);
    }

    println!("Finished");
    Ok(())
}

fn print_update(time: f64, update: &CursorUpdate) {
    match update {
        CursorUpdate::Start(tick) => println!("{:>8.3}s  start        tick {:>6}", time, tick),
        CursorUpdate::At(pos) => println!(
            "{:>8.3}s  bar {:>4} {:>5.1}%  tick {:>6}",
            time,
            pos.bar,
            pos.progress * 100.0,
            pos.position
        ),
    }
}

fn print_notifications(notifications: &mut scoresync::messaging::NotificationConsumer) {
    while let Some(notification) = notifications.try_pop() {
        let tag = match notification.level {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        println!("[{}] {}", tag, notification.message);
    }
}

fn inspect(document: &Path, at: &[f64], meter: TimeSignature, lead: f64) -> SyncResult<()> {
    let doc = InterchangeDocument::read_from(document)?;
    let markers = MarkerStore::from_markers(doc.markers.clone())?;
    let layout = MeteredLayout::uniform(doc.total_bars, meter);
    let ticks = BarTickMap::build(doc.total_bars, &layout.spans())?;
    let duration = (doc.audio_duration > 0.0).then_some(doc.audio_duration);

    println!("{} - {}", doc.title, doc.artist);
    println!(
        "{} of {} bars marked, audio {:.3}s",
        markers.count(),
        doc.total_bars,
        doc.audio_duration
    );
    if !markers.is_monotonic() {
        println!("warning: marker times are not in order");
    }
    println!();
    println!("  bar      time    length");

    let all = markers.markers();
    for (i, marker) in all.iter().enumerate() {
        let end = all.get(i + 1).map(|m| m.time).or(duration);
        match end {
            Some(end) => println!(
                "{:>5} {:>9.3} {:>9.3}",
                marker.bar,
                marker.time,
                end - marker.time
            ),
            None => println!("{:>5} {:>9.3}         ?", marker.bar, marker.time),
        }
    }

    if at.is_empty() {
        return Ok(());
    }

    println!();
    let resolver = PositionResolver::new(lead);
    for &time in at {
        match resolver.resolve(time, &markers, Some(&ticks), duration) {
            Resolution::PreSync => println!("{:>8.3}s  before the first marker", time),
            Resolution::Unmapped(p) => println!(
                "{:>8.3}s  bar {:>4} {:>5.1}%  (outside the score)",
                time,
                p.bar,
                p.progress * 100.0
            ),
            Resolution::Located(pos) => println!(
                "{:>8.3}s  bar {:>4} {:>5.1}%  tick {:>6}",
                time,
                pos.bar,
                pos.progress * 100.0,
                pos.position
            ),
        }
    }
    Ok(())
}

fn list(store: &ProjectStore) -> SyncResult<()> {
    let projects = store.list()?;
    if projects.is_empty() {
        println!("No saved projects in {}", store.root().display());
        return Ok(());
    }

    for manifest in projects {
        println!(
            "{}  {:<30} {:<20} {:>3}/{:<3} bars  {}",
            manifest.id,
            manifest.title,
            manifest.artist,
            manifest.marker_count,
            manifest.total_bars,
            manifest.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
