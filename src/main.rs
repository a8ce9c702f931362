use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use repostr::config::Settings;
use repostr::core::{ImageMatchCandidate, MatchOutcome, VideoMatchCandidate};
use repostr::database::repositories::{ImageRepository, VideoRepository};
use repostr::database::{get_database_path, Database};
use repostr::services::{FfmpegSampler, OcrService, PerceptualService, RepostService};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

// GIFs go through the image commands, see `is_image`.
const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "webm", "mov", "mkv", "avi", "m4v"];

#[derive(Parser, Debug)]
#[command(name = "repostr", version, about = "Detect reposted images and videos")]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Database file, overrides the settings file
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Image workflows
    Image {
        #[command(subcommand)]
        command: ImageCmd,
    },

    /// Video workflows
    Video {
        #[command(subcommand)]
        command: VideoCmd,
    },

    /// Show how many fingerprints are stored
    Stats,
}

#[derive(Subcommand, Debug)]
enum ImageCmd {
    /// Fingerprint an image and store it
    Add {
        #[arg(short, long, value_name = "FILE")]
        path: PathBuf,
        #[arg(short, long, default_value = "")]
        message_id: String,
    },

    /// Look for stored images this one reposts
    Check {
        #[arg(short, long, value_name = "FILE")]
        path: PathBuf,
        /// Aggregate image similarity to beat
        #[arg(long, allow_negative_numbers = true)]
        total_threshold: Option<f64>,
        /// Text similarity to beat; 0 disables OCR
        #[arg(long, allow_negative_numbers = true)]
        text_threshold: Option<f64>,
        /// Store the image when nothing matched
        #[arg(long)]
        add: bool,
        #[arg(short, long, default_value = "")]
        message_id: String,
    },
}

#[derive(Subcommand, Debug)]
enum VideoCmd {
    /// Check a video and store it if it is not a repost
    Add {
        #[arg(short, long, value_name = "FILE")]
        path: PathBuf,
        #[arg(short, long, default_value = "")]
        message_id: String,
    },

    /// Look for stored videos this one reposts
    Check {
        #[arg(short, long, value_name = "FILE")]
        path: PathBuf,
    },

    /// Store a video, or every video under a directory, without checking
    Import {
        #[arg(short, long, value_name = "PATH")]
        path: PathBuf,
        #[arg(short, long, default_value = "")]
        message_id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(database) = cli.database.clone() {
        settings.database_path = Some(database);
    }

    let db_path = match settings.database_path.clone() {
        Some(path) => path,
        None => get_database_path().context("Failed to resolve database location")?,
    };
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database {:?}", db_path))?;
    let images = Arc::new(ImageRepository::new(db.clone()));
    let videos = Arc::new(VideoRepository::new(db));

    if let Commands::Stats = cli.command {
        let image_count = images.count()?;
        let video_count = videos.count()?;
        if cli.json {
            println!(
                "{}",
                serde_json::json!({ "images": image_count, "videos": video_count })
            );
        } else {
            println!("▶ Database: {}", db_path.display());
            println!("   images: {}", image_count);
            println!("   videos: {}", video_count);
        }
        return Ok(());
    }

    let service = build_service(&settings, images, videos);

    match cli.command {
        Commands::Image { command } => match command {
            ImageCmd::Add { path, message_id } => {
                let id = benchmark("fingerprinting image", || {
                    service.add_image(&path, &message_id)
                })
                .with_context(|| format!("Failed to add {:?}", path))?;
                report_id(cli.json, &path, id);
            }

            ImageCmd::Check {
                path,
                total_threshold,
                text_threshold,
                add,
                message_id,
            } => {
                let total = total_threshold.unwrap_or(service.image_settings().total_threshold);
                let text = text_threshold.unwrap_or(service.image_settings().text_threshold);

                if add {
                    let (outcome, stored) = benchmark("checking image", || {
                        service.check_and_add_image(&path, &message_id, total, text)
                    })
                    .with_context(|| format!("Failed to check {:?}", path))?;
                    print_image_outcome(cli.json, &path, &outcome)?;
                    if let Some(id) = stored {
                        report_id(cli.json, &path, id);
                    }
                } else {
                    let outcome = benchmark("checking image", || {
                        service.check_image_with(&path, total, text)
                    })
                    .with_context(|| format!("Failed to check {:?}", path))?;
                    print_image_outcome(cli.json, &path, &outcome)?;
                }
            }
        },

        Commands::Video { command } => match command {
            VideoCmd::Add { path, message_id } => {
                let outcome = with_spinner("Sampling video…", || {
                    service.process_video(&path, &message_id)
                })
                .with_context(|| format!("Failed to process {:?}", path))?;
                print_video_outcome(cli.json, &path, &outcome)?;
            }

            VideoCmd::Check { path } => {
                let outcome = with_spinner("Sampling video…", || service.check_video(&path))
                    .with_context(|| format!("Failed to check {:?}", path))?;
                print_video_outcome(cli.json, &path, &outcome)?;
            }

            VideoCmd::Import { path, message_id } => {
                let files = if path.is_dir() {
                    scan_videos(&path)
                } else {
                    vec![path.clone()]
                };
                println!("▶ Importing {} video(s)…", files.len());

                let bar = ProgressBar::new(files.len() as u64);
                bar.set_style(ProgressStyle::with_template(
                    "{bar:40.green} {pos}/{len} {msg}",
                )?);
                let mut failed = 0usize;
                for file in &files {
                    bar.set_message(file.display().to_string());
                    match service.import_video(file, &message_id) {
                        Ok(id) => log::debug!("Imported {:?} as {}", file, id),
                        Err(e) => {
                            failed += 1;
                            bar.suspend(|| eprintln!("⚠️  Skipping {}: {}", file.display(), e));
                        }
                    }
                    bar.inc(1);
                }
                bar.finish_with_message("Import complete");

                println!(
                    "✅ Imported {} of {} video(s)",
                    files.len() - failed,
                    files.len()
                );
            }
        },

        Commands::Stats => unreachable!("handled above"),
    }

    Ok(())
}

fn build_service(
    settings: &Settings,
    images: Arc<ImageRepository>,
    videos: Arc<VideoRepository>,
) -> RepostService {
    let ocr = OcrService::new(settings.tools.tesseract.clone());
    let fingerprints = Arc::new(PerceptualService::new(settings.image.hash_size, ocr));
    let sampler = Arc::new(
        FfmpegSampler::new(
            settings.tools.ffmpeg.clone(),
            settings.tools.ffprobe.clone(),
            settings.tools.work_dir(),
        )
        .with_scale_width(settings.video.scale_width),
    );

    RepostService::new(fingerprints, sampler, images, videos)
        .with_image_settings(settings.image.clone())
        .with_video_settings(settings.video.clone())
}

/// Recursively walk `dir`, returning video file paths in a stable order.
fn scan_videos(dir: &Path) -> Vec<PathBuf> {
    let mut videos: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    videos.sort();
    videos
}

fn report_id(json: bool, path: &Path, id: i64) {
    if json {
        println!("{}", serde_json::json!({ "stored": path, "id": id }));
    } else {
        println!("📦 Stored {} as #{}", path.display(), id);
    }
}

fn print_image_outcome(
    json: bool,
    path: &Path,
    outcome: &MatchOutcome<ImageMatchCandidate>,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    match outcome {
        MatchOutcome::NoMatch => println!("No reposts found for {}.", path.display()),
        MatchOutcome::Matches(found) => {
            println!("Found {} possible repost(s) of {}:", found.len(), path.display());
            for c in found {
                println!(
                    "   ▶ #{} {} (message {}) image {}% text {}%",
                    c.record.id,
                    c.record.filename,
                    c.record.message_id,
                    c.image_similarity,
                    c.text_similarity
                );
            }
        }
    }
    Ok(())
}

fn print_video_outcome(
    json: bool,
    path: &Path,
    outcome: &MatchOutcome<VideoMatchCandidate>,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    match outcome {
        MatchOutcome::NoMatch => println!("No reposts found for {}.", path.display()),
        MatchOutcome::Matches(found) => {
            println!("Found {} possible repost(s) of {}:", found.len(), path.display());
            for c in found {
                println!(
                    "   ▶ #{} {} (message {}) {}% of frames",
                    c.record.id, c.record.filename, c.record.message_id, c.match_fraction
                );
            }
        }
    }
    Ok(())
}

/// Run `f()` under a spinner.
fn with_spinner<T, F: FnOnce() -> T>(message: &'static str, f: F) -> T {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = f();
    spinner.finish_and_clear();
    result
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::debug!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
