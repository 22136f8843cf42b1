use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use rollcall_camera::{CameraBackend, MockCamera, StillImageCamera};
use rollcall_network::{AttendanceApi, HttpApi, LocalApi, NoticeBus};
use rollcall_ops::{init_tracing, ActivityLog};
use rollcall_orchestrator::{RegistrationForm, Resolution, Router};
use rollcall_photos::UploadBlob;
use rollcall_types::{
    attendance::{AttendancePreview, AttendanceReport, DetectedEntry, DetectionSummary},
    config::RollcallConfig,
    events::{AlertLevel, UiPayload},
    roster::DashboardStats,
    view::{PhotoMode, View},
};
use tracing::info;

#[derive(Parser)]
#[command(name = "rollcall", about = "Classroom attendance by face recognition")]
struct Cli {
    /// Path to a TOML config (falls back to $ROLLCALL_CONFIG, then configs/dev.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Use the in-process collaborator instead of the HTTP backend.
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show headline statistics.
    Dashboard,
    /// Register a student from camera captures and/or image files.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        matricule: String,
        #[arg(long = "photo")]
        photos: Vec<PathBuf>,
        /// Number of photos to take with the camera.
        #[arg(long, default_value_t = 0)]
        captures: usize,
    },
    /// Capture the room and show who was recognized.
    Scan {
        #[arg(long)]
        save: bool,
    },
    /// Reconcile the roster against the latest saved session.
    Review,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    init_tracing(&config.ops)?;

    let camera: Arc<dyn CameraBackend> = match &config.camera.source_image {
        Some(path) => Arc::new(StillImageCamera::new(path)),
        None => Arc::new(MockCamera::new()),
    };
    let activity = ActivityLog::from_config(&config.ops);

    if cli.offline {
        info!("using the in-process collaborator");
        let router = Router::new(config, camera, LocalApi::new(), NoticeBus::new(64), activity);
        run(router, cli.command).await
    } else {
        let api = HttpApi::new(&config.api)?;
        info!(base_url = api.base_url(), "using the HTTP collaborator");
        let router = Router::new(config, camera, api, NoticeBus::new(64), activity);
        run(router, cli.command).await
    }
}

async fn run<A: AttendanceApi + 'static>(router: Router<A>, command: Command) -> Result<()> {
    let mut notices = router.notices().subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = notices.next().await {
            if let UiPayload::Alert { level, message } = event.payload {
                let tag = match level {
                    AlertLevel::Info => "info",
                    AlertLevel::Success => "ok",
                    AlertLevel::Error => "error",
                };
                eprintln!("[{tag}] {message}");
            }
        }
    });

    let outcome = execute(&router, command).await;
    router.shutdown().await;
    drop(router);
    let _ = printer.await;
    outcome
}

async fn execute<A: AttendanceApi + 'static>(router: &Router<A>, command: Command) -> Result<()> {
    router.boot().await;

    match command {
        Command::Dashboard => match router.dashboard().await {
            Some(stats) => print_stats(&stats),
            None => bail!("dashboard statistics are unavailable"),
        },
        Command::Register {
            name,
            matricule,
            photos,
            captures,
        } => {
            router.navigate(View::Register).await;
            for _ in 0..captures {
                router.capture_photo().await?;
            }
            if !photos.is_empty() {
                router.set_photo_mode(PhotoMode::Upload).await?;
                let blobs = photos
                    .iter()
                    .map(UploadBlob::from_path)
                    .collect::<Result<Vec<_>, _>>()?;
                let report = router.upload_photos(blobs).await?;
                info!(
                    added = report.added.len(),
                    skipped = report.skipped_non_image.len(),
                    "photos uploaded"
                );
            }
            router
                .submit_registration(RegistrationForm::new(name, matricule))
                .await?;
            if let Some(stats) = router.dashboard().await {
                print_stats(&stats);
            }
        }
        Command::Scan { save } => {
            router.navigate(View::Capture).await;
            match router.capture_room().await? {
                Resolution::Reviewed => {
                    if let Some((summary, preview)) = router.detection().await {
                        print_detection(&summary, &preview);
                    }
                }
                Resolution::Failed(message) => bail!("scan failed: {message}"),
                Resolution::Ignored => bail!("scan result arrived after the capture view closed"),
            }
            if save {
                router.save_session().await?;
                if let Some(report) = router.review().await {
                    print_report(&report);
                }
            }
        }
        Command::Review => {
            router.navigate(View::Review).await;
            match router.review().await {
                Some(report) => print_report(&report),
                None => bail!("attendance review is unavailable"),
            }
        }
    }
    Ok(())
}

fn print_stats(stats: &DashboardStats) {
    println!("Students registered: {}", stats.total_students);
    println!("Sessions today:      {}", stats.total_sessions);
    println!("Attendance rate:     {:.1}%", stats.attendance_rate);
}

fn print_detection(summary: &DetectionSummary, preview: &AttendancePreview) {
    println!(
        "Detected {} face(s): {} recognized, {} unknown",
        preview.total_presents, summary.recognized_count, summary.unknown_count
    );
    for entry in &summary.entries {
        match entry {
            DetectedEntry::Recognized(student) => {
                println!("  {:<12} {}", student.matricule, student.name)
            }
            DetectedEntry::Unknown(n) => println!("  {:<12} Unknown {n}", "-"),
        }
    }
    println!(
        "Estimated attendance: {}/{} ({}%), {} absent",
        preview.recognized_count, preview.class_size, preview.rate, preview.absent_count
    );
}

fn print_report(report: &AttendanceReport) {
    match &report.session_time {
        Some(time) => println!("Session at {time}"),
        None => println!("No session recorded yet"),
    }
    for row in &report.rows {
        let status = if row.present { "present" } else { "absent" };
        println!(
            "  {:<12} {:<24} {:<8} {}",
            row.student.matricule, row.student.name, status, row.time
        );
    }
    println!(
        "{} present, {} absent, {}%",
        report.present_count, report.absent_count, report.rate
    );
}

fn load_config(explicit: Option<&Path>) -> RollcallConfig {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var_os("ROLLCALL_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("configs/dev.toml"));
    match RollcallConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                RollcallConfig::default()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            RollcallConfig::default()
        }
    }
}
