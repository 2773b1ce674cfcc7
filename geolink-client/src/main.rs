use std::env;
use std::fs::{self, File};
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use geolink_client::render::{contact_row, overlay_lines, radar_frame, StdoutClipboard, TerminalMap};
use geolink_client::{
    FixedPosition, Generator, Geolocation, Session, SimulationDriver, StatusAnnotator,
    TelemetrySource, TrackReplay, WatchOptions,
};
use geolink_core::{
    Config, Coordinates, MapView, RadarProjector, Snapshot, SnapshotRecord, TelemetryConfig,
};
use tokio::task::JoinSet;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "geolink", about = "Run a GeoLink session in the terminal")]
struct Args {
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    username: Option<String>,
    /// URL the session was opened with, e.g. http://localhost:3000/?track=USR-42
    #[arg(long)]
    entry_url: Option<String>,
    /// Fixed local position as LAT,LNG; ignored when a track is configured
    #[arg(long, value_parser = parse_lat_lng, allow_hyphen_values = true)]
    at: Option<Coordinates>,
    #[arg(long, value_enum, default_value_t = View::Radar)]
    view: View,
    /// Contact id to add at startup (repeatable)
    #[arg(long = "add")]
    add: Vec<String>,
    /// Request a status line for every contact this often
    #[arg(long)]
    annotate_every_secs: Option<u64>,
    /// Print the share link once the session starts
    #[arg(long)]
    share: bool,
    /// JSONL snapshot log
    #[arg(long)]
    output: Option<String>,
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum View {
    Radar,
    Map,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let cfg = load_config(&args)?;
    cfg.validate().context("invalid configuration")?;

    let provider = build_provider(&cfg.telemetry)?;
    let telemetry = TelemetrySource::new(provider, WatchOptions::from(&cfg.telemetry));
    let generator = Arc::new(Generator::from_config(&cfg.generator)?);
    let mut session = Session::new(
        telemetry,
        SimulationDriver::new(Duration::from_millis(cfg.simulation_interval_ms)),
        generator,
        cfg.page_url.clone(),
    );
    if let Some(entry) = &cfg.entry_url {
        session.open_entry_url(entry)?;
    }
    let store = session.begin(&cfg.username)?;
    let Some(annotator) = session.annotator() else {
        bail!("session did not start");
    };

    println!("GeoLink running");
    println!("  user:   {}", cfg.username.trim());
    println!("  view:   {:?}", args.view);
    if let Some(path) = &cfg.output_path {
        println!("  output: {path}");
    }

    for id in cfg.contacts.iter().chain(args.add.iter()) {
        session.add_contact(id);
    }
    if args.share {
        if let Some(notice) = session
            .share(None, &mut StdoutClipboard)
            .and_then(|outcome| outcome.notice())
        {
            println!("[ok] {notice}");
        }
    }

    let (tx, writer_handle) = match &cfg.output_path {
        Some(path) => {
            let (tx, rx) = mpsc::channel::<SnapshotRecord>();
            let path = expand_tilde(path);
            (Some(tx), Some(thread::spawn(move || writer_thread(path, rx))))
        }
        None => (None, None),
    };

    let projector = RadarProjector::new(cfg.radar_scale_deg);
    let mut map = (args.view == View::Map).then(|| MapView::new(TerminalMap::new()));
    let mut render_tick = time::interval(Duration::from_millis(cfg.render_interval_ms));
    render_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut annotate_tick = args
        .annotate_every_secs
        .map(|secs| time::interval(Duration::from_secs(secs.max(1))));
    let mut annotations = JoinSet::new();

    let run_for = args.duration_secs.map(Duration::from_secs);
    let deadline = async move {
        match run_for {
            Some(d) => time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = render_tick.tick() => {
                let snapshot = store.lock().snapshot();
                draw(&snapshot, &projector, map.as_mut(), &annotator);
                if let Some(tx) = &tx {
                    if tx.send(SnapshotRecord::now(snapshot)).is_err() {
                        warn!("snapshot log writer stopped");
                    }
                }
            }
            _ = next_tick(annotate_tick.as_mut()) => {
                let ids: Vec<String> = store
                    .lock()
                    .contacts()
                    .iter()
                    .map(|c| c.presence.id.clone())
                    .collect();
                for id in ids {
                    if annotator.is_loading(&id) {
                        continue;
                    }
                    let annotator = annotator.clone();
                    annotations.spawn(async move {
                        match annotator.request_status(&id).await {
                            Ok(text) => debug!(contact = %id, status = %text, "status updated"),
                            Err(err) => debug!(contact = %id, "status skipped: {err}"),
                        }
                    });
                }
            }
            Some(_) = annotations.join_next(), if !annotations.is_empty() => {}
            _ = &mut deadline => {
                info!("run time elapsed");
                break;
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    warn!("ctrl-c handler failed: {err}");
                }
                break;
            }
        }
    }

    annotations.shutdown().await;
    if let Some(map) = map {
        map.teardown();
    }
    session.end();
    drop(tx);
    if let Some(handle) = writer_handle {
        let _ = handle.join();
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_timer(fmt::time::uptime())
                .with_filter(env_filter),
        )
        .try_init();
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut cfg = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(username) = &args.username {
        cfg.username = username.clone();
    }
    if let Some(entry) = &args.entry_url {
        cfg.entry_url = Some(entry.clone());
    }
    if let Some(at) = args.at {
        cfg.telemetry.fixed_position = Some(at);
    }
    if let Some(output) = &args.output {
        cfg.output_path = Some(output.clone());
    }
    Ok(cfg)
}

fn build_provider(cfg: &TelemetryConfig) -> anyhow::Result<Arc<dyn Geolocation>> {
    let cadence = Duration::from_millis(cfg.sample_interval_ms);
    if let Some(path) = &cfg.track_path {
        let replay = TrackReplay::load(expand_tilde(path), cadence)
            .with_context(|| format!("failed to load track {path}"))?;
        info!(samples = replay.len(), "replaying local track from {path}");
        return Ok(Arc::new(replay));
    }
    match cfg.fixed_position {
        Some(position) => Ok(Arc::new(FixedPosition::new(position, cadence))),
        None => bail!("telemetry needs either trackPath or fixedPosition"),
    }
}

fn parse_lat_lng(raw: &str) -> Result<Coordinates, String> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got {raw:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("bad latitude {lat:?}"))?;
    let lng: f64 = lng.trim().parse().map_err(|_| format!("bad longitude {lng:?}"))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(format!("position out of range: {lat},{lng}"));
    }
    Ok(Coordinates::new(lat, lng))
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn draw<T>(
    snapshot: &Snapshot,
    projector: &RadarProjector,
    map: Option<&mut MapView<TerminalMap>>,
    annotator: &StatusAnnotator<T>,
) where
    T: geolink_client::TextGenerator,
{
    if io::stdout().is_terminal() {
        print!("\x1B[2J\x1B[H");
    }
    println!("{} [{}]", snapshot.local.name, snapshot.local.id);
    for line in overlay_lines(&snapshot.local) {
        println!("  {line}");
    }
    match map {
        Some(view) => {
            if view.sync(snapshot).is_none() {
                debug!("map waiting for a local fix");
            }
            for line in view.surface().lines() {
                println!("{line}");
            }
        }
        None => {
            for line in radar_frame(snapshot, projector) {
                println!("{line}");
            }
        }
    }
    if snapshot.contacts.is_empty() {
        println!("no contacts yet; add one with --add <id>");
    }
    for (idx, contact) in snapshot.contacts.iter().enumerate() {
        println!("{}", contact_row(idx, contact, annotator.is_loading(contact.id())));
    }
    let _ = io::stdout().flush();
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

fn writer_thread(path: PathBuf, rx: mpsc::Receiver<SnapshotRecord>) {
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            error!("failed to create log dir: {err}");
            return;
        }
    }
    let file = match File::options().create(true).append(true).open(&path) {
        Ok(f) => f,
        Err(err) => {
            error!("failed to open log file {}: {err}", path.display());
            return;
        }
    };
    let mut writer = BufWriter::new(file);

    for rec in rx {
        if let Err(err) = serde_json::to_writer(&mut writer, &rec) {
            error!("log write failed: {err}");
            continue;
        }
        if let Err(err) = writer.write_all(b"\n") {
            error!("log write failed: {err}");
            continue;
        }
        if let Err(err) = writer.flush() {
            error!("log flush failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lat_lng_flag_parses_and_checks_range() {
        let c = parse_lat_lng("-23.55, -46.63").unwrap();
        assert_eq!((c.latitude, c.longitude), (-23.55, -46.63));
        assert!(parse_lat_lng("91,0").is_err());
        assert!(parse_lat_lng("12.0").is_err());
        assert!(parse_lat_lng("a,b").is_err());
    }

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "geolink",
            "--username",
            "ana",
            "--at",
            "1.5,2.5",
            "--entry-url",
            "http://localhost:3000/?track=USR-9",
            "--view",
            "map",
            "--add",
            "bob",
            "--add",
            "cy",
        ]);
        assert_eq!(args.view, View::Map);
        assert_eq!(args.add, vec!["bob", "cy"]);
        let cfg = load_config(&args).unwrap();
        assert_eq!(cfg.username, "ana");
        assert_eq!(cfg.telemetry.fixed_position.map(|c| c.latitude), Some(1.5));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn provider_requires_a_source() {
        assert!(build_provider(&TelemetryConfig::default()).is_err());
        let fixed = TelemetryConfig {
            fixed_position: Some(Coordinates::new(0.0, 0.0)),
            ..TelemetryConfig::default()
        };
        assert!(build_provider(&fixed).is_ok());
    }

    #[test]
    fn writer_appends_jsonl_lines() {
        let dir = env::temp_dir().join(format!("geolink-writer-{}", std::process::id()));
        let path = dir.join("session.jsonl");
        let _ = fs::remove_file(&path);

        let mut rng = <rand::rngs::StdRng as rand::SeedableRng>::seed_from_u64(3);
        let local = geolink_core::login("ana", &mut rng).unwrap();
        let snapshot = geolink_core::EntityStore::new(local).snapshot();

        let (tx, rx) = mpsc::channel();
        tx.send(SnapshotRecord::now(snapshot.clone())).unwrap();
        tx.send(SnapshotRecord::now(snapshot)).unwrap();
        drop(tx);
        writer_thread(path.clone(), rx);

        let data = fs::read_to_string(&path).unwrap();
        assert_eq!(data.lines().count(), 2);
        let first: SnapshotRecord = serde_json::from_str(data.lines().next().unwrap()).unwrap();
        assert_eq!(first.snapshot.local.name, "ana");
        let _ = fs::remove_dir_all(&dir);
    }
}
