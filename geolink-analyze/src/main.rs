mod constants;

use clap::Parser;
use geolink_core::{CompassDirection, Coordinates, RadarPoint, RadarProjector, SnapshotRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use constants::*;

#[derive(Parser, Debug)]
#[command(about = "Summarize a GeoLink snapshot log per entity")]
struct Args {
    #[arg(long)]
    session: PathBuf,

    #[arg(long)]
    entity: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    origin_lat: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    origin_lon: Option<f64>,

    #[arg(long, default_value_t = DEFAULT_RADAR_SCALE_DEG)]
    radar_scale: f64,

    #[arg(long, default_value_t = DEFAULT_MIN_MOVE_M)]
    min_move_m: f64,

    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy)]
struct Fix {
    ts_unix_ms: i64,
    coords: Coordinates,
}

#[derive(Debug, Clone, Default)]
struct Track {
    name: String,
    local: bool,
    fixes: Vec<Fix>,
    statuses: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct EntityReport {
    id: String,
    name: String,
    local: bool,
    fixes: usize,
    path_km: f64,
    duration_s: f64,
    avg_kmh: Option<f64>,
    max_reported_kmh: Option<f64>,
    dominant_heading: Option<CompassDirection>,
    last_lat: Option<f64>,
    last_lon: Option<f64>,
    dist_from_origin_km: Option<f64>,
    radar: Option<RadarPoint>,
    status_changes: usize,
    last_status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisOutput {
    records: usize,
    radar_scale_deg: f64,
    origin_lat: Option<f64>,
    origin_lon: Option<f64>,
    entities: Vec<EntityReport>,
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    if !(args.radar_scale.is_finite() && args.radar_scale > 0.0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "--radar-scale must be a positive number",
        ));
    }

    let records = load_jsonl(&args.session)?;
    let tracks = build_tracks(&records, args.min_move_m);

    let origin = match (args.origin_lat, args.origin_lon) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
        (None, None) => local_origin(&tracks),
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "--origin-lat and --origin-lon must be given together",
            ));
        }
    };

    let projector = RadarProjector::new(args.radar_scale);
    let reports: Vec<EntityReport> = tracks
        .iter()
        .filter(|(id, _)| args.entity.as_deref().map_or(true, |want| want == id.as_str()))
        .map(|(id, track)| entity_report(id, track, origin.as_ref(), &projector))
        .collect();

    if args.json {
        let output = AnalysisOutput {
            records: records.len(),
            radar_scale_deg: args.radar_scale,
            origin_lat: origin.map(|o| o.latitude),
            origin_lon: origin.map(|o| o.longitude),
            entities: reports,
        };
        let text = serde_json::to_string_pretty(&output)
            .unwrap_or_else(|_| "{\"error\":\"failed to serialize\"}".to_string());
        println!("{text}");
        return Ok(());
    }

    println!("Session: {} records, {} entities", records.len(), tracks.len());
    match origin {
        Some(o) => println!("Radar origin: lat={:.5}, lon={:.5}", o.latitude, o.longitude),
        None => println!("Radar origin: none (local user never had a fix)"),
    }
    print_reports(&reports);
    Ok(())
}

fn load_jsonl(path: &PathBuf) -> io::Result<Vec<SnapshotRecord>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(rec) = serde_json::from_str::<SnapshotRecord>(&line) {
            out.push(rec);
        }
    }
    Ok(out)
}

fn build_tracks(records: &[SnapshotRecord], min_move_m: f64) -> BTreeMap<String, Track> {
    let mut tracks: BTreeMap<String, Track> = BTreeMap::new();
    for rec in records {
        for entity in rec.snapshot.entities() {
            let presence = entity.presence();
            let track = tracks.entry(presence.id.clone()).or_default();
            track.name = presence.name.clone();
            track.local = entity.is_local();

            if let geolink_core::Entity::Contact(contact) = entity {
                if !contact.status_message.is_empty()
                    && track.statuses.last() != Some(&contact.status_message)
                {
                    track.statuses.push(contact.status_message.clone());
                }
            }

            let Some(coords) = presence.location else {
                continue;
            };
            let moved = track.fixes.last().map_or(true, |prev| {
                distance_km(&prev.coords, &coords) * 1000.0 >= min_move_m
            });
            if moved {
                track.fixes.push(Fix {
                    ts_unix_ms: rec.ts_unix_ms,
                    coords,
                });
            }
        }
    }
    tracks
}

fn local_origin(tracks: &BTreeMap<String, Track>) -> Option<Coordinates> {
    tracks
        .values()
        .find(|t| t.local)
        .and_then(|t| t.fixes.last())
        .map(|f| f.coords)
}

fn entity_report(
    id: &str,
    track: &Track,
    origin: Option<&Coordinates>,
    projector: &RadarProjector,
) -> EntityReport {
    let path_km: f64 = track
        .fixes
        .windows(2)
        .map(|w| distance_km(&w[0].coords, &w[1].coords))
        .sum();
    let duration_s = match (track.fixes.first(), track.fixes.last()) {
        (Some(first), Some(last)) => (last.ts_unix_ms - first.ts_unix_ms) as f64 / MS_PER_SEC,
        _ => 0.0,
    };
    let avg_kmh = (duration_s > 0.0).then(|| path_km / (duration_s * MS_PER_SEC / MS_PER_HOUR));
    let max_reported_kmh = track
        .fixes
        .iter()
        .filter(|f| f.coords.speed.is_some())
        .map(|f| f.coords.speed_kmh())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

    let last = track.fixes.last().map(|f| f.coords);
    let radar = match (origin, last.as_ref()) {
        (Some(o), Some(l)) if !track.local => Some(projector.project(Some(o), Some(l))),
        (_, Some(_)) => Some(RadarPoint::CENTER),
        _ => None,
    };

    EntityReport {
        id: id.to_string(),
        name: track.name.clone(),
        local: track.local,
        fixes: track.fixes.len(),
        path_km,
        duration_s,
        avg_kmh,
        max_reported_kmh,
        dominant_heading: dominant_heading(&track.fixes),
        last_lat: last.map(|c| c.latitude),
        last_lon: last.map(|c| c.longitude),
        dist_from_origin_km: match (origin, last.as_ref()) {
            (Some(o), Some(l)) => Some(distance_km(o, l)),
            _ => None,
        },
        radar,
        status_changes: track.statuses.len(),
        last_status: track.statuses.last().cloned(),
    }
}

fn dominant_heading(fixes: &[Fix]) -> Option<CompassDirection> {
    let mut counts: HashMap<CompassDirection, usize> = HashMap::new();
    for fix in fixes {
        if fix.coords.heading.is_some() {
            *counts.entry(fix.coords.compass()).or_insert(0) += 1;
        }
    }
    CompassDirection::ALL
        .iter()
        .copied()
        .filter_map(|d| counts.get(&d).map(|n| (d, *n)))
        .fold(None, |best: Option<(CompassDirection, usize)>, (d, n)| match best {
            Some((_, top)) if top >= n => best,
            _ => Some((d, n)),
        })
        .map(|(d, _)| d)
}

fn print_reports(reports: &[EntityReport]) {
    println!("\nEntity stats:");
    for r in reports {
        let role = if r.local { "you" } else { "contact" };
        println!(
            "- {} ({}, {}) fixes={} path={:.3}km duration={:.0}s",
            r.name, r.id, role, r.fixes, r.path_km, r.duration_s
        );
        let avg = r.avg_kmh.map_or("n/a".to_string(), |v| format!("{v:.1}"));
        let max = r.max_reported_kmh.map_or("n/a".to_string(), |v| format!("{v:.1}"));
        let heading = r.dominant_heading.map_or("n/a", |d| d.label());
        println!("  avg_kmh={avg} max_reported_kmh={max} heading={heading}");
        if let (Some(radar), Some(dist)) = (r.radar, r.dist_from_origin_km) {
            println!(
                "  radar x={:.1} y={:.1} dist_from_origin={:.3}km",
                radar.x, radar.y, dist
            );
        }
        if let Some(status) = &r.last_status {
            println!("  status ({} changes): {}", r.status_changes, status);
        }
    }
}

fn distance_km(a: &Coordinates, b: &Coordinates) -> f64 {
    haversine_km(a.latitude, a.longitude, b.latitude, b.longitude)
}

fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let r = EARTH_RADIUS_KM;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    r * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use geolink_core::{Contact, Presence, Snapshot};

    const TEST_EPSILON: f64 = 1e-6;
    const TEST_KM_PER_DEG: f64 = 111.195;
    const TEST_STEP_MS: i64 = 3_000;

    fn moving(lat: f64, lon: f64, speed: Option<f64>, heading: Option<f64>) -> Coordinates {
        let mut c = Coordinates::new(lat, lon);
        c.speed = speed;
        c.heading = heading;
        c
    }

    fn record(
        ts: i64,
        local: Option<Coordinates>,
        contact: Option<(Coordinates, &str)>,
    ) -> SnapshotRecord {
        let presence = Presence {
            id: "USR-1".to_string(),
            name: "ana".to_string(),
            avatar: "a.png".to_string(),
            last_updated_ms: ts,
            location: local,
        };
        let contacts = contact
            .map(|(c, status)| {
                let mut friend = Contact::new("C1", "Friend C1", "b.png").with_location(Some(c));
                friend.status_message = status.to_string();
                vec![friend]
            })
            .unwrap_or_default();
        SnapshotRecord {
            ts_unix_ms: ts,
            snapshot: Snapshot {
                local: presence,
                contacts,
            },
        }
    }

    #[test]
    fn haversine_one_degree_of_latitude() {
        let d = haversine_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - TEST_KM_PER_DEG).abs() < 0.01);
        assert!(haversine_km(10.0, 20.0, 10.0, 20.0).abs() < TEST_EPSILON);
    }

    #[test]
    fn unchanged_fixes_are_collapsed() {
        let here = Coordinates::new(0.0, 0.0);
        let records = vec![
            record(0, Some(here), None),
            record(TEST_STEP_MS, Some(here), None),
            record(2 * TEST_STEP_MS, Some(Coordinates::new(0.001, 0.0)), None),
        ];
        let tracks = build_tracks(&records, DEFAULT_MIN_MOVE_M);
        let me = &tracks["USR-1"];
        assert!(me.local);
        assert_eq!(me.fixes.len(), 2);
    }

    #[test]
    fn report_path_speed_and_heading() {
        let origin = Coordinates::new(0.0, 0.0);
        let records = vec![
            record(0, Some(origin), Some((moving(0.0, 0.0, Some(1.0), Some(90.0)), "Connected."))),
            record(
                TEST_STEP_MS,
                Some(origin),
                Some((moving(0.0, 0.001, Some(5.0), Some(80.0)), "Connected.")),
            ),
            record(
                2 * TEST_STEP_MS,
                Some(origin),
                Some((moving(0.0, 0.002, Some(2.0), Some(200.0)), "Heading east.")),
            ),
        ];
        let tracks = build_tracks(&records, DEFAULT_MIN_MOVE_M);
        let projector = RadarProjector::default();
        let report = entity_report("C1", &tracks["C1"], Some(&origin), &projector);

        assert_eq!(report.fixes, 3);
        let expected_km = 0.002 * TEST_KM_PER_DEG;
        assert!((report.path_km - expected_km).abs() < 1e-3);
        assert!((report.duration_s - 6.0).abs() < TEST_EPSILON);
        let avg = report.avg_kmh.unwrap();
        assert!((avg - expected_km / (6.0 / 3600.0)).abs() < 1.0);
        assert!((report.max_reported_kmh.unwrap() - 18.0).abs() < TEST_EPSILON);
        assert_eq!(report.dominant_heading, Some(CompassDirection::East));
        assert_eq!(report.status_changes, 2);
        assert_eq!(report.last_status.as_deref(), Some("Heading east."));

        let radar = report.radar.unwrap();
        assert!((radar.y - 50.0).abs() < TEST_EPSILON);
        assert!(radar.x > 50.0);
        assert!(radar.radius() <= geolink_core::projection::RADAR_MAX_RADIUS + TEST_EPSILON);
    }

    #[test]
    fn origin_defaults_to_last_local_fix() {
        let records = vec![
            record(0, None, None),
            record(TEST_STEP_MS, Some(Coordinates::new(1.0, 2.0)), None),
            record(2 * TEST_STEP_MS, Some(Coordinates::new(1.5, 2.5)), None),
        ];
        let tracks = build_tracks(&records, DEFAULT_MIN_MOVE_M);
        let origin = local_origin(&tracks).unwrap();
        assert_eq!((origin.latitude, origin.longitude), (1.5, 2.5));

        let projector = RadarProjector::default();
        let me = entity_report("USR-1", &tracks["USR-1"], Some(&origin), &projector);
        assert_eq!(me.radar, Some(RadarPoint::CENTER));
        assert_eq!(me.dominant_heading, None);
        assert_eq!(me.max_reported_kmh, None);
    }

    #[test]
    fn no_local_fix_means_no_origin() {
        let tracks = build_tracks(&[record(0, None, None)], DEFAULT_MIN_MOVE_M);
        assert!(local_origin(&tracks).is_none());
        let report = entity_report("USR-1", &tracks["USR-1"], None, &RadarProjector::default());
        assert_eq!(report.fixes, 0);
        assert_eq!(report.avg_kmh, None);
        assert!(report.radar.is_none());
    }
}
