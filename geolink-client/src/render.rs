use std::collections::BTreeMap;

use geolink_core::invite::{Clipboard, ShareError};
use geolink_core::projection::RADAR_MAX_RADIUS;
use geolink_core::{
    Contact, Coordinates, LatLng, MarkerPayload, MarkerSurface, Presence, RadarPoint,
    RadarProjector, Snapshot,
};

pub const RADAR_ROWS: usize = 21;
// Twice the rows so the disk looks round in terminal cells.
pub const RADAR_COLS: usize = 41;

const RING_TOLERANCE: f64 = 2.5;

pub fn marker_glyph(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}

fn cell_for(point: RadarPoint) -> (usize, usize) {
    let col = (point.x / 100.0 * (RADAR_COLS - 1) as f64).round();
    let row = (point.y / 100.0 * (RADAR_ROWS - 1) as f64).round();
    (
        row.clamp(0.0, (RADAR_ROWS - 1) as f64) as usize,
        col.clamp(0.0, (RADAR_COLS - 1) as f64) as usize,
    )
}

pub fn radar_frame(snapshot: &Snapshot, projector: &RadarProjector) -> Vec<String> {
    let mut grid = vec![vec![' '; RADAR_COLS]; RADAR_ROWS];
    for (r, row) in grid.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            let p = RadarPoint {
                x: c as f64 / (RADAR_COLS - 1) as f64 * 100.0,
                y: r as f64 / (RADAR_ROWS - 1) as f64 * 100.0,
            };
            if (p.radius() - RADAR_MAX_RADIUS).abs() <= RING_TOLERANCE {
                *cell = '.';
            }
        }
    }

    let origin = snapshot.local.location.as_ref();
    for (idx, contact) in snapshot.contacts.iter().enumerate() {
        let Some(target) = contact.presence.location.as_ref() else {
            continue;
        };
        let (r, c) = cell_for(projector.project(origin, Some(target)));
        grid[r][c] = marker_glyph(idx);
    }
    let (r, c) = cell_for(RadarPoint::CENTER);
    grid[r][c] = '@';

    grid.into_iter()
        .map(|row| row.into_iter().collect::<String>().trim_end().to_string())
        .collect()
}

pub fn speed_label(location: Option<&Coordinates>) -> String {
    match location {
        Some(c) => format!("{:.0} km/h", c.speed_kmh()),
        None => "OFFLINE".to_string(),
    }
}

pub fn contact_row(index: usize, contact: &Contact, loading: bool) -> String {
    let status = if loading {
        "analysing...".to_string()
    } else if contact.status_message.is_empty() {
        "-".to_string()
    } else {
        format!("\"{}\"", contact.status_message)
    };
    format!(
        "{} {:<14} {:>9}  {}",
        marker_glyph(index),
        contact.presence.name,
        speed_label(contact.presence.location.as_ref()),
        status
    )
}

pub fn overlay_lines(local: &Presence) -> Vec<String> {
    match &local.location {
        Some(c) => vec![
            format!("LAT: {:.4}", c.latitude),
            format!("LNG: {:.4}", c.longitude),
            format!("VEL: {:.1} KM/H", c.speed_kmh()),
        ],
        None => vec![
            "LAT: WAITING...".to_string(),
            "LNG: WAITING...".to_string(),
            "VEL: 0.0 KM/H".to_string(),
        ],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawnMarker {
    pub entity_id: String,
    pub at: LatLng,
    pub payload: MarkerPayload,
}

#[derive(Debug, Default)]
pub struct TerminalMap {
    next_handle: u64,
    markers: BTreeMap<u64, DrawnMarker>,
    view: Option<(LatLng, u8)>,
}

impl TerminalMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn view(&self) -> Option<(LatLng, u8)> {
        self.view
    }

    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.markers.len() + 1);
        match self.view {
            Some((center, zoom)) => out.push(format!(
                "map centre {:.5},{:.5} zoom {zoom}",
                center.lat, center.lng
            )),
            None => out.push("map waiting for a fix".to_string()),
        }
        for marker in self.markers.values() {
            let mut line = format!(
                "  [{}] {:<14} {:.5},{:.5}",
                marker.payload.accent, marker.payload.label, marker.at.lat, marker.at.lng
            );
            if let Some(popup) = &marker.payload.popup {
                line.push_str("  ");
                line.push_str(popup);
            }
            out.push(line);
        }
        out
    }
}

impl MarkerSurface for TerminalMap {
    type Handle = u64;

    fn create(&mut self, id: &str, at: LatLng, payload: &MarkerPayload) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.markers.insert(
            handle,
            DrawnMarker {
                entity_id: id.to_string(),
                at,
                payload: payload.clone(),
            },
        );
        handle
    }

    fn update(&mut self, handle: &mut u64, at: LatLng, payload: &MarkerPayload) {
        if let Some(marker) = self.markers.get_mut(handle) {
            marker.at = at;
            marker.payload = payload.clone();
        }
    }

    fn remove(&mut self, handle: u64) {
        self.markers.remove(&handle);
    }

    fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.view = Some((center, zoom));
    }
}

pub struct StdoutClipboard;

impl Clipboard for StdoutClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ShareError> {
        println!("{text}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geolink_core::reconcile::{INITIAL_ZOOM, LOCAL_LABEL};
    use geolink_core::MapView;

    fn presence(id: &str, location: Option<Coordinates>) -> Presence {
        Presence {
            id: id.into(),
            name: id.into(),
            avatar: "a.png".into(),
            last_updated_ms: 0,
            location,
        }
    }

    fn snapshot() -> Snapshot {
        let mut east = Coordinates::new(0.0, 0.5);
        east.speed = Some(10.0);
        Snapshot {
            local: presence("USR-1", Some(Coordinates::new(0.0, 0.0))),
            contacts: vec![
                Contact::new("C1", "Bia", "b.png").with_location(Some(east)),
                Contact::new("C2", "Caio", "c.png"),
            ],
        }
    }

    #[test]
    fn radar_puts_you_in_the_middle_and_far_contacts_on_the_rim() {
        let frame = radar_frame(&snapshot(), &RadarProjector::default());
        assert_eq!(frame.len(), RADAR_ROWS);
        assert_eq!(frame[RADAR_ROWS / 2].chars().nth(RADAR_COLS / 2), Some('@'));

        let (row, col) = cell_for(RadarPoint { x: 95.0, y: 50.0 });
        assert_eq!(frame[row].chars().nth(col), Some('A'));
        assert!(!frame.iter().any(|line| line.contains('B')));
    }

    #[test]
    fn rows_show_speed_or_offline() {
        let snap = snapshot();
        let bia = contact_row(0, &snap.contacts[0], false);
        assert!(bia.starts_with("A Bia"));
        assert!(bia.contains("36 km/h"));
        assert!(bia.ends_with('-'));

        let caio = contact_row(1, &snap.contacts[1].clone().with_status("hi"), true);
        assert!(caio.contains("OFFLINE"));
        assert!(caio.ends_with("analysing..."));
    }

    #[test]
    fn overlay_waits_for_fix() {
        let lines = overlay_lines(&presence("USR-1", None));
        assert_eq!(lines[0], "LAT: WAITING...");
        let fixed = overlay_lines(&presence("USR-1", Some(Coordinates::new(12.34567, -1.0))));
        assert_eq!(fixed[0], "LAT: 12.3457");
        assert_eq!(fixed[1], "LNG: -1.0000");
        assert_eq!(fixed[2], "VEL: 0.0 KM/H");
    }

    #[test]
    fn terminal_map_tracks_reconciled_markers() {
        let mut view = MapView::new(TerminalMap::new());
        let stats = view.sync(&snapshot()).unwrap();
        assert_eq!(stats.created, 2);
        let map = view.surface();
        assert_eq!(map.marker_count(), 2);
        assert_eq!(map.view().map(|(_, z)| z), Some(INITIAL_ZOOM));
        let lines = map.lines();
        assert!(lines[1].contains(LOCAL_LABEL));
        assert!(lines[2].contains("Bia: No status"));

        let map = view.teardown();
        assert_eq!(map.marker_count(), 0);
    }
}
