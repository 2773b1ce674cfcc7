use crate::entity::Contact;
use crate::geo::CompassDirection;

pub const FALLBACK_STATUS: &str = "status unknown — signal lost";

pub const MAX_STATUS_WORDS: usize = 15;
pub const DRIVING_KMH: f64 = 40.0;
pub const WALKING_KMH: f64 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusRequest {
    pub name: String,
    pub speed_kmh: f64,
    pub direction: CompassDirection,
    pub local_time: String,
}

impl StatusRequest {
    pub fn for_contact(contact: &Contact, local_time: impl Into<String>) -> Self {
        let location = contact.presence.location.as_ref();
        Self {
            name: contact.presence.name.clone(),
            speed_kmh: location.map(|c| c.speed_kmh()).unwrap_or(0.0),
            direction: location
                .map(|c| c.compass())
                .unwrap_or(CompassDirection::North),
            local_time: local_time.into(),
        }
    }

    pub fn activity(&self) -> Activity {
        Activity::from_speed_kmh(self.speed_kmh)
    }

    pub fn prompt(&self) -> String {
        format!(
            "Write a short, witty or helpful status update for a person named \"{name}\" \
             based on their location telemetry.\n\
             \n\
             Telemetry:\n\
             - Speed: {speed:.1} km/h\n\
             - Heading: {direction}\n\
             - Time: {time}\n\
             \n\
             Instructions:\n\
             - At most {max_words} words.\n\
             - If the speed is 0, assume they are stopped or resting.\n\
             - If the speed is above {driving} km/h, assume they are driving.\n\
             - If the speed is above {walking} km/h, assume they are walking or running.\n\
             - Be observant and playful.",
            name = self.name,
            speed = self.speed_kmh,
            direction = self.direction.label(),
            time = self.local_time,
            max_words = MAX_STATUS_WORDS,
            driving = DRIVING_KMH,
            walking = WALKING_KMH,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Resting,
    Strolling,
    OnFoot,
    Driving,
}

impl Activity {
    pub fn from_speed_kmh(speed_kmh: f64) -> Self {
        if speed_kmh > DRIVING_KMH {
            Activity::Driving
        } else if speed_kmh > WALKING_KMH {
            Activity::OnFoot
        } else if speed_kmh > 0.0 {
            Activity::Strolling
        } else {
            Activity::Resting
        }
    }
}

pub fn canned_status(request: &StatusRequest) -> String {
    let heading = request.direction.label().to_lowercase();
    match request.activity() {
        Activity::Resting => format!("{} is parked and recharging.", request.name),
        Activity::Strolling => format!("{} is drifting slowly {heading}.", request.name),
        Activity::OnFoot => format!(
            "{} is hustling {heading} at {:.0} km/h on foot.",
            request.name, request.speed_kmh
        ),
        Activity::Driving => format!(
            "{} is cruising {heading} at {:.0} km/h. Eyes on the road!",
            request.name, request.speed_kmh
        ),
    }
}

pub fn normalize_status(raw: &str) -> String {
    let text = raw.trim();
    if text.is_empty() {
        FALLBACK_STATUS.to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinates;

    fn moving_contact(speed_ms: f64, heading: f64) -> Contact {
        let mut c = Coordinates::new(0.0, 0.0);
        c.speed = Some(speed_ms);
        c.heading = Some(heading);
        Contact::new("C1", "Bia", "a.png").with_location(Some(c))
    }

    #[test]
    fn request_derives_speed_and_direction() {
        let req = StatusRequest::for_contact(&moving_contact(12.5, 181.0), "14:05:00");
        assert!((req.speed_kmh - 45.0).abs() < 1e-9);
        assert_eq!(req.direction, CompassDirection::South);
        assert_eq!(req.activity(), Activity::Driving);

        let prompt = req.prompt();
        assert!(prompt.contains("\"Bia\""));
        assert!(prompt.contains("- Speed: 45.0 km/h"));
        assert!(prompt.contains("- Heading: South"));
        assert!(prompt.contains("- Time: 14:05:00"));
        assert!(prompt.contains("At most 15 words"));
    }

    #[test]
    fn contact_without_fix_reads_as_resting() {
        let contact = Contact::new("C2", "Caio", "a.png");
        let req = StatusRequest::for_contact(&contact, "00:00:00");
        assert_eq!(req.speed_kmh, 0.0);
        assert_eq!(req.direction, CompassDirection::North);
        assert_eq!(req.activity(), Activity::Resting);
        assert_eq!(canned_status(&req), "Caio is parked and recharging.");
    }

    #[test]
    fn activity_thresholds() {
        assert_eq!(Activity::from_speed_kmh(0.0), Activity::Resting);
        assert_eq!(Activity::from_speed_kmh(3.0), Activity::Strolling);
        assert_eq!(Activity::from_speed_kmh(4.5), Activity::OnFoot);
        assert_eq!(Activity::from_speed_kmh(40.0), Activity::OnFoot);
        assert_eq!(Activity::from_speed_kmh(40.1), Activity::Driving);
    }

    #[test]
    fn blank_output_becomes_fallback() {
        assert_eq!(normalize_status("  \n"), FALLBACK_STATUS);
        assert_eq!(normalize_status("  On the move. "), "On the move.");
    }
}
