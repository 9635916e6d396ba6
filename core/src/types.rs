use serde::{Deserialize, Serialize};

/// Etikett brukt når klassifiseringen ikke ga noe svar.
pub const UNKNOWN_EXERCISE: &str = "unknown";

/// Hvor på kroppen sensoren sitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    LeftWrist,
    RightWrist,
    Waist,
    Chest,
    Ankle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    HeartRate,
}

/// De tre romlige aksene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn along(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// En enkelt avlesning i en fused sample: 3D (akselerometer, gyro) eller 1D (puls).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    ThreeD(Vec3),
    OneD(f64),
}

/// Tidsstemplet, fused sensorsample. Endres ikke etter at det er laget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: f64, // sek
    pub device_id: u8,
    pub location: Location,
    pub sensor: SensorKind,
    pub readings: Vec<Reading>,
}

impl Sample {
    /// Akselerometer-sample med én 3D-avlesning (device 0).
    pub fn accel(t: f64, location: Location, a: Vec3) -> Self {
        Self {
            t,
            device_id: 0,
            location,
            sensor: SensorKind::Accelerometer,
            readings: vec![Reading::ThreeD(a)],
        }
    }

    pub fn heart_rate(t: f64, location: Location, bpm: f64) -> Self {
        Self {
            t,
            device_id: 0,
            location,
            sensor: SensorKind::HeartRate,
            readings: vec![Reading::OneD(bpm)],
        }
    }

    /// Første 3D-avlesning hvis dette er et akselerometer-sample.
    pub fn acceleration(&self) -> Option<Vec3> {
        if self.sensor != SensorKind::Accelerometer {
            return None;
        }
        self.readings.iter().find_map(|r| match r {
            Reading::ThreeD(v) => Some(*v),
            Reading::OneD(_) => None,
        })
    }
}

/// Identitet + estimater for én øvelse. `None` betyr "ukjent", aldri 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResistanceExercise {
    pub id: String,
    #[serde(default)]
    pub repetitions: Option<u32>,
    #[serde(default)]
    pub weight: Option<f64>, // kg
    #[serde(default)]
    pub intensity: Option<f64>,
    /// Tid brukt på øvelsen (sek), satt for endelige klassifiseringer.
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default = "full_confidence")]
    pub confidence: f64,
}

fn full_confidence() -> f64 {
    1.0
}

impl ResistanceExercise {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repetitions: None,
            weight: None,
            intensity: None,
            duration_secs: None,
            confidence: 1.0,
        }
    }

    pub fn unknown() -> Self {
        Self {
            confidence: 0.0,
            ..Self::new(UNKNOWN_EXERCISE)
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.id == UNKNOWN_EXERCISE
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_repetitions(mut self, repetitions: u32) -> Self {
        self.repetitions = Some(repetitions);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = Some(intensity);
        self
    }
}

/// Ett eller flere øvelser utført i ett sett (supersett / dropsett).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSet {
    pub exercises: Vec<ResistanceExercise>,
}

impl ExerciseSet {
    pub fn single(exercise: ResistanceExercise) -> Self {
        Self { exercises: vec![exercise] }
    }

    /// Settet når alle vinduer avsto: "unknown" med confidence 0.
    pub fn unknown() -> Self {
        Self::single(ResistanceExercise::unknown())
    }

    /// Et sett er aldri sikrere enn det svakeste medlemmet.
    pub fn confidence(&self) -> f64 {
        self.exercises
            .iter()
            .map(|e| e.confidence)
            .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.min(c))))
            .unwrap_or(0.0)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.exercises.iter().map(|e| e.id.as_str()).collect()
    }

    pub fn is_unknown(&self) -> bool {
        self.exercises.iter().all(|e| e.is_unknown())
    }
}

/// Pause: varighetsgrense og/eller pulsgrense for når hvilen regnes som ferdig.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rest {
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub hr_below: Option<u8>, // bpm
}

impl Rest {
    pub fn for_secs(duration_secs: f64) -> Self {
        Self {
            duration_secs: Some(duration_secs),
            hr_below: None,
        }
    }

    pub fn until_hr_below(bpm: u8) -> Self {
        Self {
            duration_secs: None,
            hr_below: Some(bpm),
        }
    }
}

/// Ett element i en plan: enten en øvelse eller en pause, aldri begge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanItem {
    Exercise(ResistanceExercise),
    Rest(Rest),
}

impl PlanItem {
    pub fn is_rest(&self) -> bool {
        matches!(self, PlanItem::Rest(_))
    }

    pub fn exercise(&self) -> Option<&ResistanceExercise> {
        match self {
            PlanItem::Exercise(e) => Some(e),
            PlanItem::Rest(_) => None,
        }
    }

    /// Samme type og identitet: øvelser matches eksakt på id, pause matcher alltid pause.
    pub fn matches(&self, other: &PlanItem) -> bool {
        match (self, other) {
            (PlanItem::Exercise(a), PlanItem::Exercise(b)) => a.id == b.id,
            (PlanItem::Rest(_), PlanItem::Rest(_)) => true,
            _ => false,
        }
    }
}

/// Avvik mellom faktisk innsendt element og det planlagte (None = forbi slutten av planen).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub actual: PlanItem,
    pub planned: Option<PlanItem>,
}
