use thiserror::Error;

/// Feil som kan oppstå ved konstruksjon og lasting. Selve datastrømmen
/// feiler aldri: korte vinduer venter, tomme klassifiseringer blir
/// avståelser og plan-avvik blir `Deviation`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("exercise plan needs at least one exercise (use ExercisePlan::ad_hoc for free training)")]
    EmptyPlan,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed json in {path}: {message}")]
    Json { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
