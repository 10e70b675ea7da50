use crate::action::Action;
use crate::scraper::Reading;

/// Which set of rules decides whether a mutating action is worth clicking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardPolicy {
    /// Only refuses to stop a finishing cycle and to re-select the current mode.
    #[default]
    Lenient,
    /// Refuses to start while charging and to stop while idle, but lets a
    /// finishing cycle be stopped.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Refuse(Refusal),
}

impl Decision {
    pub fn proceeds(&self) -> bool {
        matches!(self, Decision::Proceed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    /// Stopping while the wallbox is still finishing; the caller should wait.
    StillFinishing { status: String },
    ModeAlreadySet { mode: String },
    AlreadyCharging { status: String },
    AlreadyStopped { status: String },
}

impl std::fmt::Display for Refusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Refusal::StillFinishing { status } => write!(
                f,
                "charging cycle is still finishing (Status: {status}), wait for it to complete before stopping"
            ),
            Refusal::ModeAlreadySet { mode } => write!(f, "mode is already set to {mode}"),
            Refusal::AlreadyCharging { status } => write!(f, "already charging (Status: {status})"),
            Refusal::AlreadyStopped { status } => write!(f, "already stopped (Status: {status})"),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

pub fn should_proceed(action: Action, reading: &Reading, policy: GuardPolicy) -> Decision {
    // Nothing to compare against: fail open.
    let (Some(status), Some(mode)) = (reading.status.as_deref(), reading.mode.as_deref()) else {
        tracing::debug!(?reading, "could not read current status/mode, proceeding anyway");
        return Decision::Proceed;
    };

    let refusal = match action {
        Action::Start if policy == GuardPolicy::Strict => {
            // "Finishing" is not "charging" so a finishing cycle can be restarted.
            contains_ignore_case(status, "charging").then(|| Refusal::AlreadyCharging {
                status: status.to_string(),
            })
        }
        Action::Stop if policy == GuardPolicy::Lenient => contains_ignore_case(status, "finishing")
            .then(|| Refusal::StillFinishing {
                status: status.to_string(),
            }),
        Action::Stop if policy == GuardPolicy::Strict => (contains_ignore_case(status, "standby")
            || contains_ignore_case(status, "stopped"))
        .then(|| Refusal::AlreadyStopped {
            status: status.to_string(),
        }),
        Action::SetMode(target) if target.is_active_in(mode) => Some(Refusal::ModeAlreadySet {
            mode: target.display_name().to_string(),
        }),
        _ => None,
    };

    match refusal {
        Some(refusal) => Decision::Refuse(refusal),
        None => Decision::Proceed,
    }
}
