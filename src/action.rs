use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Charging modes offered by the wallbox UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeMode {
    Eco,
    Full,
    Solar,
}

impl ChargeMode {
    pub const ALL: [ChargeMode; 3] = [ChargeMode::Eco, ChargeMode::Full, ChargeMode::Solar];

    /// The name as the wallbox page shows it, e.g. "Eco".
    pub fn display_name(self) -> &'static str {
        match self {
            ChargeMode::Eco => "Eco",
            ChargeMode::Full => "Full",
            ChargeMode::Solar => "Solar",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChargeMode::Eco => "eco",
            ChargeMode::Full => "full",
            ChargeMode::Solar => "solar",
        }
    }

    /// True when the scraped mode text already names this mode.
    pub fn is_active_in(self, current_mode: &str) -> bool {
        current_mode
            .to_lowercase()
            .contains(&self.display_name().to_lowercase())
    }
}

impl fmt::Display for ChargeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChargeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eco" => Ok(ChargeMode::Eco),
            "full" => Ok(ChargeMode::Full),
            "solar" => Ok(ChargeMode::Solar),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

/// Start or stop charging, the positional CLI argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Switch {
    Start,
    Stop,
}

impl From<Switch> for Action {
    fn from(switch: Switch) -> Self {
        match switch {
            Switch::Start => Action::Start,
            Switch::Stop => Action::Stop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    SetMode(ChargeMode),
    GetStatus,
    GetMode,
}

impl Action {
    /// Literal that the button for this action carries on the page.
    /// Read-only actions have no button.
    pub fn button_label(self) -> Option<&'static str> {
        match self {
            Action::Start => Some("START CHARGING"),
            Action::Stop => Some("STOP CHARGING"),
            Action::SetMode(ChargeMode::Eco) => Some("SET ECO"),
            Action::SetMode(ChargeMode::Full) => Some("SET FULL"),
            Action::SetMode(ChargeMode::Solar) => Some("SET SOLAR"),
            Action::GetStatus | Action::GetMode => None,
        }
    }

    pub fn is_mutating(self) -> bool {
        self.button_label().is_some()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Start => f.write_str("start"),
            Action::Stop => f.write_str("stop"),
            Action::SetMode(mode) => write!(f, "set_mode {mode}"),
            Action::GetStatus => f.write_str("get_status"),
            Action::GetMode => f.write_str("get_mode"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_labels_are_fixed() {
        assert_eq!(Action::Start.button_label(), Some("START CHARGING"));
        assert_eq!(Action::Stop.button_label(), Some("STOP CHARGING"));
        assert_eq!(Action::SetMode(ChargeMode::Eco).button_label(), Some("SET ECO"));
        assert_eq!(Action::SetMode(ChargeMode::Full).button_label(), Some("SET FULL"));
        assert_eq!(Action::SetMode(ChargeMode::Solar).button_label(), Some("SET SOLAR"));
        assert_eq!(Action::GetStatus.button_label(), None);
        assert!(!Action::GetMode.is_mutating());
    }

    #[test]
    fn mode_parsing_is_strict() {
        assert_eq!("solar".parse::<ChargeMode>().unwrap(), ChargeMode::Solar);
        assert!(matches!(
            "turbo".parse::<ChargeMode>(),
            Err(Error::InvalidMode(m)) if m == "turbo"
        ));
        assert!("Eco".parse::<ChargeMode>().is_err());
    }

    #[test]
    fn mode_matching_ignores_case() {
        for mode in ChargeMode::ALL {
            assert!(mode.is_active_in(&mode.display_name().to_uppercase()));
            assert!(mode.is_active_in(&format!("({})", mode.as_str())));
        }
        assert!(!ChargeMode::Eco.is_active_in("Full"));
    }
}
