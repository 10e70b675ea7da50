// The wallbox has no API of its own, only a web page along the lines of
//
// ```
// Status: Charging
// Mode Eco
// [START CHARGING] [STOP CHARGING] [SET ECO] [SET FULL] [SET SOLAR]
// ```
//
// so every command loads that page in a browser, reads it, and clicks.

use std::sync::Arc;

use crate::action::{Action, ChargeMode};
use crate::browser::{PageSession, SessionFactory};
use crate::config::WallboxConfig;
use crate::guard::{should_proceed, Decision, Refusal};
use crate::scraper::{parse_reading, Reading};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A read-only action; nothing was clicked.
    Read(Reading),
    /// The guard decided the click was unnecessary or premature.
    Skipped { reading: Reading, refusal: Refusal },
    ButtonMissing { reading: Reading, label: &'static str },
    Applied { before: Reading, after: Reading },
}

impl Outcome {
    /// False only when the button to click could not be found.  A skipped
    /// action counts as success: the wallbox is already where it should be.
    pub fn success(&self) -> bool {
        !matches!(self, Outcome::ButtonMissing { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Read(_) => "read",
            Outcome::Skipped { .. } => "skipped",
            Outcome::ButtonMissing { .. } => "button_not_found",
            Outcome::Applied { .. } => "applied",
        }
    }

    /// The most recent reading of the page.
    pub fn reading(&self) -> &Reading {
        match self {
            Outcome::Read(reading)
            | Outcome::Skipped { reading, .. }
            | Outcome::ButtonMissing { reading, .. } => reading,
            Outcome::Applied { after, .. } => after,
        }
    }
}

pub struct Wallbox {
    config: WallboxConfig,
    sessions: Arc<dyn SessionFactory>,

    // One browser session at a time, the wallbox only has one state to race on.
    busy: tokio::sync::Mutex<()>,
}

impl Wallbox {
    pub fn new(config: WallboxConfig, sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            config,
            sessions,
            busy: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &WallboxConfig {
        &self.config
    }

    pub async fn get_status(&self) -> Result<String, eyre::Report> {
        let outcome = self.run(Action::GetStatus).await?;
        Ok(outcome.reading().status_or_unknown().to_string())
    }

    pub async fn get_mode(&self) -> Result<String, eyre::Report> {
        let outcome = self.run(Action::GetMode).await?;
        Ok(outcome.reading().mode_or_unknown().to_string())
    }

    pub async fn start_charging(&self) -> Result<Outcome, eyre::Report> {
        self.run(Action::Start).await
    }

    pub async fn stop_charging(&self) -> Result<Outcome, eyre::Report> {
        self.run(Action::Stop).await
    }

    pub async fn set_mode(&self, mode: ChargeMode) -> Result<Outcome, eyre::Report> {
        self.run(Action::SetMode(mode)).await
    }

    /// Open a session, carry out `action`, and always close the session again.
    pub async fn run(&self, action: Action) -> Result<Outcome, eyre::Report> {
        let _busy = self.busy.lock().await;
        tracing::debug!("Requested action: {action}");

        let mut session = self.sessions.open().await?;
        let result = self.drive(&mut *session, action).await;

        tracing::debug!("Closing browser...");
        if let Err(e) = session.quit().await {
            tracing::warn!("failed to close browser session: {e}");
        }
        result
    }

    async fn drive(
        &self,
        session: &mut dyn PageSession,
        action: Action,
    ) -> Result<Outcome, eyre::Report> {
        tracing::debug!("Navigating to wallbox interface: {}", self.config.wallbox_url);
        session.navigate(&self.config.wallbox_url).await?;

        tracing::debug!(
            "Waiting {} seconds for page to load...",
            self.config.page_load_timeout
        );
        tokio::time::sleep(self.config.page_load_timeout()).await;

        match session.title().await {
            Ok(title) => tracing::debug!("Page title: {title}"),
            Err(e) => tracing::debug!("no page title: {e}"),
        }

        let before = read(session).await;
        tracing::debug!("Current Status: {:?}", before.status);
        tracing::debug!("Current Mode: {:?}", before.mode);

        let Some(label) = action.button_label() else {
            return Ok(Outcome::Read(before));
        };

        if let Decision::Refuse(refusal) = should_proceed(action, &before, self.config.guard_policy)
        {
            tracing::debug!("{action} not needed: {refusal}");
            return Ok(Outcome::Skipped {
                reading: before,
                refusal,
            });
        }

        tracing::debug!("Looking for '{label}' button...");
        let Some(index) = session.find_and_click(label).await? else {
            tracing::warn!("Could not find {label} button!");
            return Ok(Outcome::ButtonMissing {
                reading: before,
                label,
            });
        };
        tracing::debug!("Clicked the {label} button (Button {})", index + 1);

        tokio::time::sleep(self.config.settle_delay()).await;

        tracing::debug!("Reading updated status and mode...");
        let after = read(session).await;
        Ok(Outcome::Applied { before, after })
    }
}

// An unreadable page is treated like one without status and mode.
async fn read(session: &mut dyn PageSession) -> Reading {
    match session.visible_text().await {
        Ok(text) => parse_reading(&text),
        Err(e) => {
            tracing::warn!("Error reading status/mode: {e}");
            Reading::default()
        }
    }
}
