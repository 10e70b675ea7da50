use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thirtyfour::prelude::*;

use crate::config::WebDriverConfig;
use crate::dispatcher::{button_label, find_button};
use crate::error::{Error, Result};

/// What the wallbox controller needs from a browser.
#[async_trait]
pub trait PageSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn title(&mut self) -> Result<String>;

    /// Rendered text of the whole `<body>`.
    async fn visible_text(&mut self) -> Result<String>;

    /// Click the first button whose label contains `label`.  Returns the
    /// index of the clicked button, or `None` when there is no such button.
    async fn find_and_click(&mut self, label: &str) -> Result<Option<usize>>;

    async fn quit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>>;
}

// geckodriver needs a moment before it accepts sessions.
const GECKODRIVER_STARTUP: Duration = Duration::from_millis(1500);

struct GeckoDriver(tokio::process::Child);

impl GeckoDriver {
    async fn spawn(binary: &str, port: u16) -> Result<Self> {
        let child = tokio::process::Command::new(binary)
            .arg("--port")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(Error::GeckoDriver)?;
        tokio::time::sleep(GECKODRIVER_STARTUP).await;
        Ok(GeckoDriver(child))
    }

    async fn stop(mut self) {
        if let Err(e) = self.0.kill().await {
            tracing::warn!("failed to stop geckodriver: {e}");
        }
    }
}

#[derive(Debug, Clone)]
pub struct Firefox {
    config: WebDriverConfig,
}

impl Firefox {
    pub fn new(config: WebDriverConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for Firefox {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let gecko = if self.config.spawn_geckodriver {
            let url = reqwest::Url::parse(&self.config.url)
                .map_err(|e| Error::WebDriverUrl(format!("{}: {e}", self.config.url)))?;
            let port = url
                .port_or_known_default()
                .ok_or_else(|| Error::WebDriverUrl(self.config.url.clone()))?;
            tracing::debug!("starting {} on port {port}", self.config.geckodriver);
            Some(GeckoDriver::spawn(&self.config.geckodriver, port).await?)
        } else {
            None
        };

        let mut caps = DesiredCapabilities::firefox();
        if self.config.headless {
            tracing::debug!("Running in headless mode (no GUI)");
            caps.set_headless()?;
        } else {
            tracing::debug!("Running with GUI");
        }

        // The child is killed on drop if the session can't be created.
        let driver = WebDriver::new(self.config.url.as_str(), caps).await?;

        Ok(Box::new(FirefoxSession { driver, gecko }))
    }
}

pub struct FirefoxSession {
    driver: WebDriver,
    gecko: Option<GeckoDriver>,
}

#[async_trait]
impl PageSession for FirefoxSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn title(&mut self) -> Result<String> {
        Ok(self.driver.title().await?)
    }

    async fn visible_text(&mut self) -> Result<String> {
        let body = self.driver.find(By::Tag("body")).await?;
        Ok(body.text().await?)
    }

    async fn find_and_click(&mut self, label: &str) -> Result<Option<usize>> {
        let buttons = self.driver.find_all(By::Tag("button")).await?;
        tracing::debug!("Found {} buttons on the page", buttons.len());

        let mut labels = Vec::with_capacity(buttons.len());
        for button in &buttons {
            let text = button.text().await?;
            let value = if text.is_empty() {
                button.attr("value").await?
            } else {
                None
            };
            labels.push(button_label(&text, value.as_deref()));
        }

        match find_button(&labels, label) {
            Some(i) => {
                buttons[i].click().await?;
                Ok(Some(i))
            }
            None => Ok(None),
        }
    }

    async fn quit(self: Box<Self>) -> Result<()> {
        let FirefoxSession { driver, gecko } = *self;
        let quit = driver.quit().await;
        if let Some(gecko) = gecko {
            gecko.stop().await;
        }
        quit.map_err(Error::from)
    }
}
