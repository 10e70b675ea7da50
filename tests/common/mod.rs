#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use wallbox_remote::browser::{PageSession, SessionFactory};
use wallbox_remote::config::WallboxConfig;
use wallbox_remote::dispatcher::find_button;
use wallbox_remote::wallbox::Wallbox;
use wallbox_remote::{Error, Result};

pub const WALLBOX_URL: &str = "http://wallbox.test/wallbox";

pub const ALL_BUTTONS: [&str; 5] = [
    "START CHARGING",
    "STOP CHARGING",
    "SET ECO",
    "SET FULL",
    "SET SOLAR",
];

/// What the fake wallbox page shows, plus a record of what the sessions did.
#[derive(Debug, Default)]
pub struct Page {
    pub status: Option<String>,
    pub mode: Option<String>,
    pub buttons: Vec<String>,

    pub visited: Vec<String>,
    pub clicks: Vec<String>,
    pub opened: usize,
    pub quit: usize,
    pub active: usize,
    pub max_active: usize,

    pub fail_open: bool,
    pub fail_navigate: bool,
    pub fail_read: bool,
}

impl Page {
    fn render(&self) -> String {
        let mut text = String::from("Wallbox\n");
        if let Some(status) = &self.status {
            text += &format!("Status: {status}\n");
        }
        if let Some(mode) = &self.mode {
            text += &format!("Mode {mode}\n");
        }
        for button in &self.buttons {
            text += &format!("{button}\n");
        }
        text
    }

    fn click(&mut self, label: &str) {
        self.clicks.push(label.to_string());
        if label.contains("START CHARGING") {
            self.status = Some(String::from("Charging"));
        } else if label.contains("STOP CHARGING") {
            self.status = Some(String::from("Standby"));
        } else if label.contains("SET ECO") {
            self.mode = Some(String::from("Eco"));
        } else if label.contains("SET FULL") {
            self.mode = Some(String::from("Full"));
        } else if label.contains("SET SOLAR") {
            self.mode = Some(String::from("Solar"));
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeBrowser {
    page: Arc<Mutex<Page>>,
}

impl FakeBrowser {
    pub fn new(status: &str, mode: &str) -> Self {
        let browser = Self::default();
        {
            let mut page = browser.page();
            page.status = Some(status.to_string());
            page.mode = Some(mode.to_string());
            page.buttons = ALL_BUTTONS.iter().map(|b| b.to_string()).collect();
        }
        browser
    }

    pub fn page(&self) -> MutexGuard<'_, Page> {
        self.page.lock().unwrap()
    }

    pub fn wallbox(&self) -> Wallbox {
        self.wallbox_with(test_config())
    }

    pub fn wallbox_with(&self, config: WallboxConfig) -> Wallbox {
        Wallbox::new(config, Arc::new(self.clone()))
    }
}

pub fn test_config() -> WallboxConfig {
    WallboxConfig {
        wallbox_url: WALLBOX_URL.to_string(),
        page_load_timeout: 0,
        settle_delay: 0,
        ..Default::default()
    }
}

fn fake_error(message: &str) -> Error {
    Error::GeckoDriver(std::io::Error::other(message.to_string()))
}

#[async_trait]
impl SessionFactory for FakeBrowser {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let mut page = self.page();
        if page.fail_open {
            return Err(fake_error("geckodriver not found"));
        }
        page.opened += 1;
        page.active += 1;
        page.max_active = page.max_active.max(page.active);
        Ok(Box::new(FakeSession {
            page: self.page.clone(),
        }))
    }
}

struct FakeSession {
    page: Arc<Mutex<Page>>,
}

impl FakeSession {
    fn page(&self) -> MutexGuard<'_, Page> {
        self.page.lock().unwrap()
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        // Give overlapping sessions a chance to interleave.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut page = self.page();
        page.visited.push(url.to_string());
        if page.fail_navigate {
            return Err(fake_error("connection refused"));
        }
        Ok(())
    }

    async fn title(&mut self) -> Result<String> {
        Ok(String::from("Wallbox"))
    }

    async fn visible_text(&mut self) -> Result<String> {
        let page = self.page();
        if page.fail_read {
            return Err(fake_error("no body element"));
        }
        Ok(page.render())
    }

    async fn find_and_click(&mut self, label: &str) -> Result<Option<usize>> {
        let mut page = self.page();
        let index = find_button(&page.buttons, label);
        if let Some(i) = index {
            let clicked = page.buttons[i].clone();
            page.click(&clicked);
        }
        Ok(index)
    }

    async fn quit(self: Box<Self>) -> Result<()> {
        let mut page = self.page();
        page.quit += 1;
        page.active -= 1;
        Ok(())
    }
}
