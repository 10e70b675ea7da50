//! Remote control for a wallbox that only offers a web UI: the page is
//! driven through WebDriver, either once from the command line or on
//! demand behind a small webhook server.

pub mod action;
pub mod browser;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod influx;
pub mod mqtt;
pub mod scraper;
pub mod server;
pub mod wallbox;
pub mod webhooks;

pub use error::{Error, Result};
