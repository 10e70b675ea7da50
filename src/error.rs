use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to encode default config: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("invalid mode '{0}'. Must be one of: eco, full, solar")]
    InvalidMode(String),

    #[error("invalid webdriver url: {0}")]
    WebDriverUrl(String),

    #[error("failed to launch geckodriver: {0}")]
    GeckoDriver(#[source] std::io::Error),

    #[error("browser: {0}")]
    Browser(#[from] thirtyfour::error::WebDriverError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
