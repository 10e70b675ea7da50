use std::time::Duration;

use crate::config::InfluxConfig;

const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Str(s) => {
                let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{escaped}\"")
            }
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(i) => write!(f, "{i}i"),
            FieldValue::Float(x) => write!(f, "{x}"),
        }
    }
}

/// One line of InfluxDB line protocol, without tags:
/// `measurement field=value,... timestamp_ns`.
pub fn line(measurement: &str, fields: &[(&str, FieldValue)], timestamp_ns: i64) -> String {
    let measurement = measurement.replace(',', "\\,").replace(' ', "\\ ");
    let fields = fields
        .iter()
        .map(|(key, value)| format!("{}={value}", escape_key(key)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{measurement} {fields} {timestamp_ns}")
}

fn escape_key(key: &str) -> String {
    key.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// Writes observations to an InfluxDB v2 bucket.  Every failure is logged
/// and swallowed: forwarding never fails the request that produced the data.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    target: Option<Target>,
}

#[derive(Debug, Clone)]
struct Target {
    url: String,
    token: String,
    org: String,
    bucket: String,
}

impl Forwarder {
    /// A forwarder is only active when url, token, org and bucket are all set.
    pub fn new(config: Option<&InfluxConfig>) -> Self {
        let target = config.and_then(|c| {
            Some(Target {
                url: c.url.clone()?,
                token: c.token.clone()?,
                org: c.org.clone()?,
                bucket: c.bucket.clone()?,
            })
        });
        Self {
            client: reqwest::Client::new(),
            target,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    pub async fn send(&self, measurement: &str, fields: &[(&str, FieldValue)]) {
        let Some(target) = &self.target else {
            return;
        };

        let timestamp_ns = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default();
        let body = line(measurement, fields, timestamp_ns);
        tracing::debug!("influx write: {body}");

        let url = format!("{}/api/v2/write", target.url.trim_end_matches('/'));
        let result = self
            .client
            .post(url)
            .query(&[("org", &target.org), ("bucket", &target.bucket)])
            .header("Authorization", format!("Token {}", target.token))
            .header("Content-Type", "text/plain")
            .body(body)
            .timeout(WRITE_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) if response.status() == reqwest::StatusCode::NO_CONTENT => {}
            Ok(response) => tracing::warn!("InfluxDB write failed: {}", response.status()),
            Err(e) => tracing::warn!("Failed to send data to InfluxDB: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn line_formats_each_field_type() {
        let l = line(
            "wallbox_action",
            &[
                ("action", "start".into()),
                ("success", true.into()),
                ("production", 3200_i64.into()),
                ("ratio", 0.5.into()),
            ],
            1_700_000_000_000_000_000,
        );
        assert_eq!(
            l,
            "wallbox_action action=\"start\",success=true,production=3200i,ratio=0.5 1700000000000000000"
        );
    }

    #[test]
    fn line_escapes_strings_and_names() {
        let l = line(
            "grafana alert",
            &[("rule name", "Solar \"high\" \\ now".into())],
            1,
        );
        assert_eq!(l, "grafana\\ alert rule\\ name=\"Solar \\\"high\\\" \\\\ now\" 1");
    }

    #[test]
    fn incomplete_config_disables_forwarding() {
        assert!(!Forwarder::new(None).is_enabled());
        let partial = InfluxConfig {
            url: Some("http://influx:8086".into()),
            token: Some("t".into()),
            org: Some("home".into()),
            bucket: None,
        };
        assert!(!Forwarder::new(Some(&partial)).is_enabled());
    }

    #[tokio::test]
    async fn send_posts_line_protocol() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/write"))
            .and(query_param("org", "home"))
            .and(query_param("bucket", "wallbox"))
            .and(header("Authorization", "Token t0k"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let forwarder = Forwarder::new(Some(&InfluxConfig {
            url: Some(server.uri()),
            token: Some("t0k".into()),
            org: Some("home".into()),
            bucket: Some("wallbox".into()),
        }));
        forwarder
            .send("wallbox_status", &[("status", "Charging".into())])
            .await;

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        assert!(body.starts_with("wallbox_status status=\"Charging\" "));
    }

    #[tokio::test]
    async fn server_errors_are_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string("never matches"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let forwarder = Forwarder::new(Some(&InfluxConfig {
            url: Some(format!("{}/", server.uri())),
            token: Some("t".into()),
            org: Some("o".into()),
            bucket: Some("b".into()),
        }));
        // wiremock answers 404 for unmatched requests; this must only warn.
        forwarder.send("wallbox_mode", &[("mode", "Eco".into())]).await;
    }
}
