use serde::Deserialize;
use serde_json::{json, Value};

use crate::action::ChargeMode;
use crate::config::MqttConfig;
use crate::server::AppState;
use crate::wallbox::Outcome;

/// Grafana alert notification, only the fields we act on.
#[derive(Debug, Deserialize)]
pub struct GrafanaAlert {
    #[serde(default = "unknown")]
    pub state: String,
    #[serde(rename = "ruleName", default = "unknown")]
    pub rule_name: String,
}

fn unknown() -> String {
    String::from("unknown")
}

pub async fn handle_grafana(state: &AppState, alert: &GrafanaAlert) -> Value {
    let response = match alert.state.as_str() {
        "alerting" => handle_alert(state, &alert.rule_name).await,
        "ok" => handle_recovery(state, &alert.rule_name).await,
        other => json!({ "message": format!("Alert state {other} acknowledged") }),
    };

    state
        .influx
        .send(
            "grafana_alert",
            &[
                ("state", alert.state.as_str().into()),
                ("rule_name", alert.rule_name.as_str().into()),
                ("handled", true.into()),
            ],
        )
        .await;

    response
}

async fn handle_alert(state: &AppState, rule_name: &str) -> Value {
    let rule = rule_name.to_lowercase();
    if !(rule.contains("solar") && rule.contains("high")) {
        return json!({ "message": "Alert acknowledged but no action taken" });
    }

    tracing::info!("High solar production detected, switching to solar mode");
    match state.set_mode(ChargeMode::Solar).await {
        Ok(outcome) => json!({
            "action": "set_mode_solar",
            "success": outcome.success(),
            "reason": "high_solar_production",
        }),
        Err(e) => {
            tracing::error!("Error setting solar mode: {e}");
            json!({ "error": e.to_string() })
        }
    }
}

async fn handle_recovery(state: &AppState, rule_name: &str) -> Value {
    if !rule_name.to_lowercase().contains("solar") {
        return json!({ "message": "Recovery acknowledged but no action taken" });
    }

    tracing::info!("Solar production normalized, switching to eco mode");
    match state.set_mode(ChargeMode::Eco).await {
        Ok(outcome) => json!({
            "action": "set_mode_eco",
            "success": outcome.success(),
            "reason": "solar_production_normalized",
        }),
        Err(e) => {
            tracing::error!("Error setting eco mode: {e}");
            json!({ "error": e.to_string() })
        }
    }
}

/// Topics that carry wallbox commands and solar production readings.  A
/// message is routed to a handler when its topic contains one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub command: String,
    pub solar: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            command: String::from("wallbox/command"),
            solar: String::from("solar/production"),
        }
    }
}

impl From<&MqttConfig> for Topics {
    fn from(config: &MqttConfig) -> Self {
        Self {
            command: config.command_topic.clone(),
            solar: config.solar_topic.clone(),
        }
    }
}

/// Route an MQTT message, from the webhook or from the broker, by topic.
/// `message` is normally a JSON document encoded as a string; an already
/// decoded JSON value is accepted too.
pub async fn handle_mqtt_message(
    state: &AppState,
    topics: &Topics,
    topic: &str,
    message: &Value,
) -> Value {
    tracing::info!("MQTT message - Topic: {topic}, Message: {message}");

    if topic.contains(topics.command.as_str()) {
        match decode(message) {
            Some(command) => handle_command(state, &command).await,
            None => json!({ "error": "Invalid JSON in MQTT message" }),
        }
    } else if topic.contains(topics.solar.as_str()) {
        match decode(message) {
            Some(data) => handle_solar_data(state, &data).await,
            None => json!({ "error": "Invalid JSON in solar data" }),
        }
    } else {
        json!({ "message": "MQTT webhook acknowledged" })
    }
}

fn decode(message: &Value) -> Option<Value> {
    match message {
        Value::String(s) => serde_json::from_str(s).ok(),
        Value::Object(_) => Some(message.clone()),
        _ => None,
    }
}

async fn handle_command(state: &AppState, data: &Value) -> Value {
    let command = data.get("command").and_then(Value::as_str).unwrap_or_default();

    let result = match command {
        "start" => state
            .start_charging()
            .await
            .map(|o| json!({ "action": "start", "success": o.success() })),
        "stop" => state
            .stop_charging()
            .await
            .map(|o| json!({ "action": "stop", "success": o.success() })),
        "set_mode" => {
            let mode = data.get("mode").and_then(Value::as_str).unwrap_or("eco");
            match mode.parse::<ChargeMode>() {
                Ok(m) => state
                    .set_mode(m)
                    .await
                    .map(|o| json!({ "action": "set_mode", "mode": mode, "success": o.success() })),
                Err(e) => return json!({ "error": e.to_string() }),
            }
        }
        other => return json!({ "error": format!("Unknown command: {other}") }),
    };

    result.unwrap_or_else(|e| {
        tracing::error!("Error handling MQTT command: {e}");
        json!({ "error": e.to_string() })
    })
}

async fn handle_solar_data(state: &AppState, data: &Value) -> Value {
    let production = data.get("production").cloned().unwrap_or(json!(0));
    let watts = production.as_f64().unwrap_or_default();

    if watts > state.solar_threshold_w {
        match state.set_mode(ChargeMode::Solar).await {
            Ok(Outcome::Skipped { .. }) => {}
            Ok(outcome) => {
                return json!({
                    "action": "auto_switch_to_solar",
                    "success": outcome.success(),
                    "production": production,
                })
            }
            Err(e) => {
                tracing::error!("Error handling solar data: {e}");
                return json!({ "error": e.to_string() });
            }
        }
    }

    json!({ "message": "Solar data processed", "production": production })
}
