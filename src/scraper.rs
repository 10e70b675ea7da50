// The wallbox page has no ids or classes worth relying on, so the status and
// mode are pulled out of the rendered text, e.g.
//
// ```
// Status: Charging
// Mode Eco
// ```

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Reading {
    pub status: Option<String>,
    pub mode: Option<String>,
}

impl Reading {
    pub fn status_or_unknown(&self) -> &str {
        self.status.as_deref().unwrap_or("Unknown")
    }

    pub fn mode_or_unknown(&self) -> &str {
        self.mode.as_deref().unwrap_or("Unknown")
    }
}

/// Scan the visible page text for `Status` and `Mode` lines.  The last
/// matching line wins.
pub fn parse_reading(body_text: &str) -> Reading {
    let mut reading = Reading::default();

    for line in body_text.lines() {
        let line = line.trim();
        if line.starts_with("Status") {
            let status = match line.split_once(':') {
                Some((_, rest)) => rest.trim().to_string(),
                None => line.replace("Status", "").trim().to_string(),
            };
            reading.status = Some(status);
        } else if line.starts_with("Mode") {
            reading.mode = Some(line.replace("Mode", "").trim().to_string());
        }
    }

    reading
}
