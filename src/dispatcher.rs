/// The label a button is matched by: its text, or its `value` attribute when
/// the text is empty (`<input type="button">` style buttons).
pub fn button_label(text: &str, value: Option<&str>) -> String {
    if text.is_empty() {
        value.unwrap_or_default().to_string()
    } else {
        text.to_string()
    }
}

/// Index of the first button, in page order, whose label contains `target`.
pub fn find_button<S: AsRef<str>>(labels: &[S], target: &str) -> Option<usize> {
    labels.iter().enumerate().find_map(|(i, label)| {
        let label = label.as_ref();
        tracing::debug!("button {}: '{}'", i + 1, label);
        label.contains(target).then_some(i)
    })
}
