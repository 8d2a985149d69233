//! Page steps shared by provider flows.
//!
//! Each helper performs one browser interaction and maps adapter errors to
//! the [`FailureReason`] that step stands for.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::browser::{js_string, BrowserSession, ReadyState};
use crate::diagnostics::DiagnosticsSink;
use crate::extract::{mentions_all, PatternSet};
use crate::poll::PollPolicy;
use crate::types::FailureReason;

/// Outcome of setting a `<select>` control.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Selection {
    /// Whether a control and a matching option were found and applied.
    pub found: bool,
    /// Text of the option selected afterwards.
    #[serde(default)]
    pub selected: Option<String>,
}

pub async fn navigate(
    session: &mut dyn BrowserSession,
    url: &str,
    timeout: Duration,
) -> Result<(), FailureReason> {
    session
        .navigate(url, ReadyState::NetworkIdle, timeout)
        .await
        .map_err(|e| FailureReason::Navigation(format!("{url}: {e:#}")))
}

pub async fn wait_for(
    session: &mut dyn BrowserSession,
    selector: &str,
    timeout: Duration,
) -> Result<(), FailureReason> {
    session
        .wait_for(selector, timeout)
        .await
        .map_err(|e| FailureReason::Timeout(format!("{selector}: {e:#}")))
}

pub async fn evaluate(
    session: &mut dyn BrowserSession,
    script: &str,
) -> Result<Value, FailureReason> {
    session
        .evaluate(script)
        .await
        .map_err(|e| FailureReason::Script(format!("{e:#}")))
}

/// A page script that returned the wrong shape is broken, not empty.
fn decode<T: DeserializeOwned>(raw: Value, step: &str) -> Result<T, FailureReason> {
    serde_json::from_value(raw)
        .map_err(|e| FailureReason::Script(format!("{step}: unexpected script result: {e}")))
}

/// Let provider-side reactive code catch up after an interaction.
pub async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Select the option with an exact `value` in the control at `selector`.
pub async fn select_by_value(
    session: &mut dyn BrowserSession,
    selector: &str,
    value: &str,
) -> Result<Selection, FailureReason> {
    let raw = evaluate(session, &select_by_value_script(selector, value)).await?;
    decode(raw, "select by value")
}

/// Select the first option whose text contains `label`, in the first
/// control that either starts with such an option or whose id/name
/// contains `hint`.
pub async fn select_by_label(
    session: &mut dyn BrowserSession,
    label: &str,
    hint: &str,
) -> Result<Selection, FailureReason> {
    let raw = evaluate(session, &select_by_label_script(label, hint)).await?;
    decode(raw, "select by label")
}

/// Trimmed text of every element matching `selector` that mentions all
/// `markers`.
pub async fn texts_mentioning(
    session: &mut dyn BrowserSession,
    selector: &str,
    markers: &[String],
) -> Result<Vec<String>, FailureReason> {
    let script = format!(
        "(() => {{ const markers = {markers}; return Array.from(document.querySelectorAll({sel})).map(el => (el.textContent || '').trim()).filter(t => markers.every(m => t.includes(m))); }})()",
        markers = serde_json::Value::from(markers.to_vec()),
        sel = js_string(selector)
    );
    let raw = evaluate(session, &script).await?;
    let texts: Vec<String> = decode(raw, "element scan")?;
    Ok(texts
        .into_iter()
        .filter(|text| mentions_all(text, markers))
        .collect())
}

/// Trimmed text of the first element matching `selector`, if any.
pub async fn element_text(
    session: &mut dyn BrowserSession,
    selector: &str,
) -> Result<Option<String>, FailureReason> {
    let script = format!(
        "(() => {{ const el = document.querySelector({sel}); return el ? el.textContent.trim() : null; }})()",
        sel = js_string(selector)
    );
    let raw = evaluate(session, &script).await?;
    Ok(raw.as_str().map(str::to_string))
}

/// Repeatedly scan elements for text mentioning every marker and return the
/// first rate recovered by `patterns`, with the number of attempts used.
pub async fn poll_for_rate(
    session: &mut dyn BrowserSession,
    policy: &PollPolicy,
    scan_selector: &str,
    markers: &[String],
    patterns: &PatternSet,
    diagnostics: &dyn DiagnosticsSink,
    provider: &str,
) -> Result<(Option<f64>, u32), FailureReason> {
    let mut attempt = 1;
    loop {
        let candidates = texts_mentioning(session, scan_selector, markers).await?;

        diagnostics.note(
            provider,
            "scan",
            &serde_json::json!({ "attempt": attempt, "candidates": candidates }),
        );

        if let Some(rate) = candidates.iter().find_map(|t| patterns.first_match(t)) {
            return Ok((Some(rate), attempt));
        }

        tracing::debug!(
            provider,
            attempt,
            max_attempts = policy.attempts(),
            "rate not rendered yet"
        );
        if !policy.pause(attempt).await {
            return Ok((None, attempt));
        }
        attempt += 1;
    }
}

fn select_by_value_script(selector: &str, value: &str) -> String {
    format!(
        r#"(() => {{
  const select = document.querySelector({sel});
  if (!select) return {{ found: false, selected: null }};
  const option = Array.from(select.options).find(o => o.value === {val});
  if (option) {{
    select.value = option.value;
    select.dispatchEvent(new Event('change', {{ bubbles: true }}));
  }}
  const current = select.options[select.selectedIndex];
  return {{ found: !!option, selected: current ? current.text : null }};
}})()"#,
        sel = js_string(selector),
        val = js_string(value),
    )
}

fn select_by_label_script(label: &str, hint: &str) -> String {
    format!(
        r#"(() => {{
  const label = {label};
  const hint = {hint};
  const select = Array.from(document.querySelectorAll('select')).find(s =>
    (s.options[0] && s.options[0].text.includes(label)) ||
    (hint && ((s.id || '').toLowerCase().includes(hint) || (s.name || '').toLowerCase().includes(hint))));
  if (!select) return {{ found: false, selected: null }};
  const option = Array.from(select.options).find(o => o.text.includes(label));
  if (!option) return {{ found: false, selected: null }};
  select.value = option.value;
  select.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return {{ found: true, selected: option.text }};
}})()"#,
        label = js_string(label),
        hint = js_string(&hint.to_lowercase()),
    )
}

/// Ids, names and option texts of every `<select>` on the page.
pub const SELECT_INVENTORY_SCRIPT: &str = r#"Array.from(document.querySelectorAll('select')).map(s => ({
  id: s.id,
  name: s.name,
  options: Array.from(s.options).map(o => ({ value: o.value, text: o.text }))
}))"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_script_embeds_escaped_arguments() {
        let script = select_by_value_script("#origin-currency", "CA-CAD");
        assert!(script.contains(r##"document.querySelector("#origin-currency")"##));
        assert!(script.contains(r#"o.value === "CA-CAD""#));
        assert!(script.contains("bubbles: true"));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let texts: Vec<String> = decode(serde_json::json!(["1 CAD = 450 XOF"]), "scan").unwrap();
        assert_eq!(texts.len(), 1);

        let err = decode::<Vec<String>>(serde_json::json!({"error": "x"}), "scan").unwrap_err();
        assert!(matches!(err, FailureReason::Script(ref m) if m.starts_with("scan:")));

        let err = decode::<Selection>(Value::Null, "select by value").unwrap_err();
        assert!(matches!(err, FailureReason::Script(_)));
    }

    #[test]
    fn test_label_script_lowercases_hint() {
        let script = select_by_label_script("Burkina", "Destination");
        assert!(script.contains(r#"const label = "Burkina";"#));
        assert!(script.contains(r#"const hint = "destination";"#));
    }
}
