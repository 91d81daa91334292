//! LLM-assisted lead qualification.
//!
//! One chat-completion call per lead, with a strict-JSON instruction in the
//! prompt. Model output is never trusted: we scan for the first JSON value
//! in the raw text (models love wrapping answers in code fences and
//! commentary) and treat anything unparseable as a recoverable
//! `InvalidResponse` carrying the offending text.

use serde::Deserialize;
use serde_json::json;

use crate::config::LlmConfig;
use crate::db::DbLead;
use crate::error::AppError;

/// What the qualification model is asked to produce.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualificationAssessment {
    /// 0–100. Values outside the range are clamped on parse.
    pub score: i64,
    /// Advisory only; the service derives priority from the score itself.
    #[serde(default)]
    pub priority: Option<String>,
    pub summary: String,
}

// =============================================================================
// Prompt construction
// =============================================================================

fn build_qualification_prompt(lead: &DbLead) -> String {
    let mut prompt = String::with_capacity(2_000);

    prompt.push_str("# Lead\n\n");
    prompt.push_str(&format!("Name: {}\n", lead.name));
    prompt.push_str(&format!("Type: {}\n", lead.kind));
    prompt.push_str(&format!("Source: {}\n", lead.source));
    if let Some(ref email) = lead.email {
        prompt.push_str(&format!("Email: {}\n", email));
    }
    if let Some(value) = lead.deal_value {
        prompt.push_str(&format!("Estimated deal value: {}\n", value));
    }
    if let Some(ref notes) = lead.notes {
        prompt.push_str("\n# Intake notes\n\n");
        prompt.push_str(notes);
        prompt.push('\n');
    }

    prompt.push_str("\n# Output Format\n\n");
    prompt.push_str(
        "Respond with ONLY a valid JSON object (no markdown fences, no commentary) \
         matching this exact schema:\n\n",
    );
    prompt.push_str(
        r#"{
  "score": 0,
  "priority": "HOT|WARM|COLD",
  "summary": "One paragraph on fit and urgency. Cite specifics from the notes."
}"#,
    );
    prompt.push_str(
        "\n\nscore is an integer 0-100: how strong a fit this lead is for a \
         high-end wedding vendor directory and how likely it is to convert.\n",
    );

    prompt
}

const SYSTEM_PROMPT: &str = "You are the lead-qualification analyst for a luxury wedding \
vendor directory. You assess vendor applications and couple inquiries for fit, budget \
signal, and urgency. You respond with strict JSON only.";

// =============================================================================
// Response parsing
// =============================================================================

/// Find the first complete JSON value (`{...}` or `[...]`) in the text.
///
/// Brace-counts outside of strings, honoring escapes, so fenced or chatty
/// output still yields the embedded JSON.
pub fn extract_json_value(text: &str) -> Option<String> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let (open, close) = match bytes[start] {
        b'{' => (b'{', b'}'),
        _ => (b'[', b']'),
    };

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escape {
            escape = false;
            continue;
        }
        if b == b'\\' && in_string {
            escape = true;
            continue;
        }
        if b == b'"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(text[start..=i].to_string());
            }
        }
    }
    None
}

/// Parse a raw model response into an assessment. The raw text rides along
/// on failure so callers can log or surface it.
pub fn parse_assessment(raw: &str) -> Result<QualificationAssessment, AppError> {
    let json_str = extract_json_value(raw).ok_or_else(|| AppError::InvalidResponse {
        message: "No JSON value found in model response".to_string(),
        raw: raw.to_string(),
    })?;

    let mut assessment: QualificationAssessment =
        serde_json::from_str(&json_str).map_err(|e| AppError::InvalidResponse {
            message: format!("Failed to parse assessment JSON: {}", e),
            raw: raw.to_string(),
        })?;

    assessment.score = assessment.score.clamp(0, 100);
    Ok(assessment)
}

// =============================================================================
// Chat-completion call
// =============================================================================

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Ask the qualification model to assess a lead.
pub async fn request_assessment(
    client: &reqwest::Client,
    config: &LlmConfig,
    lead: &DbLead,
) -> Result<QualificationAssessment, AppError> {
    let api_key = config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            AppError::NotConfigured("LLM API key missing (set GARDENIA_LLM_API_KEY)".to_string())
        })?;

    let url = format!("{}/chat/completions", config.api_base.trim_end_matches('/'));
    let body = json!({
        "model": config.model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": build_qualification_prompt(lead) },
        ],
        "temperature": 0.2,
    });

    let resp = client
        .post(&url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::Upstream {
            status: status.as_u16(),
            message: body,
        });
    }

    let completion: ChatCompletionResponse = resp.json().await?;
    let content = completion
        .choices
        .first()
        .map(|c| c.message.content.as_str())
        .unwrap_or_default();

    parse_assessment(content)
}

// =============================================================================
// Tests
// =============================================================================
