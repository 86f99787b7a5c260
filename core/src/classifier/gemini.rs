//! Gemini `generateContent` adapter.

use super::{parse_model_output, Classification, Classifier, ClassifierError};
use crate::config::ClassifierConfig;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const SYSTEM_INSTRUCTION: &str = "\
You classify customer complaints for an e-commerce support desk.

For each complaint:
1. Pick the best-matching category (the `type`) and the specific `issue` inside it.
2. Label the sentiment as Positive, Neutral or Negative.
3. Assign a priorityScore from 1 to 5:
   1 - minor: high delivery charges, cashback delays, excessive packaging
   2 - medium-low: refund delays, incorrect order details, chat support issues
   3 - medium: late deliveries, defective products, return issues
   4 - high: wrong product delivered, package lost, refund not processed, account security
   5 - urgent: fraud, unauthorized transactions, severe service failures

Categories and typical issues:
- Delivery Issues: late delivery, order not delivered, partial order, wrong product delivered,
  package lost or damaged in transit, courier misbehavior, marked delivered but not received,
  high delivery charges, no tracking updates
- Payment & Refund Issues: payment failed but money deducted, refund delayed, refund not processed,
  unexpected extra charges, cashback not received, payment gateway error, double payment, EMI issue
- Order Placement Issues: unable to place order, order stuck in processing, order canceled
  automatically, incorrect order details after payment
- Product Quality Issues: fake, used, expired, defective, wrong color/size, damaged by poor packaging
- Return & Exchange Issues: return rejected unfairly, pickup delayed, exchange denied,
  wrong item picked up
- Customer Support Complaints: support not responding, unhelpful support, automated responses,
  no escalation
- Policy-Related Complaints: no return policy for defects, hidden refund terms,
  subscription cancellation difficulty, misleading offers
- Account & Security Issues: unauthorized login attempts, account blocked, password reset failure,
  order placed without consent
- Seller / Vendor Issues: seller denied eligible return, seller fraud, wrong seller contact,
  seller refusing invoice
- Miscellaneous: environmental concerns, no way to give product feedback

Reply with a single JSON object and nothing else:
{\"type\": \"<category>\", \"issue\": \"<issue>\", \"priorityScore\": <1-5>, \"sentiment\": \"<Positive|Neutral|Negative>\"}

If the text is not a customer complaint, reply with an empty string.";

pub struct GeminiClassifier {
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    http_client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClassifier {
    pub fn new(config: &ClassifierConfig, api_key: String) -> Result<Self, ClassifierError> {
        if api_key.trim().is_empty() {
            return Err(ClassifierError::Unavailable("empty API key".into()));
        }
        let http_client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(15)))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
            http_client,
        })
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": [{ "text": text }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "topP": self.top_p,
                "topK": self.top_k,
                "maxOutputTokens": self.max_output_tokens,
                "responseMimeType": "text/plain",
            },
        })
    }
}

impl Classifier for GeminiClassifier {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(text))
            .send()
            .map_err(|e| ClassifierError::Unavailable(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(ClassifierError::Unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let payload: GenerateContentResponse = response
            .json()
            .map_err(|e| ClassifierError::InvalidFormat(format!("unreadable envelope: {e}")))?;

        let reply: String = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        log::debug!("gemini: model={} reply_len={}", self.model, reply.len());
        parse_model_output(&reply)
    }
}
