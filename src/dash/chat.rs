// Client for an OpenAI-compatible chat completion service.

use std::time::Duration;

use lab_aggregation::query::{
    ConversationalQuery, ExternalServiceError, QueryContext, DEFAULT_SAMPLE_ROWS,
};
use log::{debug, info};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::dash::config_reader::ChatConfig;

const SYSTEM_PROMPT: &str = "You are a helpful data analyst assistant. \
                             Answer questions based on the uploaded lab testing dataset.";

#[derive(PartialEq, Debug, Clone)]
pub struct ChatSettings {
    pub api_url: String,
    pub model: String,
    pub sample_rows: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        ChatSettings {
            api_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            sample_rows: DEFAULT_SAMPLE_ROWS,
            temperature: 0.3,
            max_tokens: 500,
            timeout_seconds: 60,
        }
    }
}

impl ChatSettings {
    pub fn from_config(config: &ChatConfig) -> ChatSettings {
        let d = ChatSettings::default();
        ChatSettings {
            api_url: config.api_url.clone().unwrap_or(d.api_url),
            model: config.model.clone().unwrap_or(d.model),
            sample_rows: config.sample_rows.unwrap_or(d.sample_rows),
            temperature: config.temperature.unwrap_or(d.temperature),
            max_tokens: config.max_tokens.unwrap_or(d.max_tokens),
            timeout_seconds: config.timeout_seconds.unwrap_or(d.timeout_seconds),
        }
    }
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct OpenAiChat {
    settings: ChatSettings,
    api_key: String,
    http_client: reqwest::blocking::Client,
}

impl OpenAiChat {
    pub fn new(settings: ChatSettings, api_key: String) -> Result<Self, ExternalServiceError> {
        if api_key.trim().is_empty() {
            return Err(ExternalServiceError::Authentication {
                message: "the API key is empty".to_string(),
            });
        }
        let http_client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| ExternalServiceError::Transport {
                message: e.to_string(),
            })?;
        Ok(OpenAiChat {
            settings,
            api_key,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.api_url.trim_end_matches('/')
        )
    }
}

/// The sample as CSV text, with the canonical column names.
fn sample_to_csv(context: &QueryContext) -> Result<String, ExternalServiceError> {
    let unexpected = |e: &dyn std::fmt::Display| ExternalServiceError::Unexpected {
        message: e.to_string(),
    };
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["Franchisee", "Sub Client", "test name", "Lab Partner"])
        .map_err(|e| unexpected(&e))?;
    for r in context.sample() {
        wtr.write_record([
            r.franchisee.as_str(),
            r.sub_client.as_deref().unwrap_or(""),
            r.test_name.as_str(),
            r.lab_partner.as_deref().unwrap_or(""),
        ])
        .map_err(|e| unexpected(&e))?;
    }
    let bytes = wtr.into_inner().map_err(|e| unexpected(&e))?;
    String::from_utf8(bytes).map_err(|e| unexpected(&e))
}

fn build_messages(context: &QueryContext, question: &str) -> Result<Vec<ChatMessage>, ExternalServiceError> {
    let sample = sample_to_csv(context)?;
    Ok(vec![
        ChatMessage {
            role: "system".to_string(),
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: "user".to_string(),
            content: format!(
                "Here is a sample of {} out of {} records:\n{}",
                context.sample().len(),
                context.total_records(),
                sample
            ),
        },
        ChatMessage {
            role: "user".to_string(),
            content: question.to_string(),
        },
    ])
}

fn classify_status(status: StatusCode, body: &str) -> ExternalServiceError {
    let message = format!("{}: {}", status, body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ExternalServiceError::Authentication { message }
        }
        _ => ExternalServiceError::Transport { message },
    }
}

fn extract_answer(response: ChatResponse) -> Result<String, ExternalServiceError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| ExternalServiceError::Unexpected {
            message: "the response contains no answer".to_string(),
        })
}

impl ConversationalQuery for OpenAiChat {
    fn ask(&self, context: &QueryContext, question: &str) -> Result<String, ExternalServiceError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: build_messages(context, question)?,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };
        info!("ask: sending question to {:?}", self.endpoint());
        let resp = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| ExternalServiceError::Transport {
                message: e.to_string(),
            })?;
        let status = resp.status();
        debug!("ask: status {:?}", status);
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        let response: ChatResponse = resp.json().map_err(|e| ExternalServiceError::Unexpected {
            message: e.to_string(),
        })?;
        extract_answer(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_aggregation::builder::DatasetBuilder;

    fn context() -> QueryContext {
        let mut b = DatasetBuilder::new();
        b.add_row_simple(&["Acme", "Acme", "CBC", "LabX"]);
        b.add_row(Some("Beta, Inc"), None, Some("CMP"), None);
        b.add_row_simple(&["Acme", "Sub", "TSH", "LabY"]);
        QueryContext::from_dataset(&b.build().unwrap(), 2)
    }

    #[test]
    fn settings_from_config() {
        let config: ChatConfig =
            serde_json::from_str(r#"{"model": "gpt-4o", "maxTokens": 100}"#).unwrap();
        let s = ChatSettings::from_config(&config);
        assert_eq!(s.model, "gpt-4o");
        assert_eq!(s.max_tokens, 100);
        assert_eq!(s.sample_rows, DEFAULT_SAMPLE_ROWS);
        assert_eq!(s.api_url, "https://api.openai.com/v1");
    }

    #[test]
    fn sample_as_csv() {
        let csv = sample_to_csv(&context()).unwrap();
        assert_eq!(
            csv,
            "Franchisee,Sub Client,test name,Lab Partner\n\
             Acme,Acme,CBC,LabX\n\
             \"Beta, Inc\",,CMP,\n"
        );
    }

    #[test]
    fn messages_carry_sample_and_question() {
        let msgs = build_messages(&context(), "Which lab?").unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role, "system");
        assert!(msgs[1].content.starts_with("Here is a sample of 2 out of 3 records"));
        assert_eq!(msgs[2].content, "Which lab?");
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "invalid key"),
            ExternalServiceError::Authentication { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            ExternalServiceError::Authentication { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            ExternalServiceError::Transport { .. }
        ));
    }

    #[test]
    fn answer_extraction() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "LabX"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_answer(response), Ok("LabX".to_string()));
        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            extract_answer(empty),
            Err(ExternalServiceError::Unexpected { .. })
        ));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            OpenAiChat::new(ChatSettings::default(), " ".to_string()),
            Err(ExternalServiceError::Authentication { .. })
        ));
    }
}
