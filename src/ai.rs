use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::debug;

use crate::config::AgentSettings;

// --- Provider trait ---

pub trait AIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
    ClaudeCode,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

fn spec(provider: ProviderKind, model_id: &str, short_name: &str) -> ModelSpec {
    ModelSpec {
        provider,
        model_id: model_id.to_string(),
        short_name: short_name.to_string(),
    }
}

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    match name {
        // `claude` CLI, no API key needed
        "claude-sonnet" | "sonnet" => Ok(spec(ProviderKind::ClaudeCode, "claude-sonnet-4-5-20250929", "claude-sonnet")),
        "claude-opus" | "opus" => Ok(spec(ProviderKind::ClaudeCode, "claude-opus-4-6", "claude-opus")),
        "claude-haiku" | "haiku" => Ok(spec(ProviderKind::ClaudeCode, "claude-haiku-4-5-20251001", "claude-haiku")),
        // ANTHROPIC_API_KEY
        "api-sonnet" => Ok(spec(ProviderKind::Anthropic, "claude-sonnet-4-5-20250929", "api-sonnet")),
        "api-opus" => Ok(spec(ProviderKind::Anthropic, "claude-opus-4-6", "api-opus")),
        "api-haiku" => Ok(spec(ProviderKind::Anthropic, "claude-haiku-4-5-20251001", "api-haiku")),
        // OPENAI_API_KEY
        "gpt-4o" => Ok(spec(ProviderKind::OpenAI, "gpt-4o", "gpt-4o")),
        "gpt-4o-mini" => Ok(spec(ProviderKind::OpenAI, "gpt-4o-mini", "gpt-4o-mini")),
        "gpt-5.2" | "gpt5" => Ok(spec(ProviderKind::OpenAI, "gpt-5.2", "gpt-5.2")),
        _ => Err(anyhow!(
            "Unknown model '{}'. Available: claude-sonnet (default), claude-opus, claude-haiku, \
             api-sonnet, api-opus, api-haiku, gpt-4o, gpt-4o-mini, gpt-5.2",
            name
        )),
    }
}

pub fn create_provider(spec: &ModelSpec, temperature: f32) -> Result<Box<dyn AIProvider>> {
    debug!(model = %spec.short_name, model_id = %spec.model_id, temperature, "creating AI provider");
    match spec.provider {
        ProviderKind::ClaudeCode => Ok(Box::new(ClaudeCodeProvider::new(spec.model_id.clone())?)),
        ProviderKind::Anthropic => Ok(Box::new(AnthropicProvider::new(
            spec.model_id.clone(),
            temperature,
        )?)),
        ProviderKind::OpenAI => Ok(Box::new(OpenAIProvider::new(
            spec.model_id.clone(),
            temperature,
        )?)),
    }
}

/// Builds the provider configured for one agent.
pub fn provider_for(agent: &AgentSettings) -> Result<Box<dyn AIProvider>> {
    let spec = resolve_model(&agent.model)?;
    create_provider(&spec, agent.temperature)
}

// --- Anthropic provider ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    temperature: f32,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(model_id: String, temperature: f32) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set. Set it with: export ANTHROPIC_API_KEY=your-key-here")?;
        let client = reqwest::blocking::Client::new();
        Ok(Self {
            api_key,
            model_id,
            temperature,
            client,
        })
    }
}

impl AIProvider for AnthropicProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model_id.clone(),
            max_tokens,
            temperature: self.temperature,
            messages: vec![ChatMessage::user(prompt)],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Anthropic API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: AnthropicResponse = response
            .json()
            .context("Failed to parse Anthropic API response")?;

        let text: String = api_response
            .content
            .into_iter()
            .map(|block| block.text)
            .collect();
        if text.trim().is_empty() {
            return Err(anyhow!("No content in Anthropic API response"));
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Claude Code provider (shells out to `claude` CLI) ---

#[derive(Debug)]
pub struct ClaudeCodeProvider {
    model_id: String,
}

impl ClaudeCodeProvider {
    pub fn new(model_id: String) -> Result<Self> {
        std::process::Command::new("claude")
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .context("'claude' CLI not found. Install it or use api-sonnet/gpt-4o instead.")?;
        Ok(Self { model_id })
    }
}

impl AIProvider for ClaudeCodeProvider {
    // The CLI has no temperature or token limit flags.
    fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        let output = std::process::Command::new("claude")
            .arg("-p")
            .arg(prompt)
            .arg("--model")
            .arg(&self.model_id)
            .output()
            .context("Failed to run 'claude' CLI")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("claude CLI failed: {}", stderr));
        }

        let response =
            String::from_utf8(output.stdout).context("Invalid UTF-8 in claude CLI output")?;

        if response.trim().is_empty() {
            return Err(anyhow!("Empty response from claude CLI"));
        }

        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    temperature: f32,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(model_id: String, temperature: f32) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set. Set it with: export OPENAI_API_KEY=your-key-here")?;
        let client = reqwest::blocking::Client::new();
        Ok(Self {
            api_key,
            model_id,
            temperature,
            client,
        })
    }
}

impl AIProvider for OpenAIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model_id.clone(),
            max_tokens,
            temperature: self.temperature,
            messages: vec![ChatMessage::user(prompt)],
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OpenAIResponse = response
            .json()
            .context("Failed to parse OpenAI API response")?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_claude_code() {
        let spec = resolve_model("claude-sonnet").unwrap();
        assert_eq!(spec.model_id, "claude-sonnet-4-5-20250929");
        assert_eq!(spec.provider, ProviderKind::ClaudeCode);

        let spec = resolve_model("sonnet").unwrap();
        assert_eq!(spec.short_name, "claude-sonnet");

        let spec = resolve_model("haiku").unwrap();
        assert_eq!(spec.provider, ProviderKind::ClaudeCode);
    }

    #[test]
    fn test_resolve_model_anthropic_api() {
        let spec = resolve_model("api-sonnet").unwrap();
        assert_eq!(spec.model_id, "claude-sonnet-4-5-20250929");
        assert_eq!(spec.provider, ProviderKind::Anthropic);
    }

    #[test]
    fn test_resolve_model_openai() {
        let spec = resolve_model("gpt-4o").unwrap();
        assert_eq!(spec.provider, ProviderKind::OpenAI);

        let spec = resolve_model("gpt5").unwrap();
        assert_eq!(spec.short_name, "gpt-5.2");
    }

    #[test]
    fn test_resolve_model_unknown() {
        let err = resolve_model("gpt-3").unwrap_err();
        assert!(err.to_string().contains("Unknown model 'gpt-3'"));
    }

    #[test]
    fn test_anthropic_request_carries_temperature() {
        let request = AnthropicRequest {
            model: "m".to_string(),
            max_tokens: 10,
            temperature: 0.25,
            messages: vec![ChatMessage::user("hi")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["temperature"], 0.25);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_anthropic_provider_requires_api_key() {
        let original = env::var("ANTHROPIC_API_KEY").ok();
        unsafe { env::remove_var("ANTHROPIC_API_KEY"); }

        let result = AnthropicProvider::new("claude-sonnet-4-5-20250929".to_string(), 0.1);

        if let Some(val) = original {
            unsafe { env::set_var("ANTHROPIC_API_KEY", val); }
        }

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let original = env::var("OPENAI_API_KEY").ok();
        unsafe { env::remove_var("OPENAI_API_KEY"); }

        let result = OpenAIProvider::new("gpt-4o".to_string(), 0.1);

        if let Some(val) = original {
            unsafe { env::set_var("OPENAI_API_KEY", val); }
        }

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("OPENAI_API_KEY"));
    }
}
