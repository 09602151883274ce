use serde::{Deserialize, Serialize};

/// Inference provider behind the completion duties
///
/// Both variants speak the OpenAI chat completion protocol; Ollama is
/// reached through its OpenAI-compatible `/v1` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Provider {
    OpenAI {
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
    },
    Ollama {
        model: String,
        base_url: String,
    },
}

impl Provider {
    /// OpenAI provider, empty key or URL meaning "use the client default"
    pub fn openai(model: impl Into<String>, api_key: Option<&str>, base_url: Option<&str>) -> Self {
        let non_empty = |s: Option<&str>| s.filter(|v| !v.is_empty()).map(str::to_string);
        Self::OpenAI {
            model: model.into(),
            api_key: non_empty(api_key),
            base_url: non_empty(base_url),
        }
    }

    pub fn ollama(model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::Ollama {
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::OpenAI { model, .. } | Self::Ollama { model, .. } => model,
        }
    }
}

impl Default for Provider {
    fn default() -> Self {
        Self::openai("gpt-4o-mini", None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_dropped() {
        let provider = Provider::openai("gpt-4o-mini", Some(""), Some("http://localhost:8080/v1"));
        match provider {
            Provider::OpenAI { api_key, base_url, .. } => {
                assert!(api_key.is_none());
                assert_eq!(base_url.as_deref(), Some("http://localhost:8080/v1"));
            }
            Provider::Ollama { .. } => panic!("expected OpenAI provider"),
        }
    }
}
