use super::{
    anthropic::AnthropicProvider, base::Provider, configs::ProviderConfig,
    openai::OpenAiProvider,
};
use anyhow::Result;

pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn Provider>> {
    match config {
        ProviderConfig::OpenAi(openai_config) => Ok(Box::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::Anthropic(anthropic_config) => {
            Ok(Box::new(AnthropicProvider::new(anthropic_config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::configs::{AnthropicProviderConfig, OpenAiProviderConfig};

    #[test]
    fn test_get_provider_keeps_model() -> Result<()> {
        let openai = ProviderConfig::OpenAi(OpenAiProviderConfig {
            host: "https://api.openai.com".to_string(),
            api_key: "key".to_string(),
            model: "gpt-4o".to_string(),
            temperature: None,
            max_tokens: None,
        });
        assert_eq!(get_provider(openai)?.model(), "gpt-4o");

        let anthropic = ProviderConfig::Anthropic(AnthropicProviderConfig {
            host: "https://api.anthropic.com".to_string(),
            api_key: "key".to_string(),
            model: "claude-3-5-sonnet-latest".to_string(),
            temperature: None,
            max_tokens: Some(2048),
        });
        assert_eq!(get_provider(anthropic)?.model(), "claude-3-5-sonnet-latest");
        Ok(())
    }
}
