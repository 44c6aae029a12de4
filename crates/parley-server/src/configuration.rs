use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use parley::{
    agent::DEFAULT_AGENT_NAME,
    gateway::DEFAULT_SYSTEM_PROMPT,
    providers::{
        configs::{
            OllamaProviderConfig, OpenAiProviderConfig, ProviderConfig,
            DEFAULT_TIMEOUT_SECS,
        },
        ollama,
    },
};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                env_var: to_env_var("server.host"),
                message: e.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    Native {
        #[serde(default = "default_ollama_host")]
        host: String,
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Agent {
        host: String,
        #[serde(default)]
        api_key: String,
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        #[serde(default = "default_agent_name")]
        agent_name: String,
        #[serde(default = "default_streaming")]
        streaming: bool,
    },
}

impl ProviderSettings {
    pub fn agent_name(&self) -> Option<String> {
        match self {
            ProviderSettings::Native { .. } => None,
            ProviderSettings::Agent { agent_name, .. } => Some(agent_name.clone()),
        }
    }

    // Convert to the parley ProviderConfig
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::Native {
                host,
                model,
                timeout_secs,
            } => ProviderConfig::Ollama(OllamaProviderConfig {
                host,
                model,
                timeout_secs,
            }),
            ProviderSettings::Agent {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
                timeout_secs,
                agent_name: _,
                streaming,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
                timeout_secs,
                streaming,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub gateway: GatewaySettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            match missing_field_path(&err) {
                Some(field) => ConfigError::MissingEnvVar {
                    env_var: to_env_var(&field),
                },
                None => ConfigError::Other(err),
            }
        })
    }
}

/// Recover the dotted settings path from a missing-field error
///
/// Errors read like "missing field `host` for key `provider`" or, for fields
/// at the root, "missing field `provider`".
fn missing_field_path(err: &config::ConfigError) -> Option<String> {
    if let config::ConfigError::NotFound(field) = err {
        return Some(field.clone());
    }

    let message = err.to_string();
    if !message.starts_with("missing field") {
        return None;
    }
    let parts: Vec<&str> = message.split('`').collect();
    let field = *parts.get(1)?;
    let path = match parts.get(3) {
        Some(key) if parts[2].contains("for key") => format!("{}.{}", key, field),
        _ => field.to_string(),
    };

    // Without a provider section the type is the variable to set first
    if path == "provider" {
        Some("provider.type".to_string())
    } else {
        Some(path)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_ollama_host() -> String {
    ollama::OLLAMA_HOST.to_string()
}

fn default_ollama_model() -> String {
    ollama::OLLAMA_MODEL.to_string()
}

fn default_agent_name() -> String {
    DEFAULT_AGENT_NAME.to_string()
}

fn default_streaming() -> bool {
    true
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("PARLEY_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_native_defaults() {
        clean_env();
        env::set_var("PARLEY_PROVIDER__TYPE", "native");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.gateway.system_prompt, DEFAULT_SYSTEM_PROMPT);

        if let ProviderSettings::Native {
            host,
            model,
            timeout_secs,
        } = settings.provider
        {
            assert_eq!(host, "http://localhost:11434");
            assert_eq!(model, "qwen2.5");
            assert_eq!(timeout_secs, 60);
        } else {
            panic!("Expected native provider");
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_agent_settings() {
        clean_env();
        env::set_var("PARLEY_PROVIDER__TYPE", "agent");
        env::set_var("PARLEY_PROVIDER__HOST", "https://api-inference.example.com/v1/");
        env::set_var("PARLEY_PROVIDER__API_KEY", "test-key");
        env::set_var("PARLEY_PROVIDER__MODEL", "qwen-plus");
        env::set_var("PARLEY_PROVIDER__TEMPERATURE", "0.7");
        env::set_var("PARLEY_PROVIDER__MAX_TOKENS", "2000");
        env::set_var("PARLEY_GATEWAY__SYSTEM_PROMPT", "You are a pirate.");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.gateway.system_prompt, "You are a pirate.");
        assert_eq!(settings.provider.agent_name().as_deref(), Some("chat_assistant"));

        if let ProviderConfig::OpenAi(config) = settings.provider.into_config() {
            assert_eq!(config.host, "https://api-inference.example.com/v1/");
            assert_eq!(config.api_key, "test-key");
            assert_eq!(config.model, "qwen-plus");
            assert_eq!(config.temperature, Some(0.7));
            assert_eq!(config.max_tokens, Some(2000));
            assert_eq!(config.timeout_secs, 60);
            assert!(config.streaming);
        } else {
            panic!("Expected agent provider");
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_agent_streaming_can_be_disabled() {
        clean_env();
        env::set_var("PARLEY_PROVIDER__TYPE", "agent");
        env::set_var("PARLEY_PROVIDER__HOST", "https://api.example.com/v1");
        env::set_var("PARLEY_PROVIDER__MODEL", "qwen-plus");
        env::set_var("PARLEY_PROVIDER__STREAMING", "false");

        let settings = Settings::new().unwrap();
        match settings.provider.into_config() {
            ProviderConfig::OpenAi(config) => assert!(!config.streaming),
            other => panic!("Expected agent provider, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("PARLEY_SERVER__PORT", "8080");
        env::set_var("PARLEY_SERVER__HOST", "0.0.0.0");
        env::set_var("PARLEY_PROVIDER__TYPE", "native");
        env::set_var("PARLEY_PROVIDER__HOST", "http://gpu-box:11434/v1");
        env::set_var("PARLEY_PROVIDER__MODEL", "llama3");
        env::set_var("PARLEY_PROVIDER__TIMEOUT_SECS", "120");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(
            settings.server.socket_addr().unwrap().to_string(),
            "0.0.0.0:8080"
        );

        if let ProviderConfig::Ollama(config) = settings.provider.into_config() {
            assert_eq!(config.host, "http://gpu-box:11434/v1");
            assert_eq!(config.model, "llama3");
            assert_eq!(config.timeout_secs, 120);
        } else {
            panic!("Expected native provider");
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_provider_names_env_var() {
        clean_env();

        match Settings::new() {
            Err(ConfigError::MissingEnvVar { env_var }) => {
                assert_eq!(env_var, "PARLEY_PROVIDER__TYPE");
            }
            other => panic!("Expected missing env var error, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_missing_agent_model_names_env_var() {
        clean_env();
        env::set_var("PARLEY_PROVIDER__TYPE", "agent");
        env::set_var("PARLEY_PROVIDER__HOST", "https://api.example.com/v1");

        match Settings::new() {
            Err(ConfigError::MissingEnvVar { env_var }) => {
                assert!(env_var.ends_with("MODEL"), "unexpected {}", env_var);
            }
            other => panic!("Expected missing env var error, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");

        let bad = ServerSettings {
            host: "not a host".to_string(),
            port: 3000,
        };
        assert!(matches!(
            bad.socket_addr(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
