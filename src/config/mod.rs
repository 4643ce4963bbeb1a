use std::env;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub infrahub_address: String,
    pub infrahub_ui_url: String,
    pub api_token: String,
    pub listen_addr: String,
    pub default_branch: String,
    pub generator_wait_time: u64,
    pub api_timeout: u64,
    pub api_retry_count: u32,
    pub git_local: bool,
    pub templates_dir: String,
    pub output_dir: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        let infrahub_address = get_env("INFRAHUB_ADDRESS", "http://localhost:8000");
        let infrahub_ui_url = get_env("INFRAHUB_UI_URL", &infrahub_address);

        Self {
            infrahub_ui_url,
            infrahub_address,
            api_token: get_env("INFRAHUB_API_TOKEN", ""),
            listen_addr: get_env("LISTEN_ADDR", "0.0.0.0:8501"),
            default_branch: get_env("DEFAULT_BRANCH", "main"),
            generator_wait_time: get_env("GENERATOR_WAIT_TIME", "60")
                .parse()
                .unwrap_or(60),
            api_timeout: get_env("API_TIMEOUT", "30").parse().unwrap_or(30),
            api_retry_count: get_env("API_RETRY_COUNT", "3").parse().unwrap_or(3),
            git_local: get_env("INFRAHUB_GIT_LOCAL", "false").eq_ignore_ascii_case("true"),
            templates_dir: get_env("TEMPLATES_DIR", "templates"),
            output_dir: get_env("OUTPUT_DIR", "generated-configs"),
        }
    }

    /// Check the loaded values, returning one message per problem found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.infrahub_address.trim().is_empty() {
            errors.push("INFRAHUB_ADDRESS cannot be empty".to_string());
        }

        match self.listen_addr.rsplit_once(':').map(|(_, p)| p.parse::<u32>()) {
            Some(Ok(port)) if (1..=65535).contains(&port) => {}
            Some(Ok(port)) => errors.push(format!("Listen port must be between 1 and 65535, got {}", port)),
            _ => errors.push(format!("LISTEN_ADDR has no valid port: {}", self.listen_addr)),
        }

        if self.api_timeout == 0 {
            errors.push("API_TIMEOUT must be positive".to_string());
        }

        if self.default_branch.trim().is_empty() {
            errors.push("DEFAULT_BRANCH cannot be empty".to_string());
        }

        errors
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            infrahub_address: "http://localhost:8000".to_string(),
            infrahub_ui_url: "http://localhost:8000".to_string(),
            api_token: String::new(),
            listen_addr: "0.0.0.0:8501".to_string(),
            default_branch: "main".to_string(),
            generator_wait_time: 60,
            api_timeout: 30,
            api_retry_count: 3,
            git_local: false,
            templates_dir: "templates".to_string(),
            output_dir: "generated-configs".to_string(),
        }
    }

    #[test]
    fn test_validate_defaults() {
        assert!(sample().validate().is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = sample();
        cfg.infrahub_address = " ".to_string();
        cfg.listen_addr = "0.0.0.0:70000".to_string();
        cfg.api_timeout = 0;
        cfg.default_branch = String::new();

        let errors = cfg.validate();
        assert_eq!(errors.len(), 4);
        assert!(errors[1].contains("70000"));
    }

    #[test]
    fn test_validate_missing_port() {
        let mut cfg = sample();
        cfg.listen_addr = "localhost".to_string();
        assert_eq!(cfg.validate().len(), 1);
    }
}
