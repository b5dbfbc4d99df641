use anyhow::Result;
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# Hearth Configuration

[llm]
# OpenAI-compatible or Ollama endpoint
base_url = "http://localhost:8000"
# Empty: read HEARTH_LLM_API_KEY
api_key = ""
model = ""
timeout_secs = 60
temperature = 0.8
top_p = 0.9
max_tokens = 128

[home_assistant]
url = "http://localhost:8123"
# Empty: read HASS_TOKEN
token = ""
location_name = "Home"
# Domains listed in the prompt; empty exposes every entity
expose_domains = []

[conversation]
max_iterations = 10
# "continue" or "abort_remaining"
on_tool_failure = "continue"
# Inline template; empty uses the built-in prompt
prompt = ""
# prompt_file = "~/.config/hearth/prompt.j2"
# Render the prompt with Home Assistant's template engine
remote_templates = false
current_user = ""

[gateway]
host = "127.0.0.1"
port = 8080
allowed_origins = []
"#;

/// Initialize a new config file
pub fn run_init(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Config already exists at {:?}", path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG)?;
    println!("Created config at {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hearth.toml");
        run_init(&path).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.llm.base_url, "http://localhost:8000");
        assert_eq!(config.home_assistant.url, "http://localhost:8123");
        assert!(!config.conversation.remote_templates);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hearth.toml");
        std::fs::write(&path, "keep me").unwrap();

        assert!(run_init(&path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");
    }
}
