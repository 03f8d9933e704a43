//! `deepbrief config`: Configuration management commands.

use deepbrief_config::AppConfig;

const REDACTED: &str = "[REDACTED]";

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run `deepbrief config init`.");
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Created config.toml at: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("   1. Optionally set OPENAI_API_KEY for LLM-written briefs");
    println!("   2. Run: deepbrief research \"your topic\"");
    Ok(())
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed and validated");

            let mut warnings = Vec::new();
            if config.llm_api_key().is_none() {
                warnings.push("No LLM API key set, briefs will contain key points only");
            }
            if config.tools.web_search.engine == "serpapi"
                && config.tools.web_search.api_key.is_none()
            {
                warnings.push("Search engine is serpapi but SERPAPI_API_KEY is not set");
            }
            if config.gateway.host == "0.0.0.0" {
                warnings.push("Gateway binds to all interfaces");
            }

            for w in &warnings {
                println!("   warning: {w}");
            }

            println!();
            println!("   Provider:  {}", config.default_provider);
            println!("   Model:     {}", config.llm_model());
            println!("   Search:    {}", config.tools.web_search.engine);
            println!(
                "   Gateway:   {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!(
                "   Memory:    {} tokens, {}s ttl",
                config.memory.max_token_limit, config.memory.ttl
            );
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    redact_secrets(&mut config);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

fn redact_secrets(config: &mut AppConfig) {
    let secrets = std::iter::once(&mut config.api_key)
        .chain(std::iter::once(&mut config.tools.web_search.api_key))
        .chain(config.providers.values_mut().map(|p| &mut p.api_key));
    for secret in secrets.filter(|s| s.is_some()) {
        *secret = Some(REDACTED.into());
    }
}
