pub const DEFAULT_CONFIG_TOML: &str = r#"[tool]
program = "gemini"
timeout_secs = 120
api_key_env = "GEMINI_API_KEY"

[models]
available = ["gemini-2.5-pro", "gemini-2.5-flash"]
"#;
