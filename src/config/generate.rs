pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# PRICE RELAY CONFIGURATION
# =============================================================================
# This file configures the process: where state lives, how to reach the chat
# platform bridge and the text generation API, and the schedule timings.
#
# Bot settings (channels, fee, credentials, schedule interval) are stored in
# the database and edited through the HTTP API. The `defaults` section below
# only seeds them the first time the database is created.
#
# Any value may reference an environment variable with $env{...} syntax.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/price-relay/config.yml
#   3. /etc/price-relay/config.yml

# =============================================================================
# STORAGE SETTINGS
# =============================================================================

storage:
  # Path to DuckDB database file
  path: ~/.local/share/price-relay/relay.duckdb

# =============================================================================
# WEB SERVER SETTINGS
# =============================================================================

web:
  listen: 127.0.0.1:8000
  # Set to 0.0.0.0:8000 to allow external connections
  # Optional directory with a built admin frontend, served at /
  # static_dir: /usr/share/price-relay/frontend

# =============================================================================
# SCHEDULER SETTINGS
# =============================================================================

scheduler:
  # Pause between scheduler ticks
  tick: 60s
  # Pause after each published cluster
  publish_delay: 5s
  # Messages fetched per source channel per run
  batch_size: 20

# =============================================================================
# TEXT GENERATION API
# =============================================================================

text_generation:
  endpoint: https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent
  timeout: 30s

# =============================================================================
# CHAT PLATFORM BRIDGE
# =============================================================================

platform:
  url: http://127.0.0.1:9000
  # Session name; the bridge keeps one authorized session per name
  session: message_bot
  timeout: 30s
  # A requested login code blocks new requests for this long
  login_code_ttl: 5m

# =============================================================================
# INITIAL BOT SETTINGS
# =============================================================================

defaults:
  admin_password: change-me
  api_id: 0
  api_hash: ""
  phone_number: ""
  source_channels: []
  target_channel: ""
  add_fee: 0
  gemini_api_key: ""
  is_active: true
  interval_minutes: 60
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse::parse_config;

    #[test]
    fn test_starter_config_is_valid() {
        let config = parse_config(&generate_starter_config()).unwrap();
        assert_eq!(config.web.listen, "127.0.0.1:8000");
        assert_eq!(config.scheduler.batch_size, 20);
        assert_eq!(config.defaults.settings.interval_minutes, 60);
        assert_eq!(config.defaults.admin_password, "change-me");
    }
}
