//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "SilverStream Assistant".to_string()
}

pub fn default_data_dir() -> String {
    "~/.silvia".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_prefix() -> Option<String> {
    Some("!silvia".to_string())
}

pub fn default_apology() -> String {
    "Sorry, I encountered an error while processing your request.".to_string()
}

pub fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

pub fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

pub fn default_bridge_url() -> String {
    "ws://127.0.0.1:3001".to_string()
}

pub fn default_knowledge_table() -> String {
    "knowledge_base".to_string()
}

pub fn default_max_connections() -> u32 {
    10
}

pub fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_api_port() -> u16 {
    3000
}
