use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct Config {
    #[arg(long, env, default_value = "0.0.0.0:8080")]
    pub bind_addr: String,
    #[arg(long, env, default_value = "http://localhost:11434")]
    pub ollama_url: String,
    #[arg(long, env, default_value = "gemma3:1b")]
    pub model: String,
    #[arg(long, env, default_value_t = 120)]
    pub request_timeout_secs: u64,
    #[arg(long, env, default_value_t = 1024)]
    pub max_tokens: i32,
    #[arg(long, env, default_value_t = 0.4)]
    pub temp: f32,
    #[arg(long, env, default_value_t = 0.9)]
    pub top_p: f32,
    #[arg(long, env, default_value_t = 1.1)]
    pub repeat_penalty: f32,
    /// Comma separated; empty allows any origin.
    #[arg(long, env, value_delimiter = ',')]
    pub cors_allow_origins: Vec<String>,
    /// Accepts 1/0, true/false, yes/no, on/off.
    #[arg(long, env, value_parser = clap::builder::BoolishValueParser::new())]
    pub disable_metrics: bool,
}
