use std::path::PathBuf;

const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_DATA_DIR: &str = "unitutor_data";

/// Client configuration, read once at startup from the environment
/// (a `.env` file is honored via dotenv).
pub struct Config {
    pub gateway_url: String,
    pub access_token: Option<String>,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let gateway_url = std::env::var("UNITUTOR_GATEWAY_URL")
            .unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
        let access_token = std::env::var("UNITUTOR_TOKEN").ok();
        let data_dir = std::env::var("UNITUTOR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        Self {
            gateway_url,
            access_token,
            data_dir,
        }
    }

    pub fn chat_url(&self) -> String {
        format!("{}/course-chat", self.gateway_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_url_handles_trailing_slash() {
        let config = Config {
            gateway_url: "http://localhost:3000/".to_string(),
            access_token: None,
            data_dir: PathBuf::from("unitutor_data"),
        };
        assert_eq!(config.chat_url(), "http://localhost:3000/course-chat");
    }
}
