/// Execution engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct KodosumiConfig {
    /// Base URL of the Kodosumi panel, e.g. `http://localhost:3370`.
    pub base_url: String,
    pub api_key: String,
}

impl KodosumiConfig {
    /// | Env Var             | Default                 |
    /// |---------------------|-------------------------|
    /// | `KODOSUMI_BASE_URL` | `http://localhost:3370` |
    /// | `KODOSUMI_API_KEY`  | empty                   |
    pub fn from_env() -> Self {
        let base_url = std::env::var("KODOSUMI_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3370".into())
            .trim_end_matches('/')
            .to_string();
        let api_key = std::env::var("KODOSUMI_API_KEY").unwrap_or_default();

        Self { base_url, api_key }
    }
}
