use serde::Deserialize;

fn default_domain() -> String {
    "login".to_string()
}

fn default_api_version() -> String {
    "59.0".to_string()
}

/// Salesforce connection and the primary query.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SfdcConfig {
    pub username: String,
    pub password: String,
    pub security_token: String,
    pub query_string: String,
    /// Login host prefix: `login`, `test`, or a My Domain name.
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl std::fmt::Debug for SfdcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SfdcConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .field("security_token", &"***")
            .field("query_string", &self.query_string)
            .field("domain", &self.domain)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl SfdcConfig {
    pub(crate) fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (field, value) in [
            ("sfdc.username", &self.username),
            ("sfdc.password", &self.password),
            ("sfdc.security_token", &self.security_token),
            ("sfdc.query_string", &self.query_string),
            ("sfdc.api_version", &self.api_version),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{field} must not be empty"));
            }
        }
        let domain_ok = !self.domain.is_empty()
            && self
                .domain
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
        if !domain_ok {
            problems.push(format!("sfdc.domain '{}' is not a valid host prefix", self.domain));
        }
        problems
    }
}
