use reqwest::Url;
use serde::Deserialize;

fn default_host() -> String {
    "https://api.cognitedata.com".to_string()
}

/// CDF project and credentials used for RAW uploads.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CogniteConfig {
    pub project: String,
    #[serde(default = "default_host")]
    pub host: String,
    pub idp_authentication: IdpAuthentication,
}

/// OAuth2 client-credentials settings.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdpAuthentication {
    pub client_id: String,
    pub secret: String,
    pub token_url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for IdpAuthentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdpAuthentication")
            .field("client_id", &self.client_id)
            .field("secret", &"***")
            .field("token_url", &self.token_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl CogniteConfig {
    pub fn host_url(&self) -> Option<Url> {
        Url::parse(&self.host).ok()
    }

    pub fn token_url(&self) -> Option<Url> {
        Url::parse(&self.idp_authentication.token_url).ok()
    }

    pub(crate) fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.project.trim().is_empty() {
            problems.push("cognite.project must not be empty".to_string());
        }
        if self.host_url().is_none() {
            problems.push(format!("cognite.host '{}' is not a valid URL", self.host));
        }
        let idp = &self.idp_authentication;
        if idp.client_id.trim().is_empty() {
            problems.push("cognite.idp_authentication.client_id must not be empty".to_string());
        }
        if idp.secret.is_empty() {
            problems.push("cognite.idp_authentication.secret must not be empty".to_string());
        }
        if self.token_url().is_none() {
            problems.push(format!(
                "cognite.idp_authentication.token_url '{}' is not a valid URL",
                idp.token_url
            ));
        }
        problems
    }
}
