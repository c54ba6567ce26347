//! Username/password/security-token login against the Salesforce partner SOAP API.

use crate::error::ConnectorError;
use reqwest::{Client, Url};
use tracing::{debug, info};

const SERVICE: &str = "Salesforce";
const PARTNER_NS: &str = "urn:partner.soap.sforce.com";
const CLIENT_ID: &str = "sfdc-extractor";

/// Credentials for the login call. The security token is appended to the password.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub security_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("security_token", &"***")
            .finish()
    }
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginSession {
    pub session_id: String,
    /// Base URL of the org instance, e.g. `https://acme.my.salesforce.com`.
    pub instance_url: Url,
}

/// Builds the SOAP login endpoint for a login domain (`login`, `test`, or a My Domain prefix).
pub fn login_url(domain: &str, api_version: &str) -> Result<Url, ConnectorError> {
    let raw = format!("https://{domain}.salesforce.com/services/Soap/u/{api_version}");
    Url::parse(&raw).map_err(|e| ConnectorError::Url(format!("{raw}: {e}")))
}

pub async fn login(
    http: &Client,
    domain: &str,
    api_version: &str,
    credentials: &Credentials,
) -> Result<LoginSession, ConnectorError> {
    let url = login_url(domain, api_version)?;
    info!(domain, username = %credentials.username, "Logging in to Salesforce");

    let response = http
        .post(url)
        .header("Content-Type", "text/xml; charset=UTF-8")
        .header("SOAPAction", "login")
        .body(login_envelope(credentials))
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    debug!(%status, "Salesforce login response received");

    // Faults come back as HTTP 500 with a SOAP fault body.
    if let Some((code, message)) = parse_fault(&body)? {
        return Err(ConnectorError::LoginFault { code, message });
    }
    if !status.is_success() {
        return Err(ConnectorError::Api {
            service: SERVICE,
            status,
            code: None,
            message: body,
        });
    }

    parse_login_response(&body)
}

fn login_envelope(credentials: &Credentials) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<env:Envelope
        xmlns:xsd="http://www.w3.org/2001/XMLSchema"
        xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
        xmlns:env="http://schemas.xmlsoap.org/soap/envelope/"
        xmlns:urn="{ns}">
    <env:Header>
        <urn:CallOptions>
            <urn:client>{client}</urn:client>
            <urn:defaultNamespace>sf</urn:defaultNamespace>
        </urn:CallOptions>
    </env:Header>
    <env:Body>
        <n1:login xmlns:n1="{ns}">
            <n1:username>{username}</n1:username>
            <n1:password>{password}{token}</n1:password>
        </n1:login>
    </env:Body>
</env:Envelope>"#,
        ns = PARTNER_NS,
        client = CLIENT_ID,
        username = escape_xml(&credentials.username),
        password = escape_xml(&credentials.password),
        token = escape_xml(&credentials.security_token),
    )
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn element_text<'a>(doc: &'a roxmltree::Document, name: &str) -> Option<&'a str> {
    doc.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(str::trim)
}

fn parse_fault(body: &str) -> Result<Option<(String, String)>, ConnectorError> {
    if !body.contains("Fault") {
        return Ok(None);
    }
    let doc = roxmltree::Document::parse(body)?;
    let Some(message) = element_text(&doc, "faultstring") else {
        return Ok(None);
    };
    // faultcode is namespaced, e.g. "sf:INVALID_LOGIN"
    let code = element_text(&doc, "faultcode")
        .map(|c| c.rsplit(':').next().unwrap_or(c).to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    Ok(Some((code, message.to_string())))
}

pub(crate) fn parse_login_response(body: &str) -> Result<LoginSession, ConnectorError> {
    let doc = roxmltree::Document::parse(body)?;

    let session_id = element_text(&doc, "sessionId")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConnectorError::protocol(SERVICE, "login response has no sessionId"))?;
    let server_url = element_text(&doc, "serverUrl")
        .ok_or_else(|| ConnectorError::protocol(SERVICE, "login response has no serverUrl"))?;

    let server_url = Url::parse(server_url)
        .map_err(|e| ConnectorError::Url(format!("{server_url}: {e}")))?;
    let host = server_url
        .host_str()
        .ok_or_else(|| ConnectorError::Url(format!("{server_url}: missing host")))?;
    let instance_url = Url::parse(&format!("{}://{}", server_url.scheme(), host))
        .map_err(|e| ConnectorError::Url(e.to_string()))?;

    Ok(LoginSession {
        session_id: session_id.to_string(),
        instance_url,
    })
}
