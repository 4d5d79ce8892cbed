//! Gateway user backend over the RGW admin ops API.
//!
//! RGW exposes user administration under `/admin/user`: GET reads a user,
//! PUT creates, POST modifies, DELETE removes, and the `key` subresource
//! revokes a credential pair. Every request is SigV4-signed (service `s3`,
//! the signature scheme the admin API shares with the data path); signing is
//! delegated to `aws-sigv4` and transport to `reqwest`.
//!
//! The effective user identifier is `tenant$user_id` when a tenant is set.
//! It is derived once, at backend construction, and used for every call.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, SignableBody, SignableRequest, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::{AdminBackend, ClientError, ClientResult, ConnectionInfo};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A credential pair attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub access_key: String,
    pub secret_key: String,
}

/// Normalized gateway user state.
///
/// Empty strings, the literal `"None"`, and empty lists from the wire are
/// collapsed to `None` so structural comparison is meaningful. `keys` holds
/// the first credential pair; RGW supports several per user but only one is
/// under desired-state control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_buckets: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<KeyPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caps: Option<String>,
}

/// Effective identifier: `tenant$user_id` when a tenant is set.
pub fn effective_uid(tenant: Option<&str>, user_id: &str) -> String {
    match tenant {
        Some(tenant) if !tenant.is_empty() => format!("{}${}", tenant, user_id),
        _ => user_id.to_string(),
    }
}

/// Collapse empty and placeholder strings to `None`.
fn normalize_string(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty() && s != "None")
}

// Wire shapes of the admin ops API. Only the fields under desired-state
// control are read; the rest of the payload (stats, subusers, swift keys)
// is ignored.

#[derive(Debug, Deserialize)]
struct RgwUserInfo {
    user_id: String,
    #[serde(default)]
    tenant: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    max_buckets: Option<i64>,
    #[serde(default)]
    suspended: Option<i64>,
    #[serde(default)]
    keys: Vec<RgwKey>,
    #[serde(default)]
    caps: Vec<RgwCap>,
}

#[derive(Debug, Deserialize)]
struct RgwKey {
    access_key: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct RgwCap {
    #[serde(rename = "type")]
    cap_type: String,
    perm: String,
}

#[derive(Debug, Deserialize)]
struct RgwErrorBody {
    #[serde(rename = "Code", default)]
    code: Option<String>,
}

impl From<RgwUserInfo> for UserState {
    fn from(info: RgwUserInfo) -> Self {
        // Some RGW versions report a tenanted user as `tenant$user_id` in
        // the user_id field instead of filling the tenant field.
        let (tenant, user_id) = match info.user_id.split_once('$') {
            Some((tenant, user_id)) => (Some(tenant.to_string()), user_id.to_string()),
            None => (info.tenant, info.user_id),
        };

        let caps = if info.caps.is_empty() {
            None
        } else {
            Some(
                info.caps
                    .iter()
                    .map(|c| format!("{}={}", c.cap_type, c.perm))
                    .collect::<Vec<_>>()
                    .join(";"),
            )
        };

        UserState {
            user_id,
            tenant: normalize_string(tenant),
            display_name: normalize_string(info.display_name),
            email: normalize_string(info.email),
            max_buckets: info.max_buckets,
            suspended: info.suspended,
            keys: info.keys.into_iter().next().map(|k| KeyPair {
                access_key: k.access_key,
                secret_key: k.secret_key,
            }),
            caps,
        }
    }
}

/// User backend bound to one effective uid.
pub struct UserBackend {
    http: reqwest::Client,
    endpoint: Url,
    region: String,
    credentials: Credentials,
    uid: String,
}

impl UserBackend {
    pub fn new(conn: &ConnectionInfo, uid: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!conn.verify_ssl)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: conn.endpoint_url()?,
            region: conn.region().to_string(),
            credentials: conn.credentials(),
            uid: uid.into(),
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Build, sign, and send one admin request; parse the JSON body if any.
    async fn call(
        &self,
        method: http::Method,
        subresource: Option<&str>,
        query: &[(&str, String)],
    ) -> ClientResult<Option<serde_json::Value>> {
        let mut url = self
            .endpoint
            .join("admin/user")
            .map_err(|e| ClientError::Validation(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(sub) = subresource {
                pairs.append_key_only(sub);
            }
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("format", "json");
        }

        let host_header = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        let mut request = http::Request::builder()
            .method(method)
            .uri(url.as_str())
            .header(http::header::HOST, host_header)
            .body(Vec::new())
            .map_err(|e| ClientError::Validation(e.to_string()))?;

        self.sign(&mut request)?;

        let request = reqwest::Request::try_from(request)
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        debug!(method = %request.method(), url = %request.url(), "admin ops request");
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if status.is_success() {
            if body.is_empty() {
                return Ok(None);
            }
            return serde_json::from_slice(&body)
                .map(Some)
                .map_err(|e| ClientError::Transport(format!("invalid response body: {}", e)));
        }

        let code = serde_json::from_slice::<RgwErrorBody>(&body)
            .ok()
            .and_then(|b| b.code)
            .unwrap_or_else(|| format!("HTTP{}", status.as_u16()));

        if code == "NoSuchUser" || code == "NoSuchKey" || status == http::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }

        Err(ClientError::Domain {
            code,
            message: String::from_utf8_lossy(&body).trim().to_string(),
        })
    }

    /// SigV4-sign a request in place, adding the authorization, date, and
    /// payload-hash headers the gateway verifies.
    fn sign(&self, request: &mut http::Request<Vec<u8>>) -> ClientResult<()> {
        let identity: Identity = self.credentials.clone().into();

        let mut settings = SigningSettings::default();
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name("s3")
            .time(SystemTime::now())
            .settings(settings)
            .build()
            .map_err(|e| ClientError::Validation(e.to_string()))?
            .into();

        let signable = SignableRequest::new(
            request.method().as_str(),
            request.uri().to_string(),
            request
                .headers()
                .iter()
                .map(|(name, value)| (name.as_str(), value.to_str().unwrap_or_default())),
            SignableBody::Bytes(request.body()),
        )
        .map_err(|e| ClientError::Validation(e.to_string()))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| ClientError::Validation(e.to_string()))?
            .into_parts();
        instructions.apply_to_request_http0x(request);
        Ok(())
    }

    /// Query parameters for create/modify, covering only managed fields.
    fn user_params<'a>(&'a self, desired: &UserState) -> Vec<(&'a str, String)> {
        let mut params = vec![("uid", self.uid.clone())];
        params.push((
            "display-name",
            desired.display_name.clone().unwrap_or_default(),
        ));
        params.push(("email", desired.email.clone().unwrap_or_default()));
        if let Some(max_buckets) = desired.max_buckets {
            params.push(("max-buckets", max_buckets.to_string()));
        }
        if let Some(suspended) = desired.suspended {
            params.push(("suspended", suspended.to_string()));
        }
        if let Some(keys) = &desired.keys {
            params.push(("access-key", keys.access_key.clone()));
            params.push(("secret-key", keys.secret_key.clone()));
        }
        if let Some(caps) = &desired.caps {
            params.push(("user-caps", caps.clone()));
        }
        params
    }

    async fn modify(&self, desired: &UserState) -> ClientResult<Option<UserState>> {
        let body = self
            .call(http::Method::POST, None, &self.user_params(desired))
            .await?;
        Ok(parse_user(body))
    }

    /// Revoke one credential pair by access key id.
    async fn remove_key(&self, access_key: &str) -> ClientResult<()> {
        self.call(
            http::Method::DELETE,
            Some("key"),
            &[("uid", self.uid.clone()), ("access-key", access_key.to_string())],
        )
        .await
        .map(|_| ())
    }
}

fn parse_user(body: Option<serde_json::Value>) -> Option<UserState> {
    body.and_then(|value| serde_json::from_value::<RgwUserInfo>(value).ok())
        .map(UserState::from)
}

#[async_trait]
impl AdminBackend for UserBackend {
    type State = UserState;

    async fn fetch(&self) -> ClientResult<Option<UserState>> {
        match self
            .call(http::Method::GET, None, &[("uid", self.uid.clone())])
            .await
        {
            Ok(body) => Ok(parse_user(body)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create(&self, desired: &UserState) -> ClientResult<Option<UserState>> {
        let mut params = self.user_params(desired);
        if desired.keys.is_none() {
            // No pinned credential pair: let the gateway generate one; it is
            // echoed back in the result.
            params.push(("generate-key", "true".to_string()));
        }
        let body = self.call(http::Method::PUT, None, &params).await?;
        Ok(parse_user(body))
    }

    async fn update(
        &self,
        observed: &UserState,
        desired: &UserState,
    ) -> (Option<UserState>, Vec<ClientError>) {
        let mut errors = Vec::new();

        // A changed credential identifier revokes the old pair first. The
        // modify call is attempted either way; both outcomes are reported.
        if let (Some(old), Some(new)) = (&observed.keys, &desired.keys) {
            if old.access_key != new.access_key {
                debug!(uid = %self.uid, access_key = %old.access_key, "revoking superseded key");
                if let Err(err) = self.remove_key(&old.access_key).await {
                    warn!(uid = %self.uid, error = %err, "key revoke failed; still attempting update");
                    errors.push(err);
                }
            }
        }

        match self.modify(desired).await {
            Ok(state) => (state, errors),
            Err(err) => {
                errors.push(err);
                (None, errors)
            }
        }
    }

    async fn delete(&self, _observed: &UserState) -> ClientResult<()> {
        match self
            .call(http::Method::DELETE, None, &[("uid", self.uid.clone())])
            .await
        {
            Ok(_) => Ok(()),
            // Gone between fetch and delete: already converged.
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn mask_unmanaged(&self, observed: &mut UserState, desired: &UserState) {
        if desired.keys.is_none() {
            observed.keys = None;
        }
        if desired.suspended.is_none() {
            observed.suspended = None;
        }
        if desired.caps.is_none() {
            observed.caps = None;
        }
    }
}
