// Ravello Ansible
// Copyright (C) Riff Labs Limited <team@riff.cc>
// Based on Jetporch by Michael DeHaan <michael@michaeldehaan.net> + contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// long with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::sync::Mutex;
use reqwest::header::{ACCEPT, COOKIE, SET_COOKIE};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::api::types::*;
use crate::api::RavelloApi;
use crate::config::RavelloConfig;
use crate::credentials::Credentials;
use crate::error::{RavelloError, Result};
use crate::output::OutputHandlerRef;

const SESSION_COOKIE: &str = "JSESSIONID";

/// Blocking Ravello client: one reqwest client driven by a private
/// current-thread runtime, authenticated by the session cookie from
/// `POST /login`.
pub struct RavelloClient {
    base_url: String,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    session: Mutex<Option<String>>,
    output: OutputHandlerRef,
}

impl RavelloClient {
    pub fn new(config: &RavelloConfig, output: OutputHandlerRef) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| RavelloError::Config(format!("failed to create HTTP client: {}", e)))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RavelloError::Config(format!("failed to create async runtime: {}", e)))?;
        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            http,
            runtime,
            session: Mutex::new(None),
            output,
        })
    }

    /// Build a client and log in with `credentials`.
    pub fn connect(config: &RavelloConfig, credentials: &Credentials, output: OutputHandlerRef) -> Result<Self> {
        let client = Self::new(config, output)?;
        client.login(&credentials.username, &credentials.password)?;
        Ok(client)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<()> {
        let url = self.api_url("/login");
        self.output.on_request("POST", "/login");

        let cookie = self.runtime.block_on(async {
            let resp = self.http.post(&url)
                .basic_auth(username, Some(password))
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| RavelloError::Auth(format!("login request failed: {}", e)))?;

            if !resp.status().is_success() {
                return Err(RavelloError::Auth(format!("login rejected for {}: {}", username, resp.status())));
            }

            let set_cookies: Vec<String> = resp.headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(|v| v.to_string())
                .collect();
            session_cookie(&set_cookies)
                .ok_or_else(|| RavelloError::Auth(String::from("login response carried no session cookie")))
        })?;

        match self.session.lock() {
            Ok(mut session) => *session = Some(cookie),
            Err(_) => return Err(RavelloError::Other(String::from("session lock poisoned"))),
        }
        self.output.debug(&format!("logged in to {} as {}", self.base_url, username));
        Ok(())
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.lock() {
            Ok(session) => match session.as_ref() {
                Some(cookie) => builder.header(COOKIE, cookie.clone()),
                None => builder,
            },
            Err(_) => builder,
        }
    }

    fn request<B: Serialize>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Option<Value>> {
        let url = self.api_url(path);
        self.output.on_request(method.as_str(), path);

        self.runtime.block_on(async {
            let mut builder = self.http.request(method.clone(), &url).header(ACCEPT, "application/json");
            builder = self.apply_auth(builder);
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let resp = builder.send().await
                .map_err(|e| RavelloError::Api(format!("{} {} failed: {}", method, path, e)))?;
            let status = resp.status();
            let text = resp.text().await
                .map_err(|e| RavelloError::Api(format!("{} {}: failed to read response: {}", method, path, e)))?;

            if !status.is_success() {
                return Err(RavelloError::Api(format!("{} {} returned {}: {}", method, path, status, text)));
            }
            if text.trim().is_empty() {
                return Ok(None);
            }
            let parsed: Value = serde_json::from_str(&text)?;
            Ok(Some(parsed))
        })
    }

    fn get(&self, path: &str) -> Result<Value> {
        let body: Option<&Value> = None;
        Ok(self.request(Method::GET, path, body)?.unwrap_or(Value::Null))
    }

    fn get_list(&self, path: &str) -> Result<Vec<Value>> {
        match self.get(path)? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(RavelloError::Api(format!("GET {} returned a non-list: {}", path, other))),
        }
    }

    fn send<B: Serialize>(&self, method: Method, path: &str, body: &B) -> Result<Value> {
        Ok(self.request(method, path, Some(body))?.unwrap_or(Value::Null))
    }

    fn post_empty(&self, path: &str) -> Result<()> {
        let body: Option<&Value> = None;
        self.request(Method::POST, path, body)?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let body: Option<&Value> = None;
        self.request(Method::DELETE, path, body)?;
        Ok(())
    }
}

/// Pick the session cookie out of a login response's Set-Cookie headers,
/// falling back to every cookie pair when the usual name is absent.
pub(crate) fn session_cookie(set_cookies: &[String]) -> Option<String> {
    let pairs: Vec<&str> = set_cookies
        .iter()
        .filter_map(|c| c.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect();
    if let Some(session) = pairs.iter().find(|pair| pair.starts_with(&format!("{}=", SESSION_COOKIE))) {
        return Some(session.to_string());
    }
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

fn application_path(id: u64, aspect: Option<&str>) -> String {
    match aspect {
        Some(aspect) => format!("/applications/{};{}", id, aspect),
        None => format!("/applications/{}", id),
    }
}

impl RavelloApi for RavelloClient {
    fn get_applications(&self) -> Result<Vec<Value>> {
        self.get_list("/applications")
    }

    fn get_application(&self, id: u64, aspect: Option<&str>) -> Result<Value> {
        self.get(&application_path(id, aspect))
    }

    fn create_application(&self, app: &Value) -> Result<Value> {
        self.send(Method::POST, "/applications", app)
    }

    fn update_application(&self, app: &Value) -> Result<Value> {
        let id = crate::api::id_of(app)?;
        self.send(Method::PUT, &format!("/applications/{}", id), app)
    }

    fn delete_application(&self, id: u64) -> Result<()> {
        self.delete(&format!("/applications/{}", id))
    }

    fn publish_application(&self, id: u64, request: &PublishRequest) -> Result<()> {
        self.send(Method::POST, &format!("/applications/{}/publish", id), request)?;
        Ok(())
    }

    fn start_application(&self, id: u64) -> Result<()> {
        self.post_empty(&format!("/applications/{}/start", id))
    }

    fn stop_application(&self, id: u64) -> Result<()> {
        self.post_empty(&format!("/applications/{}/stop", id))
    }

    fn set_application_expiration(&self, id: u64, request: &ExpirationRequest) -> Result<()> {
        self.send(Method::POST, &format!("/applications/{}/setExpiration", id), request)?;
        Ok(())
    }

    fn get_blueprints(&self) -> Result<Vec<Value>> {
        self.get_list("/blueprints")
    }

    fn create_blueprint(&self, request: &BlueprintRequest) -> Result<Value> {
        self.send(Method::POST, "/blueprints", request)
    }

    fn delete_blueprint(&self, id: u64) -> Result<()> {
        self.delete(&format!("/blueprints/{}", id))
    }

    fn get_blueprint_publish_locations(&self, id: u64) -> Result<Value> {
        self.get(&format!("/blueprints/{}/publishLocations", id))
    }

    fn get_images(&self) -> Result<Vec<Value>> {
        self.get_list("/images")
    }

    fn get_image(&self, id: u64) -> Result<Value> {
        self.get(&format!("/images/{}", id))
    }

    fn get_disk_images(&self) -> Result<Vec<Value>> {
        self.get_list("/diskImages")
    }

    fn get_cost_buckets(&self, permissions: Option<&str>) -> Result<Vec<Value>> {
        match permissions {
            Some(permissions) => self.get_list(&format!("/costBuckets?permissions={}", urlencoding::encode(permissions))),
            None => self.get_list("/costBuckets"),
        }
    }

    fn associate_resource_to_cost_bucket(&self, bucket_id: u64, resource: &ResourceAssociation) -> Result<()> {
        self.send(Method::PUT, &format!("/costBuckets/{}/associateResource", bucket_id), resource)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::output::NullOutputHandler;

    #[test]
    fn test_session_cookie_prefers_jsessionid() {
        let headers = vec![
            String::from("AWSELB=abc; Path=/"),
            String::from("JSESSIONID=s3cr3t; Path=/api; HttpOnly"),
        ];
        assert_eq!(session_cookie(&headers), Some(String::from("JSESSIONID=s3cr3t")));
    }

    #[test]
    fn test_session_cookie_falls_back_to_all_pairs() {
        let headers = vec![String::from("a=1; Path=/"), String::from("b=2")];
        assert_eq!(session_cookie(&headers), Some(String::from("a=1; b=2")));
        assert_eq!(session_cookie(&[]), None);
    }

    #[test]
    fn test_application_path_with_aspect() {
        assert_eq!(application_path(12, None), "/applications/12");
        assert_eq!(application_path(12, Some("deployment")), "/applications/12;deployment");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = RavelloConfig::new().api_url("https://example.test/api/v1/");
        let client = RavelloClient::new(&config, Arc::new(NullOutputHandler)).unwrap();
        assert_eq!(client.api_url("/login"), "https://example.test/api/v1/login");
    }
}
