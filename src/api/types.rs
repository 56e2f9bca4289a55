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

//! Request bodies and list-entry shapes for the Ravello REST API.
//!
//! Application designs themselves stay as `serde_json::Value`: they are
//! fetched, edited by path and sent back whole, so any field the service adds
//! must survive the round trip.

use serde::{Deserialize, Serialize};

/// Entry of `GET /applications`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApplicationSummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub published: bool,
}

/// Entry of `GET /blueprints`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BlueprintSummary {
    pub id: u64,
    pub name: String,
}

/// Entry of `GET /costBuckets`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CostBucket {
    pub id: u64,
    pub name: String,
}

/// Body of `POST /blueprints`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintRequest {
    pub application_id: u64,
    pub blueprint_name: String,
    pub offline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `POST /applications/{id}/publish`. Empty means the service picks
/// a cost optimized location.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_cloud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization_level: Option<String>,
}

impl PublishRequest {
    pub fn performance(cloud: &str, region: &str) -> Self {
        Self {
            preferred_cloud: Some(cloud.to_string()),
            preferred_region: Some(region.to_string()),
            optimization_level: Some(String::from("PERFORMANCE_OPTIMIZED")),
        }
    }
}

/// Body of `POST /applications/{id}/setExpiration`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpirationRequest {
    pub expiration_from_now_seconds: i64,
}

/// Body of `PUT /costBuckets/{id}/associateResource`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAssociation {
    pub resource_id: u64,
    pub resource_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_publish_request_omits_unset_fields() {
        assert_eq!(serde_json::to_value(PublishRequest::default()).unwrap(), json!({}));
        assert_eq!(
            serde_json::to_value(PublishRequest::performance("AMAZON", "Oregon")).unwrap(),
            json!({"preferredCloud": "AMAZON", "preferredRegion": "Oregon", "optimizationLevel": "PERFORMANCE_OPTIMIZED"})
        );
    }

    #[test]
    fn test_summary_ignores_extra_fields() {
        let app: ApplicationSummary = serde_json::from_value(json!({
            "id": 42, "name": "demo", "published": true, "owner": "someone"
        })).unwrap();
        assert_eq!(app.id, 42);
        assert!(app.published);

        let unpublished: ApplicationSummary = serde_json::from_value(json!({"id": 1, "name": "x"})).unwrap();
        assert!(!unpublished.published);
    }
}
