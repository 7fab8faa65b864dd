/*
 * object.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Magazzino, a client SDK for the Magazzino
 * backend service.
 *
 * Magazzino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Magazzino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Magazzino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Data objects and buckets: schemaless records stored per bucket (class).

use serde_json::{Map, Value};

use super::query::Query;
use super::Service;
use crate::error::{ApiError, SdkError};
use crate::transport::descriptor::HttpMethod;
use crate::transport::response::ApiSuccess;

/// Fields managed by the backend, stripped from write bodies.
const RESERVED_FIELDS: &[&str] = &["objectId", "createDate", "updateDate"];

/// One schemaless record. `id` is set after save or when fetched.
#[derive(Debug, Clone, Default)]
pub struct DataObject {
    pub id: Option<String>,
    fields: Map<String, Value>,
}

impl DataObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Build from a parsed JSON record; objectId becomes `id`.
    pub fn from_json(value: Value) -> Result<Self, ApiError> {
        let Value::Object(fields) = value else {
            return Err(ApiError::decode("expected a JSON object record"));
        };
        let id = fields
            .get("objectId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        Ok(Self { id, fields })
    }

    /// Write body: all fields except the backend-managed ones.
    fn write_body(&self) -> Value {
        let mut body = self.fields.clone();
        for key in RESERVED_FIELDS {
            body.remove(*key);
        }
        Value::Object(body)
    }
}

/// Typed CRUD over one bucket (class) of data objects.
pub struct DataBucket {
    service: Service,
    name: String,
}

impl DataBucket {
    pub(crate) fn new(service: Service, name: impl Into<String>) -> Self {
        Self {
            service,
            name: name.into(),
        }
    }

    fn path(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("/classes/{}/{}", self.name, id),
            None => format!("/classes/{}", self.name),
        }
    }

    /// Create the object (POST). On success the backend's objectId and
    /// createDate are merged into the object.
    pub async fn save(&self, object: &mut DataObject) -> Result<(), SdkError> {
        let mut request = self
            .service
            .build_request(HttpMethod::Post, &self.path(None));
        request.body_json(&object.write_body())?;
        let success = request.execute().await?;
        let created = expect_json(&success)?;
        if let Some(id) = created.get("objectId").and_then(|v| v.as_str()) {
            object.id = Some(id.to_string());
            object.set("objectId", id);
        }
        if let Some(date) = created.get("createDate") {
            object.set("createDate", date.clone());
        }
        Ok(())
    }

    /// Update an existing object (PUT). The object must have an id.
    pub async fn update(&self, object: &DataObject) -> Result<(), SdkError> {
        let id = object
            .id
            .as_deref()
            .ok_or_else(|| SdkError::Api(ApiError::transport("cannot update an unsaved object")))?;
        let mut request = self
            .service
            .build_request(HttpMethod::Put, &self.path(Some(id)));
        request.body_json(&object.write_body())?;
        request.execute().await?;
        Ok(())
    }

    pub async fn fetch(&self, id: &str) -> Result<DataObject, SdkError> {
        let request = self
            .service
            .build_request(HttpMethod::Get, &self.path(Some(id)));
        let success = request.execute().await?;
        let record = expect_json(&success)?;
        DataObject::from_json(record.clone()).map_err(SdkError::Api)
    }

    pub async fn delete(&self, id: &str) -> Result<(), SdkError> {
        let request = self
            .service
            .build_request(HttpMethod::Delete, &self.path(Some(id)));
        request.execute().await?;
        Ok(())
    }

    /// Query the bucket; results arrive under "results".
    pub async fn find(&self, query: &Query) -> Result<Vec<DataObject>, SdkError> {
        let mut request = self.service.build_request(HttpMethod::Get, &self.path(None));
        query.apply(&mut request);
        let success = request.execute().await?;
        let body = expect_json(&success)?;
        let results = body
            .get("results")
            .and_then(|v| v.as_array())
            .ok_or_else(|| SdkError::Api(ApiError::decode("query response missing results")))?;
        results
            .iter()
            .map(|record| DataObject::from_json(record.clone()).map_err(SdkError::Api))
            .collect()
    }
}

pub(crate) fn expect_json(success: &ApiSuccess) -> Result<&Value, SdkError> {
    success
        .payload()
        .and_then(|p| p.as_json())
        .ok_or_else(|| SdkError::Api(ApiError::decode("expected a JSON response body")))
}
