/*
 * group.rs
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

//! Group (role) operations: membership lists addressed by group name.

use super::object::{expect_json, DataObject};
use super::Service;
use crate::error::SdkError;
use crate::transport::descriptor::HttpMethod;

pub struct Group {
    service: Service,
    name: String,
}

impl Group {
    pub(crate) fn new(service: Service, name: impl Into<String>) -> Self {
        Self {
            service,
            name: name.into(),
        }
    }

    fn path(&self) -> String {
        format!("/groups/{}", self.name)
    }

    /// Create the group with an initial member list (POST).
    pub async fn create(&self, member_ids: &[String]) -> Result<DataObject, SdkError> {
        let mut request = self.service.build_request(HttpMethod::Post, "/groups");
        request.body_json(&serde_json::json!({
            "groupName": self.name,
            "members": member_ids,
        }))?;
        let success = request.execute().await?;
        let record = expect_json(&success)?.clone();
        DataObject::from_json(record).map_err(SdkError::Api)
    }

    pub async fn fetch(&self) -> Result<DataObject, SdkError> {
        let request = self.service.build_request(HttpMethod::Get, &self.path());
        let success = request.execute().await?;
        let record = expect_json(&success)?.clone();
        DataObject::from_json(record).map_err(SdkError::Api)
    }

    pub async fn add_member(&self, user_id: &str) -> Result<(), SdkError> {
        self.membership(&serde_json::json!({ "addMembers": [user_id] }))
            .await
    }

    pub async fn remove_member(&self, user_id: &str) -> Result<(), SdkError> {
        self.membership(&serde_json::json!({ "removeMembers": [user_id] }))
            .await
    }

    pub async fn delete(&self) -> Result<(), SdkError> {
        let request = self.service.build_request(HttpMethod::Delete, &self.path());
        request.execute().await?;
        Ok(())
    }

    async fn membership(&self, body: &serde_json::Value) -> Result<(), SdkError> {
        let mut request = self.service.build_request(HttpMethod::Put, &self.path());
        request.body_json(body)?;
        request.execute().await?;
        Ok(())
    }
}
