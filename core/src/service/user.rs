/*
 * user.rs
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

//! User account operations. Login captures the session token on the shared
//! service handle, so subsequent requests from any clone carry it.

use super::object::{expect_json, DataObject};
use super::Service;
use crate::error::SdkError;
use crate::transport::descriptor::HttpMethod;

pub struct Users {
    service: Service,
}

impl Users {
    pub(crate) fn new(service: Service) -> Self {
        Self { service }
    }

    /// Register a new user (POST /users).
    pub async fn sign_up(&self, username: &str, password: &str) -> Result<DataObject, SdkError> {
        let mut request = self.service.build_request(HttpMethod::Post, "/users");
        request.body_json(&serde_json::json!({
            "userName": username,
            "password": password,
        }))?;
        let success = request.execute().await?;
        let record = expect_json(&success)?.clone();
        DataObject::from_json(record).map_err(SdkError::Api)
    }

    /// Log in (GET /login). The returned sessionToken is stored on the
    /// service handle.
    pub async fn log_in(&self, username: &str, password: &str) -> Result<DataObject, SdkError> {
        let mut request = self.service.build_request(HttpMethod::Get, "/login");
        request.query("userName", username).query("password", password);
        let success = request.execute().await?;
        let record = expect_json(&success)?.clone();
        if let Some(token) = record.get("sessionToken").and_then(|v| v.as_str()) {
            self.service.set_session_token(Some(token.to_string()));
        }
        DataObject::from_json(record).map_err(SdkError::Api)
    }

    /// Log out (GET /logout) and drop the stored session token. The token is
    /// cleared even if the server call fails.
    pub async fn log_out(&self) -> Result<(), SdkError> {
        let request = self.service.build_request(HttpMethod::Get, "/logout");
        let result = request.execute().await;
        self.service.set_session_token(None);
        result.map(|_| ())
    }

    pub async fn delete(&self, user_id: &str) -> Result<(), SdkError> {
        let request = self
            .service
            .build_request(HttpMethod::Delete, &format!("/users/{}", user_id));
        request.execute().await?;
        Ok(())
    }
}
