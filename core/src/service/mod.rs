/*
 * mod.rs
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

//! Service layer: typed operations over the request facade. Each entry
//! point builds a request (path, query, body), executes it, and shapes the
//! parsed JSON response. No protocol logic lives here.

pub mod acl;
pub mod file;
pub mod group;
pub mod object;
pub mod query;
pub mod user;

pub use acl::Acl;
pub use file::FileBucket;
pub use group::Group;
pub use object::{DataBucket, DataObject};
pub use query::Query;
pub use user::Users;

use std::sync::{Arc, Mutex};

use crate::transport::descriptor::HttpMethod;
use crate::transport::facade::ApiRequest;

/// REST API version prefix.
const API_VERSION: &str = "2013-09-01";

/// Handle to one Magazzino application: credentials, endpoint, and the
/// session token captured by login. Cheap to clone; clones share the
/// session token.
#[derive(Clone)]
pub struct Service {
    app_id: String,
    api_key: String,
    endpoint: String,
    session_token: Arc<Mutex<Option<String>>>,
}

impl Service {
    /// New service handle. `endpoint` is the API origin, e.g.
    /// "https://api.magazzino.example".
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            session_token: Arc::new(Mutex::new(None)),
        }
    }

    /// Build a request for an API path (e.g. "/classes/scores"). The
    /// identification headers and current session token are attached.
    pub fn build_request(&self, method: HttpMethod, path: &str) -> ApiRequest {
        let url = format!("{}/{}{}", self.endpoint, API_VERSION, path);
        ApiRequest::new(
            method,
            url,
            self.app_id.clone(),
            self.api_key.clone(),
            self.session_token(),
        )
    }

    pub fn data_bucket(&self, name: impl Into<String>) -> DataBucket {
        DataBucket::new(self.clone(), name)
    }

    pub fn file_bucket(&self) -> FileBucket {
        FileBucket::new(self.clone())
    }

    pub fn users(&self) -> Users {
        Users::new(self.clone())
    }

    pub fn group(&self, name: impl Into<String>) -> Group {
        Group::new(self.clone(), name)
    }

    pub fn session_token(&self) -> Option<String> {
        self.session_token.lock().unwrap().clone()
    }

    pub fn set_session_token(&self, token: Option<String>) {
        *self.session_token.lock().unwrap() = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_joins_endpoint_version_and_path() {
        let service = Service::new("app", "key", "https://api.magazzino.example/");
        let d = service
            .build_request(HttpMethod::Get, "/classes/scores")
            .build()
            .unwrap();
        assert_eq!(d.url.host, "api.magazzino.example");
        assert_eq!(d.url.path_and_query, "/2013-09-01/classes/scores");
    }

    #[test]
    fn session_token_is_shared_across_clones() {
        let service = Service::new("app", "key", "https://api.magazzino.example");
        let clone = service.clone();
        service.set_session_token(Some("tok".to_string()));
        assert_eq!(clone.session_token().as_deref(), Some("tok"));
    }
}
