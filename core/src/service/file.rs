/*
 * file.rs
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

//! File storage: binary upload/download addressed by file name, with byte
//! ranges, conditional fetches, and raw streaming for large downloads.

use super::object::{expect_json, DataObject};
use super::Service;
use crate::error::{ApiError, SdkError};
use crate::transport::descriptor::{HttpMethod, ResponseKind};
use crate::transport::response::{ApiSuccess, Payload, RawResponse};

pub struct FileBucket {
    service: Service,
}

impl FileBucket {
    pub(crate) fn new(service: Service) -> Self {
        Self { service }
    }

    fn path(&self, file_name: &str) -> String {
        format!("/files/{}", file_name)
    }

    /// Upload file content (POST, raw body with the given content type).
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<DataObject, SdkError> {
        let mut request = self
            .service
            .build_request(HttpMethod::Post, &self.path(file_name));
        request.content_type(content_type).body_bytes(data);
        let success = request.execute().await?;
        let record = expect_json(&success)?.clone();
        DataObject::from_json(record).map_err(SdkError::Api)
    }

    /// Download the whole file, buffered.
    pub async fn download(&self, file_name: &str) -> Result<Vec<u8>, SdkError> {
        let mut request = self
            .service
            .build_request(HttpMethod::Get, &self.path(file_name));
        request.response_kind(ResponseKind::Binary);
        let success = request.execute().await?;
        expect_binary(success)
    }

    /// Download a byte range; `etag` makes it conditional via If-Range.
    /// Bounds are validated before any I/O.
    pub async fn download_range(
        &self,
        file_name: &str,
        start: Option<i64>,
        end: Option<i64>,
        etag: Option<&str>,
    ) -> Result<Vec<u8>, SdkError> {
        let mut request = self
            .service
            .build_request(HttpMethod::Get, &self.path(file_name));
        request.response_kind(ResponseKind::Binary);
        request.range(start, end)?;
        if let Some(etag) = etag {
            request.if_range(etag);
        }
        let success = request.execute().await?;
        expect_binary(success)
    }

    /// Download as a live stream: resolves with the response handle as soon
    /// as headers arrive; the caller drains the chunks.
    pub async fn download_raw(&self, file_name: &str) -> Result<RawResponse, SdkError> {
        let mut request = self
            .service
            .build_request(HttpMethod::Get, &self.path(file_name));
        request.response_kind(ResponseKind::Binary).raw_passthrough();
        match request.execute().await? {
            ApiSuccess::Raw(raw) => Ok(raw),
            _ => Err(SdkError::Api(ApiError::transport(
                "expected a raw response stream",
            ))),
        }
    }

    /// Delete a stored file; If-Match guards against concurrent updates.
    pub async fn delete(&self, file_name: &str, etag: Option<&str>) -> Result<(), SdkError> {
        let mut request = self
            .service
            .build_request(HttpMethod::Delete, &self.path(file_name));
        if let Some(etag) = etag {
            request.if_match(etag);
        }
        request.execute().await?;
        Ok(())
    }
}

fn expect_binary(success: ApiSuccess) -> Result<Vec<u8>, SdkError> {
    match success {
        ApiSuccess::Body(Payload::Binary(data)) => Ok(data),
        ApiSuccess::Enveloped(envelope) => match envelope.body {
            Payload::Binary(data) => Ok(data),
            _ => Err(SdkError::Api(ApiError::decode("expected binary body"))),
        },
        _ => Err(SdkError::Api(ApiError::decode("expected binary body"))),
    }
}
