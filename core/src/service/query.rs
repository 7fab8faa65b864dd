/*
 * query.rs
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

//! Query builder: where-clauses serialized as the `where` JSON query
//! parameter, plus ordering and paging. Pure data shaping; execution lives
//! in `DataBucket::find`.

use serde_json::{Map, Value};

use crate::transport::facade::ApiRequest;

/// Clause operators follow the backend's query dialect: an equality clause
/// is the bare value, every other operator nests under the field.
#[derive(Debug, Clone, Default)]
pub struct Query {
    clauses: Map<String, Value>,
    order: Option<String>,
    limit: Option<u64>,
    skip: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.clauses.insert(field.into(), value.into());
        self
    }

    pub fn ne(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.op(field, "$ne", value.into())
    }

    pub fn lt(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.op(field, "$lt", value.into())
    }

    pub fn lte(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.op(field, "$lte", value.into())
    }

    pub fn gt(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.op(field, "$gt", value.into())
    }

    pub fn gte(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.op(field, "$gte", value.into())
    }

    pub fn within(&mut self, field: impl Into<String>, values: Vec<Value>) -> &mut Self {
        self.op(field, "$in", Value::Array(values))
    }

    pub fn exists(&mut self, field: impl Into<String>, exists: bool) -> &mut Self {
        self.op(field, "$exists", Value::Bool(exists))
    }

    pub fn regex(&mut self, field: impl Into<String>, pattern: impl Into<String>) -> &mut Self {
        self.op(field, "$regex", Value::String(pattern.into()))
    }

    /// Sort key; prefix with '-' for descending.
    pub fn order_by(&mut self, field: impl Into<String>, descending: bool) -> &mut Self {
        let field = field.into();
        self.order = Some(if descending {
            format!("-{}", field)
        } else {
            field
        });
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(&mut self, skip: u64) -> &mut Self {
        self.skip = Some(skip);
        self
    }

    /// Operator clauses on one field merge; `eq` replaces.
    fn op(&mut self, field: impl Into<String>, operator: &str, value: Value) -> &mut Self {
        let entry = self
            .clauses
            .entry(field.into())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(operators) = entry {
            operators.insert(operator.to_string(), value);
        }
        self
    }

    pub fn where_json(&self) -> Value {
        Value::Object(self.clauses.clone())
    }

    /// Attach this query's parameters to a request.
    pub(crate) fn apply(&self, request: &mut ApiRequest) {
        if !self.clauses.is_empty() {
            request.query("where", self.where_json().to_string());
        }
        if let Some(order) = &self.order {
            request.query("order", order.clone());
        }
        if let Some(limit) = self.limit {
            request.query("limit", limit.to_string());
        }
        if let Some(skip) = self.skip {
            request.query("skip", skip.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_is_bare_value() {
        let mut q = Query::new();
        q.eq("status", "active");
        assert_eq!(q.where_json(), serde_json::json!({"status": "active"}));
    }

    #[test]
    fn operators_nest_and_merge_per_field() {
        let mut q = Query::new();
        q.gte("score", 10).lt("score", 100).ne("player", "cpu");
        assert_eq!(
            q.where_json(),
            serde_json::json!({
                "score": {"$gte": 10, "$lt": 100},
                "player": {"$ne": "cpu"},
            })
        );
    }

    #[test]
    fn within_exists_regex_shapes() {
        let mut q = Query::new();
        q.within("rank", vec![1.into(), 2.into()])
            .exists("deleted", false)
            .regex("name", "^a");
        assert_eq!(
            q.where_json(),
            serde_json::json!({
                "rank": {"$in": [1, 2]},
                "deleted": {"$exists": false},
                "name": {"$regex": "^a"},
            })
        );
    }

    #[test]
    fn order_limit_skip_become_query_params() {
        let mut q = Query::new();
        q.eq("a", 1).order_by("createDate", true).limit(25).skip(50);
        let mut request = crate::transport::facade::ApiRequest::new(
            crate::transport::descriptor::HttpMethod::Get,
            "https://api.example.com/2013-09-01/classes/x",
            "app",
            "key",
            None,
        );
        q.apply(&mut request);
        let d = request.build().unwrap();
        assert!(d.url.path_and_query.contains("order=-createDate"));
        assert!(d.url.path_and_query.contains("limit=25"));
        assert!(d.url.path_and_query.contains("skip=50"));
        assert!(d.url.path_and_query.contains("where=%7B%22a%22%3A1%7D"));
    }
}
