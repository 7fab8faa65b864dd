/*
 * acl.rs
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

//! Access control lists: per-object read/write grants keyed by user id,
//! group name ("role:<name>"), or public ("*"). Serialized into the object
//! body under "acl".

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default)]
pub struct Acl {
    entries: Map<String, Value>,
}

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_public_access(&mut self, read: bool, write: bool) -> &mut Self {
        self.grant("*", read, write)
    }

    pub fn set_user_access(&mut self, user_id: &str, read: bool, write: bool) -> &mut Self {
        self.grant(user_id, read, write)
    }

    pub fn set_group_access(&mut self, group_name: &str, read: bool, write: bool) -> &mut Self {
        self.grant(&format!("role:{}", group_name), read, write)
    }

    /// A key with neither grant is removed entirely.
    fn grant(&mut self, key: &str, read: bool, write: bool) -> &mut Self {
        if !read && !write {
            self.entries.remove(key);
            return self;
        }
        let mut grants = Map::new();
        if read {
            grants.insert("read".to_string(), Value::Bool(true));
        }
        if write {
            grants.insert("write".to_string(), Value::Bool(true));
        }
        self.entries.insert(key.to_string(), Value::Object(grants));
        self
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_serialize_by_key() {
        let mut acl = Acl::new();
        acl.set_public_access(true, false)
            .set_user_access("u1", true, true)
            .set_group_access("staff", false, true);
        assert_eq!(
            acl.to_json(),
            serde_json::json!({
                "*": {"read": true},
                "u1": {"read": true, "write": true},
                "role:staff": {"write": true},
            })
        );
    }

    #[test]
    fn empty_grant_removes_the_entry() {
        let mut acl = Acl::new();
        acl.set_user_access("u1", true, true);
        acl.set_user_access("u1", false, false);
        assert_eq!(acl.to_json(), serde_json::json!({}));
    }
}
