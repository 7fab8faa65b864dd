/*
 * lib.rs
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

//! C FFI for magazzino core. Services are identified by integer handles
//! returned from magazzino_service_create. All string parameters are UTF-8
//! NUL-terminated; strings passed to callbacks are owned by the SDK and
//! valid only for the duration of the call. Callbacks run on a worker
//! thread; the host must marshal to its main thread as needed.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::sync::RwLock;

use libc::{c_char, c_int, c_void};
use once_cell::sync::Lazy;

use magazzino_core::config::{self, ProxyConfig};
use magazzino_core::service::{DataObject, Service};
use magazzino_core::transport::stream::pool;

/// Wrapper so *mut c_void can be moved into Send closures. C callbacks are
/// invoked from worker threads.
struct SendableUserData(*mut c_void);
unsafe impl Send for SendableUserData {}
unsafe impl Sync for SendableUserData {}

/// Success callback: record JSON (or "{}" for bodyless operations).
type OnSuccess = extern "C" fn(*const c_char, *mut c_void);
/// Error callback: status (0 = transport-level, -1 = configuration error)
/// and a message.
type OnError = extern "C" fn(c_int, *const c_char, *mut c_void);

static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build runtime")
});

static SERVICES: Lazy<RwLock<HashMap<u64, Service>>> = Lazy::new(|| RwLock::new(HashMap::new()));
static NEXT_HANDLE: Lazy<RwLock<u64>> = Lazy::new(|| RwLock::new(1));

/// TLS options accumulate across magazzino_set_tls_option calls and are
/// applied as a whole map on every call.
static TLS_OPTIONS: Lazy<RwLock<HashMap<String, String>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn cstr_arg(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .ok()
        .map(|s| s.to_string())
}

fn service_for(handle: u64) -> Option<Service> {
    SERVICES.read().unwrap().get(&handle).cloned()
}

fn invoke_success(cb: OnSuccess, json: &str, user_data: &SendableUserData) {
    let json_c = CString::new(json).unwrap_or_else(|_| CString::new("{}").unwrap());
    cb(json_c.as_ptr(), user_data.0);
}

fn invoke_error(cb: OnError, status: c_int, message: &str, user_data: &SendableUserData) {
    let message_c = CString::new(message).unwrap_or_else(|_| CString::new("error").unwrap());
    cb(status, message_c.as_ptr(), user_data.0);
}

fn report_sdk_error(cb: OnError, error: magazzino_core::SdkError, user_data: &SendableUserData) {
    match error {
        magazzino_core::SdkError::Config(e) => invoke_error(cb, -1, &e.to_string(), user_data),
        magazzino_core::SdkError::Api(e) => {
            invoke_error(cb, e.status as c_int, &e.to_string(), user_data)
        }
    }
}

fn object_to_json(object: &DataObject) -> String {
    serde_json::Value::Object(object.fields().clone()).to_string()
}

/// Create a service handle. Returns 0 when any argument is missing.
#[no_mangle]
pub extern "C" fn magazzino_service_create(
    app_id: *const c_char,
    api_key: *const c_char,
    endpoint: *const c_char,
) -> u64 {
    let (Some(app_id), Some(api_key), Some(endpoint)) =
        (cstr_arg(app_id), cstr_arg(api_key), cstr_arg(endpoint))
    else {
        return 0;
    };
    let mut next = NEXT_HANDLE.write().unwrap();
    let handle = *next;
    *next += 1;
    SERVICES
        .write()
        .unwrap()
        .insert(handle, Service::new(app_id, api_key, endpoint));
    handle
}

/// Release a service handle. Pooled HTTP/2 sessions are not touched; use
/// magazzino_close_all_sessions for deterministic teardown.
#[no_mangle]
pub extern "C" fn magazzino_service_free(handle: u64) {
    SERVICES.write().unwrap().remove(&handle);
}

/// Process-wide default request timeout.
#[no_mangle]
pub extern "C" fn magazzino_set_default_timeout_ms(timeout_ms: u64) {
    config::set_default_timeout(std::time::Duration::from_millis(timeout_ms));
}

/// Set (host non-NULL) or clear (host NULL) the process-wide HTTP proxy.
#[no_mangle]
pub extern "C" fn magazzino_set_proxy(
    host: *const c_char,
    port: u16,
    username: *const c_char,
    password: *const c_char,
) -> c_int {
    match cstr_arg(host) {
        Some(host) => {
            config::set_proxy(Some(ProxyConfig {
                host,
                port,
                username: cstr_arg(username),
                password: cstr_arg(password),
            }));
            0
        }
        None => {
            config::set_proxy(None);
            0
        }
    }
}

/// Set one TLS option (key, cert, ca, passphrase, allow_self_signed).
/// Options accumulate; a key outside the allow-list fails with -1 and
/// leaves the applied configuration unchanged. NULL value removes the key.
#[no_mangle]
pub extern "C" fn magazzino_set_tls_option(key: *const c_char, value: *const c_char) -> c_int {
    let Some(key) = cstr_arg(key) else {
        return -1;
    };
    let mut staged = TLS_OPTIONS.write().unwrap();
    let previous = match cstr_arg(value) {
        Some(value) => staged.insert(key.clone(), value),
        None => staged.remove(&key),
    };
    match config::set_tls_options(&staged) {
        Ok(()) => 0,
        Err(_) => {
            // Roll the staged map back so later calls are not poisoned.
            match previous {
                Some(value) => staged.insert(key, value),
                None => staged.remove(&key),
            };
            -1
        }
    }
}

/// Save an object built from JSON into a bucket. The success callback gets
/// the stored record (with objectId) as JSON.
#[no_mangle]
pub extern "C" fn magazzino_object_save(
    service: u64,
    bucket: *const c_char,
    object_json: *const c_char,
    on_success: OnSuccess,
    on_error: OnError,
    user_data: *mut c_void,
) {
    let user_data = SendableUserData(user_data);
    let (Some(service), Some(bucket), Some(object_json)) =
        (service_for(service), cstr_arg(bucket), cstr_arg(object_json))
    else {
        invoke_error(on_error, -1, "invalid service handle or arguments", &user_data);
        return;
    };
    RUNTIME.spawn(async move {
        let parsed = serde_json::from_str::<serde_json::Value>(&object_json)
            .map_err(|e| e.to_string())
            .and_then(|v| DataObject::from_json(v).map_err(|e| e.to_string()));
        let mut object = match parsed {
            Ok(o) => o,
            Err(e) => {
                invoke_error(on_error, -1, &e, &user_data);
                return;
            }
        };
        match service.data_bucket(bucket).save(&mut object).await {
            Ok(()) => invoke_success(on_success, &object_to_json(&object), &user_data),
            Err(e) => report_sdk_error(on_error, e, &user_data),
        }
    });
}

/// Fetch one object by id; the success callback gets the record as JSON.
#[no_mangle]
pub extern "C" fn magazzino_object_fetch(
    service: u64,
    bucket: *const c_char,
    object_id: *const c_char,
    on_success: OnSuccess,
    on_error: OnError,
    user_data: *mut c_void,
) {
    let user_data = SendableUserData(user_data);
    let (Some(service), Some(bucket), Some(object_id)) =
        (service_for(service), cstr_arg(bucket), cstr_arg(object_id))
    else {
        invoke_error(on_error, -1, "invalid service handle or arguments", &user_data);
        return;
    };
    RUNTIME.spawn(async move {
        match service.data_bucket(bucket).fetch(&object_id).await {
            Ok(object) => invoke_success(on_success, &object_to_json(&object), &user_data),
            Err(e) => report_sdk_error(on_error, e, &user_data),
        }
    });
}

/// Delete one object by id.
#[no_mangle]
pub extern "C" fn magazzino_object_delete(
    service: u64,
    bucket: *const c_char,
    object_id: *const c_char,
    on_success: OnSuccess,
    on_error: OnError,
    user_data: *mut c_void,
) {
    let user_data = SendableUserData(user_data);
    let (Some(service), Some(bucket), Some(object_id)) =
        (service_for(service), cstr_arg(bucket), cstr_arg(object_id))
    else {
        invoke_error(on_error, -1, "invalid service handle or arguments", &user_data);
        return;
    };
    RUNTIME.spawn(async move {
        match service.data_bucket(bucket).delete(&object_id).await {
            Ok(()) => invoke_success(on_success, "{}", &user_data),
            Err(e) => report_sdk_error(on_error, e, &user_data),
        }
    });
}

/// Log a user in; the session token is retained on the service handle and
/// sent with subsequent requests.
#[no_mangle]
pub extern "C" fn magazzino_user_login(
    service: u64,
    username: *const c_char,
    password: *const c_char,
    on_success: OnSuccess,
    on_error: OnError,
    user_data: *mut c_void,
) {
    let user_data = SendableUserData(user_data);
    let (Some(service), Some(username), Some(password)) =
        (service_for(service), cstr_arg(username), cstr_arg(password))
    else {
        invoke_error(on_error, -1, "invalid service handle or arguments", &user_data);
        return;
    };
    RUNTIME.spawn(async move {
        match service.users().log_in(&username, &password).await {
            Ok(user) => invoke_success(on_success, &object_to_json(&user), &user_data),
            Err(e) => report_sdk_error(on_error, e, &user_data),
        }
    });
}

/// Close all pooled HTTP/2 sessions (graceful, forced on drain timeout).
/// Blocks until the pool is empty.
#[no_mangle]
pub extern "C" fn magazzino_close_all_sessions() {
    RUNTIME.block_on(pool::close_all_sessions());
}
