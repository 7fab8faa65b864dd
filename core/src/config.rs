/*
 * config.rs
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

//! Process-wide transport configuration: default timeout, HTTP proxy, and
//! client TLS options. One global scope for the whole process; executors read
//! these at request-build time. Per-service transport configuration is not
//! supported (documented contract, same scope as the HTTP/2 session pool).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use crate::error::ConfigError;

/// Default per-request timeout in milliseconds when the caller sets none.
static DEFAULT_TIMEOUT_MS: AtomicU64 = AtomicU64::new(10_000);

/// Set the process-wide default request timeout.
pub fn set_default_timeout(timeout: Duration) {
    DEFAULT_TIMEOUT_MS.store(timeout.as_millis() as u64, Ordering::SeqCst);
}

/// Current process-wide default request timeout.
pub fn default_timeout() -> Duration {
    Duration::from_millis(DEFAULT_TIMEOUT_MS.load(Ordering::SeqCst))
}

/// HTTP proxy for the stream executor. Requests are tunnelled through
/// CONNECT; credentials, when set, are sent as Proxy-Authorization: Basic.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

static PROXY: OnceLock<Mutex<Option<ProxyConfig>>> = OnceLock::new();

fn proxy_slot() -> &'static Mutex<Option<ProxyConfig>> {
    PROXY.get_or_init(|| Mutex::new(None))
}

/// Set or clear the process-wide HTTP proxy.
pub fn set_proxy(proxy: Option<ProxyConfig>) {
    *proxy_slot().lock().unwrap() = proxy;
}

/// Current process-wide HTTP proxy, if any.
pub fn proxy() -> Option<ProxyConfig> {
    proxy_slot().lock().unwrap().clone()
}

/// Client TLS options. Paths reference PEM files; `allow_self_signed`
/// disables server certificate verification entirely.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Client private key (PEM).
    pub key: Option<PathBuf>,
    /// Client certificate chain (PEM).
    pub cert: Option<PathBuf>,
    /// CA bundle replacing the default root store (PEM).
    pub ca: Option<PathBuf>,
    /// Passphrase for an encrypted key. Accepted as a key but encrypted keys
    /// are rejected at load time; provide an unencrypted key instead.
    pub passphrase: Option<String>,
    pub allow_self_signed: bool,
}

/// Allowed TLS option keys. Anything else is rejected as a hard
/// configuration error before any request is sent.
const TLS_OPTION_KEYS: &[&str] = &["key", "cert", "ca", "passphrase", "allow_self_signed"];

static TLS: OnceLock<Mutex<TlsOptions>> = OnceLock::new();

fn tls_slot() -> &'static Mutex<TlsOptions> {
    TLS.get_or_init(|| Mutex::new(TlsOptions::default()))
}

/// Set the process-wide client TLS options from a key/value map. Keys outside
/// the allow-list fail the whole call; nothing is applied in that case.
pub fn set_tls_options(options: &HashMap<String, String>) -> Result<(), ConfigError> {
    for key in options.keys() {
        if !TLS_OPTION_KEYS.contains(&key.as_str()) {
            return Err(ConfigError::DisallowedTlsOption { key: key.clone() });
        }
    }
    let mut parsed = TlsOptions::default();
    for (key, value) in options {
        match key.as_str() {
            "key" => parsed.key = Some(PathBuf::from(value)),
            "cert" => parsed.cert = Some(PathBuf::from(value)),
            "ca" => parsed.ca = Some(PathBuf::from(value)),
            "passphrase" => parsed.passphrase = Some(value.clone()),
            "allow_self_signed" => {
                parsed.allow_self_signed = value == "true" || value == "1";
            }
            _ => unreachable!("key passed the allow-list"),
        }
    }
    *tls_slot().lock().unwrap() = parsed;
    Ok(())
}

/// Reset TLS options to the defaults (system roots, no client auth).
pub fn clear_tls_options() {
    *tls_slot().lock().unwrap() = TlsOptions::default();
}

/// Current process-wide client TLS options.
pub fn tls_options() -> TlsOptions {
    tls_slot().lock().unwrap().clone()
}
