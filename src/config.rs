// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into an [`AppConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory for `giftgate.redb`; unset keeps state in memory | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `SIWE_ALLOWED_DOMAINS` | Comma-separated domains challenges may bind to | `localhost:3000` |
//! | `SIWE_STATEMENT` | Statement line of the SIWE message | `Sign in to claim your gift.` |
//! | `SUPPORTED_CHAIN_IDS` | Comma-separated chain ids accepted for sign-in | `8453,84532` |
//! | `JWT_SECRET` | HS256 secret, at least 32 bytes | Required |
//! | `JWT_TTL_SECS` | Credential lifetime | `86400` |
//! | `APPROVER_PRIVATE_KEY` | Approver key as hex | One of these two |
//! | `APPROVER_KEY_PEM_PATH` | Approver key as a PEM file | One of these two |
//! | `APPROVER_ADDRESS` | Address the gate contract trusts | Required for approvals |
//! | `APPROVAL_GATE_ADDRESS` | EIP-712 verifying contract | Required for approvals |
//! | `APPROVAL_CHAIN_ID` | EIP-712 chain id | `84532` |
//! | `APPROVAL_TTL_SECS` | Approval deadline offset | `3600` |
//! | `RPC_URL` | JSON-RPC endpoint for reading mint receipts | unset |
//! | `NFT_CONTRACT_ADDRESS` | Gift NFT contract emitting Transfer events | unset |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | Serve HTTPS when both are set | unset |
//! | `RATE_LIMIT_MAX` | Approval requests per window per client | `5` |
//! | `RATE_LIMIT_WINDOW_SECS` | Approval rate-limit window | `60` |
//!
//! ## Approver Configuration
//!
//! The approver settings resolve to `Result<ApproverConfig, ConfigError>`.
//! A misconfigured approver does not stop the server from booting (sign-in
//! and pre-claim still work); it makes every approval request fail loudly.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;

use crate::approval::ApproverKeySource;
use crate::auth::jwt::{DEFAULT_CREDENTIAL_TTL, MIN_SECRET_LEN};
use crate::blockchain::default_supported_chains;
use crate::blockchain::types::BASE_SEPOLIA_CHAIN_ID;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Directory holding the redb database file.
///
/// # Default
/// Unset: all state is kept in memory and lost on restart.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Database file name inside `DATA_DIR`.
pub const DB_FILE_NAME: &str = "giftgate.redb";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

pub const SIWE_ALLOWED_DOMAINS_ENV: &str = "SIWE_ALLOWED_DOMAINS";
pub const SIWE_STATEMENT_ENV: &str = "SIWE_STATEMENT";
pub const SUPPORTED_CHAIN_IDS_ENV: &str = "SUPPORTED_CHAIN_IDS";
pub const DEFAULT_SIWE_DOMAIN: &str = "localhost:3000";
pub const DEFAULT_SIWE_STATEMENT: &str = "Sign in to claim your gift.";

/// HS256 signing secret for session credentials.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_TTL_SECS_ENV: &str = "JWT_TTL_SECS";

pub const APPROVER_PRIVATE_KEY_ENV: &str = "APPROVER_PRIVATE_KEY";
pub const APPROVER_KEY_PEM_PATH_ENV: &str = "APPROVER_KEY_PEM_PATH";
pub const APPROVER_ADDRESS_ENV: &str = "APPROVER_ADDRESS";
pub const APPROVAL_GATE_ADDRESS_ENV: &str = "APPROVAL_GATE_ADDRESS";
pub const APPROVAL_CHAIN_ID_ENV: &str = "APPROVAL_CHAIN_ID";
pub const APPROVAL_TTL_SECS_ENV: &str = "APPROVAL_TTL_SECS";
pub const DEFAULT_APPROVAL_TTL: Duration = Duration::from_secs(60 * 60);

pub const RPC_URL_ENV: &str = "RPC_URL";
pub const NFT_CONTRACT_ADDRESS_ENV: &str = "NFT_CONTRACT_ADDRESS";

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

pub const RATE_LIMIT_MAX_ENV: &str = "RATE_LIMIT_MAX";
pub const RATE_LIMIT_WINDOW_SECS_ENV: &str = "RATE_LIMIT_WINDOW_SECS";
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 5;
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("set only one of {APPROVER_PRIVATE_KEY_ENV} and {APPROVER_KEY_PEM_PATH_ENV}")]
    AmbiguousApproverKey,
}

/// Everything the approval signer needs.
#[derive(Debug, Clone)]
pub struct ApproverConfig {
    pub key: ApproverKeySource,
    /// The only signer the gate contract accepts
    pub expected_address: Address,
    pub gate_address: Address,
    pub chain_id: u64,
    pub ttl: Duration,
}

/// Optional chain reader for resolving mint receipts.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub nft_contract: Address,
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: Option<PathBuf>,
    pub json_logs: bool,
    pub allowed_domains: Vec<String>,
    pub statement: String,
    pub supported_chains: Vec<u64>,
    pub jwt_secret: Vec<u8>,
    pub jwt_ttl: Duration,
    pub approver: Result<ApproverConfig, ConfigError>,
    pub chain: Option<ChainConfig>,
    pub tls: Option<TlsPaths>,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(get(PORT_ENV), PORT_ENV, 8080)?;
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: HOST_ENV,
                reason: e.to_string(),
            })?;

        let jwt_secret = get(JWT_SECRET_ENV)
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?
            .into_bytes();
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: JWT_SECRET_ENV,
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }

        let allowed_domains = get(SIWE_ALLOWED_DOMAINS_ENV)
            .map(|v| split_list(&v).map(crate::auth::siwe::normalize_domain).collect())
            .unwrap_or_else(|| vec![DEFAULT_SIWE_DOMAIN.to_string()]);

        let supported_chains = match get(SUPPORTED_CHAIN_IDS_ENV) {
            Some(v) => split_list(&v)
                .map(|id| {
                    id.parse::<u64>()
                        .ok()
                        .filter(|id| *id > 0)
                        .ok_or_else(|| ConfigError::Invalid {
                            name: SUPPORTED_CHAIN_IDS_ENV,
                            reason: format!("{id:?} is not a positive chain id"),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => default_supported_chains(),
        };

        let chain = match (get(RPC_URL_ENV), get(NFT_CONTRACT_ADDRESS_ENV)) {
            (Some(rpc_url), Some(nft)) => Some(ChainConfig {
                rpc_url,
                chain_id: parse_or(
                    get(APPROVAL_CHAIN_ID_ENV),
                    APPROVAL_CHAIN_ID_ENV,
                    BASE_SEPOLIA_CHAIN_ID,
                )?,
                nft_contract: parse_address(&nft, NFT_CONTRACT_ADDRESS_ENV)?,
            }),
            _ => None,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
        };

        Ok(Self {
            bind_addr,
            data_dir: get(DATA_DIR_ENV).map(PathBuf::from),
            json_logs: get(LOG_FORMAT_ENV).is_some_and(|v| v.eq_ignore_ascii_case("json")),
            allowed_domains,
            statement: get(SIWE_STATEMENT_ENV)
                .unwrap_or_else(|| DEFAULT_SIWE_STATEMENT.to_string()),
            supported_chains,
            jwt_secret,
            jwt_ttl: parse_secs_or(
                get(JWT_TTL_SECS_ENV),
                JWT_TTL_SECS_ENV,
                DEFAULT_CREDENTIAL_TTL,
            )?,
            approver: ApproverConfig::from_lookup(&get),
            chain,
            tls,
            rate_limit_max: parse_or(
                get(RATE_LIMIT_MAX_ENV),
                RATE_LIMIT_MAX_ENV,
                DEFAULT_RATE_LIMIT_MAX,
            )?,
            rate_limit_window: parse_secs_or(
                get(RATE_LIMIT_WINDOW_SECS_ENV),
                RATE_LIMIT_WINDOW_SECS_ENV,
                DEFAULT_RATE_LIMIT_WINDOW,
            )?,
        })
    }
}

impl ApproverConfig {
    /// Resolve the approver settings. Exactly one key source must be set.
    pub fn from_lookup<F>(get: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = match (get(APPROVER_PRIVATE_KEY_ENV), get(APPROVER_KEY_PEM_PATH_ENV)) {
            (Some(hex), None) => ApproverKeySource::Hex(hex),
            (None, Some(path)) => ApproverKeySource::PemFile(path.into()),
            (Some(_), Some(_)) => return Err(ConfigError::AmbiguousApproverKey),
            (None, None) => return Err(ConfigError::Missing(APPROVER_PRIVATE_KEY_ENV)),
        };

        let expected_address = get(APPROVER_ADDRESS_ENV)
            .ok_or(ConfigError::Missing(APPROVER_ADDRESS_ENV))
            .and_then(|v| parse_address(&v, APPROVER_ADDRESS_ENV))?;
        let gate_address = get(APPROVAL_GATE_ADDRESS_ENV)
            .ok_or(ConfigError::Missing(APPROVAL_GATE_ADDRESS_ENV))
            .and_then(|v| parse_address(&v, APPROVAL_GATE_ADDRESS_ENV))?;

        Ok(Self {
            key,
            expected_address,
            gate_address,
            chain_id: parse_or(
                get(APPROVAL_CHAIN_ID_ENV),
                APPROVAL_CHAIN_ID_ENV,
                BASE_SEPOLIA_CHAIN_ID,
            )?,
            ttl: parse_secs_or(
                get(APPROVAL_TTL_SECS_ENV),
                APPROVAL_TTL_SECS_ENV,
                DEFAULT_APPROVAL_TTL,
            )?,
        })
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_address(value: &str, name: &'static str) -> Result<Address, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        reason: format!("{value:?} is not an address"),
    })
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("cannot parse {v:?}"),
        }),
        None => Ok(default),
    }
}

fn parse_secs_or(
    value: Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_or(value, name, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[(JWT_SECRET_ENV, SECRET)]).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.allowed_domains, vec!["localhost:3000"]);
        assert_eq!(config.supported_chains, vec![8453, 84532]);
        assert_eq!(config.jwt_ttl, Duration::from_secs(86400));
        assert_eq!(config.rate_limit_max, 5);
        assert!(config.data_dir.is_none());
        assert!(config.tls.is_none());
        assert!(config.chain.is_none());
        assert_eq!(
            config.approver.unwrap_err(),
            ConfigError::Missing(APPROVER_PRIVATE_KEY_ENV)
        );
    }

    #[test]
    fn jwt_secret_is_required_and_long() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing(JWT_SECRET_ENV));
        assert!(matches!(
            load(&[(JWT_SECRET_ENV, "short")]).unwrap_err(),
            ConfigError::Invalid { name: JWT_SECRET_ENV, .. }
        ));
    }

    #[test]
    fn lists_are_parsed_and_normalized() {
        let config = load(&[
            (JWT_SECRET_ENV, SECRET),
            (SIWE_ALLOWED_DOMAINS_ENV, "https://Gifts.example/, localhost:3000"),
            (SUPPORTED_CHAIN_IDS_ENV, "1, 8453"),
        ])
        .unwrap();
        assert_eq!(config.allowed_domains, vec!["gifts.example", "localhost:3000"]);
        assert_eq!(config.supported_chains, vec![1, 8453]);

        assert!(load(&[(JWT_SECRET_ENV, SECRET), (SUPPORTED_CHAIN_IDS_ENV, "0")]).is_err());
    }

    #[test]
    fn approver_resolves_when_complete() {
        let config = load(&[
            (JWT_SECRET_ENV, SECRET),
            (APPROVER_PRIVATE_KEY_ENV, "0x01"),
            (APPROVER_ADDRESS_ENV, "0x52908400098527886E0F7030069857D2E4169EE7"),
            (APPROVAL_GATE_ADDRESS_ENV, "0x9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a"),
            (APPROVAL_TTL_SECS_ENV, "600"),
        ])
        .unwrap();
        let approver = config.approver.unwrap();
        assert_eq!(approver.chain_id, 84532);
        assert_eq!(approver.ttl, Duration::from_secs(600));
        assert!(matches!(approver.key, ApproverKeySource::Hex(_)));
    }

    #[test]
    fn approver_key_sources_are_exclusive() {
        let config = load(&[
            (JWT_SECRET_ENV, SECRET),
            (APPROVER_PRIVATE_KEY_ENV, "0x01"),
            (APPROVER_KEY_PEM_PATH_ENV, "/keys/approver.pem"),
            (APPROVER_ADDRESS_ENV, "0x52908400098527886E0F7030069857D2E4169EE7"),
            (APPROVAL_GATE_ADDRESS_ENV, "0x9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a"),
        ])
        .unwrap();
        assert_eq!(config.approver.unwrap_err(), ConfigError::AmbiguousApproverKey);
    }

    #[test]
    fn half_configured_tls_is_an_error() {
        assert_eq!(
            load(&[(JWT_SECRET_ENV, SECRET), (TLS_KEY_PATH_ENV, "/k.pem")]).unwrap_err(),
            ConfigError::Missing(TLS_CERT_PATH_ENV)
        );
    }
}
