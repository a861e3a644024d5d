// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Listener binding.
//!
//! The admin channel follows a fixed protocol:
//!
//! 1. parse the host as an IP and require loopback, before any bind
//! 2. bind; failure is fatal and never retried on another address
//! 3. re-read the bound address and require loopback again, closing the
//!    listener if it is not

use super::error::ServeError;
use crate::config::parse_loopback;
use crate::logging::Logger;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;

/// Bind the admin listener on `host:port`, loopback only.
pub async fn bind_admin(
    host: &str,
    port: u16,
    logger: &dyn Logger,
) -> Result<(TcpListener, SocketAddr), ServeError> {
    let ip = parse_loopback(host)?;
    let requested = SocketAddr::new(ip, port);

    let listener = TcpListener::bind(requested)
        .await
        .map_err(|source| ServeError::Bind {
            channel: "admin",
            addr: requested,
            source,
        })?;

    let bound = listener
        .local_addr()
        .map_err(|source| ServeError::Listener {
            channel: "admin",
            source,
        })
        .and_then(ensure_loopback);

    match bound {
        Ok(addr) => {
            logger.debug(format_args!("admin listener verified loopback at {}", addr));
            Ok((listener, addr))
        }
        Err(e) => {
            drop(listener);
            logger.error(format_args!("{}", e));
            Err(e)
        }
    }
}

/// Bind the public listener on all interfaces.
pub async fn bind_public(port: u16) -> Result<(TcpListener, SocketAddr), ServeError> {
    let requested = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(requested)
        .await
        .map_err(|source| ServeError::Bind {
            channel: "public",
            addr: requested,
            source,
        })?;
    let addr = listener
        .local_addr()
        .map_err(|source| ServeError::Listener {
            channel: "public",
            source,
        })?;
    Ok((listener, addr))
}

/// Post-bind check on the address the OS actually gave us.
pub fn ensure_loopback(addr: SocketAddr) -> Result<SocketAddr, ServeError> {
    if addr.ip().is_loopback() {
        Ok(addr)
    } else {
        Err(ServeError::NotLoopback(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::logging::MemoryLogger;

    #[tokio::test]
    async fn test_admin_binds_ipv4_loopback() {
        let logger = MemoryLogger::new();
        let (_listener, addr) = bind_admin("127.0.0.1", 0, &logger).await.unwrap();

        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_admin_rejects_non_loopback_before_bind() {
        let logger = MemoryLogger::new();

        let err = bind_admin("0.0.0.0", 0, &logger).await.unwrap_err();
        assert!(matches!(
            err,
            ServeError::Config(ConfigError::AdminHostNotLoopback(_))
        ));

        let err = bind_admin("example.com", 0, &logger).await.unwrap_err();
        assert!(matches!(err, ServeError::Config(ConfigError::InvalidAdminHost(_))));
    }

    #[tokio::test]
    async fn test_admin_port_in_use_is_fatal() {
        let logger = MemoryLogger::new();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = bind_admin("127.0.0.1", port, &logger).await.unwrap_err();
        assert!(matches!(err, ServeError::Bind { channel: "admin", .. }));
    }

    #[test]
    fn test_post_bind_recheck() {
        let loopback: SocketAddr = "127.0.0.1:8383".parse().unwrap();
        let v6: SocketAddr = "[::1]:8383".parse().unwrap();
        let public: SocketAddr = "10.0.0.5:8383".parse().unwrap();

        assert_eq!(ensure_loopback(loopback).unwrap(), loopback);
        assert_eq!(ensure_loopback(v6).unwrap(), v6);
        assert!(matches!(
            ensure_loopback(public),
            Err(ServeError::NotLoopback(addr)) if addr == public
        ));
    }

    #[tokio::test]
    async fn test_public_binds_all_interfaces() {
        let (_listener, addr) = bind_public(0).await.unwrap();
        assert!(addr.ip().is_unspecified());
    }
}
