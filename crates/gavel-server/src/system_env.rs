//! Production Environment implementation using system time and RNG.

use std::time::Duration;

use gavel_core::Environment;

/// Production environment using system time and cryptographic RNG.
///
/// # Security
///
/// The RNG uses `getrandom` (OS entropy). Handshake challenges, AEAD nonces
/// and throwaway keys for unknown users all come from here.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Never expected on supported platforms. Zeros keep the replica
            // alive; sealed challenges then use a predictable nonce.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}
