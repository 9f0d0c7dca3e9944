
use anyhow::Context;
use redis::{Client, Connection};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::redis::redis_url;
use crate::DocQueryError;

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Call `probe` every `interval` until it succeeds or `timeout` has elapsed.
///
/// Probe failures only mean "not ready yet"; the one error returned is
/// [`DocQueryError::StartupTimeout`].
#[inline]
pub fn poll_until_ready<T, F>(
    target: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> crate::Result<T>
where
    F: FnMut() -> anyhow::Result<T>,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match probe() {
            Ok(value) => {
                info!("{} is ready after {} attempt(s)", target, attempt);
                return Ok(value);
            }
            Err(e) => {
                warn!("{} not ready yet (attempt {}): {:#}", target, attempt, e);
            }
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(DocQueryError::StartupTimeout {
                target: target.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
        thread::sleep(interval.min(timeout - elapsed));
    }
}

/// Wait for Redis to answer `PING`, returning the client and the live connection.
#[inline]
pub fn connect_when_ready(
    host: &str,
    port: u16,
    timeout: Duration,
) -> crate::Result<(Client, Connection)> {
    let client = Client::open(redis_url(host, port))
        .with_context(|| format!("Invalid Redis address {}:{}", host, port))?;
    let target = format!("Redis at {}:{}", host, port);

    info!("Waiting up to {:?} for {}", timeout, target);
    let connection = poll_until_ready(&target, timeout, POLL_INTERVAL, || {
        let mut connection = client
            .get_connection_with_timeout(POLL_INTERVAL)
            .context("Connection attempt failed")?;
        redis::cmd("PING")
            .query::<String>(&mut connection)
            .context("PING failed")?;
        Ok(connection)
    })?;

    Ok((client, connection))
}

/// Like [`connect_when_ready`], but a store that never becomes reachable ends the process
/// with a non-zero status.
#[inline]
pub fn wait_for_redis(host: &str, port: u16, timeout_secs: u64) -> (Client, Connection) {
    match connect_when_ready(host, port, Duration::from_secs(timeout_secs)) {
        Ok(ready) => ready,
        Err(e) => {
            error!("CRITICAL: {}", e);
            std::process::exit(1);
        }
    }
}
