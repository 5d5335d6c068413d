// ABOUTME: HTTP health probing of the deployed application.
// ABOUTME: One attempt tries each configured path in order; attempts repeat under a PollPolicy.

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::wait::{Clock, PollOutcome, PollPolicy, poll_until};

/// Issues a single `GET` and reports the status code.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn get(&self, address: SocketAddr, path: &str) -> Result<u16, String>;
}

/// Plain HTTP/1.1 probe over a fresh TCP connection per request.
#[derive(Debug, Clone, Copy)]
pub struct HttpProbe {
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn request(address: SocketAddr, path: &str) -> Result<u16, String> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| format!("connect failed: {}", e))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| format!("HTTP handshake failed: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("health probe connection error: {}", e);
            }
        });

        let req = hyper::Request::builder()
            .method("GET")
            .uri(path)
            .header("Host", address.to_string())
            .body(Empty::<bytes::Bytes>::new())
            .map_err(|e| format!("failed to build request: {}", e))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = resp.status().as_u16();
        // Drain so the connection closes cleanly.
        let _ = resp.into_body().collect().await;
        Ok(status)
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn get(&self, address: SocketAddr, path: &str) -> Result<u16, String> {
        match tokio::time::timeout(self.timeout, Self::request(address, path)).await {
            Ok(result) => result,
            Err(_) => Err(format!("no response within {:?}", self.timeout)),
        }
    }
}

/// Outcome of the health loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub healthy: bool,
    /// Path that answered 200, when healthy.
    pub path: Option<String>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Probe `paths` on `address` until one answers 200 or the policy runs out.
pub async fn wait_healthy(
    probe: &dyn HealthProbe,
    clock: &dyn Clock,
    policy: PollPolicy,
    address: SocketAddr,
    paths: &[String],
) -> HealthReport {
    let last_error = Mutex::new(None);

    let outcome = poll_until(clock, policy, |attempt| {
        let last_error = &last_error;
        async move {
            for path in paths {
                match probe.get(address, path).await {
                    Ok(200) => return Some(path.clone()),
                    Ok(status) => {
                        *last_error.lock() = Some(format!("GET {path} returned {status}"))
                    }
                    Err(e) => *last_error.lock() = Some(format!("GET {path}: {e}")),
                }
            }
            tracing::debug!(attempt, %address, "application not healthy yet");
            None
        }
    })
    .await;

    match outcome {
        PollOutcome::Ready { value, attempts } => HealthReport {
            healthy: true,
            path: Some(value),
            attempts,
            last_error: None,
        },
        PollOutcome::TimedOut { attempts, .. } => HealthReport {
            healthy: false,
            path: None,
            attempts,
            last_error: last_error.into_inner(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::ManualClock;

    struct ScriptedProbe {
        healthy_after: u32,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        async fn get(&self, _address: SocketAddr, path: &str) -> Result<u16, String> {
            let mut calls = self.calls.lock();
            calls.push(path.to_string());
            if calls.len() as u32 > self.healthy_after && path == "/" {
                Ok(200)
            } else {
                Ok(503)
            }
        }
    }

    fn paths() -> Vec<String> {
        vec!["/health".to_string(), "/".to_string()]
    }

    #[tokio::test]
    async fn falls_back_to_root_path() {
        let probe = ScriptedProbe {
            healthy_after: 0,
            calls: Mutex::new(Vec::new()),
        };
        let clock = ManualClock::new();
        let policy = PollPolicy::new(Duration::from_secs(2), Duration::from_secs(30));

        let report = wait_healthy(
            &probe,
            &clock,
            policy,
            "203.0.113.10:9000".parse().unwrap(),
            &paths(),
        )
        .await;

        assert!(report.healthy);
        assert_eq!(report.path.as_deref(), Some("/"));
        assert_eq!(*probe.calls.lock(), vec!["/health", "/"]);
    }

    #[tokio::test]
    async fn times_out_without_failing() {
        let probe = ScriptedProbe {
            healthy_after: u32::MAX,
            calls: Mutex::new(Vec::new()),
        };
        let clock = ManualClock::new();
        let policy = PollPolicy::new(Duration::from_secs(2), Duration::from_secs(30));

        let report = wait_healthy(
            &probe,
            &clock,
            policy,
            "203.0.113.10:9000".parse().unwrap(),
            &paths(),
        )
        .await;

        assert!(!report.healthy);
        assert_eq!(report.attempts, 15);
        assert_eq!(clock.now(), Duration::from_secs(30));
        assert_eq!(report.last_error.as_deref(), Some("GET / returned 503"));
    }

    struct SlowProbe;

    #[async_trait]
    impl HealthProbe for SlowProbe {
        async fn get(&self, _address: SocketAddr, _path: &str) -> Result<u16, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(503)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_paths_do_not_stretch_the_deadline() {
        let clock = crate::wait::TokioClock::new();
        let policy = PollPolicy::new(Duration::from_secs(2), Duration::from_secs(30));

        let report = wait_healthy(
            &SlowProbe,
            &clock,
            policy,
            "203.0.113.10:9000".parse().unwrap(),
            &paths(),
        )
        .await;

        assert!(!report.healthy);
        // 0 -> 10, sleep 2, 12 -> 22, sleep 2, 24 -> /health answers at 29, / is cut at 30
        assert_eq!(report.attempts, 3);
        assert!(clock.now() <= Duration::from_secs(30), "overran: {:?}", clock.now());
        assert_eq!(report.last_error.as_deref(), Some("GET /health returned 503"));
    }

    #[tokio::test]
    async fn http_probe_reports_connection_failure() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpProbe::new(Duration::from_secs(2));
        assert!(probe.get(address, "/health").await.is_err());
    }
}
