use std::time::Duration;

use tokio::{net::TcpStream, time::timeout};
use tracing::debug;

/// Reports whether a TCP connection to the printer can be opened within
/// `limit`. Nothing is written to the socket.
pub async fn probe(host: &str, port: u16, limit: Duration) -> bool {
    if host.trim().is_empty() {
        return false;
    }
    match timeout(limit, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(error)) => {
            debug!(%host, port, %error, "printer connection refused");
            false
        }
        Err(_) => {
            debug!(%host, port, timeout_ms = limit.as_millis() as u64, "printer probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn listening_printer_is_online() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        assert!(probe("127.0.0.1", port, Duration::from_millis(800)).await);
    }

    #[tokio::test]
    async fn closed_port_is_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        assert!(!probe("127.0.0.1", port, Duration::from_millis(800)).await);
    }

    #[tokio::test]
    async fn missing_host_is_offline_without_connecting() {
        assert!(!probe("  ", 9100, Duration::from_millis(800)).await);
    }
}
