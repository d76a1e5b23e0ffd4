use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub outbox_capacity: usize,
    pub ping_interval: Duration,
    // pongs count as activity
    pub idle_timeout: Duration,
    pub send_timeout: Duration,
    // None allows any origin
    pub cors_origin: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 10 * 1024 * 1024, // 10MB
            outbox_capacity: 256,
            ping_interval: Duration::from_secs(20),
            idle_timeout: Duration::from_secs(60),
            send_timeout: Duration::from_secs(10),
            cors_origin: None,
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Some(addr) = env_parse::<SocketAddr>("BIND_ADDR")? {
            config.bind_addr = addr;
        } else if let Some(port) = env_parse::<u16>("PORT")? {
            config.bind_addr.set_port(port);
        }
        if let Ok(dir) = dotenv::var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(max) = env_parse("MAX_UPLOAD_BYTES")? {
            config.max_upload_bytes = max;
        }
        if let Some(capacity) = env_parse("OUTBOX_CAPACITY")? {
            config = config.outbox_capacity(capacity);
        }
        if let Some(secs) = env_parse("PING_INTERVAL_SECS")? {
            config.ping_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("SEND_TIMEOUT_SECS")? {
            config.send_timeout = Duration::from_secs(secs);
        }
        config.cors_origin = dotenv::var("CORS_ORIGIN").ok().filter(|o| !o.is_empty());

        Ok(config)
    }

    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, max: usize) -> Self {
        self.max_upload_bytes = max;
        self
    }

    pub fn outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity.max(1);
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Cap for both WebSocket messages and frames: twice the base64 size of
    /// the upload limit, so an over-limit upload still reaches file ingest.
    pub fn max_frame_bytes(&self) -> usize {
        self.max_upload_bytes.saturating_mul(8) / 3 + 64 * 1024
    }
}

fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match dotenv::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();

        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.cors_origin.is_none());
        assert!(config.idle_timeout > config.ping_interval);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let config = ChatConfig::default()
            .bind(addr)
            .upload_dir("/tmp/up")
            .max_upload_bytes(3)
            .ping_interval(Duration::from_secs(1))
            .idle_timeout(Duration::from_secs(2))
            .send_timeout(Duration::from_secs(3));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/up"));
        assert_eq!(config.max_upload_bytes, 3);
        assert_eq!(config.ping_interval, Duration::from_secs(1));
        assert_eq!(config.idle_timeout, Duration::from_secs(2));
        assert_eq!(config.send_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_outbox_capacity_floor() {
        let config = ChatConfig::default().outbox_capacity(0);

        assert_eq!(config.outbox_capacity, 1);
    }

    #[test]
    fn test_frame_limit_fits_encoded_upload() {
        let config = ChatConfig::default().max_upload_bytes(3 * 1024);

        // base64 of the limit plus JSON framing must fit
        assert!(config.max_frame_bytes() > 4 * 1024 + 512);
    }
}
