//! gpsd-compatible location provider client (C11), used only at startup to
//! resolve home coordinates when they weren't injected via configuration.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 2947;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn resolve_home(&self, startup_timeout: Duration) -> Result<Coordinates>;
}

#[derive(Debug, Deserialize)]
struct TpvFrame {
    class: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

pub struct GpsdLocationProvider {
    host: String,
    port: u16,
}

impl GpsdLocationProvider {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl LocationProvider for GpsdLocationProvider {
    async fn resolve_home(&self, startup_timeout: Duration) -> Result<Coordinates> {
        timeout(startup_timeout, self.read_first_tpv())
            .await
            .context("timed out waiting for gpsd TPV frame")?
    }
}

impl GpsdLocationProvider {
    async fn read_first_tpv(&self) -> Result<Coordinates> {
        let addr = format!("{}:{}", self.host, self.port);
        let stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("connecting to gpsd at {addr}"))?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        // Ask gpsd to start streaming watch reports, per the WATCH command
        // convention of the gpsd JSON protocol.
        write_half
            .write_all(br#"?WATCH={"enable":true,"json":true}"#)
            .await
            .context("sending WATCH command to gpsd")?;
        write_half.write_all(b"\n").await?;

        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = reader
                .read_line(&mut line)
                .await
                .context("reading from gpsd")?;
            if bytes_read == 0 {
                bail!("gpsd connection closed before a usable TPV frame arrived");
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let frame: TpvFrame = match serde_json::from_str(trimmed) {
                Ok(f) => f,
                Err(e) => {
                    debug!(error = %e, "ignoring unparseable gpsd frame");
                    continue;
                }
            };

            if frame.class.as_deref() != Some("TPV") {
                continue;
            }

            if let (Some(lat), Some(lon)) = (frame.lat, frame.lon) {
                return Ok(Coordinates { lat, lon });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tpv_frame_without_lat_lon_does_not_resolve() {
        let frame: TpvFrame = serde_json::from_str(r#"{"class":"TPV"}"#).unwrap();
        assert_eq!(frame.class.as_deref(), Some("TPV"));
        assert!(frame.lat.is_none());
    }

    #[test]
    fn tpv_frame_with_lat_lon_parses() {
        let frame: TpvFrame =
            serde_json::from_str(r#"{"class":"TPV","lat":37.78,"lon":-122.15}"#).unwrap();
        assert_eq!(frame.lat, Some(37.78));
        assert_eq!(frame.lon, Some(-122.15));
    }

    #[test]
    fn non_tpv_class_is_distinguishable() {
        let frame: TpvFrame = serde_json::from_str(r#"{"class":"SKY"}"#).unwrap();
        assert_eq!(frame.class.as_deref(), Some("SKY"));
    }
}
