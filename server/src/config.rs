use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::rooms::{EvictionPolicy, IdleTtl, NeverEvict};
use crate::store::{StoreLimits, DEFAULT_MAX_POINTS_PER_STROKE, DEFAULT_MAX_STROKES};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
    /// Directory of static client assets served as a fallback.
    #[arg(long, env = "PUBLIC_DIR")]
    pub public_dir: Option<PathBuf>,
    /// Room joined by clients that do not name one.
    #[arg(long, env = "LOBBY_ROOM", default_value = "lobby")]
    pub lobby: String,
    /// Seconds an empty room is kept before eviction. 0, the default, keeps rooms
    /// forever.
    #[arg(long, env = "ROOM_IDLE_TTL_SECS", default_value_t = 0)]
    pub room_idle_ttl_secs: u64,
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,
    #[arg(long, env = "HEARTBEAT_SECS", default_value_t = 30)]
    pub heartbeat_secs: u64,
    #[arg(long, env = "MAX_STROKES", default_value_t = DEFAULT_MAX_STROKES)]
    pub max_strokes: usize,
    #[arg(long, env = "MAX_POINTS_PER_STROKE", default_value_t = DEFAULT_MAX_POINTS_PER_STROKE)]
    pub max_points_per_stroke: usize,
    /// `tracing_subscriber::EnvFilter` directive.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn eviction_policy(&self) -> Arc<dyn EvictionPolicy> {
        if self.room_idle_ttl_secs == 0 {
            Arc::new(NeverEvict)
        } else {
            Arc::new(IdleTtl(Duration::from_secs(self.room_idle_ttl_secs)))
        }
    }

    pub fn store_limits(&self) -> StoreLimits {
        StoreLimits {
            max_strokes: self.max_strokes.max(1),
            max_points_per_stroke: self.max_points_per_stroke.max(1),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }
}
