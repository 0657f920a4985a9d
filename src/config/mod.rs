use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

pub struct Config {
    pub server: ServerConfig,
    pub judge: JudgeConfig,
    pub room: RoomConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Connection settings for the external Judge0-compatible execution service
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub poll_interval: Duration,
    pub poll_budget: Duration,
    pub request_timeout: Duration,
}

/// Room lifecycle policy knobs
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub code_length: usize,
    pub code_retries: u32,
    pub problems_per_room: usize,
    pub match_duration_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "4000".to_string())
                    .parse()
                    .expect("Invalid SERVER_PORT"),
            },
            judge: JudgeConfig::from_env(),
            room: RoomConfig::from_env(),
        }
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        // Try to parse as IP address first
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::new(0, 0, 0, 0);
                }
            }
        }

        // Handle common hostnames
        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::new(127, 0, 0, 1),
            "" | "0.0.0.0" => Ipv4Addr::new(0, 0, 0, 0),
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::new(0, 0, 0, 0)
            }
        }
    }
}

impl JudgeConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: env::var("JUDGE0_API_URL")
                .unwrap_or_else(|_| "http://localhost:2358".to_string()),
            api_key: env::var("JUDGE0_API_KEY").ok(),
            poll_interval: Duration::from_millis(
                env::var("JUDGE0_POLL_INTERVAL_MS")
                    .unwrap_or_else(|_| "1500".to_string())
                    .parse()
                    .unwrap_or(1500),
            ),
            poll_budget: Duration::from_secs(
                env::var("JUDGE0_POLL_BUDGET_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            ),
            request_timeout: Duration::from_secs(
                env::var("JUDGE0_REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            ),
        }
    }
}

impl RoomConfig {
    pub fn from_env() -> Self {
        Self {
            code_length: env::var("ROOM_CODE_LENGTH")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .unwrap_or(6),
            code_retries: env::var("ROOM_CODE_RETRIES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            problems_per_room: env::var("ROOM_PROBLEM_COUNT")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            match_duration_secs: env::var("ROOM_MATCH_DURATION_SECS")
                .unwrap_or_else(|_| "2700".to_string())
                .parse()
                .unwrap_or(2700),
        }
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            code_retries: 5,
            problems_per_room: 4,
            match_duration_secs: 45 * 60,
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:2358".to_string(),
            api_key: None,
            poll_interval: Duration::from_millis(1500),
            poll_budget: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_localhost() {
        let config = Config {
            server: ServerConfig {
                host: "localhost".to_string(),
                port: 4000,
            },
            judge: JudgeConfig::default(),
            room: RoomConfig::default(),
        };

        let addr = config.bind_address();
        assert_eq!(addr, ([127, 0, 0, 1], 4000));
    }

    #[test]
    fn test_parse_ipv4_address() {
        let config = Config {
            server: ServerConfig {
                host: "192.168.1.1".to_string(),
                port: 3000,
            },
            judge: JudgeConfig::default(),
            room: RoomConfig::default(),
        };

        let addr = config.bind_address();
        assert_eq!(addr, ([192, 168, 1, 1], 3000));
    }

    #[test]
    fn test_parse_all_interfaces() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 4000,
            },
            judge: JudgeConfig::default(),
            room: RoomConfig::default(),
        };

        let addr = config.bind_address();
        assert_eq!(addr, ([0, 0, 0, 0], 4000));
    }

    #[test]
    fn test_parse_invalid_hostname_defaults_to_all() {
        let config = Config {
            server: ServerConfig {
                host: "invalid-hostname".to_string(),
                port: 9000,
            },
            judge: JudgeConfig::default(),
            room: RoomConfig::default(),
        };

        let addr = config.bind_address();
        assert_eq!(addr, ([0, 0, 0, 0], 9000));
    }

    #[test]
    fn test_room_defaults() {
        let room = RoomConfig::default();
        assert_eq!(room.code_length, 6);
        assert_eq!(room.code_retries, 5);
        assert_eq!(room.problems_per_room, 4);
        assert_eq!(room.match_duration_secs, 2700);
    }
}
