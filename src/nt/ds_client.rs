use crate::nt::transport::{team_server_addresses, ServerList};
use log::{debug, info};
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, Deserialize)]
struct DsMessage {
    #[serde(rename = "robotIP")]
    robot_ip: u32,
}

/// Robot address announced by the driver station, if the line carries one.
pub fn parse_robot_ip(line: &str) -> Option<Ipv4Addr> {
    let msg: DsMessage = serde_json::from_str(line).ok()?;
    if msg.robot_ip == 0 {
        return None;
    }
    Some(Ipv4Addr::from(msg.robot_ip))
}

pub(crate) fn spawn(servers: ServerList, team: u32, port: u16, reconnect_interval: Duration) {
    tokio::spawn(async move {
        loop {
            match TcpStream::connect(("127.0.0.1", port)).await {
                Ok(stream) => {
                    debug!("Connected to driver station on port {}", port);
                    let mut lines = BufReader::new(stream).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        match parse_robot_ip(&line) {
                            Some(ip) => {
                                info!("🎮 Driver station reports robot at {}", ip);
                                servers.set(vec![ip.to_string()]);
                            }
                            None => servers.set(team_server_addresses(team)),
                        }
                    }
                    debug!("Driver station connection closed");
                    servers.set(team_server_addresses(team));
                }
                Err(e) => debug!("No driver station on port {}: {}", port, e),
            }
            tokio::time::sleep(reconnect_interval).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_ip_is_big_endian() {
        assert_eq!(
            parse_robot_ip(r#"{"robotIP": 170000386, "other": 1}"#),
            Some(Ipv4Addr::new(10, 34, 0, 2))
        );
    }

    #[test]
    fn zero_or_garbage_means_no_override() {
        assert_eq!(parse_robot_ip(r#"{"robotIP": 0}"#), None);
        assert_eq!(parse_robot_ip("hello"), None);
    }
}
