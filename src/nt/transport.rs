use crate::app_config::ApplicationConfig;
use crate::errors::AppError;
use crate::nt::ds_client;
use crate::nt::instance::NetworkTableInstance;
use crate::nt::value::Value;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    Update { key: String, value: Value },
}

/// Server addresses the client cycles through. Shared with the
/// driver-station client, which may replace them at runtime.
#[derive(Clone, Default)]
pub struct ServerList {
    hosts: Arc<Mutex<Vec<String>>>,
}

impl ServerList {
    pub fn new(hosts: Vec<String>) -> Self {
        ServerList {
            hosts: Arc::new(Mutex::new(hosts)),
        }
    }

    pub fn set(&self, hosts: Vec<String>) {
        *self.hosts.lock().unwrap_or_else(|p| p.into_inner()) = hosts;
    }

    pub fn current(&self) -> Vec<String> {
        self.hosts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

/// Robot controller addresses for a team, in the order they are tried.
pub fn team_server_addresses(team: u32) -> Vec<String> {
    vec![
        format!("10.{}.{}.2", team / 100, team % 100),
        format!("roborio-{}-frc.local", team),
        "172.22.11.2".to_string(),
        format!("roborio-{}-frc.lan", team),
        format!("roborio-{}-frc.frc-field.local", team),
    ]
}

impl NetworkTableInstance {
    /// Accepts peers on `bind:port` and relays every update to all other peers.
    /// Returns the bound address.
    pub async fn start_server(&self, bind: &str, port: u16) -> Result<SocketAddr, AppError> {
        let listener = TcpListener::bind((bind, port))
            .await
            .map_err(|e| AppError::Network(format!("could not listen on {}:{}: {}", bind, port, e)))?;
        let local_addr = listener.local_addr()?;
        info!("📡 Network table server listening on {}", local_addr);

        let instance = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let peer = instance.next_peer_id();
                        info!("🔌 Network table client #{} connected from {}", peer, addr);
                        let session_instance = instance.clone();
                        tokio::spawn(async move {
                            if let Err(e) = run_session(&session_instance, stream, peer).await {
                                warn!("Network table client #{} dropped: {}", peer, e);
                            } else {
                                info!("Network table client #{} disconnected", peer);
                            }
                        });
                    }
                    Err(e) => warn!("Network table accept failed: {}", e),
                }
            }
        });
        Ok(local_addr)
    }

    /// Connects to the first reachable host in `servers`, reconnecting after
    /// `reconnect_interval` whenever the connection drops.
    pub fn start_client(&self, servers: ServerList, port: u16, reconnect_interval: Duration) {
        let instance = self.clone();
        tokio::spawn(async move {
            loop {
                for host in servers.current() {
                    debug!("Trying network table server {}:{}", host, port);
                    let attempt = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host.as_str(), port))).await;
                    let stream = match attempt {
                        Ok(Ok(stream)) => stream,
                        Ok(Err(e)) => {
                            debug!("  {}:{} unreachable: {}", host, port, e);
                            continue;
                        }
                        Err(_) => {
                            debug!("  {}:{} timed out", host, port);
                            continue;
                        }
                    };
                    let peer = instance.next_peer_id();
                    info!("🔌 Connected to network table server {}:{}", host, port);
                    if let Err(e) = run_session(&instance, stream, peer).await {
                        warn!("Network table connection to {} lost: {}", host, e);
                    } else {
                        info!("Network table server {} closed the connection", host);
                    }
                    break;
                }
                tokio::time::sleep(reconnect_interval).await;
            }
        });
    }

    /// Client mode for a team number, with the team's robot addresses as servers.
    pub fn start_client_team(&self, team: u32, settings: &ApplicationConfig) -> ServerList {
        let servers = ServerList::new(team_server_addresses(team));
        self.start_client(
            servers.clone(),
            settings.nt_port,
            Duration::from_millis(settings.nt_reconnect_interval_ms),
        );
        servers
    }

    /// Lets a local driver station override the server address.
    pub fn start_ds_client(&self, servers: ServerList, team: u32, settings: &ApplicationConfig) {
        ds_client::spawn(
            servers,
            team,
            settings.ds_port,
            Duration::from_millis(settings.nt_reconnect_interval_ms),
        );
    }
}

async fn write_message(writer: &mut tokio::net::tcp::OwnedWriteHalf, msg: &WireMessage) -> Result<(), AppError> {
    let mut line = serde_json::to_string(msg)
        .map_err(|e| AppError::Network(format!("could not encode update: {}", e)))?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}

async fn send_snapshot(instance: &NetworkTableInstance, writer: &mut tokio::net::tcp::OwnedWriteHalf) -> Result<(), AppError> {
    for (key, value) in instance.snapshot() {
        write_message(writer, &WireMessage::Update { key, value }).await?;
    }
    Ok(())
}

fn handle_line(instance: &NetworkTableInstance, line: &str, peer: u64) {
    if line.trim().is_empty() {
        return;
    }
    match serde_json::from_str::<WireMessage>(line) {
        Ok(WireMessage::Update { key, value }) => {
            instance.apply(&key, value, peer);
        }
        Err(e) => warn!("Ignoring malformed message from peer #{}: {}", peer, e),
    }
}

/// One connection, either side. Sends a snapshot, then forwards every
/// update that did not come from this peer while applying what it sends.
async fn run_session(instance: &NetworkTableInstance, stream: TcpStream, peer: u64) -> Result<(), AppError> {
    let (reader, mut writer) = stream.into_split();
    // Subscribe before the snapshot so nothing falls in between.
    let mut updates = instance.subscribe();
    send_snapshot(instance, &mut writer).await?;

    let mut lines = BufReader::new(reader).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => handle_line(instance, &line, peer),
                None => return Ok(()),
            },
            update = updates.recv() => match update {
                Ok(update) if update.origin != peer => {
                    write_message(&mut writer, &WireMessage::Update { key: update.key, value: update.value }).await?;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!("Peer #{} fell {} updates behind, resending all entries", peer, missed);
                    send_snapshot(instance, &mut writer).await?;
                }
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_addresses_follow_field_convention() {
        let hosts = team_server_addresses(4904);
        assert_eq!(hosts[0], "10.49.4.2");
        assert_eq!(hosts[1], "roborio-4904-frc.local");
        assert_eq!(team_server_addresses(254)[0], "10.2.54.2");
    }

    #[test]
    fn update_message_wire_format() {
        let msg = WireMessage::Update {
            key: "/Vision/Frame Rate (fps)".into(),
            value: Value::Double(30.0),
        };
        let line = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            line,
            r#"{"type":"update","key":"/Vision/Frame Rate (fps)","value":{"type":"double","value":30.0}}"#
        );
    }

    #[test]
    fn malformed_lines_are_ignored() {
        let nt = NetworkTableInstance::new();
        handle_line(&nt, "not json", 5);
        handle_line(&nt, r#"{"type":"update","key":"/a","value":{"type":"boolean","value":true}}"#, 5);
        assert_eq!(nt.get_value("/a"), Some(Value::Boolean(true)));
        assert_eq!(nt.snapshot().len(), 1);
    }
}
