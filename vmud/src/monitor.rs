use crate::listen::DaemonError;
use chrono::{DateTime, SecondsFormat};
use log::{info, warn};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use vmu_notify::{decode_message, Message};
use vmu_product::time::adjust_generation_time;

const DATAGRAM_MAX: usize = 64 * 1024;

/// Listens on the given UDP groups (multicast or plain) and renders every
/// pool message as one log line. Runs until cancelled.
pub async fn run(groups: Vec<String>) -> Result<(), DaemonError> {
    let mut tasks = Vec::with_capacity(groups.len());
    for group in groups {
        let socket = bind_group(&group).await?;
        info!("monitor.event=listening group={group}");
        tasks.push(tokio::spawn(pump(socket)));
    }
    for task in tasks {
        let _ = task.await;
    }
    Ok(())
}

async fn bind_group(group: &str) -> Result<UdpSocket, DaemonError> {
    let addr: SocketAddr = group
        .parse()
        .map_err(|_| DaemonError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("invalid group {group}"))))?;
    let socket = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), addr.port())).await?;
    if let IpAddr::V4(ip) = addr.ip() {
        if ip.is_multicast() {
            socket.join_multicast_v4(ip, Ipv4Addr::UNSPECIFIED)?;
        }
    }
    Ok(socket)
}

async fn pump(socket: UdpSocket) {
    let mut buf = vec![0u8; DATAGRAM_MAX];
    loop {
        match socket.recv(&mut buf).await {
            Ok(n) => match decode_message(&buf[..n]) {
                Ok(msg) => info!("{}", format_message(&msg)),
                Err(e) => warn!("monitor.event=decode_fail reason={e}"),
            },
            Err(e) => {
                warn!("monitor.event=recv_fail reason={e}");
                break;
            }
        }
    }
}

/// One line per message: origin, sequence, instance, channel, mode, count,
/// elapsed, rate and the reference filename.
pub fn format_message(msg: &Message) -> String {
    let mode = if msg.realtime { "realtime" } else { "playback" };
    let secs = msg.elapsed.as_secs_f64();
    let rate = if secs > 0.0 { msg.count as f64 / secs } else { msg.count as f64 };
    let generated = adjust_generation_time(msg.generated).to_rfc3339_opts(SecondsFormat::Secs, true);
    let acquired = DateTime::from_timestamp(msg.acquired, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} | {:9} | {:3} | {} | {:8} | {:9} | {:?} | {:6.3} | {} | {} | {}",
        msg.origin,
        msg.sequence,
        msg.instance,
        msg.channel as u8,
        mode,
        msg.count,
        msg.elapsed,
        rate,
        generated,
        acquired,
        msg.reference,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vmu_product::Channel;

    #[test]
    fn lines_carry_mode_and_reference() {
        let msg = Message {
            origin: "51".into(),
            sequence: 7,
            instance: 255,
            channel: Channel::Science,
            realtime: false,
            count: 3,
            elapsed: Duration::from_secs(2),
            generated: 0,
            acquired: 0,
            reference: "0051_MMA_3_000007_20180714_100000_000000000.mma".into(),
            upi: "MMA".into(),
        };
        let line = format_message(&msg);
        assert!(line.contains("playback"));
        assert!(line.ends_with(".mma"));
        assert!(line.starts_with("51 | "));
    }

    #[tokio::test]
    async fn plain_groups_bind() {
        let socket = bind_group("127.0.0.1:0").await.unwrap();
        assert!(socket.local_addr().is_ok());
    }

    #[tokio::test]
    async fn bad_groups_are_rejected() {
        assert!(bind_group("not-an-address").await.is_err());
    }
}
