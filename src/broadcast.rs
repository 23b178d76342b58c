//! Broadcast channel between the downloader and the barrels
//!
//! One publisher, many subscribers, no delivery guarantee. Two transports:
//! - UDP multicast, the deployment default. Each barrel joins the group with
//!   `SO_REUSEADDR` so several barrels can share one host.
//! - An in-process `tokio::sync::broadcast` bus for embedded clusters and
//!   tests. A receiver that falls behind skips records, like a lossy socket.
//!
//! Both transports cap a record at [`MAX_RECORD_SIZE`] bytes.

use crate::common::wire::truncate_record;
use crate::common::{Error, MulticastConfig, Result, MAX_RECORD_SIZE};
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

const LOCAL_CAPACITY: usize = 1024;

/// Where records travel.
#[derive(Debug, Clone)]
pub enum BroadcastBus {
    Multicast(MulticastConfig),
    Local(broadcast::Sender<Bytes>),
}

impl BroadcastBus {
    pub fn multicast(config: MulticastConfig) -> Self {
        BroadcastBus::Multicast(config)
    }

    /// A fresh in-process bus. Clones share the same channel.
    pub fn local() -> Self {
        let (tx, _rx) = broadcast::channel(LOCAL_CAPACITY);
        BroadcastBus::Local(tx)
    }

    pub async fn publisher(&self) -> Result<Publisher> {
        match self {
            BroadcastBus::Multicast(config) => {
                let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
                socket.set_multicast_ttl_v4(config.ttl)?;
                socket.set_multicast_loop_v4(true)?;
                let target = SocketAddr::V4(SocketAddrV4::new(config.group, config.port));
                tracing::info!("Publishing records to multicast group {}", target);
                Ok(Publisher::Multicast { socket, target })
            }
            BroadcastBus::Local(tx) => Ok(Publisher::Local(tx.clone())),
        }
    }

    pub async fn subscribe(&self) -> Result<Subscriber> {
        match self {
            BroadcastBus::Multicast(config) => {
                let socket = join_group(config)?;
                tracing::info!(
                    "Joined multicast group {}:{}",
                    config.group,
                    config.port
                );
                Ok(Subscriber::Multicast {
                    socket,
                    buf: vec![0u8; MAX_RECORD_SIZE],
                })
            }
            BroadcastBus::Local(tx) => Ok(Subscriber::Local(tx.subscribe())),
        }
    }
}

fn join_group(config: &MulticastConfig) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    let bind = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
    socket.bind(&bind.into())?;
    socket.join_multicast_v4(&config.group, &config.interface)?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

/// Sending half, owned by the downloader behind its send lock.
#[derive(Debug)]
pub enum Publisher {
    Multicast { socket: UdpSocket, target: SocketAddr },
    Local(broadcast::Sender<Bytes>),
}

impl Publisher {
    /// Publish one record, truncated to the datagram ceiling.
    pub async fn publish(&self, record: &[u8]) -> Result<()> {
        let payload = truncate_record(record);
        if payload.len() < record.len() {
            tracing::warn!(
                "Record of {} bytes truncated to {} bytes",
                record.len(),
                payload.len()
            );
        }

        match self {
            Publisher::Multicast { socket, target } => {
                socket.send_to(payload, target).await?;
            }
            Publisher::Local(tx) => {
                if tx.send(Bytes::copy_from_slice(payload)).is_err() {
                    tracing::debug!("No barrels listening, record dropped");
                }
            }
        }
        Ok(())
    }
}

/// Receiving half, owned by a barrel's listener task.
#[derive(Debug)]
pub enum Subscriber {
    Multicast { socket: UdpSocket, buf: Vec<u8> },
    Local(broadcast::Receiver<Bytes>),
}

impl Subscriber {
    /// Wait for the next record.
    pub async fn recv(&mut self) -> Result<Bytes> {
        match self {
            Subscriber::Multicast { socket, buf } => {
                let (len, _src) = socket.recv_from(buf).await?;
                Ok(Bytes::copy_from_slice(&buf[..len]))
            }
            Subscriber::Local(rx) => loop {
                match rx.recv().await {
                    Ok(record) => return Ok(record),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Listener lagged, {} records skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return Err(Error::ChannelClosed),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_bus_fans_out() {
        let bus = BroadcastBus::local();
        let mut a = bus.subscribe().await.unwrap();
        let mut b = bus.subscribe().await.unwrap();
        let publisher = bus.publisher().await.unwrap();

        publisher.publish(b"URL: http://a.com").await.unwrap();

        assert_eq!(&a.recv().await.unwrap()[..], b"URL: http://a.com");
        assert_eq!(&b.recv().await.unwrap()[..], b"URL: http://a.com");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = BroadcastBus::local();
        let publisher = bus.publisher().await.unwrap();
        publisher.publish(b"nobody listening").await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_record_truncated() {
        let bus = BroadcastBus::local();
        let mut sub = bus.subscribe().await.unwrap();
        let publisher = bus.publisher().await.unwrap();

        let record = vec![b'x'; MAX_RECORD_SIZE + 100];
        publisher.publish(&record).await.unwrap();
        assert_eq!(sub.recv().await.unwrap().len(), MAX_RECORD_SIZE);
    }

    #[tokio::test]
    async fn test_closed_bus_reports_error() {
        let (tx, rx) = broadcast::channel::<Bytes>(4);
        let mut sub = Subscriber::Local(rx);
        drop(tx);
        assert!(matches!(sub.recv().await, Err(Error::ChannelClosed)));
    }
}
