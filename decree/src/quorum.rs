//! Concurrent peer dispatch and reply collection.
//!
//! One task per peer, each delivering exactly one reply into a bounded
//! rendezvous sized to the peer count. Collectors consume at most one reply
//! per expected peer, so a peer that never answers simply never contributes;
//! when a collector exits early its receiver drops and the stragglers'
//! sends fail silently.

use std::future::Future;

use tokio::sync::mpsc;

use crate::client::PeerClient;

/// Dispatch `send` to every peer concurrently, returning the reply channel.
pub(crate) fn fan_out<T, F, Fut>(peers: &[String], send: F) -> mpsc::Receiver<T>
where
    T: Send + 'static,
    F: Fn(String) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(peers.len().max(1));
    for addr in peers {
        let tx = tx.clone();
        let fut = send(addr.clone());
        tokio::spawn(async move {
            let _ = tx.send(fut.await).await;
        });
    }
    rx
}

/// Probe every peer in `peers` and return the addresses that answered.
/// Non-responders are omitted.
pub(crate) async fn probe_alive(client: &PeerClient, peers: &[String]) -> Vec<String> {
    let mut rx = fan_out(peers, |addr| {
        let client = client.clone();
        async move {
            let alive = client.alive(&addr).await;
            (addr, alive)
        }
    });

    let mut alive = Vec::new();
    for _ in 0..peers.len() {
        let Some((addr, ok)) = rx.recv().await else {
            break;
        };
        if ok {
            alive.push(addr);
        }
    }
    alive.sort();
    alive
}
