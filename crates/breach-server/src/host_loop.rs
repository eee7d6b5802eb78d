//! The host tick loop: network events in, edit broadcasts out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use breach_net::{HostServer, NetEvent};
use breach_sync::{EditHost, Outgoing, Recipient};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Runs the host until `shutdown` resolves or the transport goes away.
///
/// Network events are applied as they arrive; world streaming and the
/// outgoing queue advance once per `tick`. Returns the host so callers can
/// inspect or persist its state.
pub async fn run_host_loop(
    server: Arc<HostServer>,
    mut events: mpsc::UnboundedReceiver<NetEvent>,
    mut host: EditHost,
    tick: Duration,
    shutdown: impl Future<Output = ()>,
) -> EditHost {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(event) => handle_event(&mut host, event),
                None => {
                    tracing::info!("Transport closed, stopping host loop");
                    break;
                }
            },
            _ = interval.tick() => {
                let report = host.tick();
                if report.loaded > 0 || report.unloaded > 0 {
                    tracing::debug!("Streaming: {report:?}");
                }
                flush(&server, &mut host).await;
            }
        }
    }

    flush(&server, &mut host).await;
    host
}

fn handle_event(host: &mut EditHost, event: NetEvent) {
    match event {
        NetEvent::Connected(peer, addr) => {
            tracing::info!("Peer {peer:?} connected from {addr}");
            host.peer_joined(peer);
        }
        NetEvent::Message(peer, message) => {
            // Rejections are logged by the host and never answered.
            let _ = host.handle_message(peer, message);
        }
        NetEvent::Disconnected(peer) => host.peer_left(peer),
    }
}

async fn flush(server: &HostServer, host: &mut EditHost) {
    for Outgoing { to, message } in host.drain() {
        let result = match to {
            Recipient::Peer(peer) => server.send_to(peer, &message).await,
            Recipient::All => server.broadcast(&message).await.map(|_| ()),
        };
        match result {
            Ok(()) => {}
            Err(e) if e.is_closed() => tracing::debug!("Dropped message for departed peer: {e}"),
            Err(e) => tracing::warn!("Failed to send to {to:?}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breach_net::{
        ClientConfig, EditRequest, JoinRequest, Message, PeerClient, ServerConfig, create_listener,
    };
    use breach_sync::EditRules;
    use breach_voxel::{BlockPos, BlockRegistry, BlockTypeId};
    use breach_world::{FlatBaseline, NullSink, StreamerConfig, VoxelWorld};
    use tokio::sync::oneshot;

    fn host() -> EditHost {
        let registry = Arc::new(BlockRegistry::standard());
        let baseline = Box::new(FlatBaseline::from_registry(&registry, 8));
        let world = VoxelWorld::new(
            registry,
            baseline,
            Box::new(NullSink::default()),
            StreamerConfig::default(),
        );
        EditHost::new(world, EditRules::default())
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Message>) -> Message {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("connection closed")
    }

    #[tokio::test]
    async fn test_join_and_edit_over_tcp() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let listener = create_listener(config.bind_addr, &config.socket).unwrap();
        let addr = listener.local_addr().unwrap();
        let (server, events) = HostServer::new(config);
        let server = Arc::new(server);

        let accept = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run_with_listener(listener).await })
        };
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let host_loop = tokio::spawn(run_host_loop(
            Arc::clone(&server),
            events,
            host(),
            Duration::from_millis(10),
            async move {
                let _ = stop_rx.await;
            },
        ));

        let (client, mut rx) = PeerClient::connect(addr, ClientConfig::default())
            .await
            .unwrap();
        client
            .send(&Message::JoinRequest(JoinRequest {
                player_name: "tester".to_string(),
            }))
            .unwrap();

        assert!(matches!(next(&mut rx).await, Message::Welcome(_)));
        match next(&mut rx).await {
            Message::MapStatus(status) => {
                assert_eq!(status.last_seq, 0);
                assert!(status.xs.is_empty());
            }
            other => panic!("expected snapshot, got {other:?}"),
        }

        client
            .send(&Message::EditRequest(EditRequest {
                x: 0,
                y: 20,
                z: 0,
                block_id: 6,
            }))
            .unwrap();
        match next(&mut rx).await {
            Message::BlockEdit(edit) => {
                assert_eq!(edit.seq, 1);
                assert_eq!((edit.x, edit.y, edit.z, edit.block_id), (0, 20, 0, 6));
            }
            other => panic!("expected edit broadcast, got {other:?}"),
        }

        stop_tx.send(()).unwrap();
        let host = host_loop.await.unwrap();
        assert_eq!(host.last_seq(), 1);
        assert_eq!(host.world().block_at(BlockPos::new(0, 20, 0)), BlockTypeId(6));

        server.shutdown();
        accept.await.unwrap().unwrap();
    }
}
