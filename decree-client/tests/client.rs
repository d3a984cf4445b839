//! Client behavior against a real in-process network.

use decree::{Network, NodeConfig, StoreConfig};
use decree_client::{ClientError, DecreeClient};
use reqwest::StatusCode;

fn ephemeral() -> NodeConfig {
    NodeConfig {
        store: StoreConfig::ephemeral(),
        ..NodeConfig::default()
    }
}

#[tokio::test]
async fn propose_and_read_back() {
    let network = Network::start(19200, 1, 3, 1, &ephemeral()).await.unwrap();
    let proposer = DecreeClient::new("127.0.0.1", 19200);

    proposer.alive().await.unwrap();

    let chosen = proposer.propose("hello").await.unwrap();
    assert_eq!(chosen.value, "hello");
    assert_eq!(chosen.accepted.round, 1);

    // Any node serves the read; an acceptor holds the same state.
    let acceptor = DecreeClient::new("127.0.0.1", 19201);
    let view = acceptor.accepted().await.unwrap();
    assert_eq!(view.value, "hello");
    assert_eq!(view.accepted, chosen.accepted);

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn probes_list_alive_peers() {
    let network = Network::start(19210, 1, 3, 1, &ephemeral()).await.unwrap();
    let client = DecreeClient::new("127.0.0.1", 19210);

    let accepters = client.accepters().await.unwrap();
    assert_eq!(accepters.len(), 3);

    let learners = client.learners().await.unwrap();
    assert_eq!(learners, vec!["127.0.0.1:19214".to_owned()]);

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn propose_to_acceptor_is_rejected() {
    let network = Network::start(19220, 1, 3, 0, &ephemeral()).await.unwrap();

    let not_a_proposer = DecreeClient::new("127.0.0.1", 19221);
    let err = not_a_proposer.propose("nope").await.unwrap_err();
    match err {
        ClientError::UnexpectedStatus { got, .. } => assert_eq!(got, StatusCode::BAD_REQUEST),
        other => panic!("expected status error, got {other:?}"),
    }

    network.shutdown().await.unwrap();
}
