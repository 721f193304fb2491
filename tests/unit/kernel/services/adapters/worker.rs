use super::*;
use serde_json::json;

use crate::kernel::dictionary::{DataDictionary, NodeRecord, SchemaDictionary};
use crate::kernel::message::MessageType;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn initialize() -> String {
    let document = DataDictionary::new("root", NodeRecord::new("div", json!({})));
    Envelope::initialize(document, SchemaDictionary::new())
        .encode()
        .unwrap()
}

#[test]
fn test_worker_channel_never_blocks_when_full() {
    let (tx, _rx) = mpsc::channel::<String>(1);
    let channel = WorkerChannel::new(tx);
    assert_eq!(channel.post("a".to_string()), Ok(()));
    assert_eq!(channel.post("b".to_string()), Err(ChannelError::Full));
}

#[test]
fn test_worker_channel_reports_closed() {
    let (tx, rx) = mpsc::channel::<String>(1);
    drop(rx);
    let channel = WorkerChannel::new(tx);
    assert_eq!(channel.post("a".to_string()), Err(ChannelError::Closed));
}

#[test]
fn test_run_worker_answers_in_order() {
    let (request_tx, request_rx) = mpsc::channel::<String>(8);
    let (response_tx, mut response_rx) = mpsc::channel::<String>(8);

    request_tx.try_send(initialize()).unwrap();
    request_tx.try_send("garbage".to_string()).unwrap();
    request_tx
        .try_send(
            Envelope::navigation_update("missing", None)
                .encode()
                .unwrap(),
        )
        .unwrap();
    request_tx
        .try_send(Envelope::custom("svc", "ping").encode().unwrap())
        .unwrap();
    drop(request_tx);

    runtime().block_on(run_worker(DataStore::new(), request_rx, response_tx));

    let mut kinds = Vec::new();
    while let Ok(payload) = response_rx.try_recv() {
        kinds.push(Envelope::decode(&payload).unwrap().kind);
    }
    assert_eq!(
        kinds,
        vec![MessageType::Initialize, MessageType::Error, MessageType::Custom]
    );
}

#[test]
fn test_run_worker_stops_when_responses_dropped() {
    let (request_tx, request_rx) = mpsc::channel::<String>(8);
    let (response_tx, response_rx) = mpsc::channel::<String>(8);
    drop(response_rx);

    request_tx.try_send(initialize()).unwrap();
    // The sender stays open; the worker must still return.
    runtime().block_on(run_worker(DataStore::new(), request_rx, response_tx));
    drop(request_tx);
}

#[test]
fn test_spawned_worker_exits_when_channel_dropped() {
    let worker = Worker::spawn(0).unwrap();
    let (channel, inbound, thread) = worker.into_parts();
    drop(channel);
    drop(inbound);
    thread.join();
}
