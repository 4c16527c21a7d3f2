#![allow(clippy::unwrap_used, clippy::panic)]

use futures::StreamExt;
use tokio::sync::mpsc::error::TryRecvError;

use crate::{
    dispatch::{Dispatcher, Notification},
    snapshot_store::{ChangeSet, Op},
};

fn changes(generation: u64, ops: Vec<Op<u32>>) -> ChangeSet<u32> {
    ChangeSet::new(generation, ops)
}

#[tokio::test]
async fn delivers_only_matching_ops() {
    let dispatcher = Dispatcher::<u32>::new();
    let mut server = dispatcher.subscribe("server.*").await.unwrap();
    let mut port = dispatcher.subscribe("*.port").await.unwrap();

    dispatcher
        .dispatch(changes(
            2,
            vec![
                Op::delete("client.port", 1),
                Op::update("server.host", 7),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(
        server.recv().await,
        Some(Notification {
            generation: 2,
            op: Op::update("server.host", 7),
        })
    );
    assert_eq!(port.recv().await.unwrap().op, Op::delete("client.port", 1));

    assert_eq!(dispatcher.subscriber_count().await.unwrap(), 2);
    assert!(matches!(server.try_recv(), Err(TryRecvError::Empty)));
    assert!(matches!(port.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn ops_arrive_in_change_set_order() {
    let dispatcher = Dispatcher::<u32>::new();
    let mut all = dispatcher.subscribe("*").await.unwrap();

    let ops = vec![
        Op::delete("a", 1),
        Op::update("b", 2),
        Op::update("c", 3),
    ];
    dispatcher.dispatch(changes(4, ops.clone())).await.unwrap();

    for expected in ops {
        assert_eq!(all.recv().await.unwrap().op, expected);
    }
}

#[tokio::test]
async fn dropping_subscription_unsubscribes() {
    let dispatcher = Dispatcher::<u32>::new();
    let first = dispatcher.subscribe("*").await.unwrap();
    let _second = dispatcher.subscribe("a").await.unwrap();
    assert_eq!(dispatcher.subscriber_count().await.unwrap(), 2);

    drop(first);

    assert_eq!(dispatcher.subscriber_count().await.unwrap(), 1);
}

#[tokio::test]
async fn closed_subscription_is_pruned_without_unsubscribe() {
    let dispatcher = Dispatcher::<u32>::new();
    let mut quiet = dispatcher.subscribe("never.matches").await.unwrap();
    let _active = dispatcher.subscribe("a").await.unwrap();

    quiet.receiver.close();

    assert_eq!(dispatcher.subscriber_count().await.unwrap(), 1);
    dispatcher
        .dispatch(changes(2, vec![Op::update("a", 1)]))
        .await
        .unwrap();
    assert_eq!(dispatcher.subscriber_count().await.unwrap(), 1);
}

#[tokio::test]
async fn lagging_subscriber_is_dropped() {
    let dispatcher = Dispatcher::<u32>::with_capacity(1);
    let mut slow = dispatcher.subscribe("*").await.unwrap();

    dispatcher
        .dispatch(changes(2, vec![Op::update("a", 1), Op::update("b", 2)]))
        .await
        .unwrap();

    assert_eq!(slow.recv().await.unwrap().op, Op::update("a", 1));
    assert_eq!(slow.recv().await, None);
    assert_eq!(dispatcher.subscriber_count().await.unwrap(), 0);
}

#[tokio::test]
async fn empty_change_set_is_not_sent() {
    let dispatcher = Dispatcher::<u32>::new();
    let mut all = dispatcher.subscribe("*").await.unwrap();

    dispatcher.dispatch(changes(2, Vec::new())).await.unwrap();
    dispatcher.subscriber_count().await.unwrap();

    assert!(matches!(all.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn subscription_as_stream() {
    let dispatcher = Dispatcher::<u32>::new();
    let stream = dispatcher.subscribe("a.*").await.unwrap().into_stream();

    dispatcher
        .dispatch(changes(
            2,
            vec![Op::update("a.x", 1), Op::update("b.x", 2), Op::update("a.y", 3)],
        ))
        .await
        .unwrap();

    let keys: Vec<_> = stream
        .take(2)
        .map(|notification| notification.op.key)
        .collect()
        .await;

    assert_eq!(keys, ["a.x", "a.y"]);
}
