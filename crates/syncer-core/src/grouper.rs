//! Periodic batch grouper.
//!
//! Every tick drains the ingestion queue and collapses consecutive forwarded
//! messages into one forward call per run. Comments and dividers break runs
//! and are sent one by one. A tick always runs to completion: no run is kept
//! open across ticks, and a stop request is only observed between ticks.

use std::{sync::Arc, time::Duration};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{ChatId, IdMapping, MessageId},
    executor::{CommentOutcome, Executor},
    messaging::types::NewMessage,
    queue::IngestQueue,
};

pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_millis(1500);

/// What one drain cycle did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub forward_runs: usize,
    pub forwarded: usize,
    pub comments: usize,
    pub dividers: usize,
    pub dropped: usize,
    pub failed: usize,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Disposition {
    Divider,
    Forward,
    Comment,
}

/// Pairs waiting to be written plus the forward run being accumulated.
#[derive(Default)]
struct PendingBatch {
    pairs: Vec<IdMapping>,
    run: Vec<NewMessage>,
}

impl PendingBatch {
    fn run_chat(&self) -> Option<ChatId> {
        self.run.first().map(|m| m.chat_id)
    }
}

pub struct BatchGrouper {
    queue: Arc<IngestQueue>,
    executor: Arc<Executor>,
    interval: Duration,
}

impl BatchGrouper {
    pub fn new(queue: Arc<IngestQueue>, executor: Arc<Executor>, interval: Duration) -> Self {
        Self {
            queue,
            executor,
            interval,
        }
    }

    /// Drive drain cycles until `cancel` fires, then drain once more so
    /// messages admitted before the stop are not lost.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "batch grouper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        self.tick().await;
        tracing::info!("batch grouper stopped");
    }

    async fn tick(&self) {
        let report = self.drain_cycle().await;
        if !report.is_empty() {
            tracing::info!(
                runs = report.forward_runs,
                forwarded = report.forwarded,
                comments = report.comments,
                dividers = report.dividers,
                dropped = report.dropped,
                failed = report.failed,
                "drain cycle complete"
            );
        }
    }

    /// Process everything queued right now, in arrival order.
    pub async fn drain_cycle(&self) -> DrainReport {
        let items = self.queue.take_all().await;
        let mut report = DrainReport::default();
        if items.is_empty() {
            return report;
        }

        let mut batch = PendingBatch::default();
        for msg in items {
            match self.classify(&msg) {
                Disposition::Divider => {
                    self.flush_run(&mut batch, &mut report).await;
                    match self.executor.send_divider(&msg).await {
                        Ok(target) => {
                            report.dividers += 1;
                            if let Some(target_id) = target {
                                batch.pairs.push(IdMapping {
                                    origin_id: msg.id,
                                    target_id,
                                });
                            }
                            // Later comments in this drain may reply to it.
                            self.persist(&mut batch).await;
                        }
                        Err(e) => {
                            report.failed += 1;
                            self.executor.fail("divider relay", &e).await;
                        }
                    }
                }
                Disposition::Forward => {
                    if batch.run_chat().is_some_and(|chat| chat != msg.chat_id) {
                        self.flush_run(&mut batch, &mut report).await;
                    }
                    batch.run.push(msg);
                }
                Disposition::Comment => {
                    self.flush_run(&mut batch, &mut report).await;
                    match self.executor.send_comment(&msg).await {
                        Ok(CommentOutcome::Sent(_)) => report.comments += 1,
                        Ok(CommentOutcome::Dropped) => report.dropped += 1,
                        Err(e) => {
                            report.failed += 1;
                            self.executor.fail("comment relay", &e).await;
                        }
                    }
                }
            }
        }

        self.flush_run(&mut batch, &mut report).await;
        self.persist(&mut batch).await;
        report
    }

    fn classify(&self, msg: &NewMessage) -> Disposition {
        if let Some(file_id) = msg.content.sticker_file_id() {
            if self.executor.channel().is_divider(file_id) {
                return Disposition::Divider;
            }
        }
        if msg.is_forward {
            Disposition::Forward
        } else {
            Disposition::Comment
        }
    }

    async fn flush_run(&self, batch: &mut PendingBatch, report: &mut DrainReport) {
        let Some(from) = batch.run_chat() else {
            return;
        };
        let origins: Vec<MessageId> = std::mem::take(&mut batch.run)
            .into_iter()
            .map(|m| m.id)
            .collect();

        report.forward_runs += 1;
        match self.executor.forward_run(from, &origins).await {
            Ok(pairs) => {
                report.forwarded += pairs.len();
                batch.pairs.extend(pairs);
            }
            Err(e) => {
                report.failed += origins.len();
                self.executor.fail("forward", &e).await;
            }
        }

        self.persist(batch).await;
    }

    async fn persist(&self, batch: &mut PendingBatch) {
        if batch.pairs.is_empty() {
            return;
        }
        let pairs = std::mem::take(&mut batch.pairs);
        if let Err(e) = self.executor.store().insert_many(&pairs).await {
            tracing::error!(count = pairs.len(), "failed to persist mappings: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audit::AuditLog, store::IdStore, testing::*};

    struct Rig {
        _dir: tempfile::TempDir,
        port: Arc<FakePort>,
        queue: Arc<IngestQueue>,
        executor: Arc<Executor>,
        grouper: BatchGrouper,
    }

    fn rig() -> Rig {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(IdStore::new(dir.path().join("channel-no.db")));
        let port = Arc::new(FakePort::new());
        let executor = Arc::new(Executor::new(
            channel(),
            port.clone(),
            store,
            AuditLog::disabled(),
        ));
        let queue = Arc::new(IngestQueue::new());
        let grouper = BatchGrouper::new(queue.clone(), executor.clone(), DEFAULT_BATCH_INTERVAL);
        Rig {
            _dir: dir,
            port,
            queue,
            executor,
            grouper,
        }
    }

    impl Rig {
        async fn enqueue(&self, msgs: Vec<NewMessage>) {
            for m in msgs {
                self.queue.push(m).await;
            }
        }

        async fn target_of(&self, origin: i32) -> Option<MessageId> {
            self.executor.store().lookup(MessageId(origin)).await.ok()
        }
    }

    #[tokio::test]
    async fn empty_queue_makes_no_calls() {
        let rig = rig();
        assert!(rig.grouper.drain_cycle().await.is_empty());
        assert!(rig.port.calls().is_empty());
    }

    #[tokio::test]
    async fn consecutive_forwards_collapse_into_runs() {
        let rig = rig();
        rig.enqueue(vec![
            new_forward(1),
            new_forward(2),
            new_text(3, "comment"),
            new_forward(4),
        ])
        .await;

        let report = rig.grouper.drain_cycle().await;

        assert_eq!(
            rig.port.calls(),
            vec![
                Call::Forward {
                    to: TARGET,
                    from: SOURCE,
                    ids: vec![MessageId(1), MessageId(2)],
                },
                Call::Text {
                    chat: TARGET,
                    text: "comment".to_string(),
                    reply_to: None,
                },
                Call::Forward {
                    to: TARGET,
                    from: SOURCE,
                    ids: vec![MessageId(4)],
                },
            ]
        );
        assert_eq!(report.forward_runs, 2);
        assert_eq!(report.forwarded, 3);
        assert_eq!(report.comments, 1);

        assert_eq!(rig.target_of(1).await, Some(MessageId(1000)));
        assert_eq!(rig.target_of(2).await, Some(MessageId(1001)));
        assert_eq!(rig.target_of(3).await, Some(MessageId(1002)));
        assert_eq!(rig.target_of(4).await, Some(MessageId(1003)));
    }

    #[tokio::test]
    async fn comment_reply_resolves_against_earlier_run_in_same_cycle() {
        let rig = rig();
        rig.enqueue(vec![new_forward(1), new_reply(2, 1, "about that")])
            .await;

        rig.grouper.drain_cycle().await;

        assert_eq!(
            rig.port.calls()[1],
            Call::Text {
                chat: TARGET,
                text: "about that".to_string(),
                reply_to: Some(MessageId(1000)),
            }
        );
    }

    #[tokio::test]
    async fn divider_is_never_merged_into_a_run() {
        let rig = rig();
        rig.enqueue(vec![new_forward(1), new_divider(2), new_forward(3)])
            .await;

        let report = rig.grouper.drain_cycle().await;

        assert_eq!(
            rig.port.forwards(),
            vec![vec![MessageId(1)], vec![MessageId(3)]]
        );
        assert_eq!(
            rig.port.calls()[1],
            Call::Sticker {
                chat: TARGET,
                file_id: DIVIDER.to_string(),
                reply_to: None,
            }
        );
        assert_eq!(report.dividers, 1);
        assert_eq!(rig.target_of(2).await, Some(MessageId(1001)));
    }

    #[tokio::test]
    async fn trailing_divider_pair_is_persisted_at_end_of_drain() {
        let rig = rig();
        rig.enqueue(vec![new_divider(9)]).await;

        rig.grouper.drain_cycle().await;

        assert_eq!(rig.target_of(9).await, Some(MessageId(1000)));
    }

    #[tokio::test]
    async fn reply_to_divider_in_same_drain_is_threaded() {
        let rig = rig();
        rig.enqueue(vec![new_divider(1), new_reply(2, 1, "re divider")])
            .await;

        rig.grouper.drain_cycle().await;

        assert_eq!(
            rig.port.calls(),
            vec![
                Call::Sticker {
                    chat: TARGET,
                    file_id: DIVIDER.to_string(),
                    reply_to: None,
                },
                Call::Text {
                    chat: TARGET,
                    text: "re divider".to_string(),
                    reply_to: Some(MessageId(1000)),
                },
            ]
        );
        assert_eq!(rig.target_of(2).await, Some(MessageId(1001)));
    }

    #[tokio::test]
    async fn failed_comment_is_reported_and_later_items_still_run() {
        let rig = rig();
        *rig.port.fail_sends.lock().unwrap() = true;
        rig.enqueue(vec![new_text(1, "lost"), new_forward(2)]).await;

        let report = rig.grouper.drain_cycle().await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.comments, 0);
        assert_eq!(report.forwarded, 1);
        assert_eq!(rig.target_of(1).await, None);
        assert_eq!(rig.target_of(2).await, Some(MessageId(1000)));
        assert_eq!(
            rig.port.notifications(),
            vec!["[WARNING] comment relay failed, see console to get more information.".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_divider_is_reported_and_later_items_still_run() {
        let rig = rig();
        *rig.port.fail_sends.lock().unwrap() = true;
        rig.enqueue(vec![new_forward(1), new_divider(2), new_forward(3)])
            .await;

        let report = rig.grouper.drain_cycle().await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.dividers, 0);
        assert_eq!(
            rig.port.forwards(),
            vec![vec![MessageId(1)], vec![MessageId(3)]]
        );
        assert_eq!(rig.target_of(2).await, None);
        assert_eq!(rig.target_of(3).await, Some(MessageId(1001)));
        assert_eq!(
            rig.port.notifications(),
            vec!["[WARNING] divider relay failed, see console to get more information.".to_string()]
        );
    }

    #[tokio::test]
    async fn ordinary_sticker_is_a_comment() {
        let rig = rig();
        let sticker = NewMessage {
            content: crate::messaging::types::Content::Sticker {
                file_id: "cat".to_string(),
            },
            is_forward: false,
            ..new_text(5, "")
        };
        rig.enqueue(vec![new_forward(4), sticker]).await;

        let report = rig.grouper.drain_cycle().await;

        assert_eq!(report.comments, 1);
        assert_eq!(rig.port.forwards(), vec![vec![MessageId(4)]]);
    }

    #[tokio::test]
    async fn length_mismatch_maps_returned_subset_only() {
        let rig = rig();
        *rig.port.forward_shortfall.lock().unwrap() = 1;
        rig.enqueue(vec![new_forward(1), new_forward(2), new_forward(3)])
            .await;

        let report = rig.grouper.drain_cycle().await;

        assert_eq!(report.forwarded, 2);
        assert_eq!(rig.target_of(1).await, Some(MessageId(1000)));
        assert_eq!(rig.target_of(2).await, Some(MessageId(1001)));
        assert_eq!(rig.target_of(3).await, None);
    }

    #[tokio::test]
    async fn failed_forward_is_reported_and_later_items_still_run() {
        let rig = rig();
        *rig.port.fail_forward.lock().unwrap() = true;
        rig.enqueue(vec![new_forward(1), new_forward(2), new_text(3, "still here")])
            .await;

        let report = rig.grouper.drain_cycle().await;

        assert_eq!(report.failed, 2);
        assert_eq!(report.comments, 1);
        assert_eq!(rig.target_of(1).await, None);
        assert_eq!(rig.target_of(3).await, Some(MessageId(1000)));
        assert_eq!(rig.port.notifications().len(), 1);
    }

    #[tokio::test]
    async fn items_admitted_after_the_snapshot_wait_for_next_tick() {
        let rig = rig();
        rig.enqueue(vec![new_forward(1)]).await;
        rig.grouper.drain_cycle().await;

        rig.enqueue(vec![new_forward(2)]).await;
        assert_eq!(rig.queue.len().await, 1);
        rig.grouper.drain_cycle().await;

        assert_eq!(
            rig.port.forwards(),
            vec![vec![MessageId(1)], vec![MessageId(2)]]
        );
    }

    #[tokio::test]
    async fn run_loop_drains_on_tick_and_stops_on_cancel() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(IdStore::new(dir.path().join("channel-no.db")));
        let port = Arc::new(FakePort::new());
        let executor = Arc::new(Executor::new(
            channel(),
            port.clone(),
            store.clone(),
            AuditLog::disabled(),
        ));
        let queue = Arc::new(IngestQueue::new());
        let grouper = BatchGrouper::new(queue.clone(), executor, Duration::from_millis(10));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(grouper.run(cancel.clone()));

        queue.push(new_forward(1)).await;
        queue.push(new_forward(2)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        queue.push(new_text(3, "late")).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(queue.is_empty().await);
        assert_eq!(store.lookup(MessageId(1)).await.unwrap(), MessageId(1000));
        assert!(store.lookup(MessageId(3)).await.is_ok());
    }
}
