//! Reordering of results into job order

use crate::traits::ResultSink;
use crate::types::ResultRecord;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Buffers out-of-order results and releases them by ascending index.
///
/// Indices run from 1 to `total`. Every index is released exactly once:
/// either with the record that arrived for it, or with a missing-result
/// stand-in from [`Sequencer::finish`].
#[derive(Debug)]
pub struct Sequencer {
    total: usize,
    next: usize,
    pending: BTreeMap<usize, ResultRecord>,
}

impl Sequencer {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            next: 1,
            pending: BTreeMap::new(),
        }
    }

    /// Index that must arrive before anything else can be released
    pub fn next_index(&self) -> usize {
        self.next
    }

    pub fn is_complete(&self) -> bool {
        self.next > self.total
    }

    /// Accept one record and return whatever became releasable
    pub fn push(&mut self, record: ResultRecord) -> Vec<ResultRecord> {
        let index = record.index;
        if index < self.next || index > self.total {
            warn!("Dropping result with out-of-range index {}", index);
            return Vec::new();
        }
        if self.pending.contains_key(&index) {
            warn!("Dropping duplicate result for index {}", index);
            return Vec::new();
        }

        self.pending.insert(index, record);

        let mut ready = Vec::new();
        while let Some(record) = self.pending.remove(&self.next) {
            ready.push(record);
            self.next += 1;
        }
        ready
    }

    /// Release everything left, filling gaps with missing-result records
    pub fn finish(&mut self) -> Vec<ResultRecord> {
        if !self.is_complete() {
            warn!(
                "Result stream ended at index {} of {}, filling gaps",
                self.next_index(),
                self.total
            );
        }

        let mut remaining = Vec::with_capacity(self.total.saturating_sub(self.next - 1));
        while self.next <= self.total {
            let record = self
                .pending
                .remove(&self.next)
                .unwrap_or_else(|| ResultRecord::missing(self.next));
            remaining.push(record);
            self.next += 1;
        }
        remaining
    }

    /// Drain `results` until the channel closes, forwarding records to every
    /// sink in order. Returns the full ordered record list.
    pub async fn run(
        mut self,
        mut results: mpsc::Receiver<ResultRecord>,
        sinks: Vec<Arc<dyn ResultSink>>,
    ) -> Vec<ResultRecord> {
        let mut ordered = Vec::with_capacity(self.total);

        while let Some(record) = results.recv().await {
            for ready in self.push(record) {
                emit(&sinks, &ready).await;
                ordered.push(ready);
            }
        }

        for ready in self.finish() {
            emit(&sinks, &ready).await;
            ordered.push(ready);
        }

        ordered
    }
}

async fn emit(sinks: &[Arc<dyn ResultSink>], record: &ResultRecord) {
    for sink in sinks {
        if let Err(e) = sink.accept(record).await {
            warn!("Result sink failed for index {}: {}", record.index, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AttackError, AttackResult};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    fn record(index: usize) -> ResultRecord {
        ResultRecord::new(index, format!("n-{}", index))
    }

    fn indices(records: &[ResultRecord]) -> Vec<usize> {
        records.iter().map(|r| r.index).collect()
    }

    #[derive(Default)]
    struct CollectingSink {
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ResultSink for CollectingSink {
        async fn accept(&self, record: &ResultRecord) -> AttackResult<()> {
            self.seen.lock().await.push(record.index);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ResultSink for FailingSink {
        async fn accept(&self, _record: &ResultRecord) -> AttackResult<()> {
            Err(AttackError::sink("write", "disk full"))
        }
    }

    #[test]
    fn test_push_releases_in_order() {
        let mut sequencer = Sequencer::new(4);

        assert!(sequencer.push(record(2)).is_empty());
        assert!(sequencer.push(record(4)).is_empty());
        assert_eq!(indices(&sequencer.push(record(1))), vec![1, 2]);
        assert_eq!(sequencer.next_index(), 3);
        assert_eq!(indices(&sequencer.push(record(3))), vec![3, 4]);
        assert!(sequencer.is_complete());
        assert!(sequencer.finish().is_empty());
    }

    #[test]
    fn test_duplicates_and_out_of_range_are_dropped() {
        let mut sequencer = Sequencer::new(2);

        assert_eq!(indices(&sequencer.push(record(1))), vec![1]);
        assert!(sequencer.push(record(1)).is_empty());
        assert!(sequencer.push(record(0)).is_empty());
        assert!(sequencer.push(record(3)).is_empty());

        let first = ResultRecord::new(2, "first".to_string());
        let second = ResultRecord::new(2, "second".to_string());
        let released = sequencer.push(first);
        assert_eq!(released[0].params, "first");
        assert!(sequencer.push(second).is_empty());
    }

    #[test]
    fn test_finish_fills_gaps() {
        let mut sequencer = Sequencer::new(4);
        sequencer.push(record(3));

        let remaining = sequencer.finish();
        assert_eq!(indices(&remaining), vec![1, 2, 3, 4]);
        assert_eq!(remaining[0].error.as_deref(), Some("missing result"));
        assert_eq!(remaining[2].params, "n-3");
        assert_eq!(remaining[3].params, "(missing)");
    }

    #[tokio::test]
    async fn test_run_forwards_in_order_to_all_sinks() {
        let (tx, rx) = mpsc::channel(8);
        let collector = Arc::new(CollectingSink::default());
        let sinks: Vec<Arc<dyn ResultSink>> = vec![Arc::new(FailingSink), collector.clone()];

        let handle = tokio::spawn(Sequencer::new(5).run(rx, sinks));
        for index in [3, 1, 5, 2] {
            tx.send(record(index)).await.unwrap();
        }
        drop(tx);

        let ordered = handle.await.unwrap();
        assert_eq!(indices(&ordered), vec![1, 2, 3, 4, 5]);
        assert_eq!(ordered[3].error.as_deref(), Some("missing result"));
        assert_eq!(*collector.seen.lock().await, vec![1, 2, 3, 4, 5]);
    }
}
