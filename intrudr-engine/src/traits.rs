//! Core traits and run statistics

use crate::error::AttackResult;
use crate::types::ResultRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Consumer of ordered results
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Receive the next record. Called in ascending index order.
    async fn accept(&self, record: &ResultRecord) -> AttackResult<()>;

    /// Persist the wire bytes of a request before it is sent.
    ///
    /// Returns where the bytes were written, if anywhere.
    async fn store_raw(&self, _index: usize, _raw: &[u8]) -> AttackResult<Option<PathBuf>> {
        Ok(None)
    }
}

/// Statistics for a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackSummary {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub status_code_distribution: BTreeMap<u16, usize>,
    pub average_response_time: Duration,
    pub duration: Duration,
}

impl Default for AttackSummary {
    fn default() -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            status_code_distribution: BTreeMap::new(),
            average_response_time: Duration::ZERO,
            duration: Duration::ZERO,
        }
    }
}

impl AttackSummary {
    pub fn from_records(records: &[ResultRecord], duration: Duration) -> Self {
        let mut summary = Self {
            total_requests: records.len(),
            duration,
            ..Self::default()
        };

        let mut elapsed_total = Duration::ZERO;
        let mut timed = 0u32;
        for record in records {
            if record.is_success() {
                summary.successful_requests += 1;
            } else {
                summary.failed_requests += 1;
            }
            if let Some(status) = record.status {
                *summary.status_code_distribution.entry(status).or_insert(0) += 1;
                elapsed_total += record.elapsed;
                timed += 1;
            }
        }

        if timed > 0 {
            summary.average_response_time = elapsed_total / timed;
        }

        summary
    }

    /// Calculate success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }

    /// Get the most common status code
    pub fn most_common_status_code(&self) -> Option<u16> {
        self.status_code_distribution
            .iter()
            .max_by_key(|(_, count)| *count)
            .map(|(code, _)| *code)
    }
}

/// Render a duration as `H:MM:SS.mmm`
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!(
        "{}:{:02}:{:02}.{:03}",
        hours,
        minutes,
        seconds,
        duration.subsec_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(index: usize, status: u16, millis: u64) -> ResultRecord {
        ResultRecord::new(index, String::new()).with_response(
            status,
            "body".to_string(),
            Duration::from_millis(millis),
        )
    }

    #[test]
    fn test_summary_from_records() {
        let records = vec![
            ok(1, 200, 100),
            ok(2, 404, 300),
            ok(3, 200, 200),
            ResultRecord::failed(4, "a-1".to_string(), "No Host header"),
            ResultRecord::missing(5),
        ];

        let summary = AttackSummary::from_records(&records, Duration::from_secs(2));
        assert_eq!(summary.total_requests, 5);
        assert_eq!(summary.successful_requests, 3);
        assert_eq!(summary.failed_requests, 2);
        assert_eq!(summary.status_code_distribution.get(&200), Some(&2));
        assert_eq!(summary.most_common_status_code(), Some(200));
        assert_eq!(summary.average_response_time, Duration::from_millis(200));
        assert!((summary.success_rate() - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_summary() {
        let summary = AttackSummary::from_records(&[], Duration::ZERO);
        assert_eq!(summary.success_rate(), 0.0);
        assert_eq!(summary.most_common_status_code(), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0:00:00.000");
        assert_eq!(format_duration(Duration::from_millis(61_250)), "0:01:01.250");
        assert_eq!(format_duration(Duration::from_millis(3_723_004)), "1:02:03.004");
    }
}
