//! Terminal presentation of results

use async_trait::async_trait;
use intrudr_engine::{format_duration, AttackReport, AttackResult, ResultRecord, ResultSink};

/// Console output is capped per response; the full body is in the output directory
pub const MAX_RESPONSE_PRINT: usize = 100_000;

/// Prints each record as it is released by the sequencer
pub struct ConsoleSink {
    total: usize,
    show_request: bool,
}

impl ConsoleSink {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            show_request: true,
        }
    }

    pub fn with_request_echo(mut self, show_request: bool) -> Self {
        self.show_request = show_request;
        self
    }

    pub fn render(&self, record: &ResultRecord) -> String {
        let mut out = format!(
            "\n[{}/{}] Request -> {}\n",
            record.index,
            self.total,
            combo_display(&record.params)
        );

        if self.show_request {
            for line in record.request_text.lines() {
                out.push_str(&format!("\t >> {}\n", line));
            }
        }

        out.push_str(&format!("\t {}\n", outcome_line(record)));

        if !record.response_body.is_empty() {
            out.push_str("\t >> Response body:\n");
            let mut printed = 0;
            for line in record.response_body.lines() {
                if printed >= MAX_RESPONSE_PRINT {
                    out.push_str(&format!(
                        "\t  [Response truncated in console at {} chars]\n",
                        MAX_RESPONSE_PRINT
                    ));
                    break;
                }
                out.push_str(&format!("\t  {}\n", line));
                printed += line.chars().count() + 1;
            }
        }

        out
    }
}

#[async_trait]
impl ResultSink for ConsoleSink {
    async fn accept(&self, record: &ResultRecord) -> AttackResult<()> {
        print!("{}", self.render(record));
        Ok(())
    }
}

/// `user-alice_pass-x` as `user-alice | pass-x`
pub fn combo_display(params: &str) -> String {
    if params.is_empty() {
        "(no params)".to_string()
    } else {
        params.replace('_', " | ")
    }
}

fn outcome_line(record: &ResultRecord) -> String {
    let time = record.elapsed.as_secs_f64();
    match (&record.error, record.status) {
        (Some(error), _) => format!("[-] Failed: {}", error),
        (None, Some(status)) => {
            let marker = if (200..300).contains(&status) { "[*]" } else { "[-]" };
            format!(
                "{} Status: {} | Length: {} chars | Time: {:.3}s",
                marker, status, record.length, time
            )
        }
        (None, None) => "[-] No status returned.".to_string(),
    }
}

/// End-of-run table plus totals
pub fn render_summary(report: &AttackReport) -> String {
    let total = report.records.len();
    let mut out = format!("\n{} Attack Summary {}\n\n", "-".repeat(30), "-".repeat(30));

    for record in &report.records {
        out.push_str(&format!(
            "[{}/{}] Request -> {} \t {}\n",
            record.index,
            total,
            combo_display(&record.params),
            outcome_line(record)
        ));
    }

    let summary = &report.summary;
    out.push_str(&format!(
        "\n[*] {} requests: {} succeeded, {} failed ({:.1}% success)\n",
        summary.total_requests,
        summary.successful_requests,
        summary.failed_requests,
        summary.success_rate()
    ));
    if !summary.status_code_distribution.is_empty() {
        let codes: Vec<String> = summary
            .status_code_distribution
            .iter()
            .map(|(code, count)| format!("{}x{}", code, count))
            .collect();
        out.push_str(&format!("[*] Status codes: {}\n", codes.join(", ")));
    }
    if report.cancelled {
        out.push_str("[!] Attack was interrupted; unsent requests are marked as missing\n");
    }
    out.push_str(&format!(
        "[*] Total attack time: {:.2} s ({})\n",
        summary.duration.as_secs_f64(),
        format_duration(summary.duration)
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_combo_display() {
        assert_eq!(combo_display("user-alice_pass-x"), "user-alice | pass-x");
        assert_eq!(combo_display(""), "(no params)");
    }

    #[test]
    fn test_render_success() {
        let mut record = ResultRecord::new(2, "q-a".to_string()).with_response(
            200,
            "hello\nworld".to_string(),
            Duration::from_millis(1234),
        );
        record.request_text = "GET /?q=a HTTP/1.1\nHost: h".to_string();

        let text = ConsoleSink::new(5).render(&record);
        assert!(text.contains("[2/5] Request -> q-a"));
        assert!(text.contains("\t >> GET /?q=a HTTP/1.1\n"));
        assert!(text.contains("[*] Status: 200 | Length: 11 chars | Time: 1.234s"));
        assert!(text.contains("\t  world\n"));
    }

    #[test]
    fn test_render_failure_without_request_echo() {
        let mut record = ResultRecord::failed(1, "q-a".to_string(), "No Host header");
        record.request_text = "GET / HTTP/1.1".to_string();

        let text = ConsoleSink::new(1).with_request_echo(false).render(&record);
        assert!(text.contains("[-] Failed: No Host header"));
        assert!(!text.contains(">> GET"));
    }

    #[test]
    fn test_error_status_marker() {
        let record = ResultRecord::new(1, String::new()).with_response(
            500,
            String::new(),
            Duration::ZERO,
        );
        assert!(outcome_line(&record).starts_with("[-] Status: 500"));
    }
}
