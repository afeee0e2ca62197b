use std::io::{self, Write};

use anyhow::Result;
use galeria::progress::best_candidate_message;
use galeria::{ClientConfig, GaleriaError, NextStep, PollState, TickReport};
use tracing::{info, warn};

use crate::client::ApiClient;

/// Printed view of the run; only reports what changed since the last tick.
#[derive(Default)]
struct Console {
    last_status: Option<String>,
    last_percent: Option<u32>,
    last_best: Option<u32>,
}

impl Console {
    fn render(&mut self, report: &TickReport) -> io::Result<()> {
        let mut out = io::stdout().lock();
        for line in &report.new_lines {
            writeln!(out, "{line}")?;
        }
        out.flush()?;

        if self.last_status.as_deref() != Some(report.status.as_str()) {
            info!(status = %report.status, "run status");
            self.last_status = Some(report.status.clone());
        }
        for item in &report.newly_completed {
            let text = report
                .bars
                .iter()
                .find(|(n, _)| n == item)
                .and_then(|(_, bar)| bar.result_text())
                .unwrap_or_default();
            info!(gallery = item, result = %text, "gallery finished");
        }
        if self.last_percent != Some(report.overall_percent) {
            info!(overall = report.overall_percent, "progress {}%", report.overall_percent);
            self.last_percent = Some(report.overall_percent);
        }
        if let Some(best) = report.best_candidate {
            if self.last_best != Some(best) {
                info!("{}", best_candidate_message(best));
                self.last_best = Some(best);
            }
        }
        Ok(())
    }
}

/// Count a failed poll and log its cause. Errors once the configured cap of
/// consecutive failures is reached; the last cause is still logged.
fn failed_tick(state: &mut PollState, config: &ClientConfig, err: &anyhow::Error) -> Result<NextStep> {
    let recorded = state.record_error(config.max_consecutive_errors);
    let failures = match &recorded {
        Ok(n) | Err(GaleriaError::PollGaveUp(n)) => *n,
        Err(_) => 0,
    };
    warn!(failures, "status poll failed: {err:#}");
    recorded?;
    Ok(NextStep::PollAgain {
        after: config.poll_interval(),
    })
}

/// Poll `thread_id` until the run finishes and return the absolute results URL.
///
/// Ticks are sequential: the next request goes out only after the previous
/// one was handled and the poll interval elapsed.
pub async fn watch(
    client: &ApiClient,
    config: &ClientConfig,
    thread_id: &str,
    run_id: Option<&str>,
) -> Result<String> {
    let mut state = PollState::new(config.total_items);
    let mut console = Console::default();
    info!(thread_id, "watching run");
    loop {
        let step = match client.status(thread_id).await {
            Ok(snapshot) => {
                let report = state.apply(&snapshot);
                console.render(&report)?;
                report.next_step(config, &config.results_path, run_id)
            }
            Err(err) => failed_tick(&mut state, config, &err)?,
        };
        match step {
            NextStep::PollAgain { after } => tokio::time::sleep(after).await,
            NextStep::Navigate { url, .. } => {
                info!(completed = state.completed_count(), "run finished");
                return Ok(client.url(&url));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn final_failure_is_logged_before_giving_up() {
        let sink = Captured::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let config = ClientConfig {
            max_consecutive_errors: Some(2),
            ..ClientConfig::default()
        };
        let mut state = PollState::new(config.total_items);
        let (first, second) = tracing::subscriber::with_default(subscriber, || {
            let first = failed_tick(&mut state, &config, &anyhow!("connection refused"));
            let second = failed_tick(&mut state, &config, &anyhow!("connection reset"));
            (first, second)
        });

        assert_eq!(
            first.unwrap(),
            NextStep::PollAgain {
                after: config.poll_interval()
            }
        );
        let err = second.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GaleriaError>(),
            Some(GaleriaError::PollGaveUp(2))
        ));

        let logged = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("connection refused"));
        assert!(logged.contains("connection reset"));
        assert!(logged.contains("failures=2"));
    }
}
