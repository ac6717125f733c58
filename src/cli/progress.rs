// src/cli/progress.rs — Terminal progress renderer for real-time run feedback

use crate::core::types::ProgressEvent;

/// Build a progress callback that writes formatted output to stderr.
///
/// All progress output goes to stderr so stdout remains clean for the chart.
/// Returns a closure suitable for `Orchestrator::with_progress()`.
pub fn terminal_progress() -> impl Fn(ProgressEvent) + Send + Sync + 'static {
    move |event| eprintln!("{}", format_event(&event))
}

/// One line per lifecycle event.
pub fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::RunStarted {
            query,
            max_iterations,
            model,
            cache_hit,
        } => format!(
            "[start] \"{}\" (model={}, max {} iteration(s){})",
            query,
            model,
            max_iterations,
            if *cache_hit { ", cache hit" } else { "" },
        ),
        ProgressEvent::IterationStart {
            iteration,
            max_iterations,
        } => format!("[iter {}/{}] generating...", iteration, max_iterations),
        ProgressEvent::IterationEnd {
            iteration,
            rule_score,
            quality_score,
            combined,
            decision,
        } => {
            let quality = match quality_score {
                Some(q) => format!("{q:.2}"),
                None => "-".into(),
            };
            format!(
                "[iter {}] rules={:.2} quality={} combined={:.2} -> {}",
                iteration, rule_score, quality, combined, decision,
            )
        }
        ProgressEvent::Escalated {
            iteration,
            category,
        } => match iteration {
            Some(i) => format!("[iter {}] needs clarification ({})", i, category),
            None => format!("[preflight] needs clarification ({})", category),
        },
        ProgressEvent::Complete {
            best_score,
            iterations,
            termination,
        } => format!(
            "[done] score={:.2} iterations={} ({})",
            best_score,
            iterations,
            termination.reason(),
        ),
    }
}
