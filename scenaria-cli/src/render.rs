//! Plain-text rendering of transitions and store projections.

use std::io::{self, Write};

use scenaria_engine::scenario::ScenarioOption;
use scenaria_engine::simulation::{ProjectionRow, Resolution, Selection, Simulation};
use scenaria_telemetry::MetricsRecorder;

pub fn option_label(option: &ScenarioOption) -> &str {
    if option.label.is_empty() {
        &option.id
    } else {
        &option.label
    }
}

pub fn resolution<W: Write>(out: &mut W, step: &Resolution) -> io::Result<()> {
    let how = match step.selection {
        Selection::Chosen => "chosen",
        Selection::Matched => "matched",
        Selection::Fallback => "fallback",
    };
    let label = if step.label.is_empty() {
        &step.option
    } else {
        &step.label
    };
    writeln!(out, "[{}] {} ({})", step.node, label, how)?;
    if let Some(feedback) = &step.feedback {
        writeln!(out, "  {feedback}")?;
    }
    if let Some(explanation) = &step.explanation {
        writeln!(out, "  Why: {explanation}")?;
    }
    if let Some(badge) = &step.badge {
        writeln!(out, "  Badge earned: {badge}")?;
    }
    if let Some(feedback) = step.bonus.as_ref().and_then(|b| b.feedback.as_ref()) {
        writeln!(out, "  Bonus! {feedback}")?;
    }
    for delta in &step.deltas {
        writeln!(out, "  {}: {} -> {}", delta.path, delta.before, delta.after)?;
    }
    Ok(())
}

pub fn projection<W: Write>(out: &mut W, rows: &[ProjectionRow]) -> io::Result<()> {
    for row in rows {
        let label = row.label.as_deref().unwrap_or(&row.path);
        writeln!(out, "  {label}: {}", row.value)?;
    }
    Ok(())
}

/// Writes the sidebar projection, or every leaf when the scenario has no
/// sidebar.
pub fn state<W: Write>(out: &mut W, simulation: &Simulation) -> anyhow::Result<()> {
    let rows = simulation.projection()?;
    if rows.is_empty() {
        for (path, value) in simulation.store().leaves() {
            writeln!(out, "  {path}: {value}")?;
        }
    } else {
        projection(out, &rows)?;
    }
    Ok(())
}

/// Counts a resolved transition.
pub fn record(metrics: &MetricsRecorder, step: &Resolution) {
    metrics.transitions.inc();
    match step.selection {
        Selection::Matched => metrics.auto_resolutions.inc(),
        Selection::Fallback => metrics.fallbacks.inc(),
        Selection::Chosen => {}
    }
    if step.bonus.as_ref().is_some_and(|bonus| bonus.fired) {
        metrics.bonus_events.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenaria_core::store::Value;
    use scenaria_engine::scenario::Next;
    use scenaria_engine::simulation::{BonusOutcome, Delta};

    fn step() -> Resolution {
        Resolution {
            node: "statement".into(),
            option: "pay_full".into(),
            label: "Pay in full".into(),
            selection: Selection::Chosen,
            deltas: vec![Delta {
                path: "cc.balance".into(),
                before: Value::Number(300.0),
                after: Value::Number(0.0),
            }],
            feedback: Some("Perfect!".into()),
            explanation: None,
            badge: Some("On-Time Payer".into()),
            bonus: Some(BonusOutcome {
                fired: true,
                feedback: Some("Lucky!".into()),
            }),
            next: Next::End,
        }
    }

    #[test]
    fn renders_a_resolution() {
        let mut out = Vec::new();
        resolution(&mut out, &step()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "[statement] Pay in full (chosen)\n  Perfect!\n  Badge earned: On-Time Payer\n  Bonus! Lucky!\n  cc.balance: 300 -> 0\n"
        );
    }

    #[test]
    fn records_selection_kinds() {
        let metrics = MetricsRecorder::new().unwrap();
        let mut matched = step();
        matched.selection = Selection::Matched;
        matched.bonus = None;
        record(&metrics, &step());
        record(&metrics, &matched);
        assert_eq!(metrics.transitions.get(), 2);
        assert_eq!(metrics.auto_resolutions.get(), 1);
        assert_eq!(metrics.fallbacks.get(), 0);
        assert_eq!(metrics.bonus_events.get(), 1);
    }
}
