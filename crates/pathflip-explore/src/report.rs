//! Format exploration reports for human consumption.

use crate::coverage::CoverageCriterion;
use crate::explorer::ExplorationReport;

/// Format an exploration report for human consumption.
pub fn format_report(report: &ExplorationReport) -> String {
    let mut output = String::new();

    output.push_str("═══════════════════════════════════════════════════════════════════════\n");
    output.push_str("  Pathflip Exploration Report\n");
    output.push_str("═══════════════════════════════════════════════════════════════════════\n\n");

    output.push_str(&format!("Program:                {}\n", report.program));
    output.push_str(&format!("Strategy:               {}\n", report.strategy));
    output.push_str(&format!("Criterion:              {}\n", report.criterion));
    output.push_str(&format!("Stopped because:        {}\n", report.termination));
    output.push_str(&format!("Exploration rounds:     {}\n", report.rounds));
    output.push_str(&format!("Test cases written:     {}\n", report.test_cases));
    output.push('\n');

    output.push_str("─── Coverage ──────────────────────────────────────────────────────────\n");
    match report.criterion {
        CoverageCriterion::Branch => {
            output.push_str(&format!(
                "Branch edges covered:   {}/{} ({:.1}%)\n",
                report.visited_edges,
                report.total_branch_edges,
                percent(report.visited_edges, report.total_branch_edges)
            ));
        }
        CoverageCriterion::Error => {
            output.push_str(&format!(
                "Error call reached:     {}\n",
                if report.error_reached { "yes" } else { "no" }
            ));
        }
    }
    output.push_str(&format!("Distinct paths:         {}\n", report.visited_paths));
    output.push('\n');

    output.push_str("─── Execution ─────────────────────────────────────────────────────────\n");
    output.push_str(&format!("Attempts:               {}\n", report.attempts));
    if report.truncated_attempts > 0 {
        output.push_str(&format!(
            "Truncated:              {}\n",
            report.truncated_attempts
        ));
    }
    if report.divergences > 0 {
        output.push_str(&format!("Divergences:            {}\n", report.divergences));
    }
    if report.stale_discarded > 0 {
        output.push_str(&format!(
            "Stale records dropped:  {}\n",
            report.stale_discarded
        ));
    }
    if report.duplicates_dropped > 0 {
        output.push_str(&format!(
            "Duplicate children:     {}\n",
            report.duplicates_dropped
        ));
    }
    output.push('\n');

    output.push_str("─── Solver ────────────────────────────────────────────────────────────\n");
    output.push_str(&format!(
        "Queries:                {}\n",
        report.solver_sat + report.solver_unsat + report.solver_unknown
    ));
    output.push_str(&format!("  sat:                  {}\n", report.solver_sat));
    output.push_str(&format!("  unsat:                {}\n", report.solver_unsat));
    output.push_str(&format!("  unknown:              {}\n", report.solver_unknown));
    output.push('\n');

    output.push_str("═══════════════════════════════════════════════════════════════════════\n");

    output
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    part as f64 * 100.0 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::{RunStatus, StrategyKind, Termination};

    fn make_report(criterion: CoverageCriterion) -> ExplorationReport {
        ExplorationReport {
            program: "loop.c".to_string(),
            strategy: StrategyKind::Generational,
            criterion,
            status: RunStatus::SoundAndPrecise,
            termination: Termination::Exhausted,
            rounds: 7,
            attempts: 12,
            truncated_attempts: 0,
            divergences: 0,
            solver_sat: 9,
            solver_unsat: 2,
            solver_unknown: 0,
            test_cases: 8,
            visited_edges: 6,
            total_branch_edges: 8,
            visited_paths: 8,
            stale_discarded: 0,
            duplicates_dropped: 3,
            error_reached: false,
        }
    }

    #[test]
    fn test_format_branch_report() {
        let formatted = format_report(&make_report(CoverageCriterion::Branch));
        assert!(formatted.contains("Pathflip Exploration Report"));
        assert!(formatted.contains("Program:                loop.c"));
        assert!(formatted.contains("Exploration rounds:     7"));
        assert!(formatted.contains("Branch edges covered:   6/8 (75.0%)"));
        assert!(formatted.contains("Queries:                11"));
        assert!(formatted.contains("Duplicate children:     3"));
        assert!(!formatted.contains("Truncated:"));
        assert!(!formatted.contains("Error call reached"));
    }

    #[test]
    fn test_format_error_report() {
        let mut report = make_report(CoverageCriterion::Error);
        report.error_reached = true;
        report.termination = Termination::ErrorReached;
        report.truncated_attempts = 1;

        let formatted = format_report(&report);
        assert!(formatted.contains("Error call reached:     yes"));
        assert!(formatted.contains("Stopped because:        error location reached"));
        assert!(formatted.contains("Truncated:              1"));
        assert!(!formatted.contains("Branch edges covered"));
    }

    #[test]
    fn test_percent_of_empty_program() {
        assert_eq!(percent(0, 0), 100.0);
        assert_eq!(percent(1, 4), 25.0);
    }
}
