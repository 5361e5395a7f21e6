//! Generational search.
//!
//! Each round picks the pending record with the highest `(score, bound)`,
//! flips every constraint from its bound to the end of its path, and keeps
//! the children whose paths are new. Scores of pending records are
//! recomputed every round under the branch criterion, because the covered
//! edge set moves as siblings are expanded.

use super::{Engine, RoundOutcome, Scheduler};
use crate::coverage::CoverageCriterion;
use crate::error::ExploreError;
use crate::flipper::FlipOutcome;
use crate::input::ConcolicInput;
use log::debug;

#[derive(Debug, Default)]
pub struct GenerationalScheduler {
    worklist: Vec<ConcolicInput>,
    stale_discarded: u64,
    duplicates_dropped: u64,
}

impl GenerationalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn rescore(&mut self, engine: &Engine) {
        let tracker = &engine.tracker;
        self.worklist = std::mem::take(&mut self.worklist)
            .into_iter()
            .map(|input| match input.executed_path().map(|p| tracker.score(p)) {
                Some(score) => input.rescored(score),
                None => input,
            })
            .collect();
    }

    /// Index of the record maximizing `(score, bound)`.
    fn select(&self) -> Option<usize> {
        self.worklist
            .iter()
            .enumerate()
            .max_by_key(|(_, input)| input.priority())
            .map(|(i, _)| i)
    }

    fn expand(
        &mut self,
        input: &ConcolicInput,
        engine: &mut Engine,
    ) -> Result<Vec<ConcolicInput>, ExploreError> {
        let Some(path) = input.executed_path() else {
            return Ok(Vec::new());
        };
        let count = path.constraints().len();

        let mut children = Vec::new();
        for index in input.bound()..count {
            if engine.interrupted() {
                debug!("Shutdown requested, stopping expansion at index {}", index);
                break;
            }
            match engine.flip(input, index)? {
                FlipOutcome::Child(child) if child.is_new_path() => children.push(*child),
                FlipOutcome::Child(_) => self.duplicates_dropped += 1,
                FlipOutcome::Unsatisfiable | FlipOutcome::Unknown => {}
            }
        }
        debug!(
            "Expanded record (bound {}, {} constraints): {} new children",
            input.bound(),
            count,
            children.len()
        );
        Ok(children)
    }
}

impl Scheduler for GenerationalScheduler {
    fn name(&self) -> &'static str {
        "generational"
    }

    fn seed(&mut self, root: ConcolicInput) {
        self.worklist.push(root);
    }

    fn round(&mut self, engine: &mut Engine) -> Result<RoundOutcome, ExploreError> {
        if engine.error_goal_met() {
            return Ok(RoundOutcome::ErrorReached);
        }
        if engine.criterion() == CoverageCriterion::Branch {
            self.rescore(engine);
        }

        loop {
            let Some(best) = self.select() else {
                return Ok(RoundOutcome::Exhausted);
            };
            let input = self.worklist.swap_remove(best);

            let visited = input
                .executed_path()
                .map(|path| engine.tracker.is_visited(path));
            let input = match visited {
                Some(true) => {
                    self.stale_discarded += 1;
                    debug!("Discarding stale record (bound {})", input.bound());
                    continue;
                }
                Some(false) => input,
                None => engine.execute_initial(input)?,
            };

            engine.accept(&input);
            if engine.error_goal_met() {
                return Ok(RoundOutcome::Continue);
            }

            let children = self.expand(&input, engine)?;
            self.worklist.extend(children);
            return Ok(RoundOutcome::Continue);
        }
    }

    fn pending(&self) -> usize {
        self.worklist.len()
    }

    fn clear(&mut self) {
        self.worklist.clear();
    }

    fn stale_discarded(&self) -> u64 {
        self.stale_discarded
    }

    fn duplicates_dropped(&self) -> u64 {
        self.duplicates_dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::testing;

    fn run_to_end(scheduler: &mut GenerationalScheduler, engine: &mut Engine) -> (RoundOutcome, usize) {
        scheduler.seed(ConcolicInput::initial());
        let mut rounds = 0;
        loop {
            rounds += 1;
            let outcome = scheduler.round(engine).unwrap();
            if outcome != RoundOutcome::Continue {
                return (outcome, rounds);
            }
            assert!(rounds < 100, "exploration did not terminate");
        }
    }

    #[test]
    fn test_single_branch_two_tests() {
        let (mut engine, exporter) =
            testing::engine(testing::single_branch(), CoverageCriterion::Branch);
        let mut scheduler = GenerationalScheduler::new();
        let (outcome, _) = run_to_end(&mut scheduler, &mut engine);

        assert_eq!(outcome, RoundOutcome::Exhausted);
        assert_eq!(engine.tracker.visited_edge_count(), 2);
        assert_eq!(exporter.len(), 2);
        assert_eq!(scheduler.pending(), 0);
        // the child's flip recreates the root path
        assert_eq!(scheduler.duplicates_dropped(), 1);
    }

    #[test]
    fn test_all_paths_of_independent_branches() {
        let (mut engine, exporter) =
            testing::engine(testing::three_branches(), CoverageCriterion::Branch);
        let mut scheduler = GenerationalScheduler::new();
        let (outcome, _) = run_to_end(&mut scheduler, &mut engine);

        assert_eq!(outcome, RoundOutcome::Exhausted);
        assert_eq!(engine.tracker.visited_edge_count(), 6);
        assert_eq!(engine.tracker.visited_path_count(), 8);
        assert_eq!(exporter.len(), 8);
    }

    #[test]
    fn test_error_stops_next_round() {
        let (mut engine, _exporter) =
            testing::engine(testing::error_at_42(), CoverageCriterion::Error);
        let mut scheduler = GenerationalScheduler::new();
        scheduler.seed(ConcolicInput::initial());

        // root: x = 0, error not reached; child x = 42 queued
        assert_eq!(scheduler.round(&mut engine).unwrap(), RoundOutcome::Continue);
        assert!(!engine.tracker.error_reached());
        assert_eq!(scheduler.pending(), 1);

        // child accepted, error edge covered, not expanded
        assert_eq!(scheduler.round(&mut engine).unwrap(), RoundOutcome::Continue);
        assert!(engine.tracker.error_reached());

        assert_eq!(scheduler.round(&mut engine).unwrap(), RoundOutcome::ErrorReached);
    }

    #[test]
    fn test_selection_prefers_score_then_bound() {
        let (mut engine, _exporter) =
            testing::engine(testing::three_branches(), CoverageCriterion::Branch);
        let mut scheduler = GenerationalScheduler::new();
        scheduler.seed(ConcolicInput::initial());
        scheduler.round(&mut engine).unwrap();

        // root covered three false edges; each child adds one new edge,
        // so the tie is broken by the deepest bound
        assert_eq!(scheduler.pending(), 3);
        scheduler.rescore(&engine);
        let best = scheduler.select().unwrap();
        assert_eq!(scheduler.worklist[best].bound(), 2);
        assert_eq!(scheduler.worklist[best].score(), 1);
    }

    #[test]
    fn test_visited_record_is_not_expanded() {
        let (mut engine, exporter) =
            testing::engine(testing::single_branch(), CoverageCriterion::Branch);
        let root = engine.execute_initial(ConcolicInput::initial()).unwrap();
        engine.accept(&root);

        let mut scheduler = GenerationalScheduler::new();
        scheduler.seed(root);
        assert_eq!(scheduler.round(&mut engine).unwrap(), RoundOutcome::Exhausted);
        assert_eq!(scheduler.stale_discarded(), 1);
        assert_eq!(exporter.len(), 1);
    }
}
