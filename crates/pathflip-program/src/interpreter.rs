//! Reference interpreters: symbolic path collection and concrete replay.
//!
//! Both follow the single path chosen by the nondet values in the
//! [`NondetContext`]. The symbolic interpreter additionally tracks, for
//! every variable that depends on nondet input, a [`Term`] over the input
//! symbols, and records one predicate per assume edge whose condition
//! depends on those symbols.
//!
//! Division and remainder with symbolic operands are concretized to the
//! value the path observed. So are values that wrap on assignment.

use crate::algorithm::{AlgorithmStatus, ExecError, ExecutionAlgorithm};
use crate::frontier::Frontier;
use crate::nondet::NondetContext;
use crate::program::{BinOp, EdgeId, EdgeKind, Expr, NodeId, Program, ProgramError, UnaryOp};
use crate::shutdown::ShutdownNotifier;
use crate::state::{ExecState, SymbolInfo};
use log::trace;
use pathflip_solver::{CmpOp, Predicate, Term};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Default step limit per run.
pub const DEFAULT_MAX_STEPS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Symbolic,
    Concrete,
}

/// Symbolic view of an expression value.
#[derive(Debug, Clone)]
enum Sym {
    Int(Term),
    Bool(Predicate),
}

#[derive(Debug, Clone)]
struct Evaluated {
    value: i128,
    sym: Option<Sym>,
}

impl Evaluated {
    fn concrete(value: i128) -> Self {
        Self { value, sym: None }
    }

    fn term(&self) -> Term {
        match &self.sym {
            Some(Sym::Int(t)) => t.clone(),
            _ => Term::Const(self.value),
        }
    }

    fn predicate(&self) -> Predicate {
        match &self.sym {
            Some(Sym::Bool(p)) => p.clone(),
            Some(Sym::Int(t)) => Predicate::cmp(CmpOp::Ne, t.clone(), Term::Const(0)),
            None if self.value != 0 => Predicate::True,
            None => Predicate::False,
        }
    }

    fn is_symbolic(&self) -> bool {
        match &self.sym {
            Some(Sym::Int(t)) => t.is_symbolic(),
            Some(Sym::Bool(p)) => p.is_symbolic(),
            None => false,
        }
    }
}

enum Step {
    /// Moved over `edge`; `terminal` ends the path.
    Moved {
        edge: EdgeId,
        state: ExecState,
        terminal: bool,
    },
    /// Program exit or no feasible successor.
    Halted,
}

/// Shared single-path interpreter.
struct Interpreter {
    program: Arc<Program>,
    mode: Mode,
    entry: NodeId,
    max_steps: usize,
    notifier: ShutdownNotifier,
}

impl Interpreter {
    fn new(
        program: Arc<Program>,
        mode: Mode,
        max_steps: usize,
        notifier: ShutdownNotifier,
    ) -> Result<Self, ProgramError> {
        let entry = program
            .entry_node()
            .ok_or_else(|| ProgramError::MissingEntry("main".to_string()))?;
        Ok(Self {
            program,
            mode,
            entry,
            max_steps,
            notifier,
        })
    }

    fn initial_state(&self) -> ExecState {
        let values = self
            .program
            .variables()
            .iter()
            .map(|(name, var)| (name.clone(), var.ty.wrap(var.init as i128)))
            .collect();
        match self.mode {
            Mode::Symbolic => ExecState::symbolic(self.entry, values),
            Mode::Concrete => ExecState::concrete(self.entry, values),
        }
    }

    fn run(
        &self,
        frontier: &mut Frontier,
        ctx: &mut NondetContext,
    ) -> Result<AlgorithmStatus, ExecError> {
        if self.mode == Mode::Symbolic && frontier.last().symbolic.is_none() {
            return Err(ExecError::UnexpectedState(
                "symbolic run started from a state without a symbolic component".to_string(),
            ));
        }

        let mut steps = 0;
        loop {
            self.notifier.check().map_err(ExecError::Interrupted)?;
            if steps >= self.max_steps {
                trace!("step limit {} reached", self.max_steps);
                return Ok(AlgorithmStatus::NoPropertyChecked);
            }

            match self.step(frontier.last(), ctx)? {
                Step::Moved {
                    edge,
                    state,
                    terminal,
                } => {
                    frontier.push(edge, state);
                    if terminal {
                        return Ok(AlgorithmStatus::SoundAndPrecise);
                    }
                }
                Step::Halted => return Ok(AlgorithmStatus::SoundAndPrecise),
            }
            steps += 1;
        }
    }

    fn step(&self, state: &ExecState, ctx: &mut NondetContext) -> Result<Step, ExecError> {
        let Some((location, call_stack)) = self.normalize_location(state) else {
            return Ok(Step::Halted);
        };

        let outgoing = self.program.outgoing(location);
        let mut next = state.clone();
        next.call_stack = call_stack;

        for &edge_id in outgoing {
            let edge = self
                .program
                .edge(edge_id)
                .ok_or(ExecError::UnknownEdge(edge_id))?;

            match &edge.kind {
                EdgeKind::Assume { condition, truth } => {
                    let Some(cond) = self.eval(condition, &next, location)? else {
                        return Ok(Step::Halted);
                    };
                    if (cond.value != 0) != *truth {
                        continue;
                    }
                    if let Some(sym) = next.symbolic.as_mut() {
                        if cond.is_symbolic() {
                            let predicate = if *truth {
                                cond.predicate()
                            } else {
                                cond.predicate().negate()
                            };
                            sym.constraints.push_constraint(predicate);
                        }
                    }
                    next.location = edge.to;
                    return Ok(Step::Moved {
                        edge: edge_id,
                        state: next,
                        terminal: false,
                    });
                }
                EdgeKind::Assign { target, value } => {
                    let Some(evaluated) = self.eval(value, &next, location)? else {
                        return Ok(Step::Halted);
                    };
                    self.assign(&mut next, target, evaluated);
                }
                EdgeKind::Nondet {
                    target,
                    ty,
                    location: site,
                } => {
                    let (value, occurrence) = ctx.next_value(site, *ty);
                    let var_ty = self.program.variable_type(target);
                    let stored = var_ty.wrap(value.0);
                    next.values.insert(target.clone(), stored);
                    if let Some(sym) = next.symbolic.as_mut() {
                        let name = format!("{}@{}#{}", target, site, occurrence);
                        let info = SymbolInfo {
                            location: site.clone(),
                            occurrence,
                            ty: *ty,
                        };
                        sym.constraints.declare_symbol(name.clone(), info, value.0);
                        if stored == value.0 {
                            sym.store.insert(target.clone(), Term::Symbol(name));
                        } else {
                            sym.store.remove(target);
                        }
                    }
                }
                EdgeKind::Call { callee } => {
                    if callee == self.program.error_function() {
                        next.location = edge.to;
                        return Ok(Step::Moved {
                            edge: edge_id,
                            state: next,
                            terminal: true,
                        });
                    }
                    if let Some(function) = self.program.function(callee) {
                        next.call_stack.push(edge.to);
                        next.location = function.entry;
                        return Ok(Step::Moved {
                            edge: edge_id,
                            state: next,
                            terminal: false,
                        });
                    }
                }
                EdgeKind::Skip => {}
            }

            next.location = edge.to;
            return Ok(Step::Moved {
                edge: edge_id,
                state: next,
                terminal: false,
            });
        }

        // Assume node with no satisfied outcome.
        Ok(Step::Halted)
    }

    /// Pop finished calls. `None` once the entry function has returned.
    fn normalize_location(&self, state: &ExecState) -> Option<(NodeId, Vec<NodeId>)> {
        let mut location = state.location;
        let mut stack = state.call_stack.clone();
        while self.program.outgoing(location).is_empty() {
            location = stack.pop()?;
        }
        Some((location, stack))
    }

    fn assign(&self, state: &mut ExecState, target: &str, evaluated: Evaluated) {
        let ty = self.program.variable_type(target);
        let wrapped = ty.wrap(evaluated.value);
        state.values.insert(target.to_string(), wrapped);

        if let Some(sym) = state.symbolic.as_mut() {
            let keep = wrapped == evaluated.value
                && matches!(&evaluated.sym, Some(Sym::Int(t)) if t.is_symbolic());
            if keep {
                sym.store.insert(target.to_string(), evaluated.term());
            } else {
                sym.store.remove(target);
            }
        }
    }

    /// Evaluate `expr`. `None` means the path is blocked (division by zero).
    fn eval(
        &self,
        expr: &Expr,
        state: &ExecState,
        node: NodeId,
    ) -> Result<Option<Evaluated>, ExecError> {
        let result = match expr {
            Expr::Const(c) => Evaluated::concrete(*c as i128),
            Expr::Var(name) => {
                let value = state.values.get(name).copied().ok_or_else(|| {
                    ExecError::UnknownVariable {
                        name: name.clone(),
                        node,
                    }
                })?;
                let sym = state
                    .symbolic
                    .as_ref()
                    .and_then(|s| s.store.get(name))
                    .map(|t| Sym::Int(t.clone()));
                Evaluated { value, sym }
            }
            Expr::Unary { op, operand } => {
                let Some(a) = self.eval(operand, state, node)? else {
                    return Ok(None);
                };
                match op {
                    UnaryOp::Neg => Evaluated {
                        value: a.value.wrapping_neg(),
                        sym: a.sym.as_ref().map(|_| Sym::Int(Term::Neg(Box::new(a.term())))),
                    },
                    UnaryOp::Not => Evaluated {
                        value: (a.value == 0) as i128,
                        sym: a.sym.as_ref().map(|_| Sym::Bool(a.predicate().negate())),
                    },
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let Some(a) = self.eval(lhs, state, node)? else {
                    return Ok(None);
                };
                let Some(b) = self.eval(rhs, state, node)? else {
                    return Ok(None);
                };
                match Self::binary(*op, &a, &b) {
                    Some(evaluated) => evaluated,
                    None => return Ok(None),
                }
            }
        };
        Ok(Some(result))
    }

    fn binary(op: BinOp, a: &Evaluated, b: &Evaluated) -> Option<Evaluated> {
        let symbolic = a.sym.is_some() || b.sym.is_some();
        let arith = |value: i128, term: fn(Box<Term>, Box<Term>) -> Term| Evaluated {
            value,
            sym: symbolic.then(|| Sym::Int(term(Box::new(a.term()), Box::new(b.term())))),
        };
        let compare = |cmp: CmpOp| Evaluated {
            value: cmp.apply(a.value, b.value) as i128,
            sym: symbolic.then(|| Sym::Bool(Predicate::cmp(cmp, a.term(), b.term()))),
        };

        let result = match op {
            BinOp::Add => arith(a.value.wrapping_add(b.value), Term::Add),
            BinOp::Sub => arith(a.value.wrapping_sub(b.value), Term::Sub),
            BinOp::Mul => arith(a.value.wrapping_mul(b.value), Term::Mul),
            BinOp::Div => Evaluated::concrete(a.value.checked_div(b.value)?),
            BinOp::Rem => Evaluated::concrete(a.value.checked_rem(b.value)?),
            BinOp::Eq => compare(CmpOp::Eq),
            BinOp::Ne => compare(CmpOp::Ne),
            BinOp::Lt => compare(CmpOp::Lt),
            BinOp::Le => compare(CmpOp::Le),
            BinOp::Gt => compare(CmpOp::Gt),
            BinOp::Ge => compare(CmpOp::Ge),
            BinOp::And => Evaluated {
                value: (a.value != 0 && b.value != 0) as i128,
                sym: symbolic.then(|| {
                    Sym::Bool(Predicate::And(
                        Box::new(a.predicate()),
                        Box::new(b.predicate()),
                    ))
                }),
            },
            BinOp::Or => Evaluated {
                value: (a.value != 0 || b.value != 0) as i128,
                sym: symbolic.then(|| {
                    Sym::Bool(Predicate::Or(
                        Box::new(a.predicate()),
                        Box::new(b.predicate()),
                    ))
                }),
            },
        };
        Some(result)
    }
}

/// Collects path constraints along the path the context selects.
pub struct SymbolicExecutor {
    inner: Interpreter,
}

impl SymbolicExecutor {
    pub fn new(
        program: Arc<Program>,
        max_steps: usize,
        notifier: ShutdownNotifier,
    ) -> Result<Self, ProgramError> {
        Ok(Self {
            inner: Interpreter::new(program, Mode::Symbolic, max_steps, notifier)?,
        })
    }
}

impl ExecutionAlgorithm for SymbolicExecutor {
    fn initial_state(&self) -> ExecState {
        self.inner.initial_state()
    }

    fn run(
        &mut self,
        frontier: &mut Frontier,
        ctx: &mut NondetContext,
    ) -> Result<AlgorithmStatus, ExecError> {
        self.inner.run(frontier, ctx)
    }
}

/// Concrete-only replay over reduced states.
pub struct ConcreteExecutor {
    inner: Interpreter,
}

impl ConcreteExecutor {
    pub fn new(
        program: Arc<Program>,
        max_steps: usize,
        notifier: ShutdownNotifier,
    ) -> Result<Self, ProgramError> {
        Ok(Self {
            inner: Interpreter::new(program, Mode::Concrete, max_steps, notifier)?,
        })
    }
}

impl ExecutionAlgorithm for ConcreteExecutor {
    fn initial_state(&self) -> ExecState {
        self.inner.initial_state()
    }

    fn run(
        &mut self,
        frontier: &mut Frontier,
        ctx: &mut NondetContext,
    ) -> Result<AlgorithmStatus, ExecError> {
        self.inner.run(frontier, ctx)
    }
}

/// Concrete values of every variable at the end of a run.
pub fn final_values(frontier: &Frontier) -> &BTreeMap<String, i128> {
    &frontier.last().values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::NondetLocation;
    use crate::nondet::{Value, ValuesMap};
    use crate::program::ProgramBuilder;
    use crate::shutdown::ShutdownReason;
    use pathflip_solver::IntType;

    fn site() -> NondetLocation {
        NondetLocation::new("a.c", 3, 11, 26)
    }

    /// `x = nondet(); if (x > 0) {} else {}`
    fn positive() -> Arc<Program> {
        let cond = Expr::binary(BinOp::Gt, Expr::var("x"), Expr::int(0));
        Arc::new(
            ProgramBuilder::new("positive")
                .variable("x", IntType::INT)
                .function("main", 0)
                .nondet(0, 1, "x", IntType::INT, site())
                .branch(1, cond, 2, 3)
                .build()
                .unwrap(),
        )
    }

    fn run_symbolic(program: Arc<Program>, values: ValuesMap) -> (Frontier, AlgorithmStatus) {
        let mut exec = SymbolicExecutor::new(program, 100, ShutdownNotifier::new()).unwrap();
        let mut frontier = Frontier::new(exec.initial_state());
        let mut ctx = NondetContext::seeded(values);
        let status = exec.run(&mut frontier, &mut ctx).unwrap();
        (frontier, status)
    }

    #[test]
    fn test_default_input_takes_else_branch() {
        let (frontier, status) = run_symbolic(positive(), ValuesMap::new());
        assert_eq!(status, AlgorithmStatus::SoundAndPrecise);
        assert_eq!(frontier.edges(), &[EdgeId(0), EdgeId(2)]);

        let constraints = frontier.last().constraint_state().unwrap();
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints.constraints()[0].to_string(), "x@a.c:3:11-26#0 <= 0");
    }

    #[test]
    fn test_seeded_input_takes_then_branch() {
        let mut values = ValuesMap::new();
        values.insert(site(), vec![Value(5)]);
        let (frontier, _) = run_symbolic(positive(), values);
        assert_eq!(frontier.edges(), &[EdgeId(0), EdgeId(1)]);

        let constraints = frontier.last().constraint_state().unwrap();
        assert_eq!(constraints.constraints()[0].to_string(), "x@a.c:3:11-26#0 > 0");
        let info = constraints.symbol("x@a.c:3:11-26#0").unwrap();
        assert_eq!(info.location, site());
        assert_eq!(info.occurrence, 0);
    }

    #[test]
    fn test_error_call_ends_path() {
        let cond = Expr::binary(BinOp::Eq, Expr::var("x"), Expr::int(42));
        let program = Arc::new(
            ProgramBuilder::new("err")
                .variable("x", IntType::INT)
                .function("main", 0)
                .nondet(0, 1, "x", IntType::INT, site())
                .branch(1, cond, 2, 4)
                .call(2, 3, "reach_error")
                .edge(3, 4, EdgeKind::Skip)
                .build()
                .unwrap(),
        );
        let mut values = ValuesMap::new();
        values.insert(site(), vec![Value(42)]);
        let (frontier, status) = run_symbolic(program.clone(), values);
        assert_eq!(status, AlgorithmStatus::SoundAndPrecise);
        let last = *frontier.edges().last().unwrap();
        assert!(program.is_error_call(last));
        assert_eq!(frontier.edges().len(), 3);
    }

    #[test]
    fn test_function_call_and_return() {
        // main: 0 -call f-> 1 -assume y>0-> 2 | 3 ; f: 10 -y = x + 1-> 11
        let cond = Expr::binary(BinOp::Gt, Expr::var("y"), Expr::int(0));
        let program = Arc::new(
            ProgramBuilder::new("calls")
                .variable("x", IntType::INT)
                .variable("y", IntType::INT)
                .function("main", 0)
                .function("f", 10)
                .nondet(20, 0, "x", IntType::INT, site())
                .entry("main")
                .call(0, 1, "f")
                .branch(1, cond, 2, 3)
                .assign(
                    10,
                    11,
                    "y",
                    Expr::binary(BinOp::Add, Expr::var("x"), Expr::int(1)),
                )
                .build()
                .unwrap(),
        );
        let (frontier, _) = run_symbolic(program, ValuesMap::new());
        // call, assign inside f, then the branch after returning
        assert_eq!(frontier.edges().len(), 3);
        assert_eq!(frontier.last().location, NodeId(2));
        assert!(frontier.last().call_stack.is_empty());
    }

    #[test]
    fn test_external_call_is_noop() {
        let program = Arc::new(
            ProgramBuilder::new("ext")
                .function("main", 0)
                .call(0, 1, "printf")
                .build()
                .unwrap(),
        );
        let (frontier, status) = run_symbolic(program, ValuesMap::new());
        assert_eq!(status, AlgorithmStatus::SoundAndPrecise);
        assert_eq!(frontier.last().location, NodeId(1));
    }

    #[test]
    fn test_step_limit_reports_no_property_checked() {
        // while (1) {}
        let program = Arc::new(
            ProgramBuilder::new("spin")
                .function("main", 0)
                .edge(0, 1, EdgeKind::Skip)
                .edge(1, 0, EdgeKind::Skip)
                .build()
                .unwrap(),
        );
        let mut exec = SymbolicExecutor::new(program, 10, ShutdownNotifier::new()).unwrap();
        let mut frontier = Frontier::new(exec.initial_state());
        let status = exec
            .run(&mut frontier, &mut NondetContext::new())
            .unwrap();
        assert_eq!(status, AlgorithmStatus::NoPropertyChecked);
        assert_eq!(frontier.edges().len(), 10);
    }

    #[test]
    fn test_shutdown_interrupts_run() {
        let notifier = ShutdownNotifier::new();
        notifier.request(ShutdownReason::CpuTimeLimit);
        let mut exec = ConcreteExecutor::new(positive(), 100, notifier).unwrap();
        let mut frontier = Frontier::new(exec.initial_state());
        let err = exec
            .run(&mut frontier, &mut NondetContext::new())
            .unwrap_err();
        assert_eq!(err, ExecError::Interrupted(ShutdownReason::CpuTimeLimit));
    }

    #[test]
    fn test_concrete_replay_uses_reduced_state() {
        let mut exec = ConcreteExecutor::new(positive(), 100, ShutdownNotifier::new()).unwrap();
        let mut frontier = Frontier::new(exec.initial_state());
        let mut values = ValuesMap::new();
        values.insert(site(), vec![Value(9)]);
        let mut ctx = NondetContext::seeded(values);
        exec.run(&mut frontier, &mut ctx).unwrap();

        assert!(frontier.states().iter().all(|s| s.symbolic.is_none()));
        assert_eq!(final_values(&frontier).get("x"), Some(&9));
        assert_eq!(ctx.returned_value_history(), vec![Value(9)]);
    }

    #[test]
    fn test_symbolic_run_rejects_reduced_root() {
        let mut exec = SymbolicExecutor::new(positive(), 100, ShutdownNotifier::new()).unwrap();
        let mut frontier = Frontier::new(ExecState::concrete(NodeId(0), BTreeMap::new()));
        let err = exec
            .run(&mut frontier, &mut NondetContext::new())
            .unwrap_err();
        assert!(matches!(err, ExecError::UnexpectedState(_)));
    }

    #[test]
    fn test_division_by_symbolic_value_is_concretized() {
        // x = nondet(); y = 100 / x;  (x == 0 blocks)
        let program = Arc::new(
            ProgramBuilder::new("div")
                .variable("x", IntType::INT)
                .variable("y", IntType::INT)
                .function("main", 0)
                .nondet(0, 1, "x", IntType::INT, site())
                .assign(
                    1,
                    2,
                    "y",
                    Expr::binary(BinOp::Div, Expr::int(100), Expr::var("x")),
                )
                .build()
                .unwrap(),
        );
        let (blocked, status) = run_symbolic(program.clone(), ValuesMap::new());
        assert_eq!(status, AlgorithmStatus::SoundAndPrecise);
        assert_eq!(blocked.edges().len(), 1);

        let mut values = ValuesMap::new();
        values.insert(site(), vec![Value(7)]);
        let (frontier, _) = run_symbolic(program, values);
        assert_eq!(frontier.last().values.get("y"), Some(&14));
        let sym = frontier.last().symbolic.as_ref().unwrap();
        assert!(!sym.store.contains_key("y"));
    }

    #[test]
    fn test_assignment_wraps_to_type() {
        let program = Arc::new(
            ProgramBuilder::new("wrap")
                .variable("c", IntType::CHAR)
                .function("main", 0)
                .assign(0, 1, "c", Expr::int(200))
                .build()
                .unwrap(),
        );
        let (frontier, _) = run_symbolic(program, ValuesMap::new());
        assert_eq!(frontier.last().values.get("c"), Some(&-56));
    }

    #[test]
    fn test_loop_symbols_are_numbered_by_occurrence() {
        // 0: i = 0; 1: i < 2 ? 2 : 4; 2: x = nondet(); 3: i = i + 1 -> 1
        let program = Arc::new(
            ProgramBuilder::new("loop")
                .variable("i", IntType::INT)
                .variable("x", IntType::INT)
                .function("main", 0)
                .assign(0, 1, "i", Expr::int(0))
                .branch(
                    1,
                    Expr::binary(BinOp::Lt, Expr::var("i"), Expr::int(2)),
                    2,
                    4,
                )
                .nondet(2, 3, "x", IntType::INT, site())
                .assign(
                    3,
                    1,
                    "i",
                    Expr::binary(BinOp::Add, Expr::var("i"), Expr::int(1)),
                )
                .build()
                .unwrap(),
        );
        let (frontier, _) = run_symbolic(program, ValuesMap::new());
        let constraints = frontier.last().constraint_state().unwrap();
        // loop condition is concrete, nothing recorded
        assert!(constraints.is_empty());
        assert!(constraints.symbol("x@a.c:3:11-26#0").is_some());
        assert!(constraints.symbol("x@a.c:3:11-26#1").is_some());
    }
}
