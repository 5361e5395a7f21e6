//! Z3 backend.
//!
//! Terms are integers with exact arithmetic, the same semantics as
//! [`Term::eval`], so they are encoded in Z3's integer theory. Every symbol
//! is bounded to the range of its sort. Nonlinear queries are decided by
//! Z3's NIA tactics; a timeout is [`SolverError::Incomplete`].
//!
//! Only available when compiled with `--features z3`.

use crate::constraint::{ConstraintSet, SolverModel};
use crate::solver::{Solver, SolverError, SolverVerdict};
use crate::term::{CmpOp, Predicate, Term};
use log::debug;
use std::collections::BTreeMap;
use z3::ast::{Ast, Bool, Int};
use z3::{Config, Context, Model, SatResult};

/// Default per-query timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Solver backed by Z3. A fresh context is created per query.
#[derive(Debug, Clone)]
pub struct Z3Solver {
    timeout_ms: u64,
    queries: u64,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT_MS)
    }

    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            queries: 0,
        }
    }

    pub fn queries(&self) -> u64 {
        self.queries
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_const<'ctx>(ctx: &'ctx Context, value: i128) -> Result<Int<'ctx>, SolverError> {
    Int::from_str(ctx, &value.to_string())
        .ok_or_else(|| SolverError::Backend(format!("cannot encode constant {}", value)))
}

struct Encoder<'ctx> {
    ctx: &'ctx Context,
    vars: BTreeMap<String, Int<'ctx>>,
}

impl<'ctx> Encoder<'ctx> {
    fn term(&self, term: &Term) -> Result<Int<'ctx>, SolverError> {
        Ok(match term {
            Term::Const(c) => encode_const(self.ctx, *c)?,
            Term::Symbol(name) => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| SolverError::Backend(format!("undeclared symbol {}", name)))?,
            Term::Add(a, b) => Int::add(self.ctx, &[&self.term(a)?, &self.term(b)?]),
            Term::Sub(a, b) => Int::sub(self.ctx, &[&self.term(a)?, &self.term(b)?]),
            Term::Mul(a, b) => Int::mul(self.ctx, &[&self.term(a)?, &self.term(b)?]),
            Term::Neg(a) => self.term(a)?.unary_minus(),
        })
    }

    fn predicate(&self, pred: &Predicate) -> Result<Bool<'ctx>, SolverError> {
        Ok(match pred {
            Predicate::True => Bool::from_bool(self.ctx, true),
            Predicate::False => Bool::from_bool(self.ctx, false),
            Predicate::Cmp { op, lhs, rhs } => {
                let (l, r) = (self.term(lhs)?, self.term(rhs)?);
                match op {
                    CmpOp::Eq => l._eq(&r),
                    CmpOp::Ne => l._eq(&r).not(),
                    CmpOp::Lt => l.lt(&r),
                    CmpOp::Le => l.le(&r),
                    CmpOp::Gt => l.gt(&r),
                    CmpOp::Ge => l.ge(&r),
                }
            }
            Predicate::Not(p) => self.predicate(p)?.not(),
            Predicate::And(a, b) => Bool::and(self.ctx, &[&self.predicate(a)?, &self.predicate(b)?]),
            Predicate::Or(a, b) => Bool::or(self.ctx, &[&self.predicate(a)?, &self.predicate(b)?]),
        })
    }
}

fn model_value<'ctx>(model: &Model<'ctx>, var: &Int<'ctx>) -> Option<i128> {
    let value = model.eval(var, true)?;
    value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
}

impl Solver for Z3Solver {
    fn check_unsat(
        &mut self,
        constraints: &ConstraintSet,
        scope: &str,
    ) -> Result<SolverVerdict, SolverError> {
        self.queries += 1;

        let mut cfg = Config::new();
        cfg.set_timeout_msec(self.timeout_ms);
        let ctx = Context::new(&cfg);
        let solver = z3::Solver::new(&ctx);

        let mut encoder = Encoder {
            ctx: &ctx,
            vars: BTreeMap::new(),
        };
        for name in constraints.used_symbols() {
            let ty = constraints.sort_of(&name);
            let var = Int::new_const(&ctx, name.as_str());
            solver.assert(&var.ge(&encode_const(&ctx, ty.min_value())?));
            solver.assert(&var.le(&encode_const(&ctx, ty.max_value())?));
            encoder.vars.insert(name, var);
        }
        for pred in &constraints.constraints {
            solver.assert(&encoder.predicate(pred)?);
        }

        let result = solver.check();
        debug!(
            "[{}] z3: {} constraints over {} symbols: {:?}",
            scope,
            constraints.len(),
            encoder.vars.len(),
            result
        );

        match result {
            SatResult::Unsat => Ok(SolverVerdict::Unsat),
            SatResult::Unknown => Err(SolverError::Incomplete(
                solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "unknown".to_string()),
            )),
            SatResult::Sat => {
                let model = solver
                    .get_model()
                    .ok_or_else(|| SolverError::Backend("sat without a model".to_string()))?;
                let mut out = SolverModel::new();
                for (name, var) in &encoder.vars {
                    let value = model_value(&model, var).ok_or_else(|| {
                        SolverError::Backend(format!("no model value for {}", name))
                    })?;
                    out.insert(name.clone(), constraints.sort_of(name).encode(value));
                }
                Ok(SolverVerdict::Sat(out))
            }
        }
    }
}
