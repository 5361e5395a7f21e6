//! Program representation: nodes, edges and nondet call sites.
//!
//! A program is a control-flow graph over integer variables. Nodes are
//! implicit: they are the numbers that edges and function entries mention.
//! A node has either exactly one non-assume outgoing edge, any number of
//! assume edges (one per branch outcome), or none (function exit).
//!
//! Programs are usually loaded from JSON:
//!
//! ```json
//! {
//!   "name": "positive",
//!   "variables": { "x": { "ty": { "bits": 32, "signed": true } } },
//!   "functions": { "main": { "entry": 0 } },
//!   "edges": [
//!     { "from": 0, "to": 1, "kind": { "nondet": { "target": "x",
//!       "ty": { "bits": 32, "signed": true },
//!       "location": { "file_name": "a.c", "line": 3, "start_column": 11, "end_column": 26 } } } },
//!     { "from": 1, "to": 2, "kind": { "assume": { "condition":
//!       { "binary": { "op": "gt", "lhs": { "var": "x" }, "rhs": { "const": 0 } } }, "truth": true } } },
//!     { "from": 1, "to": 3, "kind": { "assume": { "condition":
//!       { "binary": { "op": "gt", "lhs": { "var": "x" }, "rhs": { "const": 0 } } }, "truth": false } } }
//!   ]
//! }
//! ```

use crate::location::NondetLocation;
use pathflip_solver::IntType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Name of the function whose call marks an error location.
pub const DEFAULT_ERROR_FUNCTION: &str = "reach_error";

/// Errors from loading or validating a program.
#[derive(Error, Debug)]
pub enum ProgramError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("entry function `{0}` is not defined")]
    MissingEntry(String),

    #[error("variable `{name}` used by edge {edge} is not declared")]
    UnknownVariable { name: String, edge: EdgeId },

    #[error("node {0} mixes assume edges with other edges")]
    MixedBranching(NodeId),

    #[error("node {0} has more than one non-assume outgoing edge")]
    Nondeterministic(NodeId),
}

/// Control-flow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Control-flow edge; the index into [`Program::edges`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u32);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Integer expression with C-like truth values (non-zero is true).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Const(i64),
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Const(value)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Every variable read by this expression.
    pub fn variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Unary { operand, .. } => operand.variables(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.variables(out);
                rhs.variables(out);
            }
        }
    }
}

/// What executing an edge does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Branch outcome: taken iff `condition` evaluates to `truth`.
    Assume { condition: Expr, truth: bool },
    Assign { target: String, value: Expr },
    /// `target = __VERIFIER_nondet_<ty>()` at `location`.
    Nondet {
        target: String,
        ty: IntType,
        location: NondetLocation,
    },
    /// Call a program function, the error function, or an external no-op.
    Call { callee: String },
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(skip)]
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

impl Default for EdgeId {
    fn default() -> Self {
        EdgeId(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default)]
    pub ty: IntType,
    #[serde(default)]
    pub init: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub entry: NodeId,
}

fn default_entry() -> String {
    "main".to_string()
}

fn default_error_function() -> String {
    DEFAULT_ERROR_FUNCTION.to_string()
}

/// Serialized form of a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawProgram {
    name: String,
    #[serde(default = "default_entry")]
    entry: String,
    #[serde(default = "default_error_function")]
    error_function: String,
    #[serde(default)]
    variables: BTreeMap<String, Variable>,
    functions: BTreeMap<String, Function>,
    edges: Vec<Edge>,
}

/// A validated, indexed program.
#[derive(Debug, Clone)]
pub struct Program {
    raw: RawProgram,
    outgoing: BTreeMap<NodeId, Vec<EdgeId>>,
}

impl Program {
    /// Parse and validate a program from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ProgramError> {
        let raw: RawProgram = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    /// Load and validate a program from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ProgramError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Serialize back to JSON.
    pub fn to_json(&self) -> Result<String, ProgramError> {
        Ok(serde_json::to_string_pretty(&self.raw)?)
    }

    fn from_raw(mut raw: RawProgram) -> Result<Self, ProgramError> {
        let mut outgoing: BTreeMap<NodeId, Vec<EdgeId>> = BTreeMap::new();
        for (i, edge) in raw.edges.iter_mut().enumerate() {
            edge.id = EdgeId(i as u32);
            outgoing.entry(edge.from).or_default().push(edge.id);
        }
        let program = Self { raw, outgoing };
        program.validate()?;
        Ok(program)
    }

    fn validate(&self) -> Result<(), ProgramError> {
        if !self.raw.functions.contains_key(&self.raw.entry) {
            return Err(ProgramError::MissingEntry(self.raw.entry.clone()));
        }

        for edge in &self.raw.edges {
            let mut used = BTreeSet::new();
            match &edge.kind {
                EdgeKind::Assume { condition, .. } => condition.variables(&mut used),
                EdgeKind::Assign { target, value } => {
                    used.insert(target.clone());
                    value.variables(&mut used);
                }
                EdgeKind::Nondet { target, .. } => {
                    used.insert(target.clone());
                }
                EdgeKind::Call { .. } | EdgeKind::Skip => {}
            }
            if let Some(name) = used.into_iter().find(|v| !self.raw.variables.contains_key(v)) {
                return Err(ProgramError::UnknownVariable {
                    name,
                    edge: edge.id,
                });
            }
        }

        for (node, edges) in &self.outgoing {
            let assumes = edges.iter().filter(|e| self.is_assume(**e)).count();
            if assumes > 0 && assumes < edges.len() {
                return Err(ProgramError::MixedBranching(*node));
            }
            if assumes == 0 && edges.len() > 1 {
                return Err(ProgramError::Nondeterministic(*node));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.raw.name
    }

    pub fn error_function(&self) -> &str {
        &self.raw.error_function
    }

    pub fn entry_function(&self) -> &str {
        &self.raw.entry
    }

    /// Entry node of the entry function.
    pub fn entry_node(&self) -> Option<NodeId> {
        self.raw.functions.get(&self.raw.entry).map(|f| f.entry)
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.raw.functions.get(name)
    }

    pub fn variables(&self) -> &BTreeMap<String, Variable> {
        &self.raw.variables
    }

    pub fn variable_type(&self, name: &str) -> IntType {
        self.raw
            .variables
            .get(name)
            .map(|v| v.ty)
            .unwrap_or_default()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.raw.edges
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.raw.edges.get(id.0 as usize)
    }

    pub fn outgoing(&self, node: NodeId) -> &[EdgeId] {
        self.outgoing.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the edge is a branch outcome.
    pub fn is_assume(&self, id: EdgeId) -> bool {
        matches!(
            self.edge(id).map(|e| &e.kind),
            Some(EdgeKind::Assume { .. })
        )
    }

    /// Whether the edge calls the error function.
    pub fn is_error_call(&self, id: EdgeId) -> bool {
        matches!(
            self.edge(id).map(|e| &e.kind),
            Some(EdgeKind::Call { callee }) if callee == &self.raw.error_function
        )
    }

    pub fn assume_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.raw
            .edges
            .iter()
            .map(|e| e.id)
            .filter(|id| self.is_assume(*id))
    }

    pub fn error_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.raw
            .edges
            .iter()
            .map(|e| e.id)
            .filter(|id| self.is_error_call(*id))
    }

    /// Every distinct nondet call site.
    pub fn nondet_locations(&self) -> BTreeSet<NondetLocation> {
        self.raw
            .edges
            .iter()
            .filter_map(|e| match &e.kind {
                EdgeKind::Nondet { location, .. } => Some(location.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of distinct nodes.
    pub fn node_count(&self) -> usize {
        let mut nodes: BTreeSet<NodeId> = self.raw.functions.values().map(|f| f.entry).collect();
        for e in &self.raw.edges {
            nodes.insert(e.from);
            nodes.insert(e.to);
        }
        nodes.len()
    }
}

/// Incremental construction of a [`Program`].
///
/// ```
/// use pathflip_program::program::{BinOp, Expr, ProgramBuilder};
/// use pathflip_program::NondetLocation;
/// use pathflip_solver::IntType;
///
/// let cond = Expr::binary(BinOp::Gt, Expr::var("x"), Expr::int(0));
/// let program = ProgramBuilder::new("positive")
///     .variable("x", IntType::INT)
///     .function("main", 0)
///     .nondet(0, 1, "x", IntType::INT, NondetLocation::new("a.c", 3, 11, 26))
///     .branch(1, cond, 2, 3)
///     .build()
///     .unwrap();
/// assert_eq!(program.assume_edges().count(), 2);
/// ```
pub struct ProgramBuilder {
    raw: RawProgram,
}

impl ProgramBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            raw: RawProgram {
                name: name.into(),
                entry: default_entry(),
                error_function: default_error_function(),
                variables: BTreeMap::new(),
                functions: BTreeMap::new(),
                edges: Vec::new(),
            },
        }
    }

    pub fn entry(mut self, function: impl Into<String>) -> Self {
        self.raw.entry = function.into();
        self
    }

    pub fn error_function(mut self, name: impl Into<String>) -> Self {
        self.raw.error_function = name.into();
        self
    }

    pub fn variable(mut self, name: impl Into<String>, ty: IntType) -> Self {
        self.raw
            .variables
            .insert(name.into(), Variable { ty, init: 0 });
        self
    }

    pub fn function(mut self, name: impl Into<String>, entry: u32) -> Self {
        self.raw.functions.insert(
            name.into(),
            Function {
                entry: NodeId(entry),
            },
        );
        self
    }

    pub fn edge(mut self, from: u32, to: u32, kind: EdgeKind) -> Self {
        self.raw.edges.push(Edge {
            id: EdgeId::default(),
            from: NodeId(from),
            to: NodeId(to),
            kind,
        });
        self
    }

    pub fn nondet(
        self,
        from: u32,
        to: u32,
        target: impl Into<String>,
        ty: IntType,
        location: NondetLocation,
    ) -> Self {
        self.edge(
            from,
            to,
            EdgeKind::Nondet {
                target: target.into(),
                ty,
                location,
            },
        )
    }

    pub fn assign(self, from: u32, to: u32, target: impl Into<String>, value: Expr) -> Self {
        self.edge(
            from,
            to,
            EdgeKind::Assign {
                target: target.into(),
                value,
            },
        )
    }

    /// Two assume edges: `condition` to `then_node`, its negation to `else_node`.
    pub fn branch(self, from: u32, condition: Expr, then_node: u32, else_node: u32) -> Self {
        self.edge(
            from,
            then_node,
            EdgeKind::Assume {
                condition: condition.clone(),
                truth: true,
            },
        )
        .edge(
            from,
            else_node,
            EdgeKind::Assume {
                condition,
                truth: false,
            },
        )
    }

    pub fn call(self, from: u32, to: u32, callee: impl Into<String>) -> Self {
        self.edge(
            from,
            to,
            EdgeKind::Call {
                callee: callee.into(),
            },
        )
    }

    pub fn build(self) -> Result<Program, ProgramError> {
        Program::from_raw(self.raw)
    }
}
