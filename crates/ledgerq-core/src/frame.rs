//! Result Frame Builder
//!
//! Every operation kind has a fixed four-column schema, so success and
//! failure frames always have the same shape.

use std::fmt;

use ledgerq_primitives::TxId;
use serde::Serialize;

use crate::error::CoreError;
use crate::orchestrator::InvocationReport;

/// Column value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// UTF-8 text
    String,
    /// Boolean, rendered as `true`/`false`
    Bool,
}

/// Column metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Column name
    pub name: &'static str,
    /// Value type
    #[serde(rename = "type")]
    pub ty: ColumnType,
}

const fn string(name: &'static str) -> Column {
    Column {
        name,
        ty: ColumnType::String,
    }
}

const fn boolean(name: &'static str) -> Column {
    Column {
        name,
        ty: ColumnType::Bool,
    }
}

const INSTALL_COLUMNS: [Column; 4] = [
    string("chaincode"),
    boolean("success"),
    string("version"),
    string("message"),
];

const INSTANTIATE_COLUMNS: [Column; 4] = [
    string("chaincode"),
    boolean("success"),
    string("tx_id"),
    string("message"),
];

const INVOKE_COLUMNS: [Column; 4] = INSTANTIATE_COLUMNS;

const PER_PEER_COLUMNS: [Column; 4] = [
    string("chaincode"),
    boolean("success"),
    string("peer"),
    string("message"),
];

/// Operation a frame reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Chaincode install
    Install,
    /// Chaincode instantiate
    Instantiate,
    /// Invoke or query, one aggregate row
    Invoke,
    /// Invoke or query, one row per peer
    PerPeer,
}

impl OperationKind {
    /// Fixed column schema
    pub fn columns(&self) -> &'static [Column] {
        match self {
            OperationKind::Install => &INSTALL_COLUMNS,
            OperationKind::Instantiate => &INSTANTIATE_COLUMNS,
            OperationKind::Invoke => &INVOKE_COLUMNS,
            OperationKind::PerPeer => &PER_PEER_COLUMNS,
        }
    }
}

/// Cell value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Text cell
    String(String),
    /// Boolean cell
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One row: chaincode, success flag, identifier, message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultRow(Vec<Value>);

impl ResultRow {
    fn new(chaincode: &str, success: bool, id: String, message: String) -> Self {
        ResultRow(vec![
            Value::String(chaincode.to_string()),
            Value::Bool(success),
            Value::String(id),
            Value::String(message),
        ])
    }

    /// Cell at `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Cells in column order
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Column 0
    pub fn chaincode(&self) -> &str {
        self.text(0)
    }

    /// Column 1
    pub fn success(&self) -> bool {
        matches!(self.0.get(1), Some(Value::Bool(true)))
    }

    /// Column 2: tx id, version or peer depending on the operation
    pub fn id(&self) -> &str {
        self.text(2)
    }

    /// Column 3
    pub fn message(&self) -> &str {
        self.text(3)
    }

    fn text(&self, index: usize) -> &str {
        match self.0.get(index) {
            Some(Value::String(s)) => s,
            _ => "",
        }
    }
}

/// Rows plus their column metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultFrame {
    kind: OperationKind,
    columns: &'static [Column],
    rows: Vec<ResultRow>,
}

impl ResultFrame {
    fn new(kind: OperationKind, rows: Vec<ResultRow>) -> Self {
        Self {
            kind,
            columns: kind.columns(),
            rows,
        }
    }

    /// Operation kind
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Column metadata
    pub fn columns(&self) -> &'static [Column] {
        self.columns
    }

    /// Rows in order
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// Row at `index`
    pub fn row(&self, index: usize) -> Option<&ResultRow> {
        self.rows.get(index)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the frame has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether every row reports success
    pub fn all_success(&self) -> bool {
        self.rows.iter().all(ResultRow::success)
    }
}

/// Builds frames from operation outcomes
pub struct FrameBuilder;

impl FrameBuilder {
    /// Install outcome
    pub fn install(
        chaincode: &str,
        version: &str,
        outcome: &Result<String, CoreError>,
    ) -> ResultFrame {
        let row = match outcome {
            Ok(message) => ResultRow::new(chaincode, true, version.to_string(), message.clone()),
            Err(e) => ResultRow::new(chaincode, false, version.to_string(), e.to_string()),
        };
        ResultFrame::new(OperationKind::Install, vec![row])
    }

    /// Instantiate outcome
    pub fn instantiate(chaincode: &str, outcome: &Result<TxId, CoreError>) -> ResultFrame {
        let row = match outcome {
            Ok(tx_id) => ResultRow::new(chaincode, true, tx_id.to_string(), String::new()),
            Err(e) => ResultRow::new(chaincode, false, tx_id_of(e), e.to_string()),
        };
        ResultFrame::new(OperationKind::Instantiate, vec![row])
    }

    /// Invocation outcome as one aggregate row
    pub fn invocation(report: &InvocationReport) -> ResultFrame {
        let tx_id = report
            .tx_id()
            .map(|id| id.to_string())
            .unwrap_or_default();
        let row = match report.outcome() {
            Ok(receipt) => ResultRow::new(
                report.chaincode(),
                true,
                tx_id,
                payload_text(&receipt.payload),
            ),
            Err(e) => ResultRow::new(report.chaincode(), false, tx_id, e.to_string()),
        };
        ResultFrame::new(OperationKind::Invoke, vec![row])
    }

    /// Invocation outcome as one row per peer response, in arrival order.
    ///
    /// Without responses the aggregate failure is the only row.
    pub fn per_peer(report: &InvocationReport) -> ResultFrame {
        if report.responses().is_empty() {
            let message = match report.outcome() {
                Ok(_) => String::new(),
                Err(e) => e.to_string(),
            };
            let row = ResultRow::new(report.chaincode(), false, String::new(), message);
            return ResultFrame::new(OperationKind::PerPeer, vec![row]);
        }

        let rows = report
            .responses()
            .iter()
            .map(|response| {
                // A commit failure fails every peer; a split only fails the dissenters
                let success = response.is_success()
                    && match report.outcome() {
                        Ok(_) => true,
                        Err(e) => {
                            !e.dissenters().is_empty() && !e.dissenters().contains(&response.peer)
                        }
                    };
                let message = if response.is_success() {
                    payload_text(&response.payload)
                } else {
                    response.message.clone()
                };
                ResultRow::new(report.chaincode(), success, response.peer.clone(), message)
            })
            .collect();
        ResultFrame::new(OperationKind::PerPeer, rows)
    }
}

fn tx_id_of(error: &CoreError) -> String {
    match error {
        CoreError::CommitTimeout { tx_id, .. } | CoreError::CommitRejected { tx_id, .. } => {
            tx_id.to_string()
        }
        _ => String::new(),
    }
}

/// Payload as text when it is valid UTF-8, else empty
fn payload_text(payload: &[u8]) -> String {
    std::str::from_utf8(payload)
        .map(str::to_string)
        .unwrap_or_default()
}
