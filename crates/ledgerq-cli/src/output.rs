//! Output formatting

use ledgerq_core::ResultFrame;
use serde_json::{Map, Value};

/// Output builder for formatted CLI output
pub struct Output {
    json_mode: bool,
    fields: Map<String, Value>,
    message: Option<String>,
}

impl Output {
    /// Create a new output builder
    pub fn new(json_mode: bool) -> Self {
        Self {
            json_mode,
            fields: Map::new(),
            message: None,
        }
    }

    /// Add a string field to the output
    pub fn field(mut self, key: &str, value: &str) -> Self {
        self.fields
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    /// Add a boolean field to the output
    pub fn field_bool(mut self, key: &str, value: bool) -> Self {
        self.fields.insert(key.to_string(), Value::Bool(value));
        self
    }

    /// Add a JSON value field to the output
    pub fn field_value(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Set the human-readable message
    pub fn message(mut self, msg: &str) -> Self {
        self.message = Some(msg.to_string());
        self
    }

    /// Print the output
    pub fn print(self) {
        if self.json_mode {
            let json = Value::Object(self.fields);
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        } else if let Some(msg) = self.message {
            println!("{}", msg);
        }
    }
}

/// Print a result frame as a table, or as JSON
pub fn print_frame(frame: &ResultFrame, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(frame).unwrap_or_default());
    } else {
        print!("{}", render_table(frame));
    }
}

/// Left-aligned columns separated by two spaces
pub fn render_table(frame: &ResultFrame) -> String {
    let header: Vec<String> = frame.columns().iter().map(|c| c.name.to_string()).collect();
    let rows: Vec<Vec<String>> = frame
        .rows()
        .iter()
        .map(|row| row.values().iter().map(ToString::to_string).collect())
        .collect();

    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for line in std::iter::once(&header).chain(rows.iter()) {
        let cells: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerq_core::{CoreError, FrameBuilder};

    #[test]
    fn test_table_has_header_and_row() {
        let outcome = Ok("Chaincode installed successfully".into());
        let frame = FrameBuilder::install("mycc", "1.0", &outcome);
        let table = render_table(&frame);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("chaincode  success  version  message"));
        assert!(lines[1].starts_with("mycc"));
        assert!(lines[1].contains("true"));
        assert!(lines[1].ends_with("Chaincode installed successfully"));
    }

    #[test]
    fn test_table_failure_row() {
        let frame = FrameBuilder::install(
            "mycc",
            "1.0",
            &Err(CoreError::Precondition("no channel handle".into())),
        );
        let table = render_table(&frame);
        assert!(table.contains("false"));
        assert!(table.contains("no channel handle"));
    }
}
