use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::TagError;
use crate::resource::ResourceIdentity;
use crate::tags::RequestedTags;

/// A spreadsheet-style cell. Exported sheets often carry cost centers and
/// similar values as numbers, so anything scalar is accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// A blank cell is `None`. Anything else is kept exactly as written.
fn text(cell: &Option<Cell>) -> Option<String> {
    cell.as_ref()
        .map(ToString::to_string)
        .filter(|s| !s.trim().is_empty())
}

/// One row of a batch file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchRow {
    pub subscription_id: String,
    pub resource_group_name: String,
    pub resource_name: String,
    #[serde(default)]
    pub resource_type: Option<Cell>,
    #[serde(default)]
    pub owner_tag: Option<Cell>,
    #[serde(default)]
    pub application_tag: Option<Cell>,
    #[serde(default)]
    pub environment_tag: Option<Cell>,
    #[serde(default)]
    pub cost_center_tag: Option<Cell>,
}

impl BatchRow {
    pub fn identity(&self) -> Result<ResourceIdentity, TagError> {
        let resource_type = text(&self.resource_type);
        Ok(ResourceIdentity::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.resource_name,
        )?
        .with_type(resource_type.as_deref()))
    }

    /// Blank or missing cells leave that tag unchanged.
    pub fn requested_tags(&self) -> RequestedTags {
        RequestedTags {
            owner: text(&self.owner_tag),
            application: text(&self.application_tag),
            environment: text(&self.environment_tag),
            cost_center: text(&self.cost_center_tag),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RowsDocument {
    List(Vec<BatchRow>),
    Wrapped { rows: Vec<BatchRow> },
}

impl RowsDocument {
    fn into_rows(self) -> Vec<BatchRow> {
        match self {
            RowsDocument::List(rows) | RowsDocument::Wrapped { rows } => rows,
        }
    }
}

/// Load rows from a `.json` file, or from YAML for any other extension.
/// Either a bare list of rows or a `rows:` key is accepted.
pub fn load_rows(path: &Path) -> Result<Vec<BatchRow>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file: {}", path.display()))?;
    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    parse_rows(&content, is_json)
        .with_context(|| format!("Failed to parse batch file: {}", path.display()))
}

pub fn parse_rows(content: &str, is_json: bool) -> Result<Vec<BatchRow>> {
    let document: RowsDocument = if is_json {
        serde_json::from_str(content)?
    } else {
        serde_yaml::from_str(content)?
    };
    Ok(document.into_rows())
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
- subscription_id: sub-1
  resource_group_name: rg-app
  resource_name: web
  resource_type: ""
  owner_tag: alice
  cost_center_tag: 4411
- subscription_id: sub-1
  resource_group_name: rg-app
  resource_name: db
  resource_type: Microsoft.Sql/servers
  environment_tag: "  "
"#;

    #[test]
    fn parses_yaml_rows_with_numeric_cells() {
        let rows = parse_rows(YAML, false).unwrap();
        assert_eq!(rows.len(), 2);

        let tags = rows[0].requested_tags();
        assert_eq!(tags.owner.as_deref(), Some("alice"));
        assert_eq!(tags.cost_center.as_deref(), Some("4411"));
        assert_eq!(tags.application, None);
        assert_eq!(rows[0].identity().unwrap().resource_type(), None);
    }

    #[test]
    fn blank_cells_are_unchanged() {
        let rows = parse_rows(YAML, false).unwrap();
        assert!(rows[1].requested_tags().is_blank());
        assert_eq!(
            rows[1].identity().unwrap().resource_type(),
            Some("Microsoft.Sql/servers")
        );
    }

    #[test]
    fn parses_wrapped_json() {
        let json = r#"{"rows":[{"subscription_id":"s","resource_group_name":"rg","resource_name":"n","owner_tag":"bob"}]}"#;
        let rows = parse_rows(json, true).unwrap();
        assert_eq!(rows[0].requested_tags().owner.as_deref(), Some("bob"));
    }

    #[test]
    fn tag_cells_keep_surrounding_whitespace() {
        let json = r#"[{"subscription_id":"s","resource_group_name":"rg","resource_name":"n","owner_tag":" alice ","application_tag":"\tbilling"}]"#;
        let rows = parse_rows(json, true).unwrap();
        let tags = rows[0].requested_tags().to_tag_set();
        assert_eq!(tags.get("owner"), Some(" alice "));
        assert_eq!(tags.get("application"), Some("\tbilling"));
    }

    #[test]
    fn blank_identity_is_invalid() {
        let json = r#"[{"subscription_id":"s","resource_group_name":"","resource_name":"n"}]"#;
        let rows = parse_rows(json, true).unwrap();
        assert!(rows[0].identity().is_err());
    }
}
