//! Validated table configuration.
//!
//! Table and column identifiers are interpolated into SQL by backends, so
//! they must come from a [`TableSpec`] built through the validating
//! constructor — never from unvalidated caller input.

use crate::{Error, Result, strategy::Strategy};

/// Column names owned by the engine; they cannot be declared as business
/// columns.
const RESERVED: &[&str] = &["uid", "id", "version", "created_at", "is_current"];

/// A versioned table: its name, its strategy, and its business columns.
///
/// The identity columns (`uid`, `id`) and the strategy's discriminator
/// columns are implicit and must not be declared here. Construction goes
/// through [`TableSpec::new`] only, so every identifier a backend
/// interpolates into SQL has been validated.
#[derive(Debug, Clone)]
pub struct TableSpec {
  name:     String,
  strategy: Strategy,
  columns:  Vec<String>,
}

impl TableSpec {
  pub fn new(
    name: impl Into<String>,
    strategy: Strategy,
    columns: impl IntoIterator<Item = impl Into<String>>,
  ) -> Result<Self> {
    let name = name.into();
    validate_identifier(&name)?;

    let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
    for column in &columns {
      validate_identifier(column)?;
      if RESERVED.contains(&column.as_str()) {
        return Err(Error::InvalidIdentifier(column.clone()));
      }
    }

    Ok(Self { name, strategy, columns })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn strategy(&self) -> Strategy {
    self.strategy
  }

  pub fn columns(&self) -> &[String] {
    &self.columns
  }

  pub fn has_column(&self, column: &str) -> bool {
    self.columns.iter().any(|c| c == column)
  }

  /// Used by backends when an update or predicate names a column.
  pub fn require_column(&self, column: &str) -> Result<()> {
    if self.has_column(column) {
      Ok(())
    } else {
      Err(Error::UnknownColumn {
        table:  self.name.clone(),
        column: column.to_owned(),
      })
    }
  }
}

fn validate_identifier(s: &str) -> Result<()> {
  let mut chars = s.chars();
  let first_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
  if first_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
    Ok(())
  } else {
    Err(Error::InvalidIdentifier(s.to_owned()))
  }
}
