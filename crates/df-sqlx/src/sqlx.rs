//! Splitting a lexed SQLX file into its sections.

use crate::error::{SqlxError, SqlxResult};
use crate::lexer::{input_label, SectionBody, SectionKind, SyntaxNode, SyntaxTree};
use df_core::ActionConfig;

/// The parts of a `.sqlx` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlxFile {
    /// Bodies of every `config { }` block, braces excluded
    pub config_blocks: Vec<String>,
    /// Bodies of `jinja { }` blocks, in source order
    pub code: Vec<String>,
    /// Top-level SQL, one entry per non-blank statement
    pub statements: Vec<Vec<SyntaxNode>>,
    pub pre_operations: Vec<Vec<SyntaxNode>>,
    pub post_operations: Vec<Vec<SyntaxNode>>,
    pub incremental_where: Option<Vec<SyntaxNode>>,
    /// `input "name" { }` blocks by name; a repeated name extends the block
    pub inputs: Vec<(String, Vec<SyntaxNode>)>,
}

impl SqlxFile {
    pub fn from_tree(tree: &SyntaxTree) -> SqlxResult<Self> {
        let mut file = SqlxFile::default();
        let mut top_level = Vec::new();

        for node in &tree.nodes {
            let SyntaxNode::Section {
                kind, open, body, ..
            } = node
            else {
                top_level.push(node.clone());
                continue;
            };
            match (kind, body) {
                (SectionKind::Config, SectionBody::Code(code)) => {
                    file.config_blocks.push(code.clone())
                }
                (SectionKind::Jinja, SectionBody::Code(code)) => file.code.push(code.clone()),
                (SectionKind::PreOperations, SectionBody::Sql(nodes)) => {
                    file.pre_operations.extend(split_statements(nodes))
                }
                (SectionKind::PostOperations, SectionBody::Sql(nodes)) => {
                    file.post_operations.extend(split_statements(nodes))
                }
                (SectionKind::IncrementalWhere, SectionBody::Sql(nodes)) => {
                    if has_separator(nodes) {
                        return Err(SqlxError::Validation {
                            messages: vec![
                                "Incremental code blocks may not contain SQL statement separators ('---')."
                                    .to_string(),
                            ],
                        });
                    }
                    file.incremental_where
                        .get_or_insert_with(Vec::new)
                        .extend(nodes.iter().cloned());
                }
                (SectionKind::Input, SectionBody::Sql(nodes)) => {
                    if has_separator(nodes) {
                        return Err(SqlxError::Validation {
                            messages: vec![
                                "Input code blocks may not contain SQL statement separators ('---')."
                                    .to_string(),
                            ],
                        });
                    }
                    let label = input_label(open).unwrap_or_default();
                    match file.inputs.iter_mut().find(|(name, _)| name == label) {
                        Some((_, body)) => body.extend(nodes.iter().cloned()),
                        None => file.inputs.push((label.to_string(), nodes.clone())),
                    }
                }
                (kind, _) => {
                    return Err(SqlxError::Validation {
                        messages: vec![format!("Malformed {} block", kind.keyword())],
                    })
                }
            }
        }

        file.statements = split_statements(&top_level);
        Ok(file)
    }

    /// The single config block, if any
    pub fn config(&self) -> SqlxResult<Option<ActionConfig>> {
        match self.config_blocks.as_slice() {
            [] => Ok(None),
            [body] => parse_config(body).map(Some),
            _ => Err(SqlxError::Validation {
                messages: vec!["Actions may only contain one config block.".to_string()],
            }),
        }
    }
}

fn has_separator(nodes: &[SyntaxNode]) -> bool {
    nodes
        .iter()
        .any(|n| matches!(n, SyntaxNode::StatementSeparator(_)))
}

/// Parse the body of a `config { }` block as a flow mapping.
pub fn parse_config(body: &str) -> SqlxResult<ActionConfig> {
    let trimmed = body.trim_end();
    let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed);
    let mapping = format!("{{{}}}", trimmed);
    serde_yaml::from_str(&mapping).map_err(|e| SqlxError::InvalidConfig(e.to_string()))
}

/// Split on statement separators, dropping blank statements.
pub fn split_statements(nodes: &[SyntaxNode]) -> Vec<Vec<SyntaxNode>> {
    nodes
        .split(|n| matches!(n, SyntaxNode::StatementSeparator(_)))
        .filter(|statement| !is_blank(statement))
        .map(<[SyntaxNode]>::to_vec)
        .collect()
}

/// True if the nodes hold nothing but whitespace and comments
pub fn is_blank(nodes: &[SyntaxNode]) -> bool {
    nodes.iter().all(|node| match node {
        SyntaxNode::Text(text) => text.trim().is_empty(),
        SyntaxNode::Comment(_) => true,
        _ => false,
    })
}

#[cfg(test)]
#[path = "sqlx_test.rs"]
mod tests;
