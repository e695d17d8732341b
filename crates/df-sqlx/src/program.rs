//! Template compiler: turns a definition file into an executable program.
//!
//! SQL files become a Jinja template in which every stretch of literal SQL is
//! a reference into a list of literals passed as render data, so SQL text is
//! never parsed as template code. Each part of the action is wrapped in a
//! `section` filter that captures its rendered text:
//!
//! ```text
//! {% set x = 1 %}                               <- hoisted code blocks
//! {% filter section("query") %}{{ __lit[0] }}{{ (x) }}{% endfilter %}
//! ```

use crate::error::{SqlxError, SqlxResult};
use crate::lexer::{escape_backticks, lex, LexMode, SyntaxNode};
use crate::sqlx::{split_statements, SqlxFile};
use df_core::path::base_filename;
use df_core::{ActionConfig, ConfigType};

/// Filter that captures a rendered section
pub const SECTION_FILTER: &str = "section";

/// Render variable holding the literal SQL fragments
pub const LITERALS_VAR: &str = "__lit";

/// Every name a SQL program may call. Which of them actually work depends on
/// the action type.
pub const LEGACY_BINDINGS: &[&str] = &[
    "config",
    "type",
    "ref",
    "resolve",
    "self",
    "this",
    "name",
    "dependencies",
    "database",
    "schema",
    "when",
    "incremental",
    "where",
    "preOps",
    "postOps",
    "descriptor",
    "describe",
    "hasOutput",
    "tags",
    "disabled",
    "bigquery",
    "redshift",
    "snowflake",
    "sqldatawarehouse",
];

/// A captured part of a SQL action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// The query; operations capture one per statement
    Query,
    PreOps,
    PostOps,
    /// The incremental `where` clause
    Where,
    /// A unit test input; one per `input` block, in source order
    Input,
}

impl Section {
    pub fn name(&self) -> &'static str {
        match self {
            Section::Query => "query",
            Section::PreOps => "preOps",
            Section::PostOps => "postOps",
            Section::Where => "where",
            Section::Input => "input",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "query" => Some(Section::Query),
            "preOps" => Some(Section::PreOps),
            "postOps" => Some(Section::PostOps),
            "where" => Some(Section::Where),
            "input" => Some(Section::Input),
            _ => None,
        }
    }
}

/// What a definition file compiles to
#[derive(Debug, Clone, PartialEq)]
pub enum Program {
    /// A `.jinja` script, executed as written
    Script { file_path: String, source: String },
    /// A SQL file defining exactly one action
    Sql(SqlProgram),
}

impl Program {
    pub fn file_path(&self) -> &str {
        match self {
            Program::Script { file_path, .. } => file_path,
            Program::Sql(program) => &program.file_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlProgram {
    pub file_path: String,
    /// Default action name, from the file name
    pub name: String,
    pub config_type: ConfigType,
    /// Contents of a SQLX `config { }` block
    pub config: Option<ActionConfig>,
    pub code_blocks: Vec<String>,
    pub template: String,
    pub literals: Vec<String>,
    /// Names of the `input` blocks, matching the order of input sections
    pub input_names: Vec<String>,
    sections: Vec<(Section, String)>,
}

impl SqlProgram {
    /// Human-readable form: the code blocks, then every section as a
    /// backtick template literal.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for code in &self.code_blocks {
            out.push_str(code.trim());
            out.push('\n');
        }
        for (section, sql) in &self.sections {
            out.push_str(&format!("{}: `{}`\n", section.name(), escape_backticks(sql)));
        }
        out
    }

    pub fn has_section(&self, section: Section) -> bool {
        self.sections.iter().any(|(s, _)| *s == section)
    }
}

/// Compile any definition file. `.jinja` scripts pass through unchanged.
pub fn compile(file_path: &str, source: &str) -> SqlxResult<Program> {
    if file_path.ends_with(".jinja") {
        return Ok(Program::Script {
            file_path: file_path.to_string(),
            source: source.to_string(),
        });
    }
    if file_path.ends_with(".sqlx") {
        return compile_sqlx(file_path, source).map(Program::Sql);
    }
    if file_path.ends_with(".sql") {
        return compile_sql(file_path, source).map(Program::Sql);
    }
    Err(SqlxError::UnsupportedFile(file_path.to_string()))
}

/// The compiler bundled for projects that predate SQLX.
pub fn compile_legacy(file_path: &str, source: &str) -> SqlxResult<Program> {
    if file_path.ends_with(".sqlx") {
        return Err(SqlxError::UnsupportedFile(file_path.to_string()));
    }
    compile(file_path, source)
}

fn compile_sql(file_path: &str, source: &str) -> SqlxResult<SqlProgram> {
    let tree = lex(source, LexMode::Sql)?;
    let config_type = if file_path.ends_with(".assert.sql") {
        ConfigType::Assertion
    } else if file_path.ends_with(".ops.sql") {
        ConfigType::Operations
    } else {
        ConfigType::Table
    };

    let mut writer = TemplateWriter::default();
    let code_blocks: Vec<String> = tree.code_blocks().into_iter().map(str::to_string).collect();
    for code in &code_blocks {
        writer.code(code);
    }

    let sql: Vec<SyntaxNode> = tree
        .nodes
        .into_iter()
        .filter(|n| !matches!(n, SyntaxNode::CodeBlock { .. }))
        .collect();
    if config_type == ConfigType::Operations {
        for statement in split_statements(&sql) {
            writer.section(Section::Query, &statement);
        }
    } else {
        writer.section(Section::Query, &sql);
    }

    Ok(writer.finish(file_path, config_type, None, code_blocks))
}

fn compile_sqlx(file_path: &str, source: &str) -> SqlxResult<SqlProgram> {
    let tree = lex(source, LexMode::Sqlx)?;
    let file = SqlxFile::from_tree(&tree)?;
    let config = file.config()?;
    let config_type = config
        .as_ref()
        .and_then(|c| c.config_type)
        .unwrap_or(ConfigType::Table);

    let messages = sqlx_violations(&file, config.as_ref(), config_type);
    if !messages.is_empty() {
        return Err(SqlxError::Validation { messages });
    }

    let mut writer = TemplateWriter::default();
    for code in &file.code {
        writer.code(code);
    }
    match config_type {
        ConfigType::Declaration => {}
        ConfigType::Operations => {
            for statement in &file.statements {
                writer.section(Section::Query, statement);
            }
        }
        _ => writer.section(
            Section::Query,
            file.statements.first().map(Vec::as_slice).unwrap_or(&[]),
        ),
    }
    for statement in &file.pre_operations {
        writer.section(Section::PreOps, statement);
    }
    for statement in &file.post_operations {
        writer.section(Section::PostOps, statement);
    }
    if let Some(clause) = &file.incremental_where {
        writer.section(Section::Where, clause);
    }
    for (name, nodes) in &file.inputs {
        writer.input(name, nodes);
    }

    Ok(writer.finish(file_path, config_type, config, file.code.clone()))
}

/// Rules a SQLX file must satisfy for its action type
fn sqlx_violations(
    file: &SqlxFile,
    config: Option<&ActionConfig>,
    config_type: ConfigType,
) -> Vec<String> {
    let mut messages = Vec::new();
    let mut check = |violated: bool, message: &str| {
        if violated {
            messages.push(message.to_string());
        }
    };
    let is_dataset = config_type.is_dataset();
    let flag = |f: fn(&ActionConfig) -> Option<bool>| config.and_then(f).unwrap_or(false);
    let has_output = flag(|c| c.has_output);

    check(
        file.statements.len() > 1 && config_type != ConfigType::Operations,
        "Actions may only contain more than one SQL statement if they are of type 'operations'.",
    );
    check(
        has_output && config_type != ConfigType::Operations,
        "Actions may only specify 'hasOutput: true' if they are of type 'operations'.",
    );
    check(
        config.is_some_and(|c| c.columns.is_some())
            && !(is_dataset || has_output || config_type == ConfigType::Declaration),
        "Actions may only specify 'columns' if they create or declare a dataset.",
    );
    check(
        flag(|c| c.protected) && config_type != ConfigType::Incremental,
        "Actions may only specify 'protected: true' if they are of type 'incremental'.",
    );
    check(
        file.incremental_where.is_some() && config_type != ConfigType::Incremental,
        "Actions may only include incremental_where if they are of type 'incremental'.",
    );
    check(
        config_type == ConfigType::Declaration && config.and_then(|c| c.schema.as_ref()).is_none(),
        "Actions of type 'declaration' must specify a value for 'schema'.",
    );
    check(
        config_type == ConfigType::Declaration && !file.statements.is_empty(),
        "Actions of type 'declaration' may not contain SQL.",
    );
    let is_test = config_type == ConfigType::Test;
    let has_dataset = config.is_some_and(|c| c.dataset.is_some());
    check(
        has_dataset && !is_test,
        "Actions may only specify 'dataset' if they are of type 'test'.",
    );
    check(
        !has_dataset && is_test,
        "Actions must specify 'dataset' if they are of type 'test'.",
    );
    check(
        !file.inputs.is_empty() && !is_test,
        "Actions may only include input blocks if they are of type 'test'.",
    );
    check(
        flag(|c| c.disabled) && !is_dataset,
        "Actions may only specify 'disabled: true' if they create a dataset.",
    );
    check(
        config.is_some_and(|c| c.bigquery.is_some()) && !is_dataset,
        "Actions may only specify 'bigquery: { ... }' if they create a dataset.",
    );
    check(
        !file.pre_operations.is_empty() && !is_dataset,
        "Actions may only include pre_operations if they create a dataset.",
    );
    check(
        !file.post_operations.is_empty() && !is_dataset,
        "Actions may only include post_operations if they create a dataset.",
    );
    messages
}

/// Accumulates the template text and its literal table
#[derive(Default)]
struct TemplateWriter {
    template: String,
    literals: Vec<String>,
    sections: Vec<(Section, String)>,
    input_names: Vec<String>,
    last_was_literal: bool,
}

impl TemplateWriter {
    fn code(&mut self, code: &str) {
        self.template.push_str(code.trim());
        self.template.push('\n');
        self.last_was_literal = false;
    }

    fn section(&mut self, section: Section, nodes: &[SyntaxNode]) {
        self.template.push_str(&format!(
            "{{% filter {}(\"{}\") %}}",
            SECTION_FILTER,
            section.name()
        ));
        self.last_was_literal = false;
        let mut raw = String::new();
        for node in nodes {
            self.node(node);
            node.write_source(&mut raw);
        }
        self.template.push_str("{% endfilter %}\n");
        self.last_was_literal = false;
        self.sections.push((section, raw.trim().to_string()));
    }

    fn input(&mut self, name: &str, nodes: &[SyntaxNode]) {
        self.input_names.push(name.to_string());
        self.section(Section::Input, nodes);
    }

    fn node(&mut self, node: &SyntaxNode) {
        match node {
            SyntaxNode::Placeholder { expr } => {
                self.template.push_str(&format!("{{{{ ({}) }}}}", expr.trim()));
                self.last_was_literal = false;
            }
            SyntaxNode::StringLiteral(parts) => parts.iter().for_each(|p| self.node(p)),
            SyntaxNode::CodeBlock { .. } | SyntaxNode::Section { .. } => {}
            other => self.literal(&other.source()),
        }
    }

    fn literal(&mut self, text: &str) {
        if self.last_was_literal {
            if let Some(last) = self.literals.last_mut() {
                last.push_str(text);
                return;
            }
        }
        self.template.push_str(&format!(
            "{{{{ {}[{}] }}}}",
            LITERALS_VAR,
            self.literals.len()
        ));
        self.literals.push(text.to_string());
        self.last_was_literal = true;
    }

    fn finish(
        self,
        file_path: &str,
        config_type: ConfigType,
        config: Option<ActionConfig>,
        code_blocks: Vec<String>,
    ) -> SqlProgram {
        let program = SqlProgram {
            file_path: file_path.to_string(),
            name: base_filename(file_path).to_string(),
            config_type,
            config,
            code_blocks,
            template: self.template,
            literals: self.literals,
            input_names: self.input_names,
            sections: self.sections,
        };
        log::debug!("compiled {}:\n{}", file_path, program.listing());
        program
    }
}

#[cfg(test)]
#[path = "program_test.rs"]
mod tests;
