//! The action graph builder.
//!
//! File executions send [`Registration`]s to a single [`Session`]. Nothing is
//! resolved until [`Session::compile`], which consumes the session so that it
//! can never be reused across compiles.

use crate::action::{
    Action, ActionHeader, ActionKind, Assertion, Declaration, Notebook, Operation, Registration,
    RegistrationPayload, Table, TableAssertions, TableType, UnitTest, UnitTestRegistration,
};
use crate::dag::{format_cycle, ActionDag};
use crate::graph::{CompilationError, CompiledGraph, GraphErrors, GraphWarning, ValidationError};
use crate::reference::{substitute, Deferred};
use crate::settings::ProjectConfig;
use crate::target::{Target, TargetRef};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Registration surface for one compile
#[derive(Debug)]
pub struct Session {
    config: ProjectConfig,
    core_version: String,
    registrations: Vec<Registration>,
    tests: Vec<UnitTestRegistration>,
    compilation_errors: Vec<CompilationError>,
    warnings: Vec<GraphWarning>,
}

/// One action being finalized
struct Entry {
    registration: Registration,
    canonical: Target,
    runtime: Target,
    /// Index of the table an inline assertion was generated from
    parent: Option<usize>,
}

enum Resolution {
    Found(usize),
    Missing,
    Ambiguous(Vec<usize>),
}

impl Session {
    pub fn new(config: ProjectConfig, core_version: &str) -> Self {
        Self {
            config,
            core_version: core_version.to_string(),
            registrations: Vec::new(),
            tests: Vec::new(),
            compilation_errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Accept one action from a file execution
    pub fn register(&mut self, registration: Registration) {
        log::debug!(
            "registered {} '{}' from {}",
            registration.kind(),
            registration.name,
            registration.file_path
        );
        self.registrations.push(registration);
    }

    /// Accept one unit test from a file execution
    pub fn register_test(&mut self, test: UnitTestRegistration) {
        log::debug!("registered test '{}' from {}", test.name, test.file_path);
        self.tests.push(test);
    }

    /// Record a file-scoped compilation error
    pub fn compile_error(&mut self, file_name: &str, message: impl Into<String>) {
        self.compilation_errors.push(CompilationError {
            file_name: file_name.to_string(),
            message: message.into(),
        });
    }

    /// Record a non-fatal diagnostic
    pub fn warn(&mut self, file_name: &str, message: impl Into<String>) {
        self.warnings.push(GraphWarning {
            file_name: file_name.to_string(),
            message: message.into(),
        });
    }

    /// Resolve, validate and freeze everything registered so far.
    ///
    /// Problems are recorded in the graph's errors; this never fails.
    pub fn compile(self) -> CompiledGraph {
        let Session {
            config,
            core_version,
            registrations,
            tests,
            mut compilation_errors,
            warnings,
        } = self;

        let mut validation_errors = Vec::new();
        let mut entries: Vec<Entry> = registrations
            .into_iter()
            .map(|registration| {
                let (canonical, runtime) = targets_for(&config, &registration);
                Entry {
                    registration,
                    canonical,
                    runtime,
                    parent: None,
                }
            })
            .collect();

        generate_inline_assertions(&config, &mut entries, &mut validation_errors);

        for entry in &entries {
            for message in entry.canonical.component_errors() {
                validation_errors.push(ValidationError {
                    file_name: entry.registration.file_path.clone(),
                    message,
                    action_target: Some(entry.canonical.clone()),
                });
            }
        }

        check_uniqueness(&entries, &mut validation_errors);

        let mut dag = ActionDag::new();
        let mut dependency_targets: Vec<Vec<Target>> = Vec::with_capacity(entries.len());
        for entry in &entries {
            dag.add_action(&entry.runtime);
            let mut resolved = BTreeSet::new();
            for reference in &entry.registration.dependencies {
                match resolve(&entries, reference) {
                    Resolution::Found(dep) => {
                        resolved.insert(entries[dep].runtime.clone());
                    }
                    Resolution::Missing => validation_errors.push(ValidationError {
                        file_name: entry.registration.file_path.clone(),
                        message: format!(
                            "Missing dependency detected: Action \"{}\" depends on \"{}\" which does not exist",
                            entry.canonical, reference
                        ),
                        action_target: Some(entry.canonical.clone()),
                    }),
                    Resolution::Ambiguous(candidates) => validation_errors.push(ValidationError {
                        file_name: entry.registration.file_path.clone(),
                        message: ambiguous_message(&entries, reference, &candidates),
                        action_target: Some(entry.canonical.clone()),
                    }),
                }
            }
            for dep in &resolved {
                dag.add_dependency(&entry.runtime, dep);
            }
            dependency_targets.push(resolved.into_iter().collect());
        }

        for cycle in dag.cycles() {
            let file_name = cycle
                .first()
                .and_then(|t| entries.iter().find(|e| &e.runtime == t))
                .map(|e| e.registration.file_path.clone())
                .unwrap_or_default();
            validation_errors.push(ValidationError {
                file_name,
                message: format!(
                    "Circular dependency detected in chain: [{}]",
                    format_cycle(&cycle)
                ),
                action_target: cycle.first().cloned(),
            });
        }

        let mut actions: Vec<Action> = Vec::with_capacity(entries.len());
        for (idx, (entry, deps)) in entries.iter().zip(dependency_targets).enumerate() {
            let (action, problems) = finalize(&config, &entries, idx, entry, deps);
            for message in problems {
                validation_errors.push(ValidationError {
                    file_name: entry.registration.file_path.clone(),
                    message,
                    action_target: Some(entry.canonical.clone()),
                });
            }
            actions.push(action);
        }

        let tests = compile_tests(&entries, tests, &mut compilation_errors);

        CompiledGraph::assemble(
            &core_version,
            config,
            actions,
            GraphErrors {
                compilation_errors,
                validation_errors,
                warnings,
            },
        )
        .with_tests(tests)
    }
}

/// Canonical and runtime target of a registration
fn targets_for(config: &ProjectConfig, registration: &Registration) -> (Target, Target) {
    let default_schema = if registration.kind() == ActionKind::Assertion {
        &config.assertion_schema
    } else {
        &config.default_schema
    };
    let canonical = Target::new(
        registration
            .database
            .clone()
            .or_else(|| config.default_database.clone()),
        registration
            .schema
            .clone()
            .unwrap_or_else(|| default_schema.clone()),
        registration.name.clone(),
    );
    let runtime = runtime_target(config, &canonical, registration.kind());
    (canonical, runtime)
}

fn runtime_target(config: &ProjectConfig, canonical: &Target, kind: ActionKind) -> Target {
    if kind == ActionKind::Declaration {
        return canonical.clone();
    }
    Target::new(
        config.finalize_database(canonical.database.as_deref()),
        config.finalize_schema(&canonical.schema),
        config.finalize_name(&canonical.name),
    )
}

/// Append assertions generated from tables' inline `assertions` config
fn generate_inline_assertions(
    config: &ProjectConfig,
    entries: &mut Vec<Entry>,
    validation_errors: &mut Vec<ValidationError>,
) {
    let mut generated = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        let RegistrationPayload::Table { assertions, .. } = &entry.registration.payload else {
            continue;
        };
        if assertions.is_empty() {
            continue;
        }
        if !assertions.unique_key.is_empty() && !assertions.unique_keys.is_empty() {
            validation_errors.push(ValidationError {
                file_name: entry.registration.file_path.clone(),
                message: "Specify at most one of 'assertions.uniqueKey' and 'assertions.uniqueKeys'"
                    .to_string(),
                action_target: Some(entry.canonical.clone()),
            });
            continue;
        }
        for (name, query) in inline_assertion_queries(&entry.canonical, assertions) {
            let registration = Registration {
                file_path: entry.registration.file_path.clone(),
                name,
                schema: None,
                database: None,
                dependencies: vec![TargetRef::from(&entry.canonical)],
                descriptor: Default::default(),
                tags: entry.registration.tags.clone(),
                disabled: entry.registration.disabled,
                payload: RegistrationPayload::Assertion { query },
            };
            let (canonical, runtime) = targets_for(config, &registration);
            generated.push(Entry {
                registration,
                canonical,
                runtime,
                parent: Some(idx),
            });
        }
    }
    entries.extend(generated);
}

/// Names and queries of the assertions a table's inline config asks for
fn inline_assertion_queries(table: &Target, assertions: &TableAssertions) -> Vec<(String, String)> {
    let dataset = Deferred::Target {
        target: TargetRef::from(table),
    }
    .encode();
    let prefix = format!("{}_{}_assertions", table.schema, table.name);

    let mut keys: Vec<&Vec<String>> = Vec::new();
    if !assertions.unique_key.is_empty() {
        keys.push(&assertions.unique_key);
    }
    keys.extend(assertions.unique_keys.iter());

    let mut out: Vec<(String, String)> = keys
        .into_iter()
        .enumerate()
        .map(|(i, columns)| {
            let cols = columns.join(", ");
            let query = format!(
                "SELECT\n  *\nFROM (\n  SELECT\n    {cols},\n    COUNT(1) AS index_row_count\n  FROM {dataset}\n  GROUP BY {cols}\n  ) AS data\nWHERE index_row_count > 1\n"
            );
            (format!("{}_uniqueKey_{}", prefix, i), query)
        })
        .collect();

    let conditions: Vec<String> = assertions
        .row_conditions
        .iter()
        .cloned()
        .chain(
            assertions
                .non_null
                .iter()
                .map(|column| format!("{} IS NOT NULL", column)),
        )
        .collect();
    if !conditions.is_empty() {
        let query = conditions
            .iter()
            .map(|condition| {
                format!(
                    "SELECT\n  '{}' AS failing_row_condition,\n  *\nFROM {}\nWHERE NOT ({})\n",
                    condition.replace('\'', "\\'"),
                    dataset,
                    condition
                )
            })
            .collect::<Vec<_>>()
            .join("UNION ALL\n");
        out.push((format!("{}_rowConditions", prefix), query));
    }
    out
}

/// One validation error per colliding pair; canonical collisions only when
/// the same pair has not already collided at runtime.
fn check_uniqueness(entries: &[Entry], validation_errors: &mut Vec<ValidationError>) {
    let mut reported: HashSet<(usize, usize)> = HashSet::new();
    fn runtime(entry: &Entry) -> &Target {
        &entry.runtime
    }
    fn canonical(entry: &Entry) -> &Target {
        &entry.canonical
    }
    let namespaces: [fn(&Entry) -> &Target; 2] = [runtime, canonical];
    for target_of in namespaces {
        let mut seen: BTreeMap<&Target, usize> = BTreeMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            let target = target_of(entry);
            match seen.get(target) {
                Some(&first) => {
                    if reported.insert((first, idx)) {
                        validation_errors.push(ValidationError {
                            file_name: entry.registration.file_path.clone(),
                            message: format!(
                                "Duplicate action name detected. Names within a schema must be unique across tables, declarations, assertions, and operations: \"{}\" is defined in both {} and {}",
                                target,
                                entries[first].registration.file_path,
                                entry.registration.file_path
                            ),
                            action_target: Some(target.clone()),
                        });
                    }
                }
                None => {
                    seen.insert(target, idx);
                }
            }
        }
    }
}

/// Look a reference up by canonical target first, then by runtime target.
fn resolve(entries: &[Entry], reference: &TargetRef) -> Resolution {
    let by_canonical: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| reference.matches(&e.canonical))
        .map(|(i, _)| i)
        .collect();
    let candidates = if by_canonical.is_empty() {
        entries
            .iter()
            .enumerate()
            .filter(|(_, e)| reference.matches(&e.runtime))
            .map(|(i, _)| i)
            .collect()
    } else {
        by_canonical
    };

    // Duplicates of one target are reported separately; treat them as one.
    let mut distinct: BTreeMap<&Target, usize> = BTreeMap::new();
    for &idx in &candidates {
        distinct.entry(&entries[idx].runtime).or_insert(idx);
    }
    match distinct.len() {
        0 => Resolution::Missing,
        1 => Resolution::Found(candidates[0]),
        _ => Resolution::Ambiguous(distinct.into_values().collect()),
    }
}

fn ambiguous_message(entries: &[Entry], reference: &TargetRef, candidates: &[usize]) -> String {
    let names: Vec<String> = candidates
        .iter()
        .map(|&c| entries[c].canonical.readable())
        .collect();
    format!(
        "Ambiguous Action name: {}. Did you mean one of: {}.",
        reference,
        names.join(", ")
    )
}

/// Finalize unit tests. A repeated test name is reported and only its first
/// declaration is kept.
fn compile_tests(
    entries: &[Entry],
    tests: Vec<UnitTestRegistration>,
    compilation_errors: &mut Vec<CompilationError>,
) -> Vec<UnitTest> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut compiled = Vec::with_capacity(tests.len());
    for test in tests {
        if !seen.insert(test.name.clone()) {
            compilation_errors.push(CompilationError {
                file_name: test.file_path.clone(),
                message: format!("Duplicate test name detected: \"{}\"", test.name),
            });
            continue;
        }
        let mut problems = Vec::new();
        let test_query = test_query(entries, &test, &mut problems);
        compilation_errors.extend(problems.into_iter().map(|message| CompilationError {
            file_name: test.file_path.clone(),
            message,
        }));
        compiled.push(UnitTest {
            name: test.name,
            file_name: test.file_path,
            test_query,
            expected_output_query: test.expected_query,
        });
    }
    compiled
}

/// The dataset's query with each reference replaced by the test's input
fn test_query(
    entries: &[Entry],
    test: &UnitTestRegistration,
    problems: &mut Vec<String>,
) -> String {
    let Some(dataset) = &test.dataset else {
        problems.push("Tests must operate upon a specified dataset.".to_string());
        return String::new();
    };
    let found = match resolve(entries, dataset) {
        Resolution::Found(found) => Some(found),
        Resolution::Missing => None,
        Resolution::Ambiguous(candidates) => {
            problems.push(ambiguous_message(entries, dataset, &candidates));
            candidates.first().copied()
        }
    };
    let query = match found.map(|i| &entries[i].registration.payload) {
        Some(RegistrationPayload::Table {
            table_type: TableType::Incremental,
            ..
        }) => {
            problems
                .push("Running tests on incremental datasets is not yet supported.".to_string());
            return String::new();
        }
        Some(RegistrationPayload::Table { query, .. }) => query,
        _ => {
            problems.push(format!("Dataset {} could not be found.", dataset));
            return String::new();
        }
    };
    substitute(query, |deferred| match deferred {
        Deferred::Target { target } => match test.input_for(target) {
            Some(input) => format!("({})", input),
            None => {
                problems.push(format!(
                    "Input for dataset \"{}\" has not been provided.",
                    target
                ));
                String::new()
            }
        },
        _ => String::new(),
    })
}

/// Substitutes deferred markers in the text of finalized actions
struct MarkerResolver<'a> {
    config: &'a ProjectConfig,
    entries: &'a [Entry],
    /// The action being finalized
    root: usize,
    /// Inline tables currently being expanded
    expanding: Vec<usize>,
    /// Problems found in the action's own text, deduplicated
    errors: BTreeSet<String>,
}

impl<'a> MarkerResolver<'a> {
    fn new(config: &'a ProjectConfig, entries: &'a [Entry], root: usize) -> Self {
        Self {
            config,
            entries,
            root,
            expanding: Vec::new(),
            errors: BTreeSet::new(),
        }
    }

    /// Resolve every marker in `text` as written by the action at `idx`
    fn text(&mut self, idx: usize, text: &str) -> String {
        substitute(text, |deferred| self.marker(idx, deferred))
    }

    fn all(&mut self, idx: usize, texts: &[String]) -> Vec<String> {
        texts.iter().map(|t| self.text(idx, t)).collect()
    }

    fn marker(&mut self, idx: usize, deferred: &Deferred) -> String {
        let warehouse = self.config.warehouse;
        let entries = self.entries;
        match deferred {
            Deferred::Target { target } => match resolve(entries, target) {
                Resolution::Found(found) => self.target(found),
                _ => {
                    let fallback = Target::new(
                        target
                            .database
                            .clone()
                            .or_else(|| self.config.default_database.clone()),
                        target
                            .schema
                            .clone()
                            .unwrap_or_else(|| self.config.default_schema.clone()),
                        target.name.clone(),
                    );
                    runtime_target(self.config, &fallback, ActionKind::Table).quoted(warehouse)
                }
            },
            Deferred::SelfTarget => entries[idx].runtime.quoted(warehouse),
            Deferred::SelfSchema => entries[idx].runtime.schema.clone(),
            Deferred::SelfDatabase => entries[idx].runtime.database.clone().unwrap_or_default(),
        }
    }

    /// Text standing in for a resolved reference. Inline tables expand to
    /// their parenthesized query; a cycle of inline tables falls back to the
    /// quoted target and is reported by cycle detection.
    fn target(&mut self, found: usize) -> String {
        let entries = self.entries;
        let entry = &entries[found];
        match &entry.registration.payload {
            RegistrationPayload::Table {
                table_type: TableType::Inline,
                query,
                ..
            } if found != self.root && !self.expanding.contains(&found) => {
                self.expanding.push(found);
                let expanded = self.text(found, query);
                self.expanding.pop();
                format!("({})", expanded)
            }
            RegistrationPayload::Operation {
                has_output: false, ..
            } => {
                if self.expanding.is_empty() {
                    self.errors.insert(
                        "Actions cannot resolve operations which do not produce output."
                            .to_string(),
                    );
                }
                entry.runtime.quoted(self.config.warehouse)
            }
            _ => entry.runtime.quoted(self.config.warehouse),
        }
    }
}

/// Substitute deferred markers and build the immutable action record.
/// Returns the action and any reference problems found in its text.
fn finalize(
    config: &ProjectConfig,
    entries: &[Entry],
    idx: usize,
    entry: &Entry,
    dependency_targets: Vec<Target>,
) -> (Action, BTreeSet<String>) {
    let mut resolver = MarkerResolver::new(config, entries, idx);

    let registration = &entry.registration;
    let header = ActionHeader {
        target: entry.runtime.clone(),
        canonical_target: entry.canonical.clone(),
        file_name: registration.file_path.clone(),
        dependency_targets,
        tags: registration.tags.clone(),
        disabled: registration.disabled,
        action_descriptor: if registration.descriptor.is_empty() {
            None
        } else {
            Some(registration.descriptor.clone())
        },
    };

    let action = match &registration.payload {
        RegistrationPayload::Table {
            table_type,
            query,
            incremental_query,
            pre_ops,
            post_ops,
            incremental_where,
            protected,
            unique_key,
            assertions: _,
            bigquery,
        } => Action::Table(Table {
            header,
            table_type: *table_type,
            query: resolver.text(idx, query),
            incremental_query: incremental_query.as_deref().map(|q| resolver.text(idx, q)),
            pre_ops: resolver.all(idx, pre_ops),
            post_ops: resolver.all(idx, post_ops),
            incremental_where: incremental_where.as_deref().map(|w| resolver.text(idx, w)),
            protected: *protected,
            unique_key: unique_key.clone(),
            bigquery: bigquery.clone(),
        }),
        RegistrationPayload::Operation {
            queries,
            has_output,
        } => Action::Operation(Operation {
            header,
            queries: resolver.all(idx, queries),
            has_output: *has_output,
        }),
        RegistrationPayload::Assertion { query } => Action::Assertion(Assertion {
            header,
            query: resolver.text(idx, query),
            parent_action: entry.parent.map(|p| entries[p].runtime.clone()),
        }),
        RegistrationPayload::Declaration => Action::Declaration(Declaration {
            header: ActionHeader {
                tags: Vec::new(),
                disabled: false,
                ..header
            },
        }),
        RegistrationPayload::Notebook { contents } => Action::Notebook(Notebook {
            header,
            notebook_contents: contents.clone(),
        }),
    };
    (action, resolver.errors)
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
