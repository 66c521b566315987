//! The analysis pipeline driver.
//!
//! `analyze` is a pure function of its request: split each source into
//! statement chunks, parse chunk by chunk (a failed chunk becomes a
//! `PARSE_ERROR` issue, not a failed call), resolve and extract lineage per
//! statement, then unify everything into the global graph. All mutable
//! state lives on the per-invocation [`Analyzer`]; concurrent calls share
//! nothing.

mod complexity;
mod context;
mod ddl;
mod expression;
mod global;
mod helpers;
mod query;
mod schema_registry;
mod select;
mod statements;
mod tags;
mod tracker;


use crate::parser::parse_sql_with_dialect;
use crate::position::line_column_to_offset;
use crate::splitter::split_statements_named;
use crate::types::{
    issue_codes, AnalysisOptions, AnalyzeRequest, AnalyzeResult, ComplexityWeights, Dialect,
    Issue, Span, StatementLineage,
};
use context::StatementContext;
use schema_registry::SchemaRegistry;
use select::QueryWalker;
use sqlparser::ast::Query;
use tracker::RelationTracker;

/// Analyzes one request. Never fails as a function call: all failures
/// surface as issues inside the result.
pub fn analyze(request: &AnalyzeRequest) -> AnalyzeResult {
    analyze_many(std::slice::from_ref(request))
}

/// Analyzes several requests into one result. Statements keep their source
/// names; statement indices and the global lineage span all inputs. The
/// schema and options of the first request that supplies them apply to the
/// whole batch; each request's sources parse with its own dialect.
pub fn analyze_many(requests: &[AnalyzeRequest]) -> AnalyzeResult {
    let schema_input = requests.iter().find_map(|r| r.schema.as_ref());
    let options = requests.iter().find_map(|r| r.options.as_ref());
    let default_dialect = requests.first().map(|r| r.dialect).unwrap_or_default();

    let (schema, schema_issues) = SchemaRegistry::new(schema_input, default_dialect);
    let opts = EffectiveOptions::resolve(options, schema_input.is_some());

    let mut analyzer = Analyzer {
        requests,
        opts,
        schema,
        tracker: RelationTracker::new(),
        issues: schema_issues,
        statements: Vec::new(),
        current_chunk: None,
    };
    analyzer.run();
    analyzer.build_result()
}

/// Request options with defaults applied.
pub(crate) struct EffectiveOptions {
    pub(crate) resolve_wildcards: bool,
    pub(crate) propagate_tags: bool,
    pub(crate) collect_filters: bool,
    pub(crate) unify_columns: bool,
    pub(crate) complexity_weights: ComplexityWeights,
}

impl EffectiveOptions {
    fn resolve(options: Option<&AnalysisOptions>, has_schema: bool) -> Self {
        let get = |f: fn(&AnalysisOptions) -> Option<bool>, default: bool| {
            options.and_then(f).unwrap_or(default)
        };
        Self {
            resolve_wildcards: get(|o| o.resolve_wildcards, has_schema),
            propagate_tags: get(|o| o.propagate_tags, true),
            collect_filters: get(|o| o.collect_filters, true),
            unify_columns: get(|o| o.unify_columns, false),
            complexity_weights: options
                .and_then(|o| o.complexity_weights)
                .unwrap_or_default(),
        }
    }
}

/// The statement chunk currently being analyzed; anchors span searches.
struct CurrentChunk {
    text: String,
    base: usize,
    source_name: Option<String>,
}

/// Per-invocation analysis state.
pub(crate) struct Analyzer<'a> {
    requests: &'a [AnalyzeRequest],
    pub(crate) opts: EffectiveOptions,
    pub(crate) schema: SchemaRegistry,
    pub(crate) tracker: RelationTracker,
    issues: Vec<Issue>,
    statements: Vec<StatementLineage>,
    current_chunk: Option<CurrentChunk>,
}

impl<'a> Analyzer<'a> {
    fn run(&mut self) {
        let mut index = 0usize;

        let sources: Vec<(String, Option<String>, Dialect)> = self
            .requests
            .iter()
            .flat_map(|request| {
                let mut sources = Vec::new();
                if let Some(files) = &request.files {
                    for file in files {
                        sources.push((
                            file.content.clone(),
                            Some(file.name.clone()),
                            request.dialect,
                        ));
                    }
                }
                if !request.sql.trim().is_empty() {
                    sources.push((
                        request.sql.clone(),
                        request.source_name.clone(),
                        request.dialect,
                    ));
                }
                sources
            })
            .collect();

        for (sql, source_name, dialect) in sources {
            let split = split_statements_named(&sql, dialect, source_name.as_deref());
            self.issues.extend(split.issues);

            for chunk in split.statements {
                self.current_chunk = Some(CurrentChunk {
                    text: chunk.text.clone(),
                    base: chunk.span.start,
                    source_name: chunk.source_name.clone(),
                });

                match parse_sql_with_dialect(&chunk.text, dialect) {
                    Ok(parsed) => {
                        if parsed.is_empty() {
                            continue;
                        }
                        for statement in &parsed {
                            let lineage = self.analyze_statement(
                                index,
                                statement,
                                chunk.source_name.clone(),
                                chunk.span,
                            );
                            self.statements.push(lineage);
                            index += 1;
                        }
                    }
                    Err(err) => {
                        // The span points at the offending token when the
                        // parser reported a position, else at the chunk.
                        let span = err
                            .position
                            .and_then(|p| line_column_to_offset(&chunk.text, p.line, p.column))
                            .map(|offset| {
                                Span::new(offset, (offset + 1).min(chunk.text.len()))
                                    .offset(chunk.span.start)
                            })
                            .unwrap_or(chunk.span);
                        self.push_issue(
                            Issue::error(issue_codes::PARSE_ERROR, err.to_string())
                                .with_statement(index)
                                .with_span(span),
                        );
                        // The failed chunk still occupies a statement slot.
                        index += 1;
                    }
                }
            }
        }

        self.current_chunk = None;
    }

    /// Records an issue, stamping the current source name when absent.
    pub(crate) fn push_issue(&mut self, mut issue: Issue) {
        if issue.source_name.is_none() {
            if let Some(chunk) = &self.current_chunk {
                issue.source_name = chunk.source_name.clone();
            }
        }
        self.issues.push(issue);
    }

    /// Word-boundary search for an identifier inside the current statement;
    /// spans come back anchored to the full source buffer.
    pub(crate) fn find_span(&self, identifier: &str) -> Option<Span> {
        let chunk = self.current_chunk.as_ref()?;
        helpers::find_identifier_span(&chunk.text, identifier, 0).map(|s| s.offset(chunk.base))
    }

    /// Case-insensitive exact-text search inside the current statement.
    pub(crate) fn find_exact_span(&self, text: &str) -> Option<Span> {
        let chunk = self.current_chunk.as_ref()?;
        let lower = chunk.text.to_lowercase();
        // Folding can shift byte offsets for non-ASCII text; bail out then.
        if lower.len() != chunk.text.len() {
            return None;
        }
        lower
            .find(&text.to_lowercase())
            .map(|pos| Span::new(pos, pos + text.len()).offset(chunk.base))
    }

    /// Validates a column against the schema index, recording
    /// `UNKNOWN_COLUMN` with a span when it is missing.
    pub(crate) fn validate_column(
        &mut self,
        ctx: &StatementContext,
        canonical: &str,
        column: &str,
    ) {
        if let Some(mut issue) = self
            .schema
            .validate_column(canonical, column, ctx.statement_index)
        {
            if let Some(span) = self.find_span(column) {
                issue = issue.with_span(span);
            }
            self.push_issue(issue);
        }
    }

    /// Walks a nested query (subquery in an expression) against the context.
    pub(crate) fn analyze_query(
        &mut self,
        ctx: &mut StatementContext,
        query: &Query,
        target: Option<&str>,
    ) {
        let mut walker = QueryWalker::new(self, ctx, target.map(|s| s.to_string()));
        walker.walk_query(query);
    }
}
