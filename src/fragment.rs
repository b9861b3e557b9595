use rust_decimal::Decimal;

use crate::schema::SchemaSnapshot;

/// Marker the merger substitutes with the upstream cumulative query when it
/// applies an [`Fragment::Override`].
pub const UPSTREAM_SLOT: &str = "{{upstream}}";

/// Alias the merger binds the upstream query to when a fragment needs it
/// nested. [`Fragment::WrapRequired`] text selects from this name.
pub const WRAP_ALIAS: &str = "__src";

/// Name of the synthetic rank column used by deduplication. Projected back
/// out before the result reaches the user.
pub const RANK_COLUMN: &str = "__seq";

/// CTE name a raw user query may select the upstream result from.
pub const PRIOR_NAME: &str = "prior";

/// Which top-level clause a [`Fragment::Clause`] contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Where,
    OrderBy,
}

impl ClauseKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            ClauseKind::Where => "WHERE",
            ClauseKind::OrderBy => "ORDER BY",
        }
    }
}

/// The partial query-language effect contributed by a single cell.
///
/// This is the algebra the merger operates on: a fragment declares *how* it
/// may combine with an arbitrary upstream query instead of leaving that to
/// ad hoc string surgery at each call site.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// A clause appendable to a simple SELECT (or replacing a same-kind
    /// clause already present at the top level).
    Clause { kind: ClauseKind, text: String },

    /// A full SELECT over the upstream query nested as [`WRAP_ALIAS`].
    /// Safe against any upstream shape, however complex.
    WrapRequired { select: String },

    /// A full replacement for the cumulative query. [`UPSTREAM_SLOT`] inside
    /// the template marks where the upstream text is embedded.
    Override { template: String },
}

/// Sort direction for a sort cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// Comparison a filter cell applies to its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Substring match, rendered as LIKE '%value%'
    Contains,
    IsNull,
    IsNotNull,
}

impl FilterOp {
    fn operator(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::Contains => "LIKE",
            FilterOp::IsNull => "IS NULL",
            FilterOp::IsNotNull => "IS NOT NULL",
        }
    }
}

/// A literal a filter cell compares against.
///
/// Numbers are carried as [`Decimal`] so `3.10` typed by the user lands in
/// the SQL text as `3.10`, not `3.1000000000000001`.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(Decimal),
    Text(String),
    Boolean(bool),
    Null,
}

/// Aggregate applied by a pivot cell to its value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    pub fn keyword(&self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Count => "count",
            Aggregate::Avg => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }
}

/// What a deduplicate cell partitions by.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupeKey {
    /// Keep one row per distinct full-row value (the "Full Rows" selection).
    FullRows,
    /// Keep the first row per distinct value of one column.
    Column(String),
}

/// Kind-specific parameters of one pipeline cell.
///
/// The display kinds (`TableView`, `Download`, `Chart`, `Assistant`,
/// `ScriptQuery`) contribute nothing to the cumulative query; they exist so
/// the pipeline can hold them in sequence like any other cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellParams {
    /// The data-source cell anchoring the pipeline at index 0.
    Source { table: String },
    Filter {
        column: String,
        op: FilterOp,
        value: FilterValue,
    },
    Sort {
        column: String,
        direction: SortDirection,
    },
    Deduplicate { key: DedupeKey },
    Pivot {
        on: String,
        value: String,
        aggregate: Aggregate,
        group_by: Vec<String>,
    },
    DeriveColumn { name: String, expression: String },
    DropColumns { columns: Vec<String> },
    RawQuery { text: String },
    TableView,
    Download,
    Chart,
    Assistant,
    ScriptQuery,
}

impl CellParams {
    /// Short name used in error messages and CLI output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CellParams::Source { .. } => "source",
            CellParams::Filter { .. } => "filter",
            CellParams::Sort { .. } => "sort",
            CellParams::Deduplicate { .. } => "deduplicate",
            CellParams::Pivot { .. } => "pivot",
            CellParams::DeriveColumn { .. } => "derive",
            CellParams::DropColumns { .. } => "drop-columns",
            CellParams::RawQuery { .. } => "raw-query",
            CellParams::TableView => "table",
            CellParams::Download => "download",
            CellParams::Chart => "chart",
            CellParams::Assistant => "assistant",
            CellParams::ScriptQuery => "script",
        }
    }

    /// Whether the generator for this kind needs the upstream column set.
    pub fn needs_schema(&self) -> bool {
        matches!(
            self,
            CellParams::Deduplicate { .. } | CellParams::DropColumns { .. }
        )
    }

    pub fn is_source(&self) -> bool {
        matches!(self, CellParams::Source { .. })
    }
}

/// Errors fragment generation can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentError {
    /// A referenced column is no longer present in the upstream schema
    /// (an earlier drop-columns cell removed it, or a pivot reshaped it).
    SchemaMismatch { column: String },

    /// A user-supplied name is not a legal bare identifier.
    InvalidIdentifier(String),

    /// A required parameter is empty.
    EmptyParameter(&'static str),

    /// The generator needs the upstream column set but none was supplied.
    SchemaUnavailable,
}

impl std::fmt::Display for FragmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FragmentError::SchemaMismatch { column } => {
                write!(f, "column '{}' is not present in the upstream result", column)
            }
            FragmentError::InvalidIdentifier(name) => {
                write!(f, "'{}' is not a valid column identifier", name)
            }
            FragmentError::EmptyParameter(what) => write!(f, "missing {}", what),
            FragmentError::SchemaUnavailable => {
                write!(f, "upstream schema is required but not available")
            }
        }
    }
}

impl std::error::Error for FragmentError {}

/// Quote an identifier for the engine's SQL dialect.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a text literal.
fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn render_filter_value(value: &FilterValue) -> String {
    match value {
        FilterValue::Number(d) => d.to_string(),
        FilterValue::Text(s) => quote_text(s),
        FilterValue::Boolean(b) => b.to_string(),
        FilterValue::Null => "NULL".to_string(),
    }
}

fn require_nonempty(text: &str, what: &'static str) -> Result<(), FragmentError> {
    if text.trim().is_empty() {
        Err(FragmentError::EmptyParameter(what))
    } else {
        Ok(())
    }
}

fn valid_identifier(name: &str) -> bool {
    let re = regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    re.is_match(name)
}

fn require_schema<'a>(
    schema: Option<&'a SchemaSnapshot>,
) -> Result<&'a SchemaSnapshot, FragmentError> {
    schema.ok_or(FragmentError::SchemaUnavailable)
}

/// Build the fragment for one cell.
///
/// Pure: the same parameters and snapshot always produce the same fragment.
/// `schema` is only consulted by kinds for which
/// [`CellParams::needs_schema`] is true; passing `None` to the others is
/// fine.
///
/// # Examples
///
/// ```
/// use cellpipe::fragment::{generate, CellParams, Fragment, SortDirection};
///
/// let params = CellParams::Sort {
///     column: "price".to_string(),
///     direction: SortDirection::Descending,
/// };
/// let fragment = generate(&params, None).unwrap();
/// assert!(matches!(fragment, Fragment::Clause { .. }));
/// ```
pub fn generate(
    params: &CellParams,
    schema: Option<&SchemaSnapshot>,
) -> Result<Fragment, FragmentError> {
    match params {
        CellParams::Source { table } => {
            require_nonempty(table, "source table name")?;
            Ok(Fragment::Override {
                template: format!("SELECT * FROM {}", quote_ident(table)),
            })
        }

        CellParams::Filter { column, op, value } => {
            require_nonempty(column, "filter column")?;
            let text = match op {
                FilterOp::IsNull | FilterOp::IsNotNull => {
                    format!("{} {}", quote_ident(column), op.operator())
                }
                FilterOp::Contains => {
                    let needle = match value {
                        FilterValue::Text(s) => s.clone(),
                        other => render_filter_value(other),
                    };
                    format!(
                        "{} LIKE {}",
                        quote_ident(column),
                        quote_text(&format!("%{}%", needle))
                    )
                }
                _ => format!(
                    "{} {} {}",
                    quote_ident(column),
                    op.operator(),
                    render_filter_value(value)
                ),
            };
            Ok(Fragment::Clause {
                kind: ClauseKind::Where,
                text,
            })
        }

        CellParams::Sort { column, direction } => {
            require_nonempty(column, "sort column")?;
            Ok(Fragment::Clause {
                kind: ClauseKind::OrderBy,
                text: format!("{} {}", quote_ident(column), direction.keyword()),
            })
        }

        CellParams::Deduplicate { key } => {
            let schema = require_schema(schema)?;
            let partition = match key {
                DedupeKey::FullRows => {
                    if schema.is_empty() {
                        return Err(FragmentError::EmptyParameter("upstream columns"));
                    }
                    schema
                        .columns()
                        .iter()
                        .map(|c| quote_ident(c))
                        .collect::<Vec<_>>()
                        .join(", ")
                }
                DedupeKey::Column(column) => {
                    require_nonempty(column, "deduplicate column")?;
                    if !schema.contains(column) {
                        return Err(FragmentError::SchemaMismatch {
                            column: column.clone(),
                        });
                    }
                    quote_ident(column)
                }
            };
            // No ORDER BY in the window: the engine's natural scan order
            // decides which row of each partition survives, matching
            // keep-first-occurrence semantics. Valid (and empty) on an
            // empty upstream.
            let select = format!(
                "SELECT * EXCLUDE ({rank}) FROM (SELECT *, ROW_NUMBER() OVER (PARTITION BY {partition}) AS {rank} FROM {alias}) WHERE {rank} = 1",
                rank = quote_ident(RANK_COLUMN),
                partition = partition,
                alias = WRAP_ALIAS,
            );
            Ok(Fragment::WrapRequired { select })
        }

        CellParams::Pivot {
            on,
            value,
            aggregate,
            group_by,
        } => {
            require_nonempty(on, "pivot column")?;
            require_nonempty(value, "pivot value column")?;
            let mut template = format!(
                "PIVOT ({}) ON {} USING {}({})",
                UPSTREAM_SLOT,
                quote_ident(on),
                aggregate.keyword(),
                quote_ident(value)
            );
            if !group_by.is_empty() {
                let cols = group_by
                    .iter()
                    .map(|c| quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                template.push_str(&format!(" GROUP BY {}", cols));
            }
            Ok(Fragment::Override { template })
        }

        CellParams::DeriveColumn { name, expression } => {
            require_nonempty(name, "derived column name")?;
            require_nonempty(expression, "derived column expression")?;
            if !valid_identifier(name) {
                return Err(FragmentError::InvalidIdentifier(name.clone()));
            }
            Ok(Fragment::WrapRequired {
                select: format!(
                    "SELECT *, ({}) AS {} FROM {}",
                    expression.trim(),
                    quote_ident(name),
                    WRAP_ALIAS
                ),
            })
        }

        CellParams::DropColumns { columns } => {
            let schema = require_schema(schema)?;
            if columns.is_empty() {
                return Err(FragmentError::EmptyParameter("columns to drop"));
            }
            for column in columns {
                if !schema.contains(column) {
                    return Err(FragmentError::SchemaMismatch {
                        column: column.clone(),
                    });
                }
            }
            let excluded = columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            Ok(Fragment::WrapRequired {
                select: format!("SELECT * EXCLUDE ({}) FROM {}", excluded, WRAP_ALIAS),
            })
        }

        CellParams::RawQuery { text } => {
            require_nonempty(text, "query text")?;
            Ok(Fragment::Override {
                template: format!(
                    "WITH {} AS ({}) {}",
                    PRIOR_NAME,
                    UPSTREAM_SLOT,
                    text.trim()
                ),
            })
        }

        // Display cells pass the upstream query through untouched.
        CellParams::TableView
        | CellParams::Download
        | CellParams::Chart
        | CellParams::Assistant
        | CellParams::ScriptQuery => Ok(Fragment::Override {
            template: UPSTREAM_SLOT.to_string(),
        }),
    }
}

/// Row accounting a deduplicate cell reports after execution.
///
/// `current_rows + duplicates_removed == table_rows` holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupeReport {
    /// Rows in the upstream result.
    pub table_rows: usize,
    /// Rows surviving deduplication.
    pub current_rows: usize,
    /// Rows removed.
    pub duplicates_removed: usize,
}

impl DedupeReport {
    pub fn new(table_rows: usize, current_rows: usize) -> Self {
        DedupeReport {
            table_rows,
            current_rows,
            duplicates_removed: table_rows.saturating_sub(current_rows),
        }
    }
}
