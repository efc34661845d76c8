use super::{
    Criterion, DatePart, Dialect, Field, FunctionCall, Join, Literal, Order, OrderBy, Query,
    QueryMode, TableRef, Term,
};

/// Rendering state shared by every node of one query.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub dialect: Dialect,
    pub table: &'a TableRef,
    /// Qualify every column with its table
    pub qualify: bool,
}

impl RenderContext<'_> {
    fn ident(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }
}

/// Convert an AST node to SQL text
pub trait ToSql {
    fn to_sql(&self, ctx: &RenderContext<'_>) -> String;
}

impl ToSql for Literal {
    fn to_sql(&self, ctx: &RenderContext<'_>) -> String {
        match self {
            Literal::Null => "NULL".to_string(),
            Literal::Bool(b) => b.to_string(),
            Literal::Int(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::Str(s) => ctx.dialect.quote_string(s),
        }
    }
}

impl ToSql for Field {
    fn to_sql(&self, ctx: &RenderContext<'_>) -> String {
        if ctx.qualify || &self.table != ctx.table {
            format!(
                "{}.{}",
                ctx.ident(self.table.table_name()),
                ctx.ident(&self.name)
            )
        } else {
            ctx.ident(&self.name)
        }
    }
}

impl ToSql for FunctionCall {
    fn to_sql(&self, ctx: &RenderContext<'_>) -> String {
        if let [Term::DatePart(part), term] = self.args.as_slice() {
            return extract_sql(*part, term, ctx);
        }
        let args: Vec<String> = self.args.iter().map(|a| a.to_sql(ctx)).collect();
        format!("{}({})", self.name, args.join(","))
    }
}

fn extract_sql(part: DatePart, term: &Term, ctx: &RenderContext<'_>) -> String {
    let term = term.to_sql(ctx);
    match ctx.dialect {
        Dialect::Sqlite if part == DatePart::Quarter => {
            format!("((CAST(STRFTIME('%m',{term}) AS INTEGER)+2)/3)")
        }
        Dialect::Sqlite => format!(
            "CAST(STRFTIME('{}',{term}) AS INTEGER)",
            part.strftime_format()
        ),
        Dialect::MariaDb | Dialect::Postgres => {
            format!("EXTRACT({} FROM {term})", part.keyword())
        }
    }
}

impl ToSql for Term {
    fn to_sql(&self, ctx: &RenderContext<'_>) -> String {
        match self {
            Term::Field(field) => field.to_sql(ctx),
            Term::Star(Some(table)) if ctx.qualify || table != ctx.table => {
                format!("{}.*", ctx.ident(table.table_name()))
            }
            Term::Star(_) => "*".to_string(),
            Term::Literal(lit) => lit.to_sql(ctx),
            Term::Tuple(items) => {
                let items: Vec<String> = items.iter().map(|t| t.to_sql(ctx)).collect();
                format!("({})", items.join(","))
            }
            Term::Position(n) => n.to_string(),
            Term::Function(call) => call.to_sql(ctx),
            Term::Binary { left, op, right } => {
                format!("{}{}{}", left.to_sql(ctx), op.to_sql(), right.to_sql(ctx))
            }
            Term::DatePart(part) => part.keyword().to_string(),
            Term::Criterion(criterion) => criterion.to_sql(ctx),
        }
    }
}

/// Select-list item: the term plus its quoted alias, if any
fn select_item_sql(term: &Term, ctx: &RenderContext<'_>) -> String {
    let alias = match term {
        Term::Field(Field { alias, .. }) | Term::Function(FunctionCall { alias, .. }) => {
            alias.as_deref()
        }
        _ => None,
    };
    match alias {
        Some(alias) => format!("{} {}", term.to_sql(ctx), ctx.ident(alias)),
        None => term.to_sql(ctx),
    }
}

fn join_terms(terms: &[Term], ctx: &RenderContext<'_>) -> String {
    terms
        .iter()
        .map(|t| t.to_sql(ctx))
        .collect::<Vec<_>>()
        .join(",")
}

impl Criterion {
    /// Render as an operand of `connective`; groups with another connective get parentheses
    fn nested_sql(&self, connective: &str, ctx: &RenderContext<'_>) -> String {
        match self {
            Criterion::All(items) if connective == "AND" => render_group(items, "AND", ctx),
            Criterion::Any(items) if connective == "OR" => render_group(items, "OR", ctx),
            Criterion::All(items) if items.len() > 1 => {
                format!("({})", render_group(items, "AND", ctx))
            }
            Criterion::Any(items) if items.len() > 1 => {
                format!("({})", render_group(items, "OR", ctx))
            }
            Criterion::Raw(sql) => format!("({sql})"),
            other => other.to_sql(ctx),
        }
    }
}

fn render_group(items: &[Criterion], connective: &str, ctx: &RenderContext<'_>) -> String {
    items
        .iter()
        .map(|c| c.nested_sql(connective, ctx))
        .collect::<Vec<_>>()
        .join(&format!(" {connective} "))
}

impl ToSql for Criterion {
    fn to_sql(&self, ctx: &RenderContext<'_>) -> String {
        match self {
            Criterion::Compare { left, op, right } => {
                format!("{}{}{}", left.to_sql(ctx), op.to_sql(), right.to_sql(ctx))
            }
            Criterion::In {
                term,
                values,
                negated,
            } => {
                let keyword = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", term.to_sql(ctx), keyword, join_terms(values, ctx))
            }
            Criterion::IsNull { term, negated } => {
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {}", term.to_sql(ctx), keyword)
            }
            Criterion::Like {
                term,
                pattern,
                negated,
            } => {
                let keyword = if *negated { "NOT LIKE" } else { "LIKE" };
                format!("{} {} {}", term.to_sql(ctx), keyword, pattern.to_sql(ctx))
            }
            Criterion::Regex { term, pattern } => format!(
                "{} {} {}",
                term.to_sql(ctx),
                ctx.dialect.regex_operator(),
                pattern.to_sql(ctx)
            ),
            Criterion::Between { term, low, high } => format!(
                "{} BETWEEN {} AND {}",
                term.to_sql(ctx),
                low.to_sql(ctx),
                high.to_sql(ctx)
            ),
            Criterion::All(items) => render_group(items, "AND", ctx),
            Criterion::Any(items) => render_group(items, "OR", ctx),
            Criterion::Not(inner) => format!("NOT ({})", inner.to_sql(ctx)),
            Criterion::Raw(sql) => sql.clone(),
        }
    }
}

impl ToSql for Join {
    fn to_sql(&self, ctx: &RenderContext<'_>) -> String {
        format!(
            "LEFT JOIN {} ON {}",
            ctx.ident(self.table.table_name()),
            self.on.to_sql(ctx)
        )
    }
}

impl ToSql for OrderBy {
    fn to_sql(&self, ctx: &RenderContext<'_>) -> String {
        let direction = match self.order {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        };
        format!("{} {}", self.term.to_sql(ctx), direction)
    }
}

impl Query {
    pub fn to_sql(&self) -> String {
        let table = self.table();
        let ctx = RenderContext {
            dialect: self.dialect(),
            table,
            qualify: !self.joins().is_empty(),
        };
        let mut sql = String::new();

        match self.mode() {
            QueryMode::Select => {
                sql.push_str("SELECT ");
                if self.is_distinct() {
                    sql.push_str("DISTINCT ");
                }
                let items: Vec<String> = self
                    .selects()
                    .iter()
                    .map(|t| select_item_sql(t, &ctx))
                    .collect();
                sql.push_str(&items.join(","));
                sql.push_str(" FROM ");
                sql.push_str(&ctx.ident(table.table_name()));
                for join in self.joins() {
                    sql.push(' ');
                    sql.push_str(&join.to_sql(&ctx));
                }
            }
            QueryMode::Update => {
                sql.push_str("UPDATE ");
                sql.push_str(&ctx.ident(table.table_name()));
                for join in self.joins() {
                    sql.push(' ');
                    sql.push_str(&join.to_sql(&ctx));
                }
                if !self.parts.sets.is_empty() {
                    let sets: Vec<String> = self
                        .parts
                        .sets
                        .iter()
                        .map(|(field, value)| {
                            format!("{}={}", field.to_sql(&ctx), value.to_sql(&ctx))
                        })
                        .collect();
                    sql.push_str(" SET ");
                    sql.push_str(&sets.join(","));
                }
            }
            QueryMode::Insert => {
                sql.push_str("INSERT INTO ");
                sql.push_str(&ctx.ident(table.table_name()));
                if !self.parts.columns.is_empty() {
                    let columns: Vec<String> =
                        self.parts.columns.iter().map(|c| ctx.ident(&c.name)).collect();
                    sql.push_str(&format!(" ({})", columns.join(",")));
                }
                if !self.parts.rows.is_empty() {
                    let rows: Vec<String> = self
                        .parts
                        .rows
                        .iter()
                        .map(|row| format!("({})", join_terms(row, &ctx)))
                        .collect();
                    sql.push_str(" VALUES ");
                    sql.push_str(&rows.join(","));
                }
                return sql;
            }
            QueryMode::Delete => {
                sql.push_str("DELETE FROM ");
                sql.push_str(&ctx.ident(table.table_name()));
            }
        }

        if !self.wheres().is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&render_group(self.wheres(), "AND", &ctx));
        }

        if !self.group_bys().is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&join_terms(self.group_bys(), &ctx));
        }

        if !self.order_bys().is_empty() {
            let orders: Vec<String> = self.order_bys().iter().map(|o| o.to_sql(&ctx)).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(","));
        }

        if let Some(limit) = self.limit_value() {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset_value() {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        if let Some(lock) = self.lock() {
            if ctx.dialect.supports_row_locking() {
                sql.push_str(" FOR UPDATE");
                if lock.nowait {
                    sql.push_str(" NOWAIT");
                } else if lock.skip_locked {
                    sql.push_str(" SKIP LOCKED");
                }
            }
        }

        sql
    }
}
