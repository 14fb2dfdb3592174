//! Fluent assembly of SELECT, INSERT, REPLACE, UPDATE and DELETE statements.
//!
//! Every setter stores an already-escaped SQL fragment in a clause slot and
//! returns the builder for chaining. Nothing here fails: an incomplete
//! builder yields an empty string from the matching `get_*_query()` call,
//! so callers can assemble first and inspect the SQL afterwards.
//!
//! Conditions on ON, WHERE and HAVING follow one convention. The first
//! condition of a clause (or the first one inside a group) is written bare,
//! the first condition after a JOIN is prefixed with `ON`, and every other
//! condition is prefixed with the pending connector: `AND` unless
//! [`sql_or`](DmlQueryBuilder::sql_or) was called right before it.

use crate::escaper::{QueryEscaper, INDEXED_BY};

const SELECT_MODES: &[&str] = &["ALL", "DISTINCT"];
const CONFLICT_MODES: &[&str] = &[
    "OR ROLLBACK",
    "OR ABORT",
    "OR REPLACE",
    "OR FAIL",
    "OR IGNORE",
];
/// SQLite's DELETE takes no modifiers.
const DELETE_MODES: &[&str] = &[];

const DISTINCT: &str = "DISTINCT";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Slot {
    On,
    Where,
    Having,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum JoinState {
    #[default]
    Idle,
    /// A JOIN was appended and has no ON/USING yet.
    Pending,
    /// The last join ended in a USING list that may still grow.
    Using,
}

/// Accumulated modifier keywords in canonical form.
#[derive(Clone, Debug, Default)]
struct ModeSet(Vec<&'static str>);

impl ModeSet {
    fn insert(&mut self, mode: &str, vocabulary: &[&'static str]) {
        if let Some(keyword) = canonical_mode(mode, vocabulary) {
            if !self.0.contains(&keyword) {
                self.0.push(keyword);
            }
        }
    }

    fn render(&self) -> String {
        self.0.iter().map(|keyword| format!(" {keyword}")).collect()
    }
}

fn canonical_mode(mode: &str, vocabulary: &[&'static str]) -> Option<&'static str> {
    let normalized = mode
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    vocabulary
        .iter()
        .copied()
        .find(|keyword| *keyword == normalized)
}

fn not(negate: bool) -> &'static str {
    if negate {
        "NOT "
    } else {
        ""
    }
}

fn append_list(slot: &mut String, item: &str) {
    if !slot.is_empty() {
        slot.push_str(", ");
    }
    slot.push_str(item);
}

fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
    let columns: Vec<&str> = columns.iter().map(|column| column.as_ref()).collect();
    format!("({})", columns.join(", "))
}

/// SQL statement builder bound to a connection's escaper.
#[derive(Clone, Debug)]
pub struct DmlQueryBuilder {
    escaper: QueryEscaper,
    with: String,
    recursive: bool,
    select: String,
    select_mode: Option<&'static str>,
    from: String,
    join: String,
    join_state: JoinState,
    where_: String,
    having: String,
    connector: Option<&'static str>,
    group_by: String,
    order_by: String,
    limit: String,
    compound: String,
    into: String,
    column_names: String,
    values: String,
    select_statement: String,
    update: String,
    set: String,
    insert_mode: ModeSet,
    update_mode: ModeSet,
    delete_mode: ModeSet,
}

impl DmlQueryBuilder {
    pub(crate) fn new(escaper: QueryEscaper) -> Self {
        Self {
            escaper,
            with: String::new(),
            recursive: false,
            select: String::new(),
            select_mode: None,
            from: String::new(),
            join: String::new(),
            join_state: JoinState::Idle,
            where_: String::new(),
            having: String::new(),
            connector: None,
            group_by: String::new(),
            order_by: String::new(),
            limit: String::new(),
            compound: String::new(),
            into: String::new(),
            column_names: String::new(),
            values: String::new(),
            select_statement: String::new(),
            update: String::new(),
            set: String::new(),
            insert_mode: ModeSet::default(),
            update_mode: ModeSet::default(),
            delete_mode: ModeSet::default(),
        }
    }

    /// The escaper this builder uses for index hints.
    pub fn escaper(&self) -> &QueryEscaper {
        &self.escaper
    }

    // ── Statement assembly ──────────────────────────────────────────────

    /// `SELECT` statement, or `""` when no FROM clause was given.
    pub fn get_select_query(&self) -> String {
        if self.from.is_empty() {
            return String::new();
        }

        let mut sql = String::new();
        if !self.with.is_empty() {
            sql.push_str(if self.recursive {
                "WITH RECURSIVE "
            } else {
                "WITH "
            });
            sql.push_str(&self.with);
            sql.push(' ');
        }
        sql.push_str("SELECT ");
        if let Some(mode) = self.select_mode {
            sql.push_str(mode);
            sql.push(' ');
        }
        sql.push_str(if self.select.is_empty() {
            "*"
        } else {
            &self.select
        });
        sql.push_str(" FROM ");
        sql.push_str(&self.from);
        push_clause(&mut sql, "", &self.join);
        push_clause(&mut sql, "WHERE ", &self.where_);
        push_clause(&mut sql, "GROUP BY ", &self.group_by);
        push_clause(&mut sql, "HAVING ", &self.having);
        push_clause(&mut sql, "", &self.compound);
        push_clause(&mut sql, "ORDER BY ", &self.order_by);
        push_clause(&mut sql, "", &self.limit);
        sql
    }

    /// `INSERT` statement, or `""` when INTO or the row source is missing.
    pub fn get_insert_query(&self) -> String {
        self.insert_like("INSERT", &self.insert_mode.render())
    }

    /// `REPLACE` statement, or `""` when INTO or the row source is missing.
    pub fn get_replace_query(&self) -> String {
        self.insert_like("REPLACE", "")
    }

    /// `UPDATE` statement, or `""` when the table or SET list is missing.
    pub fn get_update_query(&self) -> String {
        if self.update.is_empty() || self.set.is_empty() {
            return String::new();
        }

        let mut sql = format!(
            "UPDATE{} {} SET {}",
            self.update_mode.render(),
            self.update,
            self.set
        );
        push_clause(&mut sql, "WHERE ", &self.where_);
        push_clause(&mut sql, "ORDER BY ", &self.order_by);
        push_clause(&mut sql, "", &self.limit);
        sql
    }

    /// `DELETE` statement, or `""` when no FROM clause was given.
    pub fn get_delete_query(&self) -> String {
        if self.from.is_empty() {
            return String::new();
        }

        let mut sql = format!("DELETE{} FROM {}", self.delete_mode.render(), self.from);
        push_clause(&mut sql, "WHERE ", &self.where_);
        push_clause(&mut sql, "ORDER BY ", &self.order_by);
        push_clause(&mut sql, "", &self.limit);
        sql
    }

    fn insert_like(&self, verb: &str, modes: &str) -> String {
        if self.into.is_empty() {
            return String::new();
        }

        let source = if !self.values.is_empty() {
            format!("VALUES {}", self.values)
        } else if !self.select_statement.is_empty() {
            self.select_statement.clone()
        } else {
            return String::new();
        };

        let mut sql = format!("{verb}{modes} INTO {}", self.into);
        push_clause(&mut sql, "", &self.column_names);
        sql.push(' ');
        sql.push_str(&source);
        sql
    }

    // ── Modes ───────────────────────────────────────────────────────────

    /// `ALL` or `DISTINCT`; the last recognized call wins.
    pub fn select_mode(&mut self, mode: &str) -> &mut Self {
        if let Some(keyword) = canonical_mode(mode, SELECT_MODES) {
            self.select_mode = Some(keyword);
        }
        self
    }

    /// Conflict clause such as `OR IGNORE`; unknown values are dropped.
    pub fn insert_mode(&mut self, mode: &str) -> &mut Self {
        self.insert_mode.insert(mode, CONFLICT_MODES);
        self
    }

    /// Conflict clause such as `OR REPLACE`; unknown values are dropped.
    pub fn update_mode(&mut self, mode: &str) -> &mut Self {
        self.update_mode.insert(mode, CONFLICT_MODES);
        self
    }

    /// SQLite knows no DELETE modifiers, so every value is dropped.
    pub fn delete_mode(&mut self, mode: &str) -> &mut Self {
        self.delete_mode.insert(mode, DELETE_MODES);
        self
    }

    // ── SELECT sources ──────────────────────────────────────────────────

    /// Adds a common table expression `alias(columns) AS (subquery)`.
    pub fn with<S: AsRef<str>>(&mut self, alias: &str, subquery: &str, columns: &[S]) -> &mut Self {
        let columns = if columns.is_empty() {
            String::new()
        } else {
            column_list(columns)
        };
        append_list(&mut self.with, &format!("{alias}{columns} AS ({subquery})"));
        self
    }

    /// Adds a recursive CTE `alias(columns) AS (anchor UNION [ALL] recursive)`.
    pub fn with_recursive<S: AsRef<str>>(
        &mut self,
        alias: &str,
        anchor: &str,
        recursive: &str,
        union_all: bool,
        columns: &[S],
    ) -> &mut Self {
        let union = if union_all { "UNION ALL" } else { "UNION" };
        self.recursive = true;
        self.with(alias, &format!("{anchor} {union} {recursive}"), columns)
    }

    /// Adds a result column expression.
    pub fn select(&mut self, select: &str) -> &mut Self {
        append_list(&mut self.select, select);
        self
    }

    pub fn from(&mut self, table_reference: &str) -> &mut Self {
        append_list(&mut self.from, table_reference);
        self
    }

    /// FROM with an `INDEXED BY` hint; no hint is added for an empty list.
    pub fn from_indexed<S: AsRef<str>>(&mut self, table_reference: &str, indices: &[S]) -> &mut Self {
        let table = self.hinted(table_reference, indices);
        self.from(&table)
    }

    /// `[<type> ]JOIN table`; `join_type` may be `LEFT`, `CROSS`, `NATURAL LEFT OUTER`, ...
    pub fn join(&mut self, table_reference: &str, join_type: &str) -> &mut Self {
        let join_type = join_type.trim().to_ascii_uppercase();
        let join_type = join_type.strip_suffix("JOIN").unwrap_or(&join_type).trim();
        if !self.join.is_empty() {
            self.join.push(' ');
        }
        if !join_type.is_empty() {
            self.join.push_str(join_type);
            self.join.push(' ');
        }
        self.join.push_str("JOIN ");
        self.join.push_str(table_reference);
        self.join_state = JoinState::Pending;
        self
    }

    pub fn join_indexed<S: AsRef<str>>(
        &mut self,
        table_reference: &str,
        join_type: &str,
        indices: &[S],
    ) -> &mut Self {
        let table = self.hinted(table_reference, indices);
        self.join(&table, join_type)
    }

    /// `USING (column)` for the last join; repeated calls extend the list.
    pub fn using(&mut self, column: &str) -> &mut Self {
        match self.join_state {
            JoinState::Pending => {
                self.join.push_str(&format!(" USING ({column})"));
                self.join_state = JoinState::Using;
            }
            JoinState::Using => {
                self.join.pop();
                self.join.push_str(&format!(", {column})"));
            }
            JoinState::Idle => {}
        }
        self
    }

    fn hinted<S: AsRef<str>>(&self, table_reference: &str, indices: &[S]) -> String {
        match self.escaper.index_hint(INDEXED_BY, indices) {
            Some(hint) => format!("{table_reference} {hint}"),
            None => table_reference.to_owned(),
        }
    }

    // ── Connectors and groups ───────────────────────────────────────────

    /// Joins the next condition with `OR`.
    pub fn sql_or(&mut self) -> &mut Self {
        self.connector = Some("OR");
        self
    }

    /// Joins the next condition with `AND` (the default).
    pub fn sql_and(&mut self) -> &mut Self {
        self.connector = Some("AND");
        self
    }

    pub fn start_on_group(&mut self) -> &mut Self {
        self.open_group(Slot::On)
    }

    pub fn end_on_group(&mut self) -> &mut Self {
        if !self.join.is_empty() && self.join_state != JoinState::Using {
            self.join.push(')');
        }
        self
    }

    pub fn start_where_group(&mut self) -> &mut Self {
        self.open_group(Slot::Where)
    }

    pub fn end_where_group(&mut self) -> &mut Self {
        self.where_.push(')');
        self
    }

    pub fn start_having_group(&mut self) -> &mut Self {
        self.open_group(Slot::Having)
    }

    pub fn end_having_group(&mut self) -> &mut Self {
        self.having.push(')');
        self
    }

    fn open_group(&mut self, slot: Slot) -> &mut Self {
        self.condition(slot, "(".to_owned())
    }

    fn condition(&mut self, slot: Slot, condition: String) -> &mut Self {
        let connector = self.connector.take().unwrap_or("AND");
        let clause = match slot {
            Slot::On => {
                if self.join_state == JoinState::Pending {
                    self.join_state = JoinState::Idle;
                    self.join.push_str(" ON ");
                    self.join.push_str(&condition);
                    return self;
                }
                // USING and ON exclude each other
                if self.join.is_empty() || self.join_state == JoinState::Using {
                    return self;
                }
                &mut self.join
            }
            Slot::Where => &mut self.where_,
            Slot::Having => &mut self.having,
        };
        if !clause.is_empty() && !clause.ends_with('(') {
            clause.push(' ');
            clause.push_str(connector);
            clause.push(' ');
        }
        clause.push_str(&condition);
        self
    }

    // ── ON conditions ───────────────────────────────────────────────────

    /// `left = right`
    pub fn on(&mut self, left: &str, right: &str) -> &mut Self {
        self.on_cmp(left, "=", right)
    }

    pub fn on_cmp(&mut self, left: &str, operator: &str, right: &str) -> &mut Self {
        self.condition(Slot::On, compare(left, operator, right))
    }

    pub fn on_like(&mut self, left: &str, right: &str, negate: bool) -> &mut Self {
        self.condition(Slot::On, like(left, right, negate))
    }

    /// `right` is a parenthesized list or subquery.
    pub fn on_in(&mut self, left: &str, right: &str, negate: bool) -> &mut Self {
        self.condition(Slot::On, within(left, right, negate))
    }

    pub fn on_between(&mut self, left: &str, lower: &str, upper: &str, negate: bool) -> &mut Self {
        self.condition(Slot::On, between(left, lower, upper, negate))
    }

    pub fn on_null(&mut self, left: &str, negate: bool) -> &mut Self {
        self.condition(Slot::On, null(left, negate))
    }

    pub fn on_regexp(&mut self, left: &str, right: &str, negate: bool) -> &mut Self {
        self.condition(Slot::On, regexp(left, right, negate))
    }

    // ── WHERE conditions ────────────────────────────────────────────────

    /// `left = right`
    pub fn where_(&mut self, left: &str, right: &str) -> &mut Self {
        self.where_cmp(left, "=", right)
    }

    pub fn where_cmp(&mut self, left: &str, operator: &str, right: &str) -> &mut Self {
        self.condition(Slot::Where, compare(left, operator, right))
    }

    pub fn where_like(&mut self, left: &str, right: &str, negate: bool) -> &mut Self {
        self.condition(Slot::Where, like(left, right, negate))
    }

    /// `right` is a parenthesized list or subquery.
    pub fn where_in(&mut self, left: &str, right: &str, negate: bool) -> &mut Self {
        self.condition(Slot::Where, within(left, right, negate))
    }

    pub fn where_between(&mut self, left: &str, lower: &str, upper: &str, negate: bool) -> &mut Self {
        self.condition(Slot::Where, between(left, lower, upper, negate))
    }

    pub fn where_null(&mut self, left: &str, negate: bool) -> &mut Self {
        self.condition(Slot::Where, null(left, negate))
    }

    pub fn where_regexp(&mut self, left: &str, right: &str, negate: bool) -> &mut Self {
        self.condition(Slot::Where, regexp(left, right, negate))
    }

    // ── HAVING conditions ───────────────────────────────────────────────

    /// `left = right`
    pub fn having(&mut self, left: &str, right: &str) -> &mut Self {
        self.having_cmp(left, "=", right)
    }

    pub fn having_cmp(&mut self, left: &str, operator: &str, right: &str) -> &mut Self {
        self.condition(Slot::Having, compare(left, operator, right))
    }

    pub fn having_like(&mut self, left: &str, right: &str, negate: bool) -> &mut Self {
        self.condition(Slot::Having, like(left, right, negate))
    }

    pub fn having_in(&mut self, left: &str, right: &str, negate: bool) -> &mut Self {
        self.condition(Slot::Having, within(left, right, negate))
    }

    pub fn having_between(
        &mut self,
        left: &str,
        lower: &str,
        upper: &str,
        negate: bool,
    ) -> &mut Self {
        self.condition(Slot::Having, between(left, lower, upper, negate))
    }

    pub fn having_null(&mut self, left: &str, negate: bool) -> &mut Self {
        self.condition(Slot::Having, null(left, negate))
    }

    pub fn having_regexp(&mut self, left: &str, right: &str, negate: bool) -> &mut Self {
        self.condition(Slot::Having, regexp(left, right, negate))
    }

    // ── Grouping, ordering, limits ──────────────────────────────────────

    /// Appends to the GROUP BY list.
    ///
    /// The `_ascending` flag mirrors [`order_by`](Self::order_by) but has no
    /// effect: GROUP BY entries are always written without a direction.
    pub fn group_by(&mut self, expr: &str, _ascending: bool) -> &mut Self {
        append_list(&mut self.group_by, expr);
        self
    }

    /// Appends `expr ASC` or `expr DESC` to the ORDER BY list.
    pub fn order_by(&mut self, expr: &str, ascending: bool) -> &mut Self {
        let direction = if ascending { "ASC" } else { "DESC" };
        append_list(&mut self.order_by, &format!("{expr} {direction}"));
        self
    }

    /// `LIMIT count[ OFFSET offset]`
    pub fn limit(&mut self, count: i64, offset: Option<i64>) -> &mut Self {
        self.limit = match offset {
            Some(offset) => format!("LIMIT {count} OFFSET {offset}"),
            None => format!("LIMIT {count}"),
        };
        self
    }

    // ── Compound operators ──────────────────────────────────────────────

    /// `UNION[ ALL| DISTINCT] subquery`; other modes are dropped.
    pub fn union(&mut self, subquery: &str, mode: &str) -> &mut Self {
        let mode = match mode {
            "ALL" | DISTINCT => Some(mode),
            _ => None,
        };
        self.compound("UNION", mode, subquery)
    }

    /// `EXCEPT[ DISTINCT] subquery`
    pub fn except(&mut self, subquery: &str, mode: &str) -> &mut Self {
        self.compound("EXCEPT", (mode == DISTINCT).then_some(DISTINCT), subquery)
    }

    /// `INTERSECT[ DISTINCT] subquery`
    pub fn intersect(&mut self, subquery: &str, mode: &str) -> &mut Self {
        self.compound("INTERSECT", (mode == DISTINCT).then_some(DISTINCT), subquery)
    }

    fn compound(&mut self, operator: &str, mode: Option<&str>, subquery: &str) -> &mut Self {
        if !self.compound.is_empty() {
            self.compound.push(' ');
        }
        self.compound.push_str(operator);
        if let Some(mode) = mode {
            self.compound.push(' ');
            self.compound.push_str(mode);
        }
        self.compound.push(' ');
        self.compound.push_str(subquery);
        self
    }

    // ── INSERT / REPLACE / UPDATE ───────────────────────────────────────

    pub fn into_table(&mut self, table_reference: &str) -> &mut Self {
        self.into = table_reference.to_owned();
        self
    }

    /// Column list for INSERT/REPLACE, written as `(a, b)`.
    pub fn column_names<S: AsRef<str>>(&mut self, columns: &[S]) -> &mut Self {
        self.column_names = if columns.is_empty() {
            String::new()
        } else {
            column_list(columns)
        };
        self
    }

    /// Appends one row of already-escaped values and drops any SELECT source.
    pub fn values<S: AsRef<str>>(&mut self, row: &[S]) -> &mut Self {
        if row.is_empty() {
            return self;
        }
        append_list(&mut self.values, &column_list(row));
        self.select_statement.clear();
        self
    }

    /// Uses a SELECT as the row source and drops any VALUES rows.
    pub fn select_statement(&mut self, sql: &str) -> &mut Self {
        self.select_statement = sql.to_owned();
        self.values.clear();
        self
    }

    pub fn update(&mut self, table_reference: &str) -> &mut Self {
        self.update = table_reference.to_owned();
        self
    }

    /// Appends `column = value` assignments.
    pub fn set<K: AsRef<str>, V: AsRef<str>>(&mut self, assignments: &[(K, V)]) -> &mut Self {
        for (column, value) in assignments {
            append_list(
                &mut self.set,
                &format!("{} = {}", column.as_ref(), value.as_ref()),
            );
        }
        self
    }
}

fn push_clause(sql: &mut String, keyword: &str, clause: &str) {
    if clause.is_empty() {
        return;
    }
    sql.push(' ');
    sql.push_str(keyword);
    sql.push_str(clause);
}

fn compare(left: &str, operator: &str, right: &str) -> String {
    format!("{left} {operator} {right}")
}

fn like(left: &str, right: &str, negate: bool) -> String {
    format!("{left} {}LIKE {right}", not(negate))
}

fn within(left: &str, right: &str, negate: bool) -> String {
    format!("{left} {}IN {right}", not(negate))
}

fn between(left: &str, lower: &str, upper: &str, negate: bool) -> String {
    format!("{left} {}BETWEEN {lower} AND {upper}", not(negate))
}

fn null(left: &str, negate: bool) -> String {
    format!("{left} IS {}NULL", not(negate))
}

fn regexp(left: &str, right: &str, negate: bool) -> String {
    format!("{left} {}REGEXP {right}", not(negate))
}
