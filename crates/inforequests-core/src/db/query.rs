//! Read-side query helpers for the inforequests store.
//!
//! Every function takes a [`Store`], issues a fixed number of statements
//! (each one counted in [`Store::read_count`]), and returns typed model
//! values. Bulk loaders take a slice of keys and group the rows by key; key
//! lists longer than [`MAX_IDS_PER_QUERY`] are read in chunks.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::{ToSql, Type};
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::str::FromStr;

use super::{MAX_IDS_PER_QUERY, Store, placeholders};
use crate::model::action::{Action, ActionDraft, ActionType};
use crate::model::branch::Branch;
use crate::model::inforequest::Inforequest;
use crate::model::mail::{Message, Recipient};
use crate::model::obligee::{Obligee, ObligeeSnapshot};

/// Stored format of calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Query options
// ---------------------------------------------------------------------------

/// Order of actions inside one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionOrder {
    /// Persisted sequence position, ascending.
    #[default]
    Position,
    /// Effective date ascending, position as tie-breaker.
    EffectiveDate,
}

impl ActionOrder {
    const fn sql_clause(self) -> &'static str {
        match self {
            Self::Position => "ORDER BY a.position ASC",
            Self::EffectiveDate => "ORDER BY a.effective_date ASC, a.position ASC",
        }
    }
}

/// Base query used by action loaders.
///
/// The default selects every action of a branch in position order. Batch
/// loaders accept an override to narrow the type set or change the order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionQuery {
    /// Restrict to these action types.
    pub types: Option<Vec<ActionType>>,
    /// Only actions with a bound email message.
    pub email_only: bool,
    pub order: ActionOrder,
}

impl ActionQuery {
    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = ActionType>) -> Self {
        self.types = Some(types.into_iter().collect());
        self
    }

    #[must_use]
    pub const fn with_email_only(mut self) -> Self {
        self.email_only = true;
        self
    }

    #[must_use]
    pub const fn ordered_by(mut self, order: ActionOrder) -> Self {
        self.order = order;
        self
    }

    /// Whether this query selects every action in position order.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.types.is_none() && !self.email_only && self.order == ActionOrder::Position
    }

    /// Extra `AND ...` conditions on table `alias`; type names bind from
    /// `?first_type_param` on.
    fn conditions(&self, alias: &str, first_type_param: usize) -> String {
        let mut sql = String::new();
        if let Some(types) = &self.types {
            let list = (first_type_param..first_type_param + types.len())
                .map(|idx| format!("?{idx}"))
                .collect::<Vec<_>>()
                .join(", ");
            if list.is_empty() {
                sql.push_str(" AND 0");
            } else {
                let _ = write!(sql, " AND {alias}.action_type IN ({list})");
            }
        }
        if self.email_only {
            let _ = write!(sql, " AND {alias}.message_id IS NOT NULL");
        }
        sql
    }

    fn type_params(&self) -> Vec<String> {
        self.types
            .iter()
            .flatten()
            .map(|t| t.as_str().to_string())
            .collect()
    }
}

/// Explicit order for bulk branch queries. Without one, no order is
/// promised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOrder {
    Pk { reverse: bool },
}

impl BranchOrder {
    const fn sql_clause(self) -> &'static str {
        match self {
            Self::Pk { reverse: false } => " ORDER BY b.branch_id ASC",
            Self::Pk { reverse: true } => " ORDER BY b.branch_id DESC",
        }
    }
}

/// Filter criteria for branch listings, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchFilter {
    pub inforequest_id: Option<i64>,
    /// Branches of any of these inforequests.
    pub inforequest_ids: Option<Vec<i64>>,
    pub obligee_id: Option<i64>,
    pub snapshot_id: Option<i64>,
    /// `Some(true)`: main branches only; `Some(false)`: advanced only.
    pub main: Option<bool>,
    /// Branches spawned by this advancement.
    pub advanced_by_id: Option<i64>,
    pub ids: Option<Vec<i64>>,
    pub order: Option<BranchOrder>,
}

/// Filter criteria for draft listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DraftFilter {
    pub inforequest_id: Option<i64>,
    pub branch_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn parsed_opt<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| {
        value.parse::<T>().map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
        })
    })
    .transpose()
}

fn parse_date(raw: &str, idx: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    parse_date(&raw, idx)
}

fn date_opt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| parse_date(&value, idx)).transpose()
}

const OBLIGEE_COLUMNS: &str = "obligee_id, name, street, city, zip, emails, updated_at_us";

fn row_to_obligee(row: &Row<'_>) -> rusqlite::Result<Obligee> {
    Ok(Obligee {
        obligee_id: row.get(0)?,
        name: row.get(1)?,
        street: row.get(2)?,
        city: row.get(3)?,
        zip: row.get(4)?,
        emails: row.get(5)?,
        updated_at_us: row.get(6)?,
    })
}

const SNAPSHOT_COLUMNS: &str =
    "snapshot_id, obligee_id, name, street, city, zip, emails, created_at_us";

fn row_to_snapshot(row: &Row<'_>) -> rusqlite::Result<ObligeeSnapshot> {
    Ok(ObligeeSnapshot {
        snapshot_id: row.get(0)?,
        obligee_id: row.get(1)?,
        name: row.get(2)?,
        street: row.get(3)?,
        city: row.get(4)?,
        zip: row.get(5)?,
        emails: row.get(6)?,
        created_at_us: row.get(7)?,
    })
}

const INFOREQUEST_COLUMNS: &str = "inforequest_id, applicant, subject, content, unique_email, \
                                   submission_date, closed, created_at_us";

fn row_to_inforequest(row: &Row<'_>) -> rusqlite::Result<Inforequest> {
    Ok(Inforequest::from_row(
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        date(row, 5)?,
        row.get::<_, i64>(6)? != 0,
        row.get(7)?,
    ))
}

const BRANCH_COLUMNS: &str =
    "b.branch_id, b.inforequest_id, b.obligee_id, b.snapshot_id, b.advanced_by_id";

fn row_to_branch(row: &Row<'_>) -> rusqlite::Result<Branch> {
    Ok(Branch::from_row(
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

const ACTION_SELECT: &str = "SELECT a.action_id, a.branch_id, a.position, a.action_type, \
     a.subject, a.content, a.effective_date, a.deadline_days, a.extension_days, \
     a.disclosure_level, a.created_at_us, \
     m.message_id, m.direction, m.from_name, m.from_mail, m.subject, m.processed_at_us \
     FROM actions a LEFT JOIN messages m ON m.message_id = a.message_id";

fn row_to_action(row: &Row<'_>) -> rusqlite::Result<Action> {
    let message_id: Option<i64> = row.get(11)?;
    let message = match message_id {
        Some(message_id) => Some(Message {
            message_id,
            direction: parsed(row, 12)?,
            from_name: row.get(13)?,
            from_mail: row.get(14)?,
            subject: row.get(15)?,
            processed_at_us: row.get(16)?,
            recipients: Vec::new(),
        }),
        None => None,
    };

    Ok(Action {
        action_id: row.get(0)?,
        branch_id: row.get(1)?,
        position: row.get(2)?,
        action_type: parsed(row, 3)?,
        subject: row.get(4)?,
        content: row.get(5)?,
        effective_date: date(row, 6)?,
        deadline_days: row.get(7)?,
        extension_days: row.get(8)?,
        disclosure_level: parsed_opt(row, 9)?,
        message,
        created_at_us: row.get(10)?,
    })
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
    what: &'static str,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.with_context(|| format!("read {what} row"))?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Obligees and snapshots
// ---------------------------------------------------------------------------

/// Fetch an obligee by id.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_obligee(store: &Store, obligee_id: i64) -> Result<Option<Obligee>> {
    store.count_read();
    let sql = format!("SELECT {OBLIGEE_COLUMNS} FROM obligees WHERE obligee_id = ?1");
    store
        .conn()
        .query_row(&sql, params![obligee_id], row_to_obligee)
        .optional()
        .with_context(|| format!("get_obligee for {obligee_id}"))
}

/// List all obligees by id.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_obligees(store: &Store) -> Result<Vec<Obligee>> {
    store.count_read();
    let sql = format!("SELECT {OBLIGEE_COLUMNS} FROM obligees ORDER BY obligee_id");
    let mut stmt = store
        .conn()
        .prepare(&sql)
        .context("prepare list_obligees")?;
    let rows = stmt
        .query_map([], row_to_obligee)
        .context("execute list_obligees")?;
    collect_rows(rows, "obligee")
}

/// Fetch a snapshot by id.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_snapshot(store: &Store, snapshot_id: i64) -> Result<Option<ObligeeSnapshot>> {
    store.count_read();
    let sql = format!("SELECT {SNAPSHOT_COLUMNS} FROM obligee_snapshots WHERE snapshot_id = ?1");
    store
        .conn()
        .query_row(&sql, params![snapshot_id], row_to_snapshot)
        .optional()
        .with_context(|| format!("get_snapshot for {snapshot_id}"))
}

/// The most recent snapshot of an obligee.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn current_snapshot(store: &Store, obligee_id: i64) -> Result<Option<ObligeeSnapshot>> {
    snapshot_as_of(store, obligee_id, i64::MAX)
}

/// The latest snapshot of an obligee created at or before `at_us`.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn snapshot_as_of(
    store: &Store,
    obligee_id: i64,
    at_us: i64,
) -> Result<Option<ObligeeSnapshot>> {
    store.count_read();
    let sql = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM obligee_snapshots \
         WHERE obligee_id = ?1 AND created_at_us <= ?2 \
         ORDER BY created_at_us DESC, snapshot_id DESC LIMIT 1"
    );
    store
        .conn()
        .query_row(&sql, params![obligee_id, at_us], row_to_snapshot)
        .optional()
        .with_context(|| format!("snapshot_as_of for obligee {obligee_id} at {at_us}"))
}

/// Every snapshot of an obligee, oldest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn snapshots_for(store: &Store, obligee_id: i64) -> Result<Vec<ObligeeSnapshot>> {
    store.count_read();
    let sql = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM obligee_snapshots \
         WHERE obligee_id = ?1 ORDER BY created_at_us ASC, snapshot_id ASC"
    );
    let mut stmt = store
        .conn()
        .prepare(&sql)
        .context("prepare snapshots_for")?;
    let rows = stmt
        .query_map(params![obligee_id], row_to_snapshot)
        .context("execute snapshots_for")?;
    collect_rows(rows, "snapshot")
}

// ---------------------------------------------------------------------------
// Inforequests and branches
// ---------------------------------------------------------------------------

/// Fetch an inforequest by id. Branches are not loaded.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_inforequest(store: &Store, inforequest_id: i64) -> Result<Option<Inforequest>> {
    store.count_read();
    let sql = format!("SELECT {INFOREQUEST_COLUMNS} FROM inforequests WHERE inforequest_id = ?1");
    store
        .conn()
        .query_row(&sql, params![inforequest_id], row_to_inforequest)
        .optional()
        .with_context(|| format!("get_inforequest for {inforequest_id}"))
}

/// List inforequests by id, optionally only open or only closed ones.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_inforequests(store: &Store, closed: Option<bool>) -> Result<Vec<Inforequest>> {
    store.count_read();
    let (where_clause, param_values): (&str, Vec<i64>) = match closed {
        Some(closed) => (" WHERE closed = ?1", vec![i64::from(closed)]),
        None => ("", Vec::new()),
    };
    let sql = format!(
        "SELECT {INFOREQUEST_COLUMNS} FROM inforequests{where_clause} ORDER BY inforequest_id"
    );
    let mut stmt = store
        .conn()
        .prepare(&sql)
        .context("prepare list_inforequests")?;
    let rows = stmt
        .query_map(params_from_iter(param_values), row_to_inforequest)
        .context("execute list_inforequests")?;
    collect_rows(rows, "inforequest")
}

/// Fetch a branch by id, with empty caches.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_branch(store: &Store, branch_id: i64) -> Result<Option<Branch>> {
    store.count_read();
    let sql = format!("SELECT {BRANCH_COLUMNS} FROM branches b WHERE b.branch_id = ?1");
    store
        .conn()
        .query_row(&sql, params![branch_id], row_to_branch)
        .optional()
        .with_context(|| format!("get_branch for {branch_id}"))
}

/// List branches matching `filter`.
///
/// Rows come back in no particular order unless `filter.order` is set.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_branches(store: &Store, filter: &BranchFilter) -> Result<Vec<Branch>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(inforequest_id) = filter.inforequest_id {
        param_values.push(Box::new(inforequest_id));
        conditions.push(format!("b.inforequest_id = ?{}", param_values.len()));
    }

    if let Some(ids) = &filter.inforequest_ids {
        conditions.push(in_list("b.inforequest_id", ids, &mut param_values));
    }

    if let Some(obligee_id) = filter.obligee_id {
        param_values.push(Box::new(obligee_id));
        conditions.push(format!("b.obligee_id = ?{}", param_values.len()));
    }

    if let Some(snapshot_id) = filter.snapshot_id {
        param_values.push(Box::new(snapshot_id));
        conditions.push(format!("b.snapshot_id = ?{}", param_values.len()));
    }

    match filter.main {
        Some(true) => conditions.push("b.advanced_by_id IS NULL".to_string()),
        Some(false) => conditions.push("b.advanced_by_id IS NOT NULL".to_string()),
        None => {}
    }

    if let Some(advanced_by_id) = filter.advanced_by_id {
        param_values.push(Box::new(advanced_by_id));
        conditions.push(format!("b.advanced_by_id = ?{}", param_values.len()));
    }

    if let Some(ids) = &filter.ids {
        conditions.push(in_list("b.branch_id", ids, &mut param_values));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    let order_clause = filter.order.map_or("", BranchOrder::sql_clause);
    let sql = format!("SELECT {BRANCH_COLUMNS} FROM branches b{where_clause}{order_clause}");

    store.count_read();
    let mut stmt = store
        .conn()
        .prepare(&sql)
        .with_context(|| format!("prepare list_branches query: {sql}"))?;
    let params_ref: Vec<&dyn ToSql> = param_values.iter().map(AsRef::as_ref).collect();
    let rows = stmt
        .query_map(params_from_iter(params_ref), row_to_branch)
        .context("execute list_branches query")?;
    collect_rows(rows, "branch")
}

/// `column IN (?n, ...)` over `ids`, appending the values to `param_values`.
fn in_list(column: &str, ids: &[i64], param_values: &mut Vec<Box<dyn ToSql>>) -> String {
    if ids.is_empty() {
        return "0".to_string();
    }
    let first = param_values.len() + 1;
    param_values.extend(ids.iter().map(|id| Box::new(*id) as Box<dyn ToSql>));
    let list = (first..first + ids.len())
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{column} IN ({list})")
}

// ---------------------------------------------------------------------------
// Actions, messages, drafts
// ---------------------------------------------------------------------------

/// Load actions of every branch in `branch_ids`, grouped by branch and
/// ordered per `query.order`. One query per [`MAX_IDS_PER_QUERY`] ids.
/// Branches without matching actions are absent from the map.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn load_actions(
    store: &Store,
    branch_ids: &[i64],
    query: &ActionQuery,
) -> Result<HashMap<i64, Vec<Action>>> {
    let mut grouped: HashMap<i64, Vec<Action>> = HashMap::new();
    for chunk in branch_ids.chunks(MAX_IDS_PER_QUERY) {
        let mut param_values: Vec<Box<dyn ToSql>> = chunk
            .iter()
            .map(|id| Box::new(*id) as Box<dyn ToSql>)
            .collect();
        let extra = query.conditions("a", param_values.len() + 1);
        param_values.extend(
            query
                .type_params()
                .into_iter()
                .map(|t| Box::new(t) as Box<dyn ToSql>),
        );

        let sql = format!(
            "{ACTION_SELECT} WHERE a.branch_id IN ({}){extra} {}",
            placeholders(chunk.len()),
            query.order.sql_clause()
        );

        store.count_read();
        let mut stmt = store
            .conn()
            .prepare(&sql)
            .with_context(|| format!("prepare load_actions query: {sql}"))?;
        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(AsRef::as_ref).collect();
        let rows = stmt
            .query_map(params_from_iter(params_ref), row_to_action)
            .context("execute load_actions query")?;

        for row in rows {
            let action = row.context("read action row")?;
            grouped.entry(action.branch_id).or_default().push(action);
        }
    }
    Ok(grouped)
}

/// The highest-position action of one branch.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn load_last_action(store: &Store, branch_id: i64) -> Result<Option<Action>> {
    store.count_read();
    let sql = format!("{ACTION_SELECT} WHERE a.branch_id = ?1 ORDER BY a.position DESC LIMIT 1");
    store
        .conn()
        .query_row(&sql, params![branch_id], row_to_action)
        .optional()
        .with_context(|| format!("load_last_action for branch {branch_id}"))
}

/// The final action (among those matching `query`) of every branch in
/// `branch_ids`. One query per [`MAX_IDS_PER_QUERY`] ids.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn load_last_actions(
    store: &Store,
    branch_ids: &[i64],
    query: &ActionQuery,
) -> Result<HashMap<i64, Action>> {
    let mut last: HashMap<i64, Action> = HashMap::new();
    for chunk in branch_ids.chunks(MAX_IDS_PER_QUERY) {
        let mut param_values: Vec<Box<dyn ToSql>> = chunk
            .iter()
            .map(|id| Box::new(*id) as Box<dyn ToSql>)
            .collect();
        let first_type_param = param_values.len() + 1;
        let outer = query.conditions("a", first_type_param);
        let inner = query.conditions("x", first_type_param);
        param_values.extend(
            query
                .type_params()
                .into_iter()
                .map(|t| Box::new(t) as Box<dyn ToSql>),
        );

        let sql = format!(
            "{ACTION_SELECT} WHERE a.branch_id IN ({}){outer} \
             AND a.position = (SELECT MAX(x.position) FROM actions x \
             WHERE x.branch_id = a.branch_id{inner})",
            placeholders(chunk.len()),
        );

        store.count_read();
        let mut stmt = store
            .conn()
            .prepare(&sql)
            .with_context(|| format!("prepare load_last_actions query: {sql}"))?;
        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(AsRef::as_ref).collect();
        let rows = stmt
            .query_map(params_from_iter(params_ref), row_to_action)
            .context("execute load_last_actions query")?;

        for row in rows {
            let action = row.context("read action row")?;
            last.insert(action.branch_id, action);
        }
    }
    Ok(last)
}

/// The final action of every branch in the store, keyed by branch. Binds
/// no ids, so it serves sweeps over any number of branches.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn load_all_last_actions(store: &Store) -> Result<HashMap<i64, Action>> {
    let sql = format!(
        "{ACTION_SELECT} WHERE a.position = (SELECT MAX(x.position) FROM actions x \
         WHERE x.branch_id = a.branch_id)"
    );

    store.count_read();
    let mut stmt = store
        .conn()
        .prepare(&sql)
        .context("prepare load_all_last_actions query")?;
    let rows = stmt
        .query_map([], row_to_action)
        .context("execute load_all_last_actions query")?;

    let mut last = HashMap::new();
    for row in rows {
        let action = row.context("read action row")?;
        last.insert(action.branch_id, action);
    }
    Ok(last)
}

/// Fetch one action by id.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_action(store: &Store, action_id: i64) -> Result<Option<Action>> {
    store.count_read();
    let sql = format!("{ACTION_SELECT} WHERE a.action_id = ?1");
    store
        .conn()
        .query_row(&sql, params![action_id], row_to_action)
        .optional()
        .with_context(|| format!("get_action for {action_id}"))
}

/// Recipients of every message in `message_ids`, grouped by message in
/// insertion order.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn load_recipients(
    store: &Store,
    message_ids: &[i64],
) -> Result<HashMap<i64, Vec<Recipient>>> {
    let mut grouped: HashMap<i64, Vec<Recipient>> = HashMap::new();
    for chunk in message_ids.chunks(MAX_IDS_PER_QUERY) {
        let sql = format!(
            "SELECT message_id, name, mail, kind FROM recipients \
             WHERE message_id IN ({}) ORDER BY recipient_id",
            placeholders(chunk.len())
        );

        store.count_read();
        let mut stmt = store
            .conn()
            .prepare(&sql)
            .context("prepare load_recipients")?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    Recipient {
                        name: row.get(1)?,
                        mail: row.get(2)?,
                        kind: parsed(row, 3)?,
                    },
                ))
            })
            .context("execute load_recipients")?;

        for row in rows {
            let (message_id, recipient) = row.context("read recipient row")?;
            grouped.entry(message_id).or_default().push(recipient);
        }
    }
    Ok(grouped)
}

/// List drafts matching `filter`, oldest first.
///
/// # Errors
///
/// Returns an error if the database query fails or a stored obligee list
/// is not valid JSON.
pub fn list_drafts(store: &Store, filter: &DraftFilter) -> Result<Vec<ActionDraft>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_values: Vec<i64> = Vec::new();

    if let Some(inforequest_id) = filter.inforequest_id {
        param_values.push(inforequest_id);
        conditions.push(format!("inforequest_id = ?{}", param_values.len()));
    }
    if let Some(branch_id) = filter.branch_id {
        param_values.push(branch_id);
        conditions.push(format!("branch_id = ?{}", param_values.len()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    let sql = format!(
        "SELECT draft_id, inforequest_id, branch_id, action_type, subject, content, \
         effective_date, deadline_days, disclosure_level, obligee_ids \
         FROM action_drafts{where_clause} ORDER BY draft_id"
    );

    store.count_read();
    let mut stmt = store.conn().prepare(&sql).context("prepare list_drafts")?;
    let rows = stmt
        .query_map(params_from_iter(param_values), |row| {
            let obligee_ids: String = row.get(9)?;
            Ok(ActionDraft {
                draft_id: row.get(0)?,
                inforequest_id: row.get(1)?,
                branch_id: row.get(2)?,
                action_type: parsed(row, 3)?,
                subject: row.get(4)?,
                content: row.get(5)?,
                effective_date: date_opt(row, 6)?,
                deadline_days: row.get(7)?,
                disclosure_level: parsed_opt(row, 8)?,
                obligee_ids: serde_json::from_str(&obligee_ids).map_err(|err| {
                    rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(err))
                })?,
            })
        })
        .context("execute list_drafts")?;
    collect_rows(rows, "draft")
}

/// When the last expiration sweep finished, if ever.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn last_sweep_at_us(store: &Store) -> Result<Option<i64>> {
    store.count_read();
    store
        .conn()
        .query_row(
            "SELECT last_sweep_at_us FROM store_meta WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .context("read last sweep timestamp")
}

#[cfg(test)]
mod tests {
    use super::{ActionOrder, ActionQuery, BranchFilter, BranchOrder, list_branches, load_actions};
    use crate::db::Store;
    use crate::model::action::ActionType;

    fn seeded() -> Store {
        let store = Store::open_in_memory().expect("open store");
        store
            .conn()
            .execute_batch(
                "INSERT INTO obligees (name, emails, updated_at_us) VALUES ('Town Hall', '', 1);
                 INSERT INTO inforequests (applicant, submission_date, created_at_us)
                     VALUES ('Jana', '2010-07-05', 1);
                 INSERT INTO branches (inforequest_id, obligee_id, snapshot_id) VALUES (1, 1, 1);
                 INSERT INTO actions (branch_id, position, action_type, effective_date, created_at_us)
                     VALUES (1, 1, 'request', '2010-07-05', 1);
                 INSERT INTO actions (branch_id, position, action_type, effective_date, created_at_us)
                     VALUES (1, 2, 'advancement', '2010-07-08', 1);
                 INSERT INTO branches (inforequest_id, obligee_id, snapshot_id, advanced_by_id)
                     VALUES (1, 1, 1, 2);
                 INSERT INTO actions (branch_id, position, action_type, effective_date, created_at_us)
                     VALUES (2, 1, 'advanced_request', '2010-07-08', 1);",
            )
            .expect("seed rows");
        store
    }

    #[test]
    fn load_actions_groups_by_branch_in_one_query() {
        let store = seeded();
        let before = store.read_count();
        let grouped = load_actions(&store, &[1, 2], &ActionQuery::default()).expect("load");
        assert_eq!(store.read_count() - before, 1);

        let types: Vec<_> = grouped[&1].iter().map(|a| a.action_type).collect();
        assert_eq!(types, [ActionType::Request, ActionType::Advancement]);
        assert_eq!(grouped[&2].len(), 1);
    }

    #[test]
    fn type_filter_narrows_rows() {
        let store = seeded();
        let query = ActionQuery::default()
            .with_types([ActionType::Advancement])
            .ordered_by(ActionOrder::EffectiveDate);
        let grouped = load_actions(&store, &[1, 2], &query).expect("load");
        assert_eq!(grouped[&1].len(), 1);
        assert!(!grouped.contains_key(&2));
    }

    #[test]
    fn empty_key_set_skips_the_query() {
        let store = seeded();
        let before = store.read_count();
        assert!(
            load_actions(&store, &[], &ActionQuery::default())
                .expect("load")
                .is_empty()
        );
        assert_eq!(store.read_count(), before);
    }

    #[test]
    fn branch_filters_combine() {
        let store = seeded();
        let main = list_branches(
            &store,
            &BranchFilter {
                main: Some(true),
                ..BranchFilter::default()
            },
        )
        .expect("list");
        assert_eq!(main.len(), 1);
        assert!(main[0].is_main());

        let spawned = list_branches(
            &store,
            &BranchFilter {
                advanced_by_id: Some(2),
                ..BranchFilter::default()
            },
        )
        .expect("list");
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].branch_id, 2);

        let reversed = list_branches(
            &store,
            &BranchFilter {
                inforequest_id: Some(1),
                order: Some(BranchOrder::Pk { reverse: true }),
                ..BranchFilter::default()
            },
        )
        .expect("list");
        let ids: Vec<_> = reversed.iter().map(|b| b.branch_id).collect();
        assert_eq!(ids, [2, 1]);

        let none = list_branches(
            &store,
            &BranchFilter {
                ids: Some(Vec::new()),
                ..BranchFilter::default()
            },
        )
        .expect("list");
        assert!(none.is_empty());
    }
}
