//! Submission repository — CRUD operations for the `submissions` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw submission row from the database.
///
/// `payload`, `drive_result` and `task_result` are JSON-encoded text
/// columns; the typed layer in [`crate::store`] decodes them. Searchable
/// fields (client name, title, request type, requestor email) are
/// denormalized into their own columns so listing filters stay plain SQL.
#[derive(Debug, Clone)]
pub struct SubmissionRow {
    pub id: String,
    pub client_name: String,
    pub title: String,
    pub request_type: String,
    pub requestor_email: String,
    pub payload: String,
    pub status: String,
    pub drive_result: Option<String>,
    pub task_result: Option<String>,
    pub error_step: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub error_at: Option<String>,
    pub created_at: String,
    pub last_modified: String,
    pub completed_at: Option<String>,
}

impl SubmissionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            client_name: row.get("client_name")?,
            title: row.get("title")?,
            request_type: row.get("request_type")?,
            requestor_email: row.get("requestor_email")?,
            payload: row.get("payload")?,
            status: row.get("status")?,
            drive_result: row.get("drive_result")?,
            task_result: row.get("task_result")?,
            error_step: row.get("error_step")?,
            error_message: row.get("error_message")?,
            retry_count: row.get("retry_count")?,
            error_at: row.get("error_at")?,
            created_at: row.get("created_at")?,
            last_modified: row.get("last_modified")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Query filter parameters for submission listing.
#[derive(Debug, Default, Clone)]
pub struct SubmissionFilter {
    /// Exact status match (`draft`, `processing`, `complete`, `error`).
    pub status: Option<String>,
    /// Case-insensitive exact match on requestor email.
    pub email: Option<String>,
    /// Free-text search over client name, title, request type and email.
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new submission row.
pub fn insert(db: &Database, sub: &SubmissionRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO submissions (id, client_name, title, request_type, requestor_email,
             payload, status, drive_result, task_result, error_step, error_message,
             retry_count, error_at, created_at, last_modified, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                sub.id,
                sub.client_name,
                sub.title,
                sub.request_type,
                sub.requestor_email,
                sub.payload,
                sub.status,
                sub.drive_result,
                sub.task_result,
                sub.error_step,
                sub.error_message,
                sub.retry_count,
                sub.error_at,
                sub.created_at,
                sub.last_modified,
                sub.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Updates an existing submission row. All fields except `id` and
/// `created_at` are overwritten.
pub fn update(db: &Database, sub: &SubmissionRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE submissions SET client_name=?2, title=?3, request_type=?4,
             requestor_email=?5, payload=?6, status=?7, drive_result=?8, task_result=?9,
             error_step=?10, error_message=?11, retry_count=?12, error_at=?13,
             last_modified=?14, completed_at=?15
             WHERE id=?1",
            params![
                sub.id,
                sub.client_name,
                sub.title,
                sub.request_type,
                sub.requestor_email,
                sub.payload,
                sub.status,
                sub.drive_result,
                sub.task_result,
                sub.error_step,
                sub.error_message,
                sub.retry_count,
                sub.error_at,
                sub.last_modified,
                sub.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a submission by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<SubmissionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM submissions WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], SubmissionRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Queries submissions with filters, returning (rows, total_count).
pub fn query(
    db: &Database,
    filter: &SubmissionFilter,
) -> Result<(Vec<SubmissionRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }
        if let Some(ref email) = filter.email {
            conditions.push(format!(
                "LOWER(requestor_email) = LOWER(?{})",
                param_values.len() + 1
            ));
            param_values.push(Box::new(email.clone()));
        }
        if let Some(ref search) = filter.search {
            // Escape LIKE wildcards so a literal '%' in the search term
            // does not match everything.
            let escaped = search.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            let pattern = format!("%{}%", escaped.to_lowercase());
            let idx = param_values.len() + 1;
            conditions.push(format!(
                "(LOWER(client_name) LIKE ?{idx} ESCAPE '\\'
                  OR LOWER(title) LIKE ?{idx} ESCAPE '\\'
                  OR LOWER(request_type) LIKE ?{idx} ESCAPE '\\'
                  OR LOWER(requestor_email) LIKE ?{idx} ESCAPE '\\')"
            ));
            param_values.push(Box::new(pattern));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Count total matching rows.
        let count_sql = format!("SELECT COUNT(*) FROM submissions {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        // Fetch paginated results, newest first.
        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM submissions {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<SubmissionRow> = stmt
            .query_map(params_ref.as_slice(), SubmissionRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Counts submissions with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM submissions WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Compare-and-swap status transition. Returns `true` when exactly one
/// row moved from `expected` to `new_status`; `false` when the row was
/// missing or already past `expected` (a concurrent writer won).
pub fn transition_status(
    db: &Database,
    id: &str,
    expected: &str,
    new_status: &str,
    last_modified: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE submissions SET status = ?3, last_modified = ?4
             WHERE id = ?1 AND status = ?2",
            params![id, expected, new_status, last_modified],
        )?;
        Ok(changed == 1)
    })
}
