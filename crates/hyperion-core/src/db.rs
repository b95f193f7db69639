//! Database, executor, and unit-of-work contracts.
//!
//! The [`Executor`] trait is the adapter-agnostic SQL surface reachable
//! from a [`Context`]; it points either at the connection pool or at a
//! transactional scope. [`with_transaction`] is the unit of work: it
//! guarantees commit-or-rollback on every exit path and propagates the
//! transactional executor to the body through a derived Context.
//!
//! [`Context`]: crate::context::Context

use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::{Error, ErrorKind, Result};

/// Type alias for a shared, type-erased [`Executor`].
pub type ExecutorRef = Arc<dyn Executor>;

/// Type alias for a shared, type-erased [`Transaction`].
pub type TransactionRef = Arc<dyn Transaction>;

/// Type alias for a shared, type-erased [`Database`].
pub type DatabaseRef = Arc<dyn Database>;

/// A SQL parameter or column value.
///
/// The variants cover the types every supported driver understands;
/// adapters convert at the boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    /// SQL NULL.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer value.
    Int(i64),
    /// 64-bit floating point value.
    Float(f64),
    /// UTF-8 text value.
    Text(String),
    /// Raw byte value.
    Bytes(Vec<u8>),
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A single result row: column names paired with [`SqlValue`]s.
///
/// # Examples
///
/// ```
/// use hyperion_core::db::{Row, SqlValue};
///
/// let row = Row::new(
///     vec!["id".into(), "name".into()],
///     vec![SqlValue::Int(7), SqlValue::Text("ada".into())],
/// );
///
/// assert_eq!(row.get_int64("id").unwrap(), 7);
/// assert_eq!(row.get_string("name").unwrap(), "ada");
/// ```
#[must_use]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Creates a new [`Row`].
    ///
    /// # Panics
    ///
    /// Panics if `columns` and `values` differ in length: rows are
    /// produced by adapters and a mismatch is a driver-mapping bug.
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Row column/value length mismatch: this is an adapter bug"
        );
        Self { columns, values }
    }

    /// Returns the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the value at `index`, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Returns the value of the named column, if present.
    #[must_use]
    pub fn get_named(&self, column: &str) -> Option<&SqlValue> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    /// Returns the named column as a string.
    pub fn get_string(&self, column: &str) -> Result<String> {
        match self.require(column)? {
            SqlValue::Text(s) => Ok(s.clone()),
            other => Err(type_mismatch(column, "text", other)),
        }
    }

    /// Returns the named column as a signed 64-bit integer.
    pub fn get_int64(&self, column: &str) -> Result<i64> {
        match self.require(column)? {
            SqlValue::Int(i) => Ok(*i),
            other => Err(type_mismatch(column, "int", other)),
        }
    }

    /// Returns the named column as a 64-bit float.
    pub fn get_float64(&self, column: &str) -> Result<f64> {
        match self.require(column)? {
            SqlValue::Float(f) => Ok(*f),
            SqlValue::Int(i) => Ok(*i as f64),
            other => Err(type_mismatch(column, "float", other)),
        }
    }

    /// Returns the named column as a boolean.
    pub fn get_bool(&self, column: &str) -> Result<bool> {
        match self.require(column)? {
            SqlValue::Bool(b) => Ok(*b),
            other => Err(type_mismatch(column, "bool", other)),
        }
    }

    fn require(&self, column: &str) -> Result<&SqlValue> {
        self.get_named(column).ok_or_else(|| {
            Error::new(ErrorKind::Database, format!("no such column '{column}'"))
        })
    }
}

fn type_mismatch(column: &str, expected: &str, got: &SqlValue) -> Error {
    Error::new(
        ErrorKind::Database,
        format!("column '{column}' is not {expected} (got {got:?})"),
    )
}

/// Query and transaction-begin surface of a database handle.
///
/// Obtained from [`Context::db`]; points at the connection pool or at a
/// transactional scope. Implementations must be safe for concurrent
/// use.
///
/// [`Context::db`]: crate::context::Context::db
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    /// Executes a statement, returning the number of affected rows.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Runs a query, returning all result rows.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Runs a query expected to return exactly one row.
    async fn query_one(&self, sql: &str, params: &[SqlValue]) -> Result<Row>;

    /// Begins a driver-level transaction.
    async fn begin(&self) -> Result<TransactionRef>;

    /// Returns `true` if this executor is itself a transactional scope.
    ///
    /// [`with_transaction`] uses this to detect nesting.
    fn is_transactional(&self) -> bool {
        false
    }
}

/// A driver-level transaction.
///
/// [`commit`] and [`rollback`] consume the underlying transaction;
/// calling either a second time returns [`ErrorKind::Transaction`].
///
/// [`commit`]: Transaction::commit
/// [`rollback`]: Transaction::rollback
#[async_trait::async_trait]
pub trait Transaction: Executor {
    /// Commits the transaction.
    async fn commit(&self) -> Result<()>;

    /// Rolls the transaction back.
    async fn rollback(&self) -> Result<()>;
}

/// Owner of the connection pool.
pub trait Database: Send + Sync {
    /// Returns the pool-backed [`Executor`].
    fn executor(&self) -> ExecutorRef;
}

/// Runs `f` inside a transaction, guaranteeing commit-or-rollback.
///
/// 1. When the Context's executor is already transactional, `f` runs on
///    the same transaction (flat reuse; no savepoints). The enclosing
///    scope owns the commit or rollback.
/// 2. Otherwise a transaction is begun, a Context derived via
///    [`Context::with_db`] is passed to `f`, and the transaction is
///    committed when `f` returns `Ok` or rolled back when it returns
///    `Err`.
///
/// The body's error stays primary: a rollback failure is attached to it
/// as a secondary cause, and a commit failure after a successful body
/// surfaces as [`ErrorKind::Transaction`].
///
/// # Examples
///
/// ```no_run
/// use hyperion_core::context::Context;
/// use hyperion_core::db::{Executor as _, with_transaction};
/// # async fn demo(cx: Context) -> hyperion_core::Result<()> {
/// with_transaction(&cx, |cx| async move {
///     cx.db().execute("INSERT INTO audit (action) VALUES ($1)", &["login".into()]).await?;
///     Ok(())
/// })
/// .await
/// # }
/// ```
///
/// [`Context::with_db`]: crate::context::Context::with_db
pub async fn with_transaction<F, Fut>(cx: &Context, f: F) -> Result<()>
where
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<()>> + Send,
{
    if cx.db().is_transactional() {
        return f(cx.clone()).await;
    }

    let tx = cx.db().begin().await?;
    let executor: ExecutorRef = tx.clone();
    let tx_cx = cx.with_db(executor);

    match f(tx_cx).await {
        Ok(()) => tx.commit().await.map_err(|commit_err| {
            Error::with_source(
                ErrorKind::Transaction,
                "transaction commit failed",
                Box::new(commit_err),
            )
        }),
        Err(body_err) => match tx.rollback().await {
            Ok(()) => Err(body_err),
            Err(rollback_err) => Err(body_err.with_secondary(rollback_err)),
        },
    }
}

/// No-op [`Executor`] used when no database is configured.
///
/// Every operation returns [`ErrorKind::Database`]: an unconfigured
/// database is a deployment problem, not a silent success.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopExecutor;

impl NopExecutor {
    /// Creates a new [`NopExecutor`] behind an [`ExecutorRef`].
    pub fn shared() -> ExecutorRef {
        Arc::new(Self)
    }

    fn unconfigured() -> Error {
        Error::new(ErrorKind::Database, "no database configured")
    }
}

#[async_trait::async_trait]
impl Executor for NopExecutor {
    async fn execute(&self, _sql: &str, _params: &[SqlValue]) -> Result<u64> {
        Err(Self::unconfigured())
    }

    async fn query(&self, _sql: &str, _params: &[SqlValue]) -> Result<Vec<Row>> {
        Err(Self::unconfigured())
    }

    async fn query_one(&self, _sql: &str, _params: &[SqlValue]) -> Result<Row> {
        Err(Self::unconfigured())
    }

    async fn begin(&self) -> Result<TransactionRef> {
        Err(Self::unconfigured())
    }
}

/// No-op [`Database`] used when no database is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopDatabase;

impl NopDatabase {
    /// Creates a new [`NopDatabase`] behind a [`DatabaseRef`].
    pub fn shared() -> DatabaseRef {
        Arc::new(Self)
    }
}

impl Database for NopDatabase {
    fn executor(&self) -> ExecutorRef {
        NopExecutor::shared()
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::sync::Mutex;

    use crate::context::Context;
    use crate::db::{
        Executor, ExecutorRef, NopExecutor, Row, SqlValue, Transaction, TransactionRef,
        with_transaction,
    };
    use crate::{Error, ErrorKind, Result};

    /// Records begin/commit/rollback calls for unit-of-work assertions.
    #[derive(Clone, Default)]
    struct FakeDb {
        events: Arc<Mutex<Vec<&'static str>>>,
        fail_rollback: bool,
    }

    impl FakeDb {
        fn events(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Executor for FakeDb {
        async fn execute(&self, _sql: &str, _params: &[SqlValue]) -> Result<u64> {
            self.events.lock().unwrap().push("execute");
            Ok(1)
        }

        async fn query(&self, _sql: &str, _params: &[SqlValue]) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn query_one(&self, _sql: &str, _params: &[SqlValue]) -> Result<Row> {
            Ok(Row::default())
        }

        async fn begin(&self) -> Result<TransactionRef> {
            self.events.lock().unwrap().push("begin");
            Ok(Arc::new(FakeTx { db: self.clone() }))
        }
    }

    struct FakeTx {
        db: FakeDb,
    }

    #[async_trait::async_trait]
    impl Executor for FakeTx {
        async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
            self.db.execute(sql, params).await
        }

        async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
            self.db.query(sql, params).await
        }

        async fn query_one(&self, sql: &str, params: &[SqlValue]) -> Result<Row> {
            self.db.query_one(sql, params).await
        }

        async fn begin(&self) -> Result<TransactionRef> {
            Err(Error::new(ErrorKind::Transaction, "already transactional"))
        }

        fn is_transactional(&self) -> bool {
            true
        }
    }

    #[async_trait::async_trait]
    impl Transaction for FakeTx {
        async fn commit(&self) -> Result<()> {
            self.db.events.lock().unwrap().push("commit");
            Ok(())
        }

        async fn rollback(&self) -> Result<()> {
            self.db.events.lock().unwrap().push("rollback");
            if self.db.fail_rollback {
                return Err(Error::new(ErrorKind::Transaction, "rollback failed"));
            }
            Ok(())
        }
    }

    fn context_with(db: FakeDb) -> Context {
        let executor: ExecutorRef = Arc::new(db);
        Context::builder().executor(executor).build()
    }

    #[tokio::test]
    async fn commits_on_success() {
        let db = FakeDb::default();
        let cx = context_with(db.clone());

        let result = with_transaction(&cx, |cx| async move {
            cx.db().execute("INSERT", &[]).await.map(drop)
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(db.events(), vec!["begin", "execute", "commit"]);
    }

    #[tokio::test]
    async fn rolls_back_on_error() {
        let db = FakeDb::default();
        let cx = context_with(db.clone());

        let result = with_transaction(&cx, |_cx| async move {
            Err(Error::new(ErrorKind::Other, "boom"))
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.message(), "boom");
        assert_eq!(db.events(), vec!["begin", "rollback"]);
    }

    #[tokio::test]
    async fn rollback_failure_is_secondary() {
        let db = FakeDb {
            fail_rollback: true,
            ..FakeDb::default()
        };
        let cx = context_with(db.clone());

        let err = with_transaction(&cx, |_cx| async move {
            Err(Error::new(ErrorKind::Other, "boom"))
        })
        .await
        .unwrap_err();

        // Body error stays primary; rollback failure rides behind it.
        assert_eq!(err.message(), "boom");
        let source = std::error::Error::source(&err).expect("secondary cause");
        assert!(source.to_string().contains("rollback failed"));
    }

    #[tokio::test]
    async fn nested_scope_reuses_transaction() {
        let db = FakeDb::default();
        let cx = context_with(db.clone());

        let result = with_transaction(&cx, |cx| async move {
            with_transaction(&cx, |cx| async move {
                cx.db().execute("INSERT", &[]).await.map(drop)
            })
            .await
        })
        .await;

        assert!(result.is_ok());
        // Exactly one begin and one commit: the inner scope is flat.
        assert_eq!(db.events(), vec!["begin", "execute", "commit"]);
    }

    #[tokio::test]
    async fn nop_executor_errors() {
        let err = NopExecutor.query("SELECT 1", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Database);
    }

    #[test]
    fn row_typed_getters() {
        let row = Row::new(
            vec!["id".into(), "name".into(), "active".into()],
            vec![
                SqlValue::Int(1),
                SqlValue::Text("ada".into()),
                SqlValue::Bool(true),
            ],
        );

        assert_eq!(row.get_int64("id").unwrap(), 1);
        assert_eq!(row.get_string("name").unwrap(), "ada");
        assert!(row.get_bool("active").unwrap());
        assert_eq!(row.get_float64("id").unwrap(), 1.0);
        assert!(row.get_string("missing").is_err());
        assert!(row.get_bool("name").is_err());
    }

    #[test]
    fn sql_value_conversions() {
        assert_eq!(SqlValue::from(Some(3i64)), SqlValue::Int(3));
        assert_eq!(SqlValue::from(Option::<i64>::None), SqlValue::Null);
        assert_eq!(SqlValue::from("x"), SqlValue::Text("x".into()));
    }
}
