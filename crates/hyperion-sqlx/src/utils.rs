//! Conversions between Hyperion SQL types and sqlx/Postgres types.

use hyperion_core::db::{Row, SqlValue};
use hyperion_core::{Error, ErrorKind};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column as _, Postgres, Row as _, TypeInfo as _};

/// Maps a sqlx error into the core error type.
pub(crate) fn db_error(context: &'static str, error: sqlx::Error) -> Error {
    Error::with_source(ErrorKind::Database, context, Box::new(error))
}

/// Binds [`SqlValue`] parameters onto a query in order.
pub(crate) fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Bytes(b) => query.bind(b.as_slice()),
        };
    }
    query
}

/// Maps a Postgres row into the adapter-agnostic [`Row`].
pub(crate) fn to_row(row: &PgRow) -> Row {
    let mut columns = Vec::with_capacity(row.columns().len());
    let mut values = Vec::with_capacity(row.columns().len());

    for (index, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_owned());
        values.push(decode_value(row, index));
    }

    Row::new(columns, values)
}

/// Decodes one column by its Postgres type name.
///
/// Unknown types fall back to a text decode; values that decode as
/// neither become [`SqlValue::Null`].
fn decode_value(row: &PgRow, index: usize) -> SqlValue {
    fn opt<T>(result: Result<Option<T>, sqlx::Error>) -> Option<T> {
        result.ok().flatten()
    }

    let type_name = row.columns()[index].type_info().name().to_owned();
    let decoded = match type_name.as_str() {
        "BOOL" => opt(row.try_get::<Option<bool>, _>(index)).map(SqlValue::Bool),
        "INT2" => opt(row.try_get::<Option<i16>, _>(index)).map(|v| SqlValue::Int(i64::from(v))),
        "INT4" => opt(row.try_get::<Option<i32>, _>(index)).map(|v| SqlValue::Int(i64::from(v))),
        "INT8" => opt(row.try_get::<Option<i64>, _>(index)).map(SqlValue::Int),
        "FLOAT4" => {
            opt(row.try_get::<Option<f32>, _>(index)).map(|v| SqlValue::Float(f64::from(v)))
        }
        "FLOAT8" => opt(row.try_get::<Option<f64>, _>(index)).map(SqlValue::Float),
        "BYTEA" => opt(row.try_get::<Option<Vec<u8>>, _>(index)).map(SqlValue::Bytes),
        _ => opt(row.try_get::<Option<String>, _>(index)).map(SqlValue::Text),
    };

    decoded.unwrap_or(SqlValue::Null)
}
