//! SQLite serialization for IDs, CIDRs and status enums
//!
//! Enums are stored as their canonical text form and parsed back with
//! `FromStr`, so the database stays readable with plain `sqlite3`.

use std::net::Ipv4Addr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::Row;

use crate::core::cidr::{CidrError, Ipv4Cidr};
use crate::core::identity::{EntityId, IdParseError};
use crate::entities::{
    AssignmentStatus, CompletionDecision, DeviceCategory, DeviceStatus, ItemStatus, OrderStatus,
    SubsystemStatus, TaskStatus,
};

fn invalid(msg: String) -> FromSqlError {
    FromSqlError::Other(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        msg,
    )))
}

// =========================================================================
// EntityId / Ipv4Cidr
// =========================================================================

impl ToSql for EntityId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for EntityId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: IdParseError| invalid(e.to_string()))
    }
}

impl ToSql for Ipv4Cidr {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Ipv4Cidr {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: CidrError| invalid(e.to_string()))
    }
}

/// Read an IPv4 address stored as text
pub fn ip_column(row: &Row<'_>, idx: &str) -> rusqlite::Result<Ipv4Addr> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e: std::net::AddrParseError| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
    })
}

// =========================================================================
// Status enums
// =========================================================================

macro_rules! text_enum_sql {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value.as_str()?.parse().map_err(|e: String| invalid(e))
                }
            }
        )+
    };
}

text_enum_sql!(
    SubsystemStatus,
    DeviceCategory,
    AssignmentStatus,
    OrderStatus,
    ItemStatus,
    CompletionDecision,
    TaskStatus,
    DeviceStatus,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityPrefix;
    use rusqlite::Connection;

    #[test]
    fn test_enum_and_id_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT, status TEXT, cat TEXT, net TEXT)")
            .unwrap();

        let id = EntityId::new(EntityPrefix::Sub);
        let cidr: Ipv4Cidr = "10.1.0.0/24".parse().unwrap();
        conn.execute(
            "INSERT INTO t VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                id,
                SubsystemStatus::InCompletion,
                DeviceCategory::AccessController,
                cidr
            ],
        )
        .unwrap();

        let (rid, status, cat, net): (EntityId, SubsystemStatus, DeviceCategory, Ipv4Cidr) = conn
            .query_row("SELECT id, status, cat, net FROM t", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })
            .unwrap();
        assert_eq!(rid, id);
        assert_eq!(status, SubsystemStatus::InCompletion);
        assert_eq!(cat, DeviceCategory::AccessController);
        assert_eq!(net, cidr);

        let raw: String = conn
            .query_row("SELECT status FROM t", [], |r| r.get(0))
            .unwrap();
        assert_eq!(raw, "IN_COMPLETION");
    }

    #[test]
    fn test_bad_enum_text_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        let res: rusqlite::Result<ItemStatus> =
            conn.query_row("SELECT 'LOST'", [], |r| r.get(0));
        assert!(res.is_err());
    }
}
