//! The one hand-written query: which plants a customer has ordered.

use rusqlite::Connection;

use crate::sqlite::engine::query_result_set;
use crate::sqlite::{CrudResult, ResultSet, SqlQuery, Value};

/// Plants on every order of one customer, with the ordered quantity.
pub const PLANTS_BY_CUSTOMER: &str = r#"
SELECT P.name AS PlantName, OD.quantity, O.OrderDate
FROM PLANTS P
JOIN ORDER_DETAILS OD ON P.pid = OD.pid
JOIN ORDERS O ON OD.oid = O.oid
WHERE O.cid = ?1
"#;

pub fn plants_ordered_by_customer(conn: &Connection, customer_id: impl Into<Value>) -> CrudResult<ResultSet> {
    let query = SqlQuery::new(PLANTS_BY_CUSTOMER).with_param(customer_id);
    query_result_set(conn, &query)
}
