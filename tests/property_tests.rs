//! Property-based tests for the cursor iteration protocol and the scalar
//! helpers.
//!
//! These verify that:
//! - Iteration yields exactly as many rows as were inserted, in order
//! - The scalar helpers round-trip arbitrary 64-bit values through text
//! - By-name and by-index column access always agree

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use curlite::Connection;

    /// Creates an in-memory database holding `values` in insertion order.
    fn db_with_rows(values: &[i64]) -> Connection {
        let db = Connection::open_in_memory().unwrap();
        db.exec("create table t(seq integer primary key autoincrement, v int);")
            .unwrap();
        for v in values {
            db.exec(&format!("insert into t(v) values({});", v)).unwrap();
        }
        db
    }

    proptest! {
        /// Iteration cycles true exactly once per inserted row, then false,
        /// with the position counter tracking rows consumed.
        #[test]
        fn prop_read_count_matches_insert_count(values in prop::collection::vec(any::<i64>(), 0..40)) {
            let db = db_with_rows(&values);
            let mut cursor = db.cursor("select v from t order by seq;").unwrap();

            let mut seen = Vec::new();
            while cursor.read().unwrap() {
                seen.push(cursor.value(0).unwrap().parse::<i64>().unwrap());
            }

            prop_assert_eq!(&seen, &values);
            prop_assert_eq!(cursor.position(), values.len() as u64);
            prop_assert_eq!(cursor.column_count(), 1);
        }

        /// Signed 64-bit values survive the text round trip through the
        /// scalar helper, including the extremes.
        #[test]
        fn prop_exec_i64_roundtrips(v in any::<i64>()) {
            let db = Connection::open_in_memory().unwrap();
            prop_assert_eq!(db.exec_i64(&format!("select '{}';", v)).unwrap(), v);
        }

        /// Unsigned 64-bit values survive the text round trip.
        #[test]
        fn prop_exec_u64_roundtrips(v in any::<u64>()) {
            let db = Connection::open_in_memory().unwrap();
            prop_assert_eq!(db.exec_u64(&format!("select '{}';", v)).unwrap(), v);
        }

        /// Column access by discovered index and by name never disagree.
        #[test]
        fn prop_name_and_index_access_agree(values in prop::collection::vec(any::<i64>(), 1..20)) {
            let db = db_with_rows(&values);
            let mut cursor = db.cursor("select seq, v from t;").unwrap();
            while cursor.read().unwrap() {
                for name in ["seq", "v"] {
                    let index = cursor.column_index(name).unwrap();
                    prop_assert_eq!(cursor.value(index), cursor.value_named(name));
                }
            }
        }
    }
}
