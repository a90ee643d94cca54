//! Algebraic laws of the structural diff over generated schemas.

mod common;

use common::database;
use proptest::prelude::*;
use schemerd::diff::Swap;

proptest! {
    #[test]
    fn test_self_diff_is_empty(db in database()) {
        prop_assert!(schemerd::diff(&db, &db).is_empty());
    }

    #[test]
    fn test_diff_is_symmetric(left in database(), right in database()) {
        prop_assert_eq!(schemerd::diff(&right, &left), schemerd::diff(&left, &right).swapped());
    }

    #[test]
    fn test_diff_partitions_entities(left in database(), right in database()) {
        let result = schemerd::diff(&left, &right);
        for entity in &result.entities.left {
            prop_assert!(right.entity(&entity.id()).is_none());
        }
        for entity in &result.entities.right {
            prop_assert!(left.entity(&entity.id()).is_none());
        }
        for changed in &result.entities.both {
            prop_assert_ne!(&changed.left, &changed.right);
        }
    }

    #[test]
    fn test_json_round_trip(db in database()) {
        let text = schemerd::interchange::json::generate(&db).unwrap();
        let parsed = schemerd::interchange::json::parse(&text);
        prop_assert_eq!(parsed.value(), Some(&db));
    }
}
