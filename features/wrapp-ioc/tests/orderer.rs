mod common;

use pretty_assertions::assert_eq;
use wrapp_ioc::orderer::{OrderingConflict, Orderer};

#[test]
fn satisfiable_constraints_are_honoured() {
    let mut orderer = Orderer::new("steps");
    orderer.add("Commit", "commit", &["after:Validate"]).unwrap();
    orderer.add("Parse", "parse", &[]).unwrap();
    orderer.add("Validate", "validate", &["after:parse", "before:Commit"]).unwrap();
    orderer.add("Audit", "audit", &[]).unwrap();
    orderer.add("Log", "log", &["before:*"]).unwrap();

    let ordered = orderer.get_ordered();
    assert!(ordered.warnings.is_empty());
    assert_eq!(ordered.values, vec!["log", "parse", "validate", "commit", "audit"]);
}

#[test]
fn unconstrained_items_keep_insertion_order() {
    let mut orderer = Orderer::new("plain");
    for id in ["c", "a", "b"] {
        orderer.add(id, id, &["none"]).unwrap();
    }

    assert_eq!(orderer.get_ordered().values, vec!["c", "a", "b"]);
}

#[test]
fn cycles_degrade_with_a_warning() {
    let (ordered, logged) = common::capture_warnings(|| {
        let mut orderer = Orderer::new("cyclic steps");
        orderer.add("A", 'a', &["before:B"]).unwrap();
        orderer.add("B", 'b', &["before:A"]).unwrap();
        orderer.get_ordered()
    });

    assert_eq!(ordered.values.len(), 2);
    assert!(ordered.values.contains(&'a') && ordered.values.contains(&'b'));
    assert_eq!(ordered.warnings.len(), 1);
    assert_eq!(
        ordered.warnings[0].conflict,
        OrderingConflict::Cycle { other: "A".into() }
    );

    assert_eq!(logged.len(), 1);
    assert!(logged[0].contains("forms a dependency cycle"), "{logged:?}");
}

#[test]
fn unknown_ids_are_warned_about() {
    let (ordered, logged) = common::capture_warnings(|| {
        let mut orderer = Orderer::new("steps");
        orderer.add("Only", 1, &["after:Missing", "after:Mis*"]).unwrap();
        orderer.get_ordered()
    });

    assert_eq!(ordered.values, vec![1]);
    assert_eq!(
        ordered.warnings[0].conflict,
        OrderingConflict::UnknownId("Missing".into())
    );
    assert_eq!(
        logged,
        vec!["Constraint 'after:Missing' of 'Only' references 'Missing', which has not been added"]
    );
}
