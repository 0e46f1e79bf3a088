//! Two different values written to the same cell within one modifier must
//! raise a conflict and leave every cell touched in that modifier exactly as
//! it was before the modifier ran.

use trellis::{Cell, ConflictError, TrellisError};

#[test]
fn conflicting_writes_abort_and_roll_back_the_whole_section() {
    let left = Cell::new_value(10i32);
    let top = Cell::new_value(0i32);

    let result = trellis::modifier(|| {
        left.write(22).unwrap();
        top.write(55).unwrap();
        left.write(33).unwrap();
    });

    match result {
        Err(TrellisError::Conflict(ConflictError::Values { old, new, .. })) => {
            assert_eq!(old, "22");
            assert_eq!(new, "33");
        }
        other => panic!("expected a write-write conflict, got {other:?}"),
    }
    assert_eq!(left.read(), 10);
    assert_eq!(top.read(), 0);
}

#[test]
fn equal_writes_to_the_same_cell_commute() {
    let left = Cell::new_value(10i32);
    trellis::modifier(|| {
        left.write(22).unwrap();
        left.write(22).unwrap();
    })
    .unwrap();
    assert_eq!(left.read(), 22);
}
