//! A discrete cell that emits `true` exactly on the sweeps where a plain
//! value cell strictly exceeds the running maximum it has seen so far.

use std::cell::RefCell;
use std::rc::Rc;

use trellis::Cell;

#[test]
fn emits_true_only_on_strict_new_highs() {
    let running_max = Rc::new(RefCell::new(0i32));
    let emitted = Rc::new(RefCell::new(Vec::<bool>::new()));

    let value = Cell::new_value(0i32);
    let new_high = {
        let value = value.clone();
        let running_max = Rc::clone(&running_max);
        let emitted = Rc::clone(&emitted);
        Cell::new_discrete_computed(false, move || {
            let v = value.read();
            let is_new_high = v > *running_max.borrow();
            if is_new_high {
                *running_max.borrow_mut() = v;
            }
            emitted.borrow_mut().push(is_new_high);
            is_new_high
        })
    };
    new_high.read(); // activate; links new_high to value
    emitted.borrow_mut().clear();

    for v in [7, 9, 3, 16] {
        trellis::modifier(|| value.write(v).unwrap()).unwrap();
    }

    assert_eq!(*emitted.borrow(), vec![true, true, false, true]);
}
