//! Two cells share a common subject at different layers. A correct scheduler
//! must settle the shallower one before the deeper one ever reads it, no
//! matter which order the listeners were discovered in.

use std::cell::RefCell;
use std::rc::Rc;

use trellis::Cell;

#[test]
fn deeper_listeners_wait_for_their_subjects_to_settle() {
    let trace: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let x = Cell::new_value(1i32);

    let b = {
        let x = x.clone();
        let trace = Rc::clone(&trace);
        Cell::new_computed(0, move || {
            trace.borrow_mut().push("B");
            x.read()
        })
    };
    let c = {
        let b = b.clone();
        let x = x.clone();
        let trace = Rc::clone(&trace);
        Cell::new_computed((0, 0), move || {
            trace.borrow_mut().push("C");
            (b.read(), x.read())
        })
    };
    let a = {
        let x = x.clone();
        let c = c.clone();
        let trace = Rc::clone(&trace);
        Cell::new_computed((0, (0, 0)), move || {
            trace.borrow_mut().push("A");
            (x.read(), c.read())
        })
    };
    let h = {
        let x = x.clone();
        let c = c.clone();
        let trace = Rc::clone(&trace);
        Cell::new_computed((0, (0, 0)), move || {
            trace.borrow_mut().push("H");
            (x.read(), c.read())
        })
    };

    assert_eq!(h.read(), (1, (1, 1)));
    assert_eq!(a.read(), (1, (1, 1)));
    trace.borrow_mut().clear();

    trellis::modifier(|| x.write(2).unwrap()).unwrap();

    assert_eq!(h.read(), (2, (2, 2)));
    assert_eq!(a.read(), (2, (2, 2)));
    assert_eq!(*trace.borrow(), vec!["B", "C", "A", "H"]);
}
