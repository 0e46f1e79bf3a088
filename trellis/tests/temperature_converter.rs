//! Two cells with mutually dependent rules, each derived from the other's
//! prior write, plus an observer watching both.

use std::cell::RefCell;
use std::rc::Rc;

use trellis::Cell;

#[test]
fn mutual_rules_converge_and_observer_fires_once_per_write() {
    let fires = Rc::new(RefCell::new(0u32));

    let f = Cell::new_value(32.0_f64);
    let c = Cell::new_value(0.0_f64);

    let f_rule = {
        let f = f.clone();
        let c = c.clone();
        Cell::<()>::new_effector(move || {
            f.write(c.read() * 1.8 + 32.0).ok();
        })
    };
    let c_rule = {
        let f = f.clone();
        let c = c.clone();
        Cell::<()>::new_effector(move || {
            c.write((f.read() - 32.0) / 1.8).ok();
        })
    };
    let observer = {
        let f = f.clone();
        let c = c.clone();
        let fires = Rc::clone(&fires);
        Cell::<()>::new_observer(move || {
            f.read();
            c.read();
            *fires.borrow_mut() += 1;
        })
    };
    // Activate the effectors and the observer so each is linked as a
    // listener before any external write happens.
    trellis::modifier(|| {
        f_rule.read();
        c_rule.read();
        observer.read();
    })
    .unwrap();
    *fires.borrow_mut() = 0;

    trellis::modifier(|| c.write(100.0).unwrap()).unwrap();
    assert_eq!(f.read(), 212.0);
    assert_eq!(*fires.borrow(), 1);

    trellis::modifier(|| f.write(-40.0).unwrap()).unwrap();
    assert_eq!(c.read(), -40.0);
    assert_eq!(*fires.borrow(), 2);
}
