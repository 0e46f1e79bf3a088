//! A filtered value that only moves when the raw input strays further than a
//! threshold from where the filter currently sits — which requires the
//! filter's own rule to read its own prior output.

use std::cell::RefCell;
use std::rc::Rc;

use trellis::Cell;

#[test]
fn filtered_value_tracks_only_beyond_the_threshold() {
    let value = Cell::new_value(0i32);
    let threshold = Cell::new_value(5i32);

    let filtered_slot: Rc<RefCell<Option<Cell<i32>>>> = Rc::new(RefCell::new(None));
    let filtered = {
        let value = value.clone();
        let threshold = threshold.clone();
        let slot = Rc::clone(&filtered_slot);
        Cell::new_computed(0, move || {
            let v = value.read();
            let t = threshold.read();
            // The very first recompute runs during `Cell::new_computed` itself,
            // before `filtered_slot` below is populated; treat that as "no prior
            // output yet" rather than panicking.
            let prev = match slot.borrow().as_ref() {
                Some(filtered) => filtered.read(),
                None => 0,
            };
            if (v - prev).abs() > t {
                v
            } else {
                prev
            }
        })
    };
    *filtered_slot.borrow_mut() = Some(filtered.clone());

    let mut seen = Vec::new();
    for v in [1, 6, 2, 10] {
        trellis::modifier(|| value.write(v).unwrap()).unwrap();
        seen.push(filtered.read());
    }
    assert_eq!(seen, vec![0, 6, 6, 6]);

    trellis::modifier(|| threshold.write(3).unwrap()).unwrap();
    assert_eq!(filtered.read(), 10);
}
