//! A sensor's external subscription should track whether anything is
//! actually listening to it, and a connected effector's writes should go
//! straight to its sink rather than touching its own value.

use std::cell::RefCell;
use std::rc::Rc;

use trellis::Cell;

#[test]
fn connect_fires_on_first_listener_and_disconnect_on_the_last() {
    let connections = Rc::new(RefCell::new(0u32));
    let reading = Rc::new(RefCell::new(10i32));

    let sensor = {
        let connections_connect = Rc::clone(&connections);
        let connections_disconnect = Rc::clone(&connections);
        let reading = Rc::clone(&reading);
        Cell::new_sensor(
            move || {
                *connections_connect.borrow_mut() += 1;
            },
            move |()| {
                *connections_disconnect.borrow_mut() -= 1;
            },
            move || *reading.borrow(),
        )
    };
    assert_eq!(*connections.borrow(), 0, "nothing has listened yet");

    {
        let watching = sensor.clone();
        let listener = Cell::<()>::new_observer(move || {
            watching.read();
        });
        listener.read();
        assert_eq!(*connections.borrow(), 1);
    }
    // `listener` just dropped, taking its subscription with it.
    assert_eq!(*connections.borrow(), 0);
}

#[test]
fn connected_effector_writes_reach_the_sink_not_the_value() {
    let sunk = Rc::new(RefCell::new(Vec::<i32>::new()));
    let reading = Rc::new(RefCell::new(100i32));

    let effector = {
        let sunk = Rc::clone(&sunk);
        let reading = Rc::clone(&reading);
        Cell::new_connected_effector(
            || (),
            |()| {},
            move || *reading.borrow(),
            move |value: i32| sunk.borrow_mut().push(value),
        )
    };

    assert_eq!(effector.read(), 100);
    trellis::modifier(|| effector.write(7).unwrap()).unwrap();
    assert_eq!(*sunk.borrow(), vec![7]);
    assert_eq!(effector.read(), 100, "value still comes from `read`, not writes");
}
