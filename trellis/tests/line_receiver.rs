//! A byte-oriented input cell, fed one chunk at a time, split into complete
//! lines by an internal buffer. A rule that finds more than one terminated
//! line in its buffer calls `repeat()` to drain them all within the same
//! sweep, rather than waiting for a later external event.

use std::cell::RefCell;
use std::rc::Rc;

use trellis::Cell;

fn split_one_line(buf: &mut String) -> Option<String> {
    let pos = buf.find('\n')?;
    let mut line: String = buf.drain(..=pos).collect();
    line.pop(); // the '\n' itself
    if line.ends_with('\r') {
        line.pop();
    }
    Some(line)
}

struct Receiver {
    bytes: Cell<String>,
    buffer: Rc<RefCell<String>>,
    last_chunk: Rc<RefCell<String>>,
    lines: Rc<RefCell<Vec<String>>>,
    #[allow(dead_code)]
    line: Cell<String>,
}

impl Receiver {
    fn new() -> Self {
        let bytes = Cell::new_discrete(String::new());
        let buffer = Rc::new(RefCell::new(String::new()));
        let last_chunk = Rc::new(RefCell::new(String::new()));
        let lines = Rc::new(RefCell::new(Vec::new()));

        let line = {
            let bytes = bytes.clone();
            let buffer = Rc::clone(&buffer);
            let last_chunk = Rc::clone(&last_chunk);
            let lines = Rc::clone(&lines);
            Cell::new_discrete_computed(String::new(), move || {
                let chunk = bytes.read();
                if !chunk.is_empty() && *last_chunk.borrow() != chunk {
                    buffer.borrow_mut().push_str(&chunk);
                    *last_chunk.borrow_mut() = chunk;
                }
                let mut buf = buffer.borrow_mut();
                match split_one_line(&mut buf) {
                    Some(extracted) => {
                        if buf.contains('\n') {
                            trellis::repeat();
                        }
                        drop(buf);
                        lines.borrow_mut().push(extracted.clone());
                        extracted
                    }
                    None => String::new(),
                }
            })
        };
        line.read(); // activate; links `line` as a listener of `bytes`

        Self {
            bytes,
            buffer,
            last_chunk,
            lines,
            line,
        }
    }

    fn deliver(&self, chunk: &str) {
        trellis::modifier(|| self.bytes.write(chunk.to_string()).unwrap()).unwrap();
    }
}

#[test]
fn single_fragment_without_a_newline_emits_nothing() {
    let rx = Receiver::new();
    rx.deliver("xyz");
    rx.deliver("\r");
    rx.deliver("\n");
    assert_eq!(*rx.lines.borrow(), vec!["xyz".to_string()]);
    assert_eq!(*rx.buffer.borrow(), "");
}

#[test]
fn one_chunk_with_two_terminated_lines_drains_both_via_repeat() {
    let rx = Receiver::new();
    rx.deliver("abc\r\nghi\r\nmno");
    assert_eq!(*rx.lines.borrow(), vec!["abc".to_string(), "ghi".to_string()]);
    assert_eq!(*rx.buffer.borrow(), "mno");
}
