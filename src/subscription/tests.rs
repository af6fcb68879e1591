use assert_call::{call, CallRecorder};

use crate::{Atom, Subscription};

#[test]
fn drop_removes_only_its_watcher() {
    let mut cr = CallRecorder::new();
    let atom = Atom::new(0);
    let w0 = atom.watch(|_, new| call!("w0 {new}"));
    let _w1 = atom.watch(|_, new| call!("w1 {new}"));
    assert_eq!(atom.watcher_count(), 2);

    drop(w0);
    assert_eq!(atom.watcher_count(), 1);
    atom.reset(1).unwrap();
    cr.verify("w1 1");
}

#[test]
fn dropped_watcher_is_not_called_after_slot_reuse() {
    let mut cr = CallRecorder::new();
    let atom = Atom::new(0);
    drop(atom.watch(|_, _| call!("gone")));
    let _w = atom.watch(|_, new| call!("w {new}"));
    assert_eq!(atom.watcher_count(), 1);

    atom.reset(2).unwrap();
    cr.verify("w 2");
}

#[test]
fn outliving_the_atom_is_noop() {
    let mut cr = CallRecorder::new();
    let atom = Atom::new(0);
    let w = atom.watch(|_, _| call!("w"));
    drop(atom);
    drop(w);
    cr.verify(());
}

#[test]
fn detach_keeps_watcher() {
    let mut cr = CallRecorder::new();
    let atom = Atom::new(0);
    atom.watch(|_, new| call!("w {new}")).detach();
    assert_eq!(atom.watcher_count(), 1);

    atom.reset(3).unwrap();
    cr.verify("w 3");
}

#[test]
fn from_fn_runs_on_drop() {
    let mut cr = CallRecorder::new();
    let s = Subscription::from_fn(|| call!("drop"));
    assert_eq!(format!("{s:?}"), "Subscription(<active>)");
    cr.verify(());
    drop(s);
    cr.verify("drop");
}

#[test]
fn empty_does_nothing() {
    let mut cr = CallRecorder::new();
    let s = Subscription::empty();
    assert_eq!(format!("{s:?}"), "Subscription(<empty>)");
    drop(s);
    drop(Subscription::default());
    cr.verify(());
}
