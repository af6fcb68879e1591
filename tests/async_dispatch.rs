use std::{cell::RefCell, rc::Rc};

use assert_call::{call, CallRecorder};
use fluxcell::{Action, DispatchError, Dispatcher};
use futures::{
    channel::{mpsc, oneshot},
    stream,
};
use rt_local::{runtime::core::test, spawn_local, wait_for_idle};

#[derive(Clone, Debug, Default, PartialEq)]
struct Page {
    loading: bool,
    items: Vec<String>,
}

enum Msg {
    Load,
    Loaded(Vec<String>),
}

#[test]
async fn side_effect_result_reenters_through_dispatch() {
    let mut cr = CallRecorder::new();
    let d = Dispatcher::<Page, Msg>::from_state(Page::default());
    let (tx, rx) = oneshot::channel::<Vec<String>>();
    let rx = RefCell::new(Some(rx));
    let tasks = Rc::new(RefCell::new(Vec::new()));
    let h = d.handle();
    let t = tasks.clone();
    d.register("load", move |msg, s| match msg {
        Msg::Load => {
            if let Some(rx) = rx.borrow_mut().take() {
                let h = h.clone();
                t.borrow_mut().push(spawn_local(async move {
                    if let Ok(items) = rx.await {
                        h.dispatch("load", Msg::Loaded(items)).unwrap();
                    }
                }));
            }
            Page {
                loading: true,
                ..s.clone()
            }
        }
        Msg::Loaded(items) => Page {
            loading: false,
            items: items.clone(),
        },
    });
    let _s = d.subscribe(|e| call!("{} loading={}", e.namespace, e.state.loading));

    d.dispatch("load", Msg::Load).unwrap();
    cr.verify("load loading=true");
    wait_for_idle().await;
    cr.verify(());

    tx.send(vec!["a".into(), "b".into()]).unwrap();
    wait_for_idle().await;
    cr.verify("load loading=false");
    assert_eq!(d.state().items, ["a", "b"]);
    assert_eq!(tasks.borrow().len(), 1);
}

#[test]
async fn forward_stream() {
    let d = Dispatcher::<i32, i32>::from_state(0);
    d.register("add", |v, s| s + v);
    d.register("mul", |v, s| s * v);

    let actions = stream::iter([
        Action::new("add", 2),
        Action::new("mul", 5),
        Action::new("add", 1),
    ]);
    d.handle().forward(actions).await.unwrap();
    assert_eq!(*d.state(), 11);
}

#[test]
async fn forward_stops_at_first_error() {
    let d = Dispatcher::<i32, i32>::from_state(0);
    d.register("add", |v, s| s + v);

    let actions = stream::iter([
        Action::new("add", 2),
        Action::new("missing", 5),
        Action::new("add", 1),
    ]);
    let e = d.handle().forward(actions).await.unwrap_err();
    assert_eq!(e, DispatchError::MissingHandler("missing".into()));
    assert_eq!(*d.state(), 2);
}

#[test]
async fn forward_channel_in_background() {
    let mut cr = CallRecorder::new();
    let d = Dispatcher::<i32, i32>::from_state(0);
    d.register("add", |v, s| s + v);
    let _s = d.subscribe(|e| call!("{}", e.state));

    let (tx, rx) = mpsc::unbounded();
    let h = d.handle();
    let _task = spawn_local(async move { h.forward(rx).await });

    tx.unbounded_send(Action::new("add", 1)).unwrap();
    wait_for_idle().await;
    cr.verify("1");

    tx.unbounded_send(Action::new("add", 2)).unwrap();
    tx.unbounded_send(Action::new("add", 3)).unwrap();
    wait_for_idle().await;
    cr.verify(["3", "6"]);
}

#[test]
async fn handle_outliving_dispatcher_is_closed() {
    let d = Dispatcher::<i32, i32>::from_state(0);
    d.register("add", |v, s| s + v);
    let h = d.handle();
    drop(d);

    let r = h.forward(stream::iter([Action::new("add", 1)])).await;
    assert_eq!(r.unwrap_err(), DispatchError::Closed);
}
