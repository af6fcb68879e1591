use std::{cell::RefCell, rc::Rc};

use crate::{Atom, Subscription};

/// Something that renders itself from a state value.
pub trait Component<S: ?Sized>: 'static {
    fn render(&self, state: &S);
}
impl<S: ?Sized, F> Component<S> for F
where
    F: Fn(&S) + 'static,
{
    fn render(&self, state: &S) {
        self(state)
    }
}

/// Mounts `component` on `atom`.
///
/// The component is rendered with the current state, then again after every
/// replacement. Dropping the returned `Subscription` unmounts it.
pub fn connect<S: 'static>(atom: &Atom<S>, component: impl Component<S>) -> Subscription {
    let component = Rc::new(component);
    let s = atom.watch({
        let component = component.clone();
        move |_, new| component.render(new)
    });
    component.render(&atom.get());
    s
}

/// Mounts `component` on the part of `atom` picked by `selector`.
///
/// Replacements that leave the selected value unchanged do not re-render.
pub fn connect_select<S: 'static, U: PartialEq + 'static>(
    atom: &Atom<S>,
    selector: impl Fn(&S) -> U + 'static,
    component: impl Component<U>,
) -> Subscription {
    let last = Rc::new(RefCell::new(Rc::new(selector(&atom.get()))));
    let component = Rc::new(component);
    let s = atom.watch({
        let last = last.clone();
        let component = component.clone();
        move |_, new| {
            let next = Rc::new(selector(new));
            if **last.borrow() == *next {
                return;
            }
            *last.borrow_mut() = next.clone();
            component.render(&next);
        }
    });
    let first = last.borrow().clone();
    component.render(&first);
    s
}
