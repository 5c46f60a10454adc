//! Selection: what a subscription observes and when it stays quiet.

use std::rc::Rc;

pub(crate) type Projection<S, T> = Rc<dyn Fn(&Rc<S>) -> Rc<T>>;
type Filter<T> = Box<dyn Fn(&T, &T) -> bool>;

/// Describes the substate a subscriber receives and which updates it skips.
///
/// A selection starts out as the identity projection with no filters. Build
/// it up inside [`Store::subscribe_with`](crate::Store::subscribe_with):
///
/// ```ignore
/// store.subscribe_with(&view, |s| s.select(|state| state.count).skip_repeats());
/// ```
pub struct Selection<S, T> {
    project: Projection<S, T>,
    filters: Vec<Filter<T>>,
}

impl<S: 'static> Selection<S, S> {
    pub(crate) fn identity() -> Self {
        Self {
            project: Rc::new(|state: &Rc<S>| Rc::clone(state)),
            filters: Vec::new(),
        }
    }
}

impl<S: 'static, T: 'static> Selection<S, T> {
    /// Narrow the observed value further.
    ///
    /// Filters added before this call compared the old value type and are
    /// discarded.
    pub fn select<U, F>(self, f: F) -> Selection<S, U>
    where
        U: 'static,
        F: Fn(&T) -> U + 'static,
    {
        let inner = self.project;
        Selection {
            project: Rc::new(move |state: &Rc<S>| Rc::new(f(&*inner(state)))),
            filters: Vec::new(),
        }
    }

    /// Skip a delivery when `predicate(last_delivered, new)` is true.
    pub fn skip_repeats_by<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&T, &T) -> bool + 'static,
    {
        self.filters.push(Box::new(predicate));
        self
    }

    /// Alias of [`skip_repeats_by`](Self::skip_repeats_by).
    pub fn skip_when<P>(self, predicate: P) -> Self
    where
        P: Fn(&T, &T) -> bool + 'static,
    {
        self.skip_repeats_by(predicate)
    }

    /// Deliver only when `predicate(last_delivered, new)` is true.
    pub fn only_when<P>(self, predicate: P) -> Self
    where
        P: Fn(&T, &T) -> bool + 'static,
    {
        self.skip_repeats_by(move |last: &T, next: &T| !predicate(last, next))
    }

    pub(crate) fn project(&self, state: &Rc<S>) -> Rc<T> {
        (self.project)(state)
    }

    /// True if any filter rejects `next`.
    pub(crate) fn should_skip(&self, last: &T, next: &T) -> bool {
        self.filters.iter().any(|filter| filter(last, next))
    }
}

impl<S: 'static, T: PartialEq + 'static> Selection<S, T> {
    /// Skip deliveries equal to the last delivered value.
    pub fn skip_repeats(self) -> Self {
        self.skip_repeats_by(|last: &T, next: &T| last == next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Counter {
        count: i32,
        label: &'static str,
    }

    fn state(count: i32) -> Rc<Counter> {
        Rc::new(Counter { count, label: "c" })
    }

    #[test]
    fn test_identity_returns_same_allocation() {
        let selection = Selection::<Counter, Counter>::identity();
        let s = state(1);
        assert!(Rc::ptr_eq(&selection.project(&s), &s));
        assert!(!selection.should_skip(&s, &s));
    }

    #[test]
    fn test_select_composes() {
        let selection = Selection::<Counter, Counter>::identity()
            .select(|c| c.count)
            .select(|count| count * 10);
        assert_eq!(*selection.project(&state(4)), 40);
    }

    #[test]
    fn test_select_discards_earlier_filters() {
        let selection = Selection::<Counter, Counter>::identity()
            .skip_repeats()
            .select(|c| c.label);
        assert!(!selection.should_skip(&"c", &"c"));
    }

    #[test]
    fn test_any_filter_skips() {
        let selection = Selection::<Counter, Counter>::identity()
            .select(|c| c.count)
            .skip_repeats()
            .skip_when(|_, next| *next < 0);
        assert!(selection.should_skip(&1, &1));
        assert!(selection.should_skip(&1, &-3));
        assert!(!selection.should_skip(&1, &2));
    }

    #[test]
    fn test_only_when_inverts() {
        let selection = Selection::<Counter, Counter>::identity()
            .select(|c| c.count)
            .only_when(|last, next| next > last);
        assert!(!selection.should_skip(&1, &2));
        assert!(selection.should_skip(&2, &1));
    }
}
