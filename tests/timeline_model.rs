//! Differential test against a plain absolute-time model.
//!
//! Every operation is applied to both the scheduler and [`Model`]; after
//! each one the pending registrations (in fire order, with ticks left),
//! the fired sequence and the processed-time counter must agree.

use std::cell::RefCell;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use proptest::prelude::*;
use pulp_timeline::{ActionId, ActionScheduler, Disposition, ScheduleError};

const CAP: usize = 8;

type Sched = ActionScheduler<NoopRawMutex, u32, CAP>;

thread_local! {
    static FIRED: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };
}

fn once(arg: u32) -> Disposition {
    FIRED.with(|f| f.borrow_mut().push(arg));
    Disposition::OneShot
}

fn again(arg: u32) -> Disposition {
    FIRED.with(|f| f.borrow_mut().push(arg));
    Disposition::Reload
}

fn take_fired() -> Vec<u32> {
    FIRED.with(|f| std::mem::take(&mut *f.borrow_mut()))
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: ActionId,
    arg: u32,
    at: u32,
    reload: u32,
    periodic: bool,
}

#[derive(Default)]
struct Model {
    // fire order; ties keep insertion order
    entries: Vec<Entry>,
    fired: Vec<u32>,
    proceeding: u32,
}

impl Model {
    fn insert(&mut self, entry: Entry) {
        let pos = self
            .entries
            .iter()
            .position(|e| e.at > entry.at)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, entry);
    }

    fn cancel(&mut self, id: ActionId) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    fn cancel_all(&mut self, periodic: bool) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.periodic != periodic);
        self.entries.len() != before
    }

    fn proceed(&mut self, mut elapsed: u32) -> bool {
        let mut fired = false;
        while let Some(first) = self.entries.first().copied() {
            if first.at > elapsed {
                break;
            }
            elapsed -= first.at;
            self.proceeding += first.at;
            self.entries.remove(0);
            for e in &mut self.entries {
                e.at -= first.at;
            }
            self.fired.push(first.arg);
            fired = true;
            if first.periodic {
                self.insert(Entry {
                    at: first.reload,
                    ..first
                });
            }
        }
        if !self.entries.is_empty() {
            for e in &mut self.entries {
                e.at -= elapsed;
            }
            self.proceeding += elapsed;
        }
        fired
    }

    fn pending(&self) -> Vec<(ActionId, u32)> {
        self.entries.iter().map(|e| (e.id, e.at)).collect()
    }
}

#[derive(Debug, Clone)]
enum Op {
    Schedule { delay: u32, reload: u32, periodic: bool },
    Cancel(prop::sample::Index),
    CancelAll { periodic: bool },
    Proceed(u32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u32..200, 1u32..120, any::<bool>())
            .prop_map(|(delay, reload, periodic)| Op::Schedule { delay, reload, periodic }),
        2 => any::<prop::sample::Index>().prop_map(Op::Cancel),
        1 => any::<bool>().prop_map(|periodic| Op::CancelAll { periodic }),
        3 => (0u32..300).prop_map(Op::Proceed),
    ]
}

fn pending(sched: &Sched) -> Vec<(ActionId, u32)> {
    let mut out = Vec::new();
    sched.for_each_pending(|id, at| out.push((id, at)));
    out
}

proptest! {
    #[test]
    fn matches_reference_model(ops in prop::collection::vec(op_strategy(), 1..64)) {
        take_fired();
        let sched = Sched::new();
        let mut model = Model::default();
        // every handle ever issued, live or not
        let mut issued: Vec<ActionId> = Vec::new();
        let mut next_arg = 0u32;

        for op in ops {
            match op {
                Op::Schedule { delay, reload, periodic } => {
                    let callback = if periodic { again } else { once };
                    let arg = next_arg;
                    next_arg += 1;
                    let result = sched.schedule_reload(delay, reload, callback, arg);
                    if model.entries.len() == CAP {
                        prop_assert_eq!(result, Err(ScheduleError::Full));
                    } else {
                        let id = result.expect("free slot available");
                        issued.push(id);
                        model.insert(Entry { id, arg, at: delay, reload, periodic });
                    }
                }
                Op::Cancel(pick) => {
                    if issued.is_empty() {
                        continue;
                    }
                    let id = *pick.get(&issued);
                    let mut handle = Some(id);
                    let expected = model.cancel(id);
                    prop_assert_eq!(sched.unschedule(&mut handle), expected);
                    prop_assert_eq!(handle.is_none(), expected);
                }
                Op::CancelAll { periodic } => {
                    let callback = if periodic { again } else { once };
                    prop_assert_eq!(sched.unschedule_all(callback), model.cancel_all(periodic));
                }
                Op::Proceed(elapsed) => {
                    let expected = model.proceed(elapsed);
                    prop_assert_eq!(sched.proceed(elapsed), expected);
                }
            }

            let got = pending(&sched);
            prop_assert!(got.windows(2).all(|w| w[0].1 <= w[1].1), "out of order: {:?}", got);
            prop_assert_eq!(&got, &model.pending());
            prop_assert_eq!(take_fired(), std::mem::take(&mut model.fired));
            prop_assert_eq!(sched.proceeding_time(), model.proceeding);
            prop_assert_eq!(sched.next_event_delay(), model.entries.first().map(|e| e.at));
            prop_assert_eq!(sched.len(), model.entries.len());
            prop_assert!(usize::from(sched.active_nodes_watermark()) >= sched.len());
        }
    }
}

#[test]
fn simultaneous_deadlines_fire_in_registration_order() {
    take_fired();
    let sched = Sched::new();
    for arg in [10, 11, 12] {
        sched.schedule(40, once, arg).unwrap();
    }
    sched.schedule(20, once, 1).unwrap();
    sched.schedule(40, once, 13).unwrap();

    assert!(sched.proceed(40));
    assert_eq!(take_fired(), vec![1, 10, 11, 12, 13]);
}

#[test]
fn full_pool_keeps_existing_registrations() {
    take_fired();
    let sched = Sched::new();
    let ids: Vec<ActionId> = (0..CAP as u32)
        .map(|i| sched.schedule(100 + i, once, i).unwrap())
        .collect();

    assert_eq!(sched.schedule(1, once, 99), Err(ScheduleError::Full));
    assert_eq!(sched.len(), CAP);

    let got: Vec<ActionId> = pending(&sched).into_iter().map(|(id, _)| id).collect();
    assert_eq!(got, ids);

    assert!(sched.proceed(200));
    assert_eq!(take_fired(), (0..CAP as u32).collect::<Vec<_>>());
}
