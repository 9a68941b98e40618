//--------------------------------------------------------------------------------------------------
// TEST MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Integration tests for properties, publishers and the observation manager.
// Covers the value-change scenarios and the concurrent registration scenarios.
//--------------------------------------------------------------------------------------------------

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use parking_lot::Mutex;

use bindery::{EventHandlerToken, EventPublisher, ObservationManager, Property, ValueChange};

#[test]
fn test_handler_sees_each_change_until_removed() {
    common::init_tracing();

    let property = Property::new("A".to_string());
    let last = Arc::new(Mutex::new(None));
    let calls = Arc::new(AtomicUsize::new(0));

    let (slot, c) = (last.clone(), calls.clone());
    let token = property.add_event_handler(move |event: &ValueChange<String>| {
        *slot.lock() = Some(event.clone());
        c.fetch_add(1, Ordering::SeqCst);
    });

    property.set("B".to_string());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*last.lock(), Some(ValueChange::new("A".to_string(), "B".to_string())));

    property.set("C".to_string());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*last.lock(), Some(ValueChange::new("B".to_string(), "C".to_string())));

    property.remove_event_handler(token);
    property.set("D".to_string());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_bind_scenario() {
    common::init_tracing();

    let manager = ObservationManager::new();
    let p = Arc::new(Property::new("X".to_string()));
    let q = Arc::new(Property::new(String::new()));

    manager.bind(&p, &q);
    assert_eq!(q.get(), "X");

    p.set("Y".to_string());
    assert_eq!(q.get(), "Y");

    q.set("Z".to_string());
    assert_eq!(p.get(), "Y");
    assert_eq!(q.get(), "Z");
}

#[test]
fn test_bind_chain_propagates() {
    let manager = ObservationManager::new();
    let a = Arc::new(Property::new(1));
    let b = Arc::new(Property::new(0));
    let c = Arc::new(Property::new(0));

    manager.bind(&a, &b);
    manager.bind(&b, &c);
    assert_eq!(c.get(), 1);

    a.set(5);
    assert_eq!(b.get(), 5);
    assert_eq!(c.get(), 5);
}

#[test]
fn test_table_size_tracks_adds_and_removes() {
    let property = Property::new(0u8);
    let tokens: Vec<EventHandlerToken> = (0..10).map(|_| property.add_event_handler(|_| {})).collect();
    assert_eq!(property.handler_count(), 10);

    for token in &tokens[..4] {
        property.remove_event_handler(*token);
    }
    // Removing again changes nothing.
    for token in &tokens[..4] {
        property.remove_event_handler(*token);
    }
    assert_eq!(property.handler_count(), 6);
}

#[test]
fn test_publish_without_handlers_is_noop() {
    let property = Property::new(0);
    property.set(1);
    property.publish(ValueChange::new(1, 2));
    assert_eq!(property.get(), 1);
}

#[test]
fn test_concurrent_add_then_remove() {
    common::init_tracing();

    let property = Arc::new(Property::new(0));

    let tokens: Vec<EventHandlerToken> = (0..100)
        .map(|_| {
            let property = property.clone();
            thread::spawn(move || property.add_event_handler(|_| {}))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(property.handler_count(), 100);
    let unique: HashSet<EventHandlerToken> = tokens.iter().copied().collect();
    assert_eq!(unique.len(), 100);

    let handles: Vec<_> = tokens
        .into_iter()
        .map(|token| {
            let property = property.clone();
            thread::spawn(move || property.remove_event_handler(token))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(property.handler_count(), 0);
}

#[test]
fn test_concurrent_observe_then_unobserve() {
    let manager = Arc::new(ObservationManager::new());
    let property = Arc::new(Property::new(0));

    let observations: Vec<_> = (0..100)
        .map(|_| {
            let (manager, property) = (manager.clone(), property.clone());
            thread::spawn(move || manager.observe(&property, |_| {}))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(manager.len(), 100);
    assert_eq!(property.handler_count(), 100);

    let handles: Vec<_> = observations
        .into_iter()
        .map(|observation| {
            let manager = manager.clone();
            thread::spawn(move || manager.unobserve(&observation))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(manager.is_empty());
    assert_eq!(property.handler_count(), 0);
}

#[test]
fn test_concurrent_writers_produce_consistent_chain() {
    const WRITERS: usize = 8;
    const WRITES: usize = 50;

    let property = Arc::new(Property::new(0usize));
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = events.clone();
    property.add_event_handler(move |event: &ValueChange<usize>| log.lock().push(event.clone()));

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let property = property.clone();
            thread::spawn(move || {
                for i in 0..WRITES {
                    property.set(writer * 1000 + i + 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Events are recorded inside the write's critical section, so the log is
    // the serialization order: each old value is the previous new value.
    let events = events.lock();
    assert_eq!(events.len(), WRITERS * WRITES);
    assert_eq!(events[0].old_value, 0);
    for pair in events.windows(2) {
        assert_eq!(pair[1].old_value, pair[0].new_value);
    }
    assert_eq!(events.last().map(|e| e.new_value), Some(property.get()));
}

#[test]
fn test_silent_update_sets_baseline_for_next_event() {
    let property = Property::new(10);
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = events.clone();
    property.add_event_handler(move |event: &ValueChange<i32>| log.lock().push(event.clone()));

    property.set(11);
    property.silently_update(20);
    property.silently_update(21);
    property.set(22);

    assert_eq!(*events.lock(), vec![ValueChange::new(10, 11), ValueChange::new(21, 22)]);
}

#[test]
fn test_unobserve_all_leaves_no_handlers() {
    let manager = ObservationManager::new();
    let producers: Vec<Arc<Property<i32>>> = (0..5).map(|i| Arc::new(Property::new(i))).collect();
    let targets: Vec<Arc<Property<i32>>> = (0..5).map(|_| Arc::new(Property::new(0))).collect();

    for (producer, target) in producers.iter().zip(&targets) {
        manager.observe(producer, |_| {});
        manager.bind(producer, target);
    }
    assert_eq!(manager.len(), 10);

    manager.unobserve_all();

    assert!(manager.is_empty());
    for producer in &producers {
        assert_eq!(producer.handler_count(), 0);
    }
}

#[test]
fn test_manager_keeps_unreferenced_producer_alive() {
    let manager = ObservationManager::new();
    let target = Arc::new(Property::new(String::new()));

    let weak = {
        let producer = Arc::new(Property::new("kept".to_string()));
        manager.bind(&producer, &target);
        Arc::downgrade(&producer)
    };

    let producer = weak.upgrade().unwrap();
    producer.set("still bound".to_string());
    assert_eq!(target.get(), "still bound");
    drop(producer);

    drop(manager);
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_removing_handler_that_owns_an_observer_of_the_same_producer() {
    common::init_tracing();

    struct Holder {
        observations: ObservationManager,
    }

    let property = Arc::new(Property::new(0));
    let holder = Arc::new(Holder {
        observations: ObservationManager::new(),
    });
    holder.observations.observe(&property, |_| {});

    // This handler holds the only reference to the holder, so removing it
    // drops the holder's manager, which removes its own handler in turn.
    let token = property.add_event_handler(move |_| {
        let _ = &holder;
    });
    assert_eq!(property.handler_count(), 2);

    property.remove_event_handler(token);
    assert_eq!(property.handler_count(), 0);
}

#[test]
fn test_observe_racing_unobserve_all_leaves_nothing_behind() {
    const OBSERVERS: usize = 16;
    const ROUNDS: usize = 50;

    let manager = Arc::new(ObservationManager::new());
    let property = Arc::new(Property::new(0));
    let done = Arc::new(AtomicUsize::new(0));

    let observers: Vec<_> = (0..OBSERVERS)
        .map(|_| {
            let (manager, property, done) = (manager.clone(), property.clone(), done.clone());
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    manager.observe(&property, |_| {});
                }
                done.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    let sweeper = {
        let (manager, done) = (manager.clone(), done.clone());
        thread::spawn(move || {
            while done.load(Ordering::SeqCst) < OBSERVERS {
                manager.unobserve_all();
                thread::yield_now();
            }
        })
    };

    for handle in observers {
        handle.join().unwrap();
    }
    sweeper.join().unwrap();

    // Every installed handler is tracked, so one final sweep removes them all.
    assert_eq!(property.handler_count(), manager.len());
    manager.unobserve_all();
    assert!(manager.is_empty());
    assert_eq!(property.handler_count(), 0);
}
