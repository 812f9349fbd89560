use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lattice_core::container::{Container, ExecutionUnit, Provider, Scope};
use lattice_core::ContainerError;

#[derive(Debug)]
struct Counterpart {
    label: String,
}

fn counterpart_provider(constructions: Arc<AtomicUsize>) -> Provider {
    Provider::builder::<Counterpart>()
        .id("counterpart")
        .scope(Scope::Request)
        .factory(move |_| {
            constructions.fetch_add(1, Ordering::SeqCst);
            // Make the construction window wide enough for real contention
            thread::sleep(Duration::from_millis(20));
            Ok(Counterpart {
                label: "shared".to_string(),
            })
        })
        .build()
        .unwrap()
}

#[test]
fn test_concurrent_resolution_constructs_once() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let container = Container::builder()
        .provider(counterpart_provider(constructions.clone()))
        .build()
        .unwrap();
    let unit = ExecutionUnit::new();

    container.request_scope(&unit).activate().unwrap();

    let mut handles = vec![];
    for _ in 0..8 {
        let container = container.clone();
        let unit = unit.clone();
        handles.push(thread::spawn(move || {
            let handle = container.instance::<Counterpart>(&unit, &[]).unwrap();
            Arc::as_ptr(&handle.get().unwrap()) as usize
        }));
    }
    let pointers: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Exactly one construction; every caller observed the same instance
    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    assert!(pointers.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_destroyed_context_rejects_operations() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let container = Container::builder()
        .provider(counterpart_provider(constructions.clone()))
        .build()
        .unwrap();
    let unit = ExecutionUnit::new();
    let request = container.request_scope(&unit);

    let context = request.activate().unwrap();
    container.instance::<Counterpart>(&unit, &[]).unwrap();
    request.destroy().unwrap();

    // Direct operations on the destroyed context fail with not-active
    let provider = container.provider("counterpart").unwrap();
    assert!(context.get(&provider).unwrap_err().is_not_active());
    assert!(context
        .put(&provider, Arc::new(Counterpart { label: "late".to_string() }))
        .unwrap_err()
        .is_not_active());

    // Resolution fails too, until a new context of the scope is activated
    assert!(container
        .instance::<Counterpart>(&unit, &[])
        .unwrap_err()
        .is_not_active());

    request.activate().unwrap();
    let handle = container.instance::<Counterpart>(&unit, &[]).unwrap();
    assert_eq!(handle.get().unwrap().label, "shared");
    assert_eq!(constructions.load(Ordering::SeqCst), 2);
}

#[test]
fn test_active_context_cardinality_is_three_way() {
    let container = Container::builder().build().unwrap();
    let unit = ExecutionUnit::new();
    let request = container.request_scope(&unit);

    // None active
    assert!(container
        .active_context(Scope::Request, &unit)
        .unwrap()
        .is_none());

    // Exactly one
    let context = request.activate().unwrap();
    let active = container
        .active_context(Scope::Request, &unit)
        .unwrap()
        .unwrap();
    assert_eq!(active.id(), context.id());

    // Forcing a second activation makes the query ambiguous, not a pick
    request.activate().unwrap();
    let err = container.active_context(Scope::Request, &unit).unwrap_err();
    assert!(matches!(
        err,
        ContainerError::AmbiguousContext {
            scope: Scope::Request,
            count: 2,
        }
    ));
}

#[test]
fn test_session_suspend_resume_keeps_instances() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let counter = constructions.clone();
    let container = Container::builder()
        .provider(
            Provider::builder::<Counterpart>()
                .scope(Scope::Session)
                .factory(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Counterpart {
                        label: "session".to_string(),
                    })
                })
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    let unit = ExecutionUnit::new();
    let session = container.session_scope(&unit);

    let context = session.activate().unwrap();
    container.instance::<Counterpart>(&unit, &[]).unwrap();

    // Suspend across a nested boundary, then resume: the instance survives
    let id = session.deactivate().unwrap().unwrap();
    assert_eq!(id, context.id());
    assert!(container
        .instance::<Counterpart>(&unit, &[])
        .unwrap_err()
        .is_not_active());

    session.resume(&id).unwrap();
    container.instance::<Counterpart>(&unit, &[]).unwrap();
    assert_eq!(constructions.load(Ordering::SeqCst), 1);
}

#[test]
fn test_units_do_not_share_request_state() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let container = Container::builder()
        .provider(counterpart_provider(constructions.clone()))
        .build()
        .unwrap();

    let unit_a = ExecutionUnit::new();
    let unit_b = ExecutionUnit::new();
    container.request_scope(&unit_a).activate().unwrap();
    container.request_scope(&unit_b).activate().unwrap();

    container.instance::<Counterpart>(&unit_a, &[]).unwrap();
    container.instance::<Counterpart>(&unit_b, &[]).unwrap();

    // One instance per unit's context
    assert_eq!(constructions.load(Ordering::SeqCst), 2);
    assert_eq!(container.contexts(Scope::Request).unwrap().len(), 2);
}

#[test]
fn test_context_destruction_tears_down_in_reverse_order() {
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let provider = |id: &str, order: &Arc<std::sync::Mutex<Vec<String>>>| {
        let label = id.to_string();
        let order = order.clone();
        Provider::builder::<Counterpart>()
            .id(id)
            .scope(Scope::Request)
            .factory({
                let label = label.clone();
                move |_| {
                    Ok(Counterpart {
                        label: label.clone(),
                    })
                }
            })
            .destroyer(move |value: &Counterpart| {
                order.lock().unwrap().push(value.label.clone());
                Ok(())
            })
            .build()
            .unwrap()
    };

    let container = Container::builder()
        .provider(provider("first", &order))
        .provider(provider("second", &order))
        .build()
        .unwrap();
    let unit = ExecutionUnit::new();
    let request = container.request_scope(&unit);
    request.activate().unwrap();

    let first = container.provider("first").unwrap();
    let second = container.provider("second").unwrap();
    container.instance_for::<Counterpart>(&unit, &first).unwrap();
    container.instance_for::<Counterpart>(&unit, &second).unwrap();

    request.destroy().unwrap();

    assert_eq!(
        *order.lock().unwrap(),
        vec!["second".to_string(), "first".to_string()]
    );
}
