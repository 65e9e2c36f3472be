use anvil_di::{
    ConstructionPlan, Ctor, DiError, Injectable, Injector, MemoryScope, PerResolve, PerScope,
    PerThread, Singleton, TypeInfo,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

struct Token {
    serial: usize,
}

impl Injectable for Token {
    fn type_info() -> TypeInfo {
        TypeInfo::concrete::<Self>().plan(
            ConstructionPlan::builder::<Self>()
                .constructor(Ctor::new("new", 0, |_cx| Ok(Token { serial: 0 })))
                .build(),
        )
    }
}

fn counting_injector(manager: Arc<dyn anvil_di::LifetimeManager>) -> (Injector, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let injector = Injector::new();
    injector.set_factory_lifetime(
        move |_cx| {
            Ok(Token {
                serial: seen.fetch_add(1, Ordering::SeqCst) + 1,
            })
        },
        manager,
    );
    (injector, calls)
}

#[test]
fn singleton_concurrent_first_use_invokes_factory_once() {
    const THREADS: usize = 8;

    let (injector, calls) = counting_injector(Arc::new(Singleton::new()));
    let barrier = Barrier::new(THREADS);
    let resolved: Mutex<Vec<Arc<Token>>> = Mutex::new(Vec::new());

    crossbeam_utils::thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|_| {
                barrier.wait();
                let token = injector.get_required::<Token>();
                resolved.lock().unwrap().push(token);
            });
        }
    })
    .unwrap();

    let resolved = resolved.into_inner().unwrap();
    assert_eq!(resolved.len(), THREADS);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for token in &resolved[1..] {
        assert!(Arc::ptr_eq(&resolved[0], token));
    }
}

#[test]
fn singleton_does_not_cache_a_failed_attempt() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();

    let injector = Injector::new();
    injector.set_factory_lifetime(
        move |_cx| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DiError::ResolutionFailure {
                    type_name: "Token".to_string(),
                    message: "backend unavailable".to_string(),
                })
            } else {
                Ok(Token { serial: 1 })
            }
        },
        Arc::new(Singleton::new()),
    );

    assert!(injector.get::<Token>().is_err());
    // the failure is not cached; the next call retries construction
    assert_eq!(injector.get_required::<Token>().serial, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn per_thread_caches_one_instance_per_thread() {
    let (injector, calls) = counting_injector(Arc::new(PerThread::new()));

    let here_a = injector.get_required::<Token>();
    let here_b = injector.get_required::<Token>();
    assert!(Arc::ptr_eq(&here_a, &here_b));

    let elsewhere = crossbeam_utils::thread::scope(|scope| {
        scope
            .spawn(|_| {
                let first = injector.get_required::<Token>();
                let second = injector.get_required::<Token>();
                assert!(Arc::ptr_eq(&first, &second));
                first.serial
            })
            .join()
            .unwrap()
    })
    .unwrap();

    assert_ne!(here_a.serial, elsewhere);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn per_scope_reuses_within_a_scope_and_not_across() {
    let (injector, calls) = counting_injector(Arc::new(PerScope::new()));

    let first_scope = Arc::new(MemoryScope::new());
    injector.set_scope_provider(first_scope.clone());

    let a = injector.get_required::<Token>();
    let b = injector.get_required::<Token>();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // a new unit of work gets a fresh instance
    injector.set_scope_provider(Arc::new(MemoryScope::new()));
    let c = injector.get_required::<Token>();
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // returning to the first scope finds its stored value again
    injector.set_scope_provider(first_scope);
    let d = injector.get_required::<Token>();
    assert!(Arc::ptr_eq(&a, &d));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn per_scope_without_provider_fails_naming_the_type() {
    let (injector, _calls) = counting_injector(Arc::new(PerScope::new()));

    match injector.get::<Token>() {
        Err(DiError::ResolutionFailure { type_name, message }) => {
            assert!(type_name.contains("Token"));
            assert!(message.contains("scope provider"));
        }
        other => panic!("expected failure, got {:?}", other.map(|_| ())),
    }
}

struct Pair {
    left: Arc<Token>,
    right: Arc<Token>,
}

impl Injectable for Pair {
    fn type_info() -> TypeInfo {
        TypeInfo::concrete::<Self>().plan(
            ConstructionPlan::builder::<Self>()
                .constructor(Ctor::new("new", 2, |cx| {
                    Ok(Pair {
                        left: cx.get::<Token>()?,
                        right: cx.get::<Token>()?,
                    })
                }))
                .build(),
        )
    }
}

#[test]
fn per_resolve_shares_one_instance_within_a_resolution_tree() {
    let (injector, calls) = counting_injector(Arc::new(PerResolve::new()));

    let pair = injector.get_required::<Pair>();
    assert!(Arc::ptr_eq(&pair.left, &pair.right));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // separate top-level resolutions construct anew
    let again = injector.get_required::<Pair>();
    assert!(!Arc::ptr_eq(&pair.left, &again.left));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn transient_default_constructs_every_time() {
    let (injector, calls) = counting_injector(Arc::new(anvil_di::Transient::new()));

    let a = injector.get_required::<Token>();
    let b = injector.get_required::<Token>();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
