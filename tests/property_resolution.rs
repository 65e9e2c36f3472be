use anvil_di::{ConstructionPlan, Ctor, Injectable, Injector, Singleton, TypeInfo};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Stamp {
    serial: usize,
}

impl Injectable for Stamp {
    fn type_info() -> TypeInfo {
        TypeInfo::concrete::<Self>().plan(
            ConstructionPlan::builder::<Self>()
                .constructor(Ctor::new("new", 0, |_cx| Ok(Stamp { serial: 0 })))
                .build(),
        )
    }
}

fn counting_injector() -> (Injector, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let injector = Injector::new();
    injector.set_factory(move |_cx| {
        Ok(Stamp {
            serial: seen.fetch_add(1, Ordering::SeqCst) + 1,
        })
    });
    (injector, calls)
}

proptest! {
    /// Transient resolution runs the factory once per request and every
    /// returned handle is distinct.
    #[test]
    fn transient_resolutions_are_fresh(count in 1usize..24) {
        let (injector, calls) = counting_injector();

        let mut resolved = Vec::with_capacity(count);
        for _ in 0..count {
            resolved.push(injector.get_required::<Stamp>());
        }

        prop_assert_eq!(calls.load(Ordering::SeqCst), count);
        for (index, left) in resolved.iter().enumerate() {
            for right in &resolved[index + 1..] {
                prop_assert!(!Arc::ptr_eq(left, right));
            }
        }
    }

    /// A singleton factory runs exactly once no matter how many times
    /// the type is resolved.
    #[test]
    fn singleton_factory_runs_once(count in 1usize..24) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let injector = Injector::new();
        injector.set_factory_lifetime(
            move |_cx| {
                Ok(Stamp {
                    serial: seen.fetch_add(1, Ordering::SeqCst) + 1,
                })
            },
            Arc::new(Singleton::new()),
        );

        let first = injector.get_required::<Stamp>();
        for _ in 1..count {
            let next = injector.get_required::<Stamp>();
            prop_assert!(Arc::ptr_eq(&first, &next));
        }
        prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// An instance registration hands out the identical value across
    /// arbitrary resolution counts.
    #[test]
    fn instance_registration_is_stable(count in 1usize..24) {
        let injector = Injector::new();
        injector.set_instance(Stamp { serial: 77 });

        let first = injector.get_required::<Stamp>();
        prop_assert_eq!(first.serial, 77);
        for _ in 0..count {
            let next = injector.get_required::<Stamp>();
            prop_assert!(Arc::ptr_eq(&first, &next));
        }
    }
}
