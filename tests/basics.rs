use anvil_di::{
    ConstructionPlan, Ctor, DiError, Implements, Injectable, Injector, Singleton, TypeInfo,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Plain {
    value: u32,
}

impl Injectable for Plain {
    fn type_info() -> TypeInfo {
        TypeInfo::concrete::<Self>().plan(
            ConstructionPlan::builder::<Self>()
                .constructor(Ctor::new("new", 0, |cx| Ok(Plain { value: cx.zero() })))
                .build(),
        )
    }
}

#[test]
fn default_construction_returns_fresh_instances() {
    let injector = Injector::new();

    let a = injector.get_required::<Plain>();
    let b = injector.get_required::<Plain>();

    assert_eq!(a.value, 0);
    assert!(!Arc::ptr_eq(&a, &b)); // transient by default
}

struct Widest {
    tag: &'static str,
}

impl Injectable for Widest {
    fn type_info() -> TypeInfo {
        TypeInfo::concrete::<Self>().plan(
            ConstructionPlan::builder::<Self>()
                .constructor(Ctor::new("narrow", 1, |_cx| Ok(Widest { tag: "narrow" })))
                .constructor(Ctor::new("wide", 3, |_cx| Ok(Widest { tag: "wide" })))
                .constructor(
                    Ctor::new("excluded", 9, |_cx| Ok(Widest { tag: "excluded" })).ignored(),
                )
                .build(),
        )
    }
}

#[test]
fn widest_eligible_constructor_wins() {
    let injector = Injector::new();
    assert_eq!(injector.get_required::<Widest>().tag, "wide");
}

struct Marked {
    tag: &'static str,
}

impl Injectable for Marked {
    fn type_info() -> TypeInfo {
        TypeInfo::concrete::<Self>().plan(
            ConstructionPlan::builder::<Self>()
                .constructor(Ctor::new("wide", 4, |_cx| Ok(Marked { tag: "wide" })))
                .constructor(
                    Ctor::new("chosen", 0, |_cx| Ok(Marked { tag: "chosen" })).preferred(),
                )
                .build(),
        )
    }
}

#[test]
fn preferred_constructor_beats_parameter_count() {
    let injector = Injector::new();
    assert_eq!(injector.get_required::<Marked>().tag, "chosen");
}

struct DoubleMarked {
    tag: &'static str,
}

impl Injectable for DoubleMarked {
    fn type_info() -> TypeInfo {
        TypeInfo::concrete::<Self>().plan(
            ConstructionPlan::builder::<Self>()
                .constructor(
                    Ctor::new("first", 0, |_cx| Ok(DoubleMarked { tag: "first" })).preferred(),
                )
                .constructor(
                    Ctor::new("second", 2, |_cx| Ok(DoubleMarked { tag: "second" })).preferred(),
                )
                .build(),
        )
    }
}

#[test]
fn several_preferred_constructors_pick_deterministically() {
    let injector = Injector::new();
    // first declared wins, no error
    assert_eq!(injector.get_required::<DoubleMarked>().tag, "first");
}

struct Dependent {
    plain: Arc<Plain>,
}

impl Injectable for Dependent {
    fn type_info() -> TypeInfo {
        TypeInfo::concrete::<Self>().plan(
            ConstructionPlan::builder::<Self>()
                .constructor(Ctor::new("new", 1, |cx| {
                    Ok(Dependent {
                        plain: cx.get::<Plain>()?,
                    })
                }))
                .build(),
        )
    }
}

#[test]
fn constructor_parameters_resolve_recursively() {
    let injector = Injector::new();
    injector.set_instance(Plain { value: 11 });

    let dependent = injector.get_required::<Dependent>();
    assert_eq!(dependent.plain.value, 11);
}

trait Charge: Send + Sync {
    fn provider(&self) -> &'static str;
}

struct Gateway(Arc<dyn Charge>);

impl Injectable for Gateway {
    fn type_info() -> TypeInfo {
        TypeInfo::abstraction::<Self>()
    }
}

struct StripeCharge;

impl Charge for StripeCharge {
    fn provider(&self) -> &'static str {
        "stripe"
    }
}

impl Injectable for StripeCharge {
    fn type_info() -> TypeInfo {
        TypeInfo::concrete::<Self>().plan(
            ConstructionPlan::builder::<Self>()
                .constructor(Ctor::new("new", 0, |_cx| Ok(StripeCharge)))
                .build(),
        )
    }
}

impl Implements<Gateway> for StripeCharge {
    fn upcast(this: Arc<Self>) -> Gateway {
        Gateway(this)
    }
}

#[test]
fn abstraction_resolves_through_configured_concrete() {
    let injector = Injector::new();

    let unresolved = injector.get::<Gateway>();
    assert!(matches!(
        unresolved,
        Err(DiError::UnresolvableAbstraction(_))
    ));

    injector.set_resolver::<Gateway, StripeCharge>();
    let gateway = injector.get_required::<Gateway>();
    assert_eq!(gateway.0.provider(), "stripe");
}

#[test]
fn reconfiguration_replaces_poisoned_entry() {
    let injector = Injector::new();

    // poison is cached on first use
    assert!(injector.get::<Gateway>().is_err());
    assert!(injector.get::<Gateway>().is_err());

    injector.set_resolver::<Gateway, StripeCharge>();
    assert_eq!(injector.get_required::<Gateway>().0.provider(), "stripe");
}

#[test]
fn trait_registration_resolves_implementation() {
    let injector = Injector::new();
    injector.set_trait_resolver::<dyn Charge, StripeCharge, _>(|c| c);

    let charge = injector.get_required_trait::<dyn Charge>();
    assert_eq!(charge.provider(), "stripe");
}

#[test]
fn trait_instance_is_shared() {
    let injector = Injector::new();
    injector.set_trait_instance::<dyn Charge>(Arc::new(StripeCharge));

    let a = injector.get_required_trait::<dyn Charge>();
    let b = injector.get_required_trait::<dyn Charge>();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn singleton_resolver_shares_one_instance() {
    let injector = Injector::new();
    injector.set_singleton_resolver::<Gateway, StripeCharge>();

    let a = injector.get_required::<Gateway>();
    let b = injector.get_required::<Gateway>();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn factory_lifetime_controls_caching() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let injector = Injector::new();
    injector.set_factory_lifetime(
        move |cx| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Plain { value: cx.zero() })
        },
        Arc::new(Singleton::new()),
    );

    let a = injector.get_required::<Plain>();
    let b = injector.get_required::<Plain>();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

struct Audited {
    label: &'static str,
    steps: Vec<&'static str>,
}

impl Injectable for Audited {
    fn type_info() -> TypeInfo {
        TypeInfo::concrete::<Self>().plan(
            ConstructionPlan::builder::<Self>()
                .constructor(Ctor::new("new", 0, |_cx| {
                    Ok(Audited {
                        label: "ctor",
                        steps: Vec::new(),
                    })
                }))
                .inject_property("label", |audited, _cx| {
                    audited.label = "auto";
                    audited.steps.push("auto");
                    Ok(())
                })
                .build(),
        )
    }
}

#[test]
fn explicit_initializers_run_after_automatic_ones() {
    let injector = Injector::new();
    injector.for_type::<Audited>().add_property_injector(|audited, _cx| {
        audited.label = "explicit";
        audited.steps.push("explicit");
        Ok(())
    });

    let audited = injector.get_required::<Audited>();
    assert_eq!(audited.steps, vec!["auto", "explicit"]);
    // last writer wins for the property both touched
    assert_eq!(audited.label, "explicit");
}

#[test]
fn reconfiguration_clears_previous_initializers() {
    let injector = Injector::new();
    injector.for_type::<Audited>().add_property_injector(|audited, _cx| {
        audited.label = "stale";
        Ok(())
    });
    assert_eq!(injector.get_required::<Audited>().label, "stale");

    // the record is replaced wholesale
    injector.set_factory(|_cx| {
        Ok(Audited {
            label: "replaced",
            steps: Vec::new(),
        })
    });
    assert_eq!(injector.get_required::<Audited>().label, "replaced");
}

static COUNTED_INFOS: AtomicUsize = AtomicUsize::new(0);

struct Counted;

impl Injectable for Counted {
    fn type_info() -> TypeInfo {
        COUNTED_INFOS.fetch_add(1, Ordering::SeqCst);
        TypeInfo::concrete::<Self>().plan(
            ConstructionPlan::builder::<Self>()
                .constructor(Ctor::new("new", 0, |_cx| Ok(Counted)))
                .build(),
        )
    }
}

#[test]
fn cached_types_skip_rediscovery() {
    let injector = Injector::new();
    injector.get_required::<Counted>();
    injector.get_required::<Counted>();
    injector.get_required::<Counted>();
    assert_eq!(COUNTED_INFOS.load(Ordering::SeqCst), 1);
}

struct SelfLoop {
    _inner: Option<Arc<SelfLoop>>,
}

impl Injectable for SelfLoop {
    fn type_info() -> TypeInfo {
        TypeInfo::concrete::<Self>().plan(
            ConstructionPlan::builder::<Self>()
                .constructor(Ctor::new("new", 1, |cx| {
                    Ok(SelfLoop {
                        _inner: Some(cx.get::<SelfLoop>()?),
                    })
                }))
                .build(),
        )
    }
}

#[test]
fn recursive_dependency_fails_explicitly() {
    let injector = Injector::new();
    let result = injector.get::<SelfLoop>();
    match result {
        Err(DiError::ResolutionRecursion(name)) => assert!(name.contains("SelfLoop")),
        other => panic!("expected recursion error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn untyped_resolution_serves_compiled_entries() {
    use anvil_di::TypeKey;

    let injector = Injector::new();
    let key = TypeKey::of::<Plain>();

    // never resolved through the typed entry point yet
    assert!(injector.get_untyped(&key).is_err());

    injector.get_required::<Plain>();
    let handle = injector.get_untyped(&key).unwrap();
    assert_eq!(handle.downcast::<Plain>().unwrap().value, 0);
}
