use anvil_di::{Injectable, OpenType, TypeInfo, TypeKey};

#[test]
fn keys_are_identity_per_closed_type() {
    assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
    assert_ne!(TypeKey::of::<Vec<u8>>(), TypeKey::of::<Vec<u16>>());
    assert_ne!(TypeKey::of::<String>(), TypeKey::of::<Vec<String>>());
}

#[test]
fn trait_object_keys_work() {
    let key = TypeKey::of::<dyn std::fmt::Debug>();
    assert!(key.type_name().contains("Debug"));
    assert!(key.short_name().starts_with("dyn "));
}

#[test]
fn short_names_strip_module_paths() {
    assert_eq!(TypeKey::of::<String>().short_name(), "String");
    assert_eq!(
        TypeKey::of::<Vec<String>>().short_name(),
        "Vec<String>"
    );
}

#[test]
fn open_types_compare_by_marker_identity() {
    struct FirstDef;
    struct SecondDef;

    let first = OpenType::of::<FirstDef>("First", 1);
    let also_first = OpenType::of::<FirstDef>("First", 1);
    let second = OpenType::of::<SecondDef>("Second", 1);

    assert_eq!(first, also_first);
    assert_ne!(first, second);
    assert_eq!(first.arity(), 1);
    assert_eq!(second.name(), "Second");
}

struct Leaf;

impl Injectable for Leaf {
    fn type_info() -> TypeInfo {
        TypeInfo::concrete::<Self>()
    }
}

struct Holder<A: Injectable>(std::marker::PhantomData<fn() -> A>);

struct HolderDef;

impl<A: Injectable> Injectable for Holder<A> {
    fn type_info() -> TypeInfo {
        TypeInfo::abstraction::<Self>().generic(
            OpenType::of::<HolderDef>("Holder", 1),
            vec![A::type_info()],
        )
    }
}

#[test]
fn display_names_expand_generic_arguments() {
    assert_eq!(Leaf::type_info().display_name(), "Leaf");
    assert_eq!(Holder::<Leaf>::type_info().display_name(), "Holder<Leaf>");
    assert_eq!(
        Holder::<Holder<Leaf>>::type_info().display_name(),
        "Holder<Holder<Leaf>>"
    );
}

#[test]
fn type_info_reports_its_key() {
    assert_eq!(Leaf::type_info().key(), TypeKey::of::<Leaf>());
}
