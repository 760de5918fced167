use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;

fn noop() -> MethodInvoker {
    Arc::new(|_, _| Ok(()))
}

#[test]
fn test_hierarchy_and_positions() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Tests");
    let ty = b.add_type(asm, "MathFixture");
    let method = b.add_method(ty, "adds", noop());
    let x = b.add_parameter(method, "x", ValueType::Int);
    let y = b.add_parameter(method, "y", ValueType::Int);
    let field = b.add_field(ty, "seed", ValueType::Int, None);
    let catalog = b.build();

    assert_eq!(catalog.children(asm), &[ty]);
    assert_eq!(catalog.children(ty), &[method, field]);
    assert_eq!(catalog.parent(x), Some(method));
    assert_eq!(catalog.position(x), 0);
    assert_eq!(catalog.position(y), 1);
    assert_eq!(catalog.position(field), 0);
    assert_eq!(catalog.value_type(y), ValueType::Int);
    assert_eq!(catalog.kind(method), CodeElementKind::Method);
    assert!(matches!(catalog.body(method), Some(ElementBody::Method(_))));
    assert!(catalog.body(field).is_none());
}

#[test]
fn test_full_name_skips_assembly() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Tests");
    let ty = b.add_type(asm, "Outer");
    let method = b.add_method(ty, "run", noop());
    let catalog = b.build();

    assert_eq!(catalog.full_name(method), "Outer.run");
    assert_eq!(catalog.full_name(asm), "Tests");
}

#[test]
fn test_lookup_helpers() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("A");
    let ty = b.add_type(asm, "T");
    let m = b.add_method(ty, "m", noop());
    b.set_documentation(m, "does things").set_abstract(ty, true);
    let catalog = b.build();

    assert_eq!(catalog.assemblies().collect::<Vec<_>>(), vec![asm]);
    assert_eq!(catalog.find_child(ty, "m"), Some(m));
    assert_eq!(catalog.find_child(ty, "missing"), None);
    assert_eq!(catalog.documentation(m), Some("does things"));
    assert!(catalog.is_abstract(ty));
    assert_eq!(
        catalog.children_of_kind(ty, CodeElementKind::Method),
        vec![m]
    );
}
