use std::sync::Arc;
use std::time::Duration;

use galena_diagnostic::AnnotationCode;
use galena_ir::{CatalogBuilder, CodeElement, Fixture, MethodInvoker, TestId, Value, ValueType};
use galena_model::{Metadata, TestKind, TestModel};
use pretty_assertions::assert_eq;

use super::*;
use crate::{Evaluator, PatternTable};

fn noop() -> MethodInvoker {
    Arc::new(|_, _| Ok(()))
}

fn evaluate(b: CatalogBuilder, table: PatternTable, asm: CodeElement) -> TestModel {
    let mut ev = Evaluator::new(Arc::new(b.build()), Arc::new(table));
    ev.evaluate(asm, false);
    ev.finish_model()
}

fn only_test(model: &TestModel, element: CodeElement) -> TestId {
    let tests = model.tests_for_element(element);
    assert_eq!(tests.len(), 1, "expected exactly one test for {element:?}");
    tests[0]
}

#[test]
fn test_fixture_structure_and_parameters() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Calculator");
    let ctor = b.add_constructor(ty, Arc::new(|_| Ok(Arc::new(0_i64) as Fixture)));
    let seed = b.add_parameter(ctor, "seed", ValueType::Int);
    let label = b.add_field(ty, "label", ValueType::Str, None);
    let add = b.add_method(ty, "add", noop());
    let x = b.add_parameter(add, "x", ValueType::Int);
    let y = b.add_parameter(add, "y", ValueType::Int);
    let helper = b.add_method(ty, "helper", noop());

    let mut table = PatternTable::new();
    table
        .attach(add, TestMethodPattern)
        .attach(add, RowPattern::new(vec![Value::Int(1), Value::Int(2)]))
        .attach(add, MetadataPattern::category("math"));
    table.attach(label, ParameterPattern);

    let model = evaluate(b, table, asm);

    let asm_test = model.test(only_test(&model, asm));
    assert_eq!(asm_test.kind, TestKind::Assembly);
    assert_eq!(asm_test.parent, Some(model.root()));

    let fixture = model.test(only_test(&model, ty));
    assert_eq!(fixture.kind, TestKind::Fixture);
    assert_eq!(fixture.stable_id, "Sample/Calculator");
    let fixture_params: Vec<_> = fixture
        .parameters
        .iter()
        .map(|p| model.parameter(*p).name.as_str())
        .collect();
    assert_eq!(fixture_params, vec!["seed", "label"]);

    let test = model.test(only_test(&model, add));
    assert_eq!(test.kind, TestKind::Test);
    assert!(test.is_test_case);
    assert_eq!(test.metadata.get(Metadata::CATEGORY), Some("math"));
    assert_eq!(test.parent, Some(fixture.id));

    let y_param = model.parameter(test.parameters[1]);
    assert_eq!(y_param.slot, y);
    assert_eq!(y_param.value_type, ValueType::Int);
    assert_eq!(
        model.resolve_implicit_data_binding_index(y_param.data_context),
        Some(1)
    );
    let x_param = model.parameter(test.parameters[0]);
    assert_eq!(x_param.slot, x);
    assert_eq!(
        model.resolve_implicit_data_binding_index(x_param.data_context),
        Some(0)
    );
    assert_eq!(model.parameter(fixture.parameters[0]).slot, seed);

    assert!(model.tests_for_element(helper).is_empty());
    assert!(model.annotations().is_empty());
}

#[test]
fn test_types_without_tests_are_not_fixtures() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let plain = b.add_type(asm, "Plain");
    b.add_method(plain, "helper", noop());
    let base = b.add_type(asm, "Base");
    let inherited = b.add_method(base, "t", noop());
    b.set_abstract(base, true);

    let mut table = PatternTable::new();
    table.attach(inherited, TestMethodPattern);
    let model = evaluate(b, table, asm);

    assert!(model.tests_for_element(plain).is_empty());
    assert!(model.tests_for_element(base).is_empty());
    assert_eq!(model.len(), 2);
}

#[test]
fn test_attribute_patterns_set_test_properties() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let m = b.add_method(ty, "m", noop());
    let skipped = b.add_method(ty, "skipped", noop());

    let mut table = PatternTable::new();
    table
        .attach(ty, FixturePattern)
        .attach(ty, ParallelizablePattern);
    table
        .attach(m, TestMethodPattern)
        .attach(m, TimeoutPattern(Duration::from_millis(250)))
        .attach(m, OrderPattern(-3))
        .attach(m, ExplicitPattern::with_reason("slow"));
    table
        .attach(skipped, TestMethodPattern)
        .attach(skipped, IgnorePattern::new("broken on CI"));

    let model = evaluate(b, table, asm);
    assert!(model.test(only_test(&model, ty)).is_parallelizable);

    let test = model.test(only_test(&model, m));
    assert_eq!(test.timeout, Some(Duration::from_millis(250)));
    assert_eq!(test.order, -3);
    assert!(test.is_explicit);
    assert_eq!(test.metadata.get(Metadata::EXPLICIT_REASON), Some("slow"));

    let ignored = model.test(only_test(&model, skipped));
    assert_eq!(
        ignored.metadata.get(Metadata::IGNORE_REASON),
        Some("broken on CI")
    );
    assert_eq!(ignored.actions.before_test.len(), 1);
}

#[test]
fn test_named_data_source_and_bind() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let m = b.add_method(ty, "login", noop());
    let user = b.add_parameter(m, "user", ValueType::Str);

    let mut table = PatternTable::new();
    table.attach(m, TestMethodPattern).attach(
        m,
        DataSourcePattern::new(
            "users",
            vec![galena_model::DataRow::default().with_named("name", Value::from("ada"))],
        ),
    );
    table
        .attach(user, BindPattern::source("users"))
        .attach(user, BindPattern::path("name"));

    let model = evaluate(b, table, asm);
    let test = model.test(only_test(&model, m));
    let param = model.parameter(test.parameters[0]);
    assert_eq!(param.binder.source.as_deref(), Some("users"));
    assert_eq!(param.binder.path.as_deref(), Some("name"));
    assert!(model
        .resolve_data_source(param.data_context, "users")
        .is_some());
}

#[test]
fn test_misapplied_patterns_are_annotated() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let m = b.add_method(ty, "m", noop());
    let nested = b.add_type(ty, "NotAMethod");
    let mut table = PatternTable::new();
    table
        .attach(m, TestMethodPattern)
        .attach(m, BindPattern::index(2));
    table
        .attach(ty, FixturePattern)
        .attach(nested, LifecycleMethodPattern::set_up());

    let model = evaluate(b, table, asm);
    let mut codes: Vec<_> = model
        .annotations()
        .iter()
        .map(|a| (a.code, a.element))
        .collect();
    codes.sort_by_key(|(_, element)| *element);
    assert_eq!(
        codes,
        vec![
            (AnnotationCode::G0002, Some(m)),
            (AnnotationCode::G0002, Some(nested)),
        ]
    );
    // The test itself survives its bad decoration.
    assert_eq!(model.tests_for_element(m).len(), 1);
}

#[test]
fn test_dependencies_resolve_after_evaluation() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let first = b.add_method(ty, "first", noop());
    let second = b.add_method(ty, "second", noop());
    let helper = b.add_method(ty, "helper", noop());
    let dangling = b.add_method(ty, "dangling", noop());

    let mut table = PatternTable::new();
    table.attach(first, TestMethodPattern);
    // Declared before its target on purpose.
    table
        .attach(second, TestMethodPattern)
        .attach(second, DependsOnPattern::new(first));
    table
        .attach(dangling, TestMethodPattern)
        .attach(dangling, DependsOnPattern::new(helper));

    let model = evaluate(b, table, asm);
    let first_id = only_test(&model, first);
    assert_eq!(model.test(only_test(&model, second)).dependencies, vec![first_id]);
    assert!(model.test(only_test(&model, dangling)).dependencies.is_empty());

    let codes: Vec<_> = model.annotations().iter().map(|a| a.code).collect();
    assert_eq!(codes, vec![AnnotationCode::G0005]);
}

#[test]
fn test_lifecycle_methods_are_not_tests() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let set_up = b.add_method(ty, "set_up", noop());
    let tear_down = b.add_method(ty, "tear_down", noop());
    let fixture_set_up = b.add_method(ty, "fixture_set_up", noop());
    let m = b.add_method(ty, "m", noop());

    let mut table = PatternTable::new();
    table.attach(set_up, LifecycleMethodPattern::set_up());
    table.attach(tear_down, LifecycleMethodPattern::tear_down());
    table.attach(fixture_set_up, LifecycleMethodPattern::fixture_set_up());
    table.attach(m, TestMethodPattern);

    let model = evaluate(b, table, asm);
    let fixture = model.test(only_test(&model, ty));
    assert_eq!(fixture.children.len(), 1);
    // Sharing the fixture plus one entry per child-level hook.
    assert_eq!(fixture.actions.instance.decorate_child_test.len(), 3);
    assert_eq!(fixture.actions.instance.set_up.len(), 1);
    assert!(model.tests_for_element(set_up).is_empty());
}

#[test]
fn test_composite_combines_primary_and_decorations() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let m = b.add_method(ty, "m", noop());

    let composite = CompositePattern::default()
        .with(MetadataPattern::author("grace"))
        .with(TestMethodPattern)
        .with(CatchFailurePattern::new(galena_ir::TestOutcome::Passed).matching("expected"));
    let mut table = PatternTable::new();
    table.attach(m, composite);

    let model = evaluate(b, table, asm);
    let test = model.test(only_test(&model, m));
    assert_eq!(test.metadata.get(Metadata::AUTHOR), Some("grace"));
    // Invoke from the pattern plus the catch wrapper.
    assert_eq!(test.actions.instance.execute.len(), 2);
}

#[test]
fn test_composite_with_two_primaries_is_a_usage_error() {
    let mut b = CatalogBuilder::new();
    let asm = b.add_assembly("Sample");
    let ty = b.add_type(asm, "Suite");
    let m = b.add_method(ty, "m", noop());

    let composite = CompositePattern::default()
        .with(TestMethodPattern)
        .with(FixturePattern)
        .with(MetadataPattern::author("grace"));
    let mut table = PatternTable::new();
    table.attach(ty, FixturePattern).attach(m, composite);

    let model = evaluate(b, table, asm);
    assert!(model.tests_for_element(m).is_empty());
    let annotations: Vec<_> = model
        .annotations()
        .iter()
        .map(|a| (a.code, a.element))
        .collect();
    assert_eq!(annotations, vec![(AnnotationCode::G0002, Some(m))]);
    assert!(model
        .annotations()
        .iter()
        .next()
        .unwrap()
        .message
        .contains("combines 2 primary patterns"));
}
