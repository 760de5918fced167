//! Run-time state records.
//!
//! A `TestState` lives for one run of one test; a `TestInstanceState` for one
//! data-bound instance. Both are created fresh by the engine and dropped when
//! their phase ends.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use galena_ir::{CodeElement, Fixture, ParameterId, TestId, Value};

use crate::{
    AbortSignal, BindingError, Converter, DataBindingAccessor, DataBindingContext,
    DataBindingItem, Formatter, TestActions, TestInstanceActions, TestModel,
};

/// Typed key into a [`UserData`] bag.
pub struct DataKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DataKey<T> {
    pub const fn new(name: &'static str) -> Self {
        DataKey {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Free-form storage patterns use to pass values between phases.
#[derive(Default)]
pub struct UserData {
    entries: FxHashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl UserData {
    pub fn set<T: Any + Send + Sync>(&mut self, key: &DataKey<T>, value: T) {
        self.entries.insert(key.name, Box::new(value));
    }

    pub fn get<T: Any>(&self, key: &DataKey<T>) -> Option<&T> {
        self.entries.get(key.name)?.downcast_ref()
    }

    pub fn get_mut<T: Any>(&mut self, key: &DataKey<T>) -> Option<&mut T> {
        self.entries.get_mut(key.name)?.downcast_mut()
    }

    pub fn contains<T: Any>(&self, key: &DataKey<T>) -> bool {
        self.get(key).is_some()
    }

    pub fn remove<T: Any>(&mut self, key: &DataKey<T>) -> Option<T> {
        let boxed = self.entries.remove(key.name)?;
        boxed.downcast::<T>().ok().map(|value| *value)
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// State of one test run.
pub struct TestState {
    pub test: TestId,
    pub test_name: Arc<str>,
    /// Test actions after decoration by the parent.
    pub actions: Arc<TestActions>,
    pub binding_context: DataBindingContext,
    /// One accessor per parameter, registered at the start of the run.
    pub accessors: Vec<(ParameterId, DataBindingAccessor)>,
    pub converter: Arc<dyn Converter>,
    pub formatter: Arc<dyn Formatter>,
    /// Selected directly by the run filter.
    pub is_explicit: bool,
    pub data: UserData,
    /// Messages for the primary step's log.
    pub log: Vec<String>,
}

impl TestState {
    pub fn new(
        test: TestId,
        test_name: Arc<str>,
        actions: Arc<TestActions>,
        binding_context: DataBindingContext,
        converter: Arc<dyn Converter>,
        formatter: Arc<dyn Formatter>,
        is_explicit: bool,
    ) -> Self {
        TestState {
            test,
            test_name,
            actions,
            binding_context,
            accessors: Vec::new(),
            converter,
            formatter,
            is_explicit,
            data: UserData::default(),
            log: Vec::new(),
        }
    }

    /// Register an accessor for every parameter of the test.
    pub fn register_parameters(&mut self, model: &TestModel) -> Result<(), BindingError> {
        for &parameter in &model.test(self.test).parameters {
            let param = model.parameter(parameter);
            let accessor = self.binding_context.register(
                model,
                param.data_context,
                &param.binder,
                &param.name,
            )?;
            self.accessors.push((parameter, accessor));
        }
        Ok(())
    }

    /// Bound and converted value of every parameter for `item`, keyed by slot.
    pub fn bind_slots(
        &self,
        model: &TestModel,
        item: &DataBindingItem,
    ) -> Result<Vec<(CodeElement, Value)>, BindingError> {
        self.accessors
            .iter()
            .map(|(parameter, accessor)| {
                let param = model.parameter(*parameter);
                let raw = accessor.get(item)?;
                let value = self
                    .converter
                    .convert(raw, param.value_type)
                    .map_err(|source| BindingError::Conversion {
                        parameter: param.name.clone(),
                        source,
                    })?;
                Ok((param.slot, value))
            })
            .collect()
    }

    pub fn write_log(&mut self, message: impl Into<String>) {
        self.log.push(message.into());
    }
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState")
            .field("test", &self.test)
            .field("test_name", &self.test_name)
            .field("accessors", &self.accessors.len())
            .finish_non_exhaustive()
    }
}

/// State of one data-bound test instance.
pub struct TestInstanceState {
    pub test: TestId,
    pub test_name: Arc<str>,
    /// Name of the step this instance reports to.
    pub step_name: String,
    /// Instance actions after `decorate_test_instance`.
    pub actions: Arc<TestInstanceActions>,
    pub item: DataBindingItem,
    slot_values: Vec<(CodeElement, Value)>,
    pub fixture_type: Option<CodeElement>,
    pub fixture: Option<Fixture>,
    pub test_method: Option<CodeElement>,
    pub arguments: Vec<Value>,
    pub converter: Arc<dyn Converter>,
    pub formatter: Arc<dyn Formatter>,
    pub data: UserData,
    pub abort: AbortSignal,
    pub log: Vec<String>,
}

impl TestInstanceState {
    pub fn new(
        test_state: &TestState,
        actions: Arc<TestInstanceActions>,
        item: DataBindingItem,
        slot_values: Vec<(CodeElement, Value)>,
        abort: AbortSignal,
    ) -> Self {
        TestInstanceState {
            test: test_state.test,
            test_name: Arc::clone(&test_state.test_name),
            step_name: test_state.test_name.to_string(),
            actions,
            item,
            slot_values,
            fixture_type: None,
            fixture: None,
            test_method: None,
            arguments: Vec::new(),
            converter: Arc::clone(&test_state.converter),
            formatter: Arc::clone(&test_state.formatter),
            data: UserData::default(),
            abort,
            log: Vec::new(),
        }
    }

    pub fn slot_value(&self, slot: CodeElement) -> Option<&Value> {
        self.slot_values
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, value)| value)
    }

    /// Override the bound value of `slot`; patterns may do this transiently.
    pub fn set_slot_value(&mut self, slot: CodeElement, value: Value) {
        match self.slot_values.iter_mut().find(|(s, _)| *s == slot) {
            Some(entry) => entry.1 = value,
            None => self.slot_values.push((slot, value)),
        }
    }

    pub fn slot_values(&self) -> &[(CodeElement, Value)] {
        &self.slot_values
    }

    /// Downcast the fixture to its concrete type.
    pub fn fixture_as<T: Any>(&self) -> Option<&T> {
        self.fixture.as_ref()?.downcast_ref()
    }

    /// Long-running user code should poll this and return early.
    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    pub fn write_log(&mut self, message: impl Into<String>) {
        self.log.push(message.into());
    }
}

impl fmt::Debug for TestInstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestInstanceState")
            .field("test", &self.test)
            .field("step_name", &self.step_name)
            .field("slot_values", &self.slot_values)
            .field("fixture_type", &self.fixture_type)
            .field("test_method", &self.test_method)
            .finish_non_exhaustive()
    }
}
