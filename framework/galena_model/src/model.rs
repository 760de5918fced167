//! The test model arena.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use galena_diagnostic::{Annotation, AnnotationQueue, AnnotationSink};
use galena_ir::{CodeElement, DataContextId, ParameterId, TestId, ValueType};

use crate::{
    DataBinder, DataContext, DataSource, Metadata, Test, TestActions, TestKind, TestParameter,
};

/// Arena of tests, parameters and data contexts.
///
/// Index 0 of each arena is the root: the root test and its data context are
/// created with the model.
#[derive(Debug)]
pub struct TestModel {
    tests: Vec<Test>,
    parameters: Vec<TestParameter>,
    contexts: Vec<DataContext>,
    by_element: FxHashMap<CodeElement, SmallVec<[TestId; 1]>>,
    annotations: AnnotationQueue,
}

impl Default for TestModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TestModel {
    pub fn new() -> Self {
        let root_context = DataContextId::new(0);
        let root = Test {
            id: TestId::new(0),
            name: "Root".to_owned(),
            local_id: String::new(),
            stable_id: String::new(),
            kind: TestKind::Root,
            code_element: None,
            parent: None,
            children: Vec::new(),
            parameters: Vec::new(),
            dependencies: Vec::new(),
            metadata: Metadata::new(),
            order: 0,
            is_test_case: false,
            is_parallelizable: false,
            is_explicit: false,
            timeout: None,
            data_context: root_context,
            actions: TestActions::default(),
        };
        TestModel {
            tests: vec![root],
            parameters: Vec::new(),
            contexts: vec![DataContext::new(None)],
            by_element: FxHashMap::default(),
            annotations: AnnotationQueue::new(),
        }
    }

    pub fn root(&self) -> TestId {
        TestId::new(0)
    }

    pub fn root_data_context(&self) -> DataContextId {
        DataContextId::new(0)
    }

    // Construction

    pub fn add_data_context(&mut self, parent: Option<DataContextId>) -> DataContextId {
        let id = DataContextId::from_len(self.contexts.len());
        self.contexts.push(DataContext::new(parent));
        id
    }

    /// Add a child test. Its local id is its name, disambiguated among
    /// siblings with a `~N` suffix.
    pub fn add_test(
        &mut self,
        parent: TestId,
        name: &str,
        kind: TestKind,
        code_element: Option<CodeElement>,
        data_context: DataContextId,
    ) -> TestId {
        let id = TestId::from_len(self.tests.len());
        let local_id = self.unique_local_id(parent, name);
        let parent_stable = &self.tests[parent.index()].stable_id;
        let stable_id = if parent_stable.is_empty() {
            local_id.clone()
        } else {
            format!("{parent_stable}/{local_id}")
        };

        self.tests.push(Test {
            id,
            name: name.to_owned(),
            local_id,
            stable_id,
            kind,
            code_element,
            parent: Some(parent),
            children: Vec::new(),
            parameters: Vec::new(),
            dependencies: Vec::new(),
            metadata: Metadata::new(),
            order: 0,
            is_test_case: false,
            is_parallelizable: false,
            is_explicit: false,
            timeout: None,
            data_context,
            actions: TestActions::default(),
        });
        self.tests[parent.index()].children.push(id);
        if let Some(element) = code_element {
            self.by_element.entry(element).or_default().push(id);
        }
        id
    }

    pub fn add_parameter(
        &mut self,
        owner: TestId,
        name: &str,
        slot: CodeElement,
        value_type: ValueType,
        data_context: DataContextId,
    ) -> ParameterId {
        let id = ParameterId::from_len(self.parameters.len());
        self.parameters.push(TestParameter {
            id,
            name: name.to_owned(),
            slot,
            owner,
            value_type,
            data_context,
            binder: DataBinder::implicit(),
            metadata: Metadata::new(),
        });
        self.tests[owner.index()].parameters.push(id);
        id
    }

    /// Record that `test` depends on `on`. Self edges and repeats are ignored.
    pub fn add_dependency(&mut self, test: TestId, on: TestId) {
        if test == on {
            return;
        }
        let deps = &mut self.tests[test.index()].dependencies;
        if !deps.contains(&on) {
            deps.push(on);
        }
    }

    fn unique_local_id(&self, parent: TestId, name: &str) -> String {
        let taken = |candidate: &str| {
            self.tests[parent.index()]
                .children
                .iter()
                .any(|child| self.tests[child.index()].local_id == candidate)
        };
        if !taken(name) {
            return name.to_owned();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{name}~{n}");
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    // Access

    pub fn test(&self, id: TestId) -> &Test {
        &self.tests[id.index()]
    }

    pub fn test_mut(&mut self, id: TestId) -> &mut Test {
        &mut self.tests[id.index()]
    }

    pub fn parameter(&self, id: ParameterId) -> &TestParameter {
        &self.parameters[id.index()]
    }

    pub fn parameter_mut(&mut self, id: ParameterId) -> &mut TestParameter {
        &mut self.parameters[id.index()]
    }

    pub fn data_context(&self, id: DataContextId) -> &DataContext {
        &self.contexts[id.index()]
    }

    pub fn data_context_mut(&mut self, id: DataContextId) -> &mut DataContext {
        &mut self.contexts[id.index()]
    }

    pub fn tests(&self) -> impl Iterator<Item = &Test> {
        self.tests.iter()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.len() <= 1
    }

    /// Tests declared on `element`, in creation order.
    pub fn tests_for_element(&self, element: CodeElement) -> &[TestId] {
        self.by_element
            .get(&element)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn find_by_stable_id(&self, stable_id: &str) -> Option<&Test> {
        self.tests.iter().find(|test| test.stable_id == stable_id)
    }

    /// Ancestors of `id`, nearest first, root included.
    pub fn ancestors(&self, id: TestId) -> impl Iterator<Item = TestId> + '_ {
        std::iter::successors(self.test(id).parent, move |current| {
            self.test(*current).parent
        })
    }

    /// `id` and all its descendants in pre-order.
    pub fn descendants(&self, id: TestId) -> Vec<TestId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.test(current).children.iter().rev().copied());
        }
        out
    }

    /// Names from the outermost non-root ancestor down to `id`.
    pub fn full_name(&self, id: TestId) -> String {
        let mut names: Vec<&str> = self
            .ancestors(id)
            .filter(|ancestor| *ancestor != self.root())
            .map(|ancestor| self.test(ancestor).name.as_str())
            .collect();
        names.reverse();
        names.push(&self.test(id).name);
        names.join("/")
    }

    /// Is `id` a test case or does it contain one?
    pub fn contains_test_case(&self, id: TestId) -> bool {
        self.descendants(id)
            .into_iter()
            .any(|test| self.test(test).is_test_case)
    }

    // Data contexts

    /// Find `name` at `context` or the nearest enclosing level defining it.
    pub fn resolve_data_source(
        &self,
        context: DataContextId,
        name: &str,
    ) -> Option<&Arc<DataSource>> {
        let mut cursor = Some(context);
        while let Some(id) = cursor {
            let level = self.data_context(id);
            if let Some(source) = level.data_source(name) {
                return Some(source);
            }
            cursor = level.parent;
        }
        None
    }

    /// Index an implicit binder at `context` reads from the anonymous source.
    ///
    /// Walks outward summing each level's offset until a level with an
    /// anonymous source is reached; that level's own offset is not included.
    /// `None` if no enclosing level defines an anonymous source.
    pub fn resolve_implicit_data_binding_index(&self, context: DataContextId) -> Option<usize> {
        let mut index = 0;
        let mut cursor = Some(context);
        while let Some(id) = cursor {
            let level = self.data_context(id);
            if level.has_anonymous_data_source() {
                return Some(index);
            }
            index += level.implicit_data_binding_index_offset;
            cursor = level.parent;
        }
        None
    }

    // Annotations

    pub fn annotations(&self) -> &AnnotationQueue {
        &self.annotations
    }

    pub fn take_annotations(&mut self) -> Vec<Annotation> {
        self.annotations.flush()
    }
}

impl AnnotationSink for TestModel {
    fn annotate(&mut self, annotation: Annotation) {
        tracing::debug!(%annotation, "annotation");
        self.annotations.push(annotation);
    }
}
