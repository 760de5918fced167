//! Scope tree and worklist-driven pattern evaluation.
//!
//! Patterns never recurse into each other directly. `consume_child` and
//! `schedule_apply_decorators` append to the frame of the call that is
//! currently running; when that call returns its frame is pushed onto the
//! work stack in reverse, so the scheduled items run in the order they were
//! scheduled and before anything an ancestor call scheduled later. The
//! result is the order a recursive evaluator would produce, without
//! unbounded native recursion on deep type nests.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use galena_diagnostic::{Annotation, AnnotationCode, AnnotationSink};
use galena_ir::{panic_message, CodeElement, CodeModel, DataContextId, ParameterId, TestId};
use galena_model::{DataContext, Test, TestKind, TestModel, TestParameter};

use crate::builtins::AssemblyPattern;
use crate::{PatternError, PatternResolver, PatternResult, SharedPattern, TestParts};

const UNEXPECTED_FAILURE: &str = "An exception occurred while evaluating a pattern.";

/// Index of a scope in the evaluator's arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ScopeId(u32);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    fn from_len(len: usize) -> Self {
        match u32::try_from(len) {
            Ok(raw) => ScopeId(raw),
            Err(_) => panic!("scope arena overflow: {len} scopes"),
        }
    }
}

type Decorator = Box<dyn FnOnce(&mut Evaluator, ScopeId) -> PatternResult>;
type FinishAction = Box<dyn FnOnce(&mut Evaluator) -> PatternResult>;

/// Builds one deferred child of a scope.
pub type ChildPopulator =
    Arc<dyn Fn(&mut Evaluator, ScopeId, CodeElement) -> PatternResult + Send + Sync>;

struct PendingDecorator {
    order: i32,
    apply: Decorator,
}

struct Deferred {
    children: Vec<CodeElement>,
    populated: FxHashSet<CodeElement>,
    populate_child: ChildPopulator,
}

impl Deferred {
    fn is_complete(&self) -> bool {
        self.populated.len() >= self.children.len()
    }
}

/// A node in the evaluation scope tree.
///
/// Declaration scopes own a test or a parameter; child scopes share their
/// parent's test, parameter and data context.
pub struct Scope {
    pub element: Option<CodeElement>,
    pub test: TestId,
    pub parameter: Option<ParameterId>,
    pub data_context: DataContextId,
    pub is_declaration: bool,
    pub parent: Option<ScopeId>,
    decorators: Vec<PendingDecorator>,
    finalized: bool,
    deferred: Option<Deferred>,
}

impl Scope {
    /// Whether decorators have been applied; later decorators are rejected.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("element", &self.element)
            .field("test", &self.test)
            .field("parameter", &self.parameter)
            .field("is_declaration", &self.is_declaration)
            .field("pending_decorators", &self.decorators.len())
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}

enum Work {
    Consume {
        containing: ScopeId,
        element: CodeElement,
        skip_children: bool,
        default: Option<SharedPattern>,
    },
    ApplyDecorators(ScopeId),
    PopulateChild {
        scope: ScopeId,
        element: CodeElement,
        populate: ChildPopulator,
    },
    Finish {
        element: CodeElement,
        action: FinishAction,
    },
}

/// Evaluates patterns over a code model, building a `TestModel`.
pub struct Evaluator {
    code: Arc<dyn CodeModel>,
    resolver: Arc<dyn PatternResolver>,
    model: TestModel,
    scopes: Vec<Scope>,
    by_element: FxHashMap<CodeElement, SmallVec<[ScopeId; 2]>>,
    stack: Vec<Work>,
    frames: Vec<Vec<Work>>,
    finish_actions: Vec<(CodeElement, FinishAction)>,
}

impl Evaluator {
    pub fn new(code: Arc<dyn CodeModel>, resolver: Arc<dyn PatternResolver>) -> Self {
        let model = TestModel::new();
        let root = Scope {
            element: None,
            test: model.root(),
            parameter: None,
            data_context: model.root_data_context(),
            is_declaration: true,
            parent: None,
            decorators: Vec::new(),
            finalized: false,
            deferred: None,
        };
        Evaluator {
            code,
            resolver,
            model,
            scopes: vec![root],
            by_element: FxHashMap::default(),
            stack: Vec::new(),
            frames: Vec::new(),
            finish_actions: Vec::new(),
        }
    }

    // Accessors

    /// Shared handle to the code model; clone-cheap so patterns can hold it
    /// across mutable evaluator calls.
    pub fn code(&self) -> Arc<dyn CodeModel> {
        Arc::clone(&self.code)
    }

    pub fn model(&self) -> &TestModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut TestModel {
        &mut self.model
    }

    pub fn root_scope(&self) -> ScopeId {
        ScopeId::ROOT
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Scopes created for `element`, in creation order.
    pub fn scopes_for(&self, element: CodeElement) -> &[ScopeId] {
        self.by_element
            .get(&element)
            .map(SmallVec::as_slice)
            .unwrap_or(&[])
    }

    pub fn test(&self, scope: ScopeId) -> &Test {
        self.model.test(self.scope(scope).test)
    }

    pub fn test_mut(&mut self, scope: ScopeId) -> &mut Test {
        let test = self.scope(scope).test;
        self.model.test_mut(test)
    }

    pub fn parameter_mut(&mut self, scope: ScopeId) -> Option<&mut TestParameter> {
        let parameter = self.scope(scope).parameter?;
        Some(self.model.parameter_mut(parameter))
    }

    pub fn data_context_mut(&mut self, scope: ScopeId) -> &mut DataContext {
        let context = self.scope(scope).data_context;
        self.model.data_context_mut(context)
    }

    // Scope creation

    /// Create a declaration scope owning a new child test of `containing`'s
    /// test, with its own data context.
    pub fn create_test_scope(
        &mut self,
        containing: ScopeId,
        element: Option<CodeElement>,
        name: &str,
        kind: TestKind,
    ) -> ScopeId {
        let parent = self.scope(containing);
        let (parent_test, parent_context) = (parent.test, parent.data_context);
        let context = self.model.add_data_context(Some(parent_context));
        let test = self
            .model
            .add_test(parent_test, name, kind, element, context);
        self.push_scope(element, test, None, context, true, containing)
    }

    /// Create a declaration scope owning a new parameter of `containing`'s
    /// test, bound to `slot`.
    pub fn create_parameter_scope(
        &mut self,
        containing: ScopeId,
        slot: CodeElement,
        name: &str,
    ) -> ScopeId {
        let parent = self.scope(containing);
        let (owner, parent_context) = (parent.test, parent.data_context);
        let context = self.model.add_data_context(Some(parent_context));
        let value_type = self.code.value_type(slot);
        let parameter = self
            .model
            .add_parameter(owner, name, slot, value_type, context);
        self.push_scope(Some(slot), owner, Some(parameter), context, true, containing)
    }

    /// Create a non-declaration scope sharing everything with `containing`.
    pub fn create_child_scope(
        &mut self,
        containing: ScopeId,
        element: Option<CodeElement>,
    ) -> ScopeId {
        let parent = self.scope(containing);
        let (test, parameter, context) = (parent.test, parent.parameter, parent.data_context);
        self.push_scope(element, test, parameter, context, false, containing)
    }

    fn push_scope(
        &mut self,
        element: Option<CodeElement>,
        test: TestId,
        parameter: Option<ParameterId>,
        data_context: DataContextId,
        is_declaration: bool,
        parent: ScopeId,
    ) -> ScopeId {
        let id = ScopeId::from_len(self.scopes.len());
        self.scopes.push(Scope {
            element,
            test,
            parameter,
            data_context,
            is_declaration,
            parent: Some(parent),
            decorators: Vec::new(),
            finalized: false,
            deferred: None,
        });
        if let Some(element) = element {
            self.by_element.entry(element).or_default().push(id);
        }
        trace!(?id, ?element, is_declaration, "scope created");
        id
    }

    // Pattern resolution

    /// The primary pattern on `element`, `Ok(None)` if it has none, or the
    /// number of competing primaries.
    fn resolve_primary(&self, element: CodeElement) -> Result<Option<SharedPattern>, usize> {
        let mut primaries = self
            .resolver
            .patterns(element)
            .iter()
            .filter(|pattern| pattern.is_primary());
        let first = primaries.next().cloned();
        let extra = primaries.count();
        if extra > 0 {
            Err(extra + 1)
        } else {
            Ok(first)
        }
    }

    /// The primary pattern for `element`, falling back to `default`.
    ///
    /// Several primaries are a usage error: it is annotated and `None` is
    /// returned so that the element is not consumed at all.
    pub fn get_primary_pattern(
        &mut self,
        element: CodeElement,
        default: Option<SharedPattern>,
    ) -> Option<SharedPattern> {
        match self.resolve_primary(element) {
            Ok(Some(primary)) => Some(primary),
            Ok(None) => default,
            Err(count) => {
                let kind = self.code.kind(element).label();
                let name = self.code.name(element).to_owned();
                self.model.annotate(
                    Annotation::error(AnnotationCode::G0001)
                        .at(element)
                        .with_message(format!(
                            "{count} primary patterns apply to {kind} '{name}'; \
                             at most one primary pattern may apply to a code element"
                        )),
                );
                None
            }
        }
    }

    /// What the primary (or `default`) pattern says `element` contributes.
    /// Conflicting primaries contribute nothing.
    pub fn test_parts(&self, element: CodeElement, default: Option<&SharedPattern>) -> TestParts {
        match self.resolve_primary(element) {
            Ok(Some(primary)) => primary.test_parts(self, element),
            Ok(None) => default.map_or(TestParts::empty(), |p| p.test_parts(self, element)),
            Err(_) => TestParts::empty(),
        }
    }

    pub fn is_test(&self, element: CodeElement, default: Option<&SharedPattern>) -> bool {
        self.test_parts(element, default).contains(TestParts::TEST)
    }

    // Entry points

    /// Evaluate an assembly under the root scope.
    pub fn evaluate(&mut self, assembly: CodeElement, skip_children: bool) {
        let default: SharedPattern = Arc::new(AssemblyPattern);
        self.consume(ScopeId::ROOT, assembly, skip_children, Some(default));
    }

    /// Consume `element` inside `containing` and run all resulting work to
    /// completion before returning.
    pub fn consume(
        &mut self,
        containing: ScopeId,
        element: CodeElement,
        skip_children: bool,
        default: Option<SharedPattern>,
    ) {
        self.run_now(|ev| ev.consume_child(containing, element, skip_children, default));
    }

    // Scheduling (used from inside pattern calls)

    /// Schedule consumption of `element` inside `containing`.
    pub fn consume_child(
        &mut self,
        containing: ScopeId,
        element: CodeElement,
        skip_children: bool,
        default: Option<SharedPattern>,
    ) {
        self.schedule(Work::Consume {
            containing,
            element,
            skip_children,
            default,
        });
    }

    /// Schedule decorator application for `scope` after the work already
    /// scheduled by the current call.
    pub fn schedule_apply_decorators(&mut self, scope: ScopeId) {
        self.schedule(Work::ApplyDecorators(scope));
    }

    /// Run `process` of every pattern on `element` against `scope`. Each
    /// pattern is guarded separately.
    pub fn process_element(&mut self, scope: ScopeId, element: CodeElement) {
        let patterns = self.resolver.patterns(element).to_vec();
        for pattern in patterns {
            self.invoke(Some(element), |ev| pattern.process(ev, scope, element));
        }
    }

    // Decorators

    /// Queue a decorator on `scope`. Decorators apply in ascending `order`,
    /// ties in insertion order, once `apply_decorators` runs for the scope.
    pub fn add_decorator(
        &mut self,
        scope: ScopeId,
        order: i32,
        decorator: impl FnOnce(&mut Evaluator, ScopeId) -> PatternResult + 'static,
    ) -> PatternResult {
        let data = &mut self.scopes[scope.index()];
        if data.finalized {
            return Err(PatternError::Finalized);
        }
        data.decorators.push(PendingDecorator {
            order,
            apply: Box::new(decorator),
        });
        Ok(())
    }

    /// Apply and finalize `scope`'s decorators. Idempotent.
    pub fn apply_decorators(&mut self, scope: ScopeId) {
        let data = &mut self.scopes[scope.index()];
        if data.finalized {
            return;
        }
        data.finalized = true;
        let element = data.element;
        let mut decorators = std::mem::take(&mut data.decorators);
        decorators.sort_by_key(|decorator| decorator.order);
        trace!(?scope, count = decorators.len(), "applying decorators");
        for decorator in decorators {
            self.invoke(element, move |ev| (decorator.apply)(ev, scope));
        }
    }

    // Deferred population

    /// Register `children` of `scope` for population on demand.
    pub fn add_deferred_populator(
        &mut self,
        scope: ScopeId,
        children: Vec<CodeElement>,
        populate_child: impl Fn(&mut Evaluator, ScopeId, CodeElement) -> PatternResult
            + Send
            + Sync
            + 'static,
    ) {
        let populate_child: ChildPopulator = Arc::new(populate_child);
        let data = &mut self.scopes[scope.index()];
        match &mut data.deferred {
            Some(deferred) => {
                deferred.children.extend(children);
                deferred.populate_child = populate_child;
            }
            None => {
                data.deferred = Some(Deferred {
                    children,
                    populated: FxHashSet::default(),
                    populate_child,
                });
            }
        }
    }

    /// Build the deferred children of `scope`: only `hint` when given (if
    /// it is one of them), otherwise all that remain. Each child is built at
    /// most once.
    pub fn populate(&mut self, scope: ScopeId, hint: Option<CodeElement>) {
        let Some(deferred) = self.scopes[scope.index()].deferred.as_mut() else {
            return;
        };
        if deferred.is_complete() {
            return;
        }
        let targets: Vec<CodeElement> = deferred
            .children
            .iter()
            .copied()
            .filter(|child| hint.map_or(true, |h| h == *child))
            .filter(|child| !deferred.populated.contains(child))
            .collect();
        if targets.is_empty() {
            return;
        }
        deferred.populated.extend(targets.iter().copied());
        let populate = Arc::clone(&deferred.populate_child);
        debug!(?scope, count = targets.len(), "populating deferred children");
        self.run_now(|ev| {
            for element in targets {
                ev.schedule(Work::PopulateChild {
                    scope,
                    element,
                    populate: Arc::clone(&populate),
                });
            }
        });
    }

    /// Make sure the scopes for `element` exist, populating deferred
    /// ancestors from the outside in.
    pub fn populate_element(&mut self, element: CodeElement) {
        let mut chain = vec![element];
        let mut cursor = self.code.parent(element);
        while let Some(parent) = cursor {
            chain.push(parent);
            cursor = self.code.parent(parent);
        }
        for pair in chain.windows(2).rev() {
            let (child, parent) = (pair[0], pair[1]);
            let scopes: SmallVec<[ScopeId; 2]> = self.scopes_for(parent).iter().copied().collect();
            for scope in scopes {
                if self.scope(scope).is_declaration {
                    self.populate(scope, Some(child));
                }
            }
        }
    }

    /// Populate every deferred child in the tree, including children that
    /// population itself registers.
    pub fn populate_all(&mut self) {
        loop {
            let pending: Vec<ScopeId> = (0..self.scopes.len())
                .map(ScopeId::from_len)
                .filter(|id| {
                    self.scopes[id.index()]
                        .deferred
                        .as_ref()
                        .is_some_and(|d| !d.is_complete())
                })
                .collect();
            if pending.is_empty() {
                return;
            }
            for scope in pending {
                self.populate(scope, None);
            }
        }
    }

    /// Whether any scope still has unpopulated children.
    pub fn has_deferred_children(&self) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.deferred.as_ref().is_some_and(|d| !d.is_complete()))
    }

    // Finishing

    /// Run `action` once evaluation is finished, with the whole tree built.
    pub fn add_finish_action(
        &mut self,
        element: CodeElement,
        action: impl FnOnce(&mut Evaluator) -> PatternResult + 'static,
    ) {
        self.finish_actions.push((element, Box::new(action)));
    }

    /// Run finish actions in registration order and hand over the model.
    pub fn finish_model(mut self) -> TestModel {
        let actions = std::mem::take(&mut self.finish_actions);
        debug!(count = actions.len(), "running finish actions");
        self.run_now(|ev| {
            for (element, action) in actions {
                ev.schedule(Work::Finish { element, action });
            }
        });
        self.model
    }

    // Worklist

    fn schedule(&mut self, work: Work) {
        match self.frames.last_mut() {
            Some(frame) => frame.push(work),
            None => self.run_now(move |ev| ev.schedule(work)),
        }
    }

    /// Open a frame, let `schedule` fill it, then drain the stack down to
    /// where it was.
    fn run_now(&mut self, schedule: impl FnOnce(&mut Self)) {
        let base = self.stack.len();
        self.with_frame(schedule);
        while self.stack.len() > base {
            if let Some(work) = self.stack.pop() {
                self.with_frame(|ev| ev.execute(work));
            }
        }
    }

    fn with_frame(&mut self, f: impl FnOnce(&mut Self)) {
        let depth = self.frames.len();
        self.frames.push(Vec::new());
        f(self);
        // A nested drain interrupted by a panic may have left its frame.
        self.frames.truncate(depth + 1);
        let frame = self.frames.pop().unwrap_or_default();
        self.stack.extend(frame.into_iter().rev());
    }

    fn execute(&mut self, work: Work) {
        match work {
            Work::Consume {
                containing,
                element,
                skip_children,
                default,
            } => {
                let Some(primary) = self.get_primary_pattern(element, default) else {
                    return;
                };
                debug!(?element, pattern = primary.name(), "consume");
                self.invoke(Some(element), |ev| {
                    primary.consume(ev, containing, element, skip_children)
                });
            }
            Work::ApplyDecorators(scope) => self.apply_decorators(scope),
            Work::PopulateChild {
                scope,
                element,
                populate,
            } => self.invoke(Some(element), |ev| populate(ev, scope, element)),
            Work::Finish { element, action } => self.invoke(Some(element), action),
        }
    }

    /// Run one pattern call, turning errors and panics into annotations.
    fn invoke(&mut self, element: Option<CodeElement>, f: impl FnOnce(&mut Self) -> PatternResult) {
        let annotation = match catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(Ok(())) => return,
            Ok(Err(PatternError::Usage(message))) => {
                Annotation::error(AnnotationCode::G0002).with_message(message)
            }
            Ok(Err(err @ PatternError::Finalized)) => {
                Annotation::error(AnnotationCode::G0004).with_message(err.to_string())
            }
            Ok(Err(PatternError::NotATest(message))) => {
                Annotation::error(AnnotationCode::G0005).with_message(message)
            }
            Ok(Err(PatternError::Unexpected(detail))) => Annotation::error(AnnotationCode::G0003)
                .with_message(UNEXPECTED_FAILURE)
                .with_detail(detail),
            Err(payload) => Annotation::error(AnnotationCode::G0003)
                .with_message(UNEXPECTED_FAILURE)
                .with_detail(panic_message(&*payload)),
        };
        let annotation = match element {
            Some(element) => annotation.at(element),
            None => annotation,
        };
        warn!(%annotation, "pattern evaluation failed");
        self.model.annotate(annotation);
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("scopes", &self.scopes.len())
            .field("tests", &self.model.len())
            .field("pending", &self.stack.len())
            .finish_non_exhaustive()
    }
}
