//! Run plans.
//!
//! A plan is the subtree of the model a run will execute, with siblings in
//! execution order. Tests selected by the filter run with all their
//! descendants; ancestors of selected tests run as containers so that their
//! lifecycle (fixture creation, set-up, tear-down) wraps the selected tests.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use galena_diagnostic::{Annotation, AnnotationCode};
use galena_ir::TestId;
use galena_model::TestModel;

use crate::stack::ensure_sufficient_stack;
use crate::{ExecutionOptions, TestFilter};

/// One test of a plan.
#[derive(Debug)]
pub struct PlanNode {
    pub test: TestId,
    /// Selected by the filter itself rather than through an ancestor, with
    /// a filter other than `All`.
    pub is_explicit: bool,
    pub children: Vec<Arc<PlanNode>>,
}

/// The tests a run executes.
#[derive(Debug)]
pub struct RunPlan {
    root: Option<Arc<PlanNode>>,
    members: FxHashSet<TestId>,
    /// Dependencies on other planned tests, invalid ones dropped.
    dependencies: FxHashMap<TestId, Vec<TestId>>,
    annotations: Vec<Annotation>,
}

impl RunPlan {
    /// Plan every non-explicit test of `model`.
    pub fn all(model: &TestModel) -> RunPlan {
        Self::build(model, &TestFilter::All, ExecutionOptions::default())
    }

    pub fn build(model: &TestModel, filter: &TestFilter, options: ExecutionOptions) -> RunPlan {
        let mut builder = Builder {
            model,
            filter,
            exact: options.exact_filter,
            members: FxHashSet::default(),
        };
        let draft = builder.node(model.root(), false);
        let edges = DependencyEdges::resolve(model, &builder.members);
        let root = draft.map(|draft| Arc::new(edges.order(model, draft)));
        debug!(
            tests = builder.members.len(),
            exact = builder.exact,
            invalid_dependencies = edges.annotations.len(),
            "run plan built"
        );
        RunPlan {
            root,
            members: builder.members,
            dependencies: edges.dependencies,
            annotations: edges.annotations,
        }
    }

    pub fn root(&self) -> Option<&Arc<PlanNode>> {
        self.root.as_ref()
    }

    pub fn contains(&self, test: TestId) -> bool {
        self.members.contains(&test)
    }

    /// Number of planned tests, root included.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Planned tests `test` waits on.
    pub fn dependencies_of(&self, test: TestId) -> &[TestId] {
        self.dependencies
            .get(&test)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn dependencies(&self) -> &FxHashMap<TestId, Vec<TestId>> {
        &self.dependencies
    }

    /// Problems found while planning, such as a test depending on its own
    /// ancestor.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Planned tests in execution order.
    pub fn tests(&self) -> Vec<TestId> {
        let mut out = Vec::with_capacity(self.members.len());
        let mut stack: Vec<&PlanNode> = self.root.iter().map(|root| &**root).collect();
        while let Some(node) = stack.pop() {
            out.push(node.test);
            stack.extend(node.children.iter().rev().map(|child| &**child));
        }
        out
    }
}

/// Plan subtree before sibling ordering.
struct Draft {
    test: TestId,
    is_explicit: bool,
    children: Vec<Draft>,
}

struct Builder<'a> {
    model: &'a TestModel,
    filter: &'a TestFilter,
    exact: bool,
    members: FxHashSet<TestId>,
}

impl Builder<'_> {
    fn node(&mut self, id: TestId, ancestor_selected: bool) -> Option<Draft> {
        ensure_sufficient_stack(|| {
            let test = self.model.test(id);
            let matched = self.filter.matches(test);
            let is_explicit = matched && !self.filter.is_all();
            // An explicit test is never reached through its ancestors.
            let reachable = !test.is_explicit || is_explicit;
            let selected = reachable && (matched || (!self.exact && ancestor_selected));

            let children: Vec<Draft> = test
                .children
                .iter()
                .filter_map(|&child| self.node(child, selected))
                .collect();

            if !selected && children.is_empty() {
                return None;
            }
            self.members.insert(id);
            Some(Draft {
                test: id,
                is_explicit,
                children,
            })
        })
    }
}

/// Why a dependency edge cannot be honored.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum InvalidDependency {
    OnItself,
    OnAncestor,
    OnDescendant,
}

/// Dependency edges between planned tests.
struct DependencyEdges {
    dependencies: FxHashMap<TestId, Vec<TestId>>,
    /// For each test, the siblings that must run before it. An edge between
    /// two tests in different subtrees becomes an edge between the children
    /// of their nearest common ancestor.
    sibling_prerequisites: FxHashMap<TestId, Vec<TestId>>,
    annotations: Vec<Annotation>,
}

impl DependencyEdges {
    fn resolve(model: &TestModel, members: &FxHashSet<TestId>) -> Self {
        let mut edges = DependencyEdges {
            dependencies: FxHashMap::default(),
            sibling_prerequisites: FxHashMap::default(),
            annotations: Vec::new(),
        };
        for test in model.tests().filter(|test| members.contains(&test.id)) {
            for &target in &test.dependencies {
                if !members.contains(&target) {
                    continue;
                }
                match sibling_pair(model, test.id, target) {
                    Ok((source, target_sibling)) => {
                        edges.dependencies.entry(test.id).or_default().push(target);
                        let prerequisites = edges.sibling_prerequisites.entry(source).or_default();
                        if !prerequisites.contains(&target_sibling) {
                            prerequisites.push(target_sibling);
                        }
                    }
                    Err(problem) => {
                        let annotation = invalid_dependency(model, test.id, target, problem);
                        warn!(%annotation, "dependency ignored");
                        edges.annotations.push(annotation);
                    }
                }
            }
        }
        edges
    }

    fn order(&self, model: &TestModel, draft: Draft) -> PlanNode {
        ensure_sufficient_stack(|| {
            let children: Vec<Arc<PlanNode>> = draft
                .children
                .into_iter()
                .map(|child| Arc::new(self.order(model, child)))
                .collect();
            PlanNode {
                test: draft.test,
                is_explicit: draft.is_explicit,
                children: self.order_siblings(model, children),
            }
        })
    }

    /// Sort by order key (declaration order breaks ties), then move each
    /// test after the siblings it depends on.
    fn order_siblings(
        &self,
        model: &TestModel,
        mut children: Vec<Arc<PlanNode>>,
    ) -> Vec<Arc<PlanNode>> {
        children.sort_by_key(|node| model.test(node.test).order);
        if children.len() < 2 {
            return children;
        }

        let position: FxHashMap<TestId, usize> = children
            .iter()
            .enumerate()
            .map(|(index, node)| (node.test, index))
            .collect();
        let prerequisites: Vec<Vec<usize>> = children
            .iter()
            .map(|node| {
                self.sibling_prerequisites
                    .get(&node.test)
                    .into_iter()
                    .flatten()
                    .filter_map(|sibling| position.get(sibling).copied())
                    .collect()
            })
            .collect();

        let mut placed = vec![false; children.len()];
        let mut order = Vec::with_capacity(children.len());
        while order.len() < children.len() {
            let ready = (0..children.len())
                .find(|&i| !placed[i] && prerequisites[i].iter().all(|&dep| placed[dep]));
            let next = match ready {
                Some(index) => index,
                None => {
                    let Some(index) = (0..children.len()).find(|&i| !placed[i]) else {
                        break;
                    };
                    warn!(
                        test = ?children[index].test,
                        "dependency cycle among sibling tests; running in declaration order"
                    );
                    index
                }
            };
            placed[next] = true;
            order.push(next);
        }

        let mut slots: Vec<Option<Arc<PlanNode>>> = children.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect()
    }
}

/// The children of the nearest common ancestor of `source` and `target`
/// that contain each of them.
fn sibling_pair(
    model: &TestModel,
    source: TestId,
    target: TestId,
) -> Result<(TestId, TestId), InvalidDependency> {
    if source == target {
        return Err(InvalidDependency::OnItself);
    }
    let source_path = path_from_root(model, source);
    let target_path = path_from_root(model, target);
    let mut depth = 0;
    loop {
        match (source_path.get(depth), target_path.get(depth)) {
            (None, _) => return Err(InvalidDependency::OnDescendant),
            (_, None) => return Err(InvalidDependency::OnAncestor),
            (Some(&s), Some(&t)) if s != t => return Ok((s, t)),
            _ => depth += 1,
        }
    }
}

fn path_from_root(model: &TestModel, id: TestId) -> Vec<TestId> {
    let mut path: Vec<TestId> = model.ancestors(id).collect();
    path.reverse();
    path.push(id);
    path
}

fn invalid_dependency(
    model: &TestModel,
    source: TestId,
    target: TestId,
    problem: InvalidDependency,
) -> Annotation {
    let source_name = model.full_name(source);
    let message = match problem {
        InvalidDependency::OnItself => {
            format!("test `{source_name}` has an invalid dependency on itself")
        }
        InvalidDependency::OnAncestor => format!(
            "test `{source_name}` has an invalid dependency on its own ancestor `{}`",
            model.full_name(target)
        ),
        InvalidDependency::OnDescendant => format!(
            "test `{source_name}` has an invalid dependency on its own descendant `{}`",
            model.full_name(target)
        ),
    };
    let annotation = Annotation::error(AnnotationCode::G0006).with_message(message);
    match model.test(source).code_element {
        Some(element) => annotation.at(element),
        None => annotation,
    }
}
