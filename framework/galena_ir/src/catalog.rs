//! In-memory code catalog.
//!
//! A registration table keyed by declaration site. Hosts build it once at load
//! time (by hand or from a build-time scan) and hand it to the evaluator as a
//! `CodeModel`.

use rustc_hash::FxHashMap;

use crate::{
    CodeElement, CodeElementKind, CodeModel, ElementBody, FixtureFactory, MethodInvoker,
    SlotSetter, ValueType,
};

#[derive(Debug)]
struct ElementData {
    kind: CodeElementKind,
    name: String,
    parent: Option<CodeElement>,
    children: Vec<CodeElement>,
    value_type: ValueType,
    position: u32,
    is_abstract: bool,
    documentation: Option<String>,
    body: Option<ElementBody>,
}

/// Immutable code catalog.
#[derive(Debug, Default)]
pub struct CodeCatalog {
    elements: Vec<ElementData>,
}

impl CodeCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All assemblies, in registration order.
    pub fn assemblies(&self) -> impl Iterator<Item = CodeElement> + '_ {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, data)| data.kind == CodeElementKind::Assembly)
            .map(|(i, _)| element_at(i))
    }

    /// Find a direct child by name.
    pub fn find_child(&self, parent: CodeElement, name: &str) -> Option<CodeElement> {
        self.data(parent)
            .children
            .iter()
            .copied()
            .find(|child| self.data(*child).name == name)
    }

    fn data(&self, element: CodeElement) -> &ElementData {
        &self.elements[element.index()]
    }
}

impl CodeModel for CodeCatalog {
    fn kind(&self, element: CodeElement) -> CodeElementKind {
        self.data(element).kind
    }

    fn name(&self, element: CodeElement) -> &str {
        &self.data(element).name
    }

    fn parent(&self, element: CodeElement) -> Option<CodeElement> {
        self.data(element).parent
    }

    fn children(&self, element: CodeElement) -> &[CodeElement] {
        &self.data(element).children
    }

    fn value_type(&self, element: CodeElement) -> ValueType {
        self.data(element).value_type
    }

    fn position(&self, element: CodeElement) -> u32 {
        self.data(element).position
    }

    fn is_abstract(&self, element: CodeElement) -> bool {
        self.data(element).is_abstract
    }

    fn documentation(&self, element: CodeElement) -> Option<&str> {
        self.data(element).documentation.as_deref()
    }

    fn body(&self, element: CodeElement) -> Option<&ElementBody> {
        self.data(element).body.as_ref()
    }
}

fn element_at(index: usize) -> CodeElement {
    let Ok(raw) = u32::try_from(index) else {
        panic!("code catalog overflow");
    };
    CodeElement::new(raw)
}

/// Builder for [`CodeCatalog`].
///
/// Positions are assigned per parent and kind, so the first parameter of a
/// method has position 0 regardless of how many other members precede it.
#[derive(Default)]
pub struct CatalogBuilder {
    elements: Vec<ElementData>,
    positions: FxHashMap<(Option<CodeElement>, CodeElementKind), u32>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_assembly(&mut self, name: &str) -> CodeElement {
        self.push(None, CodeElementKind::Assembly, name, ValueType::Any, None)
    }

    pub fn add_type(&mut self, parent: CodeElement, name: &str) -> CodeElement {
        self.push(Some(parent), CodeElementKind::Type, name, ValueType::Any, None)
    }

    pub fn add_constructor(&mut self, ty: CodeElement, factory: FixtureFactory) -> CodeElement {
        let name = format!("{}.new", self.elements[ty.index()].name);
        self.push(
            Some(ty),
            CodeElementKind::Constructor,
            &name,
            ValueType::Any,
            Some(ElementBody::Constructor(factory)),
        )
    }

    pub fn add_method(
        &mut self,
        ty: CodeElement,
        name: &str,
        invoker: MethodInvoker,
    ) -> CodeElement {
        self.push(
            Some(ty),
            CodeElementKind::Method,
            name,
            ValueType::Any,
            Some(ElementBody::Method(invoker)),
        )
    }

    /// Add a parameter to a method or constructor.
    pub fn add_parameter(
        &mut self,
        owner: CodeElement,
        name: &str,
        value_type: ValueType,
    ) -> CodeElement {
        self.push(Some(owner), CodeElementKind::Parameter, name, value_type, None)
    }

    pub fn add_generic_parameter(&mut self, ty: CodeElement, name: &str) -> CodeElement {
        self.push(
            Some(ty),
            CodeElementKind::GenericParameter,
            name,
            ValueType::Any,
            None,
        )
    }

    pub fn add_field(
        &mut self,
        ty: CodeElement,
        name: &str,
        value_type: ValueType,
        setter: Option<SlotSetter>,
    ) -> CodeElement {
        self.push(
            Some(ty),
            CodeElementKind::Field,
            name,
            value_type,
            setter.map(ElementBody::Setter),
        )
    }

    pub fn add_property(
        &mut self,
        ty: CodeElement,
        name: &str,
        value_type: ValueType,
        setter: Option<SlotSetter>,
    ) -> CodeElement {
        self.push(
            Some(ty),
            CodeElementKind::Property,
            name,
            value_type,
            setter.map(ElementBody::Setter),
        )
    }

    pub fn set_abstract(&mut self, element: CodeElement, is_abstract: bool) -> &mut Self {
        self.elements[element.index()].is_abstract = is_abstract;
        self
    }

    pub fn set_documentation(&mut self, element: CodeElement, text: &str) -> &mut Self {
        self.elements[element.index()].documentation = Some(text.to_owned());
        self
    }

    pub fn build(self) -> CodeCatalog {
        CodeCatalog {
            elements: self.elements,
        }
    }

    fn push(
        &mut self,
        parent: Option<CodeElement>,
        kind: CodeElementKind,
        name: &str,
        value_type: ValueType,
        body: Option<ElementBody>,
    ) -> CodeElement {
        let element = element_at(self.elements.len());
        let slot = self.positions.entry((parent, kind)).or_insert(0);
        let position = *slot;
        *slot += 1;

        self.elements.push(ElementData {
            kind,
            name: name.to_owned(),
            parent,
            children: Vec::new(),
            value_type,
            position,
            is_abstract: false,
            documentation: None,
            body,
        });
        if let Some(parent) = parent {
            self.elements[parent.index()].children.push(element);
        }
        element
    }
}

#[cfg(test)]
mod tests;
