//! Named view types and views of models.

use crate::declaration::Declaration;
use crate::error::{Error, PropertyError};
use crate::scene::{NodeId, Scene};
use crate::value::{Value, ValueType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Type name of the view substituted for models nobody registered a view for.
pub const PLACEHOLDER: &str = "Placeholder";

/// Something that can construct views of a named type.
pub trait ViewType: Send + Sync {
    fn name(&self) -> &str;

    fn instantiate(&self, scene: &mut Scene, args: &[Value]) -> Result<NodeId, Error>;
}

/// A view type made of extra property declarations on top of the standard view ones.
///
/// Arguments are written to the extra properties in declaration order.
#[derive(Debug, Clone)]
pub struct ViewTemplate {
    name: Arc<str>,
    declarations: Vec<Arc<Declaration>>,
}

impl ViewTemplate {
    pub fn new(name: &str, declarations: Vec<Arc<Declaration>>) -> ViewTemplate {
        ViewTemplate {
            name: name.into(),
            declarations,
        }
    }
}

impl ViewType for ViewTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn instantiate(&self, scene: &mut Scene, args: &[Value]) -> Result<NodeId, Error> {
        let view = scene.create_view(&self.name);
        let mut props = Vec::with_capacity(self.declarations.len());
        for decl in &self.declarations {
            props.push(scene.add_property(view, Arc::clone(decl))?);
        }
        for (prop, arg) in props.into_iter().zip(args) {
            scene.set(prop, arg.clone(), None)?;
        }
        Ok(view)
    }
}

/// Maps type names to view types, and model types to the view types that display them.
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<Arc<str>, Arc<dyn ViewType>>,
    model_views: HashMap<Arc<str>, Arc<str>>,
}

impl core::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .field("model_views", &self.model_views)
            .finish()
    }
}

impl TypeRegistry {
    pub fn new() -> TypeRegistry {
        TypeRegistry::default()
    }

    pub fn register(&mut self, ty: Arc<dyn ViewType>) {
        self.types.insert(ty.name().into(), ty);
    }

    /// Displays models of type `model_type` with views of type `view_type`.
    pub fn register_model_view(&mut self, model_type: &str, view_type: &str) {
        self.model_views.insert(model_type.into(), view_type.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn instantiate(
        &self,
        scene: &mut Scene,
        name: &str,
        args: &[Value],
    ) -> Result<NodeId, Error> {
        let ty = self
            .types
            .get(name)
            .ok_or_else(|| Error::UnknownType(name.into()))?;
        ty.instantiate(scene, args)
    }

    /// Creates a view displaying `model`, with the model in its `model` property.
    ///
    /// Falls back to a placeholder view if no view type is registered for the model’s type.
    pub fn view_for_model(&self, scene: &mut Scene, model: &Value) -> Result<NodeId, Error> {
        let model_type = model_type_name(scene, model);
        let view = match self.model_views.get(&*model_type) {
            Some(view_type) => self.instantiate(scene, view_type, std::slice::from_ref(model))?,
            None => {
                warn!(model_type = &*model_type, "no view registered for model type, using a placeholder");
                scene.create_view(PLACEHOLDER)
            }
        };
        match scene.property(view, "model") {
            Ok(prop) => scene.set(prop, model.clone(), None)?,
            Err(_) => {
                scene.add_property(view, Declaration::new("model", ValueType::Any, model.clone()))?;
            }
        }
        Ok(view)
    }

    /// Creates a list view whose children display `models`.
    pub fn create_list_view(&self, scene: &mut Scene, models: Vec<Value>) -> Result<NodeId, Error> {
        let list = scene.create_view("List");
        scene.add_property(
            list,
            Declaration::new("models", ValueType::List, Value::List(models.into())),
        )?;
        self.sync_model_views(scene, list)?;
        Ok(list)
    }

    /// Rebuilds a list view’s children from its `models` property.
    ///
    /// Children whose `model` equals one of the models are kept and reordered; models without a
    /// child get a new view; children left over are removed.
    pub fn sync_model_views(&self, scene: &mut Scene, list: NodeId) -> Result<(), Error> {
        let models = match scene.get_named(list, "models")? {
            Value::List(models) => models,
            Value::Nil => Arc::from(Vec::new()),
            other => {
                let prop = scene.property(list, "models")?;
                return Err(PropertyError::TypeMismatch {
                    property: scene.path(prop).ok_or(PropertyError::StaleProperty(prop))?,
                    expected: ValueType::List,
                    found: other.ty(),
                }
                .into())
            }
        };

        let mut current = Vec::new();
        for child in scene.children(list).to_vec() {
            let model = scene.get_named(child, "model").unwrap_or(Value::Nil);
            current.push((model, child));
        }

        let mut children = Vec::with_capacity(models.len());
        let mut created = 0;
        for model in models.iter() {
            let reused = current
                .iter()
                .position(|(key, _)| key == model)
                .map(|i| current.remove(i).1);
            let child = match reused {
                Some(child) => child,
                None => {
                    created += 1;
                    self.view_for_model(scene, model)?
                }
            };
            children.push(child);
        }

        scene.set_children(list, children)?;
        for (_, unused) in &current {
            scene.remove_element(*unused)?;
        }
        debug!(%list, created, removed = current.len(), "synced model views");
        Ok(())
    }
}

/// The type name used to look up a model’s view: the element type for elements, the value type
/// otherwise.
pub fn model_type_name(scene: &Scene, model: &Value) -> Arc<str> {
    match model {
        Value::Element(node) => scene.type_name(*node).unwrap_or(PLACEHOLDER).into(),
        other => format!("{:?}", other.ty()).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(Arc::new(ViewTemplate::new(
            "Label",
            vec![Arc::new(Declaration::new("text", ValueType::Text, Value::Nil))],
        )));
        registry.register_model_view("Text", "Label");
        registry
    }

    #[test]
    fn unknown_types_are_errors() {
        let mut scene = Scene::default();
        assert!(matches!(
            registry().instantiate(&mut scene, "Nope", &[]),
            Err(Error::UnknownType(name)) if &*name == "Nope"
        ));
    }

    #[test]
    fn templates_take_positional_arguments() {
        let mut scene = Scene::default();
        let label = registry()
            .instantiate(&mut scene, "Label", &["hi".into()])
            .unwrap();
        assert_eq!(scene.type_name(label), Some("Label"));
        assert_eq!(scene.get_named(label, "text").unwrap(), Value::from("hi"));
    }

    #[test]
    fn unregistered_models_get_a_placeholder() {
        let mut scene = Scene::default();
        let view = registry().view_for_model(&mut scene, &Value::Number(1.)).unwrap();
        assert_eq!(scene.type_name(view), Some(PLACEHOLDER));
        assert_eq!(scene.get_named(view, "model").unwrap(), Value::Number(1.));
    }

    #[test]
    fn sync_reuses_views_by_model() {
        let mut scene = Scene::default();
        let registry = registry();
        let list = registry
            .create_list_view(&mut scene, vec!["a".into(), "b".into(), "c".into()])
            .unwrap();
        let before = scene.children(list).to_vec();
        assert_eq!(before.len(), 3);
        assert_eq!(scene.type_name(before[0]), Some("Label"));

        let models = Value::List(vec!["c".into(), "a".into(), "d".into()].into());
        scene.set_named(list, "models", models, None).unwrap();
        registry.sync_model_views(&mut scene, list).unwrap();

        let after = scene.children(list).to_vec();
        assert_eq!(after[0], before[2]);
        assert_eq!(after[1], before[0]);
        assert!(!before.contains(&after[2]));
        assert!(!scene.contains(before[1]));
    }
}
