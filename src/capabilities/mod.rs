use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;

/// A local handler the model can target through the legacy function-call
/// response shape. Handlers are synchronous and rule-based; their raw result
/// is returned to the caller as-is, never coerced into the protocol schema.
pub type CapabilityHandler = fn(Value) -> anyhow::Result<Value>;

pub struct CapabilityRegistry {
    handlers: HashMap<&'static str, CapabilityHandler>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        let mut handlers: HashMap<&'static str, CapabilityHandler> = HashMap::new();
        handlers.insert(FROZEN_TREATS_NAME, get_frozen_treat_ideas);
        Self { handlers }
    }
}

impl CapabilityRegistry {
    pub fn recognizes(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Invoke a capability with decoded function-call arguments. `None` means
    /// the name is not a recognized local capability.
    pub fn dispatch(&self, name: &str, arguments: Value) -> Option<anyhow::Result<Value>> {
        self.handlers.get(name).map(|handler| handler(arguments))
    }

    /// Legacy `functions` declaration array sent alongside the protocol
    /// request so older model snapshots can target local capabilities.
    pub fn declarations(&self) -> Vec<Value> {
        vec![json!({
            "name": FROZEN_TREATS_NAME,
            "description": "Suggests frozen treat recipes based on user's pantry and local sales.",
            "parameters": {
                "type": "object",
                "properties": {
                    "ingredients": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Available pantry items"
                    },
                    "nearbySales": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Items currently on sale nearby"
                    }
                },
                "required": ["ingredients"]
            }
        })]
    }
}

// ── Frozen treat generator ──────────────────────────────────────

pub const FROZEN_TREATS_NAME: &str = "getFrozenTreatIdeas";

#[derive(Debug, Deserialize)]
struct FrozenTreatArgs {
    ingredients: Vec<String>,
    #[serde(rename = "nearbySales", default)]
    nearby_sales: Vec<String>,
}

fn get_frozen_treat_ideas(arguments: Value) -> anyhow::Result<Value> {
    let args: FrozenTreatArgs = serde_json::from_value(arguments)?;

    let has = |item: &str| args.ingredients.iter().any(|i| i == item);
    if has("blueberries") && has("milk") {
        let suggestions = if args.nearby_sales.is_empty() {
            Value::Null
        } else {
            json!(format!(
                "Also on sale nearby: {}",
                args.nearby_sales.join(", ")
            ))
        };
        return Ok(json!({
            "recipe": "Blueberry Chili B. Apple Ice Cream",
            "steps": [
                "Blend blueberries, milk, and one Chili B. Apple together.",
                "Freeze mixture in ice cube trays.",
                "Once frozen, blend again into soft-serve consistency."
            ],
            "suggestions": suggestions
        }));
    }

    Ok(json!({ "recipe": "Sorry, not enough ingredients for a frozen treat." }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_recognizes_the_frozen_treat_capability() {
        let registry = CapabilityRegistry::default();
        assert!(registry.recognizes(FROZEN_TREATS_NAME));
        assert!(!registry.recognizes("makeCoffee"));
    }

    #[test]
    fn unknown_capability_dispatches_to_none() {
        let registry = CapabilityRegistry::default();
        assert!(registry.dispatch("makeCoffee", json!({})).is_none());
    }

    #[test]
    fn full_ingredient_match_returns_a_recipe() {
        let registry = CapabilityRegistry::default();
        let result = registry
            .dispatch(
                FROZEN_TREATS_NAME,
                json!({"ingredients": ["blueberries", "milk"], "nearbySales": ["apples"]}),
            )
            .unwrap()
            .unwrap();
        assert_eq!(result["recipe"], "Blueberry Chili B. Apple Ice Cream");
        assert!(result["suggestions"].as_str().unwrap().contains("apples"));
    }

    #[test]
    fn missing_ingredients_return_the_apology_recipe() {
        let registry = CapabilityRegistry::default();
        let result = registry
            .dispatch(FROZEN_TREATS_NAME, json!({"ingredients": ["rice"]}))
            .unwrap()
            .unwrap();
        assert!(result["recipe"].as_str().unwrap().contains("not enough"));
    }

    #[test]
    fn bad_arguments_error_instead_of_panicking() {
        let registry = CapabilityRegistry::default();
        let result = registry
            .dispatch(FROZEN_TREATS_NAME, json!({"nearbySales": ["apples"]}))
            .unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn declarations_cover_every_registered_capability() {
        let registry = CapabilityRegistry::default();
        let declarations = registry.declarations();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0]["name"], FROZEN_TREATS_NAME);
        assert_eq!(
            declarations[0]["parameters"]["required"],
            json!(["ingredients"])
        );
    }
}
