mod branch;
mod counter_table;
mod error;
mod extract;
mod path;
mod simulate;
mod static_model;
mod symbols;
mod table;
mod trace;
mod utils;

pub use branch::*;
pub use counter_table::*;
pub use error::*;
pub use extract::*;
pub use path::*;
pub use simulate::*;
pub use static_model::*;
pub use symbols::*;
pub use table::*;
pub use trace::*;
pub use utils::*;

use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};

pub trait BranchPredictModel {
    /// Predict the direction of the branch at `pc` from the current state,
    /// then learn the actual direction `taken`.
    fn predict_branch(&mut self, pc: u64, target: Option<u64>, taken: bool) -> bool;
}

/// Parameters of a predictor model, one instance is built per trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    /// backward taken, forward not taken
    Static,
    /// direction table with FIFO replacement
    Table { slots: usize },
    /// saturating counter table with oldest-first replacement
    CounterTable {
        slots: usize,
        counter_start: u32,
        counter_max: u32,
    },
}

impl ModelConfig {
    pub fn validate(&self, name: &str) -> Result<(), AnalysisError> {
        let invalid = |reason: &str| {
            Err(AnalysisError::InvalidModel {
                name: name.to_string(),
                reason: reason.to_string(),
            })
        };
        match *self {
            ModelConfig::Static => Ok(()),
            ModelConfig::Table { slots } if slots == 0 => invalid("slots must be positive"),
            ModelConfig::Table { .. } => Ok(()),
            ModelConfig::CounterTable { slots, .. } if slots == 0 => {
                invalid("slots must be positive")
            }
            ModelConfig::CounterTable {
                counter_start,
                counter_max,
                ..
            } if counter_start == 0 || counter_start > counter_max => {
                invalid("counter_start must be within 1..=counter_max")
            }
            ModelConfig::CounterTable { .. } => Ok(()),
        }
    }

    pub fn build(&self) -> Box<dyn BranchPredictModel> {
        match *self {
            ModelConfig::Static => Box::new(StaticModel),
            ModelConfig::Table { slots } => Box::new(TableModel::new(slots)),
            ModelConfig::CounterTable {
                slots,
                counter_start,
                counter_max,
            } => Box::new(CounterTableModel::new(slots, counter_start, counter_max)),
        }
    }
}

/// A named entry of the model registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedModel {
    pub name: String,
    pub model: ModelConfig,
}

pub fn builtin_models() -> Vec<NamedModel> {
    let named = |name: &str, model| NamedModel {
        name: name.to_string(),
        model,
    };
    vec![
        named("static", ModelConfig::Static),
        named("table", ModelConfig::Table { slots: 4 }),
        named(
            "counter_table_4",
            ModelConfig::CounterTable {
                slots: 4,
                counter_start: 2,
                counter_max: 3,
            },
        ),
        named(
            "counter_table_16",
            ModelConfig::CounterTable {
                slots: 16,
                counter_start: 2,
                counter_max: 3,
            },
        ),
    ]
}

/// Check the parameters of every model and that no name is used twice
pub fn validate_models(models: &[NamedModel]) -> Result<(), AnalysisError> {
    let mut names = HashSet::new();
    for model in models {
        model.model.validate(&model.name)?;
        if !names.insert(model.name.as_str()) {
            return Err(AnalysisError::InvalidModel {
                name: model.name.clone(),
                reason: "duplicate model name".to_string(),
            });
        }
    }
    Ok(())
}

/// Load a model registry from a json array of `{"name": ..., "model": ...}`
pub fn load_models<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<NamedModel>> {
    let models: Vec<NamedModel> = serde_json::from_slice(&std::fs::read(path)?)?;
    validate_models(&models)?;
    Ok(models)
}

/// Keep only the models listed in `names`, all of them if `names` is empty.
/// Fails if nothing is left to run.
pub fn select_models(models: Vec<NamedModel>, names: &[String]) -> anyhow::Result<Vec<NamedModel>> {
    if models.is_empty() {
        anyhow::bail!("No models to run");
    }
    if names.is_empty() {
        return Ok(models);
    }
    let mut selected = vec![];
    for name in names {
        match models.iter().find(|model| &model.name == name) {
            Some(model) => selected.push(model.clone()),
            None => anyhow::bail!(
                "Unknown model {}, available: {}",
                name,
                models
                    .iter()
                    .map(|model| model.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_models() {
        let models = builtin_models();
        let names: Vec<&str> = models.iter().map(|model| model.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["static", "table", "counter_table_4", "counter_table_16"]
        );
        for model in &models {
            model.model.validate(&model.name).unwrap();
        }
    }

    #[test]
    fn test_validate() {
        assert!(ModelConfig::Table { slots: 0 }.validate("t").is_err());
        let counter = |counter_start, counter_max| ModelConfig::CounterTable {
            slots: 4,
            counter_start,
            counter_max,
        };
        assert!(counter(0, 3).validate("c").is_err());
        assert!(counter(4, 3).validate("c").is_err());
        assert!(counter(3, 3).validate("c").is_ok());
    }

    #[test]
    fn test_load_models() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"name": "static", "model": {{"kind": "static"}}}},
                {{"name": "big", "model": {{"kind": "counter_table", "slots": 64, "counter_start": 1, "counter_max": 7}}}}
            ]"#
        )
        .unwrap();
        file.flush().unwrap();

        let models = load_models(file.path()).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(
            models[1].model,
            ModelConfig::CounterTable {
                slots: 64,
                counter_start: 1,
                counter_max: 7
            }
        );
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"name": "m", "model": {{"kind": "static"}}}},
                {{"name": "m", "model": {{"kind": "table", "slots": 4}}}}
            ]"#
        )
        .unwrap();
        file.flush().unwrap();
        assert!(load_models(file.path()).is_err());

        let mut models = builtin_models();
        models.push(models[0].clone());
        match validate_models(&models) {
            Err(AnalysisError::InvalidModel { name, .. }) => assert_eq!(name, "static"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_select_models() {
        let selected = select_models(builtin_models(), &["table".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].model, ModelConfig::Table { slots: 4 });
        assert!(select_models(builtin_models(), &["tage".to_string()]).is_err());
        assert_eq!(select_models(builtin_models(), &[]).unwrap().len(), 4);
    }

    #[test]
    fn test_empty_registry_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        file.flush().unwrap();
        let models = load_models(file.path()).unwrap();
        assert!(select_models(models, &[]).is_err());
    }

    #[test]
    fn test_fresh_instances() {
        let config = ModelConfig::Table { slots: 1 };
        let mut first = config.build();
        assert!(!first.predict_branch(0x10, Some(0x0c), true));
        assert!(first.predict_branch(0x10, Some(0x0c), true));
        let mut second = config.build();
        assert!(!second.predict_branch(0x10, Some(0x0c), true));
    }
}
