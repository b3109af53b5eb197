//! # Schema Validator
//!
//! Deserializes the assembled config into a typed schema and runs its
//! `validator` constraints. Both a shape mismatch and a constraint
//! violation reject the build as [`ConfigError::Validation`].

use crate::engine::EngineContext;
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use validator::Validate;

pub struct SchemaValidator<T> {
    _schema: PhantomData<fn() -> T>,
}

impl<T> SchemaValidator<T> {
    pub fn new() -> Self {
        SchemaValidator {
            _schema: PhantomData,
        }
    }
}

impl<T> Default for SchemaValidator<T> {
    fn default() -> Self {
        SchemaValidator::new()
    }
}

#[async_trait]
impl<T> Plugin for SchemaValidator<T>
where
    T: DeserializeOwned + Validate + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "schema_validator"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::validate()
    }

    async fn validate(&self, config: &Value, _cx: &EngineContext) -> Result<(), ConfigError> {
        let schema: T = serde_json::from_value(config.clone())
            .map_err(|err| ConfigError::validation(format!("schema mismatch: {err}")))?;
        schema
            .validate()
            .map_err(|err| ConfigError::validation(err))?;
        Ok(())
    }
}
