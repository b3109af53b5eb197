//! # Bundled Plugins
//!
//! The stock loaders, mappers, reducers, transformers and validators that
//! [`preset::standard`](crate::preset::standard) wires together. Each one
//! is an ordinary [`Plugin`](crate::plugin::Plugin) implementation and can
//! be registered individually on an [`EngineBuilder`](crate::engine::EngineBuilder).

pub mod argv_loader;
pub mod assign_reducer;
pub mod coerce_mapper;
pub mod deep_reducer;
pub mod defaults_transformer;
pub mod env_loader;
pub mod fetch_loader;
pub mod file_loader;
pub mod fork_loader;
pub mod json_loader;
pub mod key_case_mapper;
pub mod object_loader;
pub mod pick_property_mapper;
pub mod prefix_mapper;
pub mod schema_validator;
pub mod toml_loader;
pub mod yaml_loader;

pub use argv_loader::ArgvLoader;
pub use assign_reducer::AssignReducer;
pub use coerce_mapper::CoerceMapper;
pub use deep_reducer::DeepReducer;
pub use defaults_transformer::DefaultsTransformer;
pub use env_loader::EnvLoader;
pub use fetch_loader::FetchLoader;
pub use file_loader::FileLoader;
pub use fork_loader::ForkLoader;
pub use json_loader::JsonLoader;
pub use key_case_mapper::{KeyCase, KeyCaseMapper};
pub use object_loader::ObjectLoader;
pub use pick_property_mapper::PickPropertyMapper;
pub use prefix_mapper::PrefixMapper;
pub use schema_validator::SchemaValidator;
pub use toml_loader::TomlLoader;
pub use yaml_loader::YamlLoader;
