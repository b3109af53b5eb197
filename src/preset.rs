//! # Standard Preset
//!
//! The conventional wiring for a service configuration: config file
//! candidates, dotenv files, prefixed environment variables and CLI
//! arguments, deep-merged in that precedence order (later wins).

use crate::engine::EngineBuilder;
use crate::plugins::{
    ArgvLoader, CoerceMapper, DeepReducer, EnvLoader, FetchLoader, FileLoader, JsonLoader,
    KeyCase, KeyCaseMapper, ObjectLoader, PrefixMapper, TomlLoader, YamlLoader,
};
use crate::source;
use crate::watch::FileWatchHub;
use heck::ToShoutySnakeCase;

/// Builder pre-wired with the stock sources and plugins for `name`.
///
/// Environment variables are filtered to the `<NAME>_` prefix and their
/// keys rewritten to camel case so they merge with file config. Additional
/// sources and plugins can still be registered before `build()`.
pub fn standard(name: impl Into<String>) -> EngineBuilder {
    let name = name.into();
    let env_prefix = format!("{}_", name.to_shouty_snake_case());
    let hub = FileWatchHub::new();

    EngineBuilder::new(name)
        .source(source::config_files())
        .source(source::dotenv())
        .source(source::env())
        .source(source::argv(None))
        .plugin(ObjectLoader)
        .plugin(FileLoader::new(hub))
        .plugin(FetchLoader::new())
        .plugin(JsonLoader)
        .plugin(TomlLoader)
        .plugin(YamlLoader)
        .plugin(EnvLoader)
        .plugin(ArgvLoader)
        .plugin(PrefixMapper::new(env_prefix).for_tag("env"))
        .plugin(CoerceMapper::new().for_tag("env"))
        .plugin(CoerceMapper::new().for_tag("argv"))
        .plugin(KeyCaseMapper::new(KeyCase::Camel).for_tag("env"))
        .plugin(DeepReducer)
}
